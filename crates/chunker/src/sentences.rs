use unicode_segmentation::UnicodeSegmentation;

/// Split text into trimmed, non-empty sentences (Unicode UAX #29 sentence boundaries).
///
/// Extracted document text wraps lines mid-sentence, so single newlines are folded into
/// spaces first; blank lines still end a paragraph and therefore a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for paragraph in paragraphs(text) {
        for sentence in paragraph.split_sentence_bounds() {
            let trimmed = sentence.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
        }
    }
    sentences
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        for word in line.split_whitespace() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}
