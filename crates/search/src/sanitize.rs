use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

const MAX_COLLECTION_NAME_CHARS: usize = 100;

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid regex"))
}

fn edges() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^A-Za-z0-9]+|[^A-Za-z0-9]+$").expect("valid regex"))
}

/// Vector-store-safe collection name.
///
/// The name is NFKD-decomposed so accented letters fold to their base letter,
/// spaces become `_`, anything outside `[A-Za-z0-9._-]` is dropped, both ends
/// start/stop on an alphanumeric, and the result is capped at 100 chars.
#[must_use]
pub fn sanitize_collection_name(name: &str) -> String {
    let decomposed: String = name.nfkd().collect();
    let underscored = decomposed.replace(' ', "_");
    let allowed = disallowed().replace_all(&underscored, "");
    let trimmed = edges().replace_all(&allowed, "");
    trimmed.chars().take(MAX_COLLECTION_NAME_CHARS).collect()
}

/// Strip NUL bytes and surrounding whitespace.
#[must_use]
pub fn sanitize_text(text: &str) -> String {
    text.replace('\0', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_are_store_safe() {
        assert_eq!(
            sanitize_collection_name("  Attention Is All (You) Need!.pdf "),
            "Attention_Is_All_You_Need.pdf"
        );
        assert_eq!(sanitize_collection_name("__-draft v2-__"), "draft_v2");
        assert_eq!(sanitize_collection_name("!!!"), "");
    }

    #[test]
    fn accented_letters_fold_to_ascii() {
        assert_eq!(sanitize_collection_name("Über paper"), "Uber_paper");
        assert_eq!(sanitize_collection_name("Étude–Café"), "EtudeCafe");
        // compatibility forms decompose too
        assert_eq!(sanitize_collection_name("ﬁnal ２"), "final_2");
    }

    #[test]
    fn collection_names_are_capped() {
        let long = "a".repeat(250);
        assert_eq!(sanitize_collection_name(&long).len(), 100);
    }

    #[test]
    fn text_loses_nul_bytes() {
        assert_eq!(sanitize_text("  ab\0c \n"), "abc");
    }
}
