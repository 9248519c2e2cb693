//! Prompt templates sent to the synthesis model.

/// Fixed question used when comparing whole collections.
pub const COMPARISON_QUESTION: &str =
    "Identify the novel contributions, similarities, and research gaps across these papers.";

const RESPONSE_FORMAT: &str = "Novel Contributions:
<your answer>

Similarities:
<your answer>

Missing Gaps:
<your answer>";

#[must_use]
pub fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an AI assistant helping to answer questions based on the following research papers content.\n\n\
         Context:\n{context}\n\n\
         Question:\n{question}\n\n\
         Please provide a detailed and clear answer based on the context above."
    )
}

#[must_use]
pub fn collections_comparison_prompt(context: &str) -> String {
    format!(
        "Compare the following research content across papers.

Context:
{context}

---

Question:
Identify the following:
1. Novel Contributions
2. Similarities across papers
3. Research Gaps or Missing Elements

Format your response as:

{RESPONSE_FORMAT}
"
    )
}

#[must_use]
pub fn paper_comparison_prompt(title: &str, other_titles: &[String], context: &str) -> String {
    let others = other_titles.join(", ");
    format!(
        "Compare the following research content for the paper titled \"{title}\" against other papers titled: {others}.

Context:
{context}

---

Question:
For the paper titled \"{title}\", please provide:

1. Novel Contributions unique to this paper,
2. Similarities with the other papers,
3. Research Gaps or Missing Elements relevant to this paper.

Format your response exactly as:

{RESPONSE_FORMAT}
"
    )
}

#[must_use]
pub fn chunk_summary_prompt(chunk: &str, position: usize, total: usize) -> String {
    format!(
        "You are a research assistant. Summarize the following chunk ({position} of {total}) of a research paper text into 2-3 paragraphs.
Avoid repeating information from previous chunks.

Paper chunk:
{chunk}
"
    )
}

#[must_use]
pub fn aggregate_summary_prompt(partial_summaries: &[String]) -> String {
    format!(
        "You are a research assistant. Combine the following partial summaries \
         of a research paper into a clear, coherent, and concise overall summary \
         in 3-4 paragraphs. Remove redundancies and synthesize key points.\n\n{}",
        partial_summaries.join("\n\n")
    )
}
