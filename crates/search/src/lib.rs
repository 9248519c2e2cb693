//! # Scholar Search
//!
//! Retrieval, novelty filtering and synthesis over ingested research papers.
//!
//! ```text
//! add_document ──> IngestPipeline ──> VectorStore + RecordStore
//!
//! answer_question ──> RetrievalAggregator ──> Synthesizer
//!                     (top-k per collection, dedup, cap, trim)
//!
//! compare_documents ──> get_all per paper ──> find_novel_chunks ──> Synthesizer
//!                       (re-embed if empty)   (max cosine < 0.60)   (parsed sections)
//! ```

mod compare;
mod error;
mod ingest;
mod library;
mod novelty;
mod prompts;
mod records;
mod retrieval;
mod sanitize;
mod summarize;
mod synthesis;

#[cfg(test)]
mod test_support;

pub use compare::{
    Answer, AssistantConfig, ComparisonResult, ResearchAssistant, NO_NOVEL_CONTENT,
};
pub use error::{Result, SearchError};
pub use ingest::{chunk_id, IngestPipeline, IngestReport};
pub use library::{AddedDocument, DocumentLibrary, DocumentUpload};
pub use novelty::{find_novel_chunks, NoveltyOutcome, DEFAULT_NOVELTY_THRESHOLD};
pub use prompts::COMPARISON_QUESTION;
pub use records::{DocumentRecord, JsonRecordStore, RecordStore};
pub use retrieval::{
    assemble_context, trim_chunk, RetrievalAggregator, RetrievalConfig, RetrievalContext,
    SourceChunk, CONTEXT_SEPARATOR,
};
pub use sanitize::{sanitize_collection_name, sanitize_text};
pub use summarize::{summarize_document, DocumentSummary};
pub use synthesis::{
    parse_comparison, ChatConfig, ChatSynthesizer, ComparisonSections, Synthesizer,
};
