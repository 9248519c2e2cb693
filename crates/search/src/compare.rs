use crate::error::{Result, SearchError};
use crate::library::DocumentLibrary;
use crate::novelty::{find_novel_chunks, DEFAULT_NOVELTY_THRESHOLD};
use crate::prompts::{
    answer_prompt, collections_comparison_prompt, paper_comparison_prompt, COMPARISON_QUESTION,
};
use crate::records::DocumentRecord;
use crate::retrieval::{assemble_context, RetrievalAggregator, RetrievalConfig, RetrievalContext};
use crate::synthesis::{parse_comparison, Synthesizer};
use scholar_chunker::{Chunker, ChunkerConfig};
use scholar_vector_store::EmbeddedChunk;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Result text for a paper whose every chunk overlaps the other papers.
pub const NO_NOVEL_CONTENT: &str = "No novel content detected for this paper.";

const MIN_COMPARED_DOCUMENTS: usize = 2;
const MAX_COMPARED_DOCUMENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub novelty_threshold: f32,
    pub retrieval: RetrievalConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            novelty_threshold: DEFAULT_NOVELTY_THRESHOLD,
            retrieval: RetrievalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub context: RetrievalContext,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub title: String,
    pub novel_insights: String,
    pub similarities: String,
    pub missing_gaps: String,
}

/// Question answering, comparison and summarization over a [`DocumentLibrary`].
#[derive(Clone)]
pub struct ResearchAssistant {
    pub(crate) library: DocumentLibrary,
    pub(crate) aggregator: RetrievalAggregator,
    pub(crate) synthesizer: Arc<dyn Synthesizer>,
    pub(crate) summary_chunker: Chunker,
    pub(crate) config: AssistantConfig,
}

impl ResearchAssistant {
    pub fn new(
        library: DocumentLibrary,
        synthesizer: Arc<dyn Synthesizer>,
        config: AssistantConfig,
    ) -> Result<Self> {
        let pipeline = library.pipeline();
        let aggregator = RetrievalAggregator::new(
            pipeline.batcher().clone(),
            Arc::clone(pipeline.store()),
            config.retrieval.clone(),
        )?;
        let summary_chunker = Chunker::new(
            ChunkerConfig::for_summaries(),
            pipeline.chunker().tokenizer().clone(),
        )?;

        Ok(Self {
            library,
            aggregator,
            synthesizer,
            summary_chunker,
            config,
        })
    }

    #[must_use]
    pub const fn library(&self) -> &DocumentLibrary {
        &self.library
    }

    #[must_use]
    pub const fn aggregator(&self) -> &RetrievalAggregator {
        &self.aggregator
    }

    /// Answer `question` from the top chunks of `collections`.
    pub async fn answer_question(&self, question: &str, collections: &[String]) -> Result<Answer> {
        let context = self
            .aggregator
            .build_retrieval_context(question, collections)
            .await?;
        let prompt = answer_prompt(&context.context, question.trim());
        let answer = self.synthesizer.complete(&prompt).await?;
        Ok(Answer { answer, context })
    }

    /// One comparison across all `collections`, driven by a fixed question.
    pub async fn compare_collections(&self, collections: &[String]) -> Result<ComparisonResult> {
        let context = self
            .aggregator
            .build_retrieval_context(COMPARISON_QUESTION, collections)
            .await?;
        let output = self
            .synthesizer
            .complete(&collections_comparison_prompt(&context.context))
            .await?;
        let sections = parse_comparison(&output);

        Ok(ComparisonResult {
            title: "Multi-Document Comparison".to_string(),
            novel_insights: sections.novel_insights,
            similarities: sections.similarities,
            missing_gaps: sections.missing_gaps,
        })
    }

    /// Compare 2 to 5 ingested documents, each against all the others.
    ///
    /// Only the chunks of a paper that pass the novelty filter reach the synthesizer.
    /// Parsed sections are written back to each document's record.
    pub async fn compare_documents(&self, filenames: &[String]) -> Result<Vec<ComparisonResult>> {
        if !(MIN_COMPARED_DOCUMENTS..=MAX_COMPARED_DOCUMENTS).contains(&filenames.len()) {
            return Err(SearchError::InvalidRequest(format!(
                "compare needs between {MIN_COMPARED_DOCUMENTS} and {MAX_COMPARED_DOCUMENTS} documents, got {}",
                filenames.len()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = filenames.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(SearchError::InvalidRequest(format!(
                "{dup} listed more than once"
            )));
        }

        let records = self.library.resolve(filenames).await?;
        let mut papers = Vec::with_capacity(records.len());
        for record in &records {
            papers.push(self.load_chunks(record).await?);
        }

        let titles: Vec<String> = records.iter().map(|r| r.title.clone()).collect();
        let mut results = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let others: Vec<EmbeddedChunk> = papers
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .flat_map(|(_, chunks)| chunks.iter().cloned())
                .collect();
            let other_titles: Vec<String> = titles
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, t)| t.clone())
                .collect();

            let novelty = find_novel_chunks(&papers[i], &others, self.config.novelty_threshold)?;
            log::info!(
                "{}: {}/{} chunks novel against {} other papers",
                record.title,
                novelty.novel.len(),
                papers[i].len(),
                other_titles.len()
            );

            let result = if novelty.is_empty() {
                ComparisonResult {
                    title: record.title.clone(),
                    novel_insights: NO_NOVEL_CONTENT.to_string(),
                    ..ComparisonResult::default()
                }
            } else {
                let context = assemble_context(
                    novelty
                        .novel
                        .into_iter()
                        .map(|text| (record.collection_name.clone(), text)),
                    &self.config.retrieval,
                );
                let prompt =
                    paper_comparison_prompt(&record.title, &other_titles, &context.context);
                let sections = parse_comparison(&self.synthesizer.complete(&prompt).await?);
                ComparisonResult {
                    title: record.title.clone(),
                    novel_insights: sections.novel_insights,
                    similarities: sections.similarities,
                    missing_gaps: sections.missing_gaps,
                }
            };

            self.library
                .records()
                .save(DocumentRecord {
                    novel_insights: Some(result.novel_insights.clone()),
                    similarities: Some(result.similarities.clone()),
                    missing_gaps: Some(result.missing_gaps.clone()),
                    ..record
                })
                .await?;
            results.push(result);
        }

        Ok(results)
    }

    /// Every stored chunk of the record's collection, re-embedding it first when empty.
    async fn load_chunks(&self, record: &DocumentRecord) -> Result<Vec<EmbeddedChunk>> {
        let store = self.library.pipeline().store();
        let mut snapshot = store.get_all(&record.collection_name).await?;
        if snapshot.is_empty() {
            self.library.reembed(record).await?;
            snapshot = store.get_all(&record.collection_name).await?;
            if snapshot.is_empty() {
                return Err(SearchError::NothingEmbedded(record.collection_name.clone()));
            }
        }
        Ok(snapshot.into_embedded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestPipeline;
    use crate::records::{JsonRecordStore, RecordStore};
    use crate::test_support::{keyword_batcher, seed_collection, RecordingSynthesizer};
    use pretty_assertions::assert_eq;
    use scholar_vector_store::{LocalVectorStore, VectorStore};

    const REPLY: &str = concat!(
        "Novel Contributions:\nNew kernel.\n",
        "Similarities:\nBoth attend.\n",
        "Missing Gaps:\nNo ablation."
    );

    struct Fixture {
        assistant: ResearchAssistant,
        synth: Arc<RecordingSynthesizer>,
        store: Arc<dyn VectorStore>,
        records: Arc<JsonRecordStore>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
        let records = Arc::new(JsonRecordStore::in_memory());
        let pipeline = IngestPipeline::new(
            Chunker::lexical(ChunkerConfig::for_embeddings()).unwrap(),
            keyword_batcher(),
            Arc::clone(&store),
        );
        let library = DocumentLibrary::new(pipeline, records.clone());
        let synth = Arc::new(RecordingSynthesizer::new(REPLY));
        let assistant =
            ResearchAssistant::new(library, synth.clone(), AssistantConfig::default()).unwrap();
        Fixture {
            assistant,
            synth,
            store,
            records,
        }
    }

    fn record(
        filename: &str,
        title: &str,
        collection: &str,
        full_text: Option<&str>,
    ) -> DocumentRecord {
        DocumentRecord {
            full_text: full_text.map(str::to_string),
            ..DocumentRecord::new(filename, title, collection)
        }
    }

    #[tokio::test]
    async fn answers_from_retrieved_context() {
        let fx = fixture();
        seed_collection(&*fx.store, "paper_a", &["Method A works.", "Method B fails."]).await;

        let answer = fx
            .assistant
            .answer_question("Does A work?", &["paper_a".to_string()])
            .await
            .unwrap();

        assert_eq!(answer.answer, REPLY);
        assert_eq!(answer.context.sources[0].text, "Method A works.");
        let prompts = fx.synth.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Question:\nDoes A work?"));
        assert!(prompts[0].contains("Method A works.\n\n---\n\nMethod B fails."));
    }

    #[tokio::test]
    async fn compares_collections_with_parsed_sections() {
        let fx = fixture();
        seed_collection(&*fx.store, "one", &["A here."]).await;
        seed_collection(&*fx.store, "two", &["B there."]).await;

        let result = fx
            .assistant
            .compare_collections(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(result.novel_insights, "New kernel.");
        assert_eq!(result.similarities, "Both attend.");
        assert_eq!(result.missing_gaps, "No ablation.");
    }

    #[tokio::test]
    async fn compare_documents_filters_shared_chunks_and_saves_results() {
        let fx = fixture();
        seed_collection(&*fx.store, "col_a", &["Shared A idea.", "Unique C idea."]).await;
        seed_collection(&*fx.store, "col_b", &["Shared A again."]).await;
        fx.records
            .save(record("a.txt", "Paper A", "col_a", None))
            .await
            .unwrap();
        fx.records
            .save(record("b.txt", "Paper B", "col_b", None))
            .await
            .unwrap();

        let results = fx
            .assistant
            .compare_documents(&["a.txt".to_string(), "b.txt".to_string()])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Paper A");
        assert_eq!(results[0].novel_insights, "New kernel.");
        // every chunk of B is covered by A
        assert_eq!(results[1].novel_insights, NO_NOVEL_CONTENT);
        assert_eq!(results[1].similarities, "");

        let prompts = fx.synth.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Unique C idea."));
        assert!(!prompts[0].contains("Shared A idea."));
        assert!(prompts[0].contains("against other papers titled: Paper B."));

        let saved = fx.records.find_by_filename("a.txt").await.unwrap().unwrap();
        assert_eq!(saved.missing_gaps.as_deref(), Some("No ablation."));
    }

    #[tokio::test]
    async fn empty_collection_is_reembedded_from_cached_text() {
        let fx = fixture();
        seed_collection(&*fx.store, "col_a", &["Topic A only."]).await;
        fx.records
            .save(record("a.txt", "Paper A", "col_a", None))
            .await
            .unwrap();
        fx.records
            .save(record("b.txt", "Paper B", "col_b", Some("Topic D only. More on D.")))
            .await
            .unwrap();

        let results = fx
            .assistant
            .compare_documents(&["a.txt".to_string(), "b.txt".to_string()])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(!fx.store.get_all("col_b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_collection_without_text_fails() {
        let fx = fixture();
        seed_collection(&*fx.store, "col_a", &["Topic A only."]).await;
        fx.records
            .save(record("a.txt", "Paper A", "col_a", None))
            .await
            .unwrap();
        fx.records
            .save(record("b.txt", "Paper B", "col_b", None))
            .await
            .unwrap();

        let err = fx
            .assistant
            .compare_documents(&["a.txt".to_string(), "b.txt".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest(msg) if msg.contains("col_b")));
    }

    #[tokio::test]
    async fn compare_documents_validates_count() {
        let fx = fixture();
        let one = vec!["a.txt".to_string()];
        assert!(matches!(
            fx.assistant.compare_documents(&one).await,
            Err(SearchError::InvalidRequest(_))
        ));

        let six: Vec<String> = (0..6).map(|i| format!("{i}.txt")).collect();
        assert!(fx.assistant.compare_documents(&six).await.is_err());

        let dup = vec!["a.txt".to_string(), "a.txt".to_string()];
        assert!(fx.assistant.compare_documents(&dup).await.is_err());
    }
}
