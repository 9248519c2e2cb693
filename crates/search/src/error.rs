use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] scholar_vector_store::VectorStoreError),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] scholar_chunker::ChunkerError),

    #[error("Empty query")]
    EmptyQuery,

    #[error("No collections given")]
    NoCollections,

    #[error("No context found in collections: {0}")]
    NoContext(String),

    #[error("Document produced no embeddable chunks")]
    NoValidChunks,

    #[error("No chunks could be embedded for collection {0}")]
    NothingEmbedded(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Document not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Synthesis provider returned HTTP {status}: {body}")]
    SynthesisProvider { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
