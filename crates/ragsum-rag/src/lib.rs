//! Retrieval-augmented query pipeline for ragsum
//!
//! This crate provides the query pipeline (retriever, context assembler, summarizer) and
//! the default collaborators it runs against: a directory document loader, a chunker, a
//! feature-hashing embedder and a persisted local vector store.

mod chunker;
mod context;
mod embedding;
mod loader;
mod pipeline;
mod retriever;
mod service;
mod summarizer;
mod vector_store;


pub use chunker::TextChunker;
pub use context::{assemble, ContextAssembler, FRAGMENT_SEPARATOR};
pub use embedding::{cosine_similarity, HashEmbedder, DEFAULT_EMBEDDING_DIMENSION};
pub use loader::DirectoryLoader;
pub use pipeline::{PipelineRun, PipelineState, QueryPipeline};
pub use retriever::VectorRetriever;
pub use service::{open_index, DefaultPipeline, IndexSetup, RagService};
pub use summarizer::{context_prompt, fallback_prompt, LlmSummarizer};
pub use vector_store::{LocalVectorStore, INDEX_FILE_NAME, INDEX_FORMAT_VERSION};

// Re-export core types for convenience
pub use ragsum_core::{
    AssembledContext, Answer, Document, DocumentLoader, Embedder, Error, PipelineConfig, Query,
    Result, RetrievedFragment, Retriever, SearchConfig, SearchResult, Summarizer,
    VectorDocument, VectorStore,
};
