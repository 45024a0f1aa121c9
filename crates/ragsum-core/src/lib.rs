//! Core traits and types for ragsum
//!
//! This crate defines the fundamental traits and types used across the ragsum system:
//! the query/fragment/context/answer data model, the retriever and summarizer seams of
//! the query pipeline, and the collaborator interfaces for LLM providers, vector stores,
//! embedders and document loaders.

pub mod config;
pub mod document;
pub mod error;
pub mod llm;
pub mod rag;
pub mod vector_store;

pub use config::PipelineConfig;
pub use document::{Document, DocumentLoader};
pub use error::{Error, Result};
pub use llm::{GenerationConfig, GenerationResult, LLMProvider};
pub use rag::{AssembledContext, Answer, Query, RetrievedFragment, Retriever, Summarizer};
pub use vector_store::{Embedder, SearchConfig, SearchResult, VectorDocument, VectorStore};
