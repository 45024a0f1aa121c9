//! Vector store and embedder traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A fragment stored in (or returned from) the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDocument {
    pub id: String,
    pub source: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub score: Option<f32>,
}

/// Search result from vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub documents: Vec<VectorDocument>,
    pub total: usize,
}

/// Configuration for vector search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
    pub score_threshold: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: crate::config::DEFAULT_TOP_K,
            score_threshold: Some(crate::config::DEFAULT_MIN_RELEVANCE),
        }
    }
}

/// Turns text into a fixed-size vector
pub trait Embedder: Send + Sync {
    /// Stable name recorded next to a persisted index
    fn name(&self) -> &str;

    /// Length of every vector returned by [`Embedder::embed`]
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;
}

/// A loaded, queryable similarity index
///
/// Implementations are read-only once loaded and must tolerate concurrent
/// searches through a shared reference.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Search for fragments similar to `query`, best first
    async fn search(&self, query: &str, config: &SearchConfig) -> Result<SearchResult>;

    /// Get the total number of stored fragments
    async fn count(&self) -> Result<usize>;

    /// Whether the index has been loaded or built
    fn is_loaded(&self) -> bool;
}
