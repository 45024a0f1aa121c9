//! Document loader trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

/// A unit of source text loaded from disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: Option<String>,
    pub metadata: serde_json::Value,
}

/// Trait for document loaders
///
/// A loader is responsible for its own failure behavior (missing path,
/// unreadable files); the query pipeline never calls it directly.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load every supported document found under `path`
    async fn load_all_documents(&self, path: &Path) -> Result<Vec<Document>>;
}
