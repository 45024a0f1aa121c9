//! Local persisted vector store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use ragsum_core::{
    Document, Embedder, Error, Result, SearchConfig, SearchResult, VectorDocument, VectorStore,
};

use crate::chunker::TextChunker;
use crate::embedding::{cosine_similarity, HashEmbedder};

/// File written inside the storage directory
pub const INDEX_FILE_NAME: &str = "index.json";

/// Bumped whenever the on-disk layout changes
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: String,
    source: String,
    content: String,
    metadata: serde_json::Value,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    embedder: String,
    dimension: usize,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

/// Brute-force cosine-similarity index held in memory
///
/// The store is populated once, by either [`LocalVectorStore::load`] or
/// [`LocalVectorStore::build_from_documents`], and is read-only afterwards.
/// Share it behind an `Arc` for concurrent queries.
pub struct LocalVectorStore {
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    entries: Vec<IndexEntry>,
    built_at: Option<DateTime<Utc>>,
    loaded: bool,
}

impl LocalVectorStore {
    /// Create an empty, unloaded store
    pub fn new(embedder: Arc<dyn Embedder>, chunker: TextChunker) -> Self {
        Self {
            embedder,
            chunker,
            entries: Vec::new(),
            built_at: None,
            loaded: false,
        }
    }

    pub fn index_file(storage_path: &Path) -> PathBuf {
        storage_path.join(INDEX_FILE_NAME)
    }

    /// Chunk and embed `documents`, replacing any previous contents
    pub fn build_from_documents(&mut self, documents: &[Document]) -> Result<usize> {
        let fragments = self.chunker.chunk_documents(documents);
        debug!(documents = documents.len(), fragments = fragments.len(), "chunked documents");
        self.build_from_fragments(fragments)
    }

    /// Embed pre-chunked fragments, replacing any previous contents
    pub fn build_from_fragments(&mut self, fragments: Vec<VectorDocument>) -> Result<usize> {
        self.entries = fragments
            .into_iter()
            .map(|fragment| IndexEntry {
                embedding: self.embedder.embed(&fragment.content),
                id: fragment.id,
                source: fragment.source,
                content: fragment.content,
                metadata: fragment.metadata,
            })
            .collect();
        self.built_at = Some(Utc::now());
        self.loaded = true;

        info!(entries = self.entries.len(), embedder = self.embedder.name(), "built vector index");
        Ok(self.entries.len())
    }

    /// Read a previously saved index from `storage_path`
    pub async fn load(&mut self, storage_path: &Path) -> Result<()> {
        let file = Self::index_file(storage_path);
        let raw = match tokio::fs::read_to_string(&file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::IndexUnavailable(format!(
                    "no index found at {}",
                    file.display()
                )));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let data: IndexFile = serde_json::from_str(&raw)
            .map_err(|e| Error::VectorStore(format!("corrupt index {}: {}", file.display(), e)))?;

        if data.version != INDEX_FORMAT_VERSION {
            return Err(Error::VectorStore(format!(
                "unsupported index version {} (expected {})",
                data.version, INDEX_FORMAT_VERSION
            )));
        }
        if data.embedder != self.embedder.name() || data.dimension != self.embedder.dimension() {
            return Err(Error::VectorStore(format!(
                "index was built with {} ({} dims), current embedder is {} ({} dims)",
                data.embedder,
                data.dimension,
                self.embedder.name(),
                self.embedder.dimension()
            )));
        }
        if let Some(bad) = data.entries.iter().find(|e| e.embedding.len() != data.dimension) {
            return Err(Error::VectorStore(format!(
                "entry {} has {} dims, expected {}",
                bad.id,
                bad.embedding.len(),
                data.dimension
            )));
        }

        self.entries = data.entries;
        self.built_at = Some(data.built_at);
        self.loaded = true;

        info!(path = %file.display(), entries = self.entries.len(), "loaded vector index");
        Ok(())
    }

    /// Write the index to `storage_path`, creating the directory if needed
    pub async fn save(&self, storage_path: &Path) -> Result<PathBuf> {
        if !self.loaded {
            return Err(Error::IndexUnavailable("nothing to save: index not built".to_string()));
        }

        let data = IndexFile {
            version: INDEX_FORMAT_VERSION,
            embedder: self.embedder.name().to_string(),
            dimension: self.embedder.dimension(),
            built_at: self.built_at.unwrap_or_else(Utc::now),
            entries: self.entries.clone(),
        };

        tokio::fs::create_dir_all(storage_path).await?;
        let file = Self::index_file(storage_path);
        let content = serde_json::to_string(&data)?;
        tokio::fs::write(&file, content).await?;

        info!(path = %file.display(), entries = self.entries.len(), "saved vector index");
        Ok(file)
    }

    /// Summary of the loaded index
    pub fn stats(&self) -> serde_json::Value {
        let sources: BTreeSet<&str> = self.entries.iter().map(|e| e.source.as_str()).collect();
        json!({
            "loaded": self.loaded,
            "entries": self.entries.len(),
            "sources": sources.len(),
            "embedder": self.embedder.name(),
            "dimension": self.embedder.dimension(),
            "built_at": self.built_at.map(|t| t.to_rfc3339()),
        })
    }
}

impl Default for LocalVectorStore {
    fn default() -> Self {
        Self::new(Arc::new(HashEmbedder::default()), TextChunker::default())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn search(&self, query: &str, config: &SearchConfig) -> Result<SearchResult> {
        if !self.loaded {
            return Err(Error::IndexUnavailable("vector index not loaded".to_string()));
        }

        let query_embedding = self.embedder.embed(query);

        let mut results: Vec<VectorDocument> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query_embedding, &entry.embedding), entry))
            .filter(|(score, _)| match config.score_threshold {
                Some(threshold) => *score >= threshold,
                None => true,
            })
            .map(|(score, entry)| VectorDocument {
                id: entry.id.clone(),
                source: entry.source.clone(),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
                score: Some(score),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
        });
        results.truncate(config.top_k);

        let total = results.len();

        Ok(SearchResult {
            documents: results,
            total,
        })
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}
