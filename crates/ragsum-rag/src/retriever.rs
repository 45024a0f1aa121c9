//! Vector-store backed retriever

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use ragsum_core::{
    config::DEFAULT_MIN_RELEVANCE, Error, Query, Result, RetrievedFragment, Retriever,
    SearchConfig, VectorStore,
};

/// Retriever that queries a shared, read-only [`VectorStore`]
pub struct VectorRetriever<V: VectorStore> {
    store: Arc<V>,
    min_relevance: f32,
}

impl<V: VectorStore> VectorRetriever<V> {
    pub fn new(store: Arc<V>) -> Self {
        Self {
            store,
            min_relevance: DEFAULT_MIN_RELEVANCE,
        }
    }

    /// Override the minimum score a fragment needs to be returned
    pub fn with_min_relevance(mut self, min_relevance: f32) -> Self {
        self.min_relevance = min_relevance;
        self
    }
}

impl<V: VectorStore> Clone for VectorRetriever<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            min_relevance: self.min_relevance,
        }
    }
}

#[async_trait]
impl<V: VectorStore + 'static> Retriever for VectorRetriever<V> {
    async fn retrieve(&self, query: &Query, top_k: usize) -> Result<Vec<RetrievedFragment>> {
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be at least 1".to_string()));
        }
        if !self.store.is_loaded() {
            return Err(Error::IndexUnavailable(
                "vector index was not loaded before querying".to_string(),
            ));
        }

        let config = SearchConfig {
            top_k,
            score_threshold: Some(self.min_relevance),
        };
        let result = self.store.search(query.as_str(), &config).await?;

        let mut fragments: Vec<RetrievedFragment> = result
            .documents
            .into_iter()
            .filter_map(|doc| {
                let score = doc.score?;
                (score >= self.min_relevance).then(|| RetrievedFragment {
                    source_id: doc.id,
                    text: doc.content,
                    score,
                })
            })
            .collect();

        // stores are expected to rank already; the order is part of our contract
        fragments.sort_by(|a, b| b.score.total_cmp(&a.score));
        fragments.truncate(top_k);

        debug!(top_k, returned = fragments.len(), "retrieved fragments");
        Ok(fragments)
    }
}
