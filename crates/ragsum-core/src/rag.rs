//! Retrieval-augmented query types and the retriever/summarizer traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// A non-empty question supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query(String);

impl Query {
    /// Create a query, rejecting empty or whitespace-only text
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".to_string()));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fragment returned by a [`Retriever`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedFragment {
    pub source_id: String,
    pub text: String,
    pub score: f32,
}

/// Whole fragments joined in rank order, bounded by a character budget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    /// Source ids of the fragments that made it into `text`, in order
    pub sources: Vec<String>,
    /// Fragments left out because the budget ran out
    pub dropped: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length of the context in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Text produced by a [`Summarizer`]; may be empty, never absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
}

impl Answer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Looks up the fragments most relevant to a query
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return at most `top_k` fragments ordered by descending score.
    ///
    /// Fails with [`Error::InvalidArgument`] when `top_k` is zero and with
    /// [`Error::IndexUnavailable`] when the index was never loaded. An empty
    /// index or no sufficiently relevant fragment is an empty `Ok`.
    async fn retrieve(&self, query: &Query, top_k: usize) -> Result<Vec<RetrievedFragment>>;
}

/// Produces a natural-language answer from a query and its context
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `context` for `query`.
    ///
    /// An empty context is not an error: implementations answer from the
    /// query alone. Backend failures surface as [`Error::Backend`].
    async fn summarize(&self, query: &Query, context: &AssembledContext) -> Result<Answer>;
}
