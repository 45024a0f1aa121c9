//! Pipeline configuration
//!
//! The values below are the documented constants for everything the query
//! core leaves to the implementer: relevance threshold, context budget and
//! chunk geometry. Each can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{Error, Result};

/// Fragments requested per query when the caller does not say
pub const DEFAULT_TOP_K: usize = 3;

/// Character budget for the assembled context
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

/// Minimum cosine similarity for a fragment to count as relevant
pub const DEFAULT_MIN_RELEVANCE: f32 = 0.05;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_STORAGE_PATH: &str = "vector_store";

/// Configuration for loading, indexing and querying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub storage_path: PathBuf,
    pub top_k: usize,
    pub max_context_chars: usize,
    pub min_relevance: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            min_relevance: DEFAULT_MIN_RELEVANCE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables (and `.env`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("RAGSUM_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("RAGSUM_STORE_PATH") {
            config.storage_path = PathBuf::from(path);
        }
        if let Some(value) = parse_var(&lookup, "RAGSUM_TOP_K")? {
            config.top_k = value;
        }
        if let Some(value) = parse_var(&lookup, "RAGSUM_MAX_CONTEXT_CHARS")? {
            config.max_context_chars = value;
        }
        if let Some(value) = parse_var(&lookup, "RAGSUM_MIN_RELEVANCE")? {
            config.min_relevance = value;
        }
        if let Some(value) = parse_var(&lookup, "RAGSUM_CHUNK_SIZE")? {
            config.chunk_size = value;
        }
        if let Some(value) = parse_var(&lookup, "RAGSUM_CHUNK_OVERLAP")? {
            config.chunk_overlap = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the values describe a usable pipeline
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be at least 1".to_string()));
        }
        if self.max_context_chars == 0 {
            return Err(Error::Configuration(
                "max_context_chars must be at least 1".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.min_relevance) {
            return Err(Error::Configuration(format!(
                "min_relevance must be within [-1, 1], got {}",
                self.min_relevance
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be at least 1".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::Configuration(format!("{} has an invalid value: {:?}", key, raw))
        }),
    }
}
