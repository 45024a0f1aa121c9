//! WatsonX AI integration for ragsum
//!
//! This crate provides the WatsonX implementation of the LLMProvider trait used as the
//! summarization backend of the query pipeline.

mod client;
mod config;

#[cfg(test)]
mod tests;

pub use client::WatsonxClient;
pub use config::{WatsonxConfig, DEFAULT_API_URL, DEFAULT_IAM_URL};

// Re-export core types for convenience
pub use ragsum_core::{
    LLMProvider, GenerationConfig, GenerationResult, Error, Result,
};
