//! WatsonX configuration

use serde::{Deserialize, Serialize};
use std::env;
use ragsum_core::{Error, Result};

pub const DEFAULT_IAM_URL: &str = "iam.cloud.ibm.com";
pub const DEFAULT_API_URL: &str = "https://us-south.ml.cloud.ibm.com";

/// Configuration for WatsonX AI client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatsonxConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub project_id: String,
    pub iam_url: String,
    pub api_url: String,
    pub model_id: Option<String>,
}

impl WatsonxConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("WATSONX_API_KEY")
            .or_else(|| lookup("API_KEY"))
            .ok_or_else(|| Error::Configuration(
                "WATSONX_API_KEY or API_KEY environment variable not found".to_string()
            ))?;

        let project_id = lookup("WATSONX_PROJECT_ID")
            .or_else(|| lookup("PROJECT_ID"))
            .ok_or_else(|| Error::Configuration(
                "WATSONX_PROJECT_ID or PROJECT_ID environment variable not found".to_string()
            ))?;

        let iam_url = lookup("IAM_IBM_CLOUD_URL")
            .unwrap_or_else(|| DEFAULT_IAM_URL.to_string());

        let api_url = lookup("WATSONX_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            api_key,
            project_id,
            iam_url,
            api_url,
            model_id: lookup("WATSONX_MODEL_ID"),
        })
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String, project_id: String) -> Self {
        Self {
            api_key,
            project_id,
            iam_url: DEFAULT_IAM_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            model_id: None,
        }
    }
}
