//! WatsonX AI client implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use ragsum_core::{Error, GenerationConfig, GenerationResult, LLMProvider, Result};

use crate::config::WatsonxConfig;

/// WatsonX AI client
pub struct WatsonxClient {
    config: WatsonxConfig,
    access_token: Option<String>,
    client: Client,
    current_model: String,
}

#[derive(Serialize)]
struct TokenRequest {
    grant_type: String,
    apikey: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct GenerationParams {
    decoding_method: String,
    max_new_tokens: u32,
    min_new_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    top_k: u32,
    top_p: f32,
    repetition_penalty: f32,
    stop_sequences: Vec<String>,
}

#[derive(Serialize)]
struct GenerationRequest {
    input: String,
    parameters: GenerationParams,
    model_id: String,
    project_id: String,
}

#[derive(Deserialize)]
struct GenerationResults {
    generated_text: String,
    #[serde(default)]
    generated_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct GenerationData {
    results: Vec<GenerationResults>,
}

impl WatsonxClient {
    /// Model constants
    pub const GRANITE_4_H_SMALL: &'static str = "ibm/granite-4-h-small";
    pub const GRANITE_3_3_8B_INSTRUCT: &'static str = "ibm/granite-3-3-8b-instruct";

    /// Create a new WatsonX client from configuration
    pub fn new(config: WatsonxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Backend(e.to_string()))?;

        let current_model = config
            .model_id
            .clone()
            .unwrap_or_else(|| Self::GRANITE_3_3_8B_INSTRUCT.to_string());

        Ok(Self {
            config,
            access_token: None,
            client,
            current_model,
        })
    }

    /// Create a new WatsonX client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = WatsonxConfig::from_env()?;
        Self::new(config)
    }

    /// Set the model to use for generation
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.current_model = model_id.into();
        self
    }

    /// Perform the actual generation request
    async fn perform_generation(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let access_token = self
            .access_token
            .as_ref()
            .ok_or_else(|| Error::Backend("Not authenticated. Call connect() first.".to_string()))?;

        let params = GenerationParams {
            decoding_method: if config.temperature.is_some() { "sample" } else { "greedy" }.to_string(),
            max_new_tokens: config.max_tokens,
            min_new_tokens: 1,
            temperature: config.temperature,
            top_k: config.top_k.unwrap_or(50),
            top_p: config.top_p.unwrap_or(1.0),
            repetition_penalty: 1.1,
            stop_sequences: config.stop_sequences.clone(),
        };

        let request_body = GenerationRequest {
            input: prompt.to_string(),
            parameters: params,
            model_id: config.model_id.clone(),
            project_id: self.config.project_id.clone(),
        };

        let url = format!(
            "{}/ml/v1/text/generation_stream?version=2023-05-29",
            self.config.api_url
        );

        debug!(model = %config.model_id, prompt_chars = prompt.len(), "sending generation request");

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Backend(format!(
                "WatsonX API request failed with status {}: {}",
                status, error_text
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        let (text, tokens_used) = parse_sse_body(&response_text);

        Ok(GenerationResult {
            text: text.trim().to_string(),
            model_id: config.model_id.clone(),
            tokens_used,
        })
    }
}

/// Collect generated text from a Server-Sent Events (SSE) body.
///
/// Returns the concatenated text and the summed token count when the service
/// reports one. Lines that are not valid generation payloads are skipped.
pub(crate) fn parse_sse_body(body: &str) -> (String, Option<u32>) {
    let mut answer = String::new();
    let mut tokens: Option<u32> = None;

    for line in body.lines() {
        let Some(json_data) = line.strip_prefix("data:") else {
            continue;
        };
        let json_data = json_data.trim();

        if json_data.is_empty() || json_data == "[DONE]" {
            continue;
        }

        match serde_json::from_str::<GenerationData>(json_data) {
            Ok(data) => {
                if let Some(result) = data.results.first() {
                    answer.push_str(&result.generated_text);
                    if let Some(count) = result.generated_token_count {
                        tokens = Some(tokens.unwrap_or(0) + count);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, line = json_data, "failed to parse response line");
            }
        }
    }

    (answer, tokens)
}

/// Extract the bearer token from an IAM identity response
pub(crate) fn parse_token_response(body: &str) -> Result<String> {
    serde_json::from_str::<TokenResponse>(body)
        .map(|token| token.access_token)
        .map_err(|e| Error::Backend(format!("Malformed IAM token response: {}", e)))
}

#[async_trait]
impl LLMProvider for WatsonxClient {
    async fn connect(&mut self) -> Result<()> {
        let token_request = TokenRequest {
            grant_type: "urn:ibm:params:oauth:grant-type:apikey".to_string(),
            apikey: self.config.api_key.clone(),
        };

        let url = format!("https://{}/identity/token", self.config.iam_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&token_request)
            .send()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Backend(format!(
                "Authentication failed: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        self.access_token = Some(parse_token_response(&body)?);
        debug!(iam_url = %self.config.iam_url, "watsonx access token acquired");

        Ok(())
    }

    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        // Deadline is enforced by the caller via `config.timeout`
        self.perform_generation(prompt, config).await
    }

    fn model_id(&self) -> &str {
        &self.current_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_body_concatenates_chunks() {
        let body = "id: 1\nevent: message\ndata: {\"results\":[{\"generated_text\":\"Histogram equalization \",\"generated_token_count\":3}]}\n\n\
                    id: 2\nevent: message\ndata: {\"results\":[{\"generated_text\":\"spreads intensities.\",\"generated_token_count\":4}]}\n\n\
                    data: [DONE]\n";
        let (text, tokens) = parse_sse_body(body);
        assert_eq!(text, "Histogram equalization spreads intensities.");
        assert_eq!(tokens, Some(7));
    }

    #[test]
    fn test_parse_sse_body_skips_garbage() {
        let body = "data: not json\ndata: {\"results\":[{\"generated_text\":\"ok\"}]}\n";
        let (text, tokens) = parse_sse_body(body);
        assert_eq!(text, "ok");
        assert_eq!(tokens, None);
    }

    #[test]
    fn test_parse_sse_body_empty_is_empty_answer() {
        let (text, _) = parse_sse_body("");
        assert!(text.is_empty());
    }

    #[test]
    fn test_parse_token_response() {
        let token = parse_token_response(r#"{"access_token":"abc","expires_in":3600}"#).unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn test_malformed_token_response_is_backend_error() {
        let err = parse_token_response("<html>gateway error</html>").unwrap_err();
        assert!(matches!(err, Error::Backend(ref msg) if msg.contains("IAM token")));

        let err = parse_token_response(r#"{"token_type":"Bearer"}"#).unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[tokio::test]
    async fn test_generate_without_connect_is_backend_error() {
        let config = WatsonxConfig::new("test_key".to_string(), "test_project".to_string());
        let client = WatsonxClient::new(config).unwrap();

        let err = client
            .generate_with_config("hello", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(ref msg) if msg.contains("Not authenticated")));
    }
}
