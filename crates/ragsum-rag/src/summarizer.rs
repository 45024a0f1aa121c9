//! LLM-backed summarizer

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

use ragsum_core::{
    AssembledContext, Answer, Error, GenerationConfig, LLMProvider, Query, Result, Summarizer,
};

/// Summarizer that sends one prompt per call to an [`LLMProvider`]
pub struct LlmSummarizer<L: LLMProvider> {
    provider: Arc<L>,
    config: GenerationConfig,
}

impl<L: LLMProvider> LlmSummarizer<L> {
    /// Create a summarizer using the provider's model and default generation settings
    pub fn new(provider: Arc<L>) -> Self {
        let config = GenerationConfig {
            model_id: provider.model_id().to_string(),
            ..Default::default()
        };
        Self { provider, config }
    }

    pub fn with_config(provider: Arc<L>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }
}

/// Prompt used when retrieval produced context
pub fn context_prompt(query: &Query, context: &AssembledContext) -> String {
    format!(
        "You are a helpful assistant. Using only the context below, answer the question \
         with a concise summary. If the context does not contain the answer, say so.\n\n\
         Question: {}\n\nContext:\n{}\n\nSummary:",
        query, context.text
    )
}

/// Prompt used when retrieval found nothing relevant
pub fn fallback_prompt(query: &Query) -> String {
    format!(
        "You are a helpful assistant. No supporting documents were found for the \
         question below. Give a brief best-effort answer from general knowledge and \
         state that it is not based on the provided documents.\n\n\
         Question: {}\n\nAnswer:",
        query
    )
}

#[async_trait]
impl<L: LLMProvider + 'static> Summarizer for LlmSummarizer<L> {
    async fn summarize(&self, query: &Query, context: &AssembledContext) -> Result<Answer> {
        let prompt = if context.is_empty() {
            debug!("empty context, using query-only fallback prompt");
            fallback_prompt(query)
        } else {
            context_prompt(query, context)
        };

        let generation = self.provider.generate_with_config(&prompt, &self.config);
        let result = match timeout(self.config.timeout, generation).await {
            Ok(Ok(result)) => result,
            Ok(Err(Error::Backend(msg))) => return Err(Error::Backend(msg)),
            Ok(Err(other)) => return Err(Error::Backend(other.to_string())),
            Err(_) => {
                return Err(Error::Backend(format!(
                    "generation timed out after {:?}",
                    self.config.timeout
                )));
            }
        };

        debug!(
            model = %result.model_id,
            tokens = ?result.tokens_used,
            chars = result.text.len(),
            "summary generated"
        );
        Ok(Answer::new(result.text.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragsum_core::GenerationResult;
    use std::sync::Mutex;

    /// Provider that records prompts and replies with a fixed outcome
    struct RecordingProvider {
        reply: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        async fn generate_with_config(
            &self,
            prompt: &str,
            config: &GenerationConfig,
        ) -> Result<GenerationResult> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(GenerationResult {
                    text: text.clone(),
                    model_id: config.model_id.clone(),
                    tokens_used: None,
                }),
                Err(msg) => Err(Error::Serialization(msg.clone())),
            }
        }

        fn model_id(&self) -> &str {
            "test/model"
        }
    }

    fn query() -> Query {
        Query::new("How does histogram equalization improve image contrast?").unwrap()
    }

    #[tokio::test]
    async fn test_context_prompt_includes_context() {
        let provider = Arc::new(RecordingProvider::replying("  It spreads intensities.  "));
        let summarizer = LlmSummarizer::new(provider.clone());
        let context = AssembledContext {
            text: "Equalization flattens the histogram.".to_string(),
            sources: vec!["notes.txt#0".to_string()],
            dropped: 0,
        };

        let answer = summarizer.summarize(&query(), &context).await.unwrap();
        assert_eq!(answer.text, "It spreads intensities.");

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Equalization flattens the histogram."));
        assert!(prompts[0].contains(query().as_str()));
    }

    #[tokio::test]
    async fn test_empty_context_uses_fallback() {
        let provider = Arc::new(RecordingProvider::replying("Best effort."));
        let summarizer = LlmSummarizer::new(provider.clone());

        let answer = summarizer
            .summarize(&query(), &AssembledContext::default())
            .await
            .unwrap();
        assert_eq!(answer.text, "Best effort.");
        assert_eq!(provider.prompts.lock().unwrap()[0], fallback_prompt(&query()));
    }

    #[tokio::test]
    async fn test_empty_generation_is_empty_answer() {
        let provider = Arc::new(RecordingProvider::replying(""));
        let summarizer = LlmSummarizer::new(provider);

        let answer = summarizer
            .summarize(&query(), &AssembledContext::default())
            .await
            .unwrap();
        assert_eq!(answer, Answer::default());
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_backend_error() {
        let provider = Arc::new(RecordingProvider::failing("quota exceeded"));
        let summarizer = LlmSummarizer::new(provider);

        let err = summarizer
            .summarize(&query(), &AssembledContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(ref msg) if msg.contains("quota exceeded")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_as_backend_error() {
        struct SlowProvider;

        #[async_trait]
        impl LLMProvider for SlowProvider {
            async fn connect(&mut self) -> Result<()> {
                Ok(())
            }

            async fn generate_with_config(
                &self,
                _prompt: &str,
                config: &GenerationConfig,
            ) -> Result<GenerationResult> {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(GenerationResult {
                    text: "late".to_string(),
                    model_id: config.model_id.clone(),
                    tokens_used: None,
                })
            }

            fn model_id(&self) -> &str {
                "slow/model"
            }
        }

        let config = GenerationConfig {
            timeout: std::time::Duration::from_secs(5),
            ..Default::default()
        };
        let summarizer = LlmSummarizer::with_config(Arc::new(SlowProvider), config);

        let err = summarizer
            .summarize(&query(), &AssembledContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(ref msg) if msg.contains("timed out")));
    }

    #[test]
    fn test_summarizer_uses_provider_model() {
        let summarizer = LlmSummarizer::new(Arc::new(RecordingProvider::replying("x")));
        assert_eq!(summarizer.config.model_id, "test/model");
    }
}
