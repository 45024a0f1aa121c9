//! Process-level wiring: index setup, pipeline construction, shutdown

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use ragsum_core::{DocumentLoader, LLMProvider, PipelineConfig, Result, VectorStore};

use crate::chunker::TextChunker;
use crate::context::ContextAssembler;
use crate::embedding::HashEmbedder;
use crate::loader::DirectoryLoader;
use crate::pipeline::QueryPipeline;
use crate::retriever::VectorRetriever;
use crate::summarizer::LlmSummarizer;
use crate::vector_store::LocalVectorStore;

/// How the vector index is obtained at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSetup {
    /// Read an index saved by an earlier build
    LoadExisting { storage_path: PathBuf },
    /// Load documents and build a fresh index, saving it when a path is given
    BuildFromDocuments {
        data_dir: PathBuf,
        storage_path: Option<PathBuf>,
    },
}

impl IndexSetup {
    pub fn load(config: &PipelineConfig) -> Self {
        IndexSetup::LoadExisting {
            storage_path: config.storage_path.clone(),
        }
    }

    pub fn build(config: &PipelineConfig) -> Self {
        IndexSetup::BuildFromDocuments {
            data_dir: config.data_dir.clone(),
            storage_path: Some(config.storage_path.clone()),
        }
    }
}

/// Create the shared, read-only index handle described by `setup`
pub async fn open_index(
    setup: &IndexSetup,
    config: &PipelineConfig,
    loader: &dyn DocumentLoader,
) -> Result<Arc<LocalVectorStore>> {
    let mut store = LocalVectorStore::new(
        Arc::new(HashEmbedder::default()),
        TextChunker::from_config(config)?,
    );

    match setup {
        IndexSetup::LoadExisting { storage_path } => {
            store.load(storage_path).await?;
        }
        IndexSetup::BuildFromDocuments {
            data_dir,
            storage_path,
        } => {
            let documents = loader.load_all_documents(data_dir).await?;
            store.build_from_documents(&documents)?;
            if let Some(path) = storage_path {
                store.save(path).await?;
            }
        }
    }

    Ok(Arc::new(store))
}

pub type DefaultPipeline<L> = QueryPipeline<VectorRetriever<LocalVectorStore>, LlmSummarizer<L>>;

/// Owns the long-lived parts of a running system
pub struct RagService<L: LLMProvider + 'static> {
    index: Arc<LocalVectorStore>,
    pipeline: DefaultPipeline<L>,
    config: PipelineConfig,
}

impl<L: LLMProvider + 'static> RagService<L> {
    /// Open the index, connect the backend and wire the pipeline
    pub async fn init(setup: IndexSetup, config: PipelineConfig, mut provider: L) -> Result<Self> {
        config.validate()?;
        let index = open_index(&setup, &config, &DirectoryLoader::new()).await?;
        provider.connect().await?;

        let service = Self::from_parts(index, config, Arc::new(provider));

        info!(setup = ?setup, stats = %service.index.stats(), "rag service ready");
        Ok(service)
    }

    /// Wire a pipeline around an already opened index and connected provider
    pub fn from_parts(index: Arc<LocalVectorStore>, config: PipelineConfig, provider: Arc<L>) -> Self {
        let retriever =
            VectorRetriever::new(Arc::clone(&index)).with_min_relevance(config.min_relevance);
        let pipeline = QueryPipeline::new(
            retriever,
            LlmSummarizer::new(provider),
            ContextAssembler::new(config.max_context_chars),
        );

        Self {
            index,
            pipeline,
            config,
        }
    }

    pub fn pipeline(&self) -> &DefaultPipeline<L> {
        &self.pipeline
    }

    pub fn index(&self) -> &Arc<LocalVectorStore> {
        &self.index
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer with the configured default `top_k`
    pub async fn ask(&self, query: &str) -> Result<String> {
        self.pipeline
            .search_and_summarize(query, self.config.top_k)
            .await
    }

    /// Release the index handle and backend
    pub async fn shutdown(self) -> Result<()> {
        let entries = self.index.count().await?;
        info!(entries, "rag service shutting down");
        drop(self.pipeline);
        drop(self.index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragsum_core::{Error, GenerationConfig, GenerationResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CannedProvider {
        connected: AtomicBool,
        connects: Arc<AtomicUsize>,
    }

    impl CannedProvider {
        fn new() -> Self {
            Self::counting(Arc::new(AtomicUsize::new(0)))
        }

        fn counting(connects: Arc<AtomicUsize>) -> Self {
            Self {
                connected: AtomicBool::new(false),
                connects,
            }
        }
    }

    #[async_trait]
    impl LLMProvider for CannedProvider {
        async fn connect(&mut self) -> Result<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn generate_with_config(
            &self,
            prompt: &str,
            config: &GenerationConfig,
        ) -> Result<GenerationResult> {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(Error::Backend("not connected".to_string()));
            }
            let grounded = prompt.contains("Context:");
            Ok(GenerationResult {
                text: if grounded { "grounded summary" } else { "ungrounded answer" }.to_string(),
                model_id: config.model_id.clone(),
                tokens_used: None,
            })
        }

        fn model_id(&self) -> &str {
            "canned/model"
        }
    }

    fn write_corpus(dir: &std::path::Path) {
        std::fs::write(
            dir.join("contrast.md"),
            "# Contrast\n\nHistogram equalization improves image contrast by flattening the intensity histogram.",
        )
        .unwrap();
        std::fs::write(
            dir.join("noise.txt"),
            "A median filter removes salt and pepper noise.",
        )
        .unwrap();
    }

    fn config_for(dir: &TempDir) -> PipelineConfig {
        PipelineConfig {
            data_dir: dir.path().join("data"),
            storage_path: dir.path().join("vector_store"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_build_then_load_end_to_end() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        std::fs::create_dir_all(&config.data_dir).unwrap();
        write_corpus(&config.data_dir);

        let service = RagService::init(IndexSetup::build(&config), config.clone(), CannedProvider::new())
            .await
            .unwrap();
        assert_eq!(service.index().count().await.unwrap(), 2);
        let answer = service
            .ask("How does histogram equalization improve image contrast?")
            .await
            .unwrap();
        assert_eq!(answer, "grounded summary");
        service.shutdown().await.unwrap();

        let service = RagService::init(IndexSetup::load(&config), config.clone(), CannedProvider::new())
            .await
            .unwrap();
        assert!(service.index().is_loaded());
        assert_eq!(service.index().count().await.unwrap(), 2);

        let run = service
            .pipeline()
            .run("histogram equalization contrast", 1, &tokio_util::sync::CancellationToken::new())
            .await;
        assert_eq!(run.context.unwrap().sources, vec!["contrast.md#0"]);
    }

    #[tokio::test]
    async fn test_unrelated_query_falls_back() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        std::fs::create_dir_all(&config.data_dir).unwrap();
        write_corpus(&config.data_dir);

        let service = RagService::init(IndexSetup::build(&config), config.clone(), CannedProvider::new())
            .await
            .unwrap();
        let answer = service.ask("???").await.unwrap();
        assert_eq!(answer, "ungrounded answer");
    }

    #[tokio::test]
    async fn test_load_without_saved_index_fails_before_connecting() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        let connects = Arc::new(AtomicUsize::new(0));

        let err = RagService::init(
            IndexSetup::load(&config),
            config.clone(),
            CannedProvider::counting(Arc::clone(&connects)),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, Error::IndexUnavailable(_)));
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_connecting() {
        let dir = TempDir::new().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));

        let config = PipelineConfig {
            top_k: 0,
            ..config_for(&dir)
        };
        let err = RagService::init(
            IndexSetup::load(&config),
            config.clone(),
            CannedProvider::counting(Arc::clone(&connects)),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let config = PipelineConfig {
            max_context_chars: 0,
            ..config_for(&dir)
        };
        let err = RagService::init(
            IndexSetup::load(&config),
            config.clone(),
            CannedProvider::counting(Arc::clone(&connects)),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }
}
