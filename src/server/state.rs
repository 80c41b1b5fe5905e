//! Application state: providers constructed once and injected everywhere

use std::sync::Arc;

use crate::adapters::AdapterRegistry;
use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::ChatPipeline;
use crate::index::{rest::RestVectorIndex, VectorIndex};
use crate::providers::{openai::{OpenAiChat, OpenAiEmbedder}, EmbeddingProvider, LlmProvider};
use crate::retrieval::RetrievalOrchestrator;
use crate::storage::Database;
use crate::vectorization::{JobTracker, Vectorizer};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    db: Arc<Database>,
    vectorizer: Arc<Vectorizer>,
    jobs: Arc<JobTracker>,
    orchestrator: Arc<RetrievalOrchestrator>,
    pipeline: Arc<ChatPipeline>,
}

impl AppState {
    /// Build state with the configured HTTP providers
    pub fn new(config: RagConfig) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(OpenAiEmbedder::new(&config.embeddings)?);
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiChat::new(&config.llm)?);
        let index: Arc<dyn VectorIndex> = Arc::new(RestVectorIndex::new(&config.vector_index)?);
        let db = Arc::new(Database::new(&config.storage.database_path)?);

        tracing::info!(
            "Providers initialized (embeddings: {} dims, llm: {}, index: {})",
            embedder.dimensions(),
            llm.model(),
            index.name()
        );

        Ok(Self::with_providers(config, db, embedder, index, llm))
    }

    /// Build state from injected providers; tests and offline runs pass the
    /// deterministic local implementations here.
    pub fn with_providers(
        config: RagConfig,
        db: Arc<Database>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let jobs = Arc::new(JobTracker::new(Arc::clone(&db)));
        let vectorizer = Arc::new(Vectorizer::new(
            Arc::clone(&db),
            Arc::clone(&embedder),
            Arc::clone(&index),
            Arc::clone(&jobs),
        ));

        let registry = Arc::new(AdapterRegistry::new(
            Arc::clone(&db),
            embedder,
            index,
            &config.retrieval,
        ));
        let orchestrator = Arc::new(RetrievalOrchestrator::new(registry));
        let pipeline = Arc::new(ChatPipeline::new(
            Arc::clone(&orchestrator),
            llm,
            Arc::clone(&db),
            config.retrieval.default_limit,
        ));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                vectorizer,
                jobs,
                orchestrator,
                pipeline,
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.inner.db
    }

    pub fn vectorizer(&self) -> &Arc<Vectorizer> {
        &self.inner.vectorizer
    }

    pub fn jobs(&self) -> &Arc<JobTracker> {
        &self.inner.jobs
    }

    pub fn orchestrator(&self) -> &Arc<RetrievalOrchestrator> {
        &self.inner.orchestrator
    }

    pub fn pipeline(&self) -> &Arc<ChatPipeline> {
        &self.inner.pipeline
    }
}
