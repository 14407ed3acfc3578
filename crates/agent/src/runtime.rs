//! Wiring a ready-to-run brain from configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use seopilot_config::{paths, Config};
use seopilot_knowledge::{KnowledgeBase, KnowledgeStore, VectorIndex};
use seopilot_provider::{AnyProvider, OpenAiEmbedder};
use seopilot_session::ConversationMemory;

use crate::brain::{BrainLoop, BrainRequest, BrainResponse, BrainSettings};
use crate::context::ContextBuilder;
use crate::services::{
    FileAuditStore, GooglePlacesProvider, PlacesProvider, TemplateAuditRunner, WebhookNotifier,
};
use crate::tools::{register_default_tools, AddressPolicy, ToolDeps, ToolRegistry};
use crate::Result;

/// Everything one process needs to answer prompts
pub struct AppContext {
    pub config: Config,
    pub knowledge: Arc<KnowledgeBase>,
    pub memory: Arc<ConversationMemory>,
    pub tools: Arc<ToolRegistry>,
    pub brain: BrainLoop<AnyProvider>,
    flush: Option<(CancellationToken, JoinHandle<()>)>,
}

impl AppContext {
    /// Build with conversation memory at the default location
    pub async fn build(config: Config) -> Result<Self> {
        Self::build_with_memory_path(config, paths::memory_path()).await
    }

    pub async fn build_with_memory_path(config: Config, memory_path: PathBuf) -> Result<Self> {
        let provider = AnyProvider::from_settings(
            &config.brain.provider,
            config.api_key().unwrap_or_default(),
            config.api_base(),
            config.model(),
        )?;
        if !config.has_api_key() {
            warn!(
                "No API key for provider {}; prompts will fail until one is set",
                config.brain.provider
            );
        }

        let knowledge = Arc::new(load_knowledge(&config).await?);

        let memory = Arc::new(
            ConversationMemory::load(memory_path, config.brain.memory_max_entries).await,
        );

        let places: Option<Arc<dyn PlacesProvider>> = if config.tools.places.api_key.is_empty() {
            None
        } else {
            Some(Arc::new(GooglePlacesProvider::new(
                config.tools.places.api_key.clone(),
                config.tools.places.api_base.clone(),
            )))
        };

        let mut registry = ToolRegistry::new();
        register_default_tools(
            &mut registry,
            ToolDeps {
                knowledge: Arc::clone(&knowledge),
                knowledge_limit: config.knowledge.default_limit,
                store: Arc::new(FileAuditStore::new(config.audits_dir(), config.leads_path())),
                runner: Arc::new(TemplateAuditRunner::new(places)),
                notifier: Arc::new(WebhookNotifier::new(
                    config.tools.notify.webhook_url.clone(),
                    config.tools.notify.api_key.clone(),
                )),
                fetch_policy: AddressPolicy::default(),
                fetch_timeout: Duration::from_secs(config.fetch_timeout_secs()),
                fetch_max_chars: config.tools.fetch_max_chars,
            },
        )?;
        let tools = Arc::new(registry);
        debug!("Registered tools: {}", tools.names().join(", "));

        let brain = BrainLoop::new(
            Arc::new(provider),
            Arc::clone(&tools),
            Arc::clone(&memory),
            BrainSettings::from_config(&config),
        )
        .with_context(ContextBuilder::with_data_dir(paths::data_dir()));

        Ok(Self {
            config,
            knowledge,
            memory,
            tools,
            brain,
            flush: None,
        })
    }

    pub async fn ask(&self, request: BrainRequest) -> Result<BrainResponse> {
        self.brain.run(request).await
    }

    /// Start the periodic memory flush; a second call is a no-op
    pub fn start_flush(&mut self) {
        if self.flush.is_some() {
            return;
        }
        let every = Duration::from_secs(self.config.brain.flush_interval_secs.max(1));
        let token = CancellationToken::new();
        let handle = self.memory.spawn_flush(every, token.clone());
        self.flush = Some((token, handle));
    }

    /// Stop the flush task and write memory one last time
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some((token, handle)) = self.flush.take() {
            token.cancel();
            if let Err(e) = handle.await {
                warn!("Memory flush task ended abnormally: {}", e);
            }
        }
        self.memory.save().await?;
        info!("Shutdown complete");
        Ok(())
    }
}

/// Keyword store, plus the vector index when embeddings are configured
async fn load_knowledge(config: &Config) -> Result<KnowledgeBase> {
    let settings = &config.knowledge;
    let store = KnowledgeStore::new(settings.max_content_chars, settings.snippet_chars);
    let dir = config.knowledge_dir();
    let count = store.load_dir(&dir).await?;
    info!("Loaded {} knowledge items from {}", count, dir.display());

    let mut base = KnowledgeBase::new(Arc::new(store));
    if let Some(index) = vector_index(config) {
        match index.load().await {
            Ok(records) => debug!("Vector index holds {} chunks", records),
            Err(e) => warn!("Vector index unavailable, using keyword search: {}", e),
        }
        base = base.with_index(Arc::new(index));
    }
    Ok(base)
}

/// A configured but unloaded vector index
pub fn vector_index(config: &Config) -> Option<VectorIndex> {
    let embeddings = &config.knowledge.embeddings;
    if !embeddings.enabled {
        return None;
    }
    let Some(key) = config.embeddings_api_key() else {
        warn!("Embeddings enabled but no API key found");
        return None;
    };

    let embedder = OpenAiEmbedder::new(key, embeddings.api_base.clone(), embeddings.model.clone());
    Some(
        VectorIndex::new(
            config.vector_index_path(),
            Arc::new(embedder),
            config.knowledge.chunk_size.max(1),
            config.chunk_overlap(),
        )
        .with_snippet_chars(config.knowledge.snippet_chars),
    )
}
