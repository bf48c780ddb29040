//! Builds the engine from an `AppConfig`.

use std::sync::Arc;
use std::time::Duration;
use syllabus_agent::{Generator, RagSystem, SessionStore};
use syllabus_config::{AppConfig, EmbeddingProvider, IndexBackend};
use syllabus_core::event::{DomainEvent, EventBus};
use syllabus_core::error::IndexError;
use syllabus_core::{Embedder, Provider, VectorIndex};
use syllabus_ingest::{Chunker, DocumentProcessor};
use syllabus_providers::{AnthropicProvider, OpenAiEmbedder};
use syllabus_retrieval::{CourseStore, FileIndex, HashEmbedder, InMemoryIndex};
use tracing::{debug, info};

pub fn embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, IndexError> {
    let e = &config.embedding;
    let embedder: Arc<dyn Embedder> = match e.provider {
        EmbeddingProvider::Local => local_embedder(config)?,
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(e.dimensions)),
        EmbeddingProvider::Openai => {
            let mut client = OpenAiEmbedder::new(&e.api_url, &e.model, e.dimensions);
            if let Some(key) = &e.api_key {
                client = client.with_api_key(key);
            }
            Arc::new(client)
        }
    };
    Ok(embedder)
}

#[cfg(feature = "local-embeddings")]
fn local_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, IndexError> {
    let e = &config.embedding;
    let local = syllabus_retrieval::LocalEmbedder::new(&e.local_model)?
        .with_batch_size(e.batch_size)
        .with_cache_dir(AppConfig::config_dir().join("models"));
    Ok(Arc::new(local))
}

#[cfg(not(feature = "local-embeddings"))]
fn local_embedder(_config: &AppConfig) -> Result<Arc<dyn Embedder>, IndexError> {
    Err(IndexError::Unavailable {
        backend: "local".into(),
        reason: "built without the `local-embeddings` feature; \
                 set embedding.provider to \"hash\" or \"openai\""
            .into(),
    })
}

/// Catalog and content indices on the configured backend.
pub fn course_store(config: &AppConfig) -> Result<CourseStore, IndexError> {
    let r = &config.retrieval;
    let (catalog, content): (Arc<dyn VectorIndex>, Arc<dyn VectorIndex>) = match r.backend {
        IndexBackend::File => {
            let dir = r.index_dir();
            info!(dir = %dir.display(), "Using file index");
            (
                Arc::new(FileIndex::open(dir.join("catalog.jsonl"))?),
                Arc::new(FileIndex::open(dir.join("content.jsonl"))?),
            )
        }
        IndexBackend::Memory => (Arc::new(InMemoryIndex::new()), Arc::new(InMemoryIndex::new())),
    };
    Ok(CourseStore::new(catalog, content, embedder(config)?)
        .with_max_results(r.max_results)
        .with_min_course_similarity(r.min_course_similarity))
}

pub fn provider(config: &AppConfig) -> Arc<dyn Provider> {
    Arc::new(
        AnthropicProvider::new(config.api_key.clone().unwrap_or_default())
            .with_base_url(&config.anthropic.base_url)
            .with_health_model(&config.model)
            .with_timeout(Duration::from_secs(config.request_timeout_secs)),
    )
}

pub fn rag_system(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    event_bus: Arc<EventBus>,
) -> Result<RagSystem, IndexError> {
    let store = Arc::new(course_store(config)?);
    let tools = Arc::new(syllabus_tools::course_registry(store.clone()));
    let generator = Generator::new(provider, &config.model, tools, event_bus.clone())
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);
    let processor = DocumentProcessor::new(Chunker::new(
        config.retrieval.chunk_size,
        config.retrieval.chunk_overlap,
    ));

    Ok(RagSystem::new(
        processor,
        store,
        generator,
        SessionStore::new(config.sessions.max_history),
        event_bus,
    )
    .with_query_timeout(Duration::from_secs(config.query_timeout_secs())))
}

/// Log every domain event at debug level until the bus is dropped.
pub fn spawn_event_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.as_ref() {
                DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
                    debug!(tool = %tool_name, success, duration_ms, "event: tool executed");
                }
                DomainEvent::ResponseGenerated { session_id, rounds, tokens_used, .. } => {
                    debug!(
                        session_id = %session_id,
                        rounds,
                        tokens_used,
                        "event: response generated"
                    );
                }
                DomainEvent::CourseIngested { course_title, chunks, .. } => {
                    debug!(course = %course_title, chunks, "event: course ingested");
                }
                DomainEvent::ErrorOccurred { context, error_message, .. } => {
                    debug!(context = %context, error = %error_message, "event: error");
                }
            }
        }
    });
}
