//! Sentence-transformer embeddings run locally through fastembed.
//!
//! The model is downloaded from Hugging Face on first use and cached; after
//! that no network is needed. Loading is deferred until the first `embed`
//! call, so building the engine stays cheap.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use syllabus_core::error::IndexError;
use syllabus_core::Embedder;
use tracing::{debug, info};

pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

/// Map a config model name to the fastembed model and its vector size.
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize), IndexError> {
    match name {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "all-minilm-l12-v2" => Ok((EmbeddingModel::AllMiniLML12V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((EmbeddingModel::BGELargeENV15, 1024)),
        "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
        other => Err(IndexError::Unavailable {
            backend: "local".into(),
            reason: format!(
                "unknown local embedding model '{other}'. Supported: all-minilm-l6-v2, \
                 all-minilm-l12-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5"
            ),
        }),
    }
}

fn inference_error(reason: impl std::fmt::Display) -> IndexError {
    IndexError::EmbeddingFailed(format!("local model: {reason}"))
}

pub struct LocalEmbedder {
    model_name: String,
    model: EmbeddingModel,
    dimensions: usize,
    batch_size: usize,
    cache_dir: Option<PathBuf>,
    engine: Arc<Mutex<Option<TextEmbedding>>>,
}

impl LocalEmbedder {
    pub fn new(model_name: &str) -> Result<Self, IndexError> {
        let (model, dimensions) = resolve_model(model_name)?;
        Ok(Self {
            model_name: model_name.to_string(),
            model,
            dimensions,
            batch_size: 64,
            cache_dir: None,
            engine: Arc::new(Mutex::new(None)),
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Where downloaded model files are kept.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.lock().map(|engine| engine.is_some()).unwrap_or(false)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn name(&self) -> &str {
        "local"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let engine = Arc::clone(&self.engine);
        let model = self.model.clone();
        let model_name = self.model_name.clone();
        let cache_dir = self.cache_dir.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut guard = engine.lock().map_err(|_| inference_error("model lock poisoned"))?;
            if guard.is_none() {
                info!(model = %model_name, "Loading local embedding model");
                let mut options = InitOptions::new(model).with_show_download_progress(false);
                if let Some(dir) = cache_dir {
                    options = options.with_cache_dir(dir);
                }
                let loaded = TextEmbedding::try_new(options).map_err(|e| IndexError::Unavailable {
                    backend: "local".into(),
                    reason: format!("failed to load {model_name}: {e}"),
                })?;
                *guard = Some(loaded);
            }
            let engine = guard.as_mut().ok_or_else(|| inference_error("model not loaded"))?;
            debug!(texts = texts.len(), batch_size, "Running local embedding");
            engine.embed(texts, Some(batch_size)).map_err(inference_error)
        })
        .await
        .map_err(|e| inference_error(format!("embedding task failed: {e}")))??;

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }
        Ok(vectors)
    }
}
