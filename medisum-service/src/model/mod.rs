//! Model handle: the loaded seq2seq model behind a narrow generation interface.
//!
//! The handle is created once at startup by searching an ordered list of
//! candidate directories. If none exists, or loading fails, the slot stays
//! empty for the lifetime of the process and every generation request is
//! rejected with [`SummaryError::NotLoaded`](crate::error::SummaryError).

pub mod t5;

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::ModelError;

pub use t5::T5Generator;

/// Decoding parameters for a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on decoder tokens, including the start token.
    pub max_length: usize,
    pub temperature: f64,
    pub do_sample: bool,
    pub num_return_sequences: usize,
}

impl GenerationParams {
    pub fn sampled(max_length: usize, temperature: f64) -> Self {
        Self {
            max_length,
            temperature,
            do_sample: true,
            num_return_sequences: 1,
        }
    }
}

/// Static facts about a loaded model, reported by `/model-info`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelDescription {
    pub model_type: String,
    pub parameters: u64,
    pub device: String,
}

/// Text generation capability of a loaded model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`. Returns the decoded first sequence with
    /// special tokens removed; an empty string means the model produced nothing.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ModelError>;

    fn describe(&self) -> ModelDescription;
}

/// A generator together with the directory it was loaded from.
#[derive(Clone)]
pub struct LoadedModel {
    pub generator: Arc<dyn TextGenerator>,
    pub path: PathBuf,
}

impl LoadedModel {
    pub fn new(generator: Arc<dyn TextGenerator>, path: impl Into<PathBuf>) -> Self {
        Self {
            generator,
            path: path.into(),
        }
    }
}

/// Process-wide model slot, initialized at most once.
#[derive(Clone, Default)]
pub struct ModelSlot {
    cell: Arc<OnceCell<Option<LoadedModel>>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that already holds `model`.
    pub fn with_model(model: LoadedModel) -> Self {
        Self {
            cell: Arc::new(OnceCell::new_with(Some(Some(model)))),
        }
    }

    /// A slot whose initialization already happened and found nothing.
    pub fn empty() -> Self {
        Self {
            cell: Arc::new(OnceCell::new_with(Some(None))),
        }
    }

    /// Runs `init` unless some earlier call already did. A failed load is
    /// recorded as well, so it is never retried. Returns whether a model is held.
    pub async fn initialize<F, Fut>(&self, init: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LoadedModel, ModelError>>,
    {
        let slot = self
            .cell
            .get_or_init(|| async {
                match init().await {
                    Ok(model) => {
                        info!("Model loaded from {}", model.path.display());
                        Some(model)
                    }
                    Err(e) => {
                        error!("Model unavailable: {}", e);
                        None
                    }
                }
            })
            .await;
        slot.is_some()
    }

    pub fn get(&self) -> Option<&LoadedModel> {
        self.cell.get().and_then(Option::as_ref)
    }

    pub fn is_loaded(&self) -> bool {
        self.get().is_some()
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.get().map(|model| model.path.as_path())
    }
}

/// Returns the first candidate that exists and is a directory.
pub fn find_model_dir(candidates: &[PathBuf]) -> Option<PathBuf> {
    for path in candidates {
        if path.is_dir() {
            return Some(path.clone());
        }
    }

    warn!("No model found. Paths checked:");
    for path in candidates {
        let state = if path.exists() { "exists" } else { "missing" };
        warn!("   {} {}", state, path.display());
    }
    None
}

/// Searches the configured candidates and loads the first match with the
/// candle T5 backend.
pub async fn load_model(config: &ServiceConfig) -> Result<LoadedModel, ModelError> {
    let dir = find_model_dir(&config.model_paths).ok_or_else(|| ModelError::NotFound {
        searched: config
            .model_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })?;

    info!("Loading model from: {}", dir.display());

    let load_dir = dir.clone();
    let use_cuda = config.use_cuda;
    let max_input_tokens = config.max_input_tokens;
    let generator = tokio::task::spawn_blocking(move || {
        T5Generator::load(&load_dir, use_cuda, max_input_tokens)
    })
    .await
    .map_err(|e| ModelError::Load(e.to_string()))??;

    Ok(LoadedModel::new(Arc::new(generator), dir))
}
