//! # Model Cache
//!
//! Holds at most one loaded model per [`ModelKind`] for the life of the process.
//!
//! ## Key Features:
//! - **Lazy, single-flight loading**: the first caller for a kind loads it while holding
//!   that kind's lock; concurrent callers wait and then share the result
//! - **Cached failures**: a failed load is remembered, later calls fail fast instead of
//!   repeating a load that already failed
//! - **Status snapshots**: per-kind state for the health and model-status endpoints
//!
//! ## State Transitions:
//! Unloaded → (Loading) → Loaded | Failed. Neither end state is ever left; models are
//! released only when the process exits.

use super::{ModelKind, ModelLoader, Punctuator, Transcriber, Translator};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Externally visible state of one cache slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ModelStatus {
    /// No load attempted yet
    Unloaded,

    /// A load is in flight
    Loading,

    /// Ready for inference
    Loaded {
        loaded_at: String,
        load_time_ms: u64,
    },

    /// The load failed; the failure is permanent for this process
    Failed {
        message: String,
        failed_at: String,
    },
}

impl ModelStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelStatus::Loaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ModelStatus::Failed { .. })
    }

    /// Human-readable status description.
    pub fn description(&self) -> String {
        match self {
            ModelStatus::Unloaded => "Not loaded yet".to_string(),
            ModelStatus::Loading => "Loading".to_string(),
            ModelStatus::Loaded { .. } => "Ready for inference".to_string(),
            ModelStatus::Failed { message, .. } => format!("Error: {}", message),
        }
    }
}

/// A model could not be obtained from the cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} model unavailable: {message}")]
pub struct LoadError {
    pub kind: ModelKind,
    pub message: String,
}

/// Per-kind entry of a cache snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSnapshot {
    pub kind: ModelKind,
    pub optional: bool,
    pub description: String,
    pub load_attempts: u64,
    #[serde(flatten)]
    pub status: ModelStatus,
}

enum SlotState<T: ?Sized> {
    Unloaded,
    Loaded {
        model: Arc<T>,
        loaded_at: DateTime<Utc>,
        load_time_ms: u64,
    },
    Failed {
        message: String,
        failed_at: DateTime<Utc>,
    },
}

/// One kind's lock-protected state.
///
/// The tokio mutex is held across the whole check-then-load so only one load per kind
/// can ever be in flight.
struct Slot<T: ?Sized> {
    kind: ModelKind,
    state: Mutex<SlotState<T>>,
    load_attempts: AtomicU64,
}

impl<T: ?Sized> Slot<T> {
    fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            state: Mutex::new(SlotState::Unloaded),
            load_attempts: AtomicU64::new(0),
        }
    }

    async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<T>, LoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Arc<T>>>,
    {
        let mut state = self.state.lock().await;

        match &*state {
            SlotState::Loaded { model, .. } => return Ok(Arc::clone(model)),
            SlotState::Failed { message, .. } => {
                return Err(LoadError {
                    kind: self.kind,
                    message: message.clone(),
                })
            }
            SlotState::Unloaded => {}
        }

        self.load_attempts.fetch_add(1, Ordering::SeqCst);
        info!(kind = %self.kind, "Loading {} model...", self.kind);
        let start_time = Instant::now();

        match load().await {
            Ok(model) => {
                let load_time_ms = start_time.elapsed().as_millis() as u64;
                info!(kind = %self.kind, load_time_ms, "{} model loaded successfully", self.kind);
                *state = SlotState::Loaded {
                    model: Arc::clone(&model),
                    loaded_at: Utc::now(),
                    load_time_ms,
                };
                Ok(model)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if self.kind.is_optional() {
                    warn!(kind = %self.kind, error = %message, "Failed to load {} model", self.kind);
                } else {
                    error!(kind = %self.kind, error = %message, "Failed to load {} model", self.kind);
                }
                *state = SlotState::Failed {
                    message: message.clone(),
                    failed_at: Utc::now(),
                };
                Err(LoadError {
                    kind: self.kind,
                    message,
                })
            }
        }
    }

    /// Current status without waiting on an in-flight load.
    fn status(&self) -> ModelStatus {
        let Ok(state) = self.state.try_lock() else {
            return ModelStatus::Loading;
        };
        match &*state {
            SlotState::Unloaded => ModelStatus::Unloaded,
            SlotState::Loaded {
                loaded_at,
                load_time_ms,
                ..
            } => ModelStatus::Loaded {
                loaded_at: loaded_at.to_rfc3339(),
                load_time_ms: *load_time_ms,
            },
            SlotState::Failed { message, failed_at } => ModelStatus::Failed {
                message: message.clone(),
                failed_at: failed_at.to_rfc3339(),
            },
        }
    }

    fn load_attempts(&self) -> u64 {
        self.load_attempts.load(Ordering::SeqCst)
    }
}

/// Process-wide cache of loaded models, shared by every request.
pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    punctuation: Slot<dyn Punctuator>,
    translation: Slot<dyn Translator>,
    transcription: Slot<dyn Transcriber>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            punctuation: Slot::new(ModelKind::Punctuation),
            translation: Slot::new(ModelKind::Translation),
            transcription: Slot::new(ModelKind::Transcription),
        }
    }

    pub async fn punctuator(&self) -> Result<Arc<dyn Punctuator>, LoadError> {
        self.punctuation
            .get_or_load(|| self.loader.load_punctuator())
            .await
    }

    pub async fn translator(&self) -> Result<Arc<dyn Translator>, LoadError> {
        self.translation
            .get_or_load(|| self.loader.load_translator())
            .await
    }

    pub async fn transcriber(&self) -> Result<Arc<dyn Transcriber>, LoadError> {
        self.transcription
            .get_or_load(|| self.loader.load_transcriber())
            .await
    }

    /// Load `kind` if nothing has been attempted yet. Used by startup preloading and the
    /// model endpoints, which only need the outcome.
    pub async fn ensure_loaded(&self, kind: ModelKind) -> Result<(), LoadError> {
        match kind {
            ModelKind::Punctuation => self.punctuator().await.map(|_| ()),
            ModelKind::Translation => self.translator().await.map(|_| ()),
            ModelKind::Transcription => self.transcriber().await.map(|_| ()),
        }
    }

    pub fn status(&self, kind: ModelKind) -> ModelStatus {
        match kind {
            ModelKind::Punctuation => self.punctuation.status(),
            ModelKind::Translation => self.translation.status(),
            ModelKind::Transcription => self.transcription.status(),
        }
    }

    /// Number of loads started for `kind`; never exceeds 1.
    pub fn load_attempts(&self, kind: ModelKind) -> u64 {
        match kind {
            ModelKind::Punctuation => self.punctuation.load_attempts(),
            ModelKind::Translation => self.translation.load_attempts(),
            ModelKind::Transcription => self.transcription.load_attempts(),
        }
    }

    pub fn snapshot(&self) -> Vec<ModelSnapshot> {
        ModelKind::ALL
            .into_iter()
            .map(|kind| {
                let status = self.status(kind);
                ModelSnapshot {
                    kind,
                    optional: kind.is_optional(),
                    description: status.description(),
                    load_attempts: self.load_attempts(kind),
                    status,
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("punctuation", &self.punctuation.status())
            .field("translation", &self.translation.status())
            .field("transcription", &self.transcription.status())
            .finish()
    }
}
