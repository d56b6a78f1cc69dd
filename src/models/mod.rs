//! # Models
//!
//! The three inference tasks the service delegates to pretrained models, the loader
//! that produces them, and the cache that keeps one loaded instance per task.
//!
//! ## Backends:
//! - **Transcription**: Whisper, run in-process on candle (`whisper`)
//! - **Translation / punctuation**: NLLB and a token-classification punctuation model,
//!   served by an inference server over HTTP (`inference`)
//!
//! Every backend sits behind a trait so the pipeline can be exercised with test doubles.

pub mod cache;
pub mod inference;
pub mod loader;
pub mod whisper;

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub use cache::{LoadError, ModelCache};
pub use loader::DefaultModelLoader;

/// The kinds of model the service holds, one cache slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Punctuation,
    Translation,
    Transcription,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Punctuation,
        ModelKind::Translation,
        ModelKind::Transcription,
    ];

    /// Punctuation only improves the text; the other two are required for their requests.
    pub fn is_optional(&self) -> bool {
        matches!(self, ModelKind::Punctuation)
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelKind::Punctuation => "punctuation",
            ModelKind::Translation => "translation",
            ModelKind::Transcription => "transcription",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ModelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "punctuation" => Ok(ModelKind::Punctuation),
            "translation" => Ok(ModelKind::Translation),
            "transcription" | "whisper" => Ok(ModelKind::Transcription),
            _ => Err(anyhow::anyhow!("Unknown model kind: {}", s)),
        }
    }
}

/// Output of a transcription model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    /// The model's best guess at the spoken language (Whisper code such as `en`)
    pub language: Option<String>,
}

/// Restores sentence punctuation in unpunctuated text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Punctuator: Send + Sync {
    async fn restore_punctuation(&self, text: &str) -> anyhow::Result<String>;
}

/// Translates text between two model language tags (`eng_Latn` → `spa_Latn`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source_tag: &str, target_tag: &str)
        -> anyhow::Result<String>;
}

/// Transcribes the audio file at `audio_path`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> anyhow::Result<Transcript>;
}

/// Produces loaded models. Each call performs a full, expensive load; callers go
/// through [`ModelCache`] so that happens at most once per kind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load_punctuator(&self) -> anyhow::Result<Arc<dyn Punctuator>>;
    async fn load_translator(&self) -> anyhow::Result<Arc<dyn Translator>>;
    async fn load_transcriber(&self) -> anyhow::Result<Arc<dyn Transcriber>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("translation".parse::<ModelKind>().unwrap(), ModelKind::Translation);
        assert_eq!("Whisper".parse::<ModelKind>().unwrap(), ModelKind::Transcription);
        assert!("tts".parse::<ModelKind>().is_err());
        for kind in ModelKind::ALL {
            assert_eq!(kind.to_string().parse::<ModelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_only_punctuation_is_optional() {
        assert!(ModelKind::Punctuation.is_optional());
        assert!(!ModelKind::Translation.is_optional());
        assert!(!ModelKind::Transcription.is_optional());
    }
}
