//! # Request Pipeline
//!
//! The two operations the service exposes, composed from the stages in this module:
//!
//! - **translate_text**: punctuate → translate
//! - **transcribe_and_translate**: transcribe → punctuate → translate
//!
//! Each operation runs its stages strictly in order and stops at the first failure.
//! Punctuation is the only stage allowed to fail silently; it hands its input back
//! unchanged. Nothing is retried.

pub mod punctuation;
pub mod transcription;
pub mod translation;

use crate::languages::UnknownLanguage;
use crate::models::{LoadError, ModelCache, ModelKind};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use transcription::TransientStorage;

/// Detected language reported when the transcription model offers no guess.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Everything that can stop a pipeline operation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unsupported language: {0}")]
    InvalidLanguage(String),

    #[error("{kind} model unavailable: {reason}")]
    ModelUnavailable { kind: ModelKind, reason: String },

    #[error("transient audio storage failed: {0}")]
    TransientStorage(#[source] std::io::Error),

    #[error("invalid audio payload: {0}")]
    InvalidAudio(String),

    #[error("{kind} inference failed: {source:#}")]
    Inference {
        kind: ModelKind,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    /// True when the caller sent something wrong; everything else is a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidLanguage(_))
    }
}

impl From<UnknownLanguage> for PipelineError {
    fn from(err: UnknownLanguage) -> Self {
        PipelineError::InvalidLanguage(err.0)
    }
}

impl From<LoadError> for PipelineError {
    fn from(err: LoadError) -> Self {
        PipelineError::ModelUnavailable {
            kind: err.kind,
            reason: err.message,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionRequest {
    /// Base64 audio, optionally as a `data:` URI
    pub audio_data: String,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResponse {
    pub translated_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptionResponse {
    pub transcribed_text: String,
    pub translated_text: String,
    pub detected_language: String,
}

/// Runs requests against the shared [`ModelCache`].
pub struct TranslationPipeline {
    models: Arc<ModelCache>,
    storage: TransientStorage,
    max_audio_bytes: usize,
}

impl TranslationPipeline {
    pub fn new(models: Arc<ModelCache>, storage: TransientStorage, max_audio_bytes: usize) -> Self {
        Self {
            models,
            storage,
            max_audio_bytes,
        }
    }

    /// Punctuate then translate `request.text`.
    pub async fn translate_text(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, PipelineError> {
        if request.text.trim().is_empty() {
            return Ok(TranslationResponse {
                translated_text: String::new(),
            });
        }

        let punctuated = punctuation::restore_punctuation(&self.models, &request.text).await;
        let translated_text = translation::translate(
            &self.models,
            &punctuated,
            &request.source_language,
            &request.target_language,
        )
        .await?;

        Ok(TranslationResponse { translated_text })
    }

    /// Transcribe the uploaded audio, then punctuate and translate the transcript.
    pub async fn transcribe_and_translate(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse, PipelineError> {
        let audio = decode_audio_payload(&request.audio_data, self.max_audio_bytes)?;
        tracing::debug!("Received {} bytes of audio", audio.len());

        let transcript = transcription::transcribe(&self.models, &self.storage, &audio).await?;
        let detected_language = transcript
            .language
            .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());

        let text = transcript.text.trim();
        if text.is_empty() {
            tracing::info!("Transcription produced no text");
            return Ok(TranscriptionResponse {
                transcribed_text: String::new(),
                translated_text: String::new(),
                detected_language,
            });
        }

        let punctuated = punctuation::restore_punctuation(&self.models, text).await;
        let translated_text = translation::translate(
            &self.models,
            &punctuated,
            &request.source_language,
            &request.target_language,
        )
        .await?;

        Ok(TranscriptionResponse {
            transcribed_text: punctuated,
            translated_text,
            detected_language,
        })
    }
}

/// Drop a `data:<mime>;base64,` prefix if the client sent a data URI.
pub fn strip_data_uri(input: &str) -> &str {
    match input.find(";base64,") {
        Some(idx) => &input[idx + 8..],
        None => input,
    }
}

/// Decode the base64 audio field, enforcing the size limit before allocating.
pub fn decode_audio_payload(audio_data: &str, max_bytes: usize) -> Result<Vec<u8>, PipelineError> {
    let encoded = strip_data_uri(audio_data.trim());
    if encoded.is_empty() {
        return Err(PipelineError::InvalidAudio("audio data is empty".to_string()));
    }

    let estimated = encoded.len() / 4 * 3;
    if estimated > max_bytes + 2 {
        return Err(PipelineError::InvalidAudio(format!(
            "audio exceeds the {} byte limit",
            max_bytes
        )));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| PipelineError::InvalidAudio(format!("malformed base64: {}", e)))?;

    if bytes.len() > max_bytes {
        return Err(PipelineError::InvalidAudio(format!(
            "audio exceeds the {} byte limit",
            max_bytes
        )));
    }
    Ok(bytes)
}
