//! # Transcription Stage
//!
//! The transcription model reads audio from a file, so each request's bytes are written
//! to a uniquely named transient file first. The file is removed on every exit path:
//! explicitly on success, by `NamedTempFile`'s `Drop` otherwise.

use super::PipelineError;
use crate::models::{ModelCache, ModelKind, Transcript};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

/// Where transient audio files live and what they are called.
#[derive(Debug, Clone)]
pub struct TransientStorage {
    dir: PathBuf,
    suffix: String,
}

impl TransientStorage {
    pub fn new(dir: impl AsRef<Path>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            suffix: suffix.into(),
        }
    }

    /// Write `bytes` to a fresh file that is deleted when the handle is dropped.
    pub fn write(&self, bytes: &[u8]) -> Result<NamedTempFile, PipelineError> {
        let mut file = tempfile::Builder::new()
            .prefix("speech-")
            .suffix(&self.suffix)
            .tempfile_in(&self.dir)
            .map_err(PipelineError::TransientStorage)?;

        file.write_all(bytes).map_err(PipelineError::TransientStorage)?;
        file.flush().map_err(PipelineError::TransientStorage)?;
        Ok(file)
    }
}

/// Transcribe `audio`. Fails with `ModelUnavailable` before anything is written when
/// the transcription model cannot be loaded.
pub async fn transcribe(
    models: &ModelCache,
    storage: &TransientStorage,
    audio: &[u8],
) -> Result<Transcript, PipelineError> {
    let transcriber = models.transcriber().await?;
    let file = storage.write(audio)?;

    let result = transcriber.transcribe(file.path()).await;

    match result {
        Ok(transcript) => {
            file.close().map_err(PipelineError::TransientStorage)?;
            info!(
                language = ?transcript.language,
                "Transcribed {} chars",
                transcript.text.len()
            );
            Ok(transcript)
        }
        Err(source) => {
            error!("Transcription failed: {:#}", source);
            if let Err(e) = file.close() {
                warn!("Failed to remove transient audio file: {}", e);
            }
            Err(PipelineError::Inference {
                kind: ModelKind::Transcription,
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_files_are_unique_and_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TransientStorage::new(dir.path(), ".webm");

        let first = storage.write(b"one").unwrap();
        let second = storage.write(b"two").unwrap();
        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"one");
        assert!(first.path().to_string_lossy().ends_with(".webm"));

        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());

        second.close().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory_is_storage_error() {
        let storage = TransientStorage::new("/nonexistent/speech-translator", ".webm");
        assert!(matches!(
            storage.write(b"audio"),
            Err(PipelineError::TransientStorage(_))
        ));
    }
}
