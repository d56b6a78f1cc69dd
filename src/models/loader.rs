//! Production [`ModelLoader`]: Whisper on candle for transcription, the inference
//! server for translation and punctuation.

use super::inference::{InferenceClient, RemotePunctuator, RemoteTranslator};
use super::whisper::{ModelSize, WhisperModel, WhisperTranscriber};
use super::{ModelLoader, Punctuator, Transcriber, Translator};
use crate::audio::AudioDecoder;
use crate::config::AppConfig;
use crate::device::{self, DevicePreference};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub struct DefaultModelLoader {
    client: Arc<InferenceClient>,
    translation_model: String,
    punctuation_model: String,
    whisper_size: ModelSize,
    device: DevicePreference,
    hf_token: Option<String>,
    ffmpeg_path: String,
}

impl DefaultModelLoader {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(InferenceClient::new(&config.inference)?),
            translation_model: config.models.translation_model.clone(),
            punctuation_model: config.models.punctuation_model.clone(),
            whisper_size: config.whisper_size(),
            device: config.device_preference(),
            hf_token: config.inference.api_token.clone(),
            ffmpeg_path: config.audio.ffmpeg_path.clone(),
        })
    }
}

#[async_trait]
impl ModelLoader for DefaultModelLoader {
    async fn load_punctuator(&self) -> Result<Arc<dyn Punctuator>> {
        let punctuator =
            RemotePunctuator::connect(Arc::clone(&self.client), &self.punctuation_model).await?;
        Ok(Arc::new(punctuator))
    }

    async fn load_translator(&self) -> Result<Arc<dyn Translator>> {
        let translator =
            RemoteTranslator::connect(Arc::clone(&self.client), &self.translation_model).await?;
        Ok(Arc::new(translator))
    }

    async fn load_transcriber(&self) -> Result<Arc<dyn Transcriber>> {
        let device = device::select_device(self.device);
        tracing::info!(
            "Loading transcription model on {}",
            device::describe(&device)
        );
        let model = WhisperModel::load(self.whisper_size, device, self.hf_token.clone()).await?;
        let decoder = AudioDecoder::new(self.ffmpeg_path.clone());
        Ok(Arc::new(WhisperTranscriber::new(model, decoder)))
    }
}
