//! # Whisper Transcription
//!
//! Runs OpenAI Whisper in-process with candle.
//!
//! ## Loading Process:
//! 1. Download `config.json`, `tokenizer.json` and `model.safetensors` from the
//!    HuggingFace hub (cached locally after the first run)
//! 2. Build the mel filter bank for the model's `num_mel_bins`
//! 3. Memory-map the weights onto the selected device
//! 4. Transcribe one second of silence to prove the model works
//!
//! ## Decoding:
//! Audio is split into 30 second windows. The spoken language is detected once from
//! the first window, then every window is decoded greedily without timestamps.
//! Windows the model classifies as silence contribute no text.

use super::{Transcriber, Transcript};
use crate::audio::AudioDecoder;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use candle_core::{Device, IndexOp, Tensor, D};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, audio, Config};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokenizers::Tokenizer;

/// Whisper language codes, in the order the multilingual vocabulary lists them.
const LANGUAGES: [&str; 99] = [
    "en", "zh", "de", "es", "ru", "ko", "fr", "ja", "pt", "tr", "pl", "ca", "nl", "ar", "sv",
    "it", "id", "hi", "fi", "vi", "he", "uk", "el", "ms", "cs", "ro", "da", "hu", "ta", "no",
    "th", "ur", "hr", "bg", "lt", "la", "mi", "ml", "cy", "sk", "te", "fa", "lv", "bn", "sr",
    "az", "sl", "kn", "et", "mk", "br", "eu", "is", "hy", "ne", "mn", "bs", "kk", "sq", "sw",
    "gl", "mr", "pa", "si", "km", "sn", "yo", "so", "af", "oc", "ka", "be", "tg", "sd", "gu",
    "am", "yi", "lo", "uz", "fo", "ht", "ps", "tk", "nn", "mt", "sa", "lb", "my", "bo", "tl",
    "mg", "as", "tt", "haw", "ln", "ha", "ba", "jw", "su",
];

/// Available Whisper model sizes.
///
/// ## Trade-offs:
/// Larger models are more accurate but slower and hungrier for memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// HuggingFace repository holding the weights.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }

    /// Approximate size of the weights in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(anyhow!("Unknown whisper model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// Special token ids looked up once from the tokenizer.
#[derive(Debug, Clone)]
struct SpecialTokens {
    sot: u32,
    transcribe: u32,
    no_timestamps: u32,
    eot: u32,
    no_speech: Option<u32>,
    /// `(code, token id)` for every language the vocabulary knows
    languages: Vec<(&'static str, u32)>,
}

impl SpecialTokens {
    fn from_tokenizer(tokenizer: &Tokenizer) -> Result<Self> {
        let id = |token: &str| {
            tokenizer
                .token_to_id(token)
                .ok_or_else(|| anyhow!("Tokenizer has no {} token", token))
        };

        let no_speech = m::NO_SPEECH_TOKENS
            .iter()
            .find_map(|token| tokenizer.token_to_id(token));

        let languages = LANGUAGES
            .iter()
            .filter_map(|code| {
                tokenizer
                    .token_to_id(&format!("<|{}|>", code))
                    .map(|id| (*code, id))
            })
            .collect();

        Ok(Self {
            sot: id(m::SOT_TOKEN)?,
            transcribe: id(m::TRANSCRIBE_TOKEN)?,
            no_timestamps: id(m::NO_TIMESTAMPS_TOKEN)?,
            eot: id(m::EOT_TOKEN)?,
            no_speech,
            languages,
        })
    }
}

/// A loaded Whisper model.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    tokenizer: Tokenizer,
    tokens: SpecialTokens,
    mel_filters: Vec<f32>,
    /// Additive logit mask, `-inf` for tokens the model must never emit
    suppress_tokens: Tensor,
    device: Device,
    size: ModelSize,
}

impl WhisperModel {
    /// Download (or reuse the local hub cache for) `size` and load it onto `device`.
    pub async fn load(size: ModelSize, device: Device, hf_token: Option<String>) -> Result<Self> {
        tracing::info!("Loading Whisper {} model ({} MB)...", size, size.size_mb());
        let start_time = Instant::now();

        let files = download_model_files(size, hf_token).await?;

        let model = tokio::task::spawn_blocking(move || -> Result<Self> {
            let mut model = Self::from_files(size, &files, device)?;
            model.validate()?;
            Ok(model)
        })
        .await
        .context("Whisper loading task panicked")??;

        tracing::info!(
            "Whisper {} model loaded in {:.2}s",
            size,
            start_time.elapsed().as_secs_f64()
        );
        Ok(model)
    }

    fn from_files(size: ModelSize, files: &ModelFiles, device: Device) -> Result<Self> {
        let config: Config = serde_json::from_reader(std::fs::File::open(&files.config)?)
            .context("Invalid Whisper config.json")?;
        tracing::debug!("Whisper config: {:?}", config);

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        let tokens = SpecialTokens::from_tokenizer(&tokenizer)?;

        let mel_filters = mel_filter_bank(m::SAMPLE_RATE, m::N_FFT, config.num_mel_bins);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], m::DTYPE, &device)?
        };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        let mask: Vec<f32> = (0..config.vocab_size as u32)
            .map(|i| {
                if config.suppress_tokens.contains(&i) || i == tokens.no_timestamps {
                    f32::NEG_INFINITY
                } else {
                    0.0
                }
            })
            .collect();
        let suppress_tokens = Tensor::new(mask.as_slice(), &device)?;

        Ok(Self {
            model,
            config,
            tokenizer,
            tokens,
            mel_filters,
            suppress_tokens,
            device,
            size,
        })
    }

    pub fn size(&self) -> ModelSize {
        self.size
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Transcribe 16 kHz mono samples.
    pub fn transcribe_pcm(&mut self, pcm: &[f32]) -> Result<Transcript> {
        let start_time = Instant::now();

        if pcm.is_empty() {
            return Ok(Transcript {
                text: String::new(),
                language: None,
            });
        }

        let mel = audio::pcm_to_mel(&self.config, pcm, &self.mel_filters);
        let n_mels = self.config.num_mel_bins;
        let mel_len = mel.len();
        let mel = Tensor::from_vec(mel, (1, n_mels, mel_len / n_mels), &self.device)?;
        let (_, _, content_frames) = mel.dims3()?;

        let first_segment = mel.narrow(2, 0, content_frames.min(m::N_FRAMES))?;
        let language = self.detect_language(&first_segment)?;

        let language_token = language.and_then(|code| {
            self.tokens
                .languages
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, id)| *id)
        });

        let mut segments = Vec::new();
        let mut seek = 0;
        while seek < content_frames {
            let segment_size = (content_frames - seek).min(m::N_FRAMES);
            let mel_segment = mel.narrow(2, seek, segment_size)?;
            if let Some(text) = self.decode_segment(&mel_segment, language_token)? {
                segments.push(text);
            }
            seek += segment_size;
        }

        let text = segments.join(" ");
        tracing::debug!(
            "Transcribed {:.2}s of audio in {:.2}s (language: {:?})",
            pcm.len() as f64 / m::SAMPLE_RATE as f64,
            start_time.elapsed().as_secs_f64(),
            language
        );

        Ok(Transcript {
            text,
            language: language.map(str::to_string),
        })
    }

    /// Most probable spoken language of a mel segment; `None` for English-only vocabularies.
    fn detect_language(&mut self, mel: &Tensor) -> Result<Option<&'static str>> {
        if self.tokens.languages.is_empty() {
            return Ok(None);
        }

        let audio_features = self.model.encoder.forward(mel, true)?;
        let sot = Tensor::new(&[[self.tokens.sot]], &self.device)?;
        let ys = self.model.decoder.forward(&sot, &audio_features, true)?;
        let logits = self.model.decoder.final_linear(&ys.i(..1)?)?.i(0)?.i(0)?;

        let ids: Vec<u32> = self.tokens.languages.iter().map(|(_, id)| *id).collect();
        let ids = Tensor::new(ids.as_slice(), &self.device)?;
        let probs = candle_nn::ops::softmax(&logits.index_select(&ids, 0)?, D::Minus1)?;
        let probs = probs.to_vec1::<f32>()?;

        let best = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(index, _)| self.tokens.languages[index].0);
        Ok(best)
    }

    /// Greedy decode of one window. `None` when the window holds no speech.
    fn decode_segment(&mut self, mel: &Tensor, language_token: Option<u32>) -> Result<Option<String>> {
        let audio_features = self.model.encoder.forward(mel, true)?;
        let sample_len = self.config.max_target_positions / 2;

        let mut tokens = vec![self.tokens.sot];
        if let Some(language_token) = language_token {
            tokens.push(language_token);
        }
        tokens.push(self.tokens.transcribe);
        tokens.push(self.tokens.no_timestamps);
        let prompt_len = tokens.len();

        let mut no_speech_prob = 0.0f32;
        let mut sum_logprob = 0.0f64;

        for i in 0..sample_len {
            let tokens_t = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
            let ys = self.model.decoder.forward(&tokens_t, &audio_features, i == 0)?;

            if i == 0 {
                if let Some(no_speech) = self.tokens.no_speech {
                    let logits = self.model.decoder.final_linear(&ys.i(..1)?)?.i(0)?.i(0)?;
                    no_speech_prob = candle_nn::ops::softmax(&logits, 0)?
                        .i(no_speech as usize)?
                        .to_scalar::<f32>()?;
                }
            }

            let (_, seq_len, _) = ys.dims3()?;
            let logits = self
                .model
                .decoder
                .final_linear(&ys.i((..1, seq_len - 1..))?)?
                .i(0)?
                .i(0)?;
            let logits = logits.broadcast_add(&self.suppress_tokens)?;
            let next_token = logits.argmax(D::Minus1)?.to_scalar::<u32>()?;

            let logprob = candle_nn::ops::log_softmax(&logits, D::Minus1)?
                .i(next_token as usize)?
                .to_scalar::<f32>()?;
            sum_logprob += logprob as f64;

            tokens.push(next_token);
            if next_token == self.tokens.eot || tokens.len() > self.config.max_target_positions {
                break;
            }
        }

        let generated = tokens.len() - prompt_len;
        let avg_logprob = sum_logprob / generated.max(1) as f64;
        if no_speech_prob as f64 > m::NO_SPEECH_THRESHOLD && avg_logprob < m::LOGPROB_THRESHOLD {
            tracing::debug!("Skipping silent segment (no_speech_prob {:.2})", no_speech_prob);
            return Ok(None);
        }

        let text = self
            .tokenizer
            .decode(&tokens[prompt_len..], true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    /// Transcribe one second of silence to make sure the weights produce output.
    fn validate(&mut self) -> Result<()> {
        let silence = vec![0.0f32; m::SAMPLE_RATE];
        let result = self.transcribe_pcm(&silence)?;
        tracing::debug!("Whisper validation successful, test result: '{}'", result.text);
        Ok(())
    }
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

async fn download_model_files(size: ModelSize, hf_token: Option<String>) -> Result<ModelFiles> {
    use hf_hub::api::tokio::ApiBuilder;

    let mut builder = ApiBuilder::new().with_progress(false).with_token(hf_token);
    if let Ok(cache_dir) = std::env::var("HF_HUB_CACHE") {
        builder = builder.with_cache_dir(cache_dir.into());
    } else if let Ok(hf_home) = std::env::var("HF_HOME") {
        builder = builder.with_cache_dir(PathBuf::from(hf_home).join("hub"));
    }
    let api = builder.build().context("Failed to create HuggingFace API client")?;

    let repo_name = size.repo_name();
    let repo = api.model(repo_name.to_string());
    tracing::info!("Fetching model files from {}", repo_name);

    let get = |file: &'static str| {
        let repo = &repo;
        async move {
            repo.get(file)
                .await
                .with_context(|| format!("Failed to download {} from {}", file, repo_name))
        }
    };

    Ok(ModelFiles {
        config: get("config.json").await?,
        tokenizer: get("tokenizer.json").await?,
        weights: get("model.safetensors").await?,
    })
}

/// Slaney-style mel filter bank laid out `[n_mels][n_fft / 2 + 1]`, matching the
/// filters Whisper was trained with.
pub fn mel_filter_bank(sample_rate: usize, n_fft: usize, n_mels: usize) -> Vec<f32> {
    let n_freqs = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;

    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let max_mel = hz_to_mel(nyquist);
    let mel_freqs: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut filters = vec![0.0f32; n_mels * n_freqs];
    for m in 0..n_mels {
        let (lower_edge, center, upper_edge) = (mel_freqs[m], mel_freqs[m + 1], mel_freqs[m + 2]);
        let enorm = 2.0 / (upper_edge - lower_edge);
        for (k, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - lower_edge) / (center - lower_edge);
            let upper = (upper_edge - freq) / (upper_edge - center);
            let weight = lower.min(upper).max(0.0);
            filters[m * n_freqs + k] = (weight * enorm) as f32;
        }
    }
    filters
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// [`Transcriber`] backed by an in-process Whisper model.
///
/// Inference is CPU/GPU bound, so it runs on the blocking pool; the model mutex
/// serializes requests because decoding mutates the key/value caches.
pub struct WhisperTranscriber {
    model: Arc<Mutex<WhisperModel>>,
    decoder: AudioDecoder,
}

impl WhisperTranscriber {
    pub fn new(model: WhisperModel, decoder: AudioDecoder) -> Self {
        tracing::debug!(
            "Whisper {} ready on {}",
            model.size(),
            crate::device::describe(model.device())
        );
        Self {
            model: Arc::new(Mutex::new(model)),
            decoder,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        let pcm = self.decoder.decode_file(audio_path).await?;
        let model = Arc::clone(&self.model);

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow!("Whisper model lock poisoned"))?;
            model.transcribe_pcm(&pcm)
        })
        .await
        .context("Transcription task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parsing() {
        assert_eq!("medium".parse::<ModelSize>().unwrap(), ModelSize::Medium);
        assert_eq!("LARGE".parse::<ModelSize>().unwrap(), ModelSize::Large);
        assert!("invalid".parse::<ModelSize>().is_err());
        assert_eq!(ModelSize::Base.to_string(), "base");
        assert_eq!(ModelSize::Large.repo_name(), "openai/whisper-large-v2");
    }

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [0.0, 440.0, 1000.0, 4000.0, 8000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_mel_filter_bank_shape() {
        let filters = mel_filter_bank(16000, 400, 80);
        assert_eq!(filters.len(), 80 * 201);
        assert!(filters.iter().all(|w| *w >= 0.0 && w.is_finite()));

        // Every filter covers at least one frequency bin
        for row in filters.chunks(201) {
            assert!(row.iter().any(|w| *w > 0.0));
        }
    }

    #[test]
    fn test_mel_filters_move_up_in_frequency() {
        let filters = mel_filter_bank(16000, 400, 80);
        let peak = |row: &[f32]| {
            row.iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap()
        };
        let peaks: Vec<usize> = filters.chunks(201).map(peak).collect();
        assert!(peaks.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_language_codes_are_unique() {
        let mut codes = LANGUAGES.to_vec();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), LANGUAGES.len());
    }
}
