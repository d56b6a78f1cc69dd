//! # Configuration Management
//!
//! Loads the service configuration from several layered sources:
//! - Built-in defaults (the `Default` impl below)
//! - An optional `config.toml` next to the binary's working directory
//! - Environment variables prefixed with `APP_`, with `__` between section and key
//!   (`APP_SERVER__PORT=9000`, `APP_INFERENCE__BASE_URL=http://gpu-box:8080`)
//! - The bare `HOST` / `PORT` variables most deployment platforms set
//!
//! ## Priority (highest to lowest):
//! 1. `HOST` / `PORT`
//! 2. `APP_*` environment variables
//! 3. `config.toml`
//! 4. Defaults

use crate::device::DevicePreference;
use crate::models::whisper::ModelSize;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Complete service configuration.
///
/// Grouped by concern so each part of the service only needs to look at its own section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub inference: InferenceConfig,
    pub audio: AudioConfig,
    pub cors: CorsConfig,
}

/// HTTP listener settings.
///
/// `workers = 0` keeps actix-web's default of one worker per physical core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

/// Which models back each pipeline stage.
///
/// ## Fields:
/// - `whisper_model`: Whisper size used for transcription ("tiny" .. "large")
/// - `translation_model`: model id served by the inference server for translation
/// - `punctuation_model`: model id served by the inference server for punctuation restoration
/// - `device`: compute device for in-process models ("auto", "cpu", "cuda", "metal")
/// - `preload`: load the punctuation and translation models during startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub whisper_model: String,
    pub translation_model: String,
    pub punctuation_model: String,
    pub device: String,
    pub preload: bool,
}

/// Connection to the inference server hosting the text models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub base_url: String,
    /// Bearer token; falls back to the `HF_TOKEN` environment variable
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

/// Handling of uploaded audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Directory for transient audio files (OS temp dir when unset)
    pub temp_dir: Option<PathBuf>,
    pub file_suffix: String,
    pub max_audio_bytes: usize,
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// `["*"]` allows any origin
    pub allowed_origins: Vec<String>,
    pub max_age_secs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                workers: 0,
            },
            models: ModelsConfig {
                whisper_model: "base".to_string(),
                translation_model: "facebook/nllb-200-distilled-600M".to_string(),
                punctuation_model: "oliverguhr/fullstop-punctuation-multilang-large".to_string(),
                device: "auto".to_string(),
                preload: true,
            },
            inference: InferenceConfig {
                base_url: "http://127.0.0.1:8080".to_string(),
                api_token: None,
                timeout_secs: 120,
            },
            audio: AudioConfig {
                temp_dir: None,
                file_suffix: ".webm".to_string(),
                max_audio_bytes: 50 * 1024 * 1024,
                ffmpeg_path: "ffmpeg".to_string(),
            },
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
                max_age_secs: 3600,
            },
        }
    }
}

/// `APP_` prefixed variables. Section and key are split on `__` so keys may contain `_`.
fn app_environment() -> config::Environment {
    config::Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("cors.allowed_origins")
}

impl AppConfig {
    /// Load configuration from all sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=9000`
    /// - `APP_MODELS__WHISPER_MODEL=small`
    /// - `APP_INFERENCE__BASE_URL=http://gpu-box:8080`
    /// - `APP_CORS__ALLOWED_ORIGINS=http://localhost:5173,https://app.example.com`
    /// - `PORT=3000` (deployment platforms)
    pub fn load() -> Result<Self> {
        Self::load_from(app_environment())
    }

    fn load_from(environment: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(environment);

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let mut config: AppConfig = settings.build()?.try_deserialize()?;

        if config.inference.api_token.is_none() {
            config.inference.api_token = env::var("HF_TOKEN").ok().filter(|t| !t.is_empty());
        }

        Ok(config)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        self.models
            .whisper_model
            .parse::<ModelSize>()
            .map_err(|e| anyhow::anyhow!("Invalid whisper model: {}", e))?;

        if self.models.translation_model.trim().is_empty() {
            return Err(anyhow::anyhow!("Translation model id cannot be empty"));
        }

        if self.models.punctuation_model.trim().is_empty() {
            return Err(anyhow::anyhow!("Punctuation model id cannot be empty"));
        }

        self.models
            .device
            .parse::<DevicePreference>()
            .map_err(|e| anyhow::anyhow!("Invalid device: {}", e))?;

        if !(self.inference.base_url.starts_with("http://")
            || self.inference.base_url.starts_with("https://"))
        {
            return Err(anyhow::anyhow!(
                "Inference base URL must start with http:// or https://, got '{}'",
                self.inference.base_url
            ));
        }

        if self.inference.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Inference timeout must be greater than 0"));
        }

        if self.audio.max_audio_bytes == 0 {
            return Err(anyhow::anyhow!("Max audio size must be greater than 0"));
        }

        Ok(())
    }

    /// The configured Whisper size. Only call after [`AppConfig::validate`].
    pub fn whisper_size(&self) -> ModelSize {
        self.models.whisper_model.parse().unwrap_or(ModelSize::Base)
    }

    pub fn device_preference(&self) -> DevicePreference {
        self.models.device.parse().unwrap_or_default()
    }

    /// Directory transient audio files are written to.
    pub fn temp_dir(&self) -> PathBuf {
        self.audio.temp_dir.clone().unwrap_or_else(env::temp_dir)
    }
}
