//! # Speech Translator Service
//!
//! HTTP service that translates text between 200 languages and turns recorded speech
//! into translated text.
//!
//! ## Architecture:
//! - **HTTP layer** (`handlers`, `middleware`, `health`): actix-web routes and JSON I/O
//! - **Pipeline** (`pipeline`): punctuate → translate, transcribe → punctuate → translate
//! - **Models** (`models`): loaded-once model cache over Whisper (candle) and an
//!   inference server for NLLB translation and punctuation restoration
//! - **Support** (`config`, `languages`, `audio`, `device`, `error`, `state`)
//!
//! ## Startup:
//! 1. Read `.env`, set up tracing, load and validate configuration
//! 2. Build the model cache and pipeline
//! 3. Optionally preload the punctuation and translation models
//! 4. Serve until SIGINT/SIGTERM, then shut down gracefully

mod audio;
mod config;
mod device;
mod error;
mod handlers;
mod health;
mod languages;
mod middleware;
mod models;
mod pipeline;
mod state;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use models::{DefaultModelLoader, ModelKind};
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once a shutdown signal arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    info!(
        "Models: whisper={}, translation={}, punctuation={} (inference server {})",
        config.models.whisper_model,
        config.models.translation_model,
        config.models.punctuation_model,
        config.inference.base_url
    );

    let loader = Arc::new(DefaultModelLoader::new(&config)?);
    let app_state = AppState::new(config.clone(), loader);

    if config.models.preload {
        preload_models(&app_state).await;
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_data = web::Data::new(app_state);
    let cors_config = config.cors.clone();
    let max_audio_bytes = config.audio.max_audio_bytes;

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .app_data(handlers::json_config(max_audio_bytes))
            // Middleware runs in reverse registration order for responses
            .wrap(build_cors(&cors_config))
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure_routes)
            .default_service(web::to(handlers::not_found))
    })
    .disable_signals();

    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    let server = server.bind(&bind_addr)?.run();
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speech_translator=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// `["*"]` allows any origin; anything else is an explicit allow-list.
fn build_cors(config: &config::CorsConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        .supports_credentials()
        .max_age(config.max_age_secs);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        cors = cors.allow_any_origin();
    } else {
        for origin in &config.allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }
    cors
}

/// Load the text models before serving so the first request does not pay for it.
/// Transcription stays lazy. Failures are cached and reported, not fatal.
async fn preload_models(state: &AppState) {
    info!("Preloading punctuation and translation models...");
    let (punctuation, translation) = tokio::join!(
        state.models.ensure_loaded(ModelKind::Punctuation),
        state.models.ensure_loaded(ModelKind::Translation)
    );

    if let Err(e) = punctuation {
        warn!("Punctuation will be skipped: {}", e);
    }
    if let Err(e) = translation {
        error!("Translation requests will fail: {}", e);
    }
}

fn setup_signal_handlers() {
    tokio::spawn(async {
        wait_for_signal().await;
        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT");
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C");
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::header, test};

    #[actix_web::test]
    async fn test_cors_allow_list() {
        let cors_config = config::CorsConfig {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            max_age_secs: 60,
        };
        let app = test::init_service(
            App::new()
                .wrap(build_cors(&cors_config))
                .route("/", web::get().to(health::root)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((header::ORIGIN, "http://localhost:5173"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
    }
}
