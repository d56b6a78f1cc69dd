//! # Application State Management
//!
//! State shared by every request handler.
//!
//! ## Contents:
//! - **config**: the validated configuration, immutable after startup
//! - **metrics**: request counters updated by the metrics middleware
//! - **models**: the model cache, the only shared mutable model state
//! - **pipeline**: the request pipeline built on top of the cache
//!
//! ## Arc<RwLock<T>> Pattern
//! Metrics are written by every request and read by the health endpoints, so they sit
//! behind a reader-writer lock. The model cache does its own per-kind locking and is
//! shared through a plain `Arc`.

use crate::config::AppConfig;
use crate::models::{ModelCache, ModelLoader};
use crate::pipeline::{TranslationPipeline, TransientStorage};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The application state handed to actix as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,

    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,

    pub models: Arc<ModelCache>,

    pub pipeline: Arc<TranslationPipeline>,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Requests that ended with a 4xx or 5xx status
    pub error_count: u64,

    /// Key: `"METHOD /path"`
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Metrics for a single endpoint.
///
/// ## Performance calculations:
/// - **Average response time**: total_duration_ms / request_count
/// - **Error rate**: error_count / request_count
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Build the state: one model cache over `loader`, one pipeline over the cache.
    pub fn new(config: AppConfig, loader: Arc<dyn ModelLoader>) -> Self {
        let models = Arc::new(ModelCache::new(loader));
        let storage = TransientStorage::new(config.temp_dir(), config.audio.file_suffix.clone());
        let pipeline = Arc::new(TranslationPipeline::new(
            Arc::clone(&models),
            storage,
            config.audio.max_audio_bytes,
        ));

        Self {
            config: Arc::new(config),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            models,
            pipeline,
        }
    }

    // A panic while holding the metrics lock leaves plain counters behind, which are
    // still safe to read and update.
    fn metrics_read(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(|e| e.into_inner())
    }

    fn metrics_write(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn increment_request_count(&self) {
        self.metrics_write().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics_write().error_count += 1;
    }

    /// Record one finished request for `endpoint` (e.g. `"POST /api/translate"`).
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_write();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// A copy of the current metrics, so the lock is not held while serializing.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_read().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("models", &self.models)
            .field("uptime_secs", &self.get_uptime_seconds())
            .finish()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of failed requests, 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MockModelLoader;

    fn test_state() -> AppState {
        AppState::new(AppConfig::default(), Arc::new(MockModelLoader::new()))
    }

    #[test]
    fn test_endpoint_metrics() {
        let state = test_state();
        state.record_endpoint_request("POST /api/translate", 120, false);
        state.record_endpoint_request("POST /api/translate", 80, true);
        state.increment_request_count();
        state.increment_error_count();

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 1);
        assert_eq!(snapshot.error_count, 1);

        let metric = &snapshot.endpoint_metrics["POST /api/translate"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 100.0);
        assert_eq!(metric.error_rate(), 0.5);
    }

    #[test]
    fn test_empty_metric_rates() {
        let metric = EndpointMetric::default();
        assert_eq!(metric.average_duration_ms(), 0.0);
        assert_eq!(metric.error_rate(), 0.0);
    }
}
