//! # Health Check and Monitoring
//!
//! - `GET /`: the liveness probe clients poll; always `{"status": "ok"}`
//! - `GET /health`: uptime, counters, process memory and the state of every model
//! - `GET /api/v1/metrics`: per-endpoint request statistics
//!
//! None of these trigger a model load; they only report what the cache already knows.

use crate::device;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Speech translation service is running."
    }))
}

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = &state.config;
    let models = state.models.snapshot();

    // Only the optional punctuation model may be down while the service is fully usable.
    let degraded = models
        .iter()
        .any(|model| !model.optional && model.status.is_failed());
    let loaded = models.iter().filter(|model| model.status.is_loaded()).count();

    HttpResponse::Ok().json(json!({
        "status": if degraded { "degraded" } else { "healthy" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(metrics.error_count, metrics.request_count)
        },
        "memory": get_memory_info(),
        "models": {
            "whisper_model": config.models.whisper_model,
            "translation_model": config.models.translation_model,
            "punctuation_model": config.models.punctuation_model,
            "device": device::describe(&device::select_device(config.device_preference())),
            "loaded": loaded,
            "cache": models
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();
    endpoint_stats.sort_by(|a, b| a["endpoint"].as_str().cmp(&b["endpoint"].as_str()));

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(metrics.error_count, metrics.request_count),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info()
    }))
}

fn error_rate(errors: u64, requests: u64) -> f64 {
    if requests > 0 {
        errors as f64 / requests as f64
    } else {
        0.0
    }
}

/// Resident and virtual memory of this process, from `/proc` on Linux.
fn get_memory_info() -> serde_json::Value {
    match read_proc_memory() {
        Some((resident, virtual_size)) => json!({
            "resident_memory_bytes": resident,
            "virtual_memory_bytes": virtual_size,
            "available": true
        }),
        None => json!({
            "resident_memory_bytes": 0,
            "virtual_memory_bytes": 0,
            "available": false
        }),
    }
}

#[cfg(target_os = "linux")]
fn read_proc_memory() -> Option<(u64, u64)> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", std::process::id())).ok()?;
    let field = |name: &str| {
        status
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };
    Some((field("VmRSS:")?, field("VmSize:")?))
}

#[cfg(not(target_os = "linux"))]
fn read_proc_memory() -> Option<(u64, u64)> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::MockModelLoader;
    use actix_web::{test, App};
    use std::sync::Arc;

    fn test_state() -> web::Data<AppState> {
        web::Data::new(AppState::new(
            AppConfig::default(),
            Arc::new(MockModelLoader::new()),
        ))
    }

    #[actix_web::test]
    async fn test_root_probe() {
        let app = test::init_service(App::new().route("/", web::get().to(root))).await;
        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert!(body["message"].is_string());
    }

    #[actix_web::test]
    async fn test_health_reports_unloaded_models() {
        let app = test::init_service(
            App::new()
                .app_data(test_state())
                .route("/health", web::get().to(health_check)),
        )
        .await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "healthy");
        let cache = body["models"]["cache"].as_array().unwrap();
        assert_eq!(cache.len(), 3);
        assert!(cache.iter().all(|model| model["state"] == "unloaded"));
    }

    #[actix_web::test]
    async fn test_metrics_lists_endpoints() {
        let state = test_state();
        state.record_endpoint_request("POST /api/translate", 40, false);

        let app = test::init_service(
            App::new()
                .app_data(state)
                .route("/api/v1/metrics", web::get().to(detailed_metrics)),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/v1/metrics").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["endpoints"][0]["endpoint"], "POST /api/translate");
        assert_eq!(body["endpoints"][0]["average_duration_ms"], 40.0);
    }
}
