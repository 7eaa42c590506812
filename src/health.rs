use crate::state::{AppMetrics, AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "active_connections": metrics.active_connections
        },
        "recognition": recognition_status(&state, &metrics),
        "memory": get_memory_info()
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

    let recognition = &metrics.recognition;

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "connections": {
            "active": metrics.active_connections,
            "total": metrics.total_connections,
            "live_sessions": state.registry.len()
        },
        "recognition": {
            "frames_received": recognition.frames_received,
            "malformed_frames": recognition.malformed_frames,
            "inference_calls": recognition.inference_calls,
            "inference_failures": recognition.inference_failures,
            "inference_failure_rate": recognition.inference_failure_rate(),
            "labels_emitted": recognition.labels_emitted,
            "sessions_expired": recognition.sessions_expired
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info()
    }))
}

fn recognition_status(state: &AppState, metrics: &AppMetrics) -> serde_json::Value {
    let recognition = &metrics.recognition;
    let failure_rate = recognition.inference_failure_rate();

    // Only meaningful once a few calls have been made
    let status = if recognition.inference_calls >= 10 && failure_rate > 0.5 {
        "degraded"
    } else {
        "normal"
    };

    json!({
        "status": status,
        "model_endpoint": state.get_config().recognition.model_endpoint,
        "labels": state.recognizer.labels().len(),
        "live_sessions": state.registry.len(),
        "frames_received": recognition.frames_received,
        "inference_calls": recognition.inference_calls,
        "inference_failure_rate": failure_rate,
        "labels_emitted": recognition.labels_emitted
    })
}

fn get_memory_info() -> serde_json::Value {
    #[cfg(target_os = "linux")]
    {
        let pid = std::process::id();
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            let mut vm_rss = 0;
            let mut vm_size = 0;

            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    vm_rss = parse_kb(line);
                } else if line.starts_with("VmSize:") {
                    vm_size = parse_kb(line);
                }
            }

            return json!({
                "resident_memory_bytes": vm_rss,
                "virtual_memory_bytes": vm_size,
                "available": true
            });
        }
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": "Memory info not available on this platform"
    })
}

/// `VmRSS:     1234 kB` → bytes
fn parse_kb(line: &str) -> u64 {
    line.split_whitespace()
        .nth(1)
        .and_then(|kb| kb.parse::<u64>().ok())
        .unwrap_or(0)
        * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test as actix_test, App};

    fn state() -> AppState {
        AppState::new(AppConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_kb() {
        assert_eq!(parse_kb("VmRSS:\t    2048 kB"), 2048 * 1024);
        assert_eq!(parse_kb("VmRSS:"), 0);
    }

    #[test]
    fn test_recognition_status_degrades_on_failures() {
        let state = state();
        let status = recognition_status(&state, &state.get_metrics_snapshot());
        assert_eq!(status["status"], "normal");
        assert_eq!(status["labels"], 25);

        state.record_recognition(|m| {
            m.inference_calls = 20;
            m.inference_failures = 15;
        });
        let status = recognition_status(&state, &state.get_metrics_snapshot());
        assert_eq!(status["status"], "degraded");
    }

    #[actix_web::test]
    async fn test_health_endpoints() {
        let state = state();
        state.record_recognition(|m| m.frames_received = 7);

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/health", web::get().to(health_check))
                .route("/metrics", web::get().to(detailed_metrics)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["recognition"]["frames_received"], 7);

        let req = actix_test::TestRequest::get().uri("/metrics").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["recognition"]["frames_received"], 7);
        assert_eq!(body["connections"]["live_sessions"], 0);
    }
}
