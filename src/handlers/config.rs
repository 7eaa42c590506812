use crate::{error::AppResult, state::AppState};
use actix_web::{web, HttpResponse};
use anyhow::Context;
use serde_json::json;

/// `GET /api/v1/config`: the configuration the server was started with.
///
/// Read-only; configuration is fixed for the lifetime of the process.
pub async fn get_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();

    let recognition = serde_json::to_value(&config.recognition)
        .context("Failed to serialize recognition config")?;
    let session = serde_json::to_value(&config.session)
        .context("Failed to serialize session config")?;

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "recognition": recognition,
            "session": session
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test as actix_test, App};

    #[actix_web::test]
    async fn test_get_config() {
        let state = AppState::new(AppConfig::default()).unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/config", web::get().to(get_config)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/config").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;

        let recognition = &body["config"]["recognition"];
        assert_eq!(recognition["num_frames"], 32);
        assert_eq!(recognition["prediction_interval"], 8);
        assert_eq!(recognition["prediction_labels"][0], "BUY");
        assert_eq!(body["config"]["session"]["ttl_secs"], 60);
    }
}
