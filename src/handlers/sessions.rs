use crate::{
    error::{AppError, AppResult},
    state::AppState,
};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `GET /api/v1/sessions`: every live recognition session.
pub async fn list_sessions(state: web::Data<AppState>) -> HttpResponse {
    let sessions = state.registry.summaries(state.recognizer.labels());

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "count": sessions.len(),
        "ttl_secs": state.get_config().session.ttl_secs,
        "sessions": sessions
    }))
}

/// `GET /api/v1/sessions/{connection_id}`
pub async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let connection_id = path.into_inner();

    let summary = state
        .registry
        .summary(&connection_id, state.recognizer.labels())
        .ok_or_else(|| AppError::NotFound(format!("Session '{}' is not active", connection_id)))?;

    Ok(HttpResponse::Ok().json(summary))
}
