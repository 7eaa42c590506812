//! # Sign Recognition Backend - Main Application Entry Point
//!
//! Streams hand and pose landmarks from clients over WebSocket, runs them through an
//! external sign classifier, and streams recognized sign labels back.
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **state**: Shared application state and metrics
//! - **recognition**: Frame normalization, windowing, smoothing and sessions
//! - **inference**: Client for the external model endpoint
//! - **websocket**: One actor per recognition connection
//! - **health**: Health and metrics endpoints
//! - **handlers**: REST handlers for configuration and sessions
//! - **middleware**: Request metrics
//! - **error**: Error types and HTTP error responses

mod config;
mod error;
mod handlers;
mod health;
mod inference;
mod middleware;
mod recognition;
mod state;
mod websocket;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once SIGTERM or SIGINT arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting sign-recognition-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        model_endpoint = %config.recognition.model_endpoint,
        window = config.recognition.num_frames,
        interval = config.recognition.prediction_interval,
        labels = config.recognition.prediction_labels.len(),
        "Recognition configured"
    );

    let app_state = AppState::new(config.clone()).context("Failed to create application state")?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    spawn_session_sweeper(&app_state);
    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::MetricsMiddleware)
            .wrap(TracingLogger::default())
            .route(
                "/signRecognition",
                web::get().to(websocket::sign_recognition_socket),
            )
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/sessions", web::get().to(handlers::list_sessions))
                    .route(
                        "/sessions/{connection_id}",
                        web::get().to(handlers::get_session),
                    ),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
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

/// Initialize tracing.
///
/// `RUST_LOG` controls the filter; defaults to
/// `sign_recognition_backend=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sign_recognition_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

/// Evict idle sessions in the background for the lifetime of the server.
fn spawn_session_sweeper(app_state: &AppState) {
    let period = app_state.get_config().session.check_period();
    let metrics_state = app_state.clone();

    tokio::spawn(app_state.registry.clone().run_sweeper(period, move |removed| {
        metrics_state.record_recognition(|m| m.sessions_expired += removed as u64);
    }));
}

/// Set the shutdown flag on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let (mut sigterm, mut sigint) = match (
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()),
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
