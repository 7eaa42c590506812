//! # Configuration Management
//!
//! This module loads the process-wide configuration once at startup. After loading it is
//! wrapped in an `Arc` and never mutated again, so every connection sees the same label
//! vocabulary and pacing constants for the lifetime of the process.
//!
//! ## Sources (highest priority first):
//! 1. Platform variables: `HOST`, `PORT`, `SIGN_RECOGNITION_MODEL_ENDPOINT`
//! 2. Environment variables with the `APP_` prefix and `__` as the section separator
//!    (e.g. `APP_RECOGNITION__NUM_FRAMES=48`, `APP_SESSION__TTL_SECS=120`)
//! 3. Configuration file (`config.toml`, optional)
//! 4. Default values (the `Default` impl below)

use crate::recognition::normalizer::DEFAULT_TARGET_FPS;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Labels the bundled model was trained on, in output-index order.
const DEFAULT_PREDICTION_LABELS: [&str; 25] = [
    "BUY", "DO", "EAT", "FINE", "GO", "HAMBURGER", "HELLO", "HOW", "I/ME", "LEAVE", "LONG",
    "LUNCH", "NO", "PERFECT", "PIZZA", "SAME", "SINCE", "THANK YOU", "TIME", "TOGETHER",
    "WANT", "WATER", "WHAT", "YES", "YOU",
];

/// Main application configuration.
///
/// One table per concern in `config.toml`: `[server]`, `[recognition]` and `[session]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub recognition: RecognitionConfig,
    pub session: SessionConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Settings for the frame pipeline and the inference endpoint.
///
/// ## Fields:
/// - `model_endpoint`: URL the landmark window is POSTed to
/// - `num_frames`: window size submitted to the model (`NUM_FRAMES`)
/// - `prediction_interval`: normalized frames between inference calls (`PREDICTION_INTERVAL`)
/// - `prediction_labels`: vocabulary aligned with the model's output vector (`PREDICTION_LABELS`)
/// - `num_consecutive_predictions`: agreeing predictions required before emitting
/// - `min_prediction_confidence`: score floor for an emission
/// - `target_fps`: frame rate the temporal normalizer fills gaps up to
/// - `request_timeout_ms`: inference calls slower than this count as failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub model_endpoint: String,
    pub num_frames: usize,
    pub prediction_interval: u64,
    pub prediction_labels: Vec<String>,
    pub num_consecutive_predictions: usize,
    pub min_prediction_confidence: f64,
    pub target_fps: u32,
    pub request_timeout_ms: u64,
}

/// Session lifecycle settings.
///
/// `ttl_secs` and `check_period_secs` drive the registry's idle sweep; the heartbeat
/// values drive the WebSocket liveness check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub check_period_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            recognition: RecognitionConfig {
                model_endpoint: "http://127.0.0.1:8501/predict".to_string(),
                num_frames: 32,
                prediction_interval: 8,
                prediction_labels: DEFAULT_PREDICTION_LABELS
                    .iter()
                    .map(|label| label.to_string())
                    .collect(),
                num_consecutive_predictions: 4,
                min_prediction_confidence: 0.9,
                target_fps: DEFAULT_TARGET_FPS,
                request_timeout_ms: 2000,
            },
            session: SessionConfig {
                ttl_secs: 60,
                check_period_secs: 30,
                heartbeat_interval_secs: 5,
                client_timeout_secs: 30,
            },
        }
    }
}

impl RecognitionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn check_period(&self) -> Duration {
        Duration::from_secs(self.check_period_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from all sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__HOST=0.0.0.0`: Override server host
    /// - `APP_RECOGNITION__PREDICTION_LABELS=HELLO,THANK YOU`: Override the vocabulary
    /// - `SIGN_RECOGNITION_MODEL_ENDPOINT=http://model:8501/predict`: Override the endpoint
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("recognition.prediction_labels")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(endpoint) = env::var("SIGN_RECOGNITION_MODEL_ENDPOINT") {
            settings = settings.set_override("recognition.model_endpoint", endpoint)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Window sizes, intervals, periods and timeouts must be non-zero; the confidence floor
    /// must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        let recognition = &self.recognition;
        if recognition.model_endpoint.trim().is_empty() {
            return Err(anyhow::anyhow!("Model endpoint must be set"));
        }
        if recognition.num_frames == 0 {
            return Err(anyhow::anyhow!("num_frames must be greater than 0"));
        }
        if recognition.prediction_interval == 0 {
            return Err(anyhow::anyhow!("prediction_interval must be greater than 0"));
        }
        if recognition.num_consecutive_predictions == 0 {
            return Err(anyhow::anyhow!(
                "num_consecutive_predictions must be greater than 0"
            ));
        }
        if recognition.prediction_labels.is_empty() {
            return Err(anyhow::anyhow!("prediction_labels cannot be empty"));
        }
        if !(0.0..=1.0).contains(&recognition.min_prediction_confidence) {
            return Err(anyhow::anyhow!(
                "min_prediction_confidence must be within [0, 1], got {}",
                recognition.min_prediction_confidence
            ));
        }
        if recognition.target_fps == 0 {
            return Err(anyhow::anyhow!("target_fps must be greater than 0"));
        }
        if recognition.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("request_timeout_ms must be greater than 0"));
        }

        let session = &self.session;
        if session.ttl_secs == 0 || session.check_period_secs == 0 {
            return Err(anyhow::anyhow!(
                "Session TTL and check period must be greater than 0"
            ));
        }
        if session.heartbeat_interval_secs == 0 || session.client_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "Heartbeat interval and client timeout must be greater than 0"
            ));
        }

        Ok(())
    }
}
