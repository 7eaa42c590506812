//! # Application State Management
//!
//! Shared state handed to every HTTP handler and every WebSocket actor.
//!
//! ## Ownership Model:
//! - **config**: loaded once at startup and never changed, so a plain `Arc` is enough
//! - **metrics**: updated by every request and every frame, so `Arc<RwLock<T>>`
//! - **registry**: the session store, internally synchronized and cheap to clone
//! - **recognizer**: the decision cycle (windowing, inference client, smoothing), shared
//!   read-only by all connections
//!
//! ## Arc<RwLock<T>> Pattern
//! - **Arc**: Multiple ownership (every handler and actor holds a reference)
//! - **RwLock**: Many readers (the metrics endpoints) or one writer (a counter bump)
//!
//! Poisoned locks are recovered with `PoisonError::into_inner`; counters stay readable after
//! a panic elsewhere.

use crate::config::AppConfig;
use crate::inference::HttpPredictor;
use crate::recognition::{SignRecognizer, SessionRegistry};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers and
/// WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration
    pub config: Arc<AppConfig>,

    /// Counters updated by the middleware and the connection actors
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Live recognition sessions keyed by connection id
    pub registry: SessionRegistry,

    /// The decision cycle every connection runs its frames through
    pub recognizer: SignRecognizer,

    /// When the server started
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests and WebSocket connections.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of HTTP errors since server start
    pub error_count: u64,

    /// Currently open recognition WebSocket connections
    pub active_connections: u32,

    /// Recognition connections accepted since server start
    pub total_connections: u64,

    /// Pipeline counters
    pub recognition: RecognitionMetrics,

    /// Detailed metrics for each API endpoint
    /// Key: endpoint name (e.g., "GET /health")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Frame and inference counters, summed over all connections.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecognitionMetrics {
    /// Frames accepted into a session
    pub frames_received: u64,

    /// Messages dropped as malformed frames
    pub malformed_frames: u64,

    /// Inference calls attempted
    pub inference_calls: u64,

    /// Inference calls that failed (transport, status, timeout, bad response)
    pub inference_failures: u64,

    /// Labels sent to clients
    pub labels_emitted: u64,

    /// Sessions removed by the idle sweep
    pub sessions_expired: u64,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Create the application state, including the HTTP inference client.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let predictor = HttpPredictor::new(&config.recognition)?;
        let recognizer = SignRecognizer::new(&config.recognition, Arc::new(predictor));
        Ok(Self::with_recognizer(config, recognizer))
    }

    /// Create the application state around an existing recognizer.
    pub fn with_recognizer(config: AppConfig, recognizer: SignRecognizer) -> Self {
        let registry = SessionRegistry::new(config.session.ttl());
        Self {
            config: Arc::new(config),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            registry,
            recognizer,
            start_time: Instant::now(),
        }
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.metrics_mut().request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        self.metrics_mut().error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// The first time an endpoint is seen a zeroed `EndpointMetric` is created for it.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_mut();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Called when a recognition WebSocket is accepted.
    pub fn connection_opened(&self) {
        let mut metrics = self.metrics_mut();
        metrics.active_connections += 1;
        metrics.total_connections += 1;
    }

    /// Called when a recognition WebSocket closes. Never underflows.
    pub fn connection_closed(&self) {
        let mut metrics = self.metrics_mut();
        metrics.active_connections = metrics.active_connections.saturating_sub(1);
    }

    /// Apply a change to the pipeline counters.
    pub fn record_recognition(&self, update: impl FnOnce(&mut RecognitionMetrics)) {
        update(&mut self.metrics_mut().recognition);
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Cloning releases the lock before the response is serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_ref().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn metrics_mut(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn metrics_ref(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AppMetrics {
    /// Fraction of HTTP requests that failed (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl RecognitionMetrics {
    /// Fraction of inference calls that failed (0.0 to 1.0).
    pub fn inference_failure_rate(&self) -> f64 {
        if self.inference_calls > 0 {
            self.inference_failures as f64 / self.inference_calls as f64
        } else {
            0.0
        }
    }
}

impl EndpointMetric {
    /// Average = Total Duration ÷ Number of Requests
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error Rate = Number of Errors ÷ Total Requests
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
