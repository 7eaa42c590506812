//! HTTP middleware. Request spans come from `tracing_actix_web::TracingLogger`, wrapped in
//! `main`; this module holds the metrics collector.

pub mod metrics;

pub use metrics::MetricsMiddleware;
