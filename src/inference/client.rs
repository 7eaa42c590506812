//! # Inference Client
//!
//! The sign classifier runs behind an HTTP endpoint. One call submits one window of
//! landmark frames and gets back a score per label.
//!
//! ## Wire Format:
//! - **Request**: `POST {endpoint}` with `{ "data": [ window ] }`, where `window` is the
//!   list of frames and each frame the list of `[x, y]` points (a batch of one)
//! - **Response**: `{ "result": [[ [score, ...] ]] }`; the score vector is `result[0][0]`

use crate::config::RecognitionConfig;
use crate::error::InferenceError;
use crate::recognition::frame::Point;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, trace};

/// Anything that turns a landmark window into a score vector.
///
/// The returned future is `'static` so a connection actor can own it while the call is
/// in flight.
pub trait Predictor: Send + Sync {
    fn predict(&self, window: Vec<Vec<Point>>) -> BoxFuture<'static, Result<Vec<f64>, InferenceError>>;
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    data: Vec<Vec<Vec<Point>>>,
}

/// `Predictor` backed by the HTTP model endpoint.
///
/// `reqwest::Client` pools connections internally and is cheap to clone, so one client is
/// shared by every connection.
#[derive(Debug, Clone)]
pub struct HttpPredictor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPredictor {
    /// Build a client for `config.model_endpoint`.
    ///
    /// Calls slower than `config.request_timeout_ms` fail with `InferenceError::Timeout`.
    pub fn new(config: &RecognitionConfig) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                InferenceError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.model_endpoint.clone(),
        })
    }
}

impl Predictor for HttpPredictor {
    fn predict(&self, window: Vec<Vec<Point>>) -> BoxFuture<'static, Result<Vec<f64>, InferenceError>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        Box::pin(async move {
            let start_time = Instant::now();
            let frames = window.len();
            let request = PredictRequest { data: vec![window] };

            let response = client.post(&endpoint).json(&request).send().await?;

            let status = response.status();
            if !status.is_success() {
                return Err(InferenceError::Status(status.as_u16()));
            }

            let body: Value = response.json().await?;
            let scores = extract_scores(&body)?;

            debug!(
                frames,
                scores = scores.len(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Inference call completed"
            );
            trace!(?scores, "Raw inference scores");

            Ok(scores)
        })
    }
}

/// Unwrap `result[0][0]` of a response body into a score vector.
pub fn extract_scores(body: &Value) -> Result<Vec<f64>, InferenceError> {
    let scores = body
        .get("result")
        .and_then(|result| result.get(0))
        .and_then(|batch| batch.get(0))
        .ok_or_else(|| {
            InferenceError::MalformedResponse("missing result[0][0]".to_string())
        })?;

    let scores: Vec<f64> = serde_json::from_value(scores.clone())
        .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

    if scores.is_empty() {
        return Err(InferenceError::MalformedResponse(
            "empty score vector".to_string(),
        ));
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;

    #[test]
    fn test_extract_scores() {
        let body = json!({ "result": [[[0.1, 0.7, 0.2]]] });
        assert_eq!(extract_scores(&body).unwrap(), vec![0.1, 0.7, 0.2]);

        // Extra batch entries are ignored
        let body = json!({ "result": [[[0.9, 0.1], [0.5, 0.5]], [[0.0, 1.0]]] });
        assert_eq!(extract_scores(&body).unwrap(), vec![0.9, 0.1]);
    }

    #[test]
    fn test_extract_scores_rejects_malformed_bodies() {
        for body in [
            json!({}),
            json!({ "result": [] }),
            json!({ "result": [[]] }),
            json!({ "result": [[["high", "low"]]] }),
            json!({ "result": [[[]]] }),
            json!({ "predictions": [[[0.5, 0.5]]] }),
        ] {
            assert!(
                matches!(extract_scores(&body), Err(InferenceError::MalformedResponse(_))),
                "accepted {}",
                body
            );
        }
    }

    #[test]
    fn test_request_body_shape() {
        let window = vec![vec![[0.1, 0.2]; 2]; 3];
        let request = PredictRequest { data: vec![window] };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["data"][0].as_array().map(Vec::len), Some(3));
        assert_eq!(json["data"][0][2][1], json!([0.1, 0.2]));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_inference_error() {
        let mut config = AppConfig::default().recognition;
        // Port 9 (discard) on localhost is closed on test machines
        config.model_endpoint = "http://127.0.0.1:9/predict".to_string();
        config.request_timeout_ms = 500;

        let predictor = HttpPredictor::new(&config).unwrap();
        assert_eq!(predictor.endpoint, "http://127.0.0.1:9/predict");

        let result = predictor.predict(vec![vec![[0.0, 0.0]; 75]; 2]).await;
        assert!(matches!(
            result,
            Err(InferenceError::Transport(_)) | Err(InferenceError::Timeout)
        ));
    }
}
