//! # Sign Recognition WebSocket Handler
//!
//! Clients connect to `/signRecognition` and stream landmark frames; the server answers
//! with a bare label string whenever a sign is recognized.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: each connection gets a fresh UUID and its own recognition session
//! 2. **Frames**: every text message is one frame, `{ "time": ms, "data": [[x, y] × 75] }`
//! 3. **Labels**: the server sends a text message containing only the label, and only when
//!    the smoothed prediction changes to a new confident sign
//! 4. **Errors**: never sent to the client; malformed frames and failed inference calls
//!    are logged and counted, and the connection stays open
//! 5. **Heartbeat**: protocol-level pings; a silent client is disconnected
//!
//! ## Ordering:
//! Frames are processed strictly in arrival order. A decision cycle runs inside
//! `ctx.wait`, which blocks the actor's mailbox and stream until the cycle (including the
//! inference call) finishes, so a connection never has two cycles in flight.
//!
//! Heartbeat checks and a client Close are deferred the same way. A connection closed
//! mid-cycle stores the finished session first; `stopped` then evicts it.

use crate::error::FrameError;
use crate::recognition::{Cycle, Frame, Outcome};
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// One recognition connection.
pub struct SignRecognitionSocket {
    connection_id: String,
    state: AppState,
    last_heartbeat: Instant,
}

impl SignRecognitionSocket {
    pub fn new(state: AppState) -> Self {
        Self {
            connection_id: Uuid::new_v4().to_string(),
            state,
            last_heartbeat: Instant::now(),
        }
    }

    fn handle_frame(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                self.reject(err);
                return;
            }
        };

        self.state.record_recognition(|m| m.frames_received += 1);
        trace!(connection_id = %self.connection_id, time = frame.time, "Frame received");

        let session = self.state.registry.get_or_create(&self.connection_id);
        let recognizer = self.state.recognizer.clone();

        let cycle = async move { recognizer.process(session, frame).await };

        ctx.wait(cycle.into_actor(self).map(|cycle, act, ctx| {
            act.finish_cycle(cycle, ctx);
        }));
    }

    fn finish_cycle(&mut self, cycle: Cycle, ctx: &mut ws::WebsocketContext<Self>) {
        let Cycle { session, outcome } = cycle;
        let label = record_outcome(&self.state, &self.connection_id, outcome);
        self.state.registry.put(&self.connection_id, session);

        if let Some(label) = label {
            ctx.text(label);
        }
    }

    fn reject(&self, err: FrameError) {
        warn!(connection_id = %self.connection_id, error = %err, "Dropping frame");
        self.state.record_recognition(|m| m.malformed_frames += 1);
    }
}

/// Log and count one cycle outcome. Returns the label to send, if any.
fn record_outcome(state: &AppState, connection_id: &str, outcome: Outcome) -> Option<String> {
    match outcome {
        Outcome::Buffered => None,
        Outcome::Predicted {
            absolute_frame,
            emitted,
        } => {
            state.record_recognition(|m| {
                m.inference_calls += 1;
                if emitted.is_some() {
                    m.labels_emitted += 1;
                }
            });

            match &emitted {
                Some(label) => info!(connection_id, absolute_frame, label = %label, "Sign recognized"),
                None => debug!(connection_id, absolute_frame, "Prediction withheld by smoothing"),
            }
            emitted
        }
        Outcome::Failed {
            absolute_frame,
            error,
        } => {
            state.record_recognition(|m| {
                m.inference_calls += 1;
                m.inference_failures += 1;
            });
            warn!(connection_id, absolute_frame, error = %error, "Inference failed; cycle abandoned");
            None
        }
    }
}

impl Actor for SignRecognitionSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.state.connection_opened();
        info!(connection_id = %self.connection_id, "Recognition connection opened");

        let session_config = &self.state.get_config().session;
        let client_timeout = session_config.client_timeout();

        ctx.run_interval(session_config.heartbeat_interval(), move |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > client_timeout {
                warn!(connection_id = %act.connection_id, "Heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let evicted = self.state.registry.evict(&self.connection_id);
        self.state.connection_closed();
        info!(connection_id = %self.connection_id, evicted, "Recognition connection closed");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for SignRecognitionSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                self.handle_frame(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                self.last_heartbeat = Instant::now();
                self.reject(FrameError::UnsupportedPayload);
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                debug!(connection_id = %self.connection_id, ?reason, "Client closed connection");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                self.reject(FrameError::UnsupportedPayload);
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(connection_id = %self.connection_id, error = %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// WebSocket endpoint handler.
///
/// Upgrades the HTTP request; the `SignRecognitionSocket` actor owns the connection from
/// then on.
pub async fn sign_recognition_socket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    debug!(peer = ?req.connection_info().peer_addr(), "Recognition WebSocket requested");

    let socket = SignRecognitionSocket::new(app_state.get_ref().clone());
    ws::start(socket, &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::InferenceError;
    use crate::inference::Predictor;
    use crate::recognition::frame::tests::uniform_frame;
    use crate::recognition::frame::Point;
    use crate::recognition::SignRecognizer;
    use actix_web::{http::StatusCode, test as actix_test, App, HttpServer};
    use futures_util::future::BoxFuture;
    use futures_util::{SinkExt, StreamExt};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    /// Slow predictor that alternates between the two labels and tracks overlap.
    #[derive(Default)]
    struct SlowPredictor {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        /// Last-frame marker of every submitted window, in call order
        windows: Mutex<Vec<u64>>,
    }

    impl Predictor for SlowPredictor {
        fn predict(&self, window: Vec<Vec<Point>>) -> BoxFuture<'static, Result<Vec<f64>, InferenceError>> {
            let marker = window
                .last()
                .map(|frame| (frame[0][0] * 1000.0).round() as u64)
                .unwrap_or(0);
            let call = {
                let mut windows = self.windows.lock().unwrap();
                windows.push(marker);
                windows.len()
            };

            let in_flight = self.in_flight.clone();
            let max_in_flight = self.max_in_flight.clone();
            Box::pin(async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);

                if call % 2 == 1 {
                    Ok(vec![0.9, 0.1])
                } else {
                    Ok(vec![0.1, 0.9])
                }
            })
        }
    }

    fn live_state(predictor: Arc<SlowPredictor>) -> AppState {
        let mut config = AppConfig::default();
        config.recognition.num_frames = 4;
        config.recognition.prediction_interval = 2;
        config.recognition.num_consecutive_predictions = 1;
        config.recognition.min_prediction_confidence = 0.5;
        config.recognition.prediction_labels = vec!["A".to_string(), "B".to_string()];

        let recognizer = SignRecognizer::new(&config.recognition, predictor);
        AppState::with_recognizer(config, recognizer)
    }

    /// Serve `/signRecognition` on an ephemeral port.
    fn serve(state: AppState) -> (SocketAddr, actix_web::dev::ServerHandle) {
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/signRecognition", web::get().to(sign_recognition_socket))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (addr, handle)
    }

    /// Frame `i` is 33ms after frame `i - 1` and carries `(i + 1) / 1000` in every point.
    fn frame_message(i: i64) -> Message {
        let frame = uniform_frame(i * 33, (i + 1) as f64 / 1000.0);
        Message::Text(serde_json::to_string(&frame).unwrap())
    }

    /// Wait until the server side of the only connection has stopped.
    async fn wait_for_close(state: &AppState) {
        for _ in 0..100 {
            let metrics = state.get_metrics_snapshot();
            if metrics.total_connections == 1 && metrics.active_connections == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("connection still open after close");
    }

    fn state() -> AppState {
        AppState::new(AppConfig::default()).unwrap()
    }

    #[test]
    fn test_buffered_outcome_sends_nothing() {
        let state = state();
        assert_eq!(record_outcome(&state, "conn-1", Outcome::Buffered), None);
        assert_eq!(state.get_metrics_snapshot().recognition.inference_calls, 0);
    }

    #[test]
    fn test_emitted_label_is_sent_and_counted() {
        let state = state();
        let label = record_outcome(
            &state,
            "conn-1",
            Outcome::Predicted {
                absolute_frame: 56,
                emitted: Some("HELLO".to_string()),
            },
        );
        assert_eq!(label.as_deref(), Some("HELLO"));

        record_outcome(
            &state,
            "conn-1",
            Outcome::Predicted {
                absolute_frame: 64,
                emitted: None,
            },
        );

        let recognition = state.get_metrics_snapshot().recognition;
        assert_eq!(recognition.inference_calls, 2);
        assert_eq!(recognition.labels_emitted, 1);
    }

    #[test]
    fn test_failed_inference_sends_nothing() {
        let state = state();
        let label = record_outcome(
            &state,
            "conn-1",
            Outcome::Failed {
                absolute_frame: 32,
                error: InferenceError::Timeout,
            },
        );
        assert_eq!(label, None);

        let recognition = state.get_metrics_snapshot().recognition;
        assert_eq!(recognition.inference_failures, 1);
        assert_eq!(recognition.labels_emitted, 0);
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let state = state();
        let a = SignRecognitionSocket::new(state.clone());
        let b = SignRecognitionSocket::new(state);
        assert_ne!(a.connection_id, b.connection_id);
        assert!(Uuid::parse_str(&a.connection_id).is_ok());
    }

    #[actix_web::test]
    async fn test_upgrade_handshake() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .route("/signRecognition", web::get().to(sign_recognition_socket)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/signRecognition")
            .insert_header(("upgrade", "websocket"))
            .insert_header(("connection", "upgrade"))
            .insert_header(("sec-websocket-version", "13"))
            .insert_header(("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ=="))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SWITCHING_PROTOCOLS);

        let req = actix_test::TestRequest::get().uri("/signRecognition").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_connection_runs_cycles_in_order_and_evicts_on_close() {
        let predictor = Arc::new(SlowPredictor::default());
        let state = live_state(predictor.clone());
        let (addr, server) = serve(state.clone());

        let (mut client, _) =
            tokio_tungstenite::connect_async(format!("ws://{}/signRecognition", addr))
                .await
                .unwrap();

        // All frames go out before the first inference call returns
        for i in 0..12 {
            client.send(frame_message(i)).await.unwrap();
        }

        let mut labels = Vec::new();
        while labels.len() < 5 {
            match tokio::time::timeout(Duration::from_secs(5), client.next()).await {
                Ok(Some(Ok(Message::Text(label)))) => labels.push(label),
                Ok(Some(Ok(_))) => continue,
                other => panic!("expected a label, got {:?}", other),
            }
        }

        assert_eq!(labels, vec!["A", "B", "A", "B", "A"]);
        assert_eq!(*predictor.windows.lock().unwrap(), vec![4, 6, 8, 10, 12]);
        assert_eq!(predictor.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(state.registry.len(), 1);

        client.close(None).await.unwrap();
        wait_for_close(&state).await;
        assert_eq!(state.registry.len(), 0);

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.recognition.frames_received, 12);
        assert_eq!(metrics.recognition.labels_emitted, 5);

        server.stop(true).await;
    }

    #[actix_web::test]
    async fn test_close_during_inference_still_evicts() {
        let predictor = Arc::new(SlowPredictor::default());
        let state = live_state(predictor.clone());
        let (addr, server) = serve(state.clone());

        let (mut client, _) =
            tokio_tungstenite::connect_async(format!("ws://{}/signRecognition", addr))
                .await
                .unwrap();

        // The 4th frame starts an inference call; close while it is running
        for i in 0..4 {
            client.send(frame_message(i)).await.unwrap();
        }
        client.close(None).await.unwrap();

        wait_for_close(&state).await;

        // The cycle finished and stored its session before the close was handled
        assert_eq!(*predictor.windows.lock().unwrap(), vec![4]);
        assert_eq!(predictor.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(state.get_metrics_snapshot().recognition.inference_calls, 1);
        assert_eq!(state.registry.len(), 0);

        server.stop(true).await;
    }
}
