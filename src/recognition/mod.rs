//! # Sign Recognition Pipeline
//!
//! Turns a stream of landmark frames from one client into a sparse stream of sign labels.
//!
//! ## Architecture:
//! ```text
//! WebSocket text ─► Frame ─► Normalizer ─► FrameBuffer ─► Predictor ─► DecisionSmoother ─► label
//!                                (tweens)    (window + pacing)  (HTTP)    (vote + gates)
//! ```
//!
//! ## Key Components:
//! - **frame**: wire format of one capture and the missing-hand predicate
//! - **normalizer**: resamples irregular capture timing to the model's fixed frame rate
//! - **buffer**: sliding window plus the absolute frame count that paces inference
//! - **smoother**: turns noisy per-window predictions into rare, stable emissions
//! - **session**: per-connection state and the registry with idle expiry
//! - **pipeline**: one decision cycle, frame in and label out

pub mod buffer;
pub mod frame;
pub mod labels;
pub mod normalizer;
pub mod pipeline;
pub mod session;
pub mod smoother;

pub use frame::Frame;
pub use pipeline::{Cycle, Outcome, SignRecognizer};
pub use session::SessionRegistry;
