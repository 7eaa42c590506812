//! # Decision Cycle
//!
//! One frame in, at most one label out:
//!
//! ```text
//! frame ─► normalize + window ─► paced? ─► predict ─► smooth ─► label?
//! ```
//!
//! `SignRecognizer::process` takes the session by value and hands it back with the
//! outcome; the caller stores the updated session back in the registry.

use crate::config::RecognitionConfig;
use crate::error::InferenceError;
use crate::inference::Predictor;
use crate::recognition::buffer::WindowConfig;
use crate::recognition::frame::Frame;
use crate::recognition::labels::LabelVocabulary;
use crate::recognition::session::Session;
use crate::recognition::smoother::SmoothingConfig;
use std::sync::Arc;

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Frame buffered; window not full yet or prediction not due
    Buffered,

    /// Inference ran for `absolute_frame`; `emitted` is set when smoothing let a label through
    Predicted {
        absolute_frame: u64,
        emitted: Option<String>,
    },

    /// Inference was due but failed; pacing state unchanged
    Failed {
        absolute_frame: u64,
        error: InferenceError,
    },
}

/// Session after the cycle plus what happened.
#[derive(Debug)]
pub struct Cycle {
    pub session: Session,
    pub outcome: Outcome,
}

/// Drives frames through the pipeline. Cheap to clone, shared by all connections.
#[derive(Clone)]
pub struct SignRecognizer {
    window: WindowConfig,
    smoothing: SmoothingConfig,
    labels: LabelVocabulary,
    predictor: Arc<dyn Predictor>,
}

impl SignRecognizer {
    pub fn new(config: &RecognitionConfig, predictor: Arc<dyn Predictor>) -> Self {
        Self {
            window: WindowConfig::from(config),
            smoothing: SmoothingConfig::from(config),
            labels: LabelVocabulary::new(config.prediction_labels.clone()),
            predictor,
        }
    }

    pub fn labels(&self) -> &LabelVocabulary {
        &self.labels
    }

    /// Run one decision cycle for `frame`.
    pub async fn process(&self, mut session: Session, frame: Frame) -> Cycle {
        let Some(absolute_frame) = session.ingest(frame, &self.window) else {
            return Cycle {
                session,
                outcome: Outcome::Buffered,
            };
        };

        let scores = match self.predictor.predict(session.buffer.window()).await {
            Ok(scores) => scores,
            Err(error) => {
                return Cycle {
                    session,
                    outcome: Outcome::Failed {
                        absolute_frame,
                        error,
                    },
                }
            }
        };

        if scores.len() != self.labels.len() {
            return Cycle {
                session,
                outcome: Outcome::Failed {
                    absolute_frame,
                    error: InferenceError::LabelMismatch {
                        expected: self.labels.len(),
                        actual: scores.len(),
                    },
                },
            };
        }

        let emitted = session
            .complete_prediction(absolute_frame, &scores, &self.smoothing)
            .and_then(|index| self.labels.get(index))
            .map(str::to_string);

        Cycle {
            session,
            outcome: Outcome::Predicted {
                absolute_frame,
                emitted,
            },
        }
    }
}
