//! # Decision Smoother
//!
//! A single inference call over one window is noisy. The smoother turns the stream of
//! per-window score vectors into "a sign was just performed" events:
//!
//! 1. **Argmax decode**: the provisional label is the highest-scoring index
//! 2. **Consecutive vote**: it must be the provisional label for the last
//!    `consecutive_required` calls in a row
//! 3. **Confidence gate**: its score must reach `min_confidence`
//! 4. **Repeat suppression**: it must differ from the last emitted label

use crate::config::RecognitionConfig;
use std::collections::VecDeque;

/// Thresholds for turning provisional labels into emissions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingConfig {
    pub consecutive_required: usize,
    pub min_confidence: f64,
}

impl From<&RecognitionConfig> for SmoothingConfig {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            consecutive_required: config.num_consecutive_predictions,
            min_confidence: config.min_prediction_confidence,
        }
    }
}

/// Provisional label and score of one prediction vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Provisional {
    pub index: usize,
    pub confidence: f64,
}

/// Index of the maximum score. Ties go to the lowest index; `None` for an empty vector.
pub fn argmax(scores: &[f64]) -> Option<Provisional> {
    let (first, rest) = scores.split_first()?;

    let mut best = Provisional {
        index: 0,
        confidence: *first,
    };
    for (i, &score) in rest.iter().enumerate() {
        if score > best.confidence {
            best = Provisional {
                index: i + 1,
                confidence: score,
            };
        }
    }

    Some(best)
}

/// Per-session smoothing state.
#[derive(Debug, Clone, Default)]
pub struct DecisionSmoother {
    history: VecDeque<usize>,
    last_emitted: Option<usize>,
}

impl DecisionSmoother {
    /// Feed one prediction vector. Returns the label index to emit, if any.
    pub fn decide(&mut self, scores: &[f64], config: &SmoothingConfig) -> Option<usize> {
        let provisional = argmax(scores)?;
        let required = config.consecutive_required.max(1);

        self.history.push_back(provisional.index);
        while self.history.len() > required {
            self.history.pop_front();
        }

        if self.history.len() < required
            || self.history.iter().any(|&index| index != provisional.index)
        {
            return None;
        }

        if self.last_emitted == Some(provisional.index)
            || provisional.confidence < config.min_confidence
        {
            return None;
        }

        self.last_emitted = Some(provisional.index);
        Some(provisional.index)
    }

    pub fn last_emitted(&self) -> Option<usize> {
        self.last_emitted
    }

    /// Provisional labels currently counted toward the vote, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &usize> {
        self.history.iter()
    }
}
