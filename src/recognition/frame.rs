//! # Landmark Frames
//!
//! One frame is a timestamped capture of 75 2-D landmark points laid out as:
//!
//! | indices    | region     |
//! |------------|------------|
//! | `[0, 33)`  | pose       |
//! | `[33, 54)` | left hand  |
//! | `[54, 75)` | right hand |
//!
//! The capture client reports an undetected hand by writing `(0, 0)` into that hand's
//! points. `Frame::hand_visible` is the only place that convention is interpreted.

use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Total number of landmark points per frame.
pub const NUM_LANDMARKS: usize = 75;

pub const LEFT_HAND_RANGE: Range<usize> = 33..54;
pub const RIGHT_HAND_RANGE: Range<usize> = 54..75;

/// A single landmark coordinate, serialized as `[x, y]`.
pub type Point = [f64; 2];

/// The two hand regions of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Left, Hand::Right];

    /// Index range of this hand's points inside `Frame::data`.
    pub fn range(self) -> Range<usize> {
        match self {
            Hand::Left => LEFT_HAND_RANGE,
            Hand::Right => RIGHT_HAND_RANGE,
        }
    }
}

/// One timestamped capture of landmark coordinates.
///
/// Matches the inbound stream message `{ "time": 1700000000123, "data": [[x, y], ...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Capture time on the client clock, in milliseconds
    pub time: i64,

    /// Exactly `NUM_LANDMARKS` points once parsed through `Frame::parse`
    pub data: Vec<Point>,
}

impl Frame {
    pub fn new(time: i64, data: Vec<Point>) -> Self {
        Self { time, data }
    }

    /// Parse an inbound WebSocket text message.
    ///
    /// Anything that is not `{time: int, data: [[x, y]; 75]}` is a `FrameError`.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let frame: Frame = serde_json::from_str(text)?;

        if frame.data.len() != NUM_LANDMARKS {
            return Err(FrameError::LandmarkCount {
                expected: NUM_LANDMARKS,
                actual: frame.data.len(),
            });
        }

        Ok(frame)
    }

    /// Whether the given hand was detected in this frame.
    ///
    /// A hand counts as missing if any of its points is the `(0, 0)` sentinel.
    pub fn hand_visible(&self, hand: Hand) -> bool {
        !self.data[hand.range()].iter().any(is_missing)
    }
}

fn is_missing(point: &Point) -> bool {
    point[0] == 0.0 && point[1] == 0.0
}
