//! # Temporal Normalizer
//!
//! Capture clients deliver frames with irregular spacing (network jitter, dropped camera
//! frames). The model expects a roughly fixed sampling rate, so whenever the gap between
//! two frames is large enough to hide whole frames at the target rate, the missing frames
//! are synthesized by linear interpolation.
//!
//! ## Visibility gaps:
//! A hand that is missing in either endpoint is not tweened. Its synthetic points stay at
//! the previous frame's values instead of sliding toward (or away from) the sentinel,
//! which would fabricate motion that never happened. The pose region is always tweened.

use crate::recognition::frame::{Frame, Hand, Point};

/// Frame rate the normalizer fills gaps up to unless configured otherwise.
pub const DEFAULT_TARGET_FPS: u32 = 30;

/// Result of normalizing one incoming frame against its predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Leading synthetic frames that were not materialized (see `normalize_tail`)
    pub skipped: u64,

    /// Synthetic frames in time order, followed by the incoming frame
    pub frames: Vec<Frame>,
}

/// Number of synthetic frames needed between `previous` and `frame`.
///
/// `max(floor(dt * target_fps / 1000) - 1, 0)` where `dt` is the gap in milliseconds.
/// Zero and negative gaps yield no tweens.
pub fn tween_count(previous: &Frame, frame: &Frame, target_fps: u32) -> u64 {
    let dt = frame.time.saturating_sub(previous.time) as f64;
    ((dt * target_fps as f64 / 1000.0).floor() - 1.0).max(0.0) as u64
}

/// Produce the frames to append after `previous`: zero or more synthetic frames followed
/// by `frame` itself. At most `keep` frames (the newest ones) are materialized.
///
/// A client whose clock jumps by minutes would otherwise make us allocate thousands of
/// tweens that the window drops immediately. The frames left out are reported in
/// `skipped` so the caller can still count them. `keep` must be at least 1.
pub fn normalize_tail(
    previous: Option<&Frame>,
    frame: Frame,
    target_fps: u32,
    keep: usize,
) -> Normalized {
    let Some(previous) = previous else {
        return Normalized {
            skipped: 0,
            frames: vec![frame],
        };
    };

    let num_tween = tween_count(previous, &frame, target_fps);
    if num_tween == 0 {
        return Normalized {
            skipped: 0,
            frames: vec![frame],
        };
    }

    let kept = num_tween.min(keep.saturating_sub(1) as u64);
    let skipped = num_tween - kept;

    let dt = frame.time.saturating_sub(previous.time) as f64;
    let divisions = (num_tween + 1) as f64;
    let target = tween_target(previous, &frame);
    let step: Vec<Point> = previous
        .data
        .iter()
        .zip(&target)
        .map(|(start, end)| {
            [
                (end[0] - start[0]) / divisions,
                (end[1] - start[1]) / divisions,
            ]
        })
        .collect();
    let time_step = dt / divisions;

    let mut frames = Vec::with_capacity(kept as usize + 1);
    for k in (skipped + 1)..=num_tween {
        let mult = k as f64;
        let data = previous
            .data
            .iter()
            .zip(&step)
            .map(|(start, delta)| [start[0] + mult * delta[0], start[1] + mult * delta[1]])
            .collect();
        // `as` truncates toward zero
        let time = (previous.time as f64 + mult * time_step) as i64;
        frames.push(Frame::new(time, data));
    }
    frames.push(frame);

    Normalized { skipped, frames }
}

/// Points the tween moves toward: `frame`'s points, except that a hand missing from
/// either endpoint is frozen at `previous`'s values.
fn tween_target(previous: &Frame, frame: &Frame) -> Vec<Point> {
    let mut target = frame.data.clone();

    for hand in Hand::ALL {
        if !previous.hand_visible(hand) || !frame.hand_visible(hand) {
            let range = hand.range();
            target[range.clone()].copy_from_slice(&previous.data[range]);
        }
    }

    target
}
