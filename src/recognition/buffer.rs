//! # Frame Window Buffer
//!
//! Sliding window of the most recent normalized frames plus the bookkeeping that paces
//! inference calls.
//!
//! ## Absolute frame numbering:
//! Every accepted frame (real or synthetic) gets the next absolute index. `offset` counts
//! frames that have fallen off the front of the window, so `offset + len()` is always the
//! total number of frames ever accepted. The count saturates at `u64::MAX` instead of
//! wrapping, so it never decreases no matter how far a client clock jumps. Pacing compares that total against the absolute
//! index the last successful prediction was based on, which keeps the inference rate tied
//! to normalized frames rather than to however fast the client happens to send.

use crate::config::RecognitionConfig;
use crate::recognition::frame::{Frame, Point};
use crate::recognition::normalizer::{normalize_tail, DEFAULT_TARGET_FPS};
use std::collections::VecDeque;

/// Window and pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Frames submitted per inference call (`NUM_FRAMES`)
    pub window_size: usize,

    /// Minimum absolute frames between inference calls (`PREDICTION_INTERVAL`)
    pub prediction_interval: u64,

    /// Frame rate the temporal normalizer fills gaps up to
    pub target_fps: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: 32,
            prediction_interval: 8,
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

impl From<&RecognitionConfig> for WindowConfig {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            window_size: config.num_frames,
            prediction_interval: config.prediction_interval,
            target_fps: config.target_fps,
        }
    }
}

/// Sliding window of normalized frames for one session.
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    frames: VecDeque<Frame>,
    offset: u64,
    last_predicted_frame: u64,
}

impl FrameBuffer {
    /// Normalize `frame` against the newest buffered frame, append the result, and trim
    /// the window.
    ///
    /// ## Returns:
    /// - **Some(absolute_frame)**: the window is full and at least `prediction_interval`
    ///   frames have arrived since the last prediction. The caller runs inference on
    ///   `window()` and, if it succeeds, calls `mark_predicted(absolute_frame)`.
    /// - **None**: keep buffering.
    pub fn ingest(&mut self, frame: Frame, config: &WindowConfig) -> Option<u64> {
        let window_size = config.window_size.max(1);
        let normalized = normalize_tail(self.frames.back(), frame, config.target_fps, window_size);

        self.offset = self.offset.saturating_add(normalized.skipped);
        self.frames.extend(normalized.frames);

        if self.frames.len() < window_size {
            return None;
        }

        let excess = self.frames.len() - window_size;
        self.frames.drain(..excess);
        self.offset = self.offset.saturating_add(excess as u64);

        let current = self.absolute_frame();
        if current.saturating_sub(self.last_predicted_frame) < config.prediction_interval {
            return None;
        }

        Some(current)
    }

    /// Record that a prediction based on `absolute_frame` completed.
    pub fn mark_predicted(&mut self, absolute_frame: u64) {
        self.last_predicted_frame = absolute_frame;
    }

    /// Landmarks of the buffered frames, oldest first, without timestamps.
    pub fn window(&self) -> Vec<Vec<Point>> {
        self.frames.iter().map(|frame| frame.data.clone()).collect()
    }

    /// Total number of frames ever accepted.
    pub fn absolute_frame(&self) -> u64 {
        self.offset.saturating_add(self.frames.len() as u64)
    }

    pub fn last_predicted_frame(&self) -> u64 {
        self.last_predicted_frame
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::frame::tests::uniform_frame;

    fn config() -> WindowConfig {
        WindowConfig {
            window_size: 32,
            prediction_interval: 8,
            target_fps: 30,
        }
    }

    #[test]
    fn test_not_ready_until_window_is_full() {
        let mut buffer = FrameBuffer::default();
        for i in 0..31 {
            assert_eq!(buffer.ingest(uniform_frame(i * 33, 0.5), &config()), None);
        }
        assert_eq!(buffer.len(), 31);
        assert_eq!(buffer.ingest(uniform_frame(31 * 33, 0.5), &config()), Some(32));
    }

    #[test]
    fn test_window_length_is_capped() {
        let mut buffer = FrameBuffer::default();
        for i in 0..100 {
            buffer.ingest(uniform_frame(i * 33, 0.5), &config());
            assert!(buffer.len() <= 32);
            assert_eq!(buffer.absolute_frame(), i as u64 + 1);
        }
        assert_eq!(buffer.len(), 32);
        assert_eq!(buffer.offset, 68);
        assert_eq!(buffer.frames.back().map(|f| f.time), Some(99 * 33));
        assert_eq!(buffer.window().len(), 32);
    }

    #[test]
    fn test_pacing_fires_once_per_interval() {
        let mut buffer = FrameBuffer::default();
        let mut fired = Vec::new();

        for i in 0..80 {
            if let Some(absolute) = buffer.ingest(uniform_frame(i * 33, 0.5), &config()) {
                buffer.mark_predicted(absolute);
                fired.push(absolute);
            }
        }

        assert_eq!(fired, vec![32, 40, 48, 56, 64, 72, 80]);
    }

    #[test]
    fn test_unmarked_prediction_stays_due() {
        let mut buffer = FrameBuffer::default();
        for i in 0..32 {
            buffer.ingest(uniform_frame(i * 33, 0.5), &config());
        }
        assert_eq!(buffer.last_predicted_frame(), 0);

        // The call for frame 32 failed, so the next frame is still eligible
        assert_eq!(buffer.ingest(uniform_frame(32 * 33, 0.5), &config()), Some(33));
        buffer.mark_predicted(33);
        assert_eq!(buffer.ingest(uniform_frame(33 * 33, 0.5), &config()), None);
    }

    #[test]
    fn test_tweens_count_toward_absolute_frames() {
        let mut buffer = FrameBuffer::default();
        buffer.ingest(uniform_frame(0, 0.1), &config());
        // 200ms gap at 30fps: 5 tweens plus the frame itself
        buffer.ingest(uniform_frame(200, 0.7), &config());

        assert_eq!(buffer.len(), 7);
        assert_eq!(buffer.absolute_frame(), 7);
    }

    #[test]
    fn test_long_gap_fills_window_and_keeps_count() {
        let mut buffer = FrameBuffer::default();
        buffer.ingest(uniform_frame(0, 0.1), &config());

        // 10s gap at 30fps: 299 tweens plus the frame itself
        let ready = buffer.ingest(uniform_frame(10_000, 0.7), &config());

        assert_eq!(buffer.len(), 32);
        assert_eq!(buffer.absolute_frame(), 301);
        assert_eq!(ready, Some(301));
        assert_eq!(buffer.frames.back().map(|f| f.time), Some(10_000));
    }

    #[test]
    fn test_alternating_extreme_timestamps_saturate() {
        let mut buffer = FrameBuffer::default();
        let mut previous_absolute = 0;

        // Each jump from i64::MIN to i64::MAX adds ~2.8e17 tweens; the count would pass
        // u64::MAX after roughly 130 frames
        for i in 0..400 {
            let time = if i % 2 == 0 { i64::MIN } else { i64::MAX };
            if let Some(absolute) = buffer.ingest(uniform_frame(time, 0.5), &config()) {
                buffer.mark_predicted(absolute);
            }

            let absolute = buffer.absolute_frame();
            assert!(absolute >= previous_absolute, "count went backwards at frame {}", i);
            assert!(buffer.len() <= 32);
            previous_absolute = absolute;
        }

        assert_eq!(buffer.absolute_frame(), u64::MAX);
        assert!(buffer.last_predicted_frame() <= buffer.absolute_frame());
    }
}
