//! Cosmetic waveform for the mini-player
//!
//! Frames are a pure function of elapsed time and playback state; nothing
//! here feeds back into the session.

use super::controller::PlaybackSession;
use musecatch_common::events::PlaybackState;
use std::time::Duration;

pub const DEFAULT_BAR_COUNT: usize = 20;
pub const DEFAULT_BAR_GAP: f64 = 2.0;

/// One bar of a frame, in canvas units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct WaveformAnimator {
    width: f64,
    height: f64,
    bar_count: usize,
    gap: f64,
}

impl WaveformAnimator {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
            bar_count: DEFAULT_BAR_COUNT,
            gap: DEFAULT_BAR_GAP,
        }
    }

    pub fn with_bars(mut self, bar_count: usize, gap: f64) -> Self {
        self.bar_count = bar_count.max(1);
        self.gap = gap.max(0.0);
        self
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    /// Animate only while audio is actually advancing
    pub fn is_active(state: PlaybackState) -> bool {
        state == PlaybackState::Playing
    }

    /// Frame at `elapsed` since the animation started
    pub fn frame(&self, elapsed: Duration) -> Vec<Bar> {
        let t = elapsed.as_secs_f64() * 1000.0;
        let slots = self.bar_count as f64;
        let width = ((self.width - self.gap * (slots - 1.0)) / slots).max(0.0);

        (0..self.bar_count)
            .map(|i| {
                let phase = t / 200.0 + i as f64 * 0.5;
                let height = phase.sin().abs() * self.height * 0.8 + self.height * 0.2;
                Bar {
                    x: i as f64 * (width + self.gap),
                    y: (self.height - height) / 2.0,
                    width,
                    height,
                }
            })
            .collect()
    }

    /// Frame for the session, or `None` when the canvas should be cleared
    pub fn frame_for(&self, session: &PlaybackSession, elapsed: Duration) -> Option<Vec<Bar>> {
        Self::is_active(session.state).then(|| self.frame(elapsed))
    }
}

impl Default for WaveformAnimator {
    fn default() -> Self {
        Self::new(120.0, 32.0)
    }
}
