//! Scheduling clock bookkeeping.
//!
//! One of the two clocks lives in [`PlaybackState`](crate::components::playback::PlaybackState)
//! while the player is scheduled. The decision logic is in
//! [`crate::systems::clock`].

/// Tick-skip bookkeeping for repaint mode.
///
/// A frame is drawn when `tick == 0`; the counter wraps back to zero once it
/// exceeds `skip`, so one callback in every `skip + 1` draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepaintClock {
    pub tick: u32,
    pub skip: u32,
}

impl RepaintClock {
    pub fn new(skip: u32) -> Self {
        Self { tick: 0, skip }
    }
}

/// Target-rate bookkeeping for fps mode. Times are in milliseconds on the
/// host's callback timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsClock {
    /// `1000 / fps`, fixed when playback starts.
    pub interval_ms: f64,
    /// Reference timestamp of the last accepted draw, re-based to the
    /// interval grid.
    pub then_ms: f64,
}

impl FpsClock {
    pub fn new(fps: u32, now_ms: f64) -> Self {
        Self {
            interval_ms: 1000.0 / fps as f64,
            then_ms: now_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawClock {
    Repaint(RepaintClock),
    Fps(FpsClock),
}
