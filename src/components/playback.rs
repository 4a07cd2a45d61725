//! Mutable playback state owned by the player.

use crate::components::clock::DrawClock;
use crate::resources::scheduler::FrameHandle;

/// Transport state. `Playing` exactly while a redraw callback is scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayState {
    #[default]
    Idle,
    Playing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    /// Frame most recently drawn, as seen by observers.
    pub current_frame: u32,
    /// `current_frame / fps` in fps mode, otherwise zero.
    pub current_time: f64,
    /// Frame the next draw renders.
    pub cursor: u32,
    /// A non-looping sequence ran past its last frame.
    pub exhausted: bool,
    /// Handle of the armed redraw callback.
    pub scheduled: Option<FrameHandle>,
    /// Present while scheduled.
    pub clock: Option<DrawClock>,
    /// Frames drawn since construction.
    pub draws: u64,
}

impl PlaybackState {
    pub fn state(&self) -> PlayState {
        if self.scheduled.is_some() {
            PlayState::Playing
        } else {
            PlayState::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.scheduled.is_some()
    }

    /// Move the cursor back to the first frame.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.exhausted = false;
    }
}
