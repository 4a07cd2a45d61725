//! Per-callback playback logic.
//!
//! - [`clock`] – decides whether a redraw callback draws a frame
//! - [`sequencer`] – advance, seek targets and frame rendering

pub mod clock;
pub mod sequencer;
