//! Playback data.
//!
//! Submodules overview:
//! - [`clock`] – bookkeeping for the repaint and fps scheduling clocks
//! - [`playback`] – transport state, displayed frame and sequencer cursor
//! - [`sprite`] – sheet geometry and source rectangles

pub mod clock;
pub mod playback;
pub mod sprite;
