//! Scheduling clock decisions.
//!
//! Each redraw callback asks [`should_draw`] whether the current moment is a
//! valid one to draw and advance a frame.
//!
//! - repaint mode skips `draw_clock` callbacks between draws; it counts
//!   callbacks, not time.
//! - fps mode compares the callback timestamp with the last accepted one and
//!   re-bases the reference onto the interval grid, so late callbacks do not
//!   accumulate drift.

use log::trace;

use crate::components::clock::{DrawClock, FpsClock, RepaintClock};
use crate::resources::playerconfig::{DrawMode, PlayerConfig};

/// Fresh clock for a playback run starting at `now_ms`.
pub fn start_clock(config: &PlayerConfig, now_ms: f64) -> DrawClock {
    match config.draw_mode {
        DrawMode::Repaint => DrawClock::Repaint(RepaintClock::new(config.draw_clock)),
        DrawMode::Fps => DrawClock::Fps(FpsClock::new(config.draw_clock, now_ms)),
    }
}

pub fn should_draw(clock: &mut DrawClock, timestamp_ms: f64) -> bool {
    match clock {
        DrawClock::Repaint(repaint) => repaint_tick(repaint),
        DrawClock::Fps(fps) => fps_tick(fps, timestamp_ms),
    }
}

fn repaint_tick(clock: &mut RepaintClock) -> bool {
    let draw = clock.tick == 0;
    clock.tick += 1;
    if clock.tick > clock.skip {
        clock.tick = 0;
    }
    draw
}

fn fps_tick(clock: &mut FpsClock, timestamp_ms: f64) -> bool {
    let elapsed = timestamp_ms - clock.then_ms;
    if elapsed > clock.interval_ms {
        clock.then_ms = timestamp_ms - (elapsed % clock.interval_ms);
        true
    } else {
        trace!(
            "fps clock: {elapsed:.2}ms of {:.2}ms elapsed, skipping",
            clock.interval_ms
        );
        false
    }
}
