//! Frame sequencing.
//!
//! - [`advance`] moves the cursor to the next frame, wraps when looping, or
//!   reports the end of a non-looping sequence.
//! - [`seek_target_for_frame`] and [`seek_target_for_time`] map seek requests
//!   to a valid frame index.
//! - [`render_frame`] blits one frame to the surface and [`mark_drawn`]
//!   publishes it as the current frame.

use log::{trace, warn};

use crate::components::playback::PlaybackState;
use crate::components::sprite::SheetLayout;
use crate::error::{PlayerError, PlayerResult};
use crate::resources::assetstore::AssetGate;
use crate::resources::playerconfig::{AssetSource, DrawMode, PlayerConfig};
use crate::resources::surface::Surface;

/// What [`advance`] did to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next(u32),
    Wrapped,
    Ended,
}

pub fn advance(playback: &mut PlaybackState, config: &PlayerConfig) -> Advance {
    if playback.cursor < config.last_frame() {
        playback.cursor += 1;
        Advance::Next(playback.cursor)
    } else if config.looped {
        playback.cursor = 0;
        Advance::Wrapped
    } else {
        playback.exhausted = true;
        Advance::Ended
    }
}

/// Clamp a requested frame into `[0, frame_count)`.
pub fn seek_target_for_frame(config: &PlayerConfig, index: u32) -> u32 {
    if index > config.last_frame() {
        warn!(
            "Frame {index} is out of range (frame count {}); using {}",
            config.frame_count,
            config.last_frame()
        );
        config.last_frame()
    } else {
        index
    }
}

/// Map a time in seconds to a frame. Only meaningful in fps mode.
pub fn seek_target_for_time(config: &PlayerConfig, seconds: f64) -> PlayerResult<u32> {
    if config.draw_mode == DrawMode::Repaint {
        return Err(PlayerError::unsupported(
            "cannot set current time with draw mode 'repaint'",
        ));
    }
    if !seconds.is_finite() {
        return Err(PlayerError::unsupported(format!(
            "cannot seek to non-finite time {seconds}"
        )));
    }
    let frame = (seconds * config.draw_clock as f64).floor();
    if frame <= 0.0 {
        return Ok(0);
    }
    Ok(if frame >= config.frame_count as f64 {
        config.last_frame()
    } else {
        frame as u32
    })
}

/// Draw frame `index`. Returns `false` when the frame's pixels are not loaded.
pub fn render_frame<I, S>(
    gate: &AssetGate<I>,
    surface: &mut S,
    config: &PlayerConfig,
    layout: &SheetLayout,
    index: u32,
) -> bool
where
    S: Surface<I>,
{
    match gate.source() {
        AssetSource::Sheet { .. } => {
            let Some(sheet) = gate.sheet() else {
                return false;
            };
            if config.clear_before_draw {
                surface.clear(config.frame_width, config.frame_height);
            }
            surface.draw_region(sheet, layout.frame_rect(index));
        }
        AssetSource::Sequence { .. } => {
            let Some(image) = gate.frame(index) else {
                return false;
            };
            if config.clear_before_draw {
                surface.clear(config.frame_width, config.frame_height);
            }
            surface.present(image);
        }
    }
    trace!("Drew frame {index}");
    true
}

/// Publish `index` as the current frame and derive the current time.
pub fn mark_drawn(playback: &mut PlaybackState, config: &PlayerConfig, index: u32) {
    playback.current_frame = index;
    if config.draw_mode == DrawMode::Fps {
        playback.current_time = index as f64 / config.draw_clock as f64;
    }
    playback.draws += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::sprite::FrameRect;
    use crate::resources::assetstore::Continuation;
    use crate::resources::loader::{AssetPayload, DeferredLoader};
    use crate::resources::playerconfig::RawOptions;

    fn config(looped: bool) -> PlayerConfig {
        RawOptions::new()
            .with_frame_count(20)
            .with_frame_size(10, 5)
            .with_sprites_per_row(10)
            .with_loop(looped)
            .with_sheet("sheet.png")
            .resolve()
            .unwrap()
    }

    fn fps_config() -> PlayerConfig {
        RawOptions::new()
            .with_frame_count(20)
            .with_sheet("sheet.png")
            .with_draw_mode(DrawMode::Fps)
            .with_draw_clock(10)
            .resolve()
            .unwrap()
    }

    #[derive(Default)]
    struct Blits {
        ops: Vec<String>,
    }

    impl Surface<&'static str> for Blits {
        fn resize(&mut self, width: u32, height: u32) {
            self.ops.push(format!("resize {width}x{height}"));
        }
        fn clear(&mut self, width: u32, height: u32) {
            self.ops.push(format!("clear {width}x{height}"));
        }
        fn draw_region(&mut self, image: &&'static str, src: FrameRect) {
            self.ops.push(format!("{image} @ {},{}", src.x, src.y));
        }
        fn present(&mut self, image: &&'static str) {
            self.ops.push(format!("present {image}"));
        }
    }

    #[test]
    fn test_looping_advance_wraps_after_last_frame() {
        let config = config(true);
        let mut playback = PlaybackState::default();
        let seen: Vec<u32> = (0..25)
            .map(|_| {
                advance(&mut playback, &config);
                playback.cursor
            })
            .collect();
        let mut expected: Vec<u32> = (1..20).collect();
        expected.extend([0, 1, 2, 3, 4, 5]);
        assert_eq!(seen, expected);
        assert!(!playback.exhausted);
    }

    #[test]
    fn test_non_looping_advance_ends_at_last_frame() {
        let config = config(false);
        let mut playback = PlaybackState {
            cursor: 18,
            ..Default::default()
        };
        assert_eq!(advance(&mut playback, &config), Advance::Next(19));
        assert_eq!(advance(&mut playback, &config), Advance::Ended);
        assert_eq!(playback.cursor, 19);
        assert!(playback.exhausted);
    }

    #[test]
    fn test_frame_seek_is_clamped() {
        let config = config(false);
        assert_eq!(seek_target_for_frame(&config, 5), 5);
        assert_eq!(seek_target_for_frame(&config, 99), 19);
    }

    #[test]
    fn test_time_seek_maps_through_fps() {
        let config = fps_config();
        assert_eq!(seek_target_for_time(&config, 0.5), Ok(5));
        assert_eq!(seek_target_for_time(&config, 0.55), Ok(5));
        assert_eq!(seek_target_for_time(&config, -1.0), Ok(0));
        assert_eq!(seek_target_for_time(&config, 60.0), Ok(19));
        assert!(seek_target_for_time(&config, f64::NAN).is_err());
    }

    #[test]
    fn test_time_seek_rejected_in_repaint_mode() {
        assert!(matches!(
            seek_target_for_time(&config(true), 0.5),
            Err(PlayerError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_render_sheet_frame_blits_grid_cell() {
        let mut config = config(true);
        config.clear_before_draw = true;
        let layout = SheetLayout::new(
            config.frame_width,
            config.frame_height,
            config.sprites_per_row,
        );
        let mut loader = DeferredLoader::new();
        let mut gate = AssetGate::new(config.source.clone(), config.frame_count);
        let mut surface = Blits::default();

        assert!(!render_frame(&gate, &mut surface, &config, &layout, 0));

        gate.ensure_ready(&mut loader, Continuation::StartPlayback);
        loader.service(|_| Ok(AssetPayload::Image("sheet")));
        gate.poll(&mut loader);

        assert!(render_frame(&gate, &mut surface, &config, &layout, 12));
        assert_eq!(surface.ops, vec!["clear 10x5", "sheet @ 20,5"]);
    }

    #[test]
    fn test_mark_drawn_derives_time_in_fps_mode() {
        let fps = fps_config();
        let mut playback = PlaybackState::default();
        mark_drawn(&mut playback, &fps, 7);
        assert_eq!(playback.current_frame, 7);
        assert!((playback.current_time - 0.7).abs() < 1e-9);

        let repaint = config(false);
        let mut playback = PlaybackState::default();
        mark_drawn(&mut playback, &repaint, 7);
        assert_eq!(playback.current_time, 0.0);
        assert_eq!(playback.draws, 1);
    }
}
