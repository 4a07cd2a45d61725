//! Player configuration and the options resolver.
//!
//! Options arrive as a loosely-typed [`RawOptions`] record (built in code,
//! parsed from JSON, or loaded from an INI file) and are resolved once into an
//! immutable, validated [`PlayerConfig`]. Every contradiction is rejected here
//! so the rest of the engine never has to check which field happens to be set.
//!
//! # Option names
//!
//! JSON options use camelCase keys. The historical player names are accepted
//! as aliases:
//!
//! | key | alias | default |
//! |-----|-------|---------|
//! | `autoPlay` | | `false` |
//! | `clearBeforeDraw` | | `false` |
//! | `drawMode` | `drawUnit` | `"repaint"` |
//! | `drawClock` | | `0` |
//! | `frameCount` | | required, `> 0` |
//! | `frameWidth` / `frameHeight` | | `0` |
//! | `spritesPerRow` | | `frameCount` |
//! | `loop` | | `false` |
//! | `sheetSource` | `imgSrc` | |
//! | `sequenceManifest` | `imgSeqSrc` | |
//! | `delimiter` | `imgSeqDel` | `"\|"` |
//!
//! # INI format
//!
//! ```ini
//! [player]
//! frame_count = 20
//! frame_width = 480
//! frame_height = 270
//! sprites_per_row = 10
//! draw_mode = fps
//! draw_clock = 10
//! loop = true
//! sheet = assets/underground-traffic.png
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use configparser::ini::Ini;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, PlayerResult};

const DEFAULT_DELIMITER: &str = "|";
const DEFAULT_DRAW_CLOCK: u32 = 0;
const DEFAULT_FRAME_SIZE: u32 = 0;
const INI_SECTION: &str = "player";

/// Rate-control strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    /// Draw on every `draw_clock + 1`-th host redraw callback.
    #[default]
    Repaint,
    /// Draw at `draw_clock` frames per second, measured on callback timestamps.
    Fps,
}

impl DrawMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DrawMode::Repaint => "repaint",
            DrawMode::Fps => "fps",
        }
    }
}

impl fmt::Display for DrawMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrawMode {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "repaint" => Ok(DrawMode::Repaint),
            "fps" => Ok(DrawMode::Fps),
            other => Err(PlayerError::config(format!(
                "unknown draw mode '{other}' (expected 'repaint' or 'fps')"
            ))),
        }
    }
}

/// Where the frames come from. Exactly one variant per player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// A single sprite sheet laid out in rows of `sprites_per_row` frames.
    Sheet { url: String },
    /// A text manifest listing one image reference per frame.
    Sequence {
        manifest_url: String,
        delimiter: String,
    },
}

impl AssetSource {
    /// The URL fetched first when the gate starts loading.
    pub fn primary_url(&self) -> &str {
        match self {
            AssetSource::Sheet { url } => url,
            AssetSource::Sequence { manifest_url, .. } => manifest_url,
        }
    }
}

/// Loosely-specified options as supplied by a caller.
///
/// Every field is optional; [`RawOptions::resolve`] applies defaults and
/// validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOptions {
    pub auto_play: Option<bool>,
    pub clear_before_draw: Option<bool>,
    #[serde(alias = "drawUnit")]
    pub draw_mode: Option<String>,
    pub draw_clock: Option<f64>,
    pub frame_count: Option<f64>,
    pub frame_width: Option<f64>,
    pub frame_height: Option<f64>,
    pub sprites_per_row: Option<f64>,
    #[serde(rename = "loop")]
    pub looped: Option<bool>,
    #[serde(alias = "imgSrc")]
    pub sheet_source: Option<String>,
    #[serde(alias = "imgSeqSrc")]
    pub sequence_manifest: Option<String>,
    #[serde(alias = "imgSeqDel")]
    pub delimiter: Option<String>,
}

impl RawOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_count(mut self, count: u32) -> Self {
        self.frame_count = Some(count as f64);
        self
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_width = Some(width as f64);
        self.frame_height = Some(height as f64);
        self
    }

    pub fn with_sprites_per_row(mut self, per_row: u32) -> Self {
        self.sprites_per_row = Some(per_row as f64);
        self
    }

    pub fn with_draw_mode(mut self, mode: DrawMode) -> Self {
        self.draw_mode = Some(mode.as_str().to_string());
        self
    }

    pub fn with_draw_clock(mut self, clock: u32) -> Self {
        self.draw_clock = Some(clock as f64);
        self
    }

    pub fn with_loop(mut self, looped: bool) -> Self {
        self.looped = Some(looped);
        self
    }

    pub fn with_auto_play(mut self, auto_play: bool) -> Self {
        self.auto_play = Some(auto_play);
        self
    }

    pub fn with_clear_before_draw(mut self, clear: bool) -> Self {
        self.clear_before_draw = Some(clear);
        self
    }

    pub fn with_sheet(mut self, url: impl Into<String>) -> Self {
        self.sheet_source = Some(url.into());
        self
    }

    pub fn with_sequence(mut self, manifest_url: impl Into<String>) -> Self {
        self.sequence_manifest = Some(manifest_url.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Parse options from a JSON object.
    pub fn from_json_str(text: &str) -> PlayerResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| PlayerError::config(format!("invalid JSON options: {e}")))
    }

    /// Parse options from the `[player]` section of INI text.
    pub fn from_ini_str(text: &str) -> PlayerResult<Self> {
        let mut ini = Ini::new();
        ini.read(text.to_string())
            .map_err(|e| PlayerError::config(format!("invalid INI options: {e}")))?;
        Self::from_ini(&ini)
    }

    /// Load options from an INI file on disk.
    pub fn load_ini_file(path: impl AsRef<Path>) -> PlayerResult<Self> {
        let path = path.as_ref();
        let mut ini = Ini::new();
        ini.load(path).map_err(|e| {
            PlayerError::config(format!("failed to load {}: {e}", path.display()))
        })?;
        let options = Self::from_ini(&ini)?;
        info!("Loaded player options from {}", path.display());
        Ok(options)
    }

    /// Load options from a `.json` or `.ini` file, chosen by extension.
    pub fn load_file(path: impl AsRef<Path>) -> PlayerResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    PlayerError::config(format!("failed to read {}: {e}", path.display()))
                })?;
                let options = Self::from_json_str(&text)?;
                info!("Loaded player options from {}", path.display());
                Ok(options)
            }
            _ => Self::load_ini_file(path),
        }
    }

    fn from_ini(ini: &Ini) -> PlayerResult<Self> {
        let float = |key: &str| -> PlayerResult<Option<f64>> {
            ini.getfloat(INI_SECTION, key)
                .map_err(|e| PlayerError::config(format!("[{INI_SECTION}] {key}: {e}")))
        };
        let boolean = |key: &str| -> PlayerResult<Option<bool>> {
            ini.getbool(INI_SECTION, key)
                .map_err(|e| PlayerError::config(format!("[{INI_SECTION}] {key}: {e}")))
        };

        Ok(Self {
            auto_play: boolean("auto_play")?,
            clear_before_draw: boolean("clear_before_draw")?,
            draw_mode: ini.get(INI_SECTION, "draw_mode"),
            draw_clock: float("draw_clock")?,
            frame_count: float("frame_count")?,
            frame_width: float("frame_width")?,
            frame_height: float("frame_height")?,
            sprites_per_row: float("sprites_per_row")?,
            looped: boolean("loop")?,
            sheet_source: ini.get(INI_SECTION, "sheet"),
            sequence_manifest: ini.get(INI_SECTION, "sequence"),
            delimiter: ini.get(INI_SECTION, "delimiter"),
        })
    }

    /// Apply defaults and validate.
    pub fn resolve(&self) -> PlayerResult<PlayerConfig> {
        PlayerConfig::from_options(self)
    }
}

/// Validated, immutable player configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Number of frames in the animation. Always greater than zero.
    pub frame_count: u32,
    /// Width in pixels of one frame.
    pub frame_width: u32,
    /// Height in pixels of one frame.
    pub frame_height: u32,
    /// Columns per sheet row. Always greater than zero.
    pub sprites_per_row: u32,
    pub draw_mode: DrawMode,
    /// Ticks to skip in repaint mode; frames per second in fps mode.
    pub draw_clock: u32,
    /// Restart after the last frame instead of ending.
    pub looped: bool,
    /// Start playing as soon as the player is constructed.
    pub auto_play: bool,
    /// Clear the surface before every blit.
    pub clear_before_draw: bool,
    pub source: AssetSource,
}

impl PlayerConfig {
    pub fn from_options(raw: &RawOptions) -> PlayerResult<Self> {
        let frame_count = match raw.frame_count {
            Some(value) => whole_number("frameCount", value)?,
            None => return Err(PlayerError::config("frameCount is required")),
        };
        if frame_count == 0 {
            return Err(PlayerError::config("frameCount must be greater than zero"));
        }

        let frame_width = optional_whole_number("frameWidth", raw.frame_width, DEFAULT_FRAME_SIZE)?;
        let frame_height =
            optional_whole_number("frameHeight", raw.frame_height, DEFAULT_FRAME_SIZE)?;
        let sprites_per_row =
            optional_whole_number("spritesPerRow", raw.sprites_per_row, frame_count)?;
        if sprites_per_row == 0 {
            return Err(PlayerError::config(
                "spritesPerRow must be greater than zero",
            ));
        }

        let draw_mode = match raw.draw_mode.as_deref() {
            Some(mode) => mode.parse::<DrawMode>()?,
            None => DrawMode::default(),
        };
        let draw_clock = optional_whole_number("drawClock", raw.draw_clock, DEFAULT_DRAW_CLOCK)?;
        if draw_mode == DrawMode::Fps && draw_clock == 0 {
            return Err(PlayerError::config(
                "drawClock must be greater than zero in fps mode",
            ));
        }

        let sheet = non_empty(raw.sheet_source.as_deref());
        let manifest = non_empty(raw.sequence_manifest.as_deref());
        let source = match (sheet, manifest) {
            (Some(url), None) => AssetSource::Sheet {
                url: url.to_string(),
            },
            (None, Some(manifest_url)) => {
                let delimiter = raw
                    .delimiter
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DELIMITER.to_string());
                if delimiter.is_empty() {
                    return Err(PlayerError::config("sequence delimiter must not be empty"));
                }
                AssetSource::Sequence {
                    manifest_url: manifest_url.to_string(),
                    delimiter,
                }
            }
            (Some(_), Some(_)) => {
                return Err(PlayerError::config(
                    "sheetSource and sequenceManifest are mutually exclusive",
                ));
            }
            (None, None) => {
                return Err(PlayerError::config(
                    "one of sheetSource or sequenceManifest is required",
                ));
            }
        };

        if matches!(source, AssetSource::Sheet { .. }) {
            check_sheet_extent(frame_count, frame_width, frame_height, sprites_per_row)?;
        }

        Ok(Self {
            frame_count,
            frame_width,
            frame_height,
            sprites_per_row,
            draw_mode,
            draw_clock,
            looped: raw.looped.unwrap_or(false),
            auto_play: raw.auto_play.unwrap_or(false),
            clear_before_draw: raw.clear_before_draw.unwrap_or(false),
            source,
        })
    }

    /// Milliseconds between accepted draws in fps mode.
    pub fn fps_interval_ms(&self) -> Option<f64> {
        match self.draw_mode {
            DrawMode::Fps => Some(1000.0 / self.draw_clock as f64),
            DrawMode::Repaint => None,
        }
    }

    /// Index of the last frame.
    pub fn last_frame(&self) -> u32 {
        self.frame_count - 1
    }
}

/// The origin of every frame on the sheet must be addressable in `u32` pixels.
fn check_sheet_extent(
    frame_count: u32,
    frame_width: u32,
    frame_height: u32,
    sprites_per_row: u32,
) -> PlayerResult<()> {
    let last_column = sprites_per_row.min(frame_count) - 1;
    let last_row = (frame_count - 1) / sprites_per_row;
    if last_column.checked_mul(frame_width).is_none() {
        return Err(PlayerError::config(format!(
            "sheet too wide: {sprites_per_row} frame(s) per row of width {frame_width}"
        )));
    }
    if last_row.checked_mul(frame_height).is_none() {
        return Err(PlayerError::config(format!(
            "sheet too tall: {} row(s) of height {frame_height}",
            last_row + 1
        )));
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn optional_whole_number(name: &str, value: Option<f64>, default: u32) -> PlayerResult<u32> {
    value.map_or(Ok(default), |v| whole_number(name, v))
}

fn whole_number(name: &str, value: f64) -> PlayerResult<u32> {
    if !value.is_finite() {
        return Err(PlayerError::config(format!("{name} must be finite")));
    }
    if value < 0.0 {
        return Err(PlayerError::config(format!(
            "{name} must not be negative (got {value})"
        )));
    }
    if value.fract() != 0.0 {
        return Err(PlayerError::config(format!(
            "{name} must be a whole number (got {value})"
        )));
    }
    if value > u32::MAX as f64 {
        return Err(PlayerError::config(format!("{name} is too large")));
    }
    Ok(value as u32)
}
