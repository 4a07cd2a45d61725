//! Sprite animation player.
//!
//! Plays a sprite sheet, or a sequence of discrete frame images, onto a
//! drawable surface at a controlled rate. Exposes transport controls
//! (play / pause / seek) and synchronous lifecycle events.
//!
//! The crate is laid out like the rest of the engine:
//! - [`components`] – plain playback data (cursor, clocks, sheet geometry)
//! - [`resources`] – configuration, asset cache and the host collaborators
//! - [`systems`] – the per-callback decisions (draw or not, advance, seek)
//! - [`events`] – event types and the event bus
//! - [`player`] – [`SpritePlayer`], which composes all of the above

pub mod components;
pub mod error;
pub mod events;
pub mod player;
pub mod resources;
pub mod systems;

pub use components::playback::PlayState;
pub use error::{PlayerError, PlayerResult};
pub use events::bus::{EventContext, Listener, PlayerCmd};
pub use events::playback::{EventKind, PlayerEvent, PlayerStatus};
pub use player::SpritePlayer;
pub use resources::playerconfig::{AssetSource, DrawMode, PlayerConfig, RawOptions};
