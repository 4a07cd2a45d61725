//! Error taxonomy for the player.
//!
//! - [`PlayerError::Config`] is returned by construction and is fatal for that
//!   player instance.
//! - [`PlayerError::Load`] is reported when an asset fetch fails. Playback
//!   simply never starts; the player stays usable.
//! - [`PlayerError::UnsupportedOperation`] is reported for requests the
//!   current configuration cannot honour (for example seeking by time in
//!   repaint mode). The request is a no-op.

pub type PlayerResult<T> = Result<T, PlayerError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("load error: could not load {url}: {reason}")]
    Load { url: String, reason: String },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl PlayerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn load(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }
}
