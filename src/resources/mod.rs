//! Configuration, asset cache and host collaborators.
//!
//! - [`assetstore`] – asset cache and the readiness gate in front of playback
//! - [`loader`] – asset loader trait plus deferred and threaded loaders
//! - [`playerconfig`] – raw options and the validated configuration
//! - [`scheduler`] – redraw scheduler, frame queue and clocks
//! - [`surface`] – drawable surface trait and a retained canvas

pub mod assetstore;
pub mod loader;
pub mod playerconfig;
pub mod scheduler;
pub mod surface;
