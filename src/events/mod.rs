//! Player events and the bus that delivers them.
//!
//! - [`bus`] – subscriptions, emission and handler-queued commands
//! - [`playback`] – event kinds, payloads and the status snapshot

pub mod bus;
pub mod playback;
