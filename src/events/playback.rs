//! Lifecycle and per-frame events published by the player.

use crate::components::playback::PlayState;

/// Event name used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Play,
    Pause,
    Ended,
    TimeUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Play,
        EventKind::Pause,
        EventKind::Ended,
        EventKind::TimeUpdate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Play => "play",
            EventKind::Pause => "pause",
            EventKind::Ended => "ended",
            EventKind::TimeUpdate => "timeupdate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    Play,
    Pause,
    /// A non-looping sequence drew its last frame and stopped.
    Ended,
    /// A frame was drawn. `time` is only present in fps mode.
    TimeUpdate { frame: u32, time: Option<f64> },
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Play => EventKind::Play,
            PlayerEvent::Pause => EventKind::Pause,
            PlayerEvent::Ended => EventKind::Ended,
            PlayerEvent::TimeUpdate { .. } => EventKind::TimeUpdate,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Read-only snapshot of the player handed to event handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerStatus {
    pub state: PlayState,
    pub current_frame: u32,
    /// Only present in fps mode.
    pub current_time: Option<f64>,
    pub frame_count: u32,
    /// Assets are loaded.
    pub ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(PlayerEvent::Play.name(), "play");
        assert_eq!(PlayerEvent::Pause.name(), "pause");
        assert_eq!(PlayerEvent::Ended.name(), "ended");
        let update = PlayerEvent::TimeUpdate {
            frame: 3,
            time: None,
        };
        assert_eq!(update.name(), "timeupdate");
        assert_eq!(update.kind(), EventKind::TimeUpdate);
    }

    #[test]
    fn test_kind_from_name() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("seeked"), None);
    }
}
