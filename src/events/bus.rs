//! Synchronous publish/subscribe for player events.
//!
//! Handlers are registered per [`EventKind`] and invoked in registration order.
//! The same [`Listener`] may be registered more than once and then runs once
//! per registration.
//!
//! Emission iterates a snapshot of the handler list, so subscriptions changed
//! by a handler take effect from the next emission. A panicking handler is
//! logged and skipped; the remaining handlers still run.
//!
//! Handlers never get a mutable borrow of the player. They receive an
//! [`EventContext`] that can change subscriptions directly and queue
//! [`PlayerCmd`]s, which the player applies after the emitting operation has
//! finished its own state changes.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use log::{error, trace};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::events::playback::{EventKind, PlayerEvent, PlayerStatus};

type HandlerFn = dyn Fn(&PlayerEvent, &mut EventContext<'_>);

/// Shared handle to an event handler. Clones compare equal with
/// [`Listener::same`], which is how a handler is found again for removal.
#[derive(Clone)]
pub struct Listener(Rc<HandlerFn>);

impl Listener {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&PlayerEvent, &mut EventContext<'_>) + 'static,
    {
        Self(Rc::new(handler))
    }

    pub fn same(&self, other: &Listener) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }

    fn call(&self, event: &PlayerEvent, ctx: &mut EventContext<'_>) {
        (self.0)(event, ctx)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0))
    }
}

/// Transport commands a handler can queue for the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCmd {
    Play,
    Pause,
    SetFrame(u32),
    SetTime(f64),
}

/// What a handler may do while an event is being delivered.
pub struct EventContext<'a> {
    bus: &'a mut EventBus,
    commands: &'a mut VecDeque<PlayerCmd>,
    status: PlayerStatus,
}

impl EventContext<'_> {
    /// Player state at the moment the event was emitted.
    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn play(&mut self) {
        self.commands.push_back(PlayerCmd::Play);
    }

    pub fn pause(&mut self) {
        self.commands.push_back(PlayerCmd::Pause);
    }

    pub fn set_current_frame(&mut self, index: u32) {
        self.commands.push_back(PlayerCmd::SetFrame(index));
    }

    pub fn set_current_time(&mut self, seconds: f64) {
        self.commands.push_back(PlayerCmd::SetTime(seconds));
    }

    pub fn on(&mut self, kind: EventKind, listener: &Listener) {
        self.bus.on(kind, listener);
    }

    pub fn off(&mut self, kind: EventKind, listener: &Listener) -> bool {
        self.bus.off(kind, listener)
    }

    pub fn off_kind(&mut self, kind: EventKind) {
        self.bus.off_kind(kind);
    }

    pub fn off_all(&mut self) {
        self.bus.off_all();
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    handlers: FxHashMap<EventKind, SmallVec<[Listener; 4]>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, listener: &Listener) {
        self.handlers
            .entry(kind)
            .or_default()
            .push(listener.clone());
    }

    /// Remove the first registration of `listener` for `kind`.
    pub fn off(&mut self, kind: EventKind, listener: &Listener) -> bool {
        let Some(list) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = list.iter().position(|l| l.same(listener)) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.handlers.remove(&kind);
        }
        true
    }

    pub fn off_kind(&mut self, kind: EventKind) {
        self.handlers.remove(&kind);
    }

    pub fn off_all(&mut self) {
        self.handlers.clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, |list| list.len())
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver `event` to its handlers. Returns how many were invoked.
    pub fn emit(
        &mut self,
        event: &PlayerEvent,
        commands: &mut VecDeque<PlayerCmd>,
        status: PlayerStatus,
    ) -> usize {
        let kind = event.kind();
        let snapshot: SmallVec<[Listener; 4]> = match self.handlers.get(&kind) {
            Some(list) => list.clone(),
            None => return 0,
        };
        trace!("Emitting '{}' to {} handler(s)", kind.name(), snapshot.len());
        for listener in &snapshot {
            let mut ctx = EventContext {
                bus: &mut *self,
                commands: &mut *commands,
                status,
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.call(event, &mut ctx)));
            if let Err(payload) = outcome {
                error!(
                    "Handler for '{}' panicked: {}",
                    kind.name(),
                    panic_message(payload.as_ref())
                );
            }
        }
        snapshot.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> Listener {
        let log = Rc::clone(log);
        Listener::new(move |event, _ctx| log.borrow_mut().push(format!("{tag}:{}", event.name())))
    }

    fn emit(bus: &mut EventBus, event: PlayerEvent) -> (usize, VecDeque<PlayerCmd>) {
        let mut commands = VecDeque::new();
        let n = bus.emit(&event, &mut commands, PlayerStatus::default());
        (n, commands)
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let a = recorder(&log, "a");
        let b = recorder(&log, "b");
        bus.on(EventKind::Play, &a);
        bus.on(EventKind::Play, &b);
        bus.on(EventKind::Play, &a);

        assert_eq!(emit(&mut bus, PlayerEvent::Play).0, 3);
        assert_eq!(*log.borrow(), vec!["a:play", "b:play", "a:play"]);
    }

    #[test]
    fn test_off_removes_first_match_and_prunes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let a = recorder(&log, "a");
        bus.on(EventKind::Pause, &a);
        bus.on(EventKind::Pause, &a);

        assert!(bus.off(EventKind::Pause, &a));
        assert_eq!(bus.listener_count(EventKind::Pause), 1);
        assert!(bus.off(EventKind::Pause, &a));
        assert!(bus.is_empty());
        assert!(!bus.off(EventKind::Pause, &a));
    }

    #[test]
    fn test_off_all_silences_everything() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        for kind in EventKind::ALL {
            bus.on(kind, &recorder(&log, "x"));
        }
        bus.off_all();
        assert_eq!(emit(&mut bus, PlayerEvent::Ended).0, 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_off_kind_keeps_other_kinds() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on(EventKind::Play, &recorder(&log, "p"));
        bus.on(EventKind::Ended, &recorder(&log, "e"));
        bus.off_kind(EventKind::Play);
        emit(&mut bus, PlayerEvent::Play);
        emit(&mut bus, PlayerEvent::Ended);
        assert_eq!(*log.borrow(), vec!["e:ended"]);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_emission() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on(EventKind::Play, &recorder(&log, "before"));
        bus.on(
            EventKind::Play,
            &Listener::new(|_, _| panic!("handler exploded")),
        );
        bus.on(EventKind::Play, &recorder(&log, "after"));

        assert_eq!(emit(&mut bus, PlayerEvent::Play).0, 3);
        assert_eq!(*log.borrow(), vec!["before:play", "after:play"]);
    }

    #[test]
    fn test_subscription_changes_apply_to_next_emission() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let late = recorder(&log, "late");
        let late_in_handler = late.clone();
        bus.on(
            EventKind::Play,
            &Listener::new(move |_, ctx| {
                ctx.off_all();
                ctx.on(EventKind::Play, &late_in_handler);
            }),
        );
        bus.on(EventKind::Play, &recorder(&log, "second"));

        emit(&mut bus, PlayerEvent::Play);
        assert_eq!(*log.borrow(), vec!["second:play"]);

        emit(&mut bus, PlayerEvent::Play);
        assert_eq!(*log.borrow(), vec!["second:play", "late:play"]);
    }

    #[test]
    fn test_handlers_queue_commands() {
        let mut bus = EventBus::new();
        bus.on(
            EventKind::TimeUpdate,
            &Listener::new(|event, ctx| {
                if let PlayerEvent::TimeUpdate { frame, .. } = event {
                    ctx.set_current_frame(frame + 1);
                }
                ctx.pause();
            }),
        );
        let (_, commands) = emit(
            &mut bus,
            PlayerEvent::TimeUpdate {
                frame: 4,
                time: None,
            },
        );
        assert_eq!(
            commands.into_iter().collect::<Vec<_>>(),
            vec![PlayerCmd::SetFrame(5), PlayerCmd::Pause]
        );
    }
}
