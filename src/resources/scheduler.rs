//! Host timing collaborators.
//!
//! The player never owns a display loop. It asks a [`RedrawScheduler`] for the
//! next redraw callback and the host answers by calling
//! [`SpritePlayer::on_redraw`](crate::player::SpritePlayer::on_redraw) with the
//! handle it was given and the callback timestamp. A [`Clock`] supplies the
//! reference timestamp when fps playback starts.
//!
//! [`FrameQueue`] is a ready-made scheduler for hosts that run their own loop:
//! requested handles accumulate until the host drains them once per display
//! refresh.

use std::time::Instant;

/// Opaque identifier of one requested redraw callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(pub u64);

/// Issues redraw callbacks, one per display refresh.
pub trait RedrawScheduler {
    /// Request one redraw callback and return its handle.
    fn schedule(&mut self) -> FrameHandle;
    /// Withdraw a requested callback. Unknown or already fired handles are ignored.
    fn cancel(&mut self, handle: FrameHandle);
}

/// Monotonic time source in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

impl<F> Clock for F
where
    F: Fn() -> f64,
{
    fn now_ms(&self) -> f64 {
        self()
    }
}

/// Wall clock measuring milliseconds since its creation.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for WallClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Host-serviced redraw scheduler.
///
/// Handles are issued with strictly increasing ids and stay pending until the
/// host takes them with [`FrameQueue::take_due`] or the player cancels them.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next_id: u64,
    pending: Vec<FrameHandle>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every pending handle, oldest first.
    pub fn take_due(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.pending)
    }

    /// Handles requested but not yet taken.
    pub fn pending(&self) -> &[FrameHandle] {
        &self.pending
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

impl RedrawScheduler for FrameQueue {
    fn schedule(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending.push(handle);
        handle
    }

    fn cancel(&mut self, handle: FrameHandle) {
        self.pending.retain(|h| *h != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_handles_are_unique_and_ordered() {
        let mut queue = FrameQueue::new();
        let a = queue.schedule();
        let b = queue.schedule();
        assert!(a < b);
        assert_eq!(queue.take_due(), vec![a, b]);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_cancel_removes_only_that_handle() {
        let mut queue = FrameQueue::new();
        let a = queue.schedule();
        let b = queue.schedule();
        queue.cancel(a);
        queue.cancel(a);
        assert_eq!(queue.pending(), &[b]);
    }

    #[test]
    fn test_closure_clock() {
        let now = Cell::new(16.5);
        let clock = || now.get();
        assert_eq!(clock.now_ms(), 16.5);
        now.set(33.0);
        assert_eq!(clock.now_ms(), 33.0);
    }

    #[test]
    fn test_wall_clock_is_monotonic() {
        let clock = WallClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
