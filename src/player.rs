//! Playback controller.
//!
//! [`SpritePlayer`] ties the asset gate, the scheduling clock, the frame
//! sequencer and the event bus together behind a transport-style API.
//!
//! # State Machine
//!
//! ```text
//!            play() + assets ready            last frame drawn, !loop
//!   Idle ---------------------------> Playing ------------------------> Idle (+ ended)
//!    ^                                   |
//!    +------------ pause() (+ pause) ----+
//! ```
//!
//! `Playing` holds exactly while a redraw callback is armed. Every accepted
//! callback re-arms first, then asks the clock whether to draw, then draws the
//! cursor frame and advances it.
//!
//! # Host Loop
//!
//! The host owns the display loop. Per display refresh it should:
//! 1. call [`SpritePlayer::poll_assets`] while a load may be in flight
//! 2. deliver every due redraw handle through [`SpritePlayer::on_redraw`]
//! 3. render whatever the surface now shows
//!
//! With a [`FrameQueue`] scheduler, [`SpritePlayer::run_frame`] does steps 1
//! and 2.

use std::collections::VecDeque;

use log::{debug, error, info, trace, warn};

use crate::components::playback::{PlayState, PlaybackState};
use crate::components::sprite::SheetLayout;
use crate::error::{PlayerError, PlayerResult};
use crate::events::bus::{EventBus, EventContext, Listener, PlayerCmd};
use crate::events::playback::{EventKind, PlayerEvent, PlayerStatus};
use crate::resources::assetstore::{AssetGate, Continuation, GateOutcome};
use crate::resources::loader::AssetLoader;
use crate::resources::playerconfig::{DrawMode, PlayerConfig, RawOptions};
use crate::resources::scheduler::{Clock, FrameHandle, FrameQueue, RedrawScheduler};
use crate::resources::surface::Surface;
use crate::systems::clock::{should_draw, start_clock};
use crate::systems::sequencer::{
    Advance, advance, mark_drawn, render_frame, seek_target_for_frame, seek_target_for_time,
};

/// Upper bound on handler-queued commands applied after one operation.
pub const MAX_COMMANDS_PER_DRAIN: usize = 64;

pub struct SpritePlayer<L, S, R, C>
where
    L: AssetLoader,
{
    config: PlayerConfig,
    layout: SheetLayout,
    playback: PlaybackState,
    gate: AssetGate<L::Image>,
    bus: EventBus,
    commands: VecDeque<PlayerCmd>,
    loader: L,
    surface: S,
    scheduler: R,
    clock: C,
    last_error: Option<PlayerError>,
}

impl<L, S, R, C> SpritePlayer<L, S, R, C>
where
    L: AssetLoader,
    S: Surface<L::Image>,
    R: RedrawScheduler,
    C: Clock,
{
    /// Build a player. The surface takes the frame size; with `auto_play`
    /// set, [`play`](Self::play) is called before returning.
    pub fn new(config: PlayerConfig, loader: L, mut surface: S, scheduler: R, clock: C) -> Self {
        surface.resize(config.frame_width, config.frame_height);
        let layout = SheetLayout::new(
            config.frame_width,
            config.frame_height,
            config.sprites_per_row,
        );
        let gate = AssetGate::new(config.source.clone(), config.frame_count);
        debug!(
            "Player created: {} frame(s) {}x{}, {} clock {}, loop {}",
            config.frame_count,
            config.frame_width,
            config.frame_height,
            config.draw_mode,
            config.draw_clock,
            config.looped
        );
        let auto_play = config.auto_play;
        let mut player = Self {
            config,
            layout,
            playback: PlaybackState::default(),
            gate,
            bus: EventBus::new(),
            commands: VecDeque::new(),
            loader,
            surface,
            scheduler,
            clock,
            last_error: None,
        };
        if auto_play {
            // a failed load is already reported and kept in last_error
            let _ = player.play();
        }
        player
    }

    /// Validate `options` and build a player.
    pub fn from_options(
        options: &RawOptions,
        loader: L,
        surface: S,
        scheduler: R,
        clock: C,
    ) -> PlayerResult<Self> {
        let config = options.resolve()?;
        Ok(Self::new(config, loader, surface, scheduler, clock))
    }

    // ---------------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------------

    /// Start playback once the assets are ready.
    ///
    /// No-op while playing. The first frame is drawn on the next accepted
    /// redraw callback, not during this call. Returns the load error when the
    /// loader fails synchronously.
    pub fn play(&mut self) -> PlayerResult<()> {
        let result = self.request_play();
        self.drain_commands();
        result
    }

    /// Stop playback. No-op while idle.
    ///
    /// While the assets are still loading this cancels the pending start and
    /// emits nothing.
    pub fn pause(&mut self) {
        self.request_pause();
        self.drain_commands();
    }

    /// Draw frame `index` now, then advance the cursor past it.
    ///
    /// Out-of-range indices are clamped to the last frame. Valid in either
    /// state. Landing on the last frame of a non-looping sequence emits
    /// `ended`, and stops playback if it was running.
    pub fn set_current_frame(&mut self, index: u32) {
        let target = seek_target_for_frame(&self.config, index);
        self.seek(target);
        self.drain_commands();
    }

    /// Seek to `seconds` (fps mode only), i.e. frame `floor(seconds * fps)`.
    pub fn set_current_time(&mut self, seconds: f64) -> PlayerResult<()> {
        let result = match seek_target_for_time(&self.config, seconds) {
            Ok(target) => {
                self.seek(target);
                Ok(())
            }
            Err(e) => {
                self.report(e.clone());
                Err(e)
            }
        };
        self.drain_commands();
        result
    }

    /// Make progress on a load in flight; starts playback when it completes.
    pub fn poll_assets(&mut self) -> PlayerResult<()> {
        if !self.gate.is_loading() {
            return Ok(());
        }
        let outcome = self.gate.poll(&mut self.loader);
        let result = self.handle_gate_outcome(outcome);
        self.drain_commands();
        result
    }

    /// Redraw callback entry point. Handles other than the armed one are
    /// stale and ignored.
    pub fn on_redraw(&mut self, handle: FrameHandle, timestamp_ms: f64) {
        if self.playback.scheduled != Some(handle) {
            trace!("Ignoring stale redraw callback {handle:?}");
            return;
        }
        self.playback.scheduled = Some(self.scheduler.schedule());
        let draw = match self.playback.clock.as_mut() {
            Some(clock) => should_draw(clock, timestamp_ms),
            None => false,
        };
        if draw {
            let index = self.playback.cursor;
            if self.draw(index) {
                self.advance_after_draw();
            }
        }
        self.drain_commands();
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub fn on(&mut self, kind: EventKind, listener: &Listener) {
        self.bus.on(kind, listener);
    }

    /// Register a closure and return its handle for later removal.
    pub fn listen<F>(&mut self, kind: EventKind, handler: F) -> Listener
    where
        F: Fn(&PlayerEvent, &mut EventContext<'_>) + 'static,
    {
        let listener = Listener::new(handler);
        self.bus.on(kind, &listener);
        listener
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

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.bus.listener_count(kind)
    }

    /// Deliver `event` to its subscribers. Returns how many handlers ran.
    pub fn emit(&mut self, event: PlayerEvent) -> usize {
        let invoked = self.emit_event(event);
        self.drain_commands();
        invoked
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Frame most recently drawn.
    pub fn current_frame(&self) -> u32 {
        self.playback.current_frame
    }

    /// `current_frame / fps` in fps mode.
    pub fn current_time(&self) -> Option<f64> {
        match self.config.draw_mode {
            DrawMode::Fps => Some(self.playback.current_time),
            DrawMode::Repaint => None,
        }
    }

    pub fn state(&self) -> PlayState {
        self.playback.state()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn is_loading(&self) -> bool {
        self.gate.is_loading()
    }

    /// Most recently reported error.
    pub fn last_error(&self) -> Option<&PlayerError> {
        self.last_error.as_ref()
    }

    /// Number of frames drawn so far.
    pub fn draw_count(&self) -> u64 {
        self.playback.draws
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.state(),
            current_frame: self.playback.current_frame,
            current_time: self.current_time(),
            frame_count: self.config.frame_count,
            ready: self.gate.is_ready(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn scheduler(&self) -> &R {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut R {
        &mut self.scheduler
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    // ---------------------------------------------------------------------
    // Internals. None of these drain the command queue.
    // ---------------------------------------------------------------------

    fn request_play(&mut self) -> PlayerResult<()> {
        if self.playback.is_playing() {
            trace!("play() while playing");
            return Ok(());
        }
        if self.gate.waiting().contains(&Continuation::StartPlayback) {
            debug!("play() while loading; start already queued");
            return Ok(());
        }
        let outcome = self
            .gate
            .ensure_ready(&mut self.loader, Continuation::StartPlayback);
        self.handle_gate_outcome(outcome)
    }

    fn request_pause(&mut self) {
        let Some(handle) = self.playback.scheduled.take() else {
            if self.gate.cancel_waiters() > 0 {
                debug!("pause() while loading; pending start cancelled");
            } else {
                trace!("pause() while idle");
            }
            return;
        };
        self.scheduler.cancel(handle);
        self.playback.clock = None;
        debug!("Paused at frame {}", self.playback.current_frame);
        self.emit_event(PlayerEvent::Pause);
    }

    fn handle_gate_outcome(&mut self, outcome: GateOutcome) -> PlayerResult<()> {
        match outcome {
            GateOutcome::Ready(continuations) => {
                for continuation in continuations {
                    match continuation {
                        Continuation::StartPlayback => self.start_playback(),
                    }
                }
                Ok(())
            }
            GateOutcome::Pending | GateOutcome::Idle => Ok(()),
            GateOutcome::Failed(e) => {
                self.report(e.clone());
                Err(e)
            }
        }
    }

    fn start_playback(&mut self) {
        if self.playback.is_playing() {
            return;
        }
        if self.playback.exhausted {
            debug!("Sequence finished; rewinding to frame 0");
            self.playback.rewind();
        }
        self.playback.clock = Some(start_clock(&self.config, self.clock.now_ms()));
        self.playback.scheduled = Some(self.scheduler.schedule());
        debug!("Playing from frame {}", self.playback.cursor);
        self.emit_event(PlayerEvent::Play);
    }

    fn seek(&mut self, target: u32) {
        self.playback.cursor = target;
        self.playback.exhausted = false;
        if !self.gate.is_ready() {
            debug!("Assets not ready; playback will start at frame {target}");
            self.playback.current_frame = target;
            if let Some(interval) = self.config.fps_interval_ms() {
                self.playback.current_time = target as f64 * interval / 1000.0;
            }
            return;
        }
        if self.draw(target) {
            self.advance_after_draw();
        }
    }

    fn draw(&mut self, index: u32) -> bool {
        if !render_frame(
            &self.gate,
            &mut self.surface,
            &self.config,
            &self.layout,
            index,
        ) {
            warn!("Frame {index} is not loaded; draw skipped");
            return false;
        }
        mark_drawn(&mut self.playback, &self.config, index);
        let time = self.current_time();
        self.emit_event(PlayerEvent::TimeUpdate { frame: index, time });
        true
    }

    fn advance_after_draw(&mut self) {
        match advance(&mut self.playback, &self.config) {
            Advance::Next(_) => {}
            Advance::Wrapped => trace!("Looped back to frame 0"),
            Advance::Ended => self.finish(),
        }
    }

    /// Emits `ended`. Cancels the armed callback, if any.
    fn finish(&mut self) {
        if let Some(handle) = self.playback.scheduled.take() {
            self.scheduler.cancel(handle);
        }
        self.playback.clock = None;
        info!("Sequence ended at frame {}", self.playback.current_frame);
        self.emit_event(PlayerEvent::Ended);
    }

    fn emit_event(&mut self, event: PlayerEvent) -> usize {
        let status = self.status();
        self.bus.emit(&event, &mut self.commands, status)
    }

    fn drain_commands(&mut self) {
        let mut applied = 0;
        while let Some(cmd) = self.commands.pop_front() {
            if applied == MAX_COMMANDS_PER_DRAIN {
                warn!(
                    "Dropping {} queued command(s) after applying {applied}",
                    self.commands.len() + 1
                );
                self.commands.clear();
                break;
            }
            applied += 1;
            trace!("Applying queued {cmd:?}");
            match cmd {
                PlayerCmd::Play => {
                    // failures are reported inside
                    let _ = self.request_play();
                }
                PlayerCmd::Pause => self.request_pause(),
                PlayerCmd::SetFrame(index) => {
                    let target = seek_target_for_frame(&self.config, index);
                    self.seek(target);
                }
                PlayerCmd::SetTime(seconds) => match seek_target_for_time(&self.config, seconds) {
                    Ok(target) => self.seek(target),
                    Err(e) => self.report(e),
                },
            }
        }
    }

    fn report(&mut self, error: PlayerError) {
        match &error {
            PlayerError::Load { .. } | PlayerError::Config(_) => error!("{error}"),
            PlayerError::UnsupportedOperation(_) => warn!("{error}"),
        }
        self.last_error = Some(error);
    }
}

impl<L, S, C> SpritePlayer<L, S, FrameQueue, C>
where
    L: AssetLoader,
    S: Surface<L::Image>,
    C: Clock,
{
    /// One display refresh: poll pending loads, then deliver every due
    /// redraw handle with `timestamp_ms`.
    pub fn run_frame(&mut self, timestamp_ms: f64) -> PlayerResult<()> {
        let loaded = self.poll_assets();
        for handle in self.scheduler.take_due() {
            self.on_redraw(handle, timestamp_ms);
        }
        loaded
    }
}
