//! Asset cache and the readiness gate in front of playback.
//!
//! The gate loads the configured [`AssetSource`] at most once per player and
//! hands back the queued [`Continuation`]s when the pixels are available.
//!
//! # Load Flow
//!
//! Sheet:
//! 1. `Image(url)` is requested
//! 2. the decoded image becomes the cache
//!
//! Sequence:
//! 1. `Text(manifest_url)` is requested
//! 2. the manifest is split on the delimiter; entries are trimmed and empty
//!    entries dropped
//! 3. one `Image(entry)` per frame is requested, in frame order
//! 4. the cache is ready once every frame image arrived
//!
//! Any failure drops the queued continuations and returns the gate to the
//! unloaded state. Frame requests still in flight are forgotten on the loader. Nothing is retried until the next
//! [`AssetGate::ensure_ready`].

use std::task::Poll;

use log::{debug, info, warn};
use smallvec::{SmallVec, smallvec};

use crate::error::{PlayerError, PlayerResult};
use crate::resources::loader::{AssetLoader, AssetPayload, AssetRequest, Ticket};
use crate::resources::playerconfig::AssetSource;

/// Work deferred until the assets are ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    StartPlayback,
}

pub type Continuations = SmallVec<[Continuation; 2]>;

/// Loaded pixel sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetCache<I> {
    Empty,
    Sheet(I),
    Sequence(Vec<I>),
}

/// Result of driving the gate.
#[derive(Debug, PartialEq)]
pub enum GateOutcome {
    /// Assets are ready; run these continuations in order.
    Ready(Continuations),
    /// A load is in flight.
    Pending,
    /// The load failed; continuations were dropped.
    Failed(PlayerError),
    /// Nothing requested yet.
    Idle,
}

#[derive(Debug)]
enum GateState<I> {
    Unloaded,
    FetchingSheet { url: String, ticket: Ticket },
    FetchingManifest { url: String, ticket: Ticket },
    FetchingFrames {
        entries: Vec<String>,
        tickets: Vec<Ticket>,
        frames: Vec<Option<I>>,
    },
    Ready,
}

#[derive(Debug)]
pub struct AssetGate<I> {
    source: AssetSource,
    frame_count: usize,
    state: GateState<I>,
    cache: AssetCache<I>,
    waiters: Continuations,
}

impl<I> AssetGate<I> {
    pub fn new(source: AssetSource, frame_count: u32) -> Self {
        Self {
            source,
            frame_count: frame_count as usize,
            state: GateState::Unloaded,
            cache: AssetCache::Empty,
            waiters: SmallVec::new(),
        }
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, GateState::Ready)
    }

    pub fn is_loading(&self) -> bool {
        !matches!(self.state, GateState::Unloaded | GateState::Ready)
    }

    pub fn cache(&self) -> &AssetCache<I> {
        &self.cache
    }

    /// Continuations waiting on the current load.
    pub fn waiting(&self) -> &[Continuation] {
        &self.waiters
    }

    /// Drop every queued continuation. A load in flight keeps going.
    pub fn cancel_waiters(&mut self) -> usize {
        let dropped = self.waiters.len();
        self.waiters.clear();
        dropped
    }

    /// Run `continuation` once the assets are ready.
    ///
    /// When the cache is already loaded the continuation comes straight back in
    /// [`GateOutcome::Ready`]. Otherwise it is queued behind the single load in
    /// flight, starting that load if needed.
    pub fn ensure_ready<L>(&mut self, loader: &mut L, continuation: Continuation) -> GateOutcome
    where
        L: AssetLoader<Image = I>,
    {
        if self.is_ready() {
            return GateOutcome::Ready(smallvec![continuation]);
        }
        self.waiters.push(continuation);
        if matches!(self.state, GateState::Unloaded) {
            self.begin(loader);
        } else {
            debug!(
                "Load of {} already in flight; queued {:?}",
                self.source.primary_url(),
                continuation
            );
        }
        self.poll(loader)
    }

    fn begin<L>(&mut self, loader: &mut L)
    where
        L: AssetLoader<Image = I>,
    {
        self.state = match &self.source {
            AssetSource::Sheet { url } => {
                debug!("Loading sprite sheet {url}");
                GateState::FetchingSheet {
                    url: url.clone(),
                    ticket: loader.request(AssetRequest::Image(url.clone())),
                }
            }
            AssetSource::Sequence { manifest_url, .. } => {
                debug!("Loading sequence manifest {manifest_url}");
                GateState::FetchingManifest {
                    url: manifest_url.clone(),
                    ticket: loader.request(AssetRequest::Text(manifest_url.clone())),
                }
            }
        };
    }

    /// Make progress on the load in flight.
    pub fn poll<L>(&mut self, loader: &mut L) -> GateOutcome
    where
        L: AssetLoader<Image = I>,
    {
        loop {
            let state = std::mem::replace(&mut self.state, GateState::Unloaded);
            match state {
                GateState::Unloaded => return GateOutcome::Idle,
                GateState::Ready => {
                    self.state = GateState::Ready;
                    return GateOutcome::Ready(std::mem::take(&mut self.waiters));
                }
                GateState::FetchingSheet { url, ticket } => match loader.poll(ticket) {
                    Poll::Pending => {
                        self.state = GateState::FetchingSheet { url, ticket };
                        return GateOutcome::Pending;
                    }
                    Poll::Ready(result) => {
                        let image = match expect_image(&url, result) {
                            Ok(image) => image,
                            Err(e) => return self.fail(e),
                        };
                        info!("Sprite sheet {url} ready");
                        self.cache = AssetCache::Sheet(image);
                        self.state = GateState::Ready;
                    }
                },
                GateState::FetchingManifest { url, ticket } => match loader.poll(ticket) {
                    Poll::Pending => {
                        self.state = GateState::FetchingManifest { url, ticket };
                        return GateOutcome::Pending;
                    }
                    Poll::Ready(result) => {
                        let text = match expect_text(&url, result) {
                            Ok(text) => text,
                            Err(e) => return self.fail(e),
                        };
                        let entries = match self.manifest_entries(&url, &text) {
                            Ok(entries) => entries,
                            Err(e) => return self.fail(e),
                        };
                        let tickets = entries
                            .iter()
                            .map(|entry| loader.request(AssetRequest::Image(entry.clone())))
                            .collect();
                        let frames = entries.iter().map(|_| None).collect();
                        self.state = GateState::FetchingFrames {
                            entries,
                            tickets,
                            frames,
                        };
                    }
                },
                GateState::FetchingFrames {
                    entries,
                    tickets,
                    mut frames,
                } => {
                    let mut waiting = false;
                    for i in 0..frames.len() {
                        if frames[i].is_some() {
                            continue;
                        }
                        match loader.poll(tickets[i]) {
                            Poll::Pending => waiting = true,
                            Poll::Ready(result) => match expect_image(&entries[i], result) {
                                Ok(image) => frames[i] = Some(image),
                                Err(e) => {
                                    let abandoned = forget_unfinished(loader, &tickets, &frames, i);
                                    debug!("Abandoned {abandoned} frame request(s)");
                                    return self.fail(e);
                                }
                            },
                        }
                    }
                    if waiting {
                        self.state = GateState::FetchingFrames {
                            entries,
                            tickets,
                            frames,
                        };
                        return GateOutcome::Pending;
                    }
                    let images: Vec<I> = frames.into_iter().flatten().collect();
                    info!("Image sequence ready: {} frame(s)", images.len());
                    self.cache = AssetCache::Sequence(images);
                    self.state = GateState::Ready;
                }
            }
        }
    }

    fn manifest_entries(&self, url: &str, text: &str) -> PlayerResult<Vec<String>> {
        let delimiter = match &self.source {
            AssetSource::Sequence { delimiter, .. } => delimiter.as_str(),
            AssetSource::Sheet { .. } => {
                return Err(PlayerError::load(url, "manifest loaded for a sheet source"));
            }
        };
        let mut entries: Vec<String> = text
            .split(delimiter)
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect();
        if entries.len() < self.frame_count {
            return Err(PlayerError::load(
                url,
                format!(
                    "manifest lists {} frame(s), expected {}",
                    entries.len(),
                    self.frame_count
                ),
            ));
        }
        if entries.len() > self.frame_count {
            warn!(
                "Manifest {url} lists {} frame(s); only the first {} are used",
                entries.len(),
                self.frame_count
            );
            entries.truncate(self.frame_count);
        }
        Ok(entries)
    }

    fn fail(&mut self, error: PlayerError) -> GateOutcome {
        self.state = GateState::Unloaded;
        self.cache = AssetCache::Empty;
        let dropped = self.waiters.len();
        self.waiters.clear();
        debug!("Load failed, dropped {dropped} continuation(s)");
        GateOutcome::Failed(error)
    }

    /// The sheet image, when the source is a sheet and it is loaded.
    pub fn sheet(&self) -> Option<&I> {
        match &self.cache {
            AssetCache::Sheet(image) => Some(image),
            _ => None,
        }
    }

    /// Image of frame `index`, when the source is a sequence and it is loaded.
    pub fn frame(&self, index: u32) -> Option<&I> {
        match &self.cache {
            AssetCache::Sequence(frames) => frames.get(index as usize),
            _ => None,
        }
    }
}

/// Forget every frame ticket other than `failed` that has not delivered yet.
fn forget_unfinished<L, I>(
    loader: &mut L,
    tickets: &[Ticket],
    frames: &[Option<I>],
    failed: usize,
) -> usize
where
    L: AssetLoader<Image = I>,
{
    let mut forgotten = 0;
    for (i, (ticket, frame)) in tickets.iter().zip(frames).enumerate() {
        if i != failed && frame.is_none() {
            loader.forget(*ticket);
            forgotten += 1;
        }
    }
    forgotten
}

fn expect_image<I>(url: &str, result: PlayerResult<AssetPayload<I>>) -> PlayerResult<I> {
    match result? {
        AssetPayload::Image(image) => Ok(image),
        AssetPayload::Text(_) => Err(PlayerError::load(url, "expected an image, got text")),
    }
}

fn expect_text<I>(url: &str, result: PlayerResult<AssetPayload<I>>) -> PlayerResult<String> {
    match result? {
        AssetPayload::Text(text) => Ok(text),
        AssetPayload::Image(_) => Err(PlayerError::load(url, "expected text, got an image")),
    }
}
