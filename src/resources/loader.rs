//! Asset fetching collaborators.
//!
//! The asset gate talks to an [`AssetLoader`]: it files [`AssetRequest`]s and
//! later polls their [`Ticket`]s. Loading may finish immediately (the next
//! poll is `Ready`) or several host turns later.
//!
//! Two loaders are provided:
//! - [`DeferredLoader`] queues requests for the host to service on its own
//!   thread, e.g. a renderer that must create textures itself.
//! - [`ThreadedLoader`] runs a blocking fetch function on a background thread
//!   and hands results back over a channel.
//!
//! # Threading
//!
//! ```text
//!   player thread                        loader thread
//!   -------------                        -------------
//!   request() -- LoaderCmd::Fetch -----> fetch(&request)
//!   poll()    <-- (Ticket, result) ----- send result
//!   drop      -- LoaderCmd::Shutdown --> exit loop, joined
//! ```

use std::path::PathBuf;
use std::task::Poll;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{PlayerError, PlayerResult};

/// Identifies one outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRequest {
    /// Fetch and decode an image.
    Image(String),
    /// Fetch a text resource, e.g. a sequence manifest.
    Text(String),
}

impl AssetRequest {
    pub fn url(&self) -> &str {
        match self {
            AssetRequest::Image(url) | AssetRequest::Text(url) => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPayload<I> {
    Image(I),
    Text(String),
}

pub trait AssetLoader {
    /// Handle of a decoded image, as understood by the host's surface.
    type Image;

    fn request(&mut self, request: AssetRequest) -> Ticket;
    /// `Ready` is returned at most once per ticket.
    fn poll(&mut self, ticket: Ticket) -> Poll<PlayerResult<AssetPayload<Self::Image>>>;
    /// Give up on a ticket that has not been returned `Ready`. Its result is
    /// discarded whenever it arrives.
    fn forget(&mut self, ticket: Ticket);
}

/// Loader whose requests are fulfilled by the host.
///
/// The host drains [`DeferredLoader::take_requests`] and answers each with
/// [`DeferredLoader::complete`].
#[derive(Debug)]
pub struct DeferredLoader<I> {
    next_id: u64,
    outstanding: Vec<(Ticket, AssetRequest)>,
    completed: FxHashMap<Ticket, PlayerResult<AssetPayload<I>>>,
    /// Taken by the host but forgotten before it answered.
    forgotten: FxHashSet<Ticket>,
    issued: usize,
}

impl<I> Default for DeferredLoader<I> {
    fn default() -> Self {
        Self {
            next_id: 0,
            outstanding: Vec::new(),
            completed: FxHashMap::default(),
            forgotten: FxHashSet::default(),
            issued: 0,
        }
    }
}

impl<I> DeferredLoader<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests filed since the last call, oldest first.
    pub fn take_requests(&mut self) -> Vec<(Ticket, AssetRequest)> {
        std::mem::take(&mut self.outstanding)
    }

    pub fn outstanding(&self) -> &[(Ticket, AssetRequest)] {
        &self.outstanding
    }

    /// Total number of requests ever filed.
    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn complete(&mut self, ticket: Ticket, result: PlayerResult<AssetPayload<I>>) {
        if self.forgotten.remove(&ticket) {
            debug!("Discarding result of forgotten {ticket:?}");
            return;
        }
        self.completed.insert(ticket, result);
    }

    /// Answer every outstanding request with `fetch`.
    pub fn service<F>(&mut self, mut fetch: F)
    where
        F: FnMut(&AssetRequest) -> PlayerResult<AssetPayload<I>>,
    {
        for (ticket, request) in self.take_requests() {
            let result = fetch(&request);
            self.complete(ticket, result);
        }
    }
}

impl<I> AssetLoader for DeferredLoader<I> {
    type Image = I;

    fn request(&mut self, request: AssetRequest) -> Ticket {
        self.next_id += 1;
        self.issued += 1;
        let ticket = Ticket(self.next_id);
        debug!("Queued {:?} as {:?}", request, ticket);
        self.outstanding.push((ticket, request));
        ticket
    }

    fn poll(&mut self, ticket: Ticket) -> Poll<PlayerResult<AssetPayload<I>>> {
        match self.completed.remove(&ticket) {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }

    fn forget(&mut self, ticket: Ticket) {
        if self.completed.remove(&ticket).is_some() {
            return;
        }
        let queued = self.outstanding.len();
        self.outstanding.retain(|(t, _)| *t != ticket);
        if self.outstanding.len() == queued {
            self.forgotten.insert(ticket);
        }
    }
}

/// Messages sent to the loader thread.
#[derive(Debug, Clone)]
pub enum LoaderCmd {
    Fetch(Ticket, AssetRequest),
    Shutdown,
}

/// Loader that runs a blocking fetch function on a dedicated thread.
pub struct ThreadedLoader<I: Send + 'static> {
    next_id: u64,
    tx_cmd: Sender<LoaderCmd>,
    rx_result: Receiver<(Ticket, PlayerResult<AssetPayload<I>>)>,
    completed: FxHashMap<Ticket, PlayerResult<AssetPayload<I>>>,
    forgotten: FxHashSet<Ticket>,
    handle: Option<JoinHandle<()>>,
}

impl<I: Send + 'static> ThreadedLoader<I> {
    /// Spawn the loader thread.
    pub fn spawn<F>(fetch: F) -> Self
    where
        F: FnMut(&AssetRequest) -> PlayerResult<AssetPayload<I>> + Send + 'static,
    {
        let (tx_cmd, rx_cmd) = unbounded::<LoaderCmd>();
        let (tx_result, rx_result) = unbounded();
        let handle = std::thread::spawn(move || loader_thread(rx_cmd, tx_result, fetch));
        Self {
            next_id: 0,
            tx_cmd,
            rx_result,
            completed: FxHashMap::default(),
            forgotten: FxHashSet::default(),
            handle: Some(handle),
        }
    }

    fn drain(&mut self) {
        for (ticket, result) in self.rx_result.try_iter() {
            if self.forgotten.remove(&ticket) {
                debug!("Discarding result of forgotten {ticket:?}");
                continue;
            }
            self.completed.insert(ticket, result);
        }
    }
}

fn loader_thread<I, F>(
    rx_cmd: Receiver<LoaderCmd>,
    tx_result: Sender<(Ticket, PlayerResult<AssetPayload<I>>)>,
    mut fetch: F,
) where
    F: FnMut(&AssetRequest) -> PlayerResult<AssetPayload<I>>,
{
    while let Ok(cmd) = rx_cmd.recv() {
        match cmd {
            LoaderCmd::Fetch(ticket, request) => {
                let result = fetch(&request);
                // The player may already be gone; nothing left to notify.
                if tx_result.send((ticket, result)).is_err() {
                    break;
                }
            }
            LoaderCmd::Shutdown => break,
        }
    }
    debug!("Loader thread exiting");
}

impl<I: Send + 'static> AssetLoader for ThreadedLoader<I> {
    type Image = I;

    fn request(&mut self, request: AssetRequest) -> Ticket {
        self.next_id += 1;
        let ticket = Ticket(self.next_id);
        if self
            .tx_cmd
            .send(LoaderCmd::Fetch(ticket, request.clone()))
            .is_err()
        {
            warn!("Loader thread is gone; failing {}", request.url());
            self.completed.insert(
                ticket,
                Err(PlayerError::load(request.url(), "loader thread stopped")),
            );
        }
        ticket
    }

    fn poll(&mut self, ticket: Ticket) -> Poll<PlayerResult<AssetPayload<I>>> {
        self.drain();
        match self.completed.remove(&ticket) {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }

    fn forget(&mut self, ticket: Ticket) {
        self.drain();
        if self.completed.remove(&ticket).is_none() {
            self.forgotten.insert(ticket);
        }
    }
}

impl<I: Send + 'static> Drop for ThreadedLoader<I> {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(LoaderCmd::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Blocking fetch from the local filesystem.
///
/// Relative URLs are resolved against `root`. Images are returned as their
/// encoded bytes; decoding is left to the surface.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    pub root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        self.root.join(url)
    }

    pub fn fetch(&self, request: &AssetRequest) -> PlayerResult<AssetPayload<Vec<u8>>> {
        let path = self.resolve(request.url());
        match request {
            AssetRequest::Text(url) => std::fs::read_to_string(&path)
                .map(AssetPayload::Text)
                .map_err(|e| PlayerError::load(url.as_str(), e.to_string())),
            AssetRequest::Image(url) => std::fs::read(&path)
                .map(AssetPayload::Image)
                .map_err(|e| PlayerError::load(url.as_str(), e.to_string())),
        }
    }
}
