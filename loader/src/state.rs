use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// The state of a single load.
///
/// Each transition replaces the whole value, so a reader never sees data and
/// an error side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum LoadState<T> {
    /// Nothing has been dispatched yet.
    Idle,
    Loading,
    Success(T),
    Failure(ErrorInfo),
}

/// An input to the load state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    Started,
    Fetched(T),
    Failed(ErrorInfo),
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        LoadState::Idle
    }
}

impl<T> LoadState<T> {
    /// Compute the next state for an event.
    ///
    /// The previous state is discarded entirely; there is no merging of old
    /// data into the new value.
    pub fn apply(self, event: Event<T>) -> LoadState<T> {
        match event {
            Event::Started => LoadState::Loading,
            Event::Fetched(data) => LoadState::Success(data),
            Event::Failed(error) => LoadState::Failure(error),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, LoadState::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    /// True once the load reached `Success` or `Failure`.
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadState::Success(_) | LoadState::Failure(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            LoadState::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// Returns `None` while the load has not settled.
    pub fn into_result(self) -> Option<Result<T, ErrorInfo>> {
        match self {
            LoadState::Success(data) => Some(Ok(data)),
            LoadState::Failure(error) => Some(Err(error)),
            LoadState::Idle | LoadState::Loading => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadState<U> {
        match self {
            LoadState::Idle => LoadState::Idle,
            LoadState::Loading => LoadState::Loading,
            LoadState::Success(data) => LoadState::Success(f(data)),
            LoadState::Failure(error) => LoadState::Failure(error),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request never produced a response.
    #[display("transport")]
    Transport,
    /// A response arrived with a status outside the 2xx range.
    #[display("status")]
    Status,
    /// The body could not be decoded into the expected type.
    #[display("decode")]
    Decode,
}

/// A failure normalized for display, detached from the error that caused it.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[display("{kind} error: {message}")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    /// Present for status errors.
    pub status: Option<u16>,
}

/// Observable holder of a [`LoadState`].
///
/// Reads return the latest value synchronously; subscribers are notified on
/// every write. Cloning the cell shares the same underlying state.
///
/// Only the loader that owns a cell writes to it:
///
/// ```compile_fail
/// fn overwrite(cell: &loader::StateCell<u32>) {
///     cell.dispatch(loader::Event::Fetched(1));
/// }
/// ```
pub struct StateCell<T> {
    sender: Arc<watch::Sender<LoadState<T>>>,
    transitions: Arc<AtomicUsize>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            transitions: self.transitions.clone(),
        }
    }
}

impl<T> StateCell<T> {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(LoadState::Idle);
        Self {
            sender: Arc::new(sender),
            transitions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Clone out the current state.
    pub fn get(&self) -> LoadState<T>
    where
        T: Clone,
    {
        self.sender.borrow().clone()
    }

    /// Inspect the current state without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&LoadState<T>) -> R) -> R {
        f(&self.sender.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState<T>> {
        self.sender.subscribe()
    }

    /// Number of writes since the cell was created.
    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }

    /// Replace the state with the result of applying `event`.
    pub(crate) fn dispatch(&self, event: Event<T>) {
        self.sender.send_modify(|state| {
            let previous = std::mem::replace(state, LoadState::Idle);
            *state = previous.apply(event);
            self.transitions.fetch_add(1, Ordering::SeqCst);
        });
    }

    /// Like [`StateCell::dispatch`], but only while `token` is active.
    ///
    /// The token is checked while the cell's write lock is held, and
    /// [`StateCell::close`] cancels under the same lock, so a write either
    /// lands entirely before the close or not at all.
    pub(crate) fn dispatch_if_active(
        &self,
        token: &CancellationToken,
        event: Event<T>,
    ) -> bool {
        self.sender.send_if_modified(|state| {
            if token.is_cancelled() {
                return false;
            }
            let previous = std::mem::replace(state, LoadState::Idle);
            *state = previous.apply(event);
            self.transitions.fetch_add(1, Ordering::SeqCst);
            true
        })
    }

    /// Cancel `token`, ordered against concurrent
    /// [`StateCell::dispatch_if_active`] calls. The state is left untouched.
    pub(crate) fn close(&self, token: &CancellationToken) {
        self.sender.send_if_modified(|_| {
            token.cancel();
            false
        });
    }
}
