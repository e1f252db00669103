//! One memoized request and its settlement state.

use std::fmt;
use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::decode::Fetched;
use crate::error::FetchError;
use crate::http::{RequestInfo, RequestInit};

/// Settlement state of a [`CacheEntry`].
///
/// `Pending` moves to exactly one of the terminal states and never back.
#[derive(Debug, Clone)]
pub enum EntryState {
    Pending,
    Resolved(Fetched),
    Errored(Arc<FetchError>),
}

impl EntryState {
    pub fn is_pending(&self) -> bool {
        matches!(self, EntryState::Pending)
    }
}

/// A memoized `(RequestInfo, RequestInit)` pairing.
///
/// The request parameters are fixed at creation; only the state changes,
/// and only once.
pub struct CacheEntry {
    input: RequestInfo,
    init: Option<RequestInit>,
    state: Mutex<EntryState>,
    settled: watch::Sender<bool>,
}

impl CacheEntry {
    /// Creates a pending entry.
    pub fn new(input: RequestInfo, init: Option<RequestInit>) -> Self {
        let (settled, _) = watch::channel(false);
        Self {
            input,
            init,
            state: Mutex::new(EntryState::Pending),
            settled,
        }
    }

    pub fn input(&self) -> &RequestInfo {
        &self.input
    }

    pub fn init(&self) -> Option<&RequestInit> {
        self.init.as_ref()
    }

    /// Returns `true` if this entry was created for exactly these parameters.
    pub fn matches(&self, input: &RequestInfo, init: Option<&RequestInit>) -> bool {
        &self.input == input && self.init.as_ref() == init
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> EntryState {
        self.state.lock().clone()
    }

    /// Returns a handle that completes at settlement, or `None` once settled.
    pub fn in_flight(&self) -> Option<InFlight> {
        let state = self.state.lock();
        state.is_pending().then(|| InFlight {
            settled: self.settled.subscribe(),
        })
    }

    // Handle that completes at settlement, immediately if already settled.
    pub(crate) fn watch(&self) -> InFlight {
        InFlight {
            settled: self.settled.subscribe(),
        }
    }

    /// Moves a pending entry to `Resolved` or `Errored`.
    ///
    /// Returns `false`, leaving the entry untouched, if it had already settled
    /// or if `outcome` is `Pending`.
    pub fn settle(&self, outcome: EntryState) -> bool {
        if outcome.is_pending() {
            return false;
        }
        {
            let mut state = self.state.lock();
            if !state.is_pending() {
                return false;
            }
            *state = outcome;
        }
        self.settled.send_replace(true);
        true
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("input", &self.input)
            .field("init", &self.init)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// The suspension signal: a handle on an outstanding request.
///
/// Await it (or call [`settled`](Self::settled)), then call again to read
/// the value or error. Handles are cheap to clone; every clone completes at
/// the same settlement.
#[derive(Clone)]
pub struct InFlight {
    settled: watch::Receiver<bool>,
}

impl InFlight {
    /// Waits until the entry has settled.
    pub async fn settled(mut self) {
        // A dropped sender means the entry is gone; nothing is left to wait for.
        let _ = self.settled.wait_for(|done| *done).await;
    }

    /// Returns `true` if the entry has already settled.
    pub fn is_settled(&self) -> bool {
        *self.settled.borrow()
    }
}

impl IntoFuture for InFlight {
    type Output = ();
    type IntoFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.settled())
    }
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("settled", &self.is_settled())
            .finish()
    }
}
