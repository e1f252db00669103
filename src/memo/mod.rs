//! The memoizer — a synchronous call site over asynchronous requests.
//!
//! [`FetchMemoizer::call`] never blocks and never awaits. It answers with an
//! [`Outcome`]:
//!
//! | Matched entry | Outcome                          | Caller should        |
//! |---------------|----------------------------------|----------------------|
//! | none (miss)   | [`Outcome::Pending`], new request | await, call again    |
//! | pending       | [`Outcome::Pending`]             | await, call again    |
//! | errored       | [`Outcome::Failed`]              | handle the error     |
//! | resolved      | [`Outcome::Value`]               | use the value        |
//!
//! Every miss dispatches exactly one request; every hit dispatches none.
//! Every dispatched request settles, even when the dispatcher panics.
//! [`FetchMemoizer::resolve`] wraps the await-and-retry loop for async callers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheStore, EntryState, InFlight, Lookup, schedule_eviction};
use crate::client::{Dispatcher, TcpDispatcher};
use crate::config::{ClientConfig, MemoizerConfig};
use crate::decode::{Fetched, ResponseDecoder};
use crate::error::FetchError;
use crate::http::{RequestInfo, RequestInit};

/// Per-call options.
///
/// Only the call that creates an entry applies its options; later matching
/// calls share that entry as it is.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fetchmemo::memo::FetchOptions;
///
/// // A bare number is a lifespan in milliseconds.
/// let short = FetchOptions::from(1000_u64);
/// assert_eq!(short.lifespan, Some(Duration::from_secs(1)));
///
/// let detailed = FetchOptions::new().lifespan(Duration::from_secs(5)).info(true);
/// assert!(detailed.info);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Time after settlement at which the entry is evicted. `None` defers to
    /// the memoizer's configured default; zero means never.
    pub lifespan: Option<Duration>,
    /// Return the decoded body paired with the response.
    pub info: bool,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lifespan(mut self, lifespan: Duration) -> Self {
        self.lifespan = Some(lifespan);
        self
    }

    #[must_use]
    pub fn info(mut self, info: bool) -> Self {
        self.info = info;
        self
    }
}

impl From<u64> for FetchOptions {
    fn from(lifespan_ms: u64) -> Self {
        Self::new().lifespan(Duration::from_millis(lifespan_ms))
    }
}

impl From<Duration> for FetchOptions {
    fn from(lifespan: Duration) -> Self {
        Self::new().lifespan(lifespan)
    }
}

/// The answer to one [`FetchMemoizer::call`].
#[derive(Debug, Clone)]
#[must_use]
pub enum Outcome {
    /// The request has resolved; here is its value.
    Value(Fetched),
    /// The request is still in flight; await the handle and call again.
    Pending(InFlight),
    /// The request failed; the same error is returned until the entry goes.
    Failed(Arc<FetchError>),
}

impl Outcome {
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Returns the value, discarding the other signals.
    pub fn value(self) -> Option<Fetched> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the captured error, discarding the other signals.
    pub fn error(self) -> Option<Arc<FetchError>> {
        match self {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    fn observe(entry: &CacheEntry) -> Self {
        match entry.state() {
            EntryState::Pending => Outcome::Pending(entry.watch()),
            EntryState::Resolved(value) => Outcome::Value(value),
            EntryState::Errored(error) => Outcome::Failed(error),
        }
    }
}

/// Memoizes requests made through one [`Dispatcher`] in one private store.
///
/// # Examples
///
/// ```rust
/// use fetchmemo::client::DispatchError;
/// use fetchmemo::http::{RequestInfo, RequestInit, Response, StatusCode};
/// use fetchmemo::memo::{FetchMemoizer, FetchOptions};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let memo = FetchMemoizer::new(|input: RequestInfo, _init: Option<RequestInit>| async move {
///     Ok::<_, DispatchError>(
///         Response::new(StatusCode::OK).body(format!("hello from {}", input.url())),
///     )
/// });
///
/// // First call: nothing cached yet, so the caller is told to wait.
/// let handle = match memo.call("http://svc/greeting", None, FetchOptions::new()) {
///     fetchmemo::Outcome::Pending(handle) => handle,
///     other => panic!("unexpected {other:?}"),
/// };
/// handle.await;
///
/// // Second call: the memoized value comes back synchronously.
/// let value = memo.call("http://svc/greeting", None, FetchOptions::new()).value().unwrap();
/// assert_eq!(value.data().as_text(), Some("hello from http://svc/greeting"));
/// # }
/// ```
pub struct FetchMemoizer {
    dispatcher: Arc<dyn Dispatcher>,
    store: Arc<CacheStore>,
    decoder: ResponseDecoder,
    config: MemoizerConfig,
}

impl FetchMemoizer {
    /// Binds `dispatcher` to a fresh, empty store with default settings.
    pub fn new(dispatcher: impl Dispatcher) -> Self {
        Self::with_config(dispatcher, MemoizerConfig::default())
    }

    /// Binds `dispatcher` to a fresh, empty store.
    pub fn with_config(dispatcher: impl Dispatcher, config: MemoizerConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            store: Arc::new(CacheStore::new()),
            decoder: ResponseDecoder::new(config.decode),
            config,
        }
    }

    /// The process-wide memoizer over the built-in [`TcpDispatcher`].
    ///
    /// Created on first use with settings read from the environment (see
    /// [`crate::config`]), then kept for the rest of the process. It is
    /// never reset; use [`clear`](Self::clear) to drop its entries.
    pub fn default_instance() -> &'static FetchMemoizer {
        static DEFAULT: OnceLock<FetchMemoizer> = OnceLock::new();
        DEFAULT.get_or_init(|| {
            FetchMemoizer::with_config(
                TcpDispatcher::with_config(ClientConfig::from_env()),
                MemoizerConfig::from_env(),
            )
        })
    }

    pub fn config(&self) -> &MemoizerConfig {
        &self.config
    }

    /// Looks up `(input, init)` and reports the entry's state, dispatching a
    /// new request on a miss.
    ///
    /// `options` accepts a [`FetchOptions`], a bare lifespan in milliseconds
    /// (`u64`), or a [`Duration`].
    ///
    /// On a miss the request is spawned onto the current Tokio runtime. A
    /// miss outside any runtime dispatches nothing, stores nothing, and
    /// returns [`Outcome::Failed`] with [`FetchError::NoRuntime`].
    ///
    /// A dispatcher that panics, synchronously or while its future is
    /// polled, settles the entry with [`FetchError::Panicked`].
    pub fn call(
        &self,
        input: impl Into<RequestInfo>,
        init: Option<RequestInit>,
        options: impl Into<FetchOptions>,
    ) -> Outcome {
        let input = input.into();

        match self.store.lookup_or_reserve(&input, init.as_ref()) {
            Lookup::Hit(entry) => {
                let outcome = Outcome::observe(&entry);
                debug!(url = %input, pending = outcome.is_pending(), "cache hit");
                outcome
            }
            Lookup::Reserved(entry) => {
                debug!(url = %input, "cache miss");
                self.start(entry, input, init, options.into())
            }
        }
    }

    /// [`call`](Self::call) with no init and default options.
    pub fn fetch(&self, input: impl Into<RequestInfo>) -> Outcome {
        self.call(input, None, FetchOptions::default())
    }

    /// Calls until the request settles, awaiting each in-flight handle.
    ///
    /// # Errors
    ///
    /// The captured [`FetchError`] of an errored entry.
    pub async fn resolve(
        &self,
        input: impl Into<RequestInfo>,
        init: Option<RequestInit>,
        options: impl Into<FetchOptions>,
    ) -> Result<Fetched, Arc<FetchError>> {
        let input = input.into();
        let options = options.into();

        loop {
            match self.call(input.clone(), init.clone(), options) {
                Outcome::Value(value) => return Ok(value),
                Outcome::Failed(error) => return Err(error),
                Outcome::Pending(handle) => handle.await,
            }
        }
    }

    /// Discards the entry matching `(input, init)`, so the next matching call
    /// dispatches afresh. Returns `false` if nothing matched.
    pub fn evict(&self, input: impl Into<RequestInfo>, init: Option<&RequestInit>) -> bool {
        let input = input.into();
        match self.store.find(&input, init) {
            Some(entry) => {
                debug!(url = %input, "evicting cache entry on request");
                self.store.remove(&entry)
            }
            None => false,
        }
    }

    /// Discards every entry. Requests already in flight still settle, but
    /// their results are no longer reachable.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Number of entries currently matchable.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // Dispatches the request for a freshly reserved entry and wires
    // decoding, settlement, and eviction onto its completion. The entry
    // settles on every path, including a panicking dispatcher.
    fn start(
        &self,
        entry: Arc<CacheEntry>,
        input: RequestInfo,
        init: Option<RequestInit>,
        options: FetchOptions,
    ) -> Outcome {
        if Handle::try_current().is_err() {
            // Nothing was dispatched, so nothing is memoized: a later call
            // from inside a runtime starts afresh.
            warn!(url = %input, "no Tokio runtime; request not dispatched");
            let error = Arc::new(FetchError::NoRuntime);
            entry.settle(EntryState::Errored(Arc::clone(&error)));
            self.store.remove(&entry);
            return Outcome::Failed(error);
        }

        let lifespan = options.lifespan.or_else(|| self.config.lifespan());
        let store = Arc::downgrade(&self.store);

        info!(
            url = %input,
            lifespan_ms = lifespan.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            info = options.info,
            "dispatching request"
        );
        let dispatched =
            panic::catch_unwind(AssertUnwindSafe(|| self.dispatcher.dispatch(input, init)));
        let request = match dispatched {
            Ok(request) => request,
            Err(payload) => {
                finish(&entry, Err(FetchError::from_panic(&*payload)));
                let outcome = Outcome::observe(&entry);
                schedule_eviction(entry, store, lifespan);
                return outcome;
            }
        };

        let handle = entry.watch();
        let decoder = self.decoder;

        tokio::spawn(async move {
            // Run the request on its own task so a panic surfaces as a
            // `JoinError` here instead of killing the settling task.
            let pipeline = tokio::spawn(async move {
                match request.await {
                    Ok(response) => decoder
                        .decode(response, options.info)
                        .map_err(FetchError::from),
                    Err(e) => Err(FetchError::from(e)),
                }
            });
            let result = pipeline.await.unwrap_or_else(|e| Err(FetchError::from_join(e)));

            finish(&entry, result);
            schedule_eviction(entry, store, lifespan);
        });

        Outcome::Pending(handle)
    }
}

// Logs and records the terminal state of a request.
fn finish(entry: &CacheEntry, result: Result<Fetched, FetchError>) {
    let state = match result {
        Ok(value) => {
            debug!(url = %entry.input(), "request resolved");
            EntryState::Resolved(value)
        }
        Err(error) => {
            warn!(url = %entry.input(), error = %error, "request failed");
            EntryState::Errored(Arc::new(error))
        }
    };
    entry.settle(state);
}

impl std::fmt::Debug for FetchMemoizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchMemoizer")
            .field("entries", &self.store.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
