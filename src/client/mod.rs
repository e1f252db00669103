//! Request dispatchers — the transport that performs the actual network call.
//!
//! The memoizer never talks to the network itself. It hands the caller's
//! [`RequestInfo`] and [`RequestInit`] unmodified to a [`Dispatcher`] and
//! caches whatever comes back.
//!
//! ## Core types
//!
//! - [`Dispatcher`] — trait implemented by all transports, and automatically
//!   by any matching async closure.
//! - [`TcpDispatcher`] — built-in plain HTTP/1.1 transport over Tokio TCP.
//! - [`DispatchError`] — transport-level failures.

use std::pin::Pin;

use thiserror::Error;

use crate::http::{RequestInfo, RequestInit, Response, response::ResponseError};

mod tcp;

pub use tcp::TcpDispatcher;

/// Errors produced while performing a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid request URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme {0:?} — only http is supported")]
    UnsupportedScheme(String),

    #[error("URL {0:?} has no host")]
    MissingHost(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response: {0}")]
    Response(#[from] ResponseError),

    /// A failure reported by a custom transport.
    #[error("{0}")]
    Other(String),
}

/// A boxed, sendable future resolving to a response or a transport failure.
pub type DispatchFuture = Pin<Box<dyn Future<Output = Result<Response, DispatchError>> + Send>>;

/// Performs network requests on behalf of a memoizer.
///
/// Any `Fn(RequestInfo, Option<RequestInit>) -> impl Future<Output =
/// Result<Response, DispatchError>> + Send` that is also `Send + Sync +
/// 'static` implements this trait automatically via the blanket impl below.
///
/// # Examples
///
/// ```rust
/// use fetchmemo::client::{DispatchError, Dispatcher};
/// use fetchmemo::http::{RequestInfo, RequestInit, Response, StatusCode};
///
/// fn assert_dispatcher(_: impl Dispatcher) {}
///
/// assert_dispatcher(|input: RequestInfo, _init: Option<RequestInit>| async move {
///     Ok::<_, DispatchError>(Response::new(StatusCode::OK).body(input.url().to_owned()))
/// });
/// ```
pub trait Dispatcher: Send + Sync + 'static {
    /// Starts the request. Called exactly once per cache miss.
    fn dispatch(&self, input: RequestInfo, init: Option<RequestInit>) -> DispatchFuture;
}

impl<T, F> Dispatcher for T
where
    T: Fn(RequestInfo, Option<RequestInit>) -> F + Send + Sync + 'static,
    F: Future<Output = Result<Response, DispatchError>> + Send + 'static,
{
    fn dispatch(&self, input: RequestInfo, init: Option<RequestInit>) -> DispatchFuture {
        Box::pin((self)(input, init))
    }
}
