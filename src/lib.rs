//! # fetchmemo
//!
//! Request memoization for synchronous call sites.
//!
//! A [`FetchMemoizer`] binds one request [`Dispatcher`](client::Dispatcher)
//! to one private cache. Calling it with a request either returns the
//! memoized value, reports that the request is still in flight (with a
//! handle to await before calling again), or hands back the error the
//! request failed with. Repeated calls with structurally equal parameters
//! share a single network operation and a single cached outcome.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fetchmemo::{FetchMemoizer, FetchOptions, Outcome};
//!
//! #[tokio::main]
//! async fn main() {
//!     let memo = FetchMemoizer::default_instance();
//!     loop {
//!         match memo.call("http://127.0.0.1:8080/config", None, FetchOptions::from(30_000_u64)) {
//!             Outcome::Value(value) => {
//!                 println!("{:?}", value.data());
//!                 break;
//!             }
//!             Outcome::Pending(handle) => handle.await,
//!             Outcome::Failed(error) => {
//!                 eprintln!("request failed: {error}");
//!                 break;
//!             }
//!         }
//!     }
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod memo;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use client::{DispatchError, Dispatcher, TcpDispatcher};
pub use config::{ClientConfig, MemoizerConfig};
pub use decode::{DecodePolicy, Fetched, Payload};
pub use error::FetchError;
pub use http::{Body, Headers, Method, Request, RequestInfo, RequestInit, Response, StatusCode};
pub use memo::{FetchMemoizer, FetchOptions, Outcome};
