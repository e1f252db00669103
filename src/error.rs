//! The failure captured on an errored cache entry.

use thiserror::Error;

use crate::client::DispatchError;
use crate::decode::DecodeError;

/// Why a memoized request failed.
///
/// Transport and decode failures settle an entry the same way; the variant
/// is kept only so consumers can report the cause. A captured error is
/// shared (as `Arc<FetchError>`) with every caller that matches the entry
/// until the entry is evicted.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    /// The dispatcher, or the request future it returned, panicked.
    #[error("request panicked: {message}")]
    Panicked { message: String },

    /// The request task was cancelled before it produced a response,
    /// typically because its runtime shut down.
    #[error("request task was cancelled")]
    Cancelled,

    /// `call` missed outside a Tokio runtime, so nothing could be dispatched.
    #[error("no Tokio runtime is available to run the request")]
    NoRuntime,
}

impl FetchError {
    /// Builds a [`FetchError::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        FetchError::Panicked { message }
    }

    /// Maps a failed request task to the error its entry settles with.
    pub(crate) fn from_join(error: tokio::task::JoinError) -> Self {
        match error.try_into_panic() {
            Ok(payload) => Self::from_panic(&*payload),
            Err(_) => FetchError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payload_message_is_kept() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("transport bug");
        assert!(matches!(
            FetchError::from_panic(&*payload),
            FetchError::Panicked { message } if message == "transport bug"
        ));

        let payload: Box<dyn std::any::Any + Send> = Box::new(format!("code {}", 7));
        assert_eq!(
            FetchError::from_panic(&*payload).to_string(),
            "request panicked: code 7"
        );

        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(
            FetchError::from_panic(&*payload).to_string(),
            "request panicked: non-string panic payload"
        );
    }

    fn explode() {
        panic!("inside task");
    }

    #[tokio::test]
    async fn panicked_task_maps_to_panicked() {
        let job = tokio::spawn(async { explode() });
        let error = FetchError::from_join(job.await.unwrap_err());
        assert!(matches!(error, FetchError::Panicked { message } if message == "inside task"));
    }

    #[tokio::test]
    async fn aborted_task_maps_to_cancelled() {
        let job = tokio::spawn(std::future::pending::<()>());
        job.abort();
        let error = FetchError::from_join(job.await.unwrap_err());
        assert!(matches!(error, FetchError::Cancelled));
    }
}
