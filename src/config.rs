//! Memoizer and dispatcher configuration.
//!
//! Both structs deserialize with serde (missing fields take their defaults),
//! offer builder-style setters, and can be read from the environment:
//!
//! | Variable                        | Field                              |
//! |---------------------------------|------------------------------------|
//! | `FETCHMEMO_LIFESPAN_MS`         | [`MemoizerConfig::default_lifespan_ms`] |
//! | `FETCHMEMO_DECODE`              | [`MemoizerConfig::decode`] (`content-type` or `text`) |
//! | `FETCHMEMO_MAX_RESPONSE_BYTES`  | [`ClientConfig::max_response_bytes`] |
//! | `FETCHMEMO_USER_AGENT`          | [`ClientConfig::user_agent`]       |

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::decode::DecodePolicy;

/// Default ceiling on a buffered response, head and body included (8 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Settings for a [`FetchMemoizer`](crate::memo::FetchMemoizer).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MemoizerConfig {
    /// Lifespan applied when a call does not name one. `0` means entries are
    /// never evicted.
    pub default_lifespan_ms: u64,
    /// How response bodies are decoded.
    pub decode: DecodePolicy,
}

impl Default for MemoizerConfig {
    fn default() -> Self {
        Self {
            default_lifespan_ms: 0,
            decode: DecodePolicy::ContentType,
        }
    }
}

impl MemoizerConfig {
    /// Reads overrides from `FETCHMEMO_LIFESPAN_MS` and `FETCHMEMO_DECODE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_parse("FETCHMEMO_LIFESPAN_MS") {
            config.default_lifespan_ms = ms;
        }
        if let Some(policy) = env_parse("FETCHMEMO_DECODE") {
            config.decode = policy;
        }
        config
    }

    /// Sets the default lifespan.
    #[must_use]
    pub fn default_lifespan(mut self, lifespan: Duration) -> Self {
        self.default_lifespan_ms = u64::try_from(lifespan.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the decode policy.
    #[must_use]
    pub fn decode(mut self, policy: DecodePolicy) -> Self {
        self.decode = policy;
        self
    }

    /// The default lifespan, or `None` when entries should never be evicted.
    pub fn lifespan(&self) -> Option<Duration> {
        (self.default_lifespan_ms > 0).then(|| Duration::from_millis(self.default_lifespan_ms))
    }
}

/// Settings for the built-in [`TcpDispatcher`](crate::client::TcpDispatcher).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Responses larger than this fail with a size error.
    pub max_response_bytes: usize,
    /// Sent as `User-Agent` unless the request sets one.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: concat!("fetchmemo/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl ClientConfig {
    /// Reads overrides from `FETCHMEMO_MAX_RESPONSE_BYTES` and `FETCHMEMO_USER_AGENT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(max) = env_parse("FETCHMEMO_MAX_RESPONSE_BYTES") {
            config.max_response_bytes = max;
        }
        if let Ok(agent) = std::env::var("FETCHMEMO_USER_AGENT") {
            config.user_agent = agent;
        }
        config
    }

    /// Sets the response size ceiling.
    #[must_use]
    pub fn max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// Sets the `User-Agent` header value.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }
}

// Unset variables are silent; unparsable ones are logged and ignored.
fn env_parse<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(variable = name, value = %raw, error = %e, "ignoring invalid environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memoizer_defaults_never_evict() {
        let config = MemoizerConfig::default();
        assert_eq!(config.lifespan(), None);
        assert_eq!(config.decode, DecodePolicy::ContentType);
    }

    #[test]
    fn memoizer_deserializes_with_defaults() {
        let config: MemoizerConfig =
            serde_json::from_str(r#"{ "decode": "text" }"#).unwrap();
        assert_eq!(config.decode, DecodePolicy::TextOnly);
        assert_eq!(config.default_lifespan_ms, 0);

        let config: MemoizerConfig =
            serde_json::from_str(r#"{ "default_lifespan_ms": 250 }"#).unwrap();
        assert_eq!(config.lifespan(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn memoizer_builder() {
        let config = MemoizerConfig::default()
            .default_lifespan(Duration::from_secs(2))
            .decode(DecodePolicy::TextOnly);
        assert_eq!(config.default_lifespan_ms, 2000);
        assert_eq!(config.decode, DecodePolicy::TextOnly);
    }

    #[test]
    fn client_deserializes_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "max_response_bytes": 1024 }"#).unwrap();
        assert_eq!(config.max_response_bytes, 1024);
        assert!(config.user_agent.starts_with("fetchmemo/"));
    }
}
