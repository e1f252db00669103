//! Response decoding — turns a completed [`Response`] into the cached value.
//!
//! Two policies exist:
//!
//! - [`DecodePolicy::ContentType`] (default) parses the body as JSON when
//!   the response declares `application/json`, and as UTF-8 text otherwise.
//! - [`DecodePolicy::TextOnly`] always decodes as text, whatever the
//!   declared content type says.
//!
//! When the call asked for response info, the payload is paired with the
//! response itself so status and headers stay inspectable.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::http::Response;

/// Errors produced while decoding a successful response.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// How response bodies are decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum DecodePolicy {
    /// JSON for `application/json` responses, text for everything else.
    #[default]
    #[serde(rename = "content-type")]
    ContentType,
    /// Always text.
    #[serde(rename = "text", alias = "text-only")]
    TextOnly,
}

/// Error returned when a policy name is not recognized.
#[derive(Debug, Error)]
#[error("unknown decode policy {0:?}; expected \"content-type\" or \"text\"")]
pub struct UnknownPolicy(String);

impl FromStr for DecodePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "content-type" | "content_type" | "auto" => Ok(Self::ContentType),
            "text" | "text-only" | "text_only" => Ok(Self::TextOnly),
            _ => Err(UnknownPolicy(s.to_owned())),
        }
    }
}

impl fmt::Display for DecodePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentType => f.write_str("content-type"),
            Self::TextOnly => f.write_str("text"),
        }
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// Returns the text, if this payload was decoded as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Json(_) => None,
        }
    }

    /// Returns the JSON value, if this payload was decoded as JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }
}

/// The value held by a resolved cache entry.
#[derive(Debug, Clone)]
pub enum Fetched {
    /// The decoded body alone.
    Data(Payload),
    /// The decoded body paired with the response it came from.
    Info {
        data: Payload,
        response: Arc<Response>,
    },
}

impl Fetched {
    /// Returns the decoded body.
    pub fn data(&self) -> &Payload {
        match self {
            Fetched::Data(data) | Fetched::Info { data, .. } => data,
        }
    }

    /// Returns the response, if info was requested.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Fetched::Data(_) => None,
            Fetched::Info { response, .. } => Some(response.as_ref()),
        }
    }
}

/// Decodes responses according to a [`DecodePolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecoder {
    policy: DecodePolicy,
}

impl ResponseDecoder {
    pub fn new(policy: DecodePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DecodePolicy {
        self.policy
    }

    /// Decodes `response`, pairing the payload with it when `info` is set.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Json`] for a JSON-typed body that fails to parse (only
    /// under [`DecodePolicy::ContentType`]), [`DecodeError::Utf8`] for a
    /// text body that is not valid UTF-8.
    pub fn decode(&self, response: Response, info: bool) -> Result<Fetched, DecodeError> {
        let data = match self.policy {
            DecodePolicy::ContentType if response.is_json() => {
                Payload::Json(serde_json::from_slice(response.bytes())?)
            }
            _ => Payload::Text(std::str::from_utf8(response.bytes())?.to_owned()),
        };

        Ok(if info {
            Fetched::Info {
                data,
                response: Arc::new(response),
            }
        } else {
            Fetched::Data(data)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::StatusCode;

    fn json_response(body: &str) -> Response {
        Response::new(StatusCode::OK)
            .header("Content-Type", "application/json; charset=utf-8")
            .body(body)
    }

    #[test]
    fn content_type_policy_parses_json() {
        let fetched = ResponseDecoder::default()
            .decode(json_response(r#"{"a":[1,2]}"#), false)
            .unwrap();
        assert_eq!(fetched.data(), &Payload::Json(json!({ "a": [1, 2] })));
        assert!(fetched.response().is_none());
    }

    #[test]
    fn content_type_policy_reads_other_types_as_text() {
        let res = Response::new(StatusCode::OK)
            .header("Content-Type", "text/html")
            .body("<p>hi</p>");
        let fetched = ResponseDecoder::default().decode(res, false).unwrap();
        assert_eq!(fetched.data().as_text(), Some("<p>hi</p>"));
    }

    #[test]
    fn missing_content_type_is_text() {
        let res = Response::new(StatusCode::OK).body("{}");
        let fetched = ResponseDecoder::default().decode(res, false).unwrap();
        assert_eq!(fetched.data(), &Payload::Text("{}".into()));
    }

    #[test]
    fn text_only_policy_ignores_json_content_type() {
        let fetched = ResponseDecoder::new(DecodePolicy::TextOnly)
            .decode(json_response(r#""x""#), false)
            .unwrap();
        assert_eq!(fetched.data(), &Payload::Text(r#""x""#.into()));
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let err = ResponseDecoder::default()
            .decode(json_response("{not json"), false)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn invalid_json_is_fine_as_text() {
        let fetched = ResponseDecoder::new(DecodePolicy::TextOnly)
            .decode(json_response("{not json"), false)
            .unwrap();
        assert_eq!(fetched.data().as_text(), Some("{not json"));
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let res = Response::new(StatusCode::OK).body_bytes(vec![0xff, 0xfe]);
        let err = ResponseDecoder::default().decode(res, false).unwrap_err();
        assert!(matches!(err, DecodeError::Utf8(_)));
    }

    #[test]
    fn info_pairs_payload_with_response() {
        let res = Response::new(StatusCode::NOT_FOUND)
            .header("X-Id", "7")
            .body("missing");
        let fetched = ResponseDecoder::default().decode(res, true).unwrap();
        let response = fetched.response().unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("x-id"), Some("7"));
        assert_eq!(fetched.data().as_text(), Some("missing"));
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!("text".parse::<DecodePolicy>().unwrap(), DecodePolicy::TextOnly);
        assert_eq!(
            "Content-Type".parse::<DecodePolicy>().unwrap(),
            DecodePolicy::ContentType
        );
        assert!("xml".parse::<DecodePolicy>().is_err());
    }
}
