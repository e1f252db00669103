//! HTTP/1.1 responses: a builder for dispatchers and tests, and wire parsing
//! using the [`httparse`] crate.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use super::{Headers, StatusCode};

/// Errors that can occur while parsing an HTTP/1.1 response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("response exceeds maximum allowed size of {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("malformed chunked body")]
    InvalidChunk,
}

/// A completed HTTP response: status, headers, and a fully buffered body.
///
/// # Examples
///
/// ```
/// use fetchmemo::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// assert!(response.is_json());
/// assert_eq!(response.bytes().len(), 15);
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    url: String,
}

impl Response {
    /// Maximum number of headers we accept per response.
    const MAX_HEADERS: usize = 64;

    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
            url: String::new(),
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into());
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Records the URL this response was fetched from.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw body bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Returns the URL this response was fetched from (empty if unknown).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the declared `Content-Type`, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Returns `true` if the declared content type is `application/json`.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }

    /// Returns `true` if the body uses chunked transfer coding.
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get_all("transfer-encoding")
            .any(|te| te.to_ascii_lowercase().contains("chunked"))
    }

    /// Parse a response head (status line and headers) from a byte slice.
    ///
    /// Returns the response with an empty body and the byte offset at which
    /// the body begins in `buf`.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`] — more data is needed to complete the head.
    /// - [`ResponseError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`ResponseError::MissingField`] — the status code is absent.
    pub fn parse_head(buf: &[u8]) -> Result<(Self, usize), ResponseError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        };

        let code = raw
            .code
            .ok_or(ResponseError::MissingField { field: "status" })?;

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            header_map.insert(header.name, String::from_utf8_lossy(header.value));
        }

        Ok((
            Self {
                status: StatusCode::from_u16(code),
                headers: header_map,
                body: Bytes::new(),
                url: String::new(),
            },
            body_offset,
        ))
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

/// Decodes a complete chunked body.
///
/// Returns `Ok(None)` while the terminating zero-size chunk has not yet been
/// received. Trailer fields are ignored.
pub fn decode_chunked(buf: &[u8]) -> Result<Option<Bytes>, ResponseError> {
    let mut out = BytesMut::with_capacity(buf.len());
    let mut pos = 0;

    loop {
        let (consumed, size) = match httparse::parse_chunk_size(&buf[pos..]) {
            Ok(httparse::Status::Complete(pair)) => pair,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(_) => return Err(ResponseError::InvalidChunk),
        };
        pos += consumed;

        if size == 0 {
            return Ok(Some(out.freeze()));
        }

        // A size past the end of the address space can never arrive.
        let (end, next) = usize::try_from(size)
            .ok()
            .and_then(|size| pos.checked_add(size))
            .and_then(|end| Some((end, end.checked_add(2)?)))
            .ok_or(ResponseError::InvalidChunk)?;
        if buf.len() < next {
            return Ok(None);
        }
        if &buf[end..next] != b"\r\n" {
            return Err(ResponseError::InvalidChunk);
        }

        out.extend_from_slice(&buf[pos..end]);
        pos = next;
    }
}
