//! Outgoing request descriptors and their HTTP/1.1 wire encoding.
//!
//! A call is identified by a [`RequestInfo`] (a bare URL or a structured
//! [`Request`]) plus optional [`RequestInit`] parameters. Both compare by
//! structural equality over a closed set of field types: strings, numbers,
//! booleans, sequences and mappings (as [`serde_json::Value`]), [`Method`],
//! [`Headers`], and [`Body`]. Binary and streaming bodies have no
//! representation here and therefore can never take part in matching.

use std::collections::BTreeMap;
use std::fmt;

use bytes::{BufMut, BytesMut};
use serde_json::Value;

use super::{Headers, Method};

/// A request body.
///
/// Note that JSON numbers compare the way `serde_json` compares them:
/// `1` and `1.0` are different bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// UTF-8 text, sent as `text/plain; charset=utf-8` unless overridden.
    Text(String),
    /// A JSON document, sent as `application/json` unless overridden.
    Json(Value),
}

impl Body {
    /// The `Content-Type` sent when the request headers do not set one.
    pub fn default_content_type(&self) -> &'static str {
        match self {
            Body::Text(_) => "text/plain; charset=utf-8",
            Body::Json(_) => "application/json",
        }
    }

    /// Serializes the body to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Body::Text(text) => text.as_bytes().to_vec(),
            Body::Json(value) => value.to_string().into_bytes(),
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

/// A structured request target: URL plus the request's own method, headers
/// and body.
///
/// # Examples
///
/// ```
/// use fetchmemo::http::{Method, Request};
///
/// let request = Request::new("http://localhost/users")
///     .method(Method::Post)
///     .header("Accept", "application/json")
///     .body(serde_json::json!({ "name": "ada" }));
///
/// assert_eq!(request.url(), "http://localhost/users");
/// assert_eq!(request.method_ref(), &Method::Post);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    url: String,
    method: Method,
    headers: Headers,
    body: Option<Body>,
}

impl Request {
    /// Creates a `GET` request for `url` with no headers and no body.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Sets the request method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Appends a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request method.
    pub fn method_ref(&self) -> &Method {
        &self.method
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request body, if any.
    pub fn body_ref(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Serializes the request into an HTTP/1.1 message addressed at `target`
    /// (origin-form path and query) on `host`.
    ///
    /// Automatically adds:
    /// - `Host: <host>` unless already present.
    /// - `Content-Type` from the body kind if the body is set and no
    ///   `Content-Type` header was given.
    /// - `Content-Length: <n>` whenever a body is present.
    /// - `Connection: close`, since each dispatch owns its connection.
    pub fn encode(&self, target: &str, host: &str) -> BytesMut {
        let body = self.body.as_ref().map(Body::to_bytes).unwrap_or_default();
        let mut headers = self.headers.clone();

        if !headers.contains("host") {
            headers.insert("Host", host);
        }
        if let Some(kind) = &self.body {
            if !headers.contains("content-type") {
                headers.insert("Content-Type", kind.default_content_type());
            }
        }
        headers.remove("content-length");
        headers.remove("connection");
        headers.insert("Connection", "close");

        let estimated_size = 128 + headers.len() * 64 + body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Request line
        buf.put(format!("{} {} HTTP/1.1\r\n", self.method, target).as_bytes());

        for (name, value) in headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        if self.body.is_some() {
            buf.put(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }

        buf.put(&b"\r\n"[..]);
        buf.put(body.as_slice());
        buf
    }
}

/// Optional request parameters layered over a [`RequestInfo`].
///
/// `extra` carries any further named fields (mode, credentials, cache, ...)
/// as JSON values; they take part in matching but the built-in dispatcher
/// does not interpret them.
///
/// # Examples
///
/// ```
/// use fetchmemo::http::{Method, RequestInit};
///
/// let a = RequestInit::new().method(Method::Post).field("mode", "cors");
/// let b = RequestInit::new().field("mode", "cors").method(Method::Post);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub headers: Headers,
    pub body: Option<Body>,
    pub extra: BTreeMap<String, Value>,
}

impl RequestInit {
    /// Creates empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the request method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets an additional named field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// The target of a call: a bare URL or a structured [`Request`].
///
/// A URL and a `Request` for the same URL are different targets.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestInfo {
    Url(String),
    Request(Request),
}

impl RequestInfo {
    /// Returns the target URL.
    pub fn url(&self) -> &str {
        match self {
            RequestInfo::Url(url) => url,
            RequestInfo::Request(request) => request.url(),
        }
    }

    /// Produces the effective request: `init` fields override those of a
    /// structured request, and `init` headers are appended after its own.
    pub fn merge(&self, init: Option<&RequestInit>) -> Request {
        let mut request = match self {
            RequestInfo::Url(url) => Request::new(url.clone()),
            RequestInfo::Request(request) => request.clone(),
        };

        if let Some(init) = init {
            if let Some(method) = &init.method {
                request.method = method.clone();
            }
            for (name, _) in init.headers.iter() {
                request.headers.remove(name);
            }
            for (name, value) in init.headers.iter() {
                request.headers.insert(name, value);
            }
            if let Some(body) = &init.body {
                request.body = Some(body.clone());
            }
        }

        request
    }
}

impl fmt::Display for RequestInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestInfo::Url(url) => f.write_str(url),
            RequestInfo::Request(request) => write!(f, "{} {}", request.method, request.url),
        }
    }
}

impl From<&str> for RequestInfo {
    fn from(url: &str) -> Self {
        RequestInfo::Url(url.to_owned())
    }
}

impl From<String> for RequestInfo {
    fn from(url: String) -> Self {
        RequestInfo::Url(url)
    }
}

impl From<&String> for RequestInfo {
    fn from(url: &String) -> Self {
        RequestInfo::Url(url.clone())
    }
}

impl From<Request> for RequestInfo {
    fn from(request: Request) -> Self {
        RequestInfo::Request(request)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn encode_simple_get() {
        let s = to_string(Request::new("http://localhost/").encode("/", "localhost"));
        assert!(s.starts_with("GET / HTTP/1.1\r\n"));
        assert!(s.contains("Host: localhost\r\n"));
        assert!(s.contains("Connection: close\r\n"));
        assert!(!s.contains("Content-Length"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn encode_json_body_sets_type_and_length() {
        let req = Request::new("http://h/x")
            .method(Method::Post)
            .body(json!({ "a": 1 }));
        let s = to_string(req.encode("/x", "h"));
        assert!(s.starts_with("POST /x HTTP/1.1\r\n"));
        assert!(s.contains("Content-Type: application/json\r\n"));
        assert!(s.contains("Content-Length: 7\r\n"));
        assert!(s.ends_with("\r\n\r\n{\"a\":1}"));
    }

    #[test]
    fn encode_keeps_explicit_host_and_content_type() {
        let req = Request::new("http://h/x")
            .header("Host", "override")
            .header("Content-Type", "text/csv")
            .body("a,b");
        let s = to_string(req.encode("/x", "h"));
        assert!(s.contains("Host: override\r\n"));
        assert!(!s.contains("Host: h\r\n"));
        assert!(s.contains("Content-Type: text/csv\r\n"));
    }

    #[test]
    fn merge_overrides_request_fields() {
        let info = RequestInfo::from(Request::new("http://h/").header("Accept", "text/plain"));
        let init = RequestInit::new()
            .method(Method::Put)
            .header("accept", "application/json")
            .body("payload");
        let merged = info.merge(Some(&init));
        assert_eq!(merged.method_ref(), &Method::Put);
        assert_eq!(merged.headers().get("accept"), Some("application/json"));
        assert_eq!(merged.headers().len(), 1);
        assert_eq!(merged.body_ref(), Some(&Body::Text("payload".into())));
    }

    #[test]
    fn url_and_structured_request_are_distinct_targets() {
        assert_ne!(
            RequestInfo::from("http://h/"),
            RequestInfo::from(Request::new("http://h/"))
        );
    }

    #[test]
    fn init_equality_is_structural() {
        let a = RequestInit::new()
            .header("X-A", "1")
            .field("cache", json!({ "mode": "no-store", "ttl": [1, 2] }));
        let b = RequestInit::new()
            .header("x-a", "1")
            .field("cache", json!({ "ttl": [1, 2], "mode": "no-store" }));
        assert_eq!(a, b);

        let c = a.clone().field("credentials", true);
        assert_ne!(a, c);
    }

    #[test]
    fn json_number_kinds_are_distinct() {
        assert_ne!(Body::Json(json!(1)), Body::Json(json!(1.0)));
    }
}
