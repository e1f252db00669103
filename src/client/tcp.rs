//! Plain HTTP/1.1 transport over Tokio TCP.
//!
//! One connection per request, closed by the server after the response
//! (`Connection: close`). Bodies are read by `Content-Length`, chunked
//! transfer coding, or until EOF. `https` is not supported.

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use super::{DispatchError, DispatchFuture, Dispatcher};
use crate::config::ClientConfig;
use crate::http::{
    RequestInfo, RequestInit, Response, StatusCode,
    response::{ResponseError, decode_chunked},
};

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The built-in network dispatcher.
///
/// # Examples
///
/// ```rust,no_run
/// use fetchmemo::client::TcpDispatcher;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = TcpDispatcher::new();
/// let response = client.send(&"http://127.0.0.1:8080/health".into(), None).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TcpDispatcher {
    config: Arc<ClientConfig>,
}

impl TcpDispatcher {
    /// Creates a dispatcher with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher with the given settings.
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Returns the dispatcher's settings.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Performs one request and buffers the complete response.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidUrl`], [`DispatchError::UnsupportedScheme`],
    ///   [`DispatchError::MissingHost`] — the target cannot be addressed.
    /// - [`DispatchError::Connect`] — the TCP connection could not be opened.
    /// - [`DispatchError::Io`] — the connection failed mid-exchange.
    /// - [`DispatchError::Response`] — the reply is malformed, truncated, or
    ///   larger than [`ClientConfig::max_response_bytes`].
    pub async fn send(
        &self,
        input: &RequestInfo,
        init: Option<&RequestInit>,
    ) -> Result<Response, DispatchError> {
        let mut request = input.merge(init);

        let url = Url::parse(request.url()).map_err(|source| DispatchError::InvalidUrl {
            url: request.url().to_owned(),
            source,
        })?;
        if url.scheme() != "http" {
            return Err(DispatchError::UnsupportedScheme(url.scheme().to_owned()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| DispatchError::MissingHost(url.to_string()))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let addr = format!("{host}:{port}");
        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        let mut target = url.path().to_owned();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        if !request.headers().contains("user-agent") {
            request = request.header("User-Agent", self.config.user_agent.as_str());
        }

        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| DispatchError::Connect {
                addr: addr.clone(),
                source,
            })?;

        debug!(
            method = %request.method_ref(),
            url = %url,
            "sending request"
        );

        stream.write_all(&request.encode(&target, &host_header)).await?;
        stream.flush().await?;

        let expects_body = request.method_ref().expects_response_body();
        let response = read_response(&mut stream, self.config.max_response_bytes, expects_body).await?;

        debug!(
            url = %url,
            status = %response.status(),
            bytes = response.bytes().len(),
            "response received"
        );

        Ok(response.with_url(url.as_str()))
    }
}

impl Dispatcher for TcpDispatcher {
    fn dispatch(&self, input: RequestInfo, init: Option<RequestInit>) -> DispatchFuture {
        let client = self.clone();
        Box::pin(async move { client.send(&input, init.as_ref()).await })
    }
}

/// Reads one complete response from `stream`.
///
/// `max_bytes` bounds the head and body together.
async fn read_response<S>(
    stream: &mut S,
    max_bytes: usize,
    expects_body: bool,
) -> Result<Response, DispatchError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    let (response, body_offset) = loop {
        let eof = fill(stream, &mut buf, 0, max_bytes).await?;
        match Response::parse_head(&buf) {
            Ok(pair) => break pair,
            Err(ResponseError::Incomplete) if !eof => continue,
            Err(e) => return Err(e.into()),
        }
    };

    // Drop the head; `buf` now holds whatever body bytes arrived with it.
    buf.advance(body_offset);

    if !expects_body || !status_allows_body(response.status()) {
        return Ok(response);
    }

    let mut eof = false;
    loop {
        if let Some(body) = complete_body(&response, &buf, eof)? {
            return Ok(response.body_bytes(body));
        }
        if eof {
            return Err(ResponseError::Incomplete.into());
        }
        eof = fill(stream, &mut buf, body_offset, max_bytes).await?;
    }
}

// Reads once into `buf`; returns `true` at EOF.
async fn fill<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    already_consumed: usize,
    max_bytes: usize,
) -> Result<bool, DispatchError>
where
    S: AsyncRead + Unpin,
{
    let bytes_read = stream.read_buf(buf).await?;
    if already_consumed + buf.len() > max_bytes {
        return Err(ResponseError::TooLarge { max_bytes }.into());
    }
    Ok(bytes_read == 0)
}

fn status_allows_body(status: StatusCode) -> bool {
    let code = status.as_u16();
    !(100..200).contains(&code) && code != 204 && code != 304
}

// Returns the body once every byte of it is buffered.
fn complete_body(
    response: &Response,
    buf: &BytesMut,
    eof: bool,
) -> Result<Option<Bytes>, ResponseError> {
    if response.is_chunked() {
        return decode_chunked(buf);
    }

    Ok(match response.content_length() {
        Some(len) if buf.len() >= len => Some(Bytes::copy_from_slice(&buf[..len])),
        Some(_) => None,
        None if eof => Some(Bytes::copy_from_slice(buf)),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read(raw: &'static [u8], max_bytes: usize, expects_body: bool) -> Result<Response, DispatchError> {
        let mut reader = raw;
        read_response(&mut reader, max_bytes, expects_body).await
    }

    #[tokio::test]
    async fn reads_content_length_body() {
        let res = read(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhelloEXTRA",
            1024,
            true,
        )
        .await
        .unwrap();
        assert_eq!(res.bytes().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn reads_until_eof_without_length() {
        let res = read(b"HTTP/1.1 200 OK\r\n\r\nall of it", 1024, true)
            .await
            .unwrap();
        assert_eq!(res.bytes().as_ref(), b"all of it");
    }

    #[tokio::test]
    async fn reads_chunked_body() {
        let res = read(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n",
            1024,
            true,
        )
        .await
        .unwrap();
        assert_eq!(res.bytes().as_ref(), b"abc");
    }

    #[tokio::test]
    async fn truncated_body_is_incomplete() {
        let err = read(b"HTTP/1.1 200 OK\r\nContent-Length: 50\r\n\r\nshort", 1024, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Response(ResponseError::Incomplete)
        ));
    }

    #[tokio::test]
    async fn oversized_response_is_rejected() {
        let err = read(b"HTTP/1.1 200 OK\r\n\r\n0123456789012345678901234567890123456789", 32, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Response(ResponseError::TooLarge { max_bytes: 32 })
        ));
    }

    #[tokio::test]
    async fn no_content_has_no_body() {
        let res = read(b"HTTP/1.1 204 No Content\r\n\r\n", 1024, true)
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.bytes().is_empty());
    }

    #[tokio::test]
    async fn head_request_skips_body() {
        let res = read(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n", 1024, false)
            .await
            .unwrap();
        assert!(res.bytes().is_empty());
    }

    #[tokio::test]
    async fn rejects_https() {
        let err = TcpDispatcher::new()
            .send(&"https://example.com/".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedScheme(s) if s == "https"));
    }

    #[tokio::test]
    async fn rejects_relative_url() {
        let err = TcpDispatcher::new()
            .send(&"/relative".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidUrl { .. }));
    }
}
