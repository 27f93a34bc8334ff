//! HTTP response with a lazily materialized body.

use crate::base::neterror::NetError;
use crate::http::decoder;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::ResponseBody;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::{Mutex, OnceCell};
use url::Url;

/// Status line and headers, as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub version: http::Version,
    pub headers: OrderedHeaderMap,
}

/// How far the body has been materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DecodeState {
    Unread,
    BytesMaterialized,
    TextMaterialized,
    JsonMaterialized,
}

/// HTTP response.
///
/// Headers are available immediately. The body is pulled from the
/// connection on the first call to [`bytes`](Self::bytes),
/// [`text`](Self::text) or [`json`](Self::json); every later call returns
/// the cached result, including a cached error.
pub struct Response {
    head: ResponseHead,
    url: Url,
    session_id: u64,
    body: Mutex<Option<ResponseBody>>,
    bytes: OnceCell<Result<Bytes, NetError>>,
    text: OnceCell<String>,
    #[cfg(feature = "json")]
    json: OnceCell<serde_json::Value>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.head.status)
            .field("version", &self.head.version)
            .field("url", &self.url.as_str())
            .field("session_id", &self.session_id)
            .field("decode_state", &self.decode_state())
            .finish()
    }
}

impl Response {
    pub fn new(head: ResponseHead, url: Url, session_id: u64, body: ResponseBody) -> Self {
        Self {
            head,
            url,
            session_id,
            body: Mutex::new(Some(body)),
            bytes: OnceCell::new(),
            text: OnceCell::new(),
            #[cfg(feature = "json")]
            json: OnceCell::new(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.head.status
    }

    /// Status as an `http::StatusCode`, `None` for codes outside 100..=999.
    pub fn status(&self) -> Option<http::StatusCode> {
        http::StatusCode::from_u16(self.head.status).ok()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.head.status)
    }

    pub fn version(&self) -> http::Version {
        self.head.version
    }

    /// Final URL, after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers in received order and casing, duplicates kept.
    pub fn headers(&self) -> &OrderedHeaderMap {
        &self.head.headers
    }

    /// First value of `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// Cookies set by this response, by name. Later values win.
    pub fn cookies(&self) -> HashMap<String, String> {
        self.head
            .headers
            .get_all("set-cookie")
            .filter_map(|raw| cookie::Cookie::parse(raw).ok())
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect()
    }

    /// Charset the body text is decoded with.
    pub fn encoding(&self) -> &'static str {
        decoder::charset(self.header("content-type"))
            .unwrap_or(encoding_rs::UTF_8)
            .name()
    }

    /// Id of the connection session that carried this response.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn decode_state(&self) -> DecodeState {
        #[cfg(feature = "json")]
        if self.json.initialized() {
            return DecodeState::JsonMaterialized;
        }
        if self.text.initialized() {
            DecodeState::TextMaterialized
        } else if self.bytes.initialized() {
            DecodeState::BytesMaterialized
        } else {
            DecodeState::Unread
        }
    }

    /// Take the body for streaming. `None` once any of the buffered
    /// accessors has run.
    pub async fn take_body(&self) -> Option<ResponseBody> {
        if self.bytes.initialized() {
            return None;
        }
        self.body.lock().await.take()
    }

    /// Body bytes with Content-Encoding removed.
    pub async fn bytes(&self) -> Result<Bytes, NetError> {
        self.bytes
            .get_or_init(|| async {
                let body = self.body.lock().await.take().ok_or(NetError::ConnectionClosed)?;
                let raw = body.bytes().await?;
                tracing::trace!(
                    session_id = self.session_id,
                    len = raw.len(),
                    "response body read"
                );
                decoder::decompress(self.header("content-encoding"), raw).await
            })
            .await
            .clone()
    }

    /// Body decoded with the Content-Type charset, UTF-8 by default.
    pub async fn text(&self) -> Result<&str, NetError> {
        let text = self
            .text
            .get_or_try_init(|| async {
                let bytes = self.bytes().await?;
                Ok::<_, NetError>(decoder::decode_text(&bytes, self.header("content-type")))
            })
            .await?;
        Ok(text.as_str())
    }

    /// Body parsed as JSON.
    #[cfg(feature = "json")]
    pub async fn json(&self) -> Result<&serde_json::Value, NetError> {
        self.json
            .get_or_try_init(|| async {
                let bytes = self.bytes().await?;
                serde_json::from_slice(&bytes).map_err(|e| NetError::JsonDecodeFailed(e.to_string()))
            })
            .await
    }

    /// Body deserialized into `T`. Reuses the cached bytes.
    #[cfg(feature = "json")]
    pub async fn json_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| NetError::JsonDecodeFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn head(pairs: &[(&str, &str)]) -> ResponseHead {
        let mut headers = OrderedHeaderMap::new();
        for (n, v) in pairs {
            headers.append(n, v).unwrap();
        }
        ResponseHead {
            status: 200,
            version: http::Version::HTTP_11,
            headers,
        }
    }

    fn counting_body(chunks: Vec<&'static [u8]>, polls: Arc<AtomicUsize>) -> ResponseBody {
        ResponseBody::from_stream(stream::iter(chunks).map(move |chunk| {
            polls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(chunk))
        }))
    }

    fn url() -> Url {
        Url::parse("https://example.com/data").unwrap()
    }

    #[cfg(feature = "json")]
    #[tokio::test]
    async fn test_body_read_once_and_memoized() {
        let polls = Arc::new(AtomicUsize::new(0));
        let body = counting_body(vec![&b"{\"a\":"[..], &b" 1}"[..]], polls.clone());
        let resp = Response::new(head(&[("Content-Type", "application/json")]), url(), 7, body);

        assert_eq!(resp.decode_state(), DecodeState::Unread);
        assert_eq!(resp.bytes().await.unwrap(), "{\"a\": 1}");
        assert_eq!(resp.decode_state(), DecodeState::BytesMaterialized);
        assert_eq!(resp.text().await.unwrap(), "{\"a\": 1}");
        assert_eq!(resp.decode_state(), DecodeState::TextMaterialized);
        assert_eq!(resp.json().await.unwrap()["a"], 1);
        assert_eq!(resp.decode_state(), DecodeState::JsonMaterialized);
        assert_eq!(resp.bytes().await.unwrap(), "{\"a\": 1}");
        assert_eq!(resp.text().await.unwrap(), "{\"a\": 1}");

        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert!(resp.take_body().await.is_none());
        assert_eq!(resp.session_id(), 7);
    }

    #[tokio::test]
    async fn test_concurrent_readers_share_one_read() {
        let polls = Arc::new(AtomicUsize::new(0));
        let resp = Response::new(head(&[]), url(), 1, counting_body(vec![&b"abc"[..]], polls.clone()));
        let (a, b) = tokio::join!(resp.bytes(), resp.text());
        assert_eq!(a.unwrap(), "abc");
        assert_eq!(b.unwrap(), "abc");
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[cfg(feature = "json")]
    #[tokio::test]
    async fn test_json_failure_is_decode_error() {
        let resp = Response::new(head(&[]), url(), 1, ResponseBody::from_bytes("<html>"));
        let err = resp.json().await.unwrap_err();
        assert_eq!(err.kind(), crate::base::neterror::ErrorKind::Decode);
        assert_eq!(resp.text().await.unwrap(), "<html>");
    }

    #[tokio::test]
    async fn test_body_error_is_cached() {
        let body = ResponseBody::from_stream(stream::iter(vec![Err(NetError::ConnectionReset)]));
        let resp = Response::new(head(&[]), url(), 1, body);
        assert_eq!(resp.bytes().await.unwrap_err(), NetError::ConnectionReset);
        assert_eq!(resp.text().await.unwrap_err(), NetError::ConnectionReset);
    }

    #[test]
    fn test_header_accessors() {
        let resp = Response::new(
            head(&[
                ("Set-Cookie", "sid=abc; Path=/; HttpOnly"),
                ("Content-Type", "text/html; charset=iso-8859-1"),
                ("set-cookie", "theme=dark"),
                ("Content-Length", "12"),
            ]),
            url(),
            3,
            ResponseBody::empty(),
        );
        let cookies = resp.cookies();
        assert_eq!(cookies["sid"], "abc");
        assert_eq!(cookies["theme"], "dark");
        assert_eq!(resp.header("content-type"), Some("text/html; charset=iso-8859-1"));
        assert_eq!(resp.encoding(), "windows-1252");
        assert_eq!(resp.content_length(), Some(12));
        assert_eq!(resp.status(), Some(http::StatusCode::OK));
        assert!(resp.is_success());
        assert_eq!(resp.url().path(), "/data");
    }

    #[tokio::test]
    async fn test_text_uses_charset() {
        let resp = Response::new(
            head(&[("Content-Type", "text/plain; charset=latin1")]),
            url(),
            1,
            ResponseBody::from_bytes(&b"caf\xe9"[..]),
        );
        assert_eq!(resp.text().await.unwrap(), "café");
    }
}
