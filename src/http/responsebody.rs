//! Response body streaming.
//! Mirrors Chromium's HttpStream::ReadResponseBody.

use crate::base::neterror::NetError;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// A lazily read response body.
///
/// Wraps whatever produces the bytes: an HTTP/1.1 connection, an HTTP/2
/// stream, or an in-memory buffer. The connection behind it is released
/// when the stream ends.
pub struct ResponseBody {
    inner: BoxStream<'static, Result<Bytes, NetError>>,
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

impl ResponseBody {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, NetError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Self::empty();
        }
        Self::from_stream(stream::once(async move { Ok(bytes) }))
    }

    /// Bound the wait for each chunk. An expired wait yields `TimedOut`
    /// and drops the source, closing its connection.
    pub fn with_read_timeout(self, timeout: Duration) -> Self {
        let source = Some(self.inner);
        Self::from_stream(stream::unfold(source, move |source| async move {
            let mut inner = source?;
            match tokio::time::timeout(timeout, inner.next()).await {
                Ok(Some(item)) => Some((item, Some(inner))),
                Ok(None) => None,
                Err(_) => Some((Err(NetError::TimedOut), None)),
            }
        }))
    }

    /// Next chunk, `None` at the end of the body.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, NetError> {
        self.inner.next().await.transpose()
    }

    /// Read the entire body.
    pub async fn bytes(mut self) -> Result<Bytes, NetError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes, NetError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collects_chunks_in_order() {
        let body = ResponseBody::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"hello, ")),
            Ok(Bytes::from_static(b"world")),
        ]));
        assert_eq!(body.bytes().await.unwrap(), "hello, world");
        assert!(ResponseBody::empty().bytes().await.unwrap().is_empty());
        assert_eq!(ResponseBody::from_bytes("x").bytes().await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let body = ResponseBody::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(NetError::IncompleteChunkedEncoding),
        ]));
        assert_eq!(body.bytes().await.unwrap_err(), NetError::IncompleteChunkedEncoding);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let body = ResponseBody::from_stream(stream::pending::<Result<Bytes, NetError>>())
            .with_read_timeout(Duration::from_secs(5));
        assert_eq!(body.bytes().await.unwrap_err(), NetError::TimedOut);
    }
}
