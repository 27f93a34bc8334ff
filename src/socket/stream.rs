//! Type-erased transports.
//!
//! A session runs over plain TCP, a CONNECT or SOCKS tunnel, or TLS over
//! either. [`BoxedSocket`] hides which, so the TLS layer and the HTTP
//! framers take one concrete type.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, ReadBuf};

/// Any byte stream a session can run over.
pub trait StreamSocket: AsyncRead + AsyncWrite + Unpin + Send + Sync + fmt::Debug + 'static {}

impl<T> StreamSocket for T where T: AsyncRead + AsyncWrite + Unpin + Send + Sync + fmt::Debug + 'static {}

/// Type-erased socket. Lets TLS wrap whatever the connect job produced.
pub struct BoxedSocket {
    inner: Pin<Box<dyn StreamSocket>>,
}

impl BoxedSocket {
    pub fn new<S: StreamSocket>(socket: S) -> Self {
        Self {
            inner: Box::pin(socket),
        }
    }
}

impl fmt::Debug for BoxedSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxedSocket").field(&self.inner).finish()
    }
}

impl AsyncRead for BoxedSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for BoxedSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_shutdown(cx)
    }
}

/// Result of probing an idle connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Nothing to read, peer still there.
    Idle,
    /// Peer closed or reset.
    Closed,
    /// Bytes arrived while nothing was in flight.
    UnexpectedData,
}

/// Probe a buffered reader without blocking.
///
/// Polls once with a no-op waker: `Pending` means the connection is open
/// and quiet. Mirrors Chromium's `IsConnectedAndIdle()`.
pub fn probe<R: AsyncBufRead + Unpin>(reader: &mut R) -> Liveness {
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    match Pin::new(reader).poll_fill_buf(&mut cx) {
        Poll::Pending => Liveness::Idle,
        Poll::Ready(Ok([])) => Liveness::Closed,
        Poll::Ready(Ok(_)) => Liveness::UnexpectedData,
        Poll::Ready(Err(_)) => Liveness::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_probe_states() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(BoxedSocket::new(client));
        assert_eq!(probe(&mut reader), Liveness::Idle);

        server.write_all(b"x").await.unwrap();
        assert_eq!(probe(&mut reader), Liveness::UnexpectedData);

        let (client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(BoxedSocket::new(client));
        drop(server);
        assert_eq!(probe(&mut reader), Liveness::Closed);
    }

    #[tokio::test]
    async fn test_boxed_socket_roundtrip() {
        use tokio::io::AsyncReadExt;
        let (client, mut server) = tokio::io::duplex(64);
        let mut socket = BoxedSocket::new(client);
        socket.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        assert!(format!("{:?}", socket).starts_with("BoxedSocket"));
    }
}
