//! One request/response exchange over a pooled session.
//!
//! Mirrors Chromium's `HttpNetworkTransaction`: obtain a session, send the
//! request in the profile's shape, read the response head and hand back a
//! lazy body that returns the session to the pool when it ends.

use crate::base::neterror::NetError;
use crate::emulation::Emulation;
use crate::http::h1::{self, BodyKind, BodyReader};
use crate::http::h2::{H2Connection, H2Request, H2Stream};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::response::{Response, ResponseHead};
use crate::http::responsebody::ResponseBody;
use crate::socket::connectjob::{ConnectJob, Connected};
use crate::socket::pool::{Checkout, PoolKey, PooledSocket, SessionPool};
use crate::socket::proxy::ProxySettings;
use crate::socket::tls::TlsConnector;
use bytes::{Bytes, BytesMut};
use futures::stream;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use url::Url;

/// A request ready for the wire. `headers` are the caller's headers; the
/// profile defaults are merged in per protocol.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: http::Method,
    pub url: Url,
    pub headers: OrderedHeaderMap,
    pub body: Bytes,
}

/// Everything a transaction needs from its client.
#[derive(Debug, Clone, Copy)]
pub struct TransactionContext<'a> {
    pub pool: &'a SessionPool,
    pub emulation: &'a Emulation,
    pub tls: &'a TlsConnector,
    pub proxy: Option<&'a ProxySettings>,
    pub proxy_tls: Option<&'a TlsConnector>,
    pub http2_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InitConnection,
    SendRequest,
    ReadHeaders,
    Done,
}

/// Session obtained for one attempt.
enum Stream {
    Http1(PooledSocket),
    Http2(H2Connection),
}

pub struct HttpNetworkTransaction<'a> {
    ctx: TransactionContext<'a>,
    request: &'a PreparedRequest,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    state: State,
}

/// `Host` header value: the host plus any non-default port.
pub fn host_header(url: &Url) -> Result<String, NetError> {
    let host = url.host_str().ok_or(NetError::InvalidUrl)?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Origin-form request target.
fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Whether the method carries a body by convention, so an empty one still
/// gets `Content-Length: 0`.
fn expects_body(method: &http::Method) -> bool {
    matches!(*method, http::Method::POST | http::Method::PUT | http::Method::PATCH)
}

/// Build the HTTP/1.1 header block: `Host` first, the merged profile and
/// caller headers, then `Content-Length`. Caller-supplied values of either
/// keep their merged position.
pub fn h1_headers(emulation: &Emulation, request: &PreparedRequest) -> Result<OrderedHeaderMap, NetError> {
    let merged = OrderedHeaderMap::merge_profile(emulation.headers(), &request.headers, true);
    let mut wire = OrderedHeaderMap::with_capacity(merged.len() + 2);
    if !merged.contains("host") {
        wire.push_raw("Host".to_string(), host_header(&request.url)?);
    }
    for (name, value) in merged.iter() {
        wire.push_raw(name.to_string(), value.to_string());
    }
    if !merged.contains("content-length") && (!request.body.is_empty() || expects_body(&request.method)) {
        wire.push_raw("Content-Length".to_string(), request.body.len().to_string());
    }
    Ok(wire)
}

/// Regular headers for an HTTP/2 HEADERS frame. Pseudo-headers are added by
/// the connection in the fingerprint's order.
pub fn h2_headers(emulation: &Emulation, request: &PreparedRequest) -> OrderedHeaderMap {
    let mut merged = OrderedHeaderMap::merge_profile(emulation.headers(), &request.headers, false);
    if !merged.contains("content-length") && (!request.body.is_empty() || expects_body(&request.method)) {
        merged.push_raw("content-length".to_string(), request.body.len().to_string());
    }
    merged
}

/// Errors on a reused HTTP/1.1 session that show the server never saw the
/// request: it was closed while idle.
fn is_stale_socket_error(err: &NetError) -> bool {
    matches!(
        err,
        NetError::EmptyResponse | NetError::ConnectionReset | NetError::ConnectionClosed
    )
}

impl<'a> HttpNetworkTransaction<'a> {
    pub fn new(ctx: TransactionContext<'a>, request: &'a PreparedRequest, timeout: Option<Duration>) -> Self {
        Self {
            ctx,
            request,
            timeout,
            deadline: timeout.map(|t| Instant::now() + t),
            state: State::Idle,
        }
    }

    fn next_state(&mut self, state: State) {
        tracing::trace!(from = ?self.state, to = ?state, url = %self.request.url, "transaction state");
        self.state = state;
    }

    /// Bound `fut` by the call's deadline.
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, NetError>>) -> Result<T, NetError> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), fut)
                .await
                .map_err(|_| NetError::TimedOut)?,
            None => fut.await,
        }
    }

    /// Run the exchange. Returns once the response head is in; the body is
    /// read lazily.
    pub async fn start(mut self) -> Result<Response, NetError> {
        let key = PoolKey::new(
            &self.request.url,
            &self.ctx.emulation.profile_id,
            self.ctx.proxy,
        )?;

        let mut fresh_only = false;
        loop {
            self.next_state(State::InitConnection);
            let stream = self.init_connection(&key, fresh_only).await?;
            let result = match stream {
                Stream::Http1(socket) => {
                    let reused = socket.is_reused();
                    match self.send_http1(socket).await {
                        Err(e) if reused && !fresh_only && is_stale_socket_error(&e) => {
                            tracing::debug!(error = %e, url = %self.request.url, "reused session failed, retrying on a new one");
                            fresh_only = true;
                            continue;
                        }
                        other => other,
                    }
                }
                Stream::Http2(conn) => self.send_http2(conn).await,
            };
            self.next_state(State::Done);
            return result;
        }
    }

    async fn init_connection(&self, key: &PoolKey, fresh_only: bool) -> Result<Stream, NetError> {
        let checkout = if fresh_only {
            self.ctx.pool.checkout_new(key, self.deadline).await?
        } else {
            self.ctx.pool.checkout(key, self.deadline).await?
        };
        let slot = match checkout {
            Checkout::Http1(socket) => return Ok(Stream::Http1(socket)),
            Checkout::Http2(conn) => return Ok(Stream::Http2(conn)),
            Checkout::Connect(slot) => slot,
        };

        let job = ConnectJob {
            url: &self.request.url,
            emulation: self.ctx.emulation,
            tls: self.ctx.tls,
            proxy: self.ctx.proxy,
            proxy_tls: self.ctx.proxy_tls,
            http2_only: self.ctx.http2_only,
        };
        // A failed or timed-out connect drops the slot and frees it.
        match self.bounded(job.connect()).await? {
            Connected::Http1(socket) => Ok(Stream::Http1(slot.into_http1(socket))),
            Connected::Http2(conn) => Ok(Stream::Http2(slot.into_http2(conn))),
        }
    }

    async fn send_http1(&mut self, mut socket: PooledSocket) -> Result<Response, NetError> {
        let request = self.request;
        let headers = h1_headers(self.ctx.emulation, request)?;
        let mut buf = BytesMut::new();
        h1::encode_request(
            &request.method,
            &request_target(&request.url),
            &headers,
            self.ctx.emulation.http1_options().title_case_headers,
            &request.body,
            &mut buf,
        );

        socket.mark_used();
        let session_id = socket.id();
        self.next_state(State::SendRequest);
        tracing::debug!(session_id, method = %request.method, url = %request.url, "sending HTTP/1.1 request");

        // On any error or timeout the socket is dropped here, which closes
        // the session instead of returning it to the pool.
        let head = self
            .bounded(async {
                let io = socket.io();
                io.write_all(&buf).await?;
                io.flush().await?;
                h1::read_head(io).await
            })
            .await?;
        self.next_state(State::ReadHeaders);
        tracing::debug!(session_id, status = head.status, "response headers received");

        let kind = BodyKind::for_response(&request.method, &head)?;
        let keep_alive = h1::is_keep_alive(&head, kind);
        let reader = BodyReader::new(kind);
        let body = if reader.is_done() {
            if keep_alive {
                socket.release();
            }
            ResponseBody::empty()
        } else {
            self.with_timeout(h1_body(socket, reader, keep_alive))
        };
        Ok(Response::new(head, request.url.clone(), session_id, body))
    }

    async fn send_http2(&mut self, conn: H2Connection) -> Result<Response, NetError> {
        let request = self.request;
        let h2_request = H2Request {
            method: request.method.clone(),
            scheme: request.url.scheme().to_string(),
            authority: host_header(&request.url)?,
            path: request_target(&request.url),
            headers: h2_headers(self.ctx.emulation, request),
            body: request.body.clone(),
        };
        let session_id = conn.id();
        self.next_state(State::SendRequest);
        tracing::debug!(session_id, method = %request.method, url = %request.url, "sending HTTP/2 request");

        let mut stream = conn.send_request(h2_request)?;
        let head = match self.bounded(stream.response_head()).await {
            Ok(head) => head,
            Err(e) => {
                if e == NetError::TimedOut || e.is_fatal_to_session() {
                    conn.close();
                }
                return Err(e);
            }
        };
        self.next_state(State::ReadHeaders);
        tracing::debug!(session_id, status = head.status, "response headers received");

        let body = if request.method == http::Method::HEAD {
            ResponseBody::empty()
        } else {
            h2_body(stream, conn, self.timeout)
        };
        Ok(Response::new(head, request.url.clone(), session_id, body))
    }

    fn with_timeout(&self, body: ResponseBody) -> ResponseBody {
        match self.timeout {
            Some(timeout) => body.with_read_timeout(timeout),
            None => body,
        }
    }
}

/// Stream an HTTP/1.1 body off the socket. The socket goes back to the pool
/// once the body ends cleanly on a keep-alive connection.
fn h1_body(socket: PooledSocket, reader: BodyReader, keep_alive: bool) -> ResponseBody {
    let state = Some((socket, reader));
    ResponseBody::from_stream(stream::unfold(state, move |state| async move {
        let (mut socket, mut reader) = state?;
        match reader.next_chunk(socket.io()).await {
            Ok(Some(chunk)) if reader.is_done() => {
                if keep_alive {
                    socket.release();
                }
                Some((Ok(chunk), None))
            }
            Ok(Some(chunk)) => Some((Ok(chunk), Some((socket, reader)))),
            Ok(None) => {
                if keep_alive {
                    socket.release();
                }
                None
            }
            Err(e) => {
                socket.session_mut().close();
                Some((Err(e), None))
            }
        }
    }))
}

/// Stream an HTTP/2 body. A read timeout closes the whole session.
fn h2_body(stream: H2Stream, conn: H2Connection, timeout: Option<Duration>) -> ResponseBody {
    let state = Some(stream);
    ResponseBody::from_stream(stream::unfold(state, move |state| {
        let conn = conn.clone();
        async move {
            let mut stream = state?;
            let next = match timeout {
                Some(timeout) => match tokio::time::timeout(timeout, stream.data()).await {
                    Ok(next) => next,
                    Err(_) => {
                        conn.close();
                        return Some((Err(NetError::TimedOut), None));
                    }
                },
                None => stream.data().await,
            };
            match next {
                Some(Ok(chunk)) => Some((Ok(chunk), Some(stream))),
                Some(Err(e)) => Some((Err(e), None)),
                None => None,
            }
        }
    }))
}
