use crate::base::neterror::NetError;
use crate::emulation::Emulation;
use crate::http::h2::H2Connection;
use crate::socket::client::ClientSocket;
use crate::socket::proxy::{self, ProxySettings, ProxyType};
use crate::socket::session::{Session, SessionState};
use crate::socket::stream::BoxedSocket;
use crate::socket::tls::{connector::negotiated_protocol, NegotiatedProtocol, TlsConnector};
use tokio::net::TcpStream;
use url::Url;

/// A freshly established session, ready for its first request.
#[derive(Debug)]
pub enum Connected {
    Http1(ClientSocket),
    Http2(H2Connection),
}

impl Connected {
    pub fn session_id(&self) -> u64 {
        match self {
            Connected::Http1(socket) => socket.id(),
            Connected::Http2(conn) => conn.id(),
        }
    }
}

/// Manages the connection process: DNS -> TCP -> proxy tunnel -> TLS ->
/// HTTP/2 preface. Roughly equivalent to net::ConnectJob.
pub struct ConnectJob<'a> {
    /// Origin being connected to.
    pub url: &'a Url,
    pub emulation: &'a Emulation,
    /// Connector for the origin's TLS session.
    pub tls: &'a TlsConnector,
    pub proxy: Option<&'a ProxySettings>,
    /// Connector for an `https://` proxy hop.
    pub proxy_tls: Option<&'a TlsConnector>,
    /// Refuse HTTP/1.1; cleartext URLs use HTTP/2 with prior knowledge.
    pub http2_only: bool,
}

fn url_host(url: &Url) -> Result<&str, NetError> {
    url.host_str().ok_or(NetError::InvalidUrl)
}

/// Host without the brackets `Url` puts around IPv6 literals.
fn bare_host(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

async fn tcp_connect(host: &str, port: u16) -> Result<TcpStream, NetError> {
    let addrs = tokio::net::lookup_host((bare_host(host), port)).await.map_err(|e| {
        tracing::debug!(host, error = %e, "DNS resolution failed");
        NetError::NameNotResolved
    })?;

    let mut last_error = NetError::NameNotResolved;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                tracing::debug!(%addr, "TCP connected");
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "TCP connect failed");
                last_error = NetError::from_connect_io(&e);
            }
        }
    }
    Err(last_error)
}

impl ConnectJob<'_> {
    pub async fn connect(&self) -> Result<Connected, NetError> {
        let mut session = Session::new();
        session.transition(SessionState::Connecting)?;

        let host = url_host(self.url)?;
        let port = self.url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        let socket = self.open_transport(host, port).await?;

        let https = self.url.scheme() == "https";
        if !https {
            session.transition(SessionState::Active)?;
            if self.http2_only {
                return self.start_http2(socket, session).await;
            }
            return Ok(Connected::Http1(ClientSocket::new(socket, session)));
        }

        session.transition(SessionState::Handshaking)?;
        let tls = self.tls.negotiate(socket, bare_host(host)).await?;
        let protocol = negotiated_protocol(&tls);
        let socket = BoxedSocket::new(tls);
        session.transition(SessionState::Active)?;

        match protocol {
            NegotiatedProtocol::Http2 => self.start_http2(socket, session).await,
            NegotiatedProtocol::Http1 if self.http2_only => {
                session.close();
                Err(NetError::Http11Required)
            }
            NegotiatedProtocol::Http1 => Ok(Connected::Http1(ClientSocket::new(socket, session))),
        }
    }

    /// The session hands its id to the connection and ends here; from now
    /// on the `H2Connection` tracks liveness.
    async fn start_http2(&self, socket: BoxedSocket, mut session: Session) -> Result<Connected, NetError> {
        match H2Connection::handshake(socket, self.emulation.http2_options(), session.id()).await {
            Ok(conn) => Ok(Connected::Http2(conn)),
            Err(e) => {
                session.close();
                Err(e)
            }
        }
    }

    /// TCP to the first hop, then any proxy handshake. The result speaks
    /// directly to the origin.
    async fn open_transport(&self, host: &str, port: u16) -> Result<BoxedSocket, NetError> {
        let Some(proxy) = self.proxy else {
            return Ok(BoxedSocket::new(tcp_connect(host, port).await?));
        };

        let (proxy_host, proxy_port) = proxy.host_port().ok_or(NetError::InvalidUrl)?;
        let stream = tcp_connect(proxy_host, proxy_port).await.map_err(|e| match e.kind() {
            crate::base::neterror::ErrorKind::Connect => NetError::ProxyConnectionFailed,
            _ => e,
        })?;
        tracing::debug!(proxy = %proxy.url, target = %self.url, "connecting through proxy");

        let user_agent = self.emulation.user_agent();
        match proxy.proxy_type() {
            ProxyType::Http => {
                let mut stream = stream;
                proxy::http_connect(&mut stream, host, port, proxy, user_agent).await?;
                Ok(BoxedSocket::new(stream))
            }
            ProxyType::Https => {
                let connector = self.proxy_tls.unwrap_or(self.tls);
                let mut tls = connector
                    .negotiate(BoxedSocket::new(stream), bare_host(proxy_host))
                    .await?;
                proxy::http_connect(&mut tls, host, port, proxy, user_agent).await?;
                Ok(BoxedSocket::new(tls))
            }
            ProxyType::Socks5 | ProxyType::Socks5h => {
                let mut stream = stream;
                let remote_dns = proxy.proxy_type() == ProxyType::Socks5h;
                proxy::socks5_connect(
                    &mut stream,
                    bare_host(host),
                    port,
                    proxy.get_socks5_auth(),
                    remote_dns,
                )
                .await?;
                Ok(BoxedSocket::new(stream))
            }
        }
    }
}
