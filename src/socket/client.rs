use crate::base::neterror::NetError;
use crate::socket::session::{Session, SessionState};
use crate::socket::stream::{probe, BoxedSocket, Liveness};
use tokio::io::BufReader;

const READ_BUFFER: usize = 16 * 1024;

/// An HTTP/1.1 connection: the buffered transport plus its session state.
///
/// Tracks usage for reuse detection, following Chromium's
/// `IdleSocket::IsUsable()`.
#[derive(Debug)]
pub struct ClientSocket {
    io: BufReader<BoxedSocket>,
    session: Session,
    was_used: bool,
}

impl ClientSocket {
    pub fn new(socket: BoxedSocket, session: Session) -> Self {
        Self {
            io: BufReader::with_capacity(READ_BUFFER, socket),
            session,
            was_used: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.session.id()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Mark the socket as having been used for a request.
    pub fn mark_used(&mut self) {
        self.was_used = true;
    }

    pub fn was_ever_used(&self) -> bool {
        self.was_used
    }

    /// Whether an idle socket can carry a new request. A socket that was
    /// never used only needs to be open; a used one must also have nothing
    /// unread.
    pub fn is_usable(&mut self) -> Result<(), NetError> {
        if self.session.is_closed() {
            return Err(NetError::ConnectionClosed);
        }
        match probe(&mut self.io) {
            Liveness::Idle => Ok(()),
            Liveness::Closed => Err(NetError::ConnectionClosed),
            Liveness::UnexpectedData if self.was_used => Err(NetError::InvalidHttpResponse),
            Liveness::UnexpectedData => Ok(()),
        }
    }

    /// Buffered transport for the request writer and response parser.
    pub fn io(&mut self) -> &mut BufReader<BoxedSocket> {
        &mut self.io
    }

    /// Back to `Idle` after a completed exchange.
    pub fn set_idle(&mut self) {
        if self.session.transition(SessionState::Idle).is_err() {
            self.session.close();
        }
    }

    /// `Idle` to `Active` on checkout.
    pub fn set_active(&mut self) -> Result<(), NetError> {
        self.session
            .transition(SessionState::Active)
            .map_err(|_| NetError::ConnectionClosed)
    }
}
