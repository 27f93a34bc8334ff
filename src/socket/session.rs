//! Connection session lifecycle.
//!
//! ```text
//! Idle -> Connecting -> Handshaking -> Active -> Idle | Closed
//! ```
//!
//! Cleartext sessions go straight from `Connecting` to `Active`. Any state
//! may move to `Closed`; nothing leaves it.
//!
//! HTTP/1.1 sessions keep their `Session` for life inside `ClientSocket`.
//! An HTTP/2 session's state ends at `Active`: the `H2Connection` takes over
//! its id, and its closed and going-away flags stand in for `Idle`/`Closed`.

use crate::base::neterror::NetError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Handshaking,
    Active,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Handshaking)
                | (Connecting, Active)
                | (Handshaking, Active)
                | (Active, Idle)
                | (Idle, Active)
                | (Idle | Connecting | Handshaking | Active, Closed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid session transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// A forbidden transition during connect fails the attempt.
impl From<InvalidTransition> for NetError {
    fn from(err: InvalidTransition) -> Self {
        tracing::error!(from = ?err.from, to = ?err.to, "invalid session transition");
        NetError::ConnectionFailed
    }
}

/// Identity and lifecycle state of one transport.
#[derive(Debug)]
pub struct Session {
    id: u64,
    state: SessionState,
    connected: bool,
    created_at: Instant,
    idle_since: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session with the next process-wide id.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            state: SessionState::Idle,
            connected: false,
            created_at: now,
            idle_since: now,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// How long the session has sat idle. Zero unless `Idle` after use.
    pub fn idle_for(&self) -> Duration {
        if self.state == SessionState::Idle && self.connected {
            self.idle_since.elapsed()
        } else {
            Duration::ZERO
        }
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        let valid = self.state.can_transition_to(next)
            // A used session never reconnects; a new one is opened instead.
            && !(self.connected && next == SessionState::Connecting)
            // An unconnected session cannot be handed out.
            && !(!self.connected && self.state == SessionState::Idle && next == SessionState::Active);
        if !valid {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(session_id = self.id, from = ?self.state, to = ?next, "session state");
        match next {
            SessionState::Active => self.connected = true,
            SessionState::Idle => self.idle_since = Instant::now(),
            _ => {}
        }
        self.state = next;
        Ok(())
    }

    /// Move to `Closed`. Idempotent.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            tracing::debug!(session_id = self.id, from = ?self.state, "session closed");
            self.state = SessionState::Closed;
        }
    }
}
