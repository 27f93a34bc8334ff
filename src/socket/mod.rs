//! Socket and connection management.
//!
//! Provides session pooling and socket handling mirroring Chromium's `net/socket/`:
//! - [`pool`]: Session pooling (6 per host, 256 total)
//! - [`connectjob`]: DNS → TCP → proxy → TLS → HTTP/2 preface
//! - [`session`]: Session identity and lifecycle state
//! - [`proxy`]: HTTP/HTTPS CONNECT and SOCKS5 tunnels
//! - [`tls`]: Fingerprinted TLS with BoringSSL

pub mod client;
pub mod connectjob;
pub mod pool;
pub mod proxy;
pub mod session;
pub mod stream;
pub mod tls;

pub use self::pool::{Checkout, PoolKey, SessionPool};
pub use self::session::{Session, SessionState};
