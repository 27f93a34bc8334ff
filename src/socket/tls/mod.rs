//! TLS fingerprinting and handshake.
//!
//! - [`options`]: the TLS half of a fingerprint descriptor
//! - [`hello`]: byte-level ClientHello model (build, encode, parse)
//! - [`fingerprint`]: JA3 / JA4 over a ClientHello
//! - [`connector`]: BoringSSL connector driven by [`TlsOptions`]

pub mod codepoints;
pub mod connector;
pub mod fingerprint;
pub mod hello;
pub mod options;

pub use self::connector::{NegotiatedProtocol, TlsConnector, VerifyPolicy};
pub use self::fingerprint::{Ja3, Ja4};
pub use self::hello::ClientHello;
pub use self::options::{AlpnProtocol, CertCompressAlg, TlsOptions, TlsOptionsBuilder, TlsVersion};
