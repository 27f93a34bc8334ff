//! # impersonet
//!
//! An HTTP client that looks like a specific browser on the wire.
//!
//! `impersonet` reproduces a browser's TLS ClientHello (cipher, extension
//! and group order, GREASE, ALPN, ALPS, certificate compression) and its
//! HTTP framing (HTTP/2 SETTINGS order, WINDOW_UPDATE, PRIORITY frames,
//! pseudo-header order, header order and casing), so JA3/JA4 and Akamai
//! HTTP/2 fingerprints classify the traffic as that browser.
//!
//! ## Features
//!
//! - **Profile registry**: Chrome, Edge, Firefox, Safari, Safari iOS and
//!   OkHttp versions, each on any of five operating systems
//! - **BoringSSL**: ClientHello configured from the profile
//! - **HTTP/1.1 & HTTP/2**: native framing, HPACK and multiplexing
//! - **Session pooling**: 6 sessions per host, 256 total, idle reaping
//! - **Proxy support**: HTTP, HTTPS and SOCKS5 proxies
//! - **Lazy responses**: memoized `bytes()`, `text()` and `json()`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use impersonet::{Client, ImpersonateOs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), impersonet::NetError> {
//!     let client = Client::builder()
//!         .impersonate("chrome_120")
//!         .impersonate_os(ImpersonateOs::Windows)
//!         .build()?;
//!     let response = client.get("https://tls.peet.ws/api/all").send().await?;
//!     println!("Status: {}", response.status_code());
//!     println!("{}", response.text().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`emulation`] - Browser profiles and the registry
//! - [`http`] - HTTP/1.1 and HTTP/2 framing, headers, bodies, redirects
//! - [`socket`] - Sessions, pooling, proxies and TLS
//! - [`client`] - The request API
//! - [`config`] - Plain-data client configuration

pub mod base;
pub mod client;
pub mod config;
pub mod emulation;
pub mod http;
pub mod socket;

pub use crate::base::neterror::{ErrorKind, NetError};
pub use crate::client::{Client, ClientBuilder, HttpMethod, RequestBuilder, RequestOptions};
pub use crate::config::ClientConfig;
pub use crate::emulation::{list_profiles, lookup, lookup_with_os, Emulation, ImpersonateOs};
pub use crate::http::multipart::{Form, Part};
pub use crate::http::{DecodeState, OrderedHeaderMap, RedirectPolicy, Response};
pub use crate::socket::tls::{Ja3, Ja4};
