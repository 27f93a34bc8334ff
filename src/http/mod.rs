//! HTTP framing, headers and bodies.
//!
//! - [`h1`]: HTTP/1.1 request writer and response parser
//! - [`h2`]: native HTTP/2 framing, HPACK and connection driver
//! - [`h2fingerprint`]: the SETTINGS / priority / pseudo-header layout
//! - [`orderedheaders`]: ordered, casing-preserving header list and merge rule
//! - [`transaction`]: one request/response exchange over a session
//! - [`redirect`]: redirect policy

pub mod decoder;
pub mod h1;
pub mod h2;
pub mod h2fingerprint;
pub mod multipart;
pub mod orderedheaders;
pub mod redirect;
pub mod requestbody;
pub mod response;
pub mod responsebody;
pub mod transaction;

// Re-exports for convenience
pub use h2fingerprint::H2Fingerprint;
pub use orderedheaders::OrderedHeaderMap;
pub use redirect::RedirectPolicy;
pub use requestbody::RequestBody;
pub use response::{DecodeState, Response, ResponseHead};
pub use responsebody::ResponseBody;
