//! Native HTTP/2 client framing.
//!
//! - [`frame`]: frame codec
//! - [`hpack`] / [`huffman`]: header compression
//! - [`connection`]: connection driver and stream handles

pub mod connection;
pub mod frame;
pub mod hpack;
pub mod huffman;

pub use self::connection::{H2Connection, H2Request, H2Stream};
