//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): network error codes in the style of
//!   Chromium's `net_error_list.h`, plus crate-specific codes
//! - [`ErrorKind`](neterror::ErrorKind): the coarse classification callers
//!   branch on

pub mod neterror;

#[cfg(test)]
mod tests;
