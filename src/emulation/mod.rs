//! Browser emulation module.
//!
//! A browser profile is a fingerprint descriptor combining:
//! - TLS ClientHello layout (cipher suites, extensions, groups, sigalgs)
//! - HTTP/2 fingerprint (SETTINGS, window update, priorities, pseudo-order)
//! - HTTP/1.1 options
//! - Default headers in browser order and casing
//!
//! Profiles are looked up by id through [`registry`].

mod factory;
pub mod profiles;
pub mod registry;

pub use factory::{Emulation, EmulationBuilder, EmulationFactory};
pub use registry::{list_profiles, lookup, lookup_with_os};

use crate::base::neterror::NetError;
use std::fmt;
use std::str::FromStr;

/// Operating system a profile presents as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImpersonateOs {
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
}

impl ImpersonateOs {
    pub const ALL: [ImpersonateOs; 5] = [
        ImpersonateOs::Windows,
        ImpersonateOs::MacOs,
        ImpersonateOs::Linux,
        ImpersonateOs::Android,
        ImpersonateOs::Ios,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImpersonateOs::Windows => "windows",
            ImpersonateOs::MacOs => "macos",
            ImpersonateOs::Linux => "linux",
            ImpersonateOs::Android => "android",
            ImpersonateOs::Ios => "ios",
        }
    }

    pub fn is_mobile(self) -> bool {
        matches!(self, ImpersonateOs::Android | ImpersonateOs::Ios)
    }
}

impl fmt::Display for ImpersonateOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImpersonateOs {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImpersonateOs::ALL
            .into_iter()
            .find(|os| os.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| NetError::InvalidConfig(format!("unknown impersonate_os: {}", s)))
    }
}

/// HTTP/1.1 protocol options.
///
/// Header names go out with the casing stored in the profile unless
/// `title_case_headers` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Http1Options {
    /// Title-case every header name on the wire.
    pub title_case_headers: bool,
}

impl Http1Options {
    /// Create new builder.
    pub fn builder() -> Http1OptionsBuilder {
        Http1OptionsBuilder::default()
    }
}

/// Builder for Http1Options.
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct Http1OptionsBuilder {
    config: Http1Options,
}

impl Http1OptionsBuilder {
    pub fn title_case_headers(mut self, enabled: bool) -> Self {
        self.config.title_case_headers = enabled;
        self
    }

    pub fn build(self) -> Http1Options {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_parse() {
        assert_eq!("macOS".parse::<ImpersonateOs>().unwrap(), ImpersonateOs::MacOs);
        assert_eq!("ios".parse::<ImpersonateOs>().unwrap(), ImpersonateOs::Ios);
        let err = "beos".parse::<ImpersonateOs>().unwrap_err();
        assert!(matches!(err, NetError::InvalidConfig(_)));
    }

    #[test]
    fn test_http1_builder() {
        let opts = Http1Options::builder().title_case_headers(true).build();
        assert!(opts.title_case_headers);
        assert!(!Http1Options::default().title_case_headers);
    }
}
