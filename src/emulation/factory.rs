//! Emulation factory and core types.

use crate::emulation::{Http1Options, ImpersonateOs};
use crate::http::h2fingerprint::H2Fingerprint;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::socket::tls::TlsOptions;

/// Factory trait for creating emulation configurations.
///
/// Implemented by the browser profile enums; each produces the descriptor
/// for its native OS.
pub trait EmulationFactory {
    /// Create an [`Emulation`] from this factory.
    fn emulation(self) -> Emulation;
}

/// Fingerprint descriptor for one browser/OS pair.
///
/// Immutable once built. The registry hands these out as `Arc<Emulation>`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Emulation {
    /// Registry id (`chrome_120`).
    pub profile_id: String,
    /// OS the headers present.
    pub os: ImpersonateOs,
    /// TLS ClientHello layout.
    pub tls_options: TlsOptions,
    /// HTTP/1.1 protocol options.
    pub http1_options: Http1Options,
    /// HTTP/2 fingerprint.
    pub http2_options: H2Fingerprint,
    /// Default headers in browser order and casing.
    pub headers: OrderedHeaderMap,
}

impl Default for Emulation {
    fn default() -> Self {
        Self {
            profile_id: "custom".to_string(),
            os: ImpersonateOs::Windows,
            tls_options: TlsOptions::default(),
            http1_options: Http1Options::default(),
            http2_options: H2Fingerprint::default(),
            headers: OrderedHeaderMap::new(),
        }
    }
}

impl Emulation {
    /// Create a new builder.
    #[inline]
    pub fn builder() -> EmulationBuilder {
        EmulationBuilder::default()
    }

    #[inline]
    pub fn tls_options(&self) -> &TlsOptions {
        &self.tls_options
    }

    #[inline]
    pub fn http1_options(&self) -> &Http1Options {
        &self.http1_options
    }

    #[inline]
    pub fn http2_options(&self) -> &H2Fingerprint {
        &self.http2_options
    }

    #[inline]
    pub fn headers(&self) -> &OrderedHeaderMap {
        &self.headers
    }

    /// `User-Agent` from the default headers.
    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("user-agent")
    }
}

/// Builder for [`Emulation`] configuration.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct EmulationBuilder {
    emulation: Emulation,
}

impl EmulationBuilder {
    #[inline]
    pub fn profile_id(mut self, id: impl Into<String>) -> Self {
        self.emulation.profile_id = id.into();
        self
    }

    #[inline]
    pub fn os(mut self, os: ImpersonateOs) -> Self {
        self.emulation.os = os;
        self
    }

    #[inline]
    pub fn tls_options(mut self, opts: TlsOptions) -> Self {
        self.emulation.tls_options = opts;
        self
    }

    #[inline]
    pub fn http1_options(mut self, opts: Http1Options) -> Self {
        self.emulation.http1_options = opts;
        self
    }

    #[inline]
    pub fn http2_options(mut self, opts: H2Fingerprint) -> Self {
        self.emulation.http2_options = opts;
        self
    }

    /// Replace the default headers.
    #[inline]
    pub fn headers(mut self, headers: OrderedHeaderMap) -> Self {
        self.emulation.headers = headers;
        self
    }

    /// Append one default header. Invalid pairs are dropped.
    #[inline]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let _ = self.emulation.headers.append(name, value);
        self
    }

    #[inline]
    pub fn build(self) -> Emulation {
        self.emulation
    }
}

impl EmulationFactory for Emulation {
    #[inline]
    fn emulation(self) -> Emulation {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let emulation = Emulation::builder()
            .profile_id("custom_1")
            .os(ImpersonateOs::Linux)
            .header("User-Agent", "ua/1")
            .header("bad header", "x")
            .build();
        assert_eq!(emulation.profile_id, "custom_1");
        assert_eq!(emulation.os, ImpersonateOs::Linux);
        assert_eq!(emulation.user_agent(), Some("ua/1"));
        assert_eq!(emulation.headers().len(), 1);
    }
}
