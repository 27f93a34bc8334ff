use super::codepoints::{extension, version};
use boring::ssl::SslVersion;

/// TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TlsVersion(u16);

impl TlsVersion {
    pub const TLS_1_0: TlsVersion = TlsVersion(version::TLS_1_0);
    pub const TLS_1_1: TlsVersion = TlsVersion(version::TLS_1_1);
    pub const TLS_1_2: TlsVersion = TlsVersion(version::TLS_1_2);
    pub const TLS_1_3: TlsVersion = TlsVersion(version::TLS_1_3);

    /// Wire value.
    pub fn wire(self) -> u16 {
        self.0
    }

    pub(crate) fn to_ssl_version(self) -> SslVersion {
        match self.0 {
            version::TLS_1_0 => SslVersion::TLS1,
            version::TLS_1_1 => SslVersion::TLS1_1,
            version::TLS_1_2 => SslVersion::TLS1_2,
            _ => SslVersion::TLS1_3,
        }
    }
}

/// An ALPN (or ALPS) protocol identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlpnProtocol(&'static str);

impl AlpnProtocol {
    pub const HTTP1: AlpnProtocol = AlpnProtocol("http/1.1");
    pub const HTTP2: AlpnProtocol = AlpnProtocol("h2");

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.0.as_bytes()
    }

    /// Length-prefixed wire encoding of a protocol list (`\x02h2\x08http/1.1`).
    pub fn encode_list(protocols: &[AlpnProtocol]) -> Vec<u8> {
        let mut wire = Vec::new();
        for proto in protocols {
            wire.push(proto.0.len() as u8);
            wire.extend_from_slice(proto.as_bytes());
        }
        wire
    }
}

/// Certificate compression algorithm (RFC 8879).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertCompressAlg {
    Zlib,
    Brotli,
    Zstd,
}

impl CertCompressAlg {
    pub fn wire(self) -> u16 {
        match self {
            CertCompressAlg::Zlib => 1,
            CertCompressAlg::Brotli => 2,
            CertCompressAlg::Zstd => 3,
        }
    }
}

/// The TLS half of a fingerprint descriptor.
///
/// Every list is kept in the order the browser emits it. GREASE values are
/// not stored; `grease` controls whether they are inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    /// Cipher suites, TLS 1.3 suites included.
    pub cipher_suites: Vec<u16>,

    /// Extension types in emission order.
    pub extensions: Vec<u16>,

    /// supported_groups payload.
    pub supported_groups: Vec<u16>,

    /// Groups that get a key_share entry.
    pub key_share_groups: Vec<u16>,

    /// signature_algorithms payload.
    pub signature_algorithms: Vec<u16>,

    /// delegated_credentials payload (Firefox).
    pub delegated_credentials: Vec<u16>,

    /// ALPN protocols.
    pub alpn_protocols: Vec<AlpnProtocol>,

    /// ALPS protocols.
    pub alps_protocols: Vec<AlpnProtocol>,

    /// supported_versions payload.
    pub supported_versions: Vec<u16>,

    /// Legacy compression methods.
    pub compression_methods: Vec<u8>,

    /// ec_point_formats payload.
    pub ec_point_formats: Vec<u8>,

    /// psk_key_exchange_modes payload.
    pub psk_key_exchange_modes: Vec<u8>,

    /// compress_certificate payload.
    pub certificate_compression: Vec<CertCompressAlg>,

    /// record_size_limit payload (Firefox).
    pub record_size_limit: Option<u16>,

    /// Insert GREASE values (Chrome family).
    pub grease: bool,

    /// Randomize extension order per connection (Chrome 110+).
    pub permute_extensions: bool,

    /// Offer session tickets.
    pub session_ticket: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            cipher_suites: Vec::new(),
            extensions: Vec::new(),
            supported_groups: Vec::new(),
            key_share_groups: Vec::new(),
            signature_algorithms: Vec::new(),
            delegated_credentials: Vec::new(),
            alpn_protocols: vec![AlpnProtocol::HTTP2, AlpnProtocol::HTTP1],
            alps_protocols: Vec::new(),
            supported_versions: vec![version::TLS_1_3, version::TLS_1_2],
            compression_methods: vec![0],
            ec_point_formats: vec![0],
            psk_key_exchange_modes: vec![1],
            certificate_compression: Vec::new(),
            record_size_limit: None,
            grease: false,
            permute_extensions: false,
            session_ticket: true,
        }
    }
}

impl TlsOptions {
    pub fn builder() -> TlsOptionsBuilder {
        TlsOptionsBuilder::new()
    }

    /// Whether the descriptor lists the given extension.
    pub fn has_extension(&self, ext: u16) -> bool {
        self.extensions.contains(&ext)
    }

    /// Lowest version in supported_versions.
    pub fn min_tls_version(&self) -> TlsVersion {
        self.supported_versions
            .iter()
            .copied()
            .min()
            .map(TlsVersion)
            .unwrap_or(TlsVersion::TLS_1_2)
    }

    /// Highest version in supported_versions.
    pub fn max_tls_version(&self) -> TlsVersion {
        self.supported_versions
            .iter()
            .copied()
            .max()
            .map(TlsVersion)
            .unwrap_or(TlsVersion::TLS_1_3)
    }

    /// Whether HTTP/2 is offered via ALPN.
    pub fn offers_h2(&self) -> bool {
        self.alpn_protocols.contains(&AlpnProtocol::HTTP2)
    }

    /// ALPS extension code point in use, if any.
    pub fn alps_extension(&self) -> Option<u16> {
        self.extensions
            .iter()
            .copied()
            .find(|e| *e == extension::APPLICATION_SETTINGS || *e == extension::APPLICATION_SETTINGS_NEW)
    }
}

/// Builder for `TlsOptions`.
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct TlsOptionsBuilder {
    config: TlsOptions,
}

impl TlsOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cipher_suites(mut self, ciphers: &[u16]) -> Self {
        self.config.cipher_suites = ciphers.to_vec();
        self
    }

    pub fn extensions(mut self, extensions: &[u16]) -> Self {
        self.config.extensions = extensions.to_vec();
        self
    }

    pub fn supported_groups(mut self, groups: &[u16]) -> Self {
        self.config.supported_groups = groups.to_vec();
        self
    }

    pub fn key_share_groups(mut self, groups: &[u16]) -> Self {
        self.config.key_share_groups = groups.to_vec();
        self
    }

    pub fn signature_algorithms(mut self, sigalgs: &[u16]) -> Self {
        self.config.signature_algorithms = sigalgs.to_vec();
        self
    }

    pub fn delegated_credentials(mut self, sigalgs: &[u16]) -> Self {
        self.config.delegated_credentials = sigalgs.to_vec();
        self
    }

    pub fn alpn_protocols(mut self, alpn: &[AlpnProtocol]) -> Self {
        self.config.alpn_protocols = alpn.to_vec();
        self
    }

    pub fn alps_protocols(mut self, alps: &[AlpnProtocol]) -> Self {
        self.config.alps_protocols = alps.to_vec();
        self
    }

    pub fn supported_versions(mut self, versions: &[u16]) -> Self {
        self.config.supported_versions = versions.to_vec();
        self
    }

    pub fn compression_methods(mut self, methods: &[u8]) -> Self {
        self.config.compression_methods = methods.to_vec();
        self
    }

    pub fn ec_point_formats(mut self, formats: &[u8]) -> Self {
        self.config.ec_point_formats = formats.to_vec();
        self
    }

    pub fn psk_key_exchange_modes(mut self, modes: &[u8]) -> Self {
        self.config.psk_key_exchange_modes = modes.to_vec();
        self
    }

    pub fn certificate_compression(mut self, algs: &[CertCompressAlg]) -> Self {
        self.config.certificate_compression = algs.to_vec();
        self
    }

    pub fn record_size_limit(mut self, limit: u16) -> Self {
        self.config.record_size_limit = Some(limit);
        self
    }

    pub fn grease(mut self, enabled: bool) -> Self {
        self.config.grease = enabled;
        self
    }

    pub fn permute_extensions(mut self, permute: bool) -> Self {
        self.config.permute_extensions = permute;
        self
    }

    pub fn session_ticket(mut self, enabled: bool) -> Self {
        self.config.session_ticket = enabled;
        self
    }

    pub fn build(self) -> TlsOptions {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpn_wire_encoding() {
        let wire = AlpnProtocol::encode_list(&[AlpnProtocol::HTTP2, AlpnProtocol::HTTP1]);
        assert_eq!(wire, b"\x02h2\x08http/1.1");
    }

    #[test]
    fn test_version_bounds_follow_supported_versions() {
        let opts = TlsOptions::builder()
            .supported_versions(&[version::TLS_1_3, version::TLS_1_2, version::TLS_1_1])
            .build();
        assert_eq!(opts.min_tls_version(), TlsVersion::TLS_1_1);
        assert_eq!(opts.max_tls_version(), TlsVersion::TLS_1_3);
    }

    #[test]
    fn test_alps_extension_lookup() {
        let opts = TlsOptions::builder()
            .extensions(&[extension::SERVER_NAME, extension::APPLICATION_SETTINGS])
            .build();
        assert_eq!(opts.alps_extension(), Some(extension::APPLICATION_SETTINGS));
        assert!(TlsOptions::default().alps_extension().is_none());
    }
}
