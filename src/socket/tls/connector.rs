//! BoringSSL connector configured from a descriptor's [`TlsOptions`].

use super::codepoints::{cipher_name, extension, group_name, is_post_quantum_group, sigalg_name};
use super::options::{AlpnProtocol, CertCompressAlg, TlsOptions};
use crate::base::neterror::NetError;
use boring::ssl::{
    ConnectConfiguration, ExtensionType, SslConnector, SslConnectorBuilder, SslMethod, SslOptions,
    SslVerifyMode,
};
use boring::x509::X509VerifyResult;
use boring_sys::{CRYPTO_BUFFER, SSL};
use std::io::Read;
use std::os::raw::c_int;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_boring::SslStream;

// X509_V_ERR_* codes from BoringSSL's x509.h.
const X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT: c_int = 2;
const X509_V_ERR_CERT_NOT_YET_VALID: c_int = 9;
const X509_V_ERR_CERT_HAS_EXPIRED: c_int = 10;
const X509_V_ERR_DEPTH_ZERO_SELF_SIGNED_CERT: c_int = 18;
const X509_V_ERR_SELF_SIGNED_CERT_IN_CHAIN: c_int = 19;
const X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT_LOCALLY: c_int = 20;
const X509_V_ERR_UNABLE_TO_VERIFY_LEAF_SIGNATURE: c_int = 21;
const X509_V_ERR_CERT_UNTRUSTED: c_int = 27;
const X509_V_ERR_HOSTNAME_MISMATCH: c_int = 62;

/// Certificate verification policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Validate chain and hostname. `false` skips all validation and is
    /// unsafe outside testing.
    pub verify: bool,
    /// Extra trust anchors (PEM bundle) used instead of the system store.
    pub ca_file: Option<PathBuf>,
}

impl VerifyPolicy {
    pub fn verified() -> Self {
        Self { verify: true, ca_file: None }
    }

    pub fn insecure() -> Self {
        Self { verify: false, ca_file: None }
    }
}

/// Protocol selected by ALPN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatedProtocol {
    Http2,
    Http1,
}

/// A connector bound to one descriptor and verification policy. Cheap to
/// share; each `negotiate` call gets its own SSL object.
pub struct TlsConnector {
    connector: SslConnector,
    alps_protocols: Vec<AlpnProtocol>,
    alps_new_codepoint: bool,
    ech_grease: bool,
    verify: bool,
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("verify", &self.verify)
            .field("alps_protocols", &self.alps_protocols)
            .finish()
    }
}

impl TlsConnector {
    pub fn new(options: &TlsOptions, policy: &VerifyPolicy) -> Result<Self, NetError> {
        let mut builder =
            SslConnector::builder(SslMethod::tls_client()).map_err(|_| NetError::SslProtocolError)?;
        apply_options(&mut builder, options)?;

        if policy.verify {
            builder.set_verify(SslVerifyMode::PEER);
            if let Some(ca) = &policy.ca_file {
                builder.set_ca_file(ca).map_err(|e| {
                    NetError::InvalidConfig(format!("ca_cert_file {}: {}", ca.display(), e))
                })?;
            }
        } else {
            builder.set_verify(SslVerifyMode::NONE);
        }

        let alps_protocols = if options.alps_extension().is_some() {
            options.alps_protocols.clone()
        } else {
            Vec::new()
        };

        Ok(Self {
            connector: builder.build(),
            alps_protocols,
            alps_new_codepoint: options.alps_extension() == Some(extension::APPLICATION_SETTINGS_NEW),
            ech_grease: options.has_extension(extension::ENCRYPTED_CLIENT_HELLO),
            verify: policy.verify,
        })
    }

    /// Run the TLS handshake over an established transport (plain TCP or a
    /// proxy tunnel).
    pub async fn negotiate<S>(&self, stream: S, server_name: &str) -> Result<SslStream<S>, NetError>
    where
        S: AsyncRead + AsyncWrite + Unpin + std::fmt::Debug,
    {
        let mut config = self.configure(server_name)?;
        if !self.alps_protocols.is_empty() {
            add_application_settings(&mut config, &self.alps_protocols, self.alps_new_codepoint)?;
        }

        let stream = tokio_boring::connect(config, server_name, stream)
            .await
            .map_err(|e| classify_handshake_error(&e))?;

        tracing::debug!(
            host = %server_name,
            version = %stream.ssl().version_str(),
            cipher = ?stream.ssl().current_cipher().map(|c| c.name()),
            alpn = ?stream.ssl().selected_alpn_protocol().map(String::from_utf8_lossy),
            "TLS handshake complete"
        );
        Ok(stream)
    }

    fn configure(&self, server_name: &str) -> Result<ConnectConfiguration, NetError> {
        let mut config = self.connector.configure().map_err(|_| NetError::SslProtocolError)?;
        config.set_use_server_name_indication(should_set_sni(server_name));
        config.set_verify_hostname(self.verify);
        config.set_enable_ech_grease(self.ech_grease);
        Ok(config)
    }
}

/// SNI MUST NOT be sent for IP literals (RFC 6066).
pub fn should_set_sni(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<std::net::IpAddr>()
        .is_err()
}

/// Protocol chosen by the server, defaulting to HTTP/1.1 when ALPN was not
/// negotiated.
pub fn negotiated_protocol<S>(stream: &SslStream<S>) -> NegotiatedProtocol {
    match stream.ssl().selected_alpn_protocol() {
        Some(b"h2") => NegotiatedProtocol::Http2,
        _ => NegotiatedProtocol::Http1,
    }
}

fn apply_options(builder: &mut SslConnectorBuilder, options: &TlsOptions) -> Result<(), NetError> {
    builder
        .set_min_proto_version(Some(options.min_tls_version().to_ssl_version()))
        .map_err(|_| NetError::SslProtocolError)?;
    builder
        .set_max_proto_version(Some(options.max_tls_version().to_ssl_version()))
        .map_err(|_| NetError::SslProtocolError)?;

    // TLS 1.3 suites are named too, so their order comes from the list.
    let ciphers: Vec<&str> = options.cipher_suites.iter().filter_map(|c| cipher_name(*c)).collect();
    if !ciphers.is_empty() {
        builder
            .set_cipher_list(&ciphers.join(":"))
            .map_err(|_| NetError::SslVersionOrCipherMismatch)?;
    }

    let curves: Vec<u16> = options
        .supported_groups
        .iter()
        .copied()
        .filter(|g| group_name(*g).is_some())
        .collect();
    if !curves.is_empty() {
        let list = |groups: &[u16]| {
            groups
                .iter()
                .filter_map(|g| group_name(*g))
                .collect::<Vec<_>>()
                .join(":")
        };
        if builder.set_curves_list(&list(&curves)).is_err() {
            let classical: Vec<u16> =
                curves.iter().copied().filter(|g| !is_post_quantum_group(*g)).collect();
            tracing::warn!(
                groups = %list(&curves),
                "post-quantum group unsupported by linked BoringSSL, falling back"
            );
            builder
                .set_curves_list(&list(&classical))
                .map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(limit) = key_shares_limit(options, &curves) {
            builder.set_key_shares_limit(limit);
        }
    }

    let sigalgs = sigalg_list(&options.signature_algorithms);
    if !sigalgs.is_empty() && builder.set_sigalgs_list(&sigalgs).is_err() {
        tracing::warn!(sigalgs = %sigalgs, "sigalgs rejected, keeping defaults");
    }

    if options.has_extension(extension::DELEGATED_CREDENTIALS) {
        let delegated = sigalg_list(&options.delegated_credentials);
        if !delegated.is_empty() {
            builder
                .set_delegated_credentials(&delegated)
                .map_err(|_| NetError::SslProtocolError)?;
        }
    }

    if options.has_extension(extension::RECORD_SIZE_LIMIT) {
        if let Some(limit) = options.record_size_limit {
            builder.set_record_size_limit(limit);
        }
    }

    if !options.alpn_protocols.is_empty() {
        builder
            .set_alpn_protos(&AlpnProtocol::encode_list(&options.alpn_protocols))
            .map_err(|_| NetError::SslProtocolError)?;
    }

    if !options.session_ticket {
        builder.set_options(SslOptions::NO_TICKET);
    }

    builder.set_grease_enabled(options.grease);
    if options.permute_extensions {
        builder.set_permute_extensions(true);
    } else {
        let indices = permutation_indices(&options.extensions);
        if !indices.is_empty() {
            builder
                .set_extension_permutation_indices(&indices)
                .map_err(|_| NetError::SslProtocolError)?;
        }
    }

    if options.has_extension(extension::STATUS_REQUEST) {
        builder.enable_ocsp_stapling();
    }
    if options.has_extension(extension::SIGNED_CERTIFICATE_TIMESTAMP) {
        builder.enable_signed_cert_timestamps();
    }
    if options.has_extension(extension::COMPRESS_CERTIFICATE) {
        for alg in &options.certificate_compression {
            let decompress: boring_sys::ssl_cert_decompression_func_t = match alg {
                CertCompressAlg::Brotli => Some(decompress_brotli_cert),
                CertCompressAlg::Zlib => Some(decompress_zlib_cert),
                CertCompressAlg::Zstd => Some(decompress_zstd_cert),
            };
            let ok = unsafe {
                boring_sys::SSL_CTX_add_cert_compression_alg(builder.as_ptr(), alg.wire(), None, decompress)
            };
            if ok != 1 {
                return Err(NetError::SslProtocolError);
            }
        }
    }

    Ok(())
}

fn sigalg_list(sigalgs: &[u16]) -> String {
    sigalgs
        .iter()
        .filter_map(|s| sigalg_name(*s))
        .collect::<Vec<_>>()
        .join(":")
}

/// Positions in BoringSSL's extension table for the descriptor's order.
/// GREASE, padding and pre_shared_key have fixed slots and are skipped.
pub(crate) fn permutation_indices(extensions: &[u16]) -> Vec<u8> {
    extensions
        .iter()
        .filter_map(|e| ExtensionType::index_of(ExtensionType::from(*e)))
        .map(|index| index as u8)
        .collect()
}

/// BoringSSL sends key shares for a prefix of the curve list. Only a
/// descriptor whose key_share groups are such a prefix can be matched.
fn key_shares_limit(options: &TlsOptions, curves: &[u16]) -> Option<u8> {
    let shares = &options.key_share_groups;
    (!shares.is_empty() && curves.starts_with(shares)).then(|| shares.len() as u8)
}

fn add_application_settings(
    config: &mut ConnectConfiguration,
    protocols: &[AlpnProtocol],
    new_codepoint: bool,
) -> Result<(), NetError> {
    for proto in protocols {
        config
            .add_application_settings(proto.as_bytes())
            .map_err(|_| NetError::SslProtocolError)?;
    }
    if new_codepoint {
        config.set_alps_use_new_codepoint(true);
    }
    Ok(())
}

fn classify_handshake_error<S: std::fmt::Debug>(err: &tokio_boring::HandshakeError<S>) -> NetError {
    if let Some(ssl) = err.ssl() {
        let result = ssl.verify_result();
        if result != X509VerifyResult::OK {
            tracing::debug!(reason = %result.error_string(), "certificate verification failed");
            return match result.as_raw() {
                X509_V_ERR_CERT_NOT_YET_VALID | X509_V_ERR_CERT_HAS_EXPIRED => NetError::CertDateInvalid,
                X509_V_ERR_HOSTNAME_MISMATCH => NetError::CertCommonNameInvalid,
                X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT
                | X509_V_ERR_DEPTH_ZERO_SELF_SIGNED_CERT
                | X509_V_ERR_SELF_SIGNED_CERT_IN_CHAIN
                | X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT_LOCALLY
                | X509_V_ERR_UNABLE_TO_VERIFY_LEAF_SIGNATURE
                | X509_V_ERR_CERT_UNTRUSTED => NetError::CertAuthorityInvalid,
                _ => NetError::CertInvalid,
            };
        }
    }
    if let Some(io) = err.as_io_error() {
        tracing::debug!(error = %io, "transport failed during TLS handshake");
        return NetError::SslHandshakeReset;
    }
    tracing::debug!(error = %err, "TLS handshake failed");
    NetError::SslProtocolError
}

unsafe fn finish_decompression(out: *mut *mut CRYPTO_BUFFER, data: &[u8]) -> c_int {
    let buffer = boring_sys::CRYPTO_BUFFER_new(data.as_ptr(), data.len(), std::ptr::null_mut());
    if buffer.is_null() {
        return 0;
    }
    *out = buffer;
    1
}

unsafe extern "C" fn decompress_brotli_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    let compressed = std::slice::from_raw_parts(in_, in_len);
    let mut decompressed = Vec::with_capacity(uncompressed_len);
    let mut decoder = brotli::Decompressor::new(compressed, 4096);
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) if decompressed.len() == uncompressed_len => finish_decompression(out, &decompressed),
        _ => 0,
    }
}

unsafe extern "C" fn decompress_zlib_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    let compressed = std::slice::from_raw_parts(in_, in_len);
    let mut decompressed = Vec::with_capacity(uncompressed_len);
    let mut decoder = flate2::read::ZlibDecoder::new(compressed);
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) if decompressed.len() == uncompressed_len => finish_decompression(out, &decompressed),
        _ => 0,
    }
}

unsafe extern "C" fn decompress_zstd_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    let compressed = std::slice::from_raw_parts(in_, in_len);
    match zstd::bulk::decompress(compressed, uncompressed_len) {
        Ok(decompressed) if decompressed.len() == uncompressed_len => {
            finish_decompression(out, &decompressed)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sni_skipped_for_ip_literals() {
        assert!(should_set_sni("example.com"));
        assert!(!should_set_sni("127.0.0.1"));
        assert!(!should_set_sni("[::1]"));
        assert!(!should_set_sni("::1"));
    }

    #[test]
    fn test_connector_builds_for_every_profile() {
        for id in crate::emulation::registry::list_profiles() {
            let emulation = crate::emulation::registry::lookup(id).unwrap();
            assert!(
                TlsConnector::new(&emulation.tls_options, &VerifyPolicy::insecure()).is_ok(),
                "{}",
                id
            );
        }
    }

    #[test]
    fn test_permutation_indices_follow_descriptor() {
        let emulation = crate::emulation::registry::lookup("firefox_133").unwrap();
        let extensions = &emulation.tls_options.extensions;
        let indices = permutation_indices(extensions);
        assert_eq!(indices.len(), extensions.len());
        let mut unique = indices.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), indices.len());

        // Fixed-slot extensions carry no index.
        assert!(permutation_indices(&[0x0a0a, extension::PADDING, extension::PRE_SHARED_KEY]).is_empty());
        assert_eq!(
            permutation_indices(&[extension::SERVER_NAME, extension::PADDING, extension::KEY_SHARE]).len(),
            2
        );
    }

    #[test]
    fn test_key_shares_limit_needs_prefix() {
        let opts = TlsOptions::builder()
            .supported_groups(&[0x001d, 0x0017, 0x0018])
            .key_share_groups(&[0x001d, 0x0017])
            .build();
        assert_eq!(key_shares_limit(&opts, &opts.supported_groups), Some(2));

        let opts = TlsOptions::builder()
            .supported_groups(&[0x001d, 0x0017, 0x0018])
            .key_share_groups(&[0x0017])
            .build();
        assert_eq!(key_shares_limit(&opts, &opts.supported_groups), None);
    }

    #[test]
    fn test_missing_ca_file_is_config_error() {
        let policy = VerifyPolicy {
            verify: true,
            ca_file: Some(PathBuf::from("/nonexistent/impersonet-ca.pem")),
        };
        let err = TlsConnector::new(&TlsOptions::default(), &policy).unwrap_err();
        assert!(matches!(err, NetError::InvalidConfig(_)));
    }
}
