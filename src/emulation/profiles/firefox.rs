//! Firefox browser profiles.
//!
//! Firefox runs NSS, so its hello carries extensions BoringSSL never emits
//! (delegated_credentials, record_size_limit). They stay in the descriptor
//! so the ClientHello model and fingerprints reflect the real browser.

use super::BrowserProfile;
use crate::emulation::{Emulation, EmulationFactory, Http1Options, ImpersonateOs};
use crate::http::h2fingerprint::H2Fingerprint;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::socket::tls::codepoints::{cipher, extension, group, sigalg, version};
use crate::socket::tls::{AlpnProtocol, CertCompressAlg, TlsOptions};

/// Firefox browser versions for emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Firefox {
    V109,
    V117,
    V128,
    V133,
    V135,
}

impl Default for Firefox {
    fn default() -> Self {
        Firefox::V135
    }
}

impl Firefox {
    pub fn major(self) -> u16 {
        match self {
            Firefox::V109 => 109,
            Firefox::V117 => 117,
            Firefox::V128 => 128,
            Firefox::V133 => 133,
            Firefox::V135 => 135,
        }
    }
}

impl BrowserProfile for Firefox {
    fn all() -> &'static [Self] {
        &[
            Firefox::V109,
            Firefox::V117,
            Firefox::V128,
            Firefox::V133,
            Firefox::V135,
        ]
    }

    fn id(self) -> &'static str {
        match self {
            Firefox::V109 => "firefox_109",
            Firefox::V117 => "firefox_117",
            Firefox::V128 => "firefox_128",
            Firefox::V133 => "firefox_133",
            Firefox::V135 => "firefox_135",
        }
    }

    fn native_os(self) -> ImpersonateOs {
        ImpersonateOs::Windows
    }

    fn build(self, os: ImpersonateOs) -> Emulation {
        let major = self.major();
        Emulation::builder()
            .profile_id(self.id())
            .os(os)
            .tls_options(firefox_tls_options(major))
            .http1_options(Http1Options::default())
            .http2_options(H2Fingerprint::firefox(major))
            .headers(firefox_headers(major, os))
            .build()
    }
}

impl EmulationFactory for Firefox {
    fn emulation(self) -> Emulation {
        self.build(self.native_os())
    }
}

fn firefox_user_agent(major: u16, os: ImpersonateOs) -> String {
    match os {
        ImpersonateOs::Windows => format!(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:{v}.0) Gecko/20100101 Firefox/{v}.0",
            v = major
        ),
        ImpersonateOs::MacOs => format!(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:{v}.0) Gecko/20100101 Firefox/{v}.0",
            v = major
        ),
        ImpersonateOs::Linux => format!(
            "Mozilla/5.0 (X11; Linux x86_64; rv:{v}.0) Gecko/20100101 Firefox/{v}.0",
            v = major
        ),
        ImpersonateOs::Android => format!(
            "Mozilla/5.0 (Android 14; Mobile; rv:{v}.0) Gecko/{v}.0 Firefox/{v}.0",
            v = major
        ),
        ImpersonateOs::Ios => format!(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) FxiOS/{}.0 Mobile/15E148 Safari/605.1.15",
            major
        ),
    }
}

fn firefox_tls_options(major: u16) -> TlsOptions {
    let mut extensions = vec![
        extension::SERVER_NAME,
        extension::EXTENDED_MASTER_SECRET,
        extension::RENEGOTIATION_INFO,
        extension::SUPPORTED_GROUPS,
        extension::EC_POINT_FORMATS,
        extension::SESSION_TICKET,
        extension::ALPN,
        extension::STATUS_REQUEST,
        extension::DELEGATED_CREDENTIALS,
        extension::KEY_SHARE,
        extension::SUPPORTED_VERSIONS,
        extension::SIGNATURE_ALGORITHMS,
        extension::PSK_KEY_EXCHANGE_MODES,
        extension::RECORD_SIZE_LIMIT,
    ];
    let mut compression = Vec::new();
    if major >= 128 {
        extensions.push(extension::COMPRESS_CERTIFICATE);
        compression = vec![CertCompressAlg::Zlib, CertCompressAlg::Brotli, CertCompressAlg::Zstd];
    }
    if major >= 117 {
        extensions.push(extension::ENCRYPTED_CLIENT_HELLO);
    } else {
        extensions.push(extension::PADDING);
    }

    let classical = [
        group::X25519,
        group::SECP256R1,
        group::SECP384R1,
        group::SECP521R1,
        group::FFDHE2048,
        group::FFDHE3072,
    ];
    let (groups, key_shares) = if major >= 133 {
        let mut groups = vec![group::X25519_MLKEM768];
        groups.extend_from_slice(&classical);
        (groups, vec![group::X25519_MLKEM768, group::X25519, group::SECP256R1])
    } else {
        (classical.to_vec(), vec![group::X25519, group::SECP256R1])
    };

    TlsOptions::builder()
        .cipher_suites(&[
            cipher::TLS_AES_128_GCM_SHA256,
            cipher::TLS_CHACHA20_POLY1305_SHA256,
            cipher::TLS_AES_256_GCM_SHA384,
            cipher::ECDHE_ECDSA_AES128_GCM_SHA256,
            cipher::ECDHE_RSA_AES128_GCM_SHA256,
            cipher::ECDHE_ECDSA_CHACHA20_POLY1305,
            cipher::ECDHE_RSA_CHACHA20_POLY1305,
            cipher::ECDHE_ECDSA_AES256_GCM_SHA384,
            cipher::ECDHE_RSA_AES256_GCM_SHA384,
            cipher::ECDHE_ECDSA_AES256_SHA,
            cipher::ECDHE_ECDSA_AES128_SHA,
            cipher::ECDHE_RSA_AES128_SHA,
            cipher::ECDHE_RSA_AES256_SHA,
            cipher::RSA_AES128_GCM_SHA256,
            cipher::RSA_AES256_GCM_SHA384,
            cipher::RSA_AES128_SHA,
            cipher::RSA_AES256_SHA,
        ])
        .extensions(&extensions)
        .supported_groups(&groups)
        .key_share_groups(&key_shares)
        .signature_algorithms(&[
            sigalg::ECDSA_SECP256R1_SHA256,
            sigalg::ECDSA_SECP384R1_SHA384,
            sigalg::ECDSA_SECP521R1_SHA512,
            sigalg::RSA_PSS_RSAE_SHA256,
            sigalg::RSA_PSS_RSAE_SHA384,
            sigalg::RSA_PSS_RSAE_SHA512,
            sigalg::RSA_PKCS1_SHA256,
            sigalg::RSA_PKCS1_SHA384,
            sigalg::RSA_PKCS1_SHA512,
            sigalg::ECDSA_SHA1,
            sigalg::RSA_PKCS1_SHA1,
        ])
        .delegated_credentials(&[
            sigalg::ECDSA_SECP256R1_SHA256,
            sigalg::ECDSA_SECP384R1_SHA384,
            sigalg::ECDSA_SECP521R1_SHA512,
            sigalg::ECDSA_SHA1,
        ])
        .alpn_protocols(&[AlpnProtocol::HTTP2, AlpnProtocol::HTTP1])
        .supported_versions(&[version::TLS_1_3, version::TLS_1_2])
        .certificate_compression(&compression)
        .record_size_limit(0x4001)
        .grease(false)
        .permute_extensions(false)
        .session_ticket(true)
        .build()
}

fn firefox_headers(major: u16, os: ImpersonateOs) -> OrderedHeaderMap {
    let mut headers = OrderedHeaderMap::with_capacity(14);
    let mut add = |name: &str, value: &str| {
        let _ = headers.append(name, value);
    };

    add("User-Agent", &firefox_user_agent(major, os));
    if major >= 128 {
        add(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/png,image/svg+xml,*/*;q=0.8",
        );
    } else {
        add(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        );
    }
    add("Accept-Language", "en-US,en;q=0.5");
    if major >= 133 {
        add("Accept-Encoding", "gzip, deflate, br, zstd");
    } else {
        add("Accept-Encoding", "gzip, deflate, br");
    }
    add("Connection", "keep-alive");
    add("Upgrade-Insecure-Requests", "1");
    add("Sec-Fetch-Dest", "document");
    add("Sec-Fetch-Mode", "navigate");
    add("Sec-Fetch-Site", "none");
    add("Sec-Fetch-User", "?1");
    if major >= 117 {
        add("Priority", "u=0, i");
    }
    add("TE", "trailers");
    headers
}
