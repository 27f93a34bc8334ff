//! OkHttp client profiles.
//!
//! OkHttp is an Android HTTP client; its headers do not vary by OS.
//! 3.x speaks TLS 1.2 only.

use super::BrowserProfile;
use crate::emulation::{Emulation, EmulationFactory, Http1Options, ImpersonateOs};
use crate::http::h2fingerprint::H2Fingerprint;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::socket::tls::codepoints::{cipher, extension, group, sigalg, version};
use crate::socket::tls::{AlpnProtocol, TlsOptions};

/// OkHttp versions for emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OkHttp {
    V3_9,
    V3_11,
    V3_13,
    V3_14,
    V4_9,
    V4_10,
    V4_12,
    V5,
}

impl Default for OkHttp {
    fn default() -> Self {
        OkHttp::V4_12
    }
}

impl OkHttp {
    pub fn version(self) -> &'static str {
        match self {
            OkHttp::V3_9 => "3.9.1",
            OkHttp::V3_11 => "3.11.0",
            OkHttp::V3_13 => "3.13.1",
            OkHttp::V3_14 => "3.14.9",
            OkHttp::V4_9 => "4.9.3",
            OkHttp::V4_10 => "4.10.0",
            OkHttp::V4_12 => "4.12.0",
            OkHttp::V5 => "5.0.0-alpha.14",
        }
    }

    fn is_tls12_only(self) -> bool {
        matches!(self, OkHttp::V3_9 | OkHttp::V3_11)
    }
}

impl BrowserProfile for OkHttp {
    fn all() -> &'static [Self] {
        &[
            OkHttp::V3_9,
            OkHttp::V3_11,
            OkHttp::V3_13,
            OkHttp::V3_14,
            OkHttp::V4_9,
            OkHttp::V4_10,
            OkHttp::V4_12,
            OkHttp::V5,
        ]
    }

    fn id(self) -> &'static str {
        match self {
            OkHttp::V3_9 => "okhttp_3_9",
            OkHttp::V3_11 => "okhttp_3_11",
            OkHttp::V3_13 => "okhttp_3_13",
            OkHttp::V3_14 => "okhttp_3_14",
            OkHttp::V4_9 => "okhttp_4_9",
            OkHttp::V4_10 => "okhttp_4_10",
            OkHttp::V4_12 => "okhttp_4_12",
            OkHttp::V5 => "okhttp_5",
        }
    }

    fn native_os(self) -> ImpersonateOs {
        ImpersonateOs::Android
    }

    fn build(self, _os: ImpersonateOs) -> Emulation {
        Emulation::builder()
            .profile_id(self.id())
            .os(self.native_os())
            .tls_options(okhttp_tls_options(self.is_tls12_only()))
            .http1_options(Http1Options::default())
            .http2_options(H2Fingerprint::okhttp())
            .headers(okhttp_headers(self.version()))
            .build()
    }
}

impl EmulationFactory for OkHttp {
    fn emulation(self) -> Emulation {
        self.build(self.native_os())
    }
}

fn okhttp_tls_options(tls12_only: bool) -> TlsOptions {
    let modern_ciphers = [
        cipher::ECDHE_ECDSA_AES128_GCM_SHA256,
        cipher::ECDHE_RSA_AES128_GCM_SHA256,
        cipher::ECDHE_ECDSA_AES256_GCM_SHA384,
        cipher::ECDHE_RSA_AES256_GCM_SHA384,
        cipher::ECDHE_ECDSA_CHACHA20_POLY1305,
        cipher::ECDHE_RSA_CHACHA20_POLY1305,
        cipher::ECDHE_RSA_AES128_SHA,
        cipher::ECDHE_RSA_AES256_SHA,
        cipher::RSA_AES128_GCM_SHA256,
        cipher::RSA_AES256_GCM_SHA384,
        cipher::RSA_AES128_SHA,
        cipher::RSA_AES256_SHA,
    ];

    let mut extensions = vec![
        extension::SERVER_NAME,
        extension::EXTENDED_MASTER_SECRET,
        extension::RENEGOTIATION_INFO,
        extension::SUPPORTED_GROUPS,
        extension::EC_POINT_FORMATS,
        extension::SESSION_TICKET,
        extension::ALPN,
        extension::STATUS_REQUEST,
        extension::SIGNATURE_ALGORITHMS,
    ];

    let builder = if tls12_only {
        let mut ciphers = modern_ciphers.to_vec();
        ciphers.push(cipher::RSA_3DES_EDE_CBC_SHA);
        extensions.push(extension::PADDING);
        TlsOptions::builder()
            .cipher_suites(&ciphers)
            .supported_versions(&[version::TLS_1_2, version::TLS_1_1, version::TLS_1_0])
    } else {
        let mut ciphers = vec![
            cipher::TLS_AES_128_GCM_SHA256,
            cipher::TLS_AES_256_GCM_SHA384,
            cipher::TLS_CHACHA20_POLY1305_SHA256,
        ];
        ciphers.extend_from_slice(&modern_ciphers);
        extensions.extend_from_slice(&[
            extension::KEY_SHARE,
            extension::PSK_KEY_EXCHANGE_MODES,
            extension::SUPPORTED_VERSIONS,
            extension::PADDING,
        ]);
        TlsOptions::builder()
            .cipher_suites(&ciphers)
            .supported_versions(&[version::TLS_1_3, version::TLS_1_2])
    };

    builder
        .extensions(&extensions)
        .supported_groups(&[group::X25519, group::SECP256R1, group::SECP384R1])
        .key_share_groups(&[group::X25519])
        .signature_algorithms(&[
            sigalg::ECDSA_SECP256R1_SHA256,
            sigalg::RSA_PSS_RSAE_SHA256,
            sigalg::RSA_PKCS1_SHA256,
            sigalg::ECDSA_SECP384R1_SHA384,
            sigalg::RSA_PSS_RSAE_SHA384,
            sigalg::RSA_PKCS1_SHA384,
            sigalg::RSA_PSS_RSAE_SHA512,
            sigalg::RSA_PKCS1_SHA512,
            sigalg::RSA_PKCS1_SHA1,
        ])
        .alpn_protocols(&[AlpnProtocol::HTTP2, AlpnProtocol::HTTP1])
        .grease(false)
        .permute_extensions(false)
        .session_ticket(true)
        .build()
}

fn okhttp_headers(version: &str) -> OrderedHeaderMap {
    let mut headers = OrderedHeaderMap::with_capacity(3);
    let _ = headers.append("Connection", "Keep-Alive");
    let _ = headers.append("Accept-Encoding", "gzip");
    let _ = headers.append("User-Agent", &format!("okhttp/{}", version));
    headers
}
