//! Chrome browser profiles.
//!
//! One table builder parameterized by major version covers every release:
//! - 110 turned on extension permutation
//! - 116 stopped advertising MAX_CONCURRENT_STREAMS
//! - 119 added the ECH GREASE extension
//! - 123 added zstd to Accept-Encoding
//! - 124 shipped X25519Kyber768, replaced by X25519MLKEM768 in 131
//! - 133 moved ALPS to the new code point

use super::{ch_mobile, ch_platform, ua_platform, BrowserProfile};
use crate::emulation::{Emulation, EmulationFactory, Http1Options, ImpersonateOs};
use crate::http::h2fingerprint::H2Fingerprint;
use crate::http::orderedheaders::{generate_sec_ch_ua, OrderedHeaderMap};
use crate::socket::tls::codepoints::{cipher, extension, group, sigalg, version};
use crate::socket::tls::{AlpnProtocol, CertCompressAlg, TlsOptions};

/// Chrome versions for emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Chrome {
    V100,
    V101,
    V104,
    V107,
    V110,
    V116,
    V117,
    V119,
    V120,
    V123,
    V124,
    V126,
    V127,
    V131,
    V133,
}

impl Default for Chrome {
    fn default() -> Self {
        Chrome::V131
    }
}

impl Chrome {
    pub fn major(self) -> u16 {
        match self {
            Chrome::V100 => 100,
            Chrome::V101 => 101,
            Chrome::V104 => 104,
            Chrome::V107 => 107,
            Chrome::V110 => 110,
            Chrome::V116 => 116,
            Chrome::V117 => 117,
            Chrome::V119 => 119,
            Chrome::V120 => 120,
            Chrome::V123 => 123,
            Chrome::V124 => 124,
            Chrome::V126 => 126,
            Chrome::V127 => 127,
            Chrome::V131 => 131,
            Chrome::V133 => 133,
        }
    }
}

impl BrowserProfile for Chrome {
    fn all() -> &'static [Self] {
        &[
            Chrome::V100,
            Chrome::V101,
            Chrome::V104,
            Chrome::V107,
            Chrome::V110,
            Chrome::V116,
            Chrome::V117,
            Chrome::V119,
            Chrome::V120,
            Chrome::V123,
            Chrome::V124,
            Chrome::V126,
            Chrome::V127,
            Chrome::V131,
            Chrome::V133,
        ]
    }

    fn id(self) -> &'static str {
        match self {
            Chrome::V100 => "chrome_100",
            Chrome::V101 => "chrome_101",
            Chrome::V104 => "chrome_104",
            Chrome::V107 => "chrome_107",
            Chrome::V110 => "chrome_110",
            Chrome::V116 => "chrome_116",
            Chrome::V117 => "chrome_117",
            Chrome::V119 => "chrome_119",
            Chrome::V120 => "chrome_120",
            Chrome::V123 => "chrome_123",
            Chrome::V124 => "chrome_124",
            Chrome::V126 => "chrome_126",
            Chrome::V127 => "chrome_127",
            Chrome::V131 => "chrome_131",
            Chrome::V133 => "chrome_133",
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
            .tls_options(chrome_tls_options(major))
            .http1_options(Http1Options::default())
            .http2_options(H2Fingerprint::chrome(major))
            .headers(chromium_headers("Google Chrome", major, os, &chrome_user_agent(major, os)))
            .build()
    }
}

impl EmulationFactory for Chrome {
    fn emulation(self) -> Emulation {
        self.build(self.native_os())
    }
}

fn chrome_user_agent(major: u16, os: ImpersonateOs) -> String {
    match os {
        ImpersonateOs::Ios => format!(
            "Mozilla/5.0 ({}) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/{}.0.0.0 Mobile/15E148 Safari/604.1",
            ua_platform(os),
            major
        ),
        ImpersonateOs::Android => format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Mobile Safari/537.36",
            ua_platform(os),
            major
        ),
        _ => format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36",
            ua_platform(os),
            major
        ),
    }
}

/// ClientHello layout shared by every Chromium browser of a given major.
pub(crate) fn chrome_tls_options(major: u16) -> TlsOptions {
    let alps = if major >= 133 {
        extension::APPLICATION_SETTINGS_NEW
    } else {
        extension::APPLICATION_SETTINGS
    };

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
        extension::SIGNED_CERTIFICATE_TIMESTAMP,
        extension::KEY_SHARE,
        extension::PSK_KEY_EXCHANGE_MODES,
        extension::SUPPORTED_VERSIONS,
        extension::COMPRESS_CERTIFICATE,
        alps,
    ];
    if major >= 119 {
        extensions.push(extension::ENCRYPTED_CLIENT_HELLO);
    }
    extensions.push(extension::PADDING);

    let (groups, key_shares): (&[u16], &[u16]) = match major {
        0..=123 => (
            &[group::X25519, group::SECP256R1, group::SECP384R1],
            &[group::X25519],
        ),
        124..=130 => (
            &[
                group::X25519_KYBER768_DRAFT00,
                group::X25519,
                group::SECP256R1,
                group::SECP384R1,
            ],
            &[group::X25519_KYBER768_DRAFT00, group::X25519],
        ),
        _ => (
            &[
                group::X25519_MLKEM768,
                group::X25519,
                group::SECP256R1,
                group::SECP384R1,
            ],
            &[group::X25519_MLKEM768, group::X25519],
        ),
    };

    TlsOptions::builder()
        .cipher_suites(&[
            cipher::TLS_AES_128_GCM_SHA256,
            cipher::TLS_AES_256_GCM_SHA384,
            cipher::TLS_CHACHA20_POLY1305_SHA256,
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
        ])
        .extensions(&extensions)
        .supported_groups(groups)
        .key_share_groups(key_shares)
        .signature_algorithms(&[
            sigalg::ECDSA_SECP256R1_SHA256,
            sigalg::RSA_PSS_RSAE_SHA256,
            sigalg::RSA_PKCS1_SHA256,
            sigalg::ECDSA_SECP384R1_SHA384,
            sigalg::RSA_PSS_RSAE_SHA384,
            sigalg::RSA_PKCS1_SHA384,
            sigalg::RSA_PSS_RSAE_SHA512,
            sigalg::RSA_PKCS1_SHA512,
        ])
        .alpn_protocols(&[AlpnProtocol::HTTP2, AlpnProtocol::HTTP1])
        .alps_protocols(&[AlpnProtocol::HTTP2])
        .supported_versions(&[version::TLS_1_3, version::TLS_1_2])
        .certificate_compression(&[CertCompressAlg::Brotli])
        .grease(true)
        .permute_extensions(major >= 110)
        .session_ticket(true)
        .build()
}

/// Navigation headers of a Chromium browser in wire order and H1 casing.
/// Client hints are left out on iOS, where Chromium runs on WebKit.
pub(crate) fn chromium_headers(
    brand: &str,
    major: u16,
    os: ImpersonateOs,
    user_agent: &str,
) -> OrderedHeaderMap {
    let mut headers = OrderedHeaderMap::with_capacity(16);
    let mut add = |name: &str, value: &str| {
        let _ = headers.append(name, value);
    };

    add("Connection", "keep-alive");
    if os != ImpersonateOs::Ios {
        add("sec-ch-ua", &generate_sec_ch_ua(brand, major));
        add("sec-ch-ua-mobile", ch_mobile(os));
        add("sec-ch-ua-platform", ch_platform(os));
    }
    add("Upgrade-Insecure-Requests", "1");
    add("User-Agent", user_agent);
    add(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    );
    add("Sec-Fetch-Site", "none");
    add("Sec-Fetch-Mode", "navigate");
    add("Sec-Fetch-User", "?1");
    add("Sec-Fetch-Dest", "document");
    if major >= 123 {
        add("Accept-Encoding", "gzip, deflate, br, zstd");
    } else {
        add("Accept-Encoding", "gzip, deflate, br");
    }
    add("Accept-Language", "en-US,en;q=0.9");
    if major >= 124 {
        add("Priority", "u=0, i");
    }
    headers
}
