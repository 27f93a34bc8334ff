//! Safari browser profiles, macOS and iOS.
//!
//! Safari only ships on Apple platforms. Requests for another OS keep the
//! native platform's headers.

use super::BrowserProfile;
use crate::emulation::{Emulation, EmulationFactory, Http1Options, ImpersonateOs};
use crate::http::h2fingerprint::H2Fingerprint;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::socket::tls::codepoints::{cipher, extension, group, sigalg, version};
use crate::socket::tls::{AlpnProtocol, CertCompressAlg, TlsOptions};

/// Safari on macOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Safari {
    V15_3,
    V15_6_1,
    V16,
    V16_5,
    V17_0,
    V17_2_1,
    V17_4_1,
    V17_5,
    V18,
    V18_2,
}

/// Safari on iOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SafariIos {
    V16_5,
    V17_2,
    V17_4_1,
    V18_1_1,
}

impl Default for Safari {
    fn default() -> Self {
        Safari::V18
    }
}

impl Default for SafariIos {
    fn default() -> Self {
        SafariIos::V18_1_1
    }
}

impl Safari {
    /// `Version/` token of the user agent.
    pub fn version(self) -> &'static str {
        match self {
            Safari::V15_3 => "15.3",
            Safari::V15_6_1 => "15.6.1",
            Safari::V16 => "16.0",
            Safari::V16_5 => "16.5",
            Safari::V17_0 => "17.0",
            Safari::V17_2_1 => "17.2.1",
            Safari::V17_4_1 => "17.4.1",
            Safari::V17_5 => "17.5",
            Safari::V18 => "18.0",
            Safari::V18_2 => "18.2",
        }
    }
}

impl SafariIos {
    pub fn version(self) -> &'static str {
        match self {
            SafariIos::V16_5 => "16.5",
            SafariIos::V17_2 => "17.2",
            SafariIos::V17_4_1 => "17.4.1",
            SafariIos::V18_1_1 => "18.1.1",
        }
    }
}

impl BrowserProfile for Safari {
    fn all() -> &'static [Self] {
        &[
            Safari::V15_3,
            Safari::V15_6_1,
            Safari::V16,
            Safari::V16_5,
            Safari::V17_0,
            Safari::V17_2_1,
            Safari::V17_4_1,
            Safari::V17_5,
            Safari::V18,
            Safari::V18_2,
        ]
    }

    fn id(self) -> &'static str {
        match self {
            Safari::V15_3 => "safari_15_3",
            Safari::V15_6_1 => "safari_15_6_1",
            Safari::V16 => "safari_16",
            Safari::V16_5 => "safari_16_5",
            Safari::V17_0 => "safari_17_0",
            Safari::V17_2_1 => "safari_17_2_1",
            Safari::V17_4_1 => "safari_17_4_1",
            Safari::V17_5 => "safari_17_5",
            Safari::V18 => "safari_18",
            Safari::V18_2 => "safari_18_2",
        }
    }

    fn native_os(self) -> ImpersonateOs {
        ImpersonateOs::MacOs
    }

    fn build(self, os: ImpersonateOs) -> Emulation {
        safari_emulation(self.id(), self.version(), apple_os(os, ImpersonateOs::MacOs))
    }
}

impl BrowserProfile for SafariIos {
    fn all() -> &'static [Self] {
        &[
            SafariIos::V16_5,
            SafariIos::V17_2,
            SafariIos::V17_4_1,
            SafariIos::V18_1_1,
        ]
    }

    fn id(self) -> &'static str {
        match self {
            SafariIos::V16_5 => "safari_ios_16_5",
            SafariIos::V17_2 => "safari_ios_17_2",
            SafariIos::V17_4_1 => "safari_ios_17_4_1",
            SafariIos::V18_1_1 => "safari_ios_18_1_1",
        }
    }

    fn native_os(self) -> ImpersonateOs {
        ImpersonateOs::Ios
    }

    fn build(self, os: ImpersonateOs) -> Emulation {
        safari_emulation(self.id(), self.version(), apple_os(os, ImpersonateOs::Ios))
    }
}

impl EmulationFactory for Safari {
    fn emulation(self) -> Emulation {
        self.build(self.native_os())
    }
}

impl EmulationFactory for SafariIos {
    fn emulation(self) -> Emulation {
        self.build(self.native_os())
    }
}

fn apple_os(requested: ImpersonateOs, native: ImpersonateOs) -> ImpersonateOs {
    match requested {
        ImpersonateOs::MacOs | ImpersonateOs::Ios => requested,
        _ => native,
    }
}

fn major_of(version: &str) -> u16 {
    version
        .split('.')
        .next()
        .and_then(|m| m.parse().ok())
        .unwrap_or(18)
}

fn safari_emulation(id: &'static str, version: &str, os: ImpersonateOs) -> Emulation {
    let major = major_of(version);
    Emulation::builder()
        .profile_id(id)
        .os(os)
        .tls_options(safari_tls_options())
        .http1_options(Http1Options::default())
        .http2_options(H2Fingerprint::safari(major))
        .headers(safari_headers(version, major, os))
        .build()
}

fn safari_user_agent(version: &str, os: ImpersonateOs) -> String {
    if os == ImpersonateOs::Ios {
        let ios = version.replace('.', "_");
        format!(
            "Mozilla/5.0 (iPhone; CPU iPhone OS {} like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{} Mobile/15E148 Safari/604.1",
            ios, version
        )
    } else {
        format!(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{} Safari/605.1.15",
            version
        )
    }
}

/// Safari's hello has been stable across 15-18: GREASE on, no session
/// ticket extension, legacy CBC and 3DES suites still offered.
fn safari_tls_options() -> TlsOptions {
    TlsOptions::builder()
        .cipher_suites(&[
            cipher::TLS_AES_128_GCM_SHA256,
            cipher::TLS_AES_256_GCM_SHA384,
            cipher::TLS_CHACHA20_POLY1305_SHA256,
            cipher::ECDHE_ECDSA_AES256_GCM_SHA384,
            cipher::ECDHE_ECDSA_AES128_GCM_SHA256,
            cipher::ECDHE_ECDSA_CHACHA20_POLY1305,
            cipher::ECDHE_RSA_AES256_GCM_SHA384,
            cipher::ECDHE_RSA_AES128_GCM_SHA256,
            cipher::ECDHE_RSA_CHACHA20_POLY1305,
            cipher::ECDHE_ECDSA_AES256_SHA,
            cipher::ECDHE_ECDSA_AES128_SHA,
            cipher::ECDHE_RSA_AES256_SHA,
            cipher::ECDHE_RSA_AES128_SHA,
            cipher::RSA_AES256_GCM_SHA384,
            cipher::RSA_AES128_GCM_SHA256,
            cipher::RSA_AES256_SHA,
            cipher::RSA_AES128_SHA,
            cipher::ECDHE_ECDSA_3DES_EDE_CBC_SHA,
            cipher::ECDHE_RSA_3DES_EDE_CBC_SHA,
            cipher::RSA_3DES_EDE_CBC_SHA,
        ])
        .extensions(&[
            extension::SERVER_NAME,
            extension::EXTENDED_MASTER_SECRET,
            extension::RENEGOTIATION_INFO,
            extension::SUPPORTED_GROUPS,
            extension::EC_POINT_FORMATS,
            extension::ALPN,
            extension::STATUS_REQUEST,
            extension::SIGNATURE_ALGORITHMS,
            extension::SIGNED_CERTIFICATE_TIMESTAMP,
            extension::KEY_SHARE,
            extension::PSK_KEY_EXCHANGE_MODES,
            extension::SUPPORTED_VERSIONS,
            extension::COMPRESS_CERTIFICATE,
            extension::PADDING,
        ])
        .supported_groups(&[
            group::X25519,
            group::SECP256R1,
            group::SECP384R1,
            group::SECP521R1,
        ])
        .key_share_groups(&[group::X25519])
        .signature_algorithms(&[
            sigalg::ECDSA_SECP256R1_SHA256,
            sigalg::RSA_PSS_RSAE_SHA256,
            sigalg::RSA_PKCS1_SHA256,
            sigalg::ECDSA_SECP384R1_SHA384,
            sigalg::ECDSA_SHA1,
            sigalg::RSA_PSS_RSAE_SHA384,
            sigalg::RSA_PKCS1_SHA384,
            sigalg::RSA_PSS_RSAE_SHA512,
            sigalg::RSA_PKCS1_SHA512,
            sigalg::RSA_PKCS1_SHA1,
        ])
        .alpn_protocols(&[AlpnProtocol::HTTP2, AlpnProtocol::HTTP1])
        .supported_versions(&[
            version::TLS_1_3,
            version::TLS_1_2,
            version::TLS_1_1,
            version::TLS_1_0,
        ])
        .certificate_compression(&[CertCompressAlg::Zlib])
        .grease(true)
        .permute_extensions(false)
        .session_ticket(false)
        .build()
}

fn safari_headers(version: &str, major: u16, os: ImpersonateOs) -> OrderedHeaderMap {
    let mut headers = OrderedHeaderMap::with_capacity(10);
    let mut add = |name: &str, value: &str| {
        let _ = headers.append(name, value);
    };
    let user_agent = safari_user_agent(version, os);
    let accept = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

    if major >= 18 {
        add("Sec-Fetch-Dest", "document");
        add("User-Agent", &user_agent);
        add("Accept", accept);
        add("Sec-Fetch-Site", "none");
        add("Sec-Fetch-Mode", "navigate");
        add("Accept-Language", "en-US,en;q=0.9");
        add("Priority", "u=0, i");
        add("Accept-Encoding", "gzip, deflate, br");
        add("Connection", "keep-alive");
    } else {
        add("Accept", accept);
        add("Sec-Fetch-Site", "none");
        add("Accept-Encoding", "gzip, deflate, br");
        add("Sec-Fetch-Mode", "navigate");
        add("User-Agent", &user_agent);
        add("Accept-Language", "en-US,en;q=0.9");
        add("Sec-Fetch-Dest", "document");
        add("Connection", "keep-alive");
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safari_macos() {
        let emulation = Safari::V17_0.emulation();
        assert_eq!(emulation.os, ImpersonateOs::MacOs);
        assert!(emulation
            .user_agent()
            .unwrap()
            .contains("Version/17.0 Safari/605.1.15"));
        assert!(!emulation.tls_options.session_ticket);
        assert!(!emulation.tls_options.has_extension(extension::SESSION_TICKET));
        assert_eq!(emulation.http2_options.pseudo_order.to_string(), "m,s,p,a");
    }

    #[test]
    fn test_safari_ios() {
        let emulation = SafariIos::V17_4_1.emulation();
        assert!(emulation
            .user_agent()
            .unwrap()
            .contains("iPhone OS 17_4_1 like Mac OS X"));
        assert_eq!(
            emulation.http2_options.akamai(),
            "2:0;4:4194304;3:100|10485760|0|m,s,p,a"
        );
    }

    #[test]
    fn test_non_apple_os_keeps_native() {
        let emulation = Safari::V18.build(ImpersonateOs::Windows);
        assert_eq!(emulation.os, ImpersonateOs::MacOs);
        let ios = Safari::V18.build(ImpersonateOs::Ios);
        assert!(ios.user_agent().unwrap().contains("Mobile/15E148"));
    }
}
