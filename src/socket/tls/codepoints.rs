//! IANA TLS code points used by the browser descriptors, plus the mapping
//! from code point to the names BoringSSL's list parsers understand.

/// Cipher suite identifiers.
pub mod cipher {
    pub const TLS_AES_128_GCM_SHA256: u16 = 0x1301;
    pub const TLS_AES_256_GCM_SHA384: u16 = 0x1302;
    pub const TLS_CHACHA20_POLY1305_SHA256: u16 = 0x1303;

    pub const ECDHE_ECDSA_AES128_GCM_SHA256: u16 = 0xc02b;
    pub const ECDHE_RSA_AES128_GCM_SHA256: u16 = 0xc02f;
    pub const ECDHE_ECDSA_AES256_GCM_SHA384: u16 = 0xc02c;
    pub const ECDHE_RSA_AES256_GCM_SHA384: u16 = 0xc030;
    pub const ECDHE_ECDSA_CHACHA20_POLY1305: u16 = 0xcca9;
    pub const ECDHE_RSA_CHACHA20_POLY1305: u16 = 0xcca8;
    pub const ECDHE_ECDSA_AES128_SHA: u16 = 0xc009;
    pub const ECDHE_ECDSA_AES256_SHA: u16 = 0xc00a;
    pub const ECDHE_RSA_AES128_SHA: u16 = 0xc013;
    pub const ECDHE_RSA_AES256_SHA: u16 = 0xc014;
    pub const ECDHE_ECDSA_AES128_SHA256: u16 = 0xc023;
    pub const ECDHE_ECDSA_AES256_SHA384: u16 = 0xc024;
    pub const ECDHE_RSA_AES128_SHA256: u16 = 0xc027;
    pub const ECDHE_RSA_AES256_SHA384: u16 = 0xc028;
    pub const ECDHE_ECDSA_3DES_EDE_CBC_SHA: u16 = 0xc008;
    pub const ECDHE_RSA_3DES_EDE_CBC_SHA: u16 = 0xc012;
    pub const RSA_AES128_GCM_SHA256: u16 = 0x009c;
    pub const RSA_AES256_GCM_SHA384: u16 = 0x009d;
    pub const RSA_AES128_SHA: u16 = 0x002f;
    pub const RSA_AES256_SHA: u16 = 0x0035;
    pub const RSA_AES128_SHA256: u16 = 0x003c;
    pub const RSA_AES256_SHA256: u16 = 0x003d;
    pub const RSA_3DES_EDE_CBC_SHA: u16 = 0x000a;
}

/// Extension type identifiers.
pub mod extension {
    pub const SERVER_NAME: u16 = 0;
    pub const STATUS_REQUEST: u16 = 5;
    pub const SUPPORTED_GROUPS: u16 = 10;
    pub const EC_POINT_FORMATS: u16 = 11;
    pub const SIGNATURE_ALGORITHMS: u16 = 13;
    pub const ALPN: u16 = 16;
    pub const SIGNED_CERTIFICATE_TIMESTAMP: u16 = 18;
    pub const PADDING: u16 = 21;
    pub const ENCRYPT_THEN_MAC: u16 = 22;
    pub const EXTENDED_MASTER_SECRET: u16 = 23;
    pub const COMPRESS_CERTIFICATE: u16 = 27;
    pub const RECORD_SIZE_LIMIT: u16 = 28;
    pub const DELEGATED_CREDENTIALS: u16 = 34;
    pub const SESSION_TICKET: u16 = 35;
    pub const PRE_SHARED_KEY: u16 = 41;
    pub const EARLY_DATA: u16 = 42;
    pub const SUPPORTED_VERSIONS: u16 = 43;
    pub const PSK_KEY_EXCHANGE_MODES: u16 = 45;
    pub const POST_HANDSHAKE_AUTH: u16 = 49;
    pub const SIGNATURE_ALGORITHMS_CERT: u16 = 50;
    pub const KEY_SHARE: u16 = 51;
    pub const APPLICATION_SETTINGS: u16 = 17513;
    pub const APPLICATION_SETTINGS_NEW: u16 = 17613;
    pub const ENCRYPTED_CLIENT_HELLO: u16 = 65037;
    pub const RENEGOTIATION_INFO: u16 = 65281;
}

/// Named groups (supported_groups / key_share).
pub mod group {
    pub const SECP256R1: u16 = 0x0017;
    pub const SECP384R1: u16 = 0x0018;
    pub const SECP521R1: u16 = 0x0019;
    pub const X25519: u16 = 0x001d;
    pub const FFDHE2048: u16 = 0x0100;
    pub const FFDHE3072: u16 = 0x0101;
    pub const X25519_MLKEM768: u16 = 0x11ec;
    pub const X25519_KYBER768_DRAFT00: u16 = 0x6399;
}

/// Signature schemes.
pub mod sigalg {
    pub const RSA_PKCS1_SHA1: u16 = 0x0201;
    pub const ECDSA_SHA1: u16 = 0x0203;
    pub const RSA_PKCS1_SHA256: u16 = 0x0401;
    pub const ECDSA_SECP256R1_SHA256: u16 = 0x0403;
    pub const RSA_PKCS1_SHA384: u16 = 0x0501;
    pub const ECDSA_SECP384R1_SHA384: u16 = 0x0503;
    pub const RSA_PKCS1_SHA512: u16 = 0x0601;
    pub const ECDSA_SECP521R1_SHA512: u16 = 0x0603;
    pub const RSA_PSS_RSAE_SHA256: u16 = 0x0804;
    pub const RSA_PSS_RSAE_SHA384: u16 = 0x0805;
    pub const RSA_PSS_RSAE_SHA512: u16 = 0x0806;
    pub const ED25519: u16 = 0x0807;
}

/// Protocol versions as they appear on the wire.
pub mod version {
    pub const TLS_1_0: u16 = 0x0301;
    pub const TLS_1_1: u16 = 0x0302;
    pub const TLS_1_2: u16 = 0x0303;
    pub const TLS_1_3: u16 = 0x0304;
}

/// RFC 8701 GREASE values.
pub const GREASE_VALUES: [u16; 16] = [
    0x0a0a, 0x1a1a, 0x2a2a, 0x3a3a, 0x4a4a, 0x5a5a, 0x6a6a, 0x7a7a, 0x8a8a, 0x9a9a, 0xaaaa,
    0xbaba, 0xcaca, 0xdada, 0xeaea, 0xfafa,
];

/// Whether a 16-bit code point is a GREASE placeholder.
pub fn is_grease(value: u16) -> bool {
    (value & 0x0f0f) == 0x0a0a && (value >> 8) == (value & 0xff)
}

/// Standard cipher suite name as BoringSSL's cipher list parser takes it.
/// TLS 1.3 suites are listed too, which pins their order.
pub fn cipher_name(id: u16) -> Option<&'static str> {
    use cipher::*;
    let name = match id {
        TLS_AES_128_GCM_SHA256 => "TLS_AES_128_GCM_SHA256",
        TLS_AES_256_GCM_SHA384 => "TLS_AES_256_GCM_SHA384",
        TLS_CHACHA20_POLY1305_SHA256 => "TLS_CHACHA20_POLY1305_SHA256",
        ECDHE_ECDSA_AES128_GCM_SHA256 => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        ECDHE_RSA_AES128_GCM_SHA256 => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        ECDHE_ECDSA_AES256_GCM_SHA384 => "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        ECDHE_RSA_AES256_GCM_SHA384 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        ECDHE_ECDSA_CHACHA20_POLY1305 => "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
        ECDHE_RSA_CHACHA20_POLY1305 => "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
        ECDHE_ECDSA_AES128_SHA => "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
        ECDHE_ECDSA_AES256_SHA => "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
        ECDHE_RSA_AES128_SHA => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        ECDHE_RSA_AES256_SHA => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        ECDHE_RSA_AES128_SHA256 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256",
        ECDHE_ECDSA_3DES_EDE_CBC_SHA => "TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA",
        ECDHE_RSA_3DES_EDE_CBC_SHA => "TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA",
        RSA_AES128_GCM_SHA256 => "TLS_RSA_WITH_AES_128_GCM_SHA256",
        RSA_AES256_GCM_SHA384 => "TLS_RSA_WITH_AES_256_GCM_SHA384",
        RSA_AES128_SHA => "TLS_RSA_WITH_AES_128_CBC_SHA",
        RSA_AES256_SHA => "TLS_RSA_WITH_AES_256_CBC_SHA",
        RSA_3DES_EDE_CBC_SHA => "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
        _ => return None,
    };
    Some(name)
}

/// BoringSSL curve name for a named group.
pub fn group_name(id: u16) -> Option<&'static str> {
    use group::*;
    let name = match id {
        X25519 => "X25519",
        SECP256R1 => "P-256",
        SECP384R1 => "P-384",
        SECP521R1 => "P-521",
        X25519_KYBER768_DRAFT00 => "X25519Kyber768Draft00",
        X25519_MLKEM768 => "X25519MLKEM768",
        _ => return None,
    };
    Some(name)
}

/// Whether a group is a post-quantum hybrid that older BoringSSL builds
/// may not know.
pub fn is_post_quantum_group(id: u16) -> bool {
    matches!(id, group::X25519_KYBER768_DRAFT00 | group::X25519_MLKEM768)
}

/// TLS 1.3 style signature scheme name, accepted by both the sigalgs and
/// delegated_credentials list parsers.
pub fn sigalg_name(id: u16) -> Option<&'static str> {
    use sigalg::*;
    let name = match id {
        ECDSA_SECP256R1_SHA256 => "ecdsa_secp256r1_sha256",
        ECDSA_SECP384R1_SHA384 => "ecdsa_secp384r1_sha384",
        ECDSA_SECP521R1_SHA512 => "ecdsa_secp521r1_sha512",
        RSA_PSS_RSAE_SHA256 => "rsa_pss_rsae_sha256",
        RSA_PSS_RSAE_SHA384 => "rsa_pss_rsae_sha384",
        RSA_PSS_RSAE_SHA512 => "rsa_pss_rsae_sha512",
        RSA_PKCS1_SHA256 => "rsa_pkcs1_sha256",
        RSA_PKCS1_SHA384 => "rsa_pkcs1_sha384",
        RSA_PKCS1_SHA512 => "rsa_pkcs1_sha512",
        RSA_PKCS1_SHA1 => "rsa_pkcs1_sha1",
        ECDSA_SHA1 => "ecdsa_sha1",
        ED25519 => "ed25519",
        _ => return None,
    };
    Some(name)
}

/// Key exchange share length for a group, used when synthesizing hellos.
pub fn key_share_len(id: u16) -> usize {
    use group::*;
    match id {
        X25519 => 32,
        SECP256R1 => 65,
        SECP384R1 => 97,
        SECP521R1 => 133,
        X25519_KYBER768_DRAFT00 => 32 + 1184,
        X25519_MLKEM768 => 1184 + 32,
        FFDHE2048 => 256,
        FFDHE3072 => 384,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grease_detection() {
        for v in GREASE_VALUES {
            assert!(is_grease(v), "{:04x}", v);
        }
        assert!(!is_grease(0x1301));
        assert!(!is_grease(0x0a0b));
        assert!(!is_grease(extension::RENEGOTIATION_INFO));
    }

    #[test]
    fn test_cipher_names_cover_tls13_and_3des() {
        assert_eq!(cipher_name(cipher::TLS_CHACHA20_POLY1305_SHA256), Some("TLS_CHACHA20_POLY1305_SHA256"));
        assert_eq!(
            cipher_name(cipher::ECDHE_ECDSA_AES128_GCM_SHA256),
            Some("TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256")
        );
        assert!(cipher_name(cipher::ECDHE_ECDSA_3DES_EDE_CBC_SHA).is_some());
        assert!(cipher_name(cipher::ECDHE_RSA_3DES_EDE_CBC_SHA).is_some());
        assert!(cipher_name(cipher::ECDHE_ECDSA_AES128_SHA256).is_none());
    }

    #[test]
    fn test_group_names() {
        assert_eq!(group_name(group::X25519), Some("X25519"));
        assert_eq!(group_name(group::FFDHE2048), None);
        assert!(is_post_quantum_group(group::X25519_MLKEM768));
    }
}
