//! JA3 and JA4 fingerprints of a ClientHello.

use super::codepoints::{extension, is_grease};
use super::hello::ClientHello;
use boring::hash::{hash, MessageDigest};
use std::fmt::Write;

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

fn digest_hex(md: MessageDigest, input: &str) -> String {
    match hash(md, input.as_bytes()) {
        Ok(digest) => hex(&digest),
        Err(_) => String::new(),
    }
}

fn join_dec<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// JA3: `version,ciphers,extensions,groups,point_formats` with GREASE
/// stripped, md5-hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ja3 {
    pub text: String,
    pub hash: String,
}

impl Ja3 {
    pub fn from_hello(hello: &ClientHello) -> Self {
        let ciphers = hello.cipher_suites.iter().copied().filter(|c| !is_grease(*c));
        let extensions = hello.extension_types_no_grease();
        let groups = hello.supported_groups().into_iter().filter(|g| !is_grease(*g));
        let text = format!(
            "{},{},{},{},{}",
            hello.legacy_version,
            join_dec(ciphers),
            join_dec(extensions),
            join_dec(groups),
            join_dec(hello.ec_point_formats()),
        );
        let hash = digest_hex(MessageDigest::md5(), &text);
        Self { text, hash }
    }

    /// The cipher field alone. Stable even when extensions are permuted.
    pub fn cipher_field(&self) -> &str {
        self.text.split(',').nth(1).unwrap_or("")
    }
}

/// JA4 (`t13d1516h2_8daaf6152771_e5627efa2ab1` shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ja4(pub String);

impl Ja4 {
    pub fn from_hello(hello: &ClientHello) -> Self {
        let version = hello
            .supported_versions()
            .into_iter()
            .filter(|v| !is_grease(*v))
            .max()
            .unwrap_or(hello.legacy_version);
        let version = match version {
            0x0304 => "13",
            0x0303 => "12",
            0x0302 => "11",
            0x0301 => "10",
            _ => "00",
        };
        let sni = if hello.extension(extension::SERVER_NAME).is_some() { 'd' } else { 'i' };

        let ciphers: Vec<u16> = hello.cipher_suites.iter().copied().filter(|c| !is_grease(*c)).collect();
        let extensions = hello.extension_types_no_grease();

        let alpn = match hello.alpn_protocols().first() {
            Some(first) if !first.is_empty() => {
                let bytes = first.as_bytes();
                format!("{}{}", bytes[0] as char, bytes[bytes.len() - 1] as char)
            }
            _ => "00".to_string(),
        };

        let prefix = format!(
            "t{}{}{:02}{:02}{}",
            version,
            sni,
            ciphers.len().min(99),
            extensions.len().min(99),
            alpn
        );

        let mut sorted_ciphers: Vec<String> = ciphers.iter().map(|c| format!("{:04x}", c)).collect();
        sorted_ciphers.sort();
        let cipher_hash = truncated_sha256(&sorted_ciphers.join(","));

        let mut sorted_exts: Vec<String> = extensions
            .iter()
            .filter(|e| **e != extension::SERVER_NAME && **e != extension::ALPN)
            .map(|e| format!("{:04x}", e))
            .collect();
        sorted_exts.sort();
        let sigalgs: Vec<String> = hello
            .signature_algorithms()
            .iter()
            .map(|s| format!("{:04x}", s))
            .collect();
        let mut ext_input = sorted_exts.join(",");
        if !sigalgs.is_empty() {
            ext_input.push('_');
            ext_input.push_str(&sigalgs.join(","));
        }
        let ext_hash = truncated_sha256(&ext_input);

        Ja4(format!("{}_{}_{}", prefix, cipher_hash, ext_hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn truncated_sha256(input: &str) -> String {
    if input.is_empty() {
        return "000000000000".to_string();
    }
    let mut full = digest_hex(MessageDigest::sha256(), input);
    full.truncate(12);
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::tls::hello::Extension;

    fn hello_with(ciphers: Vec<u16>, extensions: Vec<Extension>) -> ClientHello {
        ClientHello {
            legacy_version: 0x0303,
            random: [0; 32],
            session_id: Vec::new(),
            cipher_suites: ciphers,
            compression_methods: vec![0],
            extensions,
        }
    }

    #[test]
    fn test_ja3_strips_grease() {
        let hello = hello_with(
            vec![0x0a0a, 0x1301, 0xc02b],
            vec![
                Extension { ext_type: 0x1a1a, data: vec![] },
                Extension { ext_type: extension::SUPPORTED_GROUPS, data: vec![0, 6, 0x2a, 0x2a, 0, 0x1d, 0, 0x17] },
                Extension { ext_type: extension::EC_POINT_FORMATS, data: vec![1, 0] },
            ],
        );
        let ja3 = Ja3::from_hello(&hello);
        assert_eq!(ja3.text, "771,4865-49195,10-11,29-23,0");
        assert_eq!(ja3.cipher_field(), "4865-49195");
        assert_eq!(ja3.hash.len(), 32);
    }

    #[test]
    fn test_ja3_of_empty_lists() {
        let ja3 = Ja3::from_hello(&hello_with(vec![], vec![]));
        assert_eq!(ja3.text, "771,,,,");
        // md5("771,,,,")
        assert_eq!(ja3.hash, digest_hex(MessageDigest::md5(), "771,,,,"));
    }

    #[test]
    fn test_ja4_prefix() {
        let hello = hello_with(
            vec![0x1301, 0x1302],
            vec![
                Extension { ext_type: extension::SERVER_NAME, data: vec![0, 4, 0, 0, 1, b'a'] },
                Extension { ext_type: extension::ALPN, data: vec![0, 3, 2, b'h', b'2'] },
                Extension { ext_type: extension::SUPPORTED_VERSIONS, data: vec![4, 3, 4, 3, 3] },
            ],
        );
        let ja4 = Ja4::from_hello(&hello);
        assert!(ja4.as_str().starts_with("t13d0203h2_"), "{}", ja4.as_str());
        assert_eq!(ja4.as_str().len(), "t13d0203h2_".len() + 12 + 1 + 12);
    }

    #[test]
    fn test_ja4_without_alpn_or_sni() {
        let ja4 = Ja4::from_hello(&hello_with(vec![0x002f], vec![]));
        assert!(ja4.as_str().starts_with("t12i010000_"));
        assert!(ja4.as_str().ends_with("_000000000000"));
    }
}
