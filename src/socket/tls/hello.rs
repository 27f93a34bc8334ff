//! TLS ClientHello model.
//!
//! [`ClientHello::from_options`] lays out the hello a descriptor prescribes,
//! field for field, and [`ClientHello::parse`] decodes a captured record. The
//! two together are what the fingerprint hashes and the capture tests work
//! from.

use super::codepoints::{extension, is_grease, key_share_len};
use super::options::{AlpnProtocol, TlsOptions};
use crate::base::neterror::NetError;

const HANDSHAKE_RECORD: u8 = 0x16;
const CLIENT_HELLO: u8 = 0x01;

/// A single extension: type plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub ext_type: u16,
    pub data: Vec<u8>,
}

/// A decoded or synthesized ClientHello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

/// Per-hello GREASE picks, derived from random seed bytes the same way
/// BoringSSL does (`(seed & 0xf0) | 0x0a`, doubled).
#[derive(Debug, Clone, Copy)]
struct GreaseSeeds {
    cipher: u16,
    group: u16,
    ext_first: u16,
    ext_last: u16,
    version: u16,
}

impl GreaseSeeds {
    fn from_bytes(seed: &[u8; 5]) -> Self {
        let value = |b: u8| -> u16 {
            let v = ((b & 0xf0) | 0x0a) as u16;
            v | (v << 8)
        };
        let ext_first = value(seed[2]);
        let mut ext_last = value(seed[3]);
        if ext_last == ext_first {
            ext_last ^= 0x1010;
        }
        Self {
            cipher: value(seed[0]),
            group: value(seed[1]),
            ext_first,
            ext_last,
            version: value(seed[4]),
        }
    }
}

fn random_bytes(buf: &mut [u8]) -> Result<(), NetError> {
    boring::rand::rand_bytes(buf).map_err(|_| NetError::SslProtocolError)
}

impl ClientHello {
    /// Lay out the hello a descriptor prescribes for `server_name`.
    ///
    /// Extensions appear exactly in `options.extensions` order; with GREASE on,
    /// one GREASE extension leads and one trails (before padding). No PSK is
    /// offered, since a fresh hello has no ticket to resume.
    pub fn from_options(options: &TlsOptions, server_name: Option<&str>) -> Result<Self, NetError> {
        let mut random = [0u8; 32];
        random_bytes(&mut random)?;
        let mut session_id = vec![0u8; 32];
        random_bytes(&mut session_id)?;
        let mut seed = [0u8; 5];
        random_bytes(&mut seed)?;
        let grease = options.grease.then(|| GreaseSeeds::from_bytes(&seed));

        let mut cipher_suites = Vec::with_capacity(options.cipher_suites.len() + 1);
        if let Some(g) = grease {
            cipher_suites.push(g.cipher);
        }
        cipher_suites.extend_from_slice(&options.cipher_suites);

        let mut extensions = Vec::with_capacity(options.extensions.len() + 2);
        if let Some(g) = grease {
            extensions.push(Extension { ext_type: g.ext_first, data: Vec::new() });
        }

        let mut wants_padding = false;
        for &ext_type in &options.extensions {
            if ext_type == extension::PADDING {
                wants_padding = true;
                continue;
            }
            if let Some(data) = extension_payload(ext_type, options, server_name, grease)? {
                extensions.push(Extension { ext_type, data });
            }
        }

        if let Some(g) = grease {
            extensions.push(Extension { ext_type: g.ext_last, data: vec![0] });
        }

        let mut hello = ClientHello {
            legacy_version: super::codepoints::version::TLS_1_2,
            random,
            session_id,
            cipher_suites,
            compression_methods: options.compression_methods.clone(),
            extensions,
        };

        if wants_padding {
            if let Some(len) = hello.padding_len() {
                hello.extensions.push(Extension { ext_type: extension::PADDING, data: vec![0; len] });
            }
        }

        Ok(hello)
    }

    /// BoringSSL's padding rule: hellos whose handshake message would land in
    /// (0xff, 0x200) are padded up to 0x200.
    fn padding_len(&self) -> Option<usize> {
        let unpadded = 4 + self.body_len();
        if unpadded > 0xff && unpadded < 0x200 {
            let mut padding = 0x200 - unpadded;
            if padding >= 4 + 1 {
                padding -= 4;
            } else {
                padding = 1;
            }
            Some(padding)
        } else {
            None
        }
    }

    fn extensions_len(&self) -> usize {
        self.extensions.iter().map(|e| 4 + e.data.len()).sum()
    }

    fn body_len(&self) -> usize {
        2 + 32
            + 1
            + self.session_id.len()
            + 2
            + self.cipher_suites.len() * 2
            + 1
            + self.compression_methods.len()
            + 2
            + self.extensions_len()
    }

    /// Encode as a single TLS handshake record.
    pub fn encode(&self) -> Vec<u8> {
        let body_len = self.body_len();
        let mut out = Vec::with_capacity(9 + body_len);
        out.push(HANDSHAKE_RECORD);
        out.extend_from_slice(&super::codepoints::version::TLS_1_0.to_be_bytes());
        out.extend_from_slice(&((body_len + 4) as u16).to_be_bytes());
        out.push(CLIENT_HELLO);
        out.extend_from_slice(&(body_len as u32).to_be_bytes()[1..]);
        out.extend_from_slice(&self.legacy_version.to_be_bytes());
        out.extend_from_slice(&self.random);
        out.push(self.session_id.len() as u8);
        out.extend_from_slice(&self.session_id);
        out.extend_from_slice(&((self.cipher_suites.len() * 2) as u16).to_be_bytes());
        for c in &self.cipher_suites {
            out.extend_from_slice(&c.to_be_bytes());
        }
        out.push(self.compression_methods.len() as u8);
        out.extend_from_slice(&self.compression_methods);
        out.extend_from_slice(&(self.extensions_len() as u16).to_be_bytes());
        for ext in &self.extensions {
            out.extend_from_slice(&ext.ext_type.to_be_bytes());
            out.extend_from_slice(&(ext.data.len() as u16).to_be_bytes());
            out.extend_from_slice(&ext.data);
        }
        out
    }

    /// Decode a ClientHello from raw TLS records. The hello may span several
    /// handshake records.
    pub fn parse(records: &[u8]) -> Result<Self, NetError> {
        let mut handshake = Vec::new();
        let mut input = Reader::new(records);
        while !input.is_empty() {
            let content_type = input.u8()?;
            if content_type != HANDSHAKE_RECORD {
                return Err(NetError::SslProtocolError);
            }
            let _record_version = input.u16()?;
            let len = input.u16()? as usize;
            handshake.extend_from_slice(input.take(len)?);
            if handshake.len() >= 4 {
                let msg_len = u32::from_be_bytes([0, handshake[1], handshake[2], handshake[3]]) as usize;
                if handshake.len() >= 4 + msg_len {
                    break;
                }
            }
        }
        Self::parse_handshake(&handshake)
    }

    /// Decode the handshake message (type + u24 length + body).
    pub fn parse_handshake(msg: &[u8]) -> Result<Self, NetError> {
        let mut r = Reader::new(msg);
        if r.u8()? != CLIENT_HELLO {
            return Err(NetError::SslProtocolError);
        }
        let len = r.u24()? as usize;
        let mut r = Reader::new(r.take(len)?);

        let legacy_version = r.u16()?;
        let mut random = [0u8; 32];
        random.copy_from_slice(r.take(32)?);
        let sid_len = r.u8()? as usize;
        let session_id = r.take(sid_len)?.to_vec();

        let cs_len = r.u16()? as usize;
        let mut cs = Reader::new(r.take(cs_len)?);
        let mut cipher_suites = Vec::with_capacity(cs_len / 2);
        while !cs.is_empty() {
            cipher_suites.push(cs.u16()?);
        }

        let cm_len = r.u8()? as usize;
        let compression_methods = r.take(cm_len)?.to_vec();

        let mut extensions = Vec::new();
        if !r.is_empty() {
            let ext_len = r.u16()? as usize;
            let mut ext = Reader::new(r.take(ext_len)?);
            while !ext.is_empty() {
                let ext_type = ext.u16()?;
                let len = ext.u16()? as usize;
                extensions.push(Extension { ext_type, data: ext.take(len)?.to_vec() });
            }
        }

        Ok(ClientHello {
            legacy_version,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }

    pub fn extension(&self, ext_type: u16) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.ext_type == ext_type)
    }

    /// Extension types in wire order, GREASE included.
    pub fn extension_types(&self) -> Vec<u16> {
        self.extensions.iter().map(|e| e.ext_type).collect()
    }

    /// Extension types in wire order without GREASE.
    pub fn extension_types_no_grease(&self) -> Vec<u16> {
        self.extensions
            .iter()
            .map(|e| e.ext_type)
            .filter(|t| !is_grease(*t))
            .collect()
    }

    pub fn server_name(&self) -> Option<String> {
        let data = &self.extension(extension::SERVER_NAME)?.data;
        let mut r = Reader::new(data);
        let _list_len = r.u16().ok()?;
        let _name_type = r.u8().ok()?;
        let len = r.u16().ok()? as usize;
        r.take(len).ok().map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn supported_groups(&self) -> Vec<u16> {
        self.u16_list(extension::SUPPORTED_GROUPS)
    }

    pub fn signature_algorithms(&self) -> Vec<u16> {
        self.u16_list(extension::SIGNATURE_ALGORITHMS)
    }

    pub fn supported_versions(&self) -> Vec<u16> {
        let Some(ext) = self.extension(extension::SUPPORTED_VERSIONS) else {
            return Vec::new();
        };
        let mut r = Reader::new(&ext.data);
        let Ok(len) = r.u8() else {
            return Vec::new();
        };
        let Ok(body) = r.take(len as usize) else {
            return Vec::new();
        };
        body.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect()
    }

    pub fn ec_point_formats(&self) -> Vec<u8> {
        self.extension(extension::EC_POINT_FORMATS)
            .and_then(|e| e.data.split_first().map(|(_, rest)| rest.to_vec()))
            .unwrap_or_default()
    }

    pub fn alpn_protocols(&self) -> Vec<String> {
        self.protocol_list(extension::ALPN)
    }

    pub fn key_share_groups(&self) -> Vec<u16> {
        let Some(ext) = self.extension(extension::KEY_SHARE) else {
            return Vec::new();
        };
        let mut r = Reader::new(&ext.data);
        let mut groups = Vec::new();
        if r.u16().is_err() {
            return groups;
        }
        while !r.is_empty() {
            let (Ok(group), Ok(len)) = (r.u16(), r.u16()) else {
                break;
            };
            if r.take(len as usize).is_err() {
                break;
            }
            groups.push(group);
        }
        groups
    }

    fn u16_list(&self, ext_type: u16) -> Vec<u16> {
        let Some(ext) = self.extension(ext_type) else {
            return Vec::new();
        };
        if ext.data.len() < 2 {
            return Vec::new();
        }
        ext.data[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    fn protocol_list(&self, ext_type: u16) -> Vec<String> {
        let Some(ext) = self.extension(ext_type) else {
            return Vec::new();
        };
        let mut r = Reader::new(&ext.data);
        let mut protocols = Vec::new();
        if r.u16().is_err() {
            return protocols;
        }
        while let Ok(len) = r.u8() {
            match r.take(len as usize) {
                Ok(p) => protocols.push(String::from_utf8_lossy(p).into_owned()),
                Err(_) => break,
            }
        }
        protocols
    }
}

fn u16_vec(values: impl IntoIterator<Item = u16>) -> Vec<u8> {
    let body: Vec<u8> = values.into_iter().flat_map(|v| v.to_be_bytes()).collect();
    let mut out = Vec::with_capacity(body.len() + 2);
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

fn u8_vec(values: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() + 1);
    out.push(values.len() as u8);
    out.extend_from_slice(values);
    out
}

fn protocol_vec(protocols: &[AlpnProtocol]) -> Vec<u8> {
    let body = AlpnProtocol::encode_list(protocols);
    let mut out = Vec::with_capacity(body.len() + 2);
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

/// Payload for one extension, or `None` when it is not emitted on a fresh
/// hello (no SNI for IP hosts, no PSK without a ticket).
fn extension_payload(
    ext_type: u16,
    options: &TlsOptions,
    server_name: Option<&str>,
    grease: Option<GreaseSeeds>,
) -> Result<Option<Vec<u8>>, NetError> {
    let data = match ext_type {
        extension::SERVER_NAME => {
            let Some(name) = server_name else {
                return Ok(None);
            };
            let mut entry = vec![0u8];
            entry.extend_from_slice(&(name.len() as u16).to_be_bytes());
            entry.extend_from_slice(name.as_bytes());
            let mut out = (entry.len() as u16).to_be_bytes().to_vec();
            out.extend_from_slice(&entry);
            out
        }
        extension::STATUS_REQUEST => vec![1, 0, 0, 0, 0],
        extension::SUPPORTED_GROUPS => {
            let lead = grease.map(|g| g.group);
            u16_vec(lead.into_iter().chain(options.supported_groups.iter().copied()))
        }
        extension::EC_POINT_FORMATS => u8_vec(&options.ec_point_formats),
        extension::SIGNATURE_ALGORITHMS | extension::SIGNATURE_ALGORITHMS_CERT => {
            u16_vec(options.signature_algorithms.iter().copied())
        }
        extension::DELEGATED_CREDENTIALS => u16_vec(options.delegated_credentials.iter().copied()),
        extension::ALPN => protocol_vec(&options.alpn_protocols),
        extension::APPLICATION_SETTINGS | extension::APPLICATION_SETTINGS_NEW => {
            protocol_vec(&options.alps_protocols)
        }
        extension::RENEGOTIATION_INFO => vec![0],
        extension::SUPPORTED_VERSIONS => {
            let lead = grease.map(|g| g.version);
            let versions: Vec<u16> = lead
                .into_iter()
                .chain(options.supported_versions.iter().copied())
                .collect();
            let mut out = vec![(versions.len() * 2) as u8];
            for v in versions {
                out.extend_from_slice(&v.to_be_bytes());
            }
            out
        }
        extension::PSK_KEY_EXCHANGE_MODES => u8_vec(&options.psk_key_exchange_modes),
        extension::KEY_SHARE => {
            let mut entries = Vec::new();
            if let Some(g) = grease {
                entries.extend_from_slice(&g.group.to_be_bytes());
                entries.extend_from_slice(&1u16.to_be_bytes());
                entries.push(0);
            }
            for &group in &options.key_share_groups {
                let mut share = vec![0u8; key_share_len(group)];
                random_bytes(&mut share)?;
                entries.extend_from_slice(&group.to_be_bytes());
                entries.extend_from_slice(&(share.len() as u16).to_be_bytes());
                entries.extend_from_slice(&share);
            }
            let mut out = (entries.len() as u16).to_be_bytes().to_vec();
            out.extend_from_slice(&entries);
            out
        }
        extension::COMPRESS_CERTIFICATE => {
            let algs: Vec<u8> = options
                .certificate_compression
                .iter()
                .flat_map(|a| a.wire().to_be_bytes())
                .collect();
            u8_vec(&algs)
        }
        extension::RECORD_SIZE_LIMIT => match options.record_size_limit {
            Some(limit) => limit.to_be_bytes().to_vec(),
            None => return Ok(None),
        },
        extension::ENCRYPTED_CLIENT_HELLO => {
            let mut out = vec![0u8];
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&1u16.to_be_bytes());
            let mut config_id = [0u8; 1];
            random_bytes(&mut config_id)?;
            out.push(config_id[0]);
            let mut enc = [0u8; 32];
            random_bytes(&mut enc)?;
            out.extend_from_slice(&(enc.len() as u16).to_be_bytes());
            out.extend_from_slice(&enc);
            let name_len = server_name.map(str::len).unwrap_or(0);
            let mut payload = vec![0u8; 144 + 32 * (name_len / 32)];
            random_bytes(&mut payload)?;
            out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
            out.extend_from_slice(&payload);
            out
        }
        extension::PRE_SHARED_KEY | extension::EARLY_DATA => return Ok(None),
        _ => Vec::new(),
    };
    Ok(Some(data))
}

/// Bounds-checked big-endian cursor.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], NetError> {
        if self.buf.len() < n {
            return Err(NetError::SslProtocolError);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, NetError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, NetError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Result<u32, NetError> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::tls::codepoints::{cipher, group, sigalg, version};

    fn sample_options(grease: bool) -> TlsOptions {
        TlsOptions::builder()
            .cipher_suites(&[cipher::TLS_AES_128_GCM_SHA256, cipher::ECDHE_ECDSA_AES128_GCM_SHA256])
            .extensions(&[
                extension::SERVER_NAME,
                extension::EXTENDED_MASTER_SECRET,
                extension::SUPPORTED_GROUPS,
                extension::ALPN,
                extension::SIGNATURE_ALGORITHMS,
                extension::KEY_SHARE,
                extension::SUPPORTED_VERSIONS,
                extension::PADDING,
            ])
            .supported_groups(&[group::X25519, group::SECP256R1])
            .key_share_groups(&[group::X25519])
            .signature_algorithms(&[sigalg::ECDSA_SECP256R1_SHA256, sigalg::RSA_PSS_RSAE_SHA256])
            .supported_versions(&[version::TLS_1_3, version::TLS_1_2])
            .grease(grease)
            .build()
    }

    #[test]
    fn test_extension_order_follows_descriptor() {
        let opts = sample_options(false);
        let hello = ClientHello::from_options(&opts, Some("example.com")).unwrap();
        let parsed = ClientHello::parse(&hello.encode()).unwrap();

        let mut expected: Vec<u16> = opts.extensions.clone();
        if parsed.extension(extension::PADDING).is_none() {
            expected.retain(|e| *e != extension::PADDING);
        }
        assert_eq!(parsed.extension_types(), expected);
        assert_eq!(parsed.cipher_suites, opts.cipher_suites);
        assert_eq!(parsed.supported_groups(), opts.supported_groups);
        assert_eq!(parsed.server_name().as_deref(), Some("example.com"));
        assert_eq!(parsed.alpn_protocols(), vec!["h2", "http/1.1"]);
        assert_eq!(parsed.key_share_groups(), vec![group::X25519]);
    }

    #[test]
    fn test_grease_brackets_extensions() {
        let hello = ClientHello::from_options(&sample_options(true), Some("example.com")).unwrap();
        let types = hello.extension_types();
        assert!(is_grease(types[0]));
        assert!(is_grease(hello.cipher_suites[0]));
        assert!(is_grease(hello.supported_groups()[0]));
        assert!(is_grease(hello.supported_versions()[0]));
        let greased: Vec<_> = types.iter().filter(|t| is_grease(**t)).collect();
        assert_eq!(greased.len(), 2);
        assert_ne!(greased[0], greased[1]);
    }

    #[test]
    fn test_no_sni_for_ip_hosts() {
        let hello = ClientHello::from_options(&sample_options(false), None).unwrap();
        assert!(hello.extension(extension::SERVER_NAME).is_none());
    }

    #[test]
    fn test_padding_lands_on_512() {
        let hello = ClientHello::from_options(&sample_options(false), Some("example.com")).unwrap();
        if hello.extension(extension::PADDING).is_some() {
            // record header (5) + handshake message (512)
            assert_eq!(hello.encode().len(), 5 + 0x200);
        }
    }

    #[test]
    fn test_parse_rejects_truncated() {
        let hello = ClientHello::from_options(&sample_options(false), Some("a.test")).unwrap();
        let bytes = hello.encode();
        assert!(ClientHello::parse(&bytes[..bytes.len() - 3]).is_err());
        assert!(ClientHello::parse(&[0x17, 3, 3, 0, 0]).is_err());
    }
}
