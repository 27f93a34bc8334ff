//! HPACK header compression (RFC 7541).
//!
//! The encoder indexes every field it sends (the way browsers do) and
//! Huffman-codes a string only when that is shorter.

use super::huffman;
use crate::base::neterror::NetError;
use bytes::{BufMut, BytesMut};
use std::collections::VecDeque;

const STATIC_TABLE: [(&str, &str); 61] = [
    (":authority", ""),
    (":method", "GET"),
    (":method", "POST"),
    (":path", "/"),
    (":path", "/index.html"),
    (":scheme", "http"),
    (":scheme", "https"),
    (":status", "200"),
    (":status", "204"),
    (":status", "206"),
    (":status", "304"),
    (":status", "400"),
    (":status", "404"),
    (":status", "500"),
    ("accept-charset", ""),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("accept", ""),
    ("access-control-allow-origin", ""),
    ("age", ""),
    ("allow", ""),
    ("authorization", ""),
    ("cache-control", ""),
    ("content-disposition", ""),
    ("content-encoding", ""),
    ("content-language", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("cookie", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("host", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("link", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("refresh", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("strict-transport-security", ""),
    ("transfer-encoding", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("www-authenticate", ""),
];

const ENTRY_OVERHEAD: usize = 32;

/// Fields never added to the table and sent as never-indexed literals.
fn is_sensitive(name: &str) -> bool {
    matches!(name, "authorization" | "proxy-authorization")
}

#[derive(Debug)]
struct DynamicTable {
    entries: VecDeque<(String, String)>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict(0);
    }

    fn evict(&mut self, incoming: usize) {
        while self.size + incoming > self.max_size {
            match self.entries.pop_back() {
                Some((n, v)) => self.size -= n.len() + v.len() + ENTRY_OVERHEAD,
                None => break,
            }
        }
    }

    fn insert(&mut self, name: String, value: String) {
        let entry_size = name.len() + value.len() + ENTRY_OVERHEAD;
        self.evict(entry_size);
        if entry_size <= self.max_size {
            self.size += entry_size;
            self.entries.push_front((name, value));
        }
    }

    /// 1-based HPACK index (static entries first).
    fn get(&self, index: usize) -> Option<(&str, &str)> {
        if index == 0 {
            return None;
        }
        if index <= STATIC_TABLE.len() {
            return Some(STATIC_TABLE[index - 1]);
        }
        self.entries
            .get(index - STATIC_TABLE.len() - 1)
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Best match: `(index, value_matches)`.
    fn find(&self, name: &str, value: &str) -> Option<(usize, bool)> {
        let mut name_only = None;
        for (i, (n, v)) in STATIC_TABLE.iter().enumerate() {
            if *n == name {
                if *v == value {
                    return Some((i + 1, true));
                }
                name_only.get_or_insert(i + 1);
            }
        }
        for (i, (n, v)) in self.entries.iter().enumerate() {
            if n == name {
                let index = STATIC_TABLE.len() + i + 1;
                if v == value {
                    return Some((index, true));
                }
                name_only.get_or_insert(index);
            }
        }
        name_only.map(|i| (i, false))
    }
}

fn encode_int(value: usize, prefix_bits: u8, first_byte: u8, dst: &mut BytesMut) {
    let max_prefix = (1usize << prefix_bits) - 1;
    if value < max_prefix {
        dst.put_u8(first_byte | value as u8);
        return;
    }
    dst.put_u8(first_byte | max_prefix as u8);
    let mut rest = value - max_prefix;
    while rest >= 128 {
        dst.put_u8((rest % 128) as u8 | 0x80);
        rest /= 128;
    }
    dst.put_u8(rest as u8);
}

fn encode_str(value: &str, dst: &mut BytesMut) {
    let bytes = value.as_bytes();
    let huff_len = huffman::encoded_len(bytes);
    if huff_len < bytes.len() {
        encode_int(huff_len, 7, 0x80, dst);
        let mut out = Vec::with_capacity(huff_len);
        huffman::encode(bytes, &mut out);
        dst.extend_from_slice(&out);
    } else {
        encode_int(bytes.len(), 7, 0, dst);
        dst.extend_from_slice(bytes);
    }
}

/// HPACK encoder for one connection's request direction.
#[derive(Debug)]
pub struct Encoder {
    table: DynamicTable,
    pending_size_update: Option<usize>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl Encoder {
    pub fn new(max_size: usize) -> Self {
        Self {
            table: DynamicTable::new(max_size),
            pending_size_update: None,
        }
    }

    /// Apply the peer's SETTINGS_HEADER_TABLE_SIZE. The change is signalled
    /// at the start of the next header block.
    pub fn set_max_table_size(&mut self, size: usize) {
        if size != self.table.max_size {
            self.table.set_max_size(size);
            self.pending_size_update = Some(size);
        }
    }

    /// Encode one header block. Names must already be lower-case.
    pub fn encode<'a, I>(&mut self, headers: I, dst: &mut BytesMut)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if let Some(size) = self.pending_size_update.take() {
            encode_int(size, 5, 0x20, dst);
        }

        for (name, value) in headers {
            if is_sensitive(name) {
                match self.table.find(name, value) {
                    Some((index, _)) => encode_int(index, 4, 0x10, dst),
                    None => {
                        dst.put_u8(0x10);
                        encode_str(name, dst);
                    }
                }
                encode_str(value, dst);
                continue;
            }

            match self.table.find(name, value) {
                Some((index, true)) => encode_int(index, 7, 0x80, dst),
                Some((index, false)) => {
                    encode_int(index, 6, 0x40, dst);
                    encode_str(value, dst);
                    self.table.insert(name.to_string(), value.to_string());
                }
                None => {
                    dst.put_u8(0x40);
                    encode_str(name, dst);
                    encode_str(value, dst);
                    self.table.insert(name.to_string(), value.to_string());
                }
            }
        }
    }
}

/// HPACK decoder for one connection's response direction.
#[derive(Debug)]
pub struct Decoder {
    table: DynamicTable,
    /// Upper bound we advertised in SETTINGS_HEADER_TABLE_SIZE.
    max_allowed: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(4096)
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn byte(&mut self) -> Result<u8, NetError> {
        let b = *self.buf.get(self.pos).ok_or(NetError::Http2CompressionError)?;
        self.pos += 1;
        Ok(b)
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn int(&mut self, prefix_bits: u8) -> Result<usize, NetError> {
        let max_prefix = (1usize << prefix_bits) - 1;
        let mut value = (self.byte()? as usize) & max_prefix;
        if value < max_prefix {
            return Ok(value);
        }
        let mut shift = 0u32;
        loop {
            let b = self.byte()?;
            if shift > 28 {
                return Err(NetError::Http2CompressionError);
            }
            value += ((b & 0x7f) as usize) << shift;
            shift += 7;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
    }

    fn string(&mut self) -> Result<String, NetError> {
        let huffman_coded = self.peek().ok_or(NetError::Http2CompressionError)? & 0x80 != 0;
        let len = self.int(7)?;
        let end = self.pos.checked_add(len).ok_or(NetError::Http2CompressionError)?;
        let raw = self.buf.get(self.pos..end).ok_or(NetError::Http2CompressionError)?;
        self.pos = end;
        let bytes = if huffman_coded {
            huffman::decode(raw)?
        } else {
            raw.to_vec()
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Decoder {
    pub fn new(max_size: usize) -> Self {
        Self {
            table: DynamicTable::new(max_size),
            max_allowed: max_size,
        }
    }

    /// Decode a complete header block into `(name, value)` pairs.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<(String, String)>, NetError> {
        let mut cur = Cursor { buf: block, pos: 0 };
        let mut fields = Vec::new();

        while let Some(first) = cur.peek() {
            if first & 0x80 != 0 {
                let index = cur.int(7)?;
                let (n, v) = self.table.get(index).ok_or(NetError::Http2CompressionError)?;
                fields.push((n.to_string(), v.to_string()));
            } else if first & 0xc0 == 0x40 {
                let (name, value) = self.literal(&mut cur, 6)?;
                self.table.insert(name.clone(), value.clone());
                fields.push((name, value));
            } else if first & 0xe0 == 0x20 {
                let size = cur.int(5)?;
                if size > self.max_allowed {
                    return Err(NetError::Http2CompressionError);
                }
                self.table.set_max_size(size);
            } else {
                // without indexing (0000) or never indexed (0001)
                fields.push(self.literal(&mut cur, 4)?);
            }
        }
        Ok(fields)
    }

    fn literal(&self, cur: &mut Cursor<'_>, prefix_bits: u8) -> Result<(String, String), NetError> {
        let index = cur.int(prefix_bits)?;
        let name = if index == 0 {
            cur.string()?
        } else {
            self.table
                .get(index)
                .map(|(n, _)| n.to_string())
                .ok_or(NetError::Http2CompressionError)?
        };
        let value = cur.string()?;
        Ok((name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        let s: String = s.split_whitespace().collect();
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn pairs(fields: &[(String, String)]) -> Vec<(&str, &str)> {
        fields.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect()
    }

    #[test]
    fn test_rfc_c3_decode_without_huffman() {
        let mut decoder = Decoder::default();
        let first = decoder
            .decode(&hex("8286 8441 0f77 7777 2e65 7861 6d70 6c65 2e63 6f6d"))
            .unwrap();
        assert_eq!(
            pairs(&first),
            vec![
                (":method", "GET"),
                (":scheme", "http"),
                (":path", "/"),
                (":authority", "www.example.com"),
            ]
        );
        assert_eq!(decoder.table.size, 57);

        let second = decoder.decode(&hex("8286 84be 5808 6e6f 2d63 6163 6865")).unwrap();
        assert_eq!(pairs(&second)[3], (":authority", "www.example.com"));
        assert_eq!(pairs(&second)[4], ("cache-control", "no-cache"));
        assert_eq!(decoder.table.size, 110);
    }

    #[test]
    fn test_rfc_c4_encode_with_huffman() {
        let mut encoder = Encoder::default();
        let mut dst = BytesMut::new();
        encoder.encode(
            [
                (":method", "GET"),
                (":scheme", "http"),
                (":path", "/"),
                (":authority", "www.example.com"),
            ],
            &mut dst,
        );
        assert_eq!(&dst[..], &hex("8286 8441 8cf1 e3c2 e5f2 3a6b a0ab 90f4 ff")[..]);

        let mut dst = BytesMut::new();
        encoder.encode(
            [
                (":method", "GET"),
                (":scheme", "http"),
                (":path", "/"),
                (":authority", "www.example.com"),
                ("cache-control", "no-cache"),
            ],
            &mut dst,
        );
        assert_eq!(&dst[..], &hex("8286 84be 5886 a8eb 1064 9cbf")[..]);
    }

    #[test]
    fn test_encoder_decoder_agree() {
        let headers = [
            (":method", "POST"),
            (":authority", "example.org"),
            (":scheme", "https"),
            (":path", "/upload?x=1"),
            ("user-agent", "Mozilla/5.0"),
            ("authorization", "Bearer secret"),
            ("x-custom", "\u{e9}t\u{e9}"),
        ];
        let mut encoder = Encoder::default();
        let mut decoder = Decoder::default();
        for _ in 0..3 {
            let mut dst = BytesMut::new();
            encoder.encode(headers.iter().copied(), &mut dst);
            let decoded = decoder.decode(&dst).unwrap();
            assert_eq!(pairs(&decoded), headers.to_vec());
        }
    }

    #[test]
    fn test_table_size_update() {
        let mut encoder = Encoder::default();
        let mut decoder = Decoder::default();
        encoder.set_max_table_size(0);
        let mut dst = BytesMut::new();
        encoder.encode([("x-a", "1")], &mut dst);
        assert_eq!(dst[0], 0x20);
        assert_eq!(pairs(&decoder.decode(&dst).unwrap()), vec![("x-a", "1")]);
        assert_eq!(decoder.table.entries.len(), 0);
    }

    #[test]
    fn test_size_update_above_advertised_is_error() {
        let mut decoder = Decoder::new(100);
        let mut dst = BytesMut::new();
        encode_int(4096, 5, 0x20, &mut dst);
        assert_eq!(decoder.decode(&dst), Err(NetError::Http2CompressionError));
    }

    #[test]
    fn test_bad_index() {
        let mut decoder = Decoder::default();
        assert_eq!(decoder.decode(&[0xff, 0x00]), Err(NetError::Http2CompressionError));
        assert_eq!(decoder.decode(&[0x80]), Err(NetError::Http2CompressionError));
    }

    #[test]
    fn test_integer_encoding() {
        // RFC 7541 C.1.2: 1337 with a 5-bit prefix.
        let mut dst = BytesMut::new();
        encode_int(1337, 5, 0, &mut dst);
        assert_eq!(&dst[..], &[0x1f, 0x9a, 0x0a]);
    }
}
