//! `multipart/form-data` bodies, framed the way Chromium and WebKit submit
//! forms.
//!
//! ```ignore
//! use impersonet::http::multipart::{Form, Part};
//!
//! let form = Form::new()
//!     .text("username", "user123")
//!     .part("avatar", Part::file("me.png").await?);
//! let content_type = form.content_type();
//! let body = form.into_body();
//! ```

use crate::base::neterror::NetError;
use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

const OCTET_STREAM: &str = "application/octet-stream";
const BOUNDARY_PREFIX: &str = "----WebKitFormBoundary";
const BOUNDARY_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789AB";

/// An ordered set of form fields.
#[derive(Debug)]
pub struct Form {
    boundary: String,
    fields: Vec<Field>,
}

#[derive(Debug)]
struct Field {
    /// `Content-Disposition` and optional `Content-Type` lines, CRLF separated.
    head: String,
    data: Bytes,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    pub fn new() -> Self {
        Self {
            boundary: generate_boundary(),
            fields: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Append a plain text field.
    pub fn text<N, V>(self, name: N, value: V) -> Self
    where
        N: AsRef<str>,
        V: Into<Cow<'static, str>>,
    {
        self.part(name, Part::text(value))
    }

    /// Append a part. Fields keep insertion order and duplicate names.
    pub fn part<N: AsRef<str>>(mut self, name: N, part: Part) -> Self {
        self.fields.push(Field {
            head: part.head(name.as_ref()),
            data: part.data,
        });
        self
    }

    /// Append a file read from disk.
    pub async fn file<N, P>(self, name: N, path: P) -> Result<Self, NetError>
    where
        N: AsRef<str>,
        P: AsRef<Path>,
    {
        let part = Part::file(path).await?;
        Ok(self.part(name, part))
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact size of the encoded body.
    pub fn content_length(&self) -> usize {
        if self.fields.is_empty() {
            return 0;
        }
        let delimiter = 2 + self.boundary.len() + 2;
        let fields: usize = self
            .fields
            .iter()
            .map(|f| delimiter + f.head.len() + 4 + f.data.len() + 2)
            .sum();
        fields + 2 + self.boundary.len() + 4
    }

    pub fn into_body(self) -> Bytes {
        if self.fields.is_empty() {
            return Bytes::new();
        }
        let mut out = BytesMut::with_capacity(self.content_length());
        for field in &self.fields {
            put_delimiter(&mut out, &self.boundary);
            out.put_slice(b"\r\n");
            out.put_slice(field.head.as_bytes());
            out.put_slice(b"\r\n\r\n");
            out.put_slice(&field.data);
            out.put_slice(b"\r\n");
        }
        put_delimiter(&mut out, &self.boundary);
        out.put_slice(b"--\r\n");
        out.freeze()
    }
}

fn put_delimiter(out: &mut BytesMut, boundary: &str) {
    out.put_slice(b"--");
    out.put_slice(boundary.as_bytes());
}

/// One field value with its optional file name and media type.
#[derive(Debug, Clone)]
pub struct Part {
    data: Bytes,
    content_type: Option<String>,
    file_name: Option<String>,
}

impl Part {
    /// A text value. Browsers send text fields without a Content-Type.
    pub fn text<V: Into<Cow<'static, str>>>(value: V) -> Self {
        let value = match value.into() {
            Cow::Borrowed(s) => Bytes::from_static(s.as_bytes()),
            Cow::Owned(s) => Bytes::from(s),
        };
        Self::bytes(value)
    }

    pub fn bytes<B: Into<Bytes>>(data: B) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            file_name: None,
        }
    }

    /// Read a file into a part named after the path's final component,
    /// typed `application/octet-stream`.
    pub async fn file<P: AsRef<Path>>(path: P) -> Result<Self, NetError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| NetError::FileReadFailed(format!("{}: {}", path.display(), e)))?;
        let part = Self::bytes(data).content_type(OCTET_STREAM);
        Ok(match path.file_name() {
            Some(name) => part.file_name(name.to_string_lossy()),
            None => part,
        })
    }

    pub fn content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the file name. A file part without an explicit type is sent as
    /// `application/octet-stream`, as browsers do.
    pub fn file_name<S: Into<String>>(mut self, name: S) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn head(&self, name: &str) -> String {
        let mut head = format!("Content-Disposition: form-data; name=\"{}\"", escape_name(name));
        if let Some(file_name) = &self.file_name {
            head.push_str("; filename=\"");
            head.push_str(&escape_name(file_name));
            head.push('"');
        }
        let content_type = self
            .content_type
            .as_deref()
            .or_else(|| self.file_name.as_ref().map(|_| OCTET_STREAM));
        if let Some(content_type) = content_type {
            head.push_str("\r\nContent-Type: ");
            head.push_str(content_type);
        }
        head
    }
}

/// Percent-escape `"`, CR and LF in a field or file name (WHATWG form
/// encoding). Everything else goes out verbatim.
fn escape_name(name: &str) -> Cow<'_, str> {
    if !name.contains(['"', '\r', '\n']) {
        return Cow::Borrowed(name);
    }
    let mut escaped = String::with_capacity(name.len() + 6);
    for c in name.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

static BOUNDARY_FALLBACK: AtomicU64 = AtomicU64::new(0x5eed_f00d_cafe_b0a7);

/// `----WebKitFormBoundary` followed by 16 random alphanumerics.
fn generate_boundary() -> String {
    let mut random = [0u8; 16];
    if boring::rand::rand_bytes(&mut random).is_err() {
        // splitmix64 over a process counter
        let mut x = BOUNDARY_FALLBACK.fetch_add(0x9e37_79b9_7f4a_7c15, Ordering::Relaxed);
        for chunk in random.chunks_mut(8) {
            x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            chunk.copy_from_slice(&(x ^ (x >> 31)).to_le_bytes());
        }
    }
    let mut boundary = String::with_capacity(BOUNDARY_PREFIX.len() + random.len());
    boundary.push_str(BOUNDARY_PREFIX);
    boundary.extend(random.iter().map(|b| BOUNDARY_ALPHABET[(b & 0x3f) as usize] as char));
    boundary
}
