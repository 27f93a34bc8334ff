//! Outgoing request bodies.
//!
//! Bodies are fully buffered: framing needs the exact length up front for
//! `Content-Length` and for HTTP/2 flow control.

use crate::base::neterror::NetError;
use crate::http::multipart::Form;
use bytes::Bytes;
use serde::Serialize;
use std::borrow::Cow;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
#[cfg(feature = "json")]
const JSON: &str = "application/json";

/// A buffered body plus the `Content-Type` its encoding implies.
///
/// The type is a default: a caller-supplied `Content-Type` header wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestBody {
    data: Bytes,
    content_type: Option<Cow<'static, str>>,
}

impl RequestBody {
    /// No body.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Raw bytes with no implied type.
    pub fn raw(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
        }
    }

    /// `application/x-www-form-urlencoded` from any serializable map or
    /// sequence of pairs.
    pub fn form<T: Serialize + ?Sized>(data: &T) -> Result<Self, NetError> {
        let encoded = serde_urlencoded::to_string(data)
            .map_err(|e| NetError::InvalidConfig(format!("form body: {}", e)))?;
        Ok(Self::raw(encoded).with_type(FORM_URLENCODED))
    }

    #[cfg(feature = "json")]
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, NetError> {
        let encoded = serde_json::to_vec(value)
            .map_err(|e| NetError::InvalidConfig(format!("json body: {}", e)))?;
        Ok(Self::raw(encoded).with_type(JSON))
    }

    pub fn multipart(form: Form) -> Self {
        let content_type = form.content_type();
        Self::raw(form.into_body()).with_type(content_type)
    }

    fn with_type(mut self, content_type: impl Into<Cow<'static, str>>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The body bytes. Cheap: `Bytes` is reference counted.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

impl From<Bytes> for RequestBody {
    fn from(data: Bytes) -> Self {
        Self::raw(data)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(data: Vec<u8>) -> Self {
        Self::raw(data)
    }
}

impl From<String> for RequestBody {
    fn from(data: String) -> Self {
        Self::raw(data)
    }
}

impl From<&'static str> for RequestBody {
    fn from(data: &'static str) -> Self {
        Self::raw(data)
    }
}

impl From<Form> for RequestBody {
    fn from(form: Form) -> Self {
        Self::multipart(form)
    }
}
