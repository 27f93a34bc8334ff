//! Plain-data client configuration.
//!
//! [`ClientConfig`] deserializes from snake_case keys and maps onto
//! [`ClientBuilder`] setters one for one.

use crate::base::neterror::NetError;
use crate::client::{Client, ClientBuilder};
use crate::emulation::ImpersonateOs;
use crate::http::redirect::RedirectPolicy;
use crate::socket::pool::{DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_PER_HOST};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_timeout() -> f64 {
    30.0
}

fn default_max_redirects() -> usize {
    crate::http::redirect::DEFAULT_MAX_REDIRECTS
}

fn default_pool_max_per_host() -> usize {
    DEFAULT_MAX_PER_HOST
}

fn default_pool_idle_timeout() -> f64 {
    DEFAULT_IDLE_TIMEOUT.as_secs_f64()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Profile id, e.g. `chrome_120`.
    pub impersonate: String,
    #[serde(default)]
    pub impersonate_os: Option<String>,
    #[serde(default = "default_true")]
    pub verify: bool,
    /// Seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default)]
    pub proxy: Option<String>,
    /// Default headers, in document order.
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub headers: Vec<(String, String)>,
    /// `[user]` or `[user, password]`.
    #[serde(default)]
    pub auth: Option<Vec<String>>,
    #[serde(default)]
    pub auth_bearer: Option<String>,
    /// Default query parameters, in document order.
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub params: Vec<(String, String)>,
    #[serde(default = "default_true")]
    pub referer: bool,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default)]
    pub ca_cert_file: Option<PathBuf>,
    #[serde(default)]
    pub https_only: bool,
    #[serde(default)]
    pub http2_only: bool,
    #[serde(default = "default_pool_max_per_host")]
    pub pool_max_per_host: usize,
    /// Seconds.
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout: f64,
}

/// A string map kept as pairs in the order the document lists them. Header
/// and query order are visible on the wire.
fn ordered_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{MapAccess, Visitor};
    use std::fmt;

    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of string to string")
        }

        fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, String>()? {
                pairs.push(entry);
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor)
}

fn seconds(name: &str, value: f64) -> Result<Duration, NetError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| NetError::InvalidConfig(format!("{} must be a non-negative number of seconds", name)))
}

/// Split `[user, password?]` into its parts.
pub(crate) fn split_auth(auth: &[String]) -> Result<(String, Option<String>), NetError> {
    match auth {
        [user] => Ok((user.clone(), None)),
        [user, pass] => Ok((user.clone(), Some(pass.clone()))),
        _ => Err(NetError::InvalidConfig("auth takes [user] or [user, password]".to_string())),
    }
}

impl ClientConfig {
    /// Config with defaults for everything but the profile.
    pub fn new(impersonate: impl Into<String>) -> Self {
        Self {
            impersonate: impersonate.into(),
            impersonate_os: None,
            verify: true,
            timeout: default_timeout(),
            proxy: None,
            headers: Vec::new(),
            auth: None,
            auth_bearer: None,
            params: Vec::new(),
            referer: true,
            follow_redirects: true,
            max_redirects: default_max_redirects(),
            ca_cert_file: None,
            https_only: false,
            http2_only: false,
            pool_max_per_host: default_pool_max_per_host(),
            pool_idle_timeout: default_pool_idle_timeout(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json).map_err(|e| NetError::InvalidConfig(e.to_string()))
    }

    /// The equivalent builder. Fails on malformed values; the profile itself
    /// is resolved by [`ClientBuilder::build`].
    pub fn into_builder(self) -> Result<ClientBuilder, NetError> {
        let mut builder = Client::builder()
            .impersonate(self.impersonate)
            .verify(self.verify)
            .timeout(seconds("timeout", self.timeout)?)
            .referer(self.referer)
            .https_only(self.https_only)
            .http2_only(self.http2_only)
            .pool_max_per_host(self.pool_max_per_host)
            .pool_idle_timeout(seconds("pool_idle_timeout", self.pool_idle_timeout)?)
            .params(self.params)
            .redirect(if self.follow_redirects {
                RedirectPolicy::limited(self.max_redirects)
            } else {
                RedirectPolicy::none()
            });

        if let Some(os) = &self.impersonate_os {
            builder = builder.impersonate_os(os.parse::<ImpersonateOs>()?);
        }
        if let Some(proxy) = self.proxy {
            builder = builder.proxy(proxy);
        }
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if let Some(auth) = &self.auth {
            let (user, pass) = split_auth(auth)?;
            builder = builder.basic_auth(user, pass);
        }
        if let Some(token) = self.auth_bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(path) = self.ca_cert_file {
            builder = builder.ca_cert_file(path);
        }
        Ok(builder)
    }
}

impl Client {
    /// Build a client from plain data.
    pub fn from_config(config: ClientConfig) -> Result<Client, NetError> {
        config.into_builder()?.build()
    }
}
