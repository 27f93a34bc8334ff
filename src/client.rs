//! HTTP Client with builder pattern.
//!
//! Provides a high-level API for making requests that look like they came
//! from a specific browser.
//!
//! # Example
//!
//! ```rust,no_run
//! use impersonet::Client;
//!
//! # async fn run() -> Result<(), impersonet::NetError> {
//! let client = Client::builder()
//!     .impersonate("chrome_120")
//!     .build()?;
//!
//! let resp = client.get("https://example.com").send().await?;
//! println!("{} {}", resp.status_code(), resp.text().await?);
//! # Ok(())
//! # }
//! ```

use crate::base::neterror::NetError;
use crate::emulation::{self, Emulation, EmulationFactory, ImpersonateOs};
use crate::http::multipart::Form;
use crate::http::redirect::{self, RedirectChain, RedirectPolicy};
use crate::http::requestbody::RequestBody;
use crate::http::transaction::{HttpNetworkTransaction, PreparedRequest, TransactionContext};
use crate::http::{OrderedHeaderMap, Response};
use crate::socket::pool::{SessionPool, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_PER_HOST, DEFAULT_MAX_TOTAL};
use crate::socket::proxy::{ProxySettings, ProxyType};
use crate::socket::tls::{AlpnProtocol, TlsConnector, TlsOptions, VerifyPolicy};
use base64::Engine;
use bytes::Bytes;
use http::Method;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;
use zeroize::Zeroizing;

/// Env var naming a PEM CA bundle used when none is configured.
pub const CA_BUNDLE_ENV: &str = "IMPERSONET_CA_BUNDLE";

/// Redirect bodies up to this size are drained so the session can be reused.
const DRAIN_LIMIT: u64 = 64 * 1024;

/// Request methods the client accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Options,
    Delete,
    Post,
    Put,
    Patch,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
        }
    }
}

/// Per-request options in plain data form.
///
/// Only one body source is used, in the order `content`, `data`, `json`,
/// `files`. `auth` and `auth_bearer` override the client defaults; basic
/// auth wins when both are present.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Option<Vec<(String, String)>>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub content: Option<Bytes>,
    pub data: Option<Vec<(String, String)>>,
    #[cfg(feature = "json")]
    pub json: Option<serde_json::Value>,
    /// Field name and path of each file to upload as multipart.
    pub files: Vec<(String, PathBuf)>,
    pub auth: Option<(String, Option<String>)>,
    pub auth_bearer: Option<String>,
    pub timeout: Option<Duration>,
}

struct ClientInner {
    emulation: Arc<Emulation>,
    tls: TlsConnector,
    proxy: Option<ProxySettings>,
    proxy_tls: Option<TlsConnector>,
    pool: SessionPool,
    headers: OrderedHeaderMap,
    auth: Option<(String, Option<Zeroizing<String>>)>,
    auth_bearer: Option<Zeroizing<String>>,
    params: Vec<(String, String)>,
    timeout: Option<Duration>,
    redirect: RedirectPolicy,
    https_only: bool,
    http2_only: bool,
}

/// HTTP Client for making requests.
///
/// Use [`Client::builder()`] to configure and create a client. Clones share
/// the session pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("profile", &self.inner.emulation.profile_id)
            .field("os", &self.inner.emulation.os)
            .field("proxy", &self.inner.proxy.as_ref().map(|p| p.url.as_str()))
            .field("timeout", &self.inner.timeout)
            .field("redirect", &self.inner.redirect)
            .finish_non_exhaustive()
    }
}

fn basic_auth_value(user: &str, pass: Option<&str>) -> Zeroizing<String> {
    let credentials = Zeroizing::new(format!("{}:{}", user, pass.unwrap_or("")));
    Zeroizing::new(format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes())
    ))
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The resolved browser profile.
    pub fn emulation(&self) -> &Emulation {
        &self.inner.emulation
    }

    /// Start building a GET request.
    pub fn get<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Start building a POST request.
    pub fn post<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Start building a PUT request.
    pub fn put<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Start building a DELETE request.
    pub fn delete<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Start building a HEAD request.
    pub fn head<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Start building a PATCH request.
    pub fn patch<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// Start building an OPTIONS request.
    pub fn options<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::OPTIONS, url)
    }

    /// Start building a request with any method.
    pub fn request<M: Into<Method>, U: AsRef<str>>(&self, method: M, url: U) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            method: method.into(),
            url: url.as_ref().to_string(),
            options: RequestOptions::default(),
            form: None,
            error: None,
        }
    }

    /// Send a request described entirely by plain data.
    pub async fn execute(&self, method: HttpMethod, url: &str, options: RequestOptions) -> Result<Response, NetError> {
        self.send(method.into(), url, options, None).await
    }

    fn context(&self) -> TransactionContext<'_> {
        let inner = &*self.inner;
        TransactionContext {
            pool: &inner.pool,
            emulation: &inner.emulation,
            tls: &inner.tls,
            proxy: inner.proxy.as_ref(),
            proxy_tls: inner.proxy_tls.as_ref(),
            http2_only: inner.http2_only,
        }
    }

    fn prepare_url(&self, url: &str, params: Option<&[(String, String)]>) -> Result<Url, NetError> {
        let mut url = Url::parse(url).map_err(|_| NetError::InvalidUrl)?;
        match url.scheme() {
            "https" => {}
            "http" if self.inner.https_only => return Err(NetError::DisallowedUrlScheme),
            "http" => {}
            _ => return Err(NetError::UnknownUrlScheme),
        }
        if url.host_str().is_none() {
            return Err(NetError::InvalidUrl);
        }
        let params = params.unwrap_or(&self.inner.params);
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
        form: Option<Form>,
    ) -> Result<Response, NetError> {
        let inner = &*self.inner;
        let url = self.prepare_url(url, options.params.as_deref())?;

        // Per-request names replace the client defaults; repeats are kept.
        let mut headers = inner.headers.clone();
        for (name, _) in &options.headers {
            headers.remove(name);
        }
        for (name, value) in &options.headers {
            headers.append(name, value)?;
        }
        if !options.cookies.is_empty() {
            let cookie = options
                .cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert("Cookie", &cookie)?;
        }

        let body = Self::build_body(&options, form).await?;
        if let Some(content_type) = body.content_type() {
            if !headers.contains("content-type") {
                headers.insert("Content-Type", content_type)?;
            }
        }

        let authorization = match (&options.auth, &inner.auth) {
            (Some((user, pass)), _) => Some(basic_auth_value(user, pass.as_deref())),
            (None, Some((user, pass))) => Some(basic_auth_value(user, pass.as_ref().map(|p| p.as_str()))),
            (None, None) => options
                .auth_bearer
                .as_deref()
                .or(inner.auth_bearer.as_ref().map(|t| t.as_str()))
                .map(|token| Zeroizing::new(format!("Bearer {}", token))),
        };
        if let Some(value) = authorization {
            headers.insert("Authorization", &value)?;
        }

        let timeout = options.timeout.or(inner.timeout);
        let deadline = timeout.map(|t| Instant::now() + t);

        let mut request = PreparedRequest {
            method,
            url,
            headers,
            body: body.bytes(),
        };
        let mut chain = RedirectChain::new(inner.redirect, inner.https_only, &request.method, &request.url);
        loop {
            let remaining = match deadline {
                Some(deadline) => Some(
                    deadline
                        .checked_duration_since(Instant::now())
                        .filter(|d| !d.is_zero())
                        .ok_or(NetError::TimedOut)?,
                ),
                None => None,
            };
            let response = HttpNetworkTransaction::new(self.context(), &request, remaining)
                .start()
                .await?;

            let location = response.header("location").map(str::to_string);
            let hop = chain.next(
                response.status_code(),
                location.as_deref(),
                &request.url,
                &request.method,
            )?;
            let Some(hop) = hop else {
                return Ok(response);
            };

            if response.content_length().is_some_and(|n| n <= DRAIN_LIMIT) {
                let _ = response.bytes().await;
            }
            redirect::prepare_headers(&mut request.headers, &hop, &request.url, inner.redirect.referer());
            if !hop.keep_body {
                request.body = Bytes::new();
            }
            request.method = hop.method;
            request.url = hop.url;
        }
    }

    /// Pick the body source.
    async fn build_body(options: &RequestOptions, form: Option<Form>) -> Result<RequestBody, NetError> {
        if let Some(content) = &options.content {
            return Ok(RequestBody::raw(content.clone()));
        }
        if let Some(data) = &options.data {
            return RequestBody::form(data);
        }
        #[cfg(feature = "json")]
        if let Some(json) = &options.json {
            return RequestBody::json(json);
        }
        if options.files.is_empty() && form.is_none() {
            return Ok(RequestBody::empty());
        }
        let mut form = form.unwrap_or_default();
        for (name, path) in &options.files {
            form = form.file(name, path).await?;
        }
        Ok(RequestBody::multipart(form))
    }
}

/// Builder for creating a [`Client`].
#[derive(Debug)]
#[must_use]
pub struct ClientBuilder {
    impersonate: Option<String>,
    impersonate_os: Option<ImpersonateOs>,
    emulation: Option<Emulation>,
    verify: bool,
    ca_cert_file: Option<PathBuf>,
    proxy: Option<String>,
    timeout: Option<Duration>,
    headers: OrderedHeaderMap,
    auth: Option<(String, Option<Zeroizing<String>>)>,
    auth_bearer: Option<Zeroizing<String>>,
    params: Vec<(String, String)>,
    redirect: RedirectPolicy,
    referer: bool,
    https_only: bool,
    http2_only: bool,
    pool_max_per_host: usize,
    pool_idle_timeout: Duration,
    error: Option<NetError>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            impersonate: None,
            impersonate_os: None,
            emulation: None,
            verify: true,
            ca_cert_file: None,
            proxy: None,
            timeout: None,
            headers: OrderedHeaderMap::new(),
            auth: None,
            auth_bearer: None,
            params: Vec::new(),
            redirect: RedirectPolicy::default(),
            referer: true,
            https_only: false,
            http2_only: false,
            pool_max_per_host: DEFAULT_MAX_PER_HOST,
            pool_idle_timeout: DEFAULT_IDLE_TIMEOUT,
            error: None,
        }
    }
}

impl ClientBuilder {
    /// Browser profile id, e.g. `chrome_120`. Resolved at [`build`](Self::build).
    pub fn impersonate(mut self, profile_id: impl Into<String>) -> Self {
        self.impersonate = Some(profile_id.into());
        self
    }

    /// Present as a different OS than the profile's native one.
    pub fn impersonate_os(mut self, os: ImpersonateOs) -> Self {
        self.impersonate_os = Some(os);
        self
    }

    /// Use a hand-built emulation instead of a registered profile.
    pub fn emulation<E: EmulationFactory>(mut self, emulation: E) -> Self {
        self.emulation = Some(emulation.emulation());
        self
    }

    /// Verify certificate chains and hostnames. On by default.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// PEM bundle of trusted roots, replacing the system store.
    pub fn ca_cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_file = Some(path.into());
        self
    }

    /// Proxy URL: `http://`, `https://`, `socks5://` or `socks5h://`.
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    /// Default per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a default header sent with every request.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Err(e) = self.headers.insert(name, value) {
            self.error.get_or_insert(e);
        }
        self
    }

    pub fn basic_auth(mut self, user: impl Into<String>, pass: Option<String>) -> Self {
        self.auth = Some((user.into(), pass.map(Zeroizing::new)));
        self
    }

    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.auth_bearer = Some(Zeroizing::new(token.into()));
        self
    }

    /// Default query parameters, used when a request sets none.
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params = params.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn redirect(mut self, policy: RedirectPolicy) -> Self {
        self.redirect = policy;
        self
    }

    /// Send `Referer` on redirects. On by default.
    pub fn referer(mut self, enabled: bool) -> Self {
        self.referer = enabled;
        self
    }

    /// Refuse `http://` URLs, including redirect targets.
    pub fn https_only(mut self, enabled: bool) -> Self {
        self.https_only = enabled;
        self
    }

    /// Only speak HTTP/2: TLS must negotiate h2, cleartext uses prior knowledge.
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.http2_only = enabled;
        self
    }

    pub fn pool_max_per_host(mut self, max: usize) -> Self {
        self.pool_max_per_host = max;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    fn resolve_emulation(&mut self) -> Result<Arc<Emulation>, NetError> {
        if let Some(emulation) = self.emulation.take() {
            return Ok(Arc::new(emulation));
        }
        let id = self
            .impersonate
            .as_deref()
            .ok_or_else(|| NetError::InvalidConfig("no impersonate profile set".to_string()))?;
        match self.impersonate_os {
            Some(os) => emulation::lookup_with_os(id, os),
            None => emulation::lookup(id),
        }
    }

    /// Build the client. Fails before any I/O on an unknown profile or an
    /// invalid proxy, header or CA bundle.
    pub fn build(mut self) -> Result<Client, NetError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let emulation = self.resolve_emulation()?;

        let ca_file = self
            .ca_cert_file
            .or_else(|| std::env::var_os(CA_BUNDLE_ENV).map(PathBuf::from));
        let policy = VerifyPolicy {
            verify: self.verify,
            ca_file,
        };
        let tls = TlsConnector::new(emulation.tls_options(), &policy)?;

        let proxy = match self.proxy {
            Some(url) => Some(ProxySettings::parse(&url)?),
            None => ProxySettings::from_env(),
        };
        let proxy_tls = match &proxy {
            Some(p) if p.proxy_type() == ProxyType::Https => {
                let options = TlsOptions::builder()
                    .alpn_protocols(&[AlpnProtocol::HTTP1])
                    .build();
                Some(TlsConnector::new(&options, &policy)?)
            }
            _ => None,
        };

        tracing::debug!(
            profile = %emulation.profile_id,
            os = %emulation.os,
            verify = policy.verify,
            proxy = proxy.as_ref().map(|p| p.url.as_str()),
            "client built"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                emulation,
                tls,
                proxy,
                proxy_tls,
                pool: SessionPool::new(self.pool_max_per_host, DEFAULT_MAX_TOTAL, self.pool_idle_timeout),
                headers: self.headers,
                auth: self.auth,
                auth_bearer: self.auth_bearer,
                params: self.params,
                timeout: self.timeout,
                redirect: self.redirect.with_referer(self.referer),
                https_only: self.https_only,
                http2_only: self.http2_only,
            }),
        })
    }
}

/// Builder for a single request.
#[derive(Debug)]
#[must_use]
pub struct RequestBuilder {
    client: Client,
    method: Method,
    url: String,
    options: RequestOptions,
    form: Option<Form>,
    error: Option<NetError>,
}

impl RequestBuilder {
    /// Add a header. Replaces a client default of the same name; calling it
    /// again with the same name sends both values.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.push((name.into(), value.into()));
        self
    }

    /// Query parameters appended to the URL. Replaces the client defaults.
    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options
            .params
            .get_or_insert_with(Vec::new)
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a cookie to this request's `Cookie` header.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.cookies.push((name.into(), value.into()));
        self
    }

    /// Raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.options.content = Some(body.into());
        self
    }

    /// URL-encoded form body.
    pub fn form<I, K, V>(mut self, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options.data = Some(data.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// JSON body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> Self {
        match serde_json::to_value(json) {
            Ok(value) => self.options.json = Some(value),
            Err(e) => {
                self.error
                    .get_or_insert(NetError::InvalidConfig(format!("json body: {}", e)));
            }
        }
        self
    }

    /// Multipart body. Files added with [`file`](Self::file) are appended.
    pub fn multipart(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    /// Upload the file at `path` as a multipart field.
    pub fn file(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.options.files.push((name.into(), path.into()));
        self
    }

    pub fn basic_auth(mut self, user: impl Into<String>, pass: Option<String>) -> Self {
        self.options.auth = Some((user.into(), pass));
        self
    }

    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.options.auth_bearer = Some(token.into());
        self
    }

    /// Per-call timeout, overriding the client default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Send the request. Resolves once the response headers are in.
    pub async fn send(self) -> Result<Response, NetError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.client.send(self.method, &self.url, self.options, self.form).await
    }
}
