//! Redirect handling.
//!
//! A client follows up to 20 redirects by default, the same limit
//! Chromium uses. Each chain tracks the (method, URL) pairs it visited; a
//! repeat fails with `RedirectCycleDetected`.

use crate::base::neterror::NetError;
use crate::http::orderedheaders::OrderedHeaderMap;
use http::Method;
use url::Url;

/// Chromium's redirect limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Headers that must not leak to another origin.
const SENSITIVE_HEADERS: [&str; 5] = [
    "authorization",
    "cookie",
    "cookie2",
    "proxy-authorization",
    "www-authenticate",
];

/// Headers describing a body that a redirect dropped.
const BODY_HEADERS: [&str; 4] = [
    "content-type",
    "content-length",
    "content-encoding",
    "transfer-encoding",
];

/// Whether and how far redirects are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectPolicy {
    max: usize,
    follow: bool,
    referer: bool,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::limited(DEFAULT_MAX_REDIRECTS)
    }
}

impl RedirectPolicy {
    /// Follow at most `max` redirects.
    pub fn limited(max: usize) -> Self {
        Self {
            max,
            follow: true,
            referer: true,
        }
    }

    /// Return 3xx responses to the caller untouched.
    pub fn none() -> Self {
        Self {
            max: 0,
            follow: false,
            referer: true,
        }
    }

    /// Send a `Referer` naming the previous URL on each hop.
    pub fn with_referer(mut self, referer: bool) -> Self {
        self.referer = referer;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.follow
    }

    pub fn max_redirects(&self) -> usize {
        self.max
    }

    pub fn referer(&self) -> bool {
        self.referer
    }
}

/// The request a redirect turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    pub url: Url,
    pub method: Method,
    /// Whether the original body is resent.
    pub keep_body: bool,
}

/// Per-request redirect state.
#[derive(Debug)]
pub struct RedirectChain {
    policy: RedirectPolicy,
    https_only: bool,
    visited: Vec<(Method, Url)>,
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

impl RedirectChain {
    pub fn new(policy: RedirectPolicy, https_only: bool, method: &Method, start: &Url) -> Self {
        Self {
            policy,
            https_only,
            visited: vec![(method.clone(), without_fragment(start))],
        }
    }

    /// Number of redirects followed so far.
    pub fn hops(&self) -> usize {
        self.visited.len() - 1
    }

    /// Decide the next hop for a response. `Ok(None)` means the response is
    /// final: not a redirect, no `Location`, or redirects are disabled.
    pub fn next(
        &mut self,
        status: u16,
        location: Option<&str>,
        current: &Url,
        method: &Method,
    ) -> Result<Option<RedirectHop>, NetError> {
        if !self.policy.follow || !is_redirect(status) {
            return Ok(None);
        }
        let Some(location) = location else {
            return Ok(None);
        };

        let mut next = current.join(location.trim()).map_err(|_| NetError::InvalidRedirect)?;
        if !matches!(next.scheme(), "http" | "https") {
            return Err(NetError::InvalidRedirect);
        }
        if self.https_only && next.scheme() != "https" {
            return Err(NetError::DisallowedUrlScheme);
        }
        if next.fragment().is_none() {
            next.set_fragment(current.fragment());
        }

        let (next_method, keep_body) = redirect_method(status, method);
        let key = (next_method.clone(), without_fragment(&next));
        if self.visited.contains(&key) {
            tracing::debug!(url = %next, "redirect cycle detected");
            return Err(NetError::RedirectCycleDetected);
        }
        if self.hops() >= self.policy.max {
            return Err(NetError::TooManyRedirects);
        }
        self.visited.push(key);

        tracing::debug!(
            status,
            from = %current,
            to = %next,
            method = %next_method,
            hop = self.hops(),
            "following redirect"
        );
        Ok(Some(RedirectHop {
            url: next,
            method: next_method,
            keep_body,
        }))
    }
}

/// Method and body treatment after a redirect: 301/302/303 turn into GET
/// without a body (HEAD stays HEAD), 307/308 keep both.
pub fn redirect_method(status: u16, method: &Method) -> (Method, bool) {
    match status {
        307 | 308 => (method.clone(), true),
        301 | 302 if *method != Method::POST => (method.clone(), true),
        _ if *method == Method::HEAD => (Method::HEAD, false),
        _ => (Method::GET, false),
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// The `Referer` value for a hop from `previous` to `next`. None on an
/// https to http downgrade.
pub fn make_referer(next: &Url, previous: &Url) -> Option<String> {
    if next.scheme() == "http" && previous.scheme() == "https" {
        return None;
    }
    let mut referer = previous.clone();
    referer.set_username("").ok()?;
    referer.set_password(None).ok()?;
    referer.set_fragment(None);
    Some(referer.into())
}

/// Rewrite the caller headers for the next hop.
pub fn prepare_headers(
    headers: &mut OrderedHeaderMap,
    hop: &RedirectHop,
    previous: &Url,
    referer: bool,
) {
    if !same_origin(&hop.url, previous) {
        for name in SENSITIVE_HEADERS {
            headers.remove(name);
        }
    }
    if !hop.keep_body {
        for name in BODY_HEADERS {
            headers.remove(name);
        }
    }
    if referer {
        match make_referer(&hop.url, previous) {
            Some(value) => {
                let _ = headers.insert("Referer", &value);
            }
            None => headers.remove("referer"),
        }
    }
}
