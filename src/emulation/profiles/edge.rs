//! Edge browser profiles.
//!
//! Edge is Chromium-based: TLS, HTTP/2 and header order are Chrome's for the
//! same major. Only the brand and `User-Agent` differ.

use super::chrome::{chrome_tls_options, chromium_headers};
use super::{ua_platform, BrowserProfile};
use crate::emulation::{Emulation, EmulationFactory, Http1Options, ImpersonateOs};
use crate::http::h2fingerprint::H2Fingerprint;

/// Edge browser versions for emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Edge {
    V99,
    V101,
    V122,
    V127,
    V131,
}

impl Default for Edge {
    fn default() -> Self {
        Edge::V131
    }
}

impl Edge {
    pub fn major(self) -> u16 {
        match self {
            Edge::V99 => 99,
            Edge::V101 => 101,
            Edge::V122 => 122,
            Edge::V127 => 127,
            Edge::V131 => 131,
        }
    }
}

impl BrowserProfile for Edge {
    fn all() -> &'static [Self] {
        &[Edge::V99, Edge::V101, Edge::V122, Edge::V127, Edge::V131]
    }

    fn id(self) -> &'static str {
        match self {
            Edge::V99 => "edge_99",
            Edge::V101 => "edge_101",
            Edge::V122 => "edge_122",
            Edge::V127 => "edge_127",
            Edge::V131 => "edge_131",
        }
    }

    fn native_os(self) -> ImpersonateOs {
        ImpersonateOs::Windows
    }

    fn build(self, os: ImpersonateOs) -> Emulation {
        let major = self.major();
        Emulation::builder()
            .profile_id(self.id())
            .os(os)
            .tls_options(chrome_tls_options(major))
            .http1_options(Http1Options::default())
            .http2_options(H2Fingerprint::chrome(major))
            .headers(chromium_headers("Microsoft Edge", major, os, &edge_user_agent(major, os)))
            .build()
    }
}

impl EmulationFactory for Edge {
    fn emulation(self) -> Emulation {
        self.build(self.native_os())
    }
}

fn edge_user_agent(major: u16, os: ImpersonateOs) -> String {
    match os {
        ImpersonateOs::Ios => format!(
            "Mozilla/5.0 ({}) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 EdgiOS/{}.0.0.0 Mobile/15E148 Safari/605.1.15",
            ua_platform(os),
            major
        ),
        ImpersonateOs::Android => format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{m}.0.0.0 Mobile Safari/537.36 EdgA/{m}.0.0.0",
            ua_platform(os),
            m = major
        ),
        _ => format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{m}.0.0.0 Safari/537.36 Edg/{m}.0.0.0",
            ua_platform(os),
            m = major
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_brand_and_ua() {
        let emulation = Edge::V122.emulation();
        assert!(emulation.user_agent().unwrap().ends_with("Edg/122.0.0.0"));
        assert!(emulation
            .headers
            .get("sec-ch-ua")
            .unwrap()
            .contains("\"Microsoft Edge\";v=\"122\""));
    }

    #[test]
    fn test_edge_shares_chrome_tls() {
        assert_eq!(Edge::V131.emulation().tls_options, chrome_tls_options(131));
    }
}
