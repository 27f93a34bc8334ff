use crate::base::neterror::NetError;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::str::FromStr;

/// An ordered, duplicate-preserving header list that keeps the literal
/// name casing it was given.
///
/// Used both for profile defaults (where order and casing are part of the
/// fingerprint) and for response headers (where the received casing is
/// reported back).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedHeaderMap {
    headers: Vec<(String, String)>,
}

fn validate(name: &str, value: &str) -> Result<(), NetError> {
    HeaderName::from_str(name).map_err(|_| NetError::InvalidHeader)?;
    HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;
    Ok(())
}

impl OrderedHeaderMap {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            headers: Vec::with_capacity(capacity),
        }
    }

    /// Set a header. Replaces the first case-insensitive match in place and
    /// drops any later duplicates, else appends.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        validate(name, value)?;
        match self
            .headers
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(idx) => {
                self.headers[idx].1 = value.to_string();
                let mut i = idx + 1;
                while i < self.headers.len() {
                    if self.headers[i].0.eq_ignore_ascii_case(name) {
                        self.headers.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Add a header, keeping existing values of the same name.
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        validate(name, value)?;
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    /// Append without validation. For header lines already parsed off the wire.
    pub(crate) fn push_raw(&mut self, name: String, value: String) {
        self.headers.push((name, value));
    }

    pub(crate) fn last_value_mut(&mut self) -> Option<&mut String> {
        self.headers.last_mut().map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// First value for `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Headers as `(name, value)` with original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Merge caller headers into profile defaults.
    ///
    /// Profile entries keep their position. A caller header whose name
    /// matches a profile entry replaces its value there; extra caller values
    /// of that name follow it. Unmatched caller headers are appended in
    /// caller order. With `caller_casing` the caller's spelling of a matched
    /// name replaces the profile's (HTTP/1.1 only, where casing is visible).
    pub fn merge_profile(
        profile: &OrderedHeaderMap,
        caller: &OrderedHeaderMap,
        caller_casing: bool,
    ) -> OrderedHeaderMap {
        struct Slot {
            name: String,
            values: Vec<String>,
            overridden: bool,
        }

        let mut slots: Vec<Slot> = Vec::with_capacity(profile.len() + caller.len());
        for (name, value) in &profile.headers {
            match slots.iter_mut().find(|s| s.name.eq_ignore_ascii_case(name)) {
                Some(slot) => slot.values.push(value.clone()),
                None => slots.push(Slot {
                    name: name.clone(),
                    values: vec![value.clone()],
                    overridden: false,
                }),
            }
        }

        for (name, value) in &caller.headers {
            match slots.iter_mut().find(|s| s.name.eq_ignore_ascii_case(name)) {
                Some(slot) => {
                    if !slot.overridden {
                        slot.values.clear();
                        slot.overridden = true;
                        if caller_casing {
                            slot.name = name.clone();
                        }
                    }
                    slot.values.push(value.clone());
                }
                None => slots.push(Slot {
                    name: name.clone(),
                    values: vec![value.clone()],
                    overridden: true,
                }),
            }
        }

        let mut merged = OrderedHeaderMap::with_capacity(slots.len());
        for slot in slots {
            for value in slot.values {
                merged.headers.push((slot.name.clone(), value));
            }
        }
        merged
    }

    /// Rewrite every name to Title-Case.
    pub fn to_title_case(&self) -> OrderedHeaderMap {
        OrderedHeaderMap {
            headers: self
                .headers
                .iter()
                .map(|(n, v)| (title_case(n), v.clone()))
                .collect(),
        }
    }

    /// Convert to an `http::HeaderMap`. Casing is lost, order within a name
    /// is kept. Invalid entries are skipped.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value))
            {
                map.append(name, value);
            }
        }
        map
    }
}

/// "content-type" -> "Content-Type".
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

const GREASEY_CHARS: [&str; 11] = [" ", "(", ":", "-", ".", "/", ")", ";", "=", "?", "_"];
const GREASED_VERSIONS: [&str; 3] = ["8", "99", "24"];
const BRAND_ORDERS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// Generate the `sec-ch-ua` brand list for a Chromium browser.
///
/// The GREASE brand, its version and the brand order all derive from the
/// major version, the way Chromium seeds them.
pub fn generate_sec_ch_ua(brand: &str, major: u16) -> String {
    let seed = major as usize;
    let grease_brand = format!(
        "Not{}A{}Brand",
        GREASEY_CHARS[seed % GREASEY_CHARS.len()],
        GREASEY_CHARS[(seed + 1) % GREASEY_CHARS.len()]
    );
    let grease_version = GREASED_VERSIONS[seed % GREASED_VERSIONS.len()];
    let order = BRAND_ORDERS[seed % BRAND_ORDERS.len()];

    let mut list = [String::new(), String::new(), String::new()];
    list[order[0]] = format!("\"{}\";v=\"{}\"", grease_brand, grease_version);
    list[order[1]] = format!("\"Chromium\";v=\"{}\"", major);
    list[order[2]] = format!("\"{}\";v=\"{}\"", brand, major);
    list.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> OrderedHeaderMap {
        let mut headers = OrderedHeaderMap::new();
        for (n, v) in pairs {
            headers.append(n, v).unwrap();
        }
        headers
    }

    #[test]
    fn test_insert_and_get() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("Content-Type", "application/json").unwrap();
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut headers = map(&[("Host", "a"), ("Accept", "*/*"), ("host", "b")]);
        headers.insert("HOST", "c").unwrap();
        let names: Vec<_> = headers.iter().collect();
        assert_eq!(names, vec![("Host", "c"), ("Accept", "*/*")]);
    }

    #[test]
    fn test_append_keeps_duplicates() {
        let headers = map(&[("Set-Cookie", "a=1"), ("set-cookie", "b=2")]);
        let values: Vec<_> = headers.get_all("SET-COOKIE").collect();
        assert_eq!(values, vec!["a=1", "b=2"]);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_remove_header() {
        let mut headers = map(&[("X-Custom", "value"), ("x-custom", "two")]);
        headers.remove("X-CUSTOM");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_invalid_header_name() {
        let mut headers = OrderedHeaderMap::new();
        assert_eq!(headers.insert("Invalid Header", "value"), Err(NetError::InvalidHeader));
        assert_eq!(headers.append("Valid", "invalid\nvalue"), Err(NetError::InvalidHeader));
    }

    #[test]
    fn test_merge_profile_keeps_profile_position() {
        let profile = map(&[
            ("sec-ch-ua", "x"),
            ("User-Agent", "profile-ua"),
            ("Accept", "text/html"),
            ("Accept-Language", "en-US"),
        ]);
        let caller = map(&[("X-Trace", "1"), ("accept", "application/json")]);
        let merged = OrderedHeaderMap::merge_profile(&profile, &caller, false);
        let got: Vec<_> = merged.iter().collect();
        assert_eq!(
            got,
            vec![
                ("sec-ch-ua", "x"),
                ("User-Agent", "profile-ua"),
                ("Accept", "application/json"),
                ("Accept-Language", "en-US"),
                ("X-Trace", "1"),
            ]
        );
    }

    #[test]
    fn test_merge_profile_caller_casing() {
        let profile = map(&[("User-Agent", "a"), ("Accept", "b")]);
        let caller = map(&[("user-agent", "mine")]);
        let h1 = OrderedHeaderMap::merge_profile(&profile, &caller, true);
        assert_eq!(h1.iter().next(), Some(("user-agent", "mine")));
        let h2 = OrderedHeaderMap::merge_profile(&profile, &caller, false);
        assert_eq!(h2.iter().next(), Some(("User-Agent", "mine")));
    }

    #[test]
    fn test_merge_profile_duplicate_caller_values() {
        let profile = map(&[("Accept", "b"), ("Accept-Encoding", "gzip")]);
        let caller = map(&[("X-A", "1"), ("accept", "one"), ("X-A", "2"), ("Accept", "two")]);
        let merged = OrderedHeaderMap::merge_profile(&profile, &caller, false);
        let got: Vec<_> = merged.iter().collect();
        assert_eq!(
            got,
            vec![
                ("Accept", "one"),
                ("Accept", "two"),
                ("Accept-Encoding", "gzip"),
                ("X-A", "1"),
                ("X-A", "2"),
            ]
        );
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("user-agent"), "User-Agent");
        assert_eq!(title_case("SEC-CH-UA"), "Sec-Ch-Ua");
        assert_eq!(title_case("dnt"), "Dnt");
        let headers = map(&[("accept-encoding", "gzip")]).to_title_case();
        assert_eq!(headers.iter().next(), Some(("Accept-Encoding", "gzip")));
    }

    #[test]
    fn test_to_header_map() {
        let headers = map(&[("A", "1"), ("a", "2"), ("B", "3")]);
        let hm = headers.to_header_map();
        assert_eq!(hm.get_all("a").iter().count(), 2);
        assert_eq!(hm.len(), 3);
    }

    #[test]
    fn test_sec_ch_ua_matches_chrome() {
        assert_eq!(
            generate_sec_ch_ua("Google Chrome", 120),
            "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\""
        );
        assert_eq!(
            generate_sec_ch_ua("Google Chrome", 124),
            "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\""
        );
        assert_eq!(
            generate_sec_ch_ua("Google Chrome", 131),
            "\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""
        );
    }

    #[test]
    fn test_sec_ch_ua_edge() {
        let ua = generate_sec_ch_ua("Microsoft Edge", 120);
        assert!(ua.contains("\"Microsoft Edge\";v=\"120\""));
    }
}
