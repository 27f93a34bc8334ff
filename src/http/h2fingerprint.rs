//! HTTP/2 fingerprint descriptors.
//!
//! Anti-bot systems fingerprint HTTP/2 at several levels:
//! - SETTINGS parameters and the order they are sent in
//! - the connection WINDOW_UPDATE increment
//! - PRIORITY frames sent right after the preface
//! - pseudo-header order and priority data on HEADERS
//!
//! `H2Fingerprint` captures all of these. `akamai()` renders the
//! Akamai-style text form fingerprinting services report.

use std::fmt;

/// SETTINGS parameter identifiers (RFC 9113 6.5.2, RFC 8441, RFC 9218).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    HeaderTableSize,
    EnablePush,
    MaxConcurrentStreams,
    InitialWindowSize,
    MaxFrameSize,
    MaxHeaderListSize,
    EnableConnectProtocol,
    NoRfc7540Priorities,
    Unknown(u16),
}

impl SettingId {
    pub fn code(self) -> u16 {
        match self {
            SettingId::HeaderTableSize => 0x1,
            SettingId::EnablePush => 0x2,
            SettingId::MaxConcurrentStreams => 0x3,
            SettingId::InitialWindowSize => 0x4,
            SettingId::MaxFrameSize => 0x5,
            SettingId::MaxHeaderListSize => 0x6,
            SettingId::EnableConnectProtocol => 0x8,
            SettingId::NoRfc7540Priorities => 0x9,
            SettingId::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            0x1 => SettingId::HeaderTableSize,
            0x2 => SettingId::EnablePush,
            0x3 => SettingId::MaxConcurrentStreams,
            0x4 => SettingId::InitialWindowSize,
            0x5 => SettingId::MaxFrameSize,
            0x6 => SettingId::MaxHeaderListSize,
            0x8 => SettingId::EnableConnectProtocol,
            0x9 => SettingId::NoRfc7540Priorities,
            other => SettingId::Unknown(other),
        }
    }
}

/// One SETTINGS entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: SettingId,
    pub value: u32,
}

impl Setting {
    pub const fn new(id: SettingId, value: u32) -> Self {
        Self { id, value }
    }
}

/// Pseudo-header field identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoId {
    Method,
    Authority,
    Scheme,
    Path,
}

impl PseudoId {
    pub fn name(self) -> &'static str {
        match self {
            PseudoId::Method => ":method",
            PseudoId::Authority => ":authority",
            PseudoId::Scheme => ":scheme",
            PseudoId::Path => ":path",
        }
    }

    /// Single letter used in Akamai fingerprints.
    pub fn abbrev(self) -> char {
        match self {
            PseudoId::Method => 'm',
            PseudoId::Authority => 'a',
            PseudoId::Scheme => 's',
            PseudoId::Path => 'p',
        }
    }

    fn from_abbrev(c: char) -> Option<Self> {
        match c {
            'm' => Some(PseudoId::Method),
            'a' => Some(PseudoId::Authority),
            's' => Some(PseudoId::Scheme),
            'p' => Some(PseudoId::Path),
            _ => None,
        }
    }
}

/// Order of the four request pseudo-headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PseudoOrder([PseudoId; 4]);

impl PseudoOrder {
    pub const fn new(order: [PseudoId; 4]) -> Self {
        Self(order)
    }

    /// Parse the `m,a,s,p` form. Each pseudo-header must appear once.
    pub fn parse(text: &str) -> Option<Self> {
        let mut ids = Vec::with_capacity(4);
        for part in text.split(',') {
            let mut chars = part.trim().chars();
            let id = PseudoId::from_abbrev(chars.next()?)?;
            if chars.next().is_some() || ids.contains(&id) {
                return None;
            }
            ids.push(id);
        }
        let order: [PseudoId; 4] = ids.try_into().ok()?;
        Some(Self(order))
    }

    pub fn iter(&self) -> impl Iterator<Item = PseudoId> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for PseudoOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.abbrev().to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

/// Stream dependency carried by PRIORITY frames and prioritized HEADERS.
///
/// `weight` is the logical weight (1..=256); the wire byte is `weight - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDependency {
    pub dependency_id: u32,
    pub weight: u16,
    pub exclusive: bool,
}

impl StreamDependency {
    pub const fn new(dependency_id: u32, weight: u16, exclusive: bool) -> Self {
        Self {
            dependency_id,
            weight,
            exclusive,
        }
    }

    pub fn wire_weight(&self) -> u8 {
        self.weight.clamp(1, 256).saturating_sub(1) as u8
    }
}

/// A PRIORITY frame sent right after the connection preface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub stream_id: u32,
    pub dependency: StreamDependency,
}

impl Priority {
    pub const fn new(stream_id: u32, dependency: StreamDependency) -> Self {
        Self {
            stream_id,
            dependency,
        }
    }
}

/// RFC 9113 default for SETTINGS_INITIAL_WINDOW_SIZE and the connection window.
pub const DEFAULT_WINDOW_SIZE: u32 = 65_535;
/// RFC 9113 default for SETTINGS_HEADER_TABLE_SIZE.
pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4_096;
/// RFC 9113 default for SETTINGS_MAX_FRAME_SIZE.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;

/// The HTTP/2 half of a fingerprint descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H2Fingerprint {
    /// SETTINGS entries, in emission order.
    pub settings: Vec<Setting>,
    /// Connection WINDOW_UPDATE increment sent after SETTINGS. Zero sends none.
    pub connection_window_increment: u32,
    /// PRIORITY frames sent after the preface.
    pub priorities: Vec<Priority>,
    /// Priority block attached to every HEADERS frame.
    pub headers_priority: Option<StreamDependency>,
    pub pseudo_order: PseudoOrder,
}

impl Default for H2Fingerprint {
    fn default() -> Self {
        Self::chrome(131)
    }
}

impl H2Fingerprint {
    /// Chrome (and every Chromium browser).
    ///
    /// Chrome stopped advertising MAX_CONCURRENT_STREAMS in 116.
    pub fn chrome(major: u16) -> Self {
        let mut builder = Self::builder()
            .setting(SettingId::HeaderTableSize, 65_536)
            .setting(SettingId::EnablePush, 0);
        if major < 116 {
            builder = builder.setting(SettingId::MaxConcurrentStreams, 1_000);
        }
        builder
            .setting(SettingId::InitialWindowSize, 6_291_456)
            .setting(SettingId::MaxHeaderListSize, 262_144)
            .connection_window_increment(15_663_105)
            .headers_priority(StreamDependency::new(0, 256, true))
            .pseudo_order(PseudoOrder::new([
                PseudoId::Method,
                PseudoId::Authority,
                PseudoId::Scheme,
                PseudoId::Path,
            ]))
            .build()
    }

    /// Firefox. Versions before 117 build the classic priority tree.
    pub fn firefox(major: u16) -> Self {
        let mut builder = Self::builder().setting(SettingId::HeaderTableSize, 65_536);
        if major >= 117 {
            builder = builder.setting(SettingId::EnablePush, 0);
        }
        builder = builder
            .setting(SettingId::InitialWindowSize, 131_072)
            .setting(SettingId::MaxFrameSize, 16_384)
            .connection_window_increment(12_517_377)
            .pseudo_order(PseudoOrder::new([
                PseudoId::Method,
                PseudoId::Path,
                PseudoId::Authority,
                PseudoId::Scheme,
            ]));

        if major < 117 {
            for priority in firefox_priority_tree() {
                builder = builder.priority(priority);
            }
            builder.headers_priority(StreamDependency::new(13, 42, false)).build()
        } else {
            builder.headers_priority(StreamDependency::new(0, 42, false)).build()
        }
    }

    /// Safari on macOS and iOS.
    pub fn safari(major: u16) -> Self {
        let builder = Self::builder();
        let builder = match major {
            0..=16 => builder
                .setting(SettingId::InitialWindowSize, 4_194_304)
                .setting(SettingId::MaxConcurrentStreams, 100)
                .connection_window_increment(10_485_760)
                .pseudo_order(safari_legacy_pseudo_order()),
            17 => builder
                .setting(SettingId::EnablePush, 0)
                .setting(SettingId::InitialWindowSize, 4_194_304)
                .setting(SettingId::MaxConcurrentStreams, 100)
                .connection_window_increment(10_485_760)
                .pseudo_order(safari_legacy_pseudo_order()),
            _ => builder
                .setting(SettingId::EnablePush, 0)
                .setting(SettingId::MaxConcurrentStreams, 100)
                .setting(SettingId::InitialWindowSize, 2_097_152)
                .setting(SettingId::EnableConnectProtocol, 1)
                .setting(SettingId::NoRfc7540Priorities, 1)
                .connection_window_increment(10_420_225)
                .pseudo_order(PseudoOrder::new([
                    PseudoId::Method,
                    PseudoId::Scheme,
                    PseudoId::Authority,
                    PseudoId::Path,
                ])),
        };
        builder
            .headers_priority(StreamDependency::new(0, 255, false))
            .build()
    }

    /// OkHttp 3/4 on Android.
    pub fn okhttp() -> Self {
        Self::builder()
            .setting(SettingId::InitialWindowSize, 16_777_216)
            .connection_window_increment(16_711_681)
            .pseudo_order(PseudoOrder::new([
                PseudoId::Method,
                PseudoId::Path,
                PseudoId::Authority,
                PseudoId::Scheme,
            ]))
            .build()
    }

    /// Start from an empty descriptor (no SETTINGS, Chrome pseudo order).
    pub fn builder() -> H2FingerprintBuilder {
        H2FingerprintBuilder {
            inner: Self {
                settings: Vec::new(),
                connection_window_increment: 0,
                priorities: Vec::new(),
                headers_priority: None,
                pseudo_order: PseudoOrder::new([
                    PseudoId::Method,
                    PseudoId::Authority,
                    PseudoId::Scheme,
                    PseudoId::Path,
                ]),
            },
        }
    }

    pub fn setting(&self, id: SettingId) -> Option<u32> {
        self.settings.iter().find(|s| s.id == id).map(|s| s.value)
    }

    /// Stream receive window this client advertises.
    pub fn initial_window_size(&self) -> u32 {
        self.setting(SettingId::InitialWindowSize)
            .unwrap_or(DEFAULT_WINDOW_SIZE)
    }

    /// HPACK decoder table size this client advertises.
    pub fn header_table_size(&self) -> u32 {
        self.setting(SettingId::HeaderTableSize)
            .unwrap_or(DEFAULT_HEADER_TABLE_SIZE)
    }

    /// Connection receive window after the initial WINDOW_UPDATE.
    pub fn connection_window(&self) -> u32 {
        DEFAULT_WINDOW_SIZE.saturating_add(self.connection_window_increment)
    }

    /// Akamai text form: `settings|window|priorities|pseudo`.
    pub fn akamai(&self) -> String {
        let settings: Vec<String> = self
            .settings
            .iter()
            .map(|s| format!("{}:{}", s.id.code(), s.value))
            .collect();
        let priorities = if self.priorities.is_empty() {
            "0".to_string()
        } else {
            self.priorities
                .iter()
                .map(|p| {
                    format!(
                        "{}:{}:{}:{}",
                        p.stream_id,
                        p.dependency.exclusive as u8,
                        p.dependency.dependency_id,
                        p.dependency.weight
                    )
                })
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "{}|{}|{}|{}",
            settings.join(";"),
            self.connection_window_increment,
            priorities,
            self.pseudo_order
        )
    }
}

/// Builder for H2Fingerprint.
#[must_use]
#[derive(Debug)]
pub struct H2FingerprintBuilder {
    inner: H2Fingerprint,
}

impl H2FingerprintBuilder {
    /// Set a SETTINGS value. A repeated id keeps its first position.
    pub fn setting(mut self, id: SettingId, value: u32) -> Self {
        match self.inner.settings.iter_mut().find(|s| s.id == id) {
            Some(existing) => existing.value = value,
            None => self.inner.settings.push(Setting::new(id, value)),
        }
        self
    }

    pub fn connection_window_increment(mut self, increment: u32) -> Self {
        self.inner.connection_window_increment = increment;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.inner.priorities.push(priority);
        self
    }

    pub fn headers_priority(mut self, dependency: StreamDependency) -> Self {
        self.inner.headers_priority = Some(dependency);
        self
    }

    pub fn pseudo_order(mut self, order: PseudoOrder) -> Self {
        self.inner.pseudo_order = order;
        self
    }

    pub fn build(self) -> H2Fingerprint {
        self.inner
    }
}

fn safari_legacy_pseudo_order() -> PseudoOrder {
    PseudoOrder::new([
        PseudoId::Method,
        PseudoId::Scheme,
        PseudoId::Path,
        PseudoId::Authority,
    ])
}

fn firefox_priority_tree() -> [Priority; 6] {
    [
        Priority::new(3, StreamDependency::new(0, 201, false)),
        Priority::new(5, StreamDependency::new(0, 101, false)),
        Priority::new(7, StreamDependency::new(0, 1, false)),
        Priority::new(9, StreamDependency::new(7, 1, false)),
        Priority::new(11, StreamDependency::new(3, 1, false)),
        Priority::new(13, StreamDependency::new(0, 241, false)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_akamai() {
        assert_eq!(
            H2Fingerprint::chrome(120).akamai(),
            "1:65536;2:0;4:6291456;6:262144|15663105|0|m,a,s,p"
        );
        assert_eq!(
            H2Fingerprint::chrome(110).akamai(),
            "1:65536;2:0;3:1000;4:6291456;6:262144|15663105|0|m,a,s,p"
        );
    }

    #[test]
    fn test_firefox_akamai() {
        assert_eq!(
            H2Fingerprint::firefox(133).akamai(),
            "1:65536;2:0;4:131072;5:16384|12517377|0|m,p,a,s"
        );
        let old = H2Fingerprint::firefox(109);
        assert_eq!(old.priorities.len(), 6);
        assert!(old
            .akamai()
            .contains("|3:0:0:201,5:0:0:101,7:0:0:1,9:0:7:1,11:0:3:1,13:0:0:241|"));
    }

    #[test]
    fn test_safari_versions() {
        assert_eq!(
            H2Fingerprint::safari(17).akamai(),
            "2:0;4:4194304;3:100|10485760|0|m,s,p,a"
        );
        assert_eq!(
            H2Fingerprint::safari(18).akamai(),
            "2:0;3:100;4:2097152;8:1;9:1|10420225|0|m,s,a,p"
        );
    }

    #[test]
    fn test_window_defaults() {
        let fp = H2Fingerprint::safari(16);
        assert_eq!(fp.header_table_size(), DEFAULT_HEADER_TABLE_SIZE);
        assert_eq!(fp.initial_window_size(), 4_194_304);
        assert_eq!(fp.connection_window(), 65_535 + 10_485_760);
        assert_eq!(H2Fingerprint::builder().build().initial_window_size(), 65_535);
    }

    #[test]
    fn test_builder_keeps_first_position() {
        let fp = H2Fingerprint::builder()
            .setting(SettingId::InitialWindowSize, 1)
            .setting(SettingId::HeaderTableSize, 2)
            .setting(SettingId::InitialWindowSize, 3)
            .build();
        assert_eq!(fp.settings[0], Setting::new(SettingId::InitialWindowSize, 3));
        assert_eq!(fp.settings.len(), 2);
    }

    #[test]
    fn test_pseudo_order_parse() {
        let order = PseudoOrder::parse("m,p,a,s").unwrap();
        assert_eq!(order.to_string(), "m,p,a,s");
        assert_eq!(order.iter().next(), Some(PseudoId::Method));
        assert!(PseudoOrder::parse("m,m,a,s").is_none());
        assert!(PseudoOrder::parse("m,a,s").is_none());
        assert!(PseudoOrder::parse("m,a,s,x").is_none());
    }

    #[test]
    fn test_wire_weight() {
        assert_eq!(StreamDependency::new(0, 256, true).wire_weight(), 255);
        assert_eq!(StreamDependency::new(0, 1, false).wire_weight(), 0);
        assert_eq!(StreamDependency::new(0, 0, false).wire_weight(), 0);
    }

    #[test]
    fn test_setting_codes_roundtrip() {
        for code in [1u16, 2, 3, 4, 5, 6, 8, 9, 0x42] {
            assert_eq!(SettingId::from_code(code).code(), code);
        }
    }
}
