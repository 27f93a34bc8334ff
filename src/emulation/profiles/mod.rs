//! Browser profiles for emulation.
//!
//! Each family (Chrome, Edge, Firefox, Safari, Safari on iOS, OkHttp) is an
//! enum of versions with one parameterized table builder behind it.

pub mod chrome;
pub mod edge;
pub mod firefox;
pub mod okhttp;
pub mod safari;

pub use chrome::Chrome;
pub use edge::Edge;
pub use firefox::Firefox;
pub use okhttp::OkHttp;
pub use safari::{Safari, SafariIos};

use crate::emulation::{Emulation, ImpersonateOs};

/// A versioned member of a browser family.
pub trait BrowserProfile: Copy + Sized + 'static {
    /// Every version the family registers.
    fn all() -> &'static [Self];

    /// Registry id, e.g. `chrome_120`.
    fn id(self) -> &'static str;

    /// OS the browser presents when none is requested.
    fn native_os(self) -> ImpersonateOs;

    /// Descriptor presenting as `os`.
    fn build(self, os: ImpersonateOs) -> Emulation;
}

/// Platform token inside a desktop or Android `User-Agent`.
pub(crate) fn ua_platform(os: ImpersonateOs) -> &'static str {
    match os {
        ImpersonateOs::Windows => "Windows NT 10.0; Win64; x64",
        ImpersonateOs::MacOs => "Macintosh; Intel Mac OS X 10_15_7",
        ImpersonateOs::Linux => "X11; Linux x86_64",
        ImpersonateOs::Android => "Linux; Android 10; K",
        ImpersonateOs::Ios => "iPhone; CPU iPhone OS 17_5 like Mac OS X",
    }
}

/// `sec-ch-ua-platform` value.
pub(crate) fn ch_platform(os: ImpersonateOs) -> &'static str {
    match os {
        ImpersonateOs::Windows => "\"Windows\"",
        ImpersonateOs::MacOs => "\"macOS\"",
        ImpersonateOs::Linux => "\"Linux\"",
        ImpersonateOs::Android => "\"Android\"",
        ImpersonateOs::Ios => "\"iOS\"",
    }
}

/// `sec-ch-ua-mobile` value.
pub(crate) fn ch_mobile(os: ImpersonateOs) -> &'static str {
    if os.is_mobile() {
        "?1"
    } else {
        "?0"
    }
}
