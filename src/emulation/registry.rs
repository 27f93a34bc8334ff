//! Process-wide profile registry.
//!
//! Built once on first use from the family tables and read-only afterwards.
//! Every (profile, OS) descriptor is materialized up front so lookups only
//! clone an `Arc`.

use super::profiles::{BrowserProfile, Chrome, Edge, Firefox, OkHttp, Safari, SafariIos};
use super::{Emulation, ImpersonateOs};
use crate::base::neterror::NetError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

struct Entry {
    native: ImpersonateOs,
    variants: HashMap<ImpersonateOs, Arc<Emulation>>,
}

struct Registry {
    entries: HashMap<&'static str, Entry>,
    ids: Vec<&'static str>,
}

impl Registry {
    fn load() -> Self {
        let mut registry = Registry {
            entries: HashMap::new(),
            ids: Vec::new(),
        };
        registry.register::<Chrome>();
        registry.register::<Edge>();
        registry.register::<Firefox>();
        registry.register::<Safari>();
        registry.register::<SafariIos>();
        registry.register::<OkHttp>();
        registry.ids.sort_unstable();
        tracing::debug!(profiles = registry.ids.len(), "profile registry loaded");
        registry
    }

    fn register<P: BrowserProfile>(&mut self) {
        for &profile in P::all() {
            let mut variants = HashMap::with_capacity(ImpersonateOs::ALL.len());
            for os in ImpersonateOs::ALL {
                variants.insert(os, Arc::new(profile.build(os)));
            }
            self.ids.push(profile.id());
            self.entries.insert(
                profile.id(),
                Entry {
                    native: profile.native_os(),
                    variants,
                },
            );
        }
    }

    fn get(&self, id: &str, os: Option<ImpersonateOs>) -> Result<Arc<Emulation>, NetError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| NetError::UnknownProfile(id.to_string()))?;
        let os = os.unwrap_or(entry.native);
        entry
            .variants
            .get(&os)
            .cloned()
            .ok_or_else(|| NetError::UnknownProfile(format!("{}/{}", id, os)))
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::load);

/// Descriptor for `profile_id` on the profile's native OS.
pub fn lookup(profile_id: &str) -> Result<Arc<Emulation>, NetError> {
    REGISTRY.get(profile_id, None)
}

/// Descriptor for `profile_id` presenting as `os`.
pub fn lookup_with_os(profile_id: &str, os: ImpersonateOs) -> Result<Arc<Emulation>, NetError> {
    REGISTRY.get(profile_id, Some(os))
}

/// Every registered profile id, sorted.
pub fn list_profiles() -> Vec<&'static str> {
    REGISTRY.ids.clone()
}
