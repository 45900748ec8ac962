//! Named boolean predicates over a principal.
//!
//! Menu conditions and view requirements refer to capabilities by key
//! (`nollesystemet.UserProfile.can_see_some_user`). The registry is filled
//! at startup; a key that is not registered is an error, never `false`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::principal::Principal;

/// A predicate evaluated against an authenticated principal.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn check(&self, principal: &Principal) -> anyhow::Result<bool>;
}

/// Adapter for synchronous closures.
struct FnCapability<F>(F);

#[async_trait]
impl<F> Capability for FnCapability<F>
where
    F: Fn(&Principal) -> bool + Send + Sync,
{
    async fn check(&self, principal: &Principal) -> anyhow::Result<bool> {
        Ok((self.0)(principal))
    }
}

/// Capability table keyed by dotted path.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability, replacing any previous one under `key`.
    pub fn register(&mut self, key: impl Into<String>, capability: impl Capability + 'static) {
        self.entries.insert(key.into(), Arc::new(capability));
    }

    /// Register a synchronous predicate.
    pub fn register_fn<F>(&mut self, key: impl Into<String>, predicate: F)
    where
        F: Fn(&Principal) -> bool + Send + Sync + 'static,
    {
        self.register(key, FnCapability(predicate));
    }

    pub fn resolve(&self, key: &str) -> Option<&Arc<dyn Capability>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
