//! The interception point the host calls when it needs its content.
//!
//! Every call answers from memory: either the published overlay or
//! [`Provision::Passthrough`], telling the host to resolve its own content.
//! Nothing here fetches, reads files, or waits on a background sync.

use crate::cache::{CacheEntry, OverlayCache};
use crate::document::Entry;
use std::collections::HashSet;
use std::sync::Arc;

/// Answer to a host content request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provision<T> {
    /// Serve this instead of the host's own content.
    Overlay(T),
    /// Let the host's default lookup run.
    Passthrough,
}

impl<T> Provision<T> {
    pub fn is_overlay(&self) -> bool {
        matches!(self, Provision::Overlay(_))
    }

    pub fn overlay(self) -> Option<T> {
        match self {
            Provision::Overlay(value) => Some(value),
            Provision::Passthrough => None,
        }
    }

    /// The overlay value, or whatever the host would have produced.
    pub fn or_else(self, host_default: impl FnOnce() -> T) -> T {
        match self {
            Provision::Overlay(value) => value,
            Provision::Passthrough => host_default(),
        }
    }
}

impl<T> From<Option<T>> for Provision<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Provision::Passthrough, Provision::Overlay)
    }
}

/// Cheap to clone; hand one to every host hook.
#[derive(Debug, Clone)]
pub struct InterceptionGate {
    cache: Arc<OverlayCache>,
    disabled: Arc<HashSet<String>>,
}

impl InterceptionGate {
    pub fn new(cache: Arc<OverlayCache>, disabled: impl IntoIterator<Item = String>) -> Self {
        Self {
            cache,
            disabled: Arc::new(disabled.into_iter().collect()),
        }
    }

    fn entry_for(&self, artifact: &str) -> Option<Arc<CacheEntry>> {
        if self.disabled.contains(artifact) {
            return None;
        }
        self.cache.slot(artifact)?.current()
    }

    /// Whole-document substitution.
    pub fn provide_document(&self, artifact: &str) -> Provision<Arc<CacheEntry>> {
        self.entry_for(artifact).into()
    }

    /// Substitution of one keyed entry.
    pub fn provide(&self, artifact: &str, key: &str) -> Provision<Entry> {
        self.entry_for(artifact)
            .and_then(|entry| entry.entry(key).cloned())
            .into()
    }

    /// Substitution of one field value.
    pub fn provide_field(&self, artifact: &str, key: &str, field: &str) -> Provision<String> {
        self.entry_for(artifact)
            .and_then(|entry| entry.field(key, field).map(str::to_string))
            .into()
    }
}
