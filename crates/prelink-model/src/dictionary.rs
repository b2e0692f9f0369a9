//! The global type dictionary.
//!
//! Maps (tier, name) to defined types and tracks which types each tier has
//! *initiated*: registered as resolvable without loading because an ancestor
//! tier defines them. Lookup delegates up the tier chain, mirroring loader
//! delegation.
//!
//! All entry points take the dictionary lock internally and hold it briefly.
//! Other threads may be defining types concurrently while the post-hoc
//! initiation scan runs, which is why the lock exists at all; the build-time
//! collection pass itself runs on a single quiesced thread.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::tier::LoaderTier;
use crate::universe::TypeId;

#[derive(Default)]
struct Inner {
    /// (defining tier, name) -> type.
    defined: HashMap<(LoaderTier, String), TypeId>,
    /// Per tier: name -> type initiated (visible, defined elsewhere).
    initiated: HashMap<LoaderTier, HashMap<String, TypeId>>,
}

/// The global type dictionary and its lock.
#[derive(Default)]
pub struct Dictionary {
    inner: Mutex<Inner>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a type as defined by its tier.
    pub fn define(&self, tier: LoaderTier, name: &str, id: TypeId) {
        let mut inner = self.inner.lock();
        inner.defined.insert((tier, name.to_string()), id);
    }

    /// Register a type as resolvable by `tier` without loading. Returns true
    /// if this is a new registration.
    pub fn register_initiated(&self, tier: LoaderTier, name: &str, id: TypeId) -> bool {
        let mut inner = self.inner.lock();
        inner
            .initiated
            .entry(tier)
            .or_default()
            .insert(name.to_string(), id)
            .is_none()
    }

    /// Find a type defined by exactly this tier.
    pub fn find_defined(&self, tier: LoaderTier, name: &str) -> Option<TypeId> {
        let inner = self.inner.lock();
        inner.defined.get(&(tier, name.to_string())).copied()
    }

    /// Find a loaded type visible to `tier`: its own definitions and
    /// initiations first, then each ancestor tier in delegation order.
    pub fn find_loaded(&self, tier: LoaderTier, name: &str) -> Option<TypeId> {
        let inner = self.inner.lock();
        let mut current = Some(tier);
        while let Some(t) = current {
            if let Some(id) = inner.defined.get(&(t, name.to_string())) {
                return Some(*id);
            }
            if let Some(id) = inner.initiated.get(&t).and_then(|m| m.get(name)) {
                return Some(*id);
            }
            current = t.parent();
        }
        None
    }

    /// Snapshot of the types `tier` has initiated, for the post-hoc scan of
    /// live loader state. Taken under the lock in one shot.
    pub fn initiated_entries(&self, tier: LoaderTier) -> Vec<TypeId> {
        let inner = self.inner.lock();
        inner
            .initiated
            .get(&tier)
            .map(|m| {
                let mut ids: Vec<TypeId> = m.values().copied().collect();
                ids.sort_unstable();
                ids
            })
            .unwrap_or_default()
    }

    /// Number of types defined across all tiers.
    pub fn num_defined(&self) -> usize {
        self.inner.lock().defined.len()
    }
}
