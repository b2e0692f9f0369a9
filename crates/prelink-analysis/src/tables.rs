//! Identity-keyed dedupe tables.
//!
//! These are purely additive for the duration of one build pass: entries are
//! inserted, never removed, so every walk that consults them is monotone.

use std::collections::{HashMap, HashSet};

use prelink_model::universe::TypeId;

/// An additive set of types.
#[derive(Debug, Default, Clone)]
pub struct TypeSet {
    inner: HashSet<TypeId>,
}

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert; returns true if the type was not already present.
    pub fn insert(&mut self, id: TypeId) -> bool {
        self.inner.insert(id)
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.inner.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// One tier's initiation record: types the tier resolves references to
/// without defining them.
///
/// Entries adopted from a prior snapshot generation are tracked but not
/// re-recorded into the overlay; `needs_record` distinguishes the two.
#[derive(Debug, Default, Clone)]
pub struct InitiationRecord {
    order: Vec<TypeId>,
    needs_record: HashMap<TypeId, bool>,
}

impl InitiationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. First registration wins: re-adding an entry never
    /// changes whether it will be recorded.
    pub fn add(&mut self, id: TypeId, needs_record: bool) -> bool {
        if self.needs_record.contains_key(&id) {
            return false;
        }
        self.order.push(id);
        self.needs_record.insert(id, needs_record);
        true
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.needs_record.contains_key(&id)
    }

    /// All registered types, first-registration order.
    pub fn entries(&self) -> &[TypeId] {
        &self.order
    }

    /// The entries that belong in this generation's snapshot, in
    /// registration order.
    pub fn recordable(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|id| self.needs_record[id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
