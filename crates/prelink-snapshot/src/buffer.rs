//! Archive buffer: live-to-buffered reference remapping.
//!
//! Buffering a type copies its identity and hierarchy edges into descriptors
//! owned by the buffer, with every cross-type edge expressed as a
//! [`BufferedId`]. Ancestors are buffered before descendants so hierarchy
//! edges always point at already-buffered entries. Reference tables are
//! translated in a final sealing pass, once the full live-to-buffered map is
//! known; pre-resolved references between recorded types can point forward in
//! buffer order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use prelink_model::slot::{BootstrapMethod, ClassState, ReferenceSlot};
use prelink_model::tier::LoaderTier;
use prelink_model::universe::{TypeId, TypeUniverse};

/// Index of a type descriptor inside a snapshot's buffered table. Distinct
/// from [`TypeId`] by construction: the two spaces are never interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferedId(pub u32);

impl BufferedId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A reference-table entry translated into buffered space.
///
/// Call sites are always buffered unbound; the ones that finished the build
/// pass resolved are listed in the snapshot's call-site backlog and re-bound
/// in the final replay pass instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferedSlot {
    Class {
        name: String,
        resolved: Option<BufferedId>,
        failed: bool,
    },
    Field {
        class_slot: usize,
        name: String,
        descriptor: String,
        resolved: bool,
    },
    Method {
        class_slot: usize,
        name: String,
        descriptor: String,
        resolved: bool,
        dynamic_dispatch: bool,
    },
    CallSite {
        bootstrap: BootstrapMethod,
        invoked_descriptor: String,
    },
    String {
        value: String,
        interned: bool,
    },
}

/// Buffered descriptor of one recorded type.
///
/// Carries what replay needs: identity, hierarchy, lifecycle hints, and the
/// translated reference table. Member tables and bytecode live in the archive
/// region proper, outside the prelinker's table of contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferedType {
    pub name: String,
    pub tier: LoaderTier,
    pub is_interface: bool,
    pub hidden: bool,
    pub is_public: bool,
    pub has_initializer: bool,
    pub preinitialized: bool,
    pub super_type: Option<BufferedId>,
    pub interfaces: Vec<BufferedId>,
    pub slots: Vec<BufferedSlot>,
}

/// Accumulates buffered descriptors during snapshot recording.
#[derive(Default)]
pub struct ArchiveBuffer {
    types: Vec<BufferedType>,
    buffered_to_live: Vec<TypeId>,
    live_to_buffered: HashMap<TypeId, BufferedId>,
}

enum Step {
    Enter(TypeId),
    Emit(TypeId),
}

impl ArchiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffered id of an already-buffered live type.
    pub fn lookup(&self, id: TypeId) -> Option<BufferedId> {
        self.live_to_buffered.get(&id).copied()
    }

    /// Buffer a live type, first buffering any of its ancestors not yet seen.
    /// Idempotent: re-buffering returns the existing id.
    pub fn buffer_type(&mut self, universe: &TypeUniverse, id: TypeId) -> BufferedId {
        if let Some(b) = self.lookup(id) {
            return b;
        }
        let mut stack = vec![Step::Enter(id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    if self.live_to_buffered.contains_key(&id) {
                        continue;
                    }
                    stack.push(Step::Emit(id));
                    let data = universe.get(id);
                    for intf in data.interfaces.iter().rev() {
                        stack.push(Step::Enter(*intf));
                    }
                    if let Some(s) = data.super_type {
                        stack.push(Step::Enter(s));
                    }
                }
                Step::Emit(id) => {
                    if self.live_to_buffered.contains_key(&id) {
                        continue;
                    }
                    let buffered = self.copy_identity(universe, id);
                    let b = BufferedId(self.types.len() as u32);
                    self.types.push(buffered);
                    self.buffered_to_live.push(id);
                    self.live_to_buffered.insert(id, b);
                }
            }
        }
        self.live_to_buffered[&id]
    }

    /// Copy one type's identity and hierarchy. Ancestors are already buffered.
    fn copy_identity(&self, universe: &TypeUniverse, id: TypeId) -> BufferedType {
        let data = universe.get(id);
        let super_type = data.super_type.map(|s| self.live_to_buffered[&s]);
        let interfaces = data
            .interfaces
            .iter()
            .map(|i| self.live_to_buffered[i])
            .collect();
        BufferedType {
            name: data.name.clone(),
            tier: data.tier,
            is_interface: data.is_interface,
            hidden: data.hidden,
            is_public: data.is_public,
            has_initializer: data.has_initializer,
            preinitialized: data.preinitialized,
            super_type,
            interfaces,
            slots: Vec::new(),
        }
    }

    /// Translate every buffered type's reference table. Run once after all
    /// buffering, when the live-to-buffered map is complete.
    pub fn seal_slots(&mut self, universe: &TypeUniverse) {
        for index in 0..self.types.len() {
            let live = self.buffered_to_live[index];
            let slots = universe
                .get(live)
                .slots
                .iter()
                .map(|slot| self.copy_slot(slot))
                .collect();
            self.types[index].slots = slots;
        }
    }

    fn copy_slot(&self, slot: &ReferenceSlot) -> BufferedSlot {
        match slot {
            ReferenceSlot::Class(c) => BufferedSlot::Class {
                name: c.name.clone(),
                // A resolved target outside the buffered set drops back to
                // symbolic; replay re-resolves it by name if it can.
                resolved: c.resolved_type().and_then(|t| self.lookup(t)),
                failed: matches!(c.state, ClassState::Failed),
            },
            ReferenceSlot::Field(m) => BufferedSlot::Field {
                class_slot: m.class_slot,
                name: m.name.clone(),
                descriptor: m.descriptor.clone(),
                resolved: m.resolved,
            },
            ReferenceSlot::Method(m) => BufferedSlot::Method {
                class_slot: m.class_slot,
                name: m.name.clone(),
                descriptor: m.descriptor.clone(),
                resolved: m.resolved,
                dynamic_dispatch: m.dynamic_dispatch,
            },
            ReferenceSlot::CallSite(cs) => BufferedSlot::CallSite {
                bootstrap: cs.bootstrap.clone(),
                invoked_descriptor: cs.invoked_descriptor.clone(),
            },
            ReferenceSlot::String(s) => BufferedSlot::String {
                value: s.value.clone(),
                interned: s.interned,
            },
        }
    }

    /// Consume the buffer, yielding the buffered type table in buffer order.
    pub fn into_types(self) -> Vec<BufferedType> {
        self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
