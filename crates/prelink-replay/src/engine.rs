//! The tiered replay state machine.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, trace};

use prelink_model::dictionary::Dictionary;
use prelink_model::resolver::resolve_call_site;
use prelink_model::slot::{
    CallSiteSlot, ClassSlot, ClassState, MemberSlot, ReferenceSlot, StringSlot,
};
use prelink_model::tier::LoaderTier;
use prelink_model::universe::{TypeData, TypeId, TypeUniverse};
use prelink_snapshot::{BufferedId, BufferedSlot, Snapshot};

use crate::error::ReplayError;
use crate::loader::TierLoader;

fn idx(tier: LoaderTier) -> usize {
    tier as usize
}

/// Replay progress counters, surfaced through the inspect command.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayCounters {
    pub preloaded: usize,
    pub already_defined: usize,
    pub define_failed: usize,
    pub initiated: usize,
    pub prelinked: usize,
    pub preinitialized: usize,
    pub call_sites_bound: usize,
}

impl fmt::Display for ReplayCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} preloaded ({} already defined, {} failed), {} initiated, \
             {} prelinked, {} preinitialized, {} call sites bound",
            self.preloaded,
            self.already_defined,
            self.define_failed,
            self.initiated,
            self.prelinked,
            self.preinitialized,
            self.call_sites_bound,
        )
    }
}

/// Replays one snapshot, one tier at a time, strictly in tier order.
///
/// Tier transitions are cross-thread but one-shot, so completion is published
/// through release stores rather than a lock; any concurrent consumer that
/// must not observe partially replayed references reads the flags with
/// acquire loads.
pub struct ReplayEngine {
    snapshot: Snapshot,
    mapped: HashMap<BufferedId, TypeId>,
    replayed: [bool; 4],
    boot_core_complete: AtomicBool,
    preloading_finished: AtomicBool,
    counters: ReplayCounters,
}

impl ReplayEngine {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            mapped: HashMap::new(),
            replayed: [false; 4],
            boot_core_complete: AtomicBool::new(false),
            preloading_finished: AtomicBool::new(false),
            counters: ReplayCounters::default(),
        }
    }

    /// Boot-core replay has completed. Acquire load.
    pub fn is_boot_core_complete(&self) -> bool {
        self.boot_core_complete.load(Ordering::Acquire)
    }

    /// All four tiers have replayed. Acquire load.
    pub fn is_preloading_finished(&self) -> bool {
        self.preloading_finished.load(Ordering::Acquire)
    }

    pub fn counters(&self) -> ReplayCounters {
        self.counters
    }

    /// The live type for a buffered id, from the replay map or from types the
    /// runtime defined on its own (builtins in particular).
    fn live_of(&self, universe: &TypeUniverse, b: BufferedId) -> Option<TypeId> {
        if let Some(id) = self.mapped.get(&b) {
            return Some(*id);
        }
        let entry = self.snapshot.type_at(b);
        universe.lookup(entry.tier, &entry.name)
    }

    /// Build the live candidate for one buffered type. Hierarchy edges and
    /// pre-resolved references to types that cannot be located degrade to
    /// absent/unresolved rather than failing the tier.
    fn materialize(&self, universe: &TypeUniverse, b: BufferedId) -> TypeData {
        let entry = self.snapshot.type_at(b);
        let mut data = TypeData::new(entry.name.clone(), entry.tier);
        data.is_interface = entry.is_interface;
        data.hidden = entry.hidden;
        data.is_public = entry.is_public;
        data.has_initializer = entry.has_initializer;
        data.preinitialized = entry.preinitialized;
        data.linked = false;
        data.super_type = entry.super_type.and_then(|s| self.live_of(universe, s));
        data.interfaces = entry
            .interfaces
            .iter()
            .filter_map(|i| self.live_of(universe, *i))
            .collect();
        data.slots = entry
            .slots
            .iter()
            .map(|s| self.materialize_slot(universe, s))
            .collect();
        data
    }

    fn materialize_slot(&self, universe: &TypeUniverse, slot: &BufferedSlot) -> ReferenceSlot {
        match slot {
            BufferedSlot::Class {
                name,
                resolved,
                failed,
            } => {
                let state = if *failed {
                    ClassState::Failed
                } else {
                    match resolved.and_then(|b| self.live_of(universe, b)) {
                        Some(id) => ClassState::Resolved(id),
                        None => ClassState::Unresolved,
                    }
                };
                ReferenceSlot::Class(ClassSlot {
                    name: name.clone(),
                    state,
                })
            }
            BufferedSlot::Field {
                class_slot,
                name,
                descriptor,
                resolved,
            } => ReferenceSlot::Field(MemberSlot {
                class_slot: *class_slot,
                name: name.clone(),
                descriptor: descriptor.clone(),
                resolved: *resolved,
                dynamic_dispatch: false,
            }),
            BufferedSlot::Method {
                class_slot,
                name,
                descriptor,
                resolved,
                dynamic_dispatch,
            } => ReferenceSlot::Method(MemberSlot {
                class_slot: *class_slot,
                name: name.clone(),
                descriptor: descriptor.clone(),
                resolved: *resolved,
                dynamic_dispatch: *dynamic_dispatch,
            }),
            BufferedSlot::CallSite {
                bootstrap,
                invoked_descriptor,
            } => ReferenceSlot::CallSite(CallSiteSlot {
                bootstrap: bootstrap.clone(),
                invoked_descriptor: invoked_descriptor.clone(),
                resolved: false,
            }),
            BufferedSlot::String { value, interned } => ReferenceSlot::String(StringSlot {
                value: value.clone(),
                interned: *interned,
            }),
        }
    }

    /// Replay one tier: pre-register its initiation record, define its
    /// preload list, then link-prepare or fast-path-initialize each entry.
    ///
    /// Called once per tier, strictly in tier order, by the class-loading
    /// driver as it instantiates each loader.
    pub fn replay_tier(
        &mut self,
        universe: &mut TypeUniverse,
        dictionary: &Dictionary,
        loader: &mut dyn TierLoader,
        tier: LoaderTier,
    ) -> Result<(), ReplayError> {
        if self.replayed[idx(tier)] {
            return Err(ReplayError::TierOrder { tier });
        }
        if (0..idx(tier)).any(|i| !self.replayed[i]) {
            return Err(ReplayError::TierOrder { tier });
        }

        // (a) Every initiated type must already be defined by an ancestor
        // tier; anything else is a corrupt snapshot.
        for b in self.snapshot.initiated(tier).to_vec() {
            let name = self.snapshot.type_at(b).name.clone();
            let live = self
                .live_of(universe, b)
                .ok_or(ReplayError::MissingInitiated { name: name.clone() })?;
            dictionary.register_initiated(tier, &name, live);
            self.mapped.insert(b, live);
            self.counters.initiated += 1;
        }

        // (b) Define the preload list in recorded order.
        let list = self.snapshot.preload_list(tier).to_vec();
        for b in &list {
            let entry = self.snapshot.type_at(*b);
            let (name, hidden) = (entry.name.clone(), entry.hidden);
            if !hidden {
                if let Some(existing) = universe.lookup(tier, &name) {
                    self.mapped.insert(*b, existing);
                    self.counters.already_defined += 1;
                    trace!(tier = %tier, name = %name, "already defined");
                    continue;
                }
            }
            let proto = self.materialize(universe, *b);
            let live = if hidden {
                // Hidden types bypass the normal definition path: restore
                // their runtime state and splice them into the hierarchy,
                // whose prerequisites are all present already.
                universe.add_type(proto)
            } else {
                match loader.define(universe, tier, proto) {
                    Ok(id) => id,
                    Err(ReplayError::DefineFailed { name, reason }) => {
                        debug!(tier = %tier, name = %name, reason = %reason,
                            "definition failed; falling back to lazy loading");
                        self.counters.define_failed += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            };
            let produced = universe.get(live);
            if produced.name != name || produced.tier != tier {
                let err = ReplayError::IdentityMismatch {
                    name,
                    expected_tier: tier,
                    found: produced.name.clone(),
                    found_tier: produced.tier,
                };
                error!(error = %err, "snapshot invalidated during replay");
                return Err(err);
            }
            if !hidden {
                dictionary.define(tier, &name, live);
            }
            self.mapped.insert(*b, live);
            self.counters.preloaded += 1;
        }

        // (c) Second pass: fast-path init from captured state, or prelink.
        for b in &list {
            let live = match self.mapped.get(b) {
                Some(id) => *id,
                None => continue,
            };
            let data = universe.get_mut(live);
            if self.snapshot.type_at(*b).preinitialized {
                data.linked = true;
                data.initialized = true;
                self.counters.preinitialized += 1;
            } else if !data.linked {
                data.linked = true;
                self.counters.prelinked += 1;
            }
        }

        // (d) Publish completion.
        self.replayed[idx(tier)] = true;
        if tier == LoaderTier::BootCore {
            self.boot_core_complete.store(true, Ordering::Release);
        }
        if tier == LoaderTier::Application {
            self.reregister_unregistered(universe, dictionary);
            self.preloading_finished.store(true, Ordering::Release);
        }
        info!(tier = %tier, count = list.len(), "tier replayed");
        Ok(())
    }

    /// Re-register custom-loader types by name once every tier is in place.
    fn reregister_unregistered(&mut self, universe: &mut TypeUniverse, dictionary: &Dictionary) {
        for b in self.snapshot.unregistered.to_vec() {
            let live = match self.live_of(universe, b) {
                Some(id) => id,
                None => {
                    let proto = self.materialize(universe, b);
                    universe.add_type(proto)
                }
            };
            let name = universe.get(live).name.clone();
            dictionary.register_initiated(LoaderTier::Application, &name, live);
            self.mapped.insert(b, live);
        }
    }

    /// Resolve the deferred call-site backlog, once, after the final tier.
    /// The backlog is discarded afterwards.
    pub fn replay_deferred_call_sites(
        &mut self,
        universe: &mut TypeUniverse,
    ) -> Result<usize, ReplayError> {
        if !self.preloading_finished.load(Ordering::Acquire) {
            return Err(ReplayError::TierOrder {
                tier: LoaderTier::Application,
            });
        }
        let backlog = std::mem::take(&mut self.snapshot.call_site_backlog);
        let mut bound = 0usize;
        for entry in backlog {
            let live = match self.mapped.get(&entry.holder) {
                Some(id) => *id,
                None => continue,
            };
            match resolve_call_site(universe, live, entry.slot) {
                Ok(()) => bound += 1,
                Err(e) => trace!(slot = entry.slot, error = %e, "deferred call site skipped"),
            }
        }
        self.counters.call_sites_bound = bound;
        info!(bound, "deferred call sites replayed");
        Ok(bound)
    }
}
