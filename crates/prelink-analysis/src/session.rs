//! The build session: all state for one archive pass.
//!
//! Constructed by the dump driver at the start of a pass and disposed after
//! the snapshot is written. Component operations take the session by
//! reference; there is no process-wide build state.

use tracing::{debug, info, trace};

use prelink_model::dictionary::Dictionary;
use prelink_model::tier::LoaderTier;
use prelink_model::universe::{TypeId, TypeUniverse};
use prelink_snapshot::Snapshot;

use crate::tables::{InitiationRecord, TypeSet};

/// Flags for one build pass. Callers construct this explicitly; there are no
/// ambient defaults beyond [`Default`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Heap snapshotting is enabled: string literals are interned eagerly and
    /// call-site archiving becomes possible.
    pub heap_snapshot: bool,
    /// Archive pre-resolved dynamically-bound call sites.
    pub archive_call_sites: bool,
    /// Also resolve dynamically-dispatched method references eagerly.
    /// Default off; the always-enabled behavior covers directly-bound calls.
    pub eager_member_resolution: bool,
    /// Synthetic-glue types whose slots are force-resolved in bulk, touched
    /// or not. Inlining through these is shape-invariant.
    pub glue_type_names: Vec<String>,
    /// Types eligible for dump-time initialization, consumed by the replay
    /// engine's fast-path init.
    pub forced_preinit_names: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heap_snapshot: true,
            archive_call_sites: true,
            eager_member_resolution: false,
            glue_type_names: Vec::new(),
            forced_preinit_names: Vec::new(),
        }
    }
}

fn idx(tier: LoaderTier) -> usize {
    tier as usize
}

/// State for one archive-build pass.
pub struct BuildSession {
    pub config: SessionConfig,
    builtin: TypeSet,
    preloaded: TypeSet,
    processed: TypeSet,
    base_generation: TypeSet,
    preload_lists: [Vec<TypeId>; 4],
    platform_initiated: InitiationRecord,
    application_initiated: InitiationRecord,
    num_builtin: usize,
    incremental: bool,
}

impl BuildSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            builtin: TypeSet::new(),
            preloaded: TypeSet::new(),
            processed: TypeSet::new(),
            base_generation: TypeSet::new(),
            preload_lists: Default::default(),
            platform_initiated: InitiationRecord::new(),
            application_initiated: InitiationRecord::new(),
            num_builtin: 0,
            incremental: false,
        }
    }

    /// Seed the builtin table with the supertype closure of the universe's
    /// bootstrap roots, and mark forced-preinit types.
    pub fn initialize(&mut self, universe: &mut TypeUniverse) {
        let mut stack: Vec<TypeId> = universe.bootstrap_roots().to_vec();
        while let Some(id) = stack.pop() {
            if !self.builtin.insert(id) {
                continue;
            }
            self.num_builtin += 1;
            let data = universe.get(id);
            if let Some(s) = data.super_type {
                stack.push(s);
            }
            stack.extend(data.interfaces.iter().copied());
        }

        for name in &self.config.forced_preinit_names {
            for tier in LoaderTier::ALL {
                if let Some(id) = universe.lookup(tier, name) {
                    if universe.get(id).linked {
                        universe.get_mut(id).preinitialized = true;
                        debug!(name = %name, tier = %tier, "forced preinit");
                    }
                }
            }
        }

        info!(builtin = self.num_builtin, "build session initialized");
    }

    /// Adopt a prior (baseline) snapshot for an incremental overlay build.
    ///
    /// Base-generation types count as already preloaded, so the collector
    /// excludes them from the overlay's lists; their initiation entries are
    /// re-registered without being re-recorded.
    pub fn adopt_base_snapshot(&mut self, universe: &TypeUniverse, base: &Snapshot) {
        self.incremental = true;
        for tier in LoaderTier::ALL {
            for b in base.preload_list(tier) {
                let buffered = base.type_at(*b);
                match universe.lookup(buffered.tier, &buffered.name) {
                    Some(id) => {
                        self.preloaded.insert(id);
                        self.base_generation.insert(id);
                    }
                    None => debug!(name = %buffered.name, "base type absent from universe"),
                }
            }
            for b in base.initiated(tier) {
                let buffered = base.type_at(*b);
                if let Some(id) = universe.lookup(buffered.tier, &buffered.name) {
                    match tier {
                        LoaderTier::Platform => {
                            self.platform_initiated.add(id, false);
                        }
                        LoaderTier::Application => {
                            self.application_initiated.add(id, false);
                        }
                        _ => {}
                    }
                }
            }
        }
        info!(
            adopted = self.base_generation.len(),
            "base snapshot adopted for overlay build"
        );
    }

    /// Post-hoc scan of live loader state: register everything the platform
    /// and application tiers have initiated so far. The dictionary takes its
    /// lock per query; other threads may still be defining types.
    pub fn record_initiated_from_dictionary(
        &mut self,
        universe: &TypeUniverse,
        dictionary: &Dictionary,
    ) {
        for tier in [LoaderTier::Platform, LoaderTier::Application] {
            for id in dictionary.initiated_entries(tier) {
                self.add_initiated(universe, tier, id);
            }
        }
    }

    /// Register `target` in `holder_tier`'s initiation record. No-op when the
    /// target is defined by the same loader, or when the tier keeps no record
    /// (the boot tiers share one loader that resolves everything it defines).
    pub fn add_initiated(
        &mut self,
        universe: &TypeUniverse,
        holder_tier: LoaderTier,
        target: TypeId,
    ) {
        let target_tier = universe.get(target).tier;
        if holder_tier.same_loader(target_tier) {
            return;
        }
        let record = match holder_tier {
            LoaderTier::Platform => &mut self.platform_initiated,
            LoaderTier::Application => &mut self.application_initiated,
            _ => return,
        };
        if record.add(target, true) {
            trace!(
                tier = %holder_tier,
                target = %universe.get(target).name,
                "initiated"
            );
        }
    }

    pub fn is_builtin_type(&self, id: TypeId) -> bool {
        self.builtin.contains(id)
    }

    pub fn is_preloaded_type(&self, id: TypeId) -> bool {
        self.preloaded.contains(id)
    }

    pub fn num_builtin_types(&self) -> usize {
        self.num_builtin
    }

    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    pub fn is_base_generation(&self, id: TypeId) -> bool {
        self.base_generation.contains(id)
    }

    /// Mark a type as analyzed. Returns false if it already was; the analyzer
    /// never re-analyzes a type.
    pub fn mark_processed(&mut self, id: TypeId) -> bool {
        self.processed.insert(id)
    }

    pub(crate) fn mark_preloaded(&mut self, id: TypeId) -> bool {
        self.preloaded.insert(id)
    }

    pub fn preload_list(&self, tier: LoaderTier) -> &[TypeId] {
        &self.preload_lists[idx(tier)]
    }

    pub(crate) fn preload_list_mut(&mut self, tier: LoaderTier) -> &mut Vec<TypeId> {
        &mut self.preload_lists[idx(tier)]
    }

    pub fn initiation_record(&self, tier: LoaderTier) -> Option<&InitiationRecord> {
        match tier {
            LoaderTier::Platform => Some(&self.platform_initiated),
            LoaderTier::Application => Some(&self.application_initiated),
            _ => None,
        }
    }

    /// Tear down the pass. The tables live only as long as the session.
    pub fn dispose(self) {
        info!(
            preloaded = self.preloaded.len(),
            analyzed = self.processed.len(),
            "build session disposed"
        );
    }
}
