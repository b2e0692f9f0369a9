//! Snapshot: the recorded output of one build session.
//!
//! A snapshot holds the buffered type table plus the per-tier replay lists
//! derived from it. List order is load order: replaying a tier's list front
//! to back never encounters a type before its ancestors.

use serde::{Deserialize, Serialize};
use std::fmt;

use prelink_model::tier::LoaderTier;

use crate::buffer::{BufferedId, BufferedType};

/// Whether a snapshot stands alone or layers on top of a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotGeneration {
    /// A full snapshot built from an empty cache.
    Baseline,
    /// An incremental snapshot; types already in the baseline are omitted.
    Overlay,
}

/// A deferred call-site binding: the slot finished the build resolved and is
/// re-bound once every replay tier has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteRef {
    /// Buffered id of the type holding the call site.
    pub holder: BufferedId,
    /// Index of the call-site slot in the holder's reference table.
    pub slot: usize,
}

/// The recorded linkage state of one build session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub generation: SnapshotGeneration,
    /// All buffered types, in buffer order.
    pub types: Vec<BufferedType>,
    /// Per-tier preload lists, each in dependency order.
    pub boot_core: Vec<BufferedId>,
    pub boot_extended: Vec<BufferedId>,
    pub platform: Vec<BufferedId>,
    pub application: Vec<BufferedId>,
    /// Initiation records: types a tier resolved references to without
    /// defining them. Preregistered before that tier's preload loop runs.
    pub platform_initiated: Vec<BufferedId>,
    pub application_initiated: Vec<BufferedId>,
    /// Call sites to re-bind after the final tier replays.
    pub call_site_backlog: Vec<CallSiteRef>,
    /// Types recorded outside any tier's registry; re-registered by name
    /// after application replay.
    pub unregistered: Vec<BufferedId>,
}

impl Snapshot {
    pub fn new(generation: SnapshotGeneration) -> Self {
        Self {
            generation,
            types: Vec::new(),
            boot_core: Vec::new(),
            boot_extended: Vec::new(),
            platform: Vec::new(),
            application: Vec::new(),
            platform_initiated: Vec::new(),
            application_initiated: Vec::new(),
            call_site_backlog: Vec::new(),
            unregistered: Vec::new(),
        }
    }

    /// The preload list for one tier.
    pub fn preload_list(&self, tier: LoaderTier) -> &[BufferedId] {
        match tier {
            LoaderTier::BootCore => &self.boot_core,
            LoaderTier::BootExtended => &self.boot_extended,
            LoaderTier::Platform => &self.platform,
            LoaderTier::Application => &self.application,
        }
    }

    pub fn preload_list_mut(&mut self, tier: LoaderTier) -> &mut Vec<BufferedId> {
        match tier {
            LoaderTier::BootCore => &mut self.boot_core,
            LoaderTier::BootExtended => &mut self.boot_extended,
            LoaderTier::Platform => &mut self.platform,
            LoaderTier::Application => &mut self.application,
        }
    }

    /// The initiation record for one tier. Boot tiers share the boot loader
    /// and keep no initiation records.
    pub fn initiated(&self, tier: LoaderTier) -> &[BufferedId] {
        match tier {
            LoaderTier::Platform => &self.platform_initiated,
            LoaderTier::Application => &self.application_initiated,
            _ => &[],
        }
    }

    pub fn type_at(&self, id: BufferedId) -> &BufferedType {
        &self.types[id.index()]
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            generation: self.generation,
            types: self.types.len(),
            boot_core: self.boot_core.len(),
            boot_extended: self.boot_extended.len(),
            platform: self.platform.len(),
            application: self.application.len(),
            initiated: self.platform_initiated.len() + self.application_initiated.len(),
            call_site_backlog: self.call_site_backlog.len(),
            unregistered: self.unregistered.len(),
        }
    }
}

/// Per-list counts, for logging and the inspect command.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SnapshotSummary {
    pub generation: SnapshotGeneration,
    pub types: usize,
    pub boot_core: usize,
    pub boot_extended: usize,
    pub platform: usize,
    pub application: usize,
    pub initiated: usize,
    pub call_site_backlog: usize,
    pub unregistered: usize,
}

impl fmt::Display for SnapshotSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} types ({:?}): boot-core {}, boot-extended {}, platform {}, application {}; \
             {} initiated, {} deferred call sites, {} unregistered",
            self.types,
            self.generation,
            self.boot_core,
            self.boot_extended,
            self.platform,
            self.application,
            self.initiated,
            self.call_site_backlog,
            self.unregistered,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_tiers_have_no_initiation_record() {
        let mut snap = Snapshot::new(SnapshotGeneration::Baseline);
        snap.platform_initiated.push(BufferedId(3));
        assert!(snap.initiated(LoaderTier::BootCore).is_empty());
        assert!(snap.initiated(LoaderTier::BootExtended).is_empty());
        assert_eq!(snap.initiated(LoaderTier::Platform), &[BufferedId(3)]);
    }

    #[test]
    fn test_summary_counts() {
        let mut snap = Snapshot::new(SnapshotGeneration::Overlay);
        snap.boot_core = vec![BufferedId(0), BufferedId(1)];
        snap.application = vec![BufferedId(2)];
        snap.call_site_backlog.push(CallSiteRef {
            holder: BufferedId(2),
            slot: 0,
        });
        let summary = snap.summary();
        assert_eq!(summary.boot_core, 2);
        assert_eq!(summary.application, 1);
        assert_eq!(summary.call_site_backlog, 1);
        assert_eq!(summary.generation, SnapshotGeneration::Overlay);
    }
}
