//! Snapshot recorder: drains a finished build session into the persisted
//! structure.
//!
//! Ordering matters. Types are buffered tier by tier in replay order, then
//! initiated and unregistered types, and only then are reference tables
//! translated: a pre-resolved reference may point at a type buffered later.

use tracing::{debug, info};

use prelink_model::slot::ReferenceSlot;
use prelink_model::tier::LoaderTier;
use prelink_model::universe::{TypeId, TypeUniverse};
use prelink_snapshot::{ArchiveBuffer, CallSiteRef, Snapshot, SnapshotGeneration};

use crate::session::BuildSession;

/// Drain the session into a snapshot and dispose of it.
pub fn finalize_snapshot(mut session: BuildSession, universe: &TypeUniverse) -> Snapshot {
    let generation = if session.is_incremental() {
        SnapshotGeneration::Overlay
    } else {
        SnapshotGeneration::Baseline
    };
    let mut snapshot = Snapshot::new(generation);
    let mut buffer = ArchiveBuffer::new();

    add_extra_app_initiated(&mut session, universe);

    // Per-tier preload lists, final filtering applied.
    let mut backlog_sources: Vec<TypeId> = Vec::new();
    for tier in LoaderTier::ALL {
        for id in session.preload_list(tier).to_vec() {
            if universe.get(id).excluded_from_archive {
                debug!(name = %universe.get(id).name, "dropped from archive");
                continue;
            }
            let b = buffer.buffer_type(universe, id);
            snapshot.preload_list_mut(tier).push(b);
            backlog_sources.push(id);
        }
    }

    // Initiation records for the two non-boot tiers. Base-generation entries
    // were adopted, not produced by this pass, and are not re-recorded.
    for tier in [LoaderTier::Platform, LoaderTier::Application] {
        let recordable: Vec<TypeId> = match session.initiation_record(tier) {
            Some(rec) => rec.recordable().collect(),
            None => Vec::new(),
        };
        for id in recordable {
            if universe.get(id).excluded_from_archive {
                continue;
            }
            let b = buffer.buffer_type(universe, id);
            match tier {
                LoaderTier::Platform => snapshot.platform_initiated.push(b),
                LoaderTier::Application => snapshot.application_initiated.push(b),
                _ => {}
            }
        }
    }

    // Types defined by non-hierarchical custom loaders, re-registered by name
    // once the last tier has replayed.
    for (id, data) in universe.iter() {
        if data.unregistered && !data.excluded_from_archive {
            let b = buffer.buffer_type(universe, id);
            snapshot.unregistered.push(b);
        }
    }

    buffer.seal_slots(universe);

    // Call sites that finished this pass resolved feed the deferred replay
    // pass in the next generation.
    for id in backlog_sources {
        let holder = match buffer.lookup(id) {
            Some(b) => b,
            None => continue,
        };
        for (slot, entry) in universe.get(id).slots.iter().enumerate() {
            if let ReferenceSlot::CallSite(cs) = entry {
                if cs.resolved {
                    snapshot.call_site_backlog.push(CallSiteRef { holder, slot });
                }
            }
        }
    }

    snapshot.types = buffer.into_types();
    info!(summary = %snapshot.summary(), "snapshot recorded");
    session.dispose();
    snapshot
}

/// When the application tier preloads anything, pre-register every public
/// lower-tier preloaded type in its initiation record. Name lookups from
/// application code then hit the record instead of walking the delegation
/// chain.
fn add_extra_app_initiated(session: &mut BuildSession, universe: &TypeUniverse) {
    if session.preload_list(LoaderTier::Application).is_empty() {
        return;
    }
    let lower: Vec<TypeId> = [
        LoaderTier::BootCore,
        LoaderTier::BootExtended,
        LoaderTier::Platform,
    ]
    .into_iter()
    .flat_map(|tier| session.preload_list(tier).to_vec())
    .filter(|id| universe.get(*id).is_public)
    .collect();
    for id in lower {
        session.add_initiated(universe, LoaderTier::Application, id);
    }
}
