//! Ahead-of-time linkage cache.
//!
//! At archive-build time the prelinker walks a quiesced type universe,
//! decides which cross-type references can safely stay resolved, and records
//! the result as a tiered [`Snapshot`]. At startup the [`ReplayEngine`]
//! consumes the snapshot tier by tier, skipping the equivalent lazy
//! resolution work while preserving type identity, initialization order, and
//! access control.
//!
//! **Key pieces**
//! - [`TypeUniverse`] / [`Dictionary`]: the live type model and its
//!   delegating name registry.
//! - [`BuildSession`]: all build-pass state; see [`build_snapshot`] for the
//!   full dump pipeline.
//! - [`Snapshot`]: the persisted output, read-only at replay time.
//! - [`ReplayEngine`]: the startup-side tiered state machine.

pub use prelink_analysis::{
    analyze_and_resolve, can_cache, can_cache_resolved_class, collect_all_tiers, collect_tier,
    finalize_snapshot, is_eligible, BuildSession, SessionConfig,
};
pub use prelink_model::dictionary::Dictionary;
pub use prelink_model::slot::{
    BootstrapMethod, CallSiteSlot, ClassSlot, ClassState, MemberSlot, ReferenceSlot, StringSlot,
};
pub use prelink_model::tier::LoaderTier;
pub use prelink_model::universe::{FieldDef, MethodDef, TypeData, TypeId, TypeUniverse};
pub use prelink_replay::{ArchiveLoader, ReplayCounters, ReplayEngine, ReplayError, TierLoader};
pub use prelink_snapshot::{
    read_from, write_to, BufferedId, BufferedSlot, BufferedType, Snapshot, SnapshotError,
    SnapshotGeneration, SnapshotSummary,
};

/// Run one full archive-build pass: initialize a session, collect every
/// tier, analyze and resolve each preloaded type, scan live loader state,
/// and drain the session into a snapshot.
///
/// Pass `base` to produce an incremental overlay on top of a baseline
/// snapshot.
pub fn build_snapshot(
    universe: &mut TypeUniverse,
    dictionary: &Dictionary,
    config: SessionConfig,
    base: Option<&Snapshot>,
) -> Snapshot {
    let mut session = BuildSession::new(config);
    session.initialize(universe);
    if let Some(base) = base {
        session.adopt_base_snapshot(universe, base);
    }
    collect_all_tiers(&mut session, universe);

    let preloaded: Vec<TypeId> = LoaderTier::ALL
        .iter()
        .flat_map(|tier| session.preload_list(*tier).to_vec())
        .collect();
    for id in preloaded {
        analyze_and_resolve(&mut session, universe, dictionary, id);
    }

    // Unregistered types never enter a preload list but are archived with
    // their reference tables, so they get the same vetting. Anything the
    // analyzer would refuse to cache must not survive into the snapshot.
    let unregistered: Vec<TypeId> = universe
        .iter()
        .filter(|(_, data)| data.unregistered)
        .map(|(id, _)| id)
        .collect();
    for id in unregistered {
        analyze_and_resolve(&mut session, universe, dictionary, id);
    }

    session.record_initiated_from_dictionary(universe, dictionary);
    finalize_snapshot(session, universe)
}

/// Register every non-hidden, tier-defined type of a fixture universe in a
/// fresh dictionary, standing in for the loader state a live runtime would
/// have accumulated by dump time.
pub fn dictionary_for(universe: &TypeUniverse) -> Dictionary {
    let dictionary = Dictionary::new();
    for (id, data) in universe.iter() {
        if !data.hidden && !data.unregistered {
            dictionary.define(data.tier, &data.name, id);
        }
    }
    dictionary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_snapshot_pipeline() {
        let mut u = TypeUniverse::new();
        let object = u.add_type(TypeData::new("rt/Object", LoaderTier::BootCore));
        let base = u.add_type(TypeData {
            super_type: Some(object),
            ..TypeData::new("rt/Base", LoaderTier::BootCore)
        });
        u.add_type(TypeData {
            super_type: Some(base),
            slots: vec![ReferenceSlot::Class(ClassSlot {
                name: "rt/Base".to_string(),
                state: ClassState::Resolved(base),
            })],
            ..TypeData::new("app/Main", LoaderTier::Application)
        });

        let dictionary = dictionary_for(&u);
        let snapshot = build_snapshot(&mut u, &dictionary, SessionConfig::default(), None);
        assert_eq!(snapshot.generation, SnapshotGeneration::Baseline);
        assert_eq!(snapshot.boot_core.len(), 2);
        assert_eq!(snapshot.application.len(), 1);
        // The application type's cross-tier reference stays resolved and its
        // target is in the application initiation record.
        let app = &snapshot.types[snapshot.application[0].index()];
        assert!(matches!(
            app.slots[0],
            prelink_snapshot::BufferedSlot::Class {
                resolved: Some(_),
                ..
            }
        ));
        let initiated: Vec<&str> = snapshot
            .application_initiated
            .iter()
            .map(|b| snapshot.type_at(*b).name.as_str())
            .collect();
        assert!(initiated.contains(&"rt/Base"));
    }

    #[test]
    fn test_unregistered_types_get_safety_analysis() {
        let mut u = TypeUniverse::new();
        let object = u.add_type(TypeData::new("rt/Object", LoaderTier::BootCore));
        let config = u.add_type(TypeData {
            super_type: Some(object),
            fields: vec![FieldDef {
                name: "SHARED".to_string(),
                descriptor: "I".to_string(),
                is_static: true,
            }],
            ..TypeData::new("rt/Config", LoaderTier::BootCore)
        });
        u.add_type(TypeData {
            unregistered: true,
            slots: vec![
                ReferenceSlot::Class(ClassSlot {
                    name: "rt/Config".to_string(),
                    state: ClassState::Resolved(config),
                }),
                ReferenceSlot::Field(MemberSlot {
                    resolved: true,
                    ..MemberSlot::new(0, "SHARED", "I")
                }),
            ],
            ..TypeData::new("custom/Plugin", LoaderTier::Application)
        });

        let dictionary = dictionary_for(&u);
        let snapshot = build_snapshot(&mut u, &dictionary, SessionConfig::default(), None);
        let plugin = snapshot.type_at(snapshot.unregistered[0]);
        // The class reference targets a preloaded type and may stay. The
        // static-field reference would skip an initialization trigger and
        // must be cleared before buffering.
        assert!(matches!(
            plugin.slots[0],
            BufferedSlot::Class {
                resolved: Some(_),
                ..
            }
        ));
        assert!(matches!(
            plugin.slots[1],
            BufferedSlot::Field { resolved: false, .. }
        ));
    }
}
