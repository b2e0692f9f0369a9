//! Dependency collector: fills the per-tier preload lists.
//!
//! For every type materialized in the target tier, the collector walks its
//! supertype then its interfaces (declaration order) with an explicit stack,
//! appending each accepted type after its ancestors. The preloaded marker on
//! the session is the cross-run dedupe table, so re-collecting an unchanged
//! universe is a no-op; the visited set is local to one invocation and only
//! breaks interface diamonds.

use tracing::debug;

use prelink_model::tier::LoaderTier;
use prelink_model::universe::{TypeId, TypeUniverse};

use crate::session::BuildSession;
use crate::tables::TypeSet;

enum Step {
    Enter(TypeId),
    Emit(TypeId),
}

/// Collect one tier's preload list. Idempotent per tier per build pass;
/// returns the tier's full list including earlier runs' entries.
pub fn collect_tier<'s>(
    session: &'s mut BuildSession,
    universe: &TypeUniverse,
    tier: LoaderTier,
) -> &'s [TypeId] {
    let mut visited = TypeSet::new();
    let roots: Vec<TypeId> = universe
        .iter()
        .filter(|(_, t)| t.tier == tier)
        .map(|(id, _)| id)
        .collect();

    for root in roots {
        let mut stack = vec![Step::Enter(root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    if !visited.insert(id) {
                        continue;
                    }
                    if is_excluded(session, universe, tier, id) {
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
                    session.mark_preloaded(id);
                    session.preload_list_mut(tier).push(id);
                    let data = universe.get(id);
                    debug!(tier = %tier, name = %data.name, "preload");
                    // Every ancestor must be resolvable before this type is
                    // defined, in this tier's list or its initiation record.
                    if let Some(s) = data.super_type {
                        session.add_initiated(universe, tier, s);
                    }
                    for intf in data.interfaces.iter() {
                        session.add_initiated(universe, tier, *intf);
                    }
                }
            }
        }
    }

    session.preload_list(tier)
}

fn is_excluded(
    session: &BuildSession,
    universe: &TypeUniverse,
    tier: LoaderTier,
    id: TypeId,
) -> bool {
    // Already recorded, whether by an earlier run of this pass or by an
    // adopted base generation.
    if session.is_preloaded_type(id) {
        return true;
    }
    // Builtins are resolved by the unconditional bootstrap step, before any
    // tier replays.
    if session.is_builtin_type(id) {
        return true;
    }
    let data = universe.get(id);
    // An ancestor from a lower tier belongs to that tier's list; here it is
    // only an initiation-record candidate.
    if data.tier != tier {
        return true;
    }
    if data.hidden && !session.config.archive_call_sites {
        return true;
    }
    // Custom-loader types have no tier to replay in; the recorder captures
    // them in the side list instead.
    if data.unregistered {
        return true;
    }
    // A named-module type without the canonical runtime image behind it may
    // not be loadable at replay time.
    if data.in_named_module && !data.from_runtime_image {
        return true;
    }
    false
}

/// Collect every tier, in replay order.
pub fn collect_all_tiers(session: &mut BuildSession, universe: &TypeUniverse) {
    for tier in LoaderTier::ALL {
        let count = collect_tier(session, universe, tier).len();
        debug!(tier = %tier, count, "tier collected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use prelink_model::universe::TypeData;

    /// Object <- Base <- Derived, Base implements Iface, all boot-core.
    fn diamond() -> (TypeUniverse, [TypeId; 4]) {
        let mut u = TypeUniverse::new();
        let object = u.add_type(TypeData::new("rt/Object", LoaderTier::BootCore));
        let iface = u.add_type(TypeData {
            is_interface: true,
            ..TypeData::new("rt/Iface", LoaderTier::BootCore)
        });
        let base = u.add_type(TypeData {
            super_type: Some(object),
            interfaces: smallvec::smallvec![iface],
            ..TypeData::new("rt/Base", LoaderTier::BootCore)
        });
        let derived = u.add_type(TypeData {
            super_type: Some(base),
            ..TypeData::new("rt/Derived", LoaderTier::BootCore)
        });
        (u, [object, iface, base, derived])
    }

    #[test]
    fn test_ancestors_precede_descendants() {
        let (u, [object, iface, base, derived]) = diamond();
        let mut session = BuildSession::new(SessionConfig::default());
        let list = collect_tier(&mut session, &u, LoaderTier::BootCore).to_vec();
        // Supertype first, then interfaces in declaration order, then self.
        assert_eq!(list, vec![object, iface, base, derived]);
    }

    #[test]
    fn test_collection_is_idempotent() {
        let (u, _) = diamond();
        let mut session = BuildSession::new(SessionConfig::default());
        let first = collect_tier(&mut session, &u, LoaderTier::BootCore).to_vec();
        let second = collect_tier(&mut session, &u, LoaderTier::BootCore).to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cross_tier_ancestor_lands_in_initiation_record() {
        let mut u = TypeUniverse::new();
        let boot_base = u.add_type(TypeData::new("rt/Base", LoaderTier::BootCore));
        let app = u.add_type(TypeData {
            super_type: Some(boot_base),
            ..TypeData::new("app/Main", LoaderTier::Application)
        });

        let mut session = BuildSession::new(SessionConfig::default());
        collect_all_tiers(&mut session, &u);
        assert_eq!(session.preload_list(LoaderTier::BootCore), &[boot_base]);
        assert_eq!(session.preload_list(LoaderTier::Application), &[app]);
        let rec = session.initiation_record(LoaderTier::Application).unwrap();
        assert_eq!(rec.entries(), &[boot_base]);
    }

    #[test]
    fn test_builtins_and_foreign_module_types_excluded() {
        let mut u = TypeUniverse::new();
        let object = u.add_type(TypeData::new("rt/Object", LoaderTier::BootCore));
        u.mark_bootstrap_root(object);
        let foreign = u.add_type(TypeData {
            in_named_module: true,
            from_runtime_image: false,
            ..TypeData::new("mod/Foreign", LoaderTier::BootCore)
        });
        let plain = u.add_type(TypeData::new("rt/Plain", LoaderTier::BootCore));

        let mut session = BuildSession::new(SessionConfig::default());
        session.initialize(&mut u);
        let list = collect_tier(&mut session, &u, LoaderTier::BootCore).to_vec();
        assert_eq!(list, vec![plain]);
        assert!(!list.contains(&object));
        assert!(!list.contains(&foreign));
    }

    #[test]
    fn test_hidden_types_follow_call_site_flag() {
        let mut u = TypeUniverse::new();
        let hidden = u.add_type(TypeData {
            hidden: true,
            ..TypeData::new("app/Lambda$0x1", LoaderTier::Application)
        });

        let mut with = BuildSession::new(SessionConfig::default());
        assert_eq!(
            collect_tier(&mut with, &u, LoaderTier::Application),
            &[hidden]
        );

        let mut without = BuildSession::new(SessionConfig {
            archive_call_sites: false,
            ..SessionConfig::default()
        });
        assert!(collect_tier(&mut without, &u, LoaderTier::Application).is_empty());
    }
}
