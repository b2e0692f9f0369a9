//! Reference safety analyzer.
//!
//! Classifies every slot in a type's reference table and commits the
//! cacheable resolutions in place. The rules reproduce, ahead of time, the
//! conditions the lazy resolver would enforce: anything the analyzer keeps
//! resolved must be a resolution the runtime would have produced itself.

use tracing::trace;

use prelink_model::dictionary::Dictionary;
use prelink_model::resolver::{
    intern_string, resolve_call_site, resolve_class_slot, resolve_member_slot,
};
use prelink_model::slot::{ClassState, ReferenceSlot, SlotKind};
use prelink_model::tier::LoaderTier;
use prelink_model::universe::{TypeId, TypeUniverse};

use crate::callsite::is_eligible;
use crate::session::BuildSession;

/// Whether a resolved class reference from `holder` to `target` may stay in
/// the archive. Rule order matters; rule 3 records the cross-tier initiation
/// as a side effect.
pub fn can_cache_resolved_class(
    session: &mut BuildSession,
    universe: &TypeUniverse,
    holder: TypeId,
    target: TypeId,
) -> bool {
    // 1. Ancestors are defined before the holder in the same tier's list.
    if universe.is_subtype_of(holder, target) {
        return true;
    }
    // 2. Builtins form a closed, fully-bootstrapped subgraph.
    if session.is_builtin_type(holder) {
        return session.is_builtin_type(target);
    }
    // 3. A preloaded target is replayable, provided the holder's tier can
    // reach it. Boot-core cannot delegate upward at all.
    if session.is_preloaded_type(target) {
        let holder_tier = universe.get(holder).tier;
        let target_tier = universe.get(target).tier;
        if holder_tier == LoaderTier::BootCore && target_tier != LoaderTier::BootCore {
            return false;
        }
        session.add_initiated(universe, holder_tier, target);
        return true;
    }
    // 4. Everything else resolves lazily at normal runtime speed.
    false
}

/// Classify one slot of `holder`'s reference table. Read-only apart from the
/// rule-3 initiation side effect; never mutates the slot.
pub fn can_cache(
    session: &mut BuildSession,
    universe: &TypeUniverse,
    dictionary: &Dictionary,
    holder: TypeId,
    slot: usize,
) -> bool {
    match &universe.get(holder).slots[slot] {
        ReferenceSlot::Class(c) => match c.resolved_type() {
            Some(target) => can_cache_resolved_class(session, universe, holder, target),
            None => false,
        },
        ReferenceSlot::Field(m) => {
            let owner = match class_slot_target(universe, holder, m.class_slot) {
                Some(t) => t,
                None => return false,
            };
            if !can_cache_resolved_class(session, universe, holder, owner) {
                return false;
            }
            // Static-field access can trigger initialization side effects;
            // only instance fields may be cached.
            match universe.find_field(owner, &m.name) {
                Some(f) => !f.is_static,
                None => false,
            }
        }
        ReferenceSlot::Method(m) => {
            if m.dynamic_dispatch && !session.config.eager_member_resolution {
                return false;
            }
            match class_slot_target(universe, holder, m.class_slot) {
                Some(owner) => {
                    can_cache_resolved_class(session, universe, holder, owner)
                        && universe.find_method(owner, &m.name).is_some()
                }
                None => false,
            }
        }
        ReferenceSlot::CallSite(cs) => is_eligible(session, universe, dictionary, holder, cs),
        ReferenceSlot::String(_) => session.config.heap_snapshot,
    }
}

fn class_slot_target(universe: &TypeUniverse, holder: TypeId, class_slot: usize) -> Option<TypeId> {
    match universe.get(holder).slots.get(class_slot) {
        Some(ReferenceSlot::Class(c)) => c.resolved_type(),
        _ => None,
    }
}

/// Bulk entry: analyze and resolve every slot of one type, once.
///
/// Normally only slots already resolved (touched during the trial run) are
/// classified; synthetic-glue and hidden types are force-resolved in full
/// because their shape is invariant and inlining through them matters.
pub fn analyze_and_resolve(
    session: &mut BuildSession,
    universe: &mut TypeUniverse,
    dictionary: &Dictionary,
    holder: TypeId,
) {
    if !session.mark_processed(holder) {
        return;
    }
    let data = universe.get(holder);
    if !data.linked {
        trace!(name = %data.name, "skipped: not linked");
        return;
    }
    let force = data.hidden || session.config.glue_type_names.contains(&data.name);

    for slot in 0..universe.get(holder).slots.len() {
        match universe.get(holder).slots[slot].kind() {
            SlotKind::String => {
                if session.config.heap_snapshot {
                    let _ = intern_string(universe, holder, slot);
                }
            }
            SlotKind::Class => {
                if force && !universe.get(holder).slots[slot].is_resolved() {
                    if let Err(e) = resolve_class_slot(universe, dictionary, holder, slot) {
                        trace!(slot, error = %e, "class slot left unresolved");
                        continue;
                    }
                }
                commit_or_clear_class(session, universe, dictionary, holder, slot);
            }
            SlotKind::Field | SlotKind::Method => {
                if force && !universe.get(holder).slots[slot].is_resolved() {
                    if let Err(e) = resolve_member_slot(universe, dictionary, holder, slot) {
                        trace!(slot, error = %e, "member slot left unresolved");
                        continue;
                    }
                }
                commit_or_clear_member(session, universe, dictionary, holder, slot);
            }
            SlotKind::CallSite => {
                let eligible = match &universe.get(holder).slots[slot] {
                    ReferenceSlot::CallSite(cs) => {
                        is_eligible(session, universe, dictionary, holder, cs)
                    }
                    _ => false,
                };
                if eligible {
                    let _ = resolve_call_site(universe, holder, slot);
                } else if let ReferenceSlot::CallSite(cs) = &mut universe.get_mut(holder).slots[slot]
                {
                    cs.resolved = false;
                }
            }
        }
    }
}

fn commit_or_clear_class(
    session: &mut BuildSession,
    universe: &mut TypeUniverse,
    dictionary: &Dictionary,
    holder: TypeId,
    slot: usize,
) {
    if universe.get(holder).slots[slot].is_resolved()
        && !can_cache(session, universe, dictionary, holder, slot)
    {
        if let ReferenceSlot::Class(c) = &mut universe.get_mut(holder).slots[slot] {
            trace!(slot, name = %c.name, "uncacheable class reference cleared");
            c.state = ClassState::Unresolved;
        }
    }
}

fn commit_or_clear_member(
    session: &mut BuildSession,
    universe: &mut TypeUniverse,
    dictionary: &Dictionary,
    holder: TypeId,
    slot: usize,
) {
    if universe.get(holder).slots[slot].is_resolved()
        && !can_cache(session, universe, dictionary, holder, slot)
    {
        if let ReferenceSlot::Field(m) | ReferenceSlot::Method(m) =
            &mut universe.get_mut(holder).slots[slot]
        {
            trace!(slot, name = %m.name, "uncacheable member reference cleared");
            m.resolved = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::collect_all_tiers;
    use crate::session::SessionConfig;
    use prelink_model::slot::{ClassSlot, MemberSlot, StringSlot};
    use prelink_model::universe::{FieldDef, MethodDef, TypeData};

    struct Fixture {
        universe: TypeUniverse,
        dictionary: Dictionary,
        session: BuildSession,
    }

    /// Object <- Base <- Derived (boot-core), Base implements Iface, plus an
    /// unrelated application-tier type.
    fn fixture() -> (Fixture, [TypeId; 5]) {
        let mut universe = TypeUniverse::new();
        let object = universe.add_type(TypeData::new("rt/Object", LoaderTier::BootCore));
        let iface = universe.add_type(TypeData {
            is_interface: true,
            ..TypeData::new("rt/Iface", LoaderTier::BootCore)
        });
        let base = universe.add_type(TypeData {
            super_type: Some(object),
            interfaces: smallvec::smallvec![iface],
            fields: vec![
                FieldDef {
                    name: "count".to_string(),
                    descriptor: "I".to_string(),
                    is_static: false,
                },
                FieldDef {
                    name: "SHARED".to_string(),
                    descriptor: "I".to_string(),
                    is_static: true,
                },
            ],
            methods: vec![MethodDef {
                name: "reset".to_string(),
                descriptor: "()V".to_string(),
                is_static: false,
            }],
            ..TypeData::new("rt/Base", LoaderTier::BootCore)
        });
        let derived = universe.add_type(TypeData {
            super_type: Some(base),
            ..TypeData::new("rt/Derived", LoaderTier::BootCore)
        });
        let app = universe.add_type(TypeData::new("app/Main", LoaderTier::Application));

        let dictionary = Dictionary::new();
        for (id, t) in universe.iter() {
            dictionary.define(t.tier, &t.name, id);
        }
        let mut session = BuildSession::new(SessionConfig::default());
        session.initialize(&mut universe);
        collect_all_tiers(&mut session, &universe);
        (
            Fixture {
                universe,
                dictionary,
                session,
            },
            [object, iface, base, derived, app],
        )
    }

    fn resolved_class_slot(name: &str, target: TypeId) -> ReferenceSlot {
        ReferenceSlot::Class(ClassSlot {
            name: name.to_string(),
            state: ClassState::Resolved(target),
        })
    }

    #[test]
    fn test_ancestor_reference_is_cacheable() {
        let (mut f, [object, iface, base, derived, _]) = fixture();
        for target in [object, iface, base] {
            assert!(can_cache_resolved_class(
                &mut f.session,
                &f.universe,
                derived,
                target
            ));
        }
    }

    #[test]
    fn test_builtin_holder_reaches_only_builtins() {
        let mut universe = TypeUniverse::new();
        let object = universe.add_type(TypeData::new("rt/Object", LoaderTier::BootCore));
        let lookup = universe.add_type(TypeData {
            super_type: Some(object),
            ..TypeData::new("invoke/Lookup", LoaderTier::BootCore)
        });
        let call_site = universe.add_type(TypeData {
            super_type: Some(object),
            ..TypeData::new("invoke/CallSite", LoaderTier::BootCore)
        });
        let helper = universe.add_type(TypeData {
            super_type: Some(object),
            ..TypeData::new("rt/Helper", LoaderTier::BootCore)
        });
        universe.mark_bootstrap_root(lookup);
        universe.mark_bootstrap_root(call_site);
        let mut session = BuildSession::new(SessionConfig::default());
        session.initialize(&mut universe);
        collect_all_tiers(&mut session, &universe);
        assert!(session.is_builtin_type(lookup));
        assert!(!session.is_builtin_type(helper));
        assert!(session.is_preloaded_type(helper));

        // A non-ancestor builtin target is reachable through rule 2.
        assert!(can_cache_resolved_class(
            &mut session,
            &universe,
            lookup,
            call_site
        ));
        // A merely preloaded target is not: rule 2 rejects before rule 3 is
        // ever consulted.
        assert!(!can_cache_resolved_class(
            &mut session,
            &universe,
            lookup,
            helper
        ));
    }

    #[test]
    fn test_boot_core_holder_cannot_reach_higher_tier() {
        let (mut f, [.., derived, app]) = fixture();
        // The app type is preloaded, but boot-core cannot delegate upward.
        assert!(f.session.is_preloaded_type(app));
        assert!(!can_cache_resolved_class(
            &mut f.session,
            &f.universe,
            derived,
            app
        ));
    }

    #[test]
    fn test_preloaded_cross_tier_target_records_initiation() {
        let (mut f, [_, _, base, ..]) = fixture();
        let app = f.universe.lookup(LoaderTier::Application, "app/Main").unwrap();
        assert!(can_cache_resolved_class(
            &mut f.session,
            &f.universe,
            app,
            base
        ));
        let rec = f.session.initiation_record(LoaderTier::Application).unwrap();
        assert!(rec.contains(base));
    }

    #[test]
    fn test_static_field_slot_is_never_cached() {
        let (mut f, [_, _, base, derived, _]) = fixture();
        f.universe.get_mut(derived).slots = vec![
            resolved_class_slot("rt/Base", base),
            ReferenceSlot::Field(MemberSlot {
                resolved: true,
                ..MemberSlot::new(0, "count", "I")
            }),
            ReferenceSlot::Field(MemberSlot {
                resolved: true,
                ..MemberSlot::new(0, "SHARED", "I")
            }),
        ];
        assert!(can_cache(&mut f.session, &f.universe, &f.dictionary, derived, 1));
        assert!(!can_cache(&mut f.session, &f.universe, &f.dictionary, derived, 2));
    }

    #[test]
    fn test_analysis_clears_uncacheable_and_keeps_safe_slots() {
        let (mut f, [_, _, base, derived, app]) = fixture();
        f.universe.get_mut(derived).slots = vec![
            resolved_class_slot("rt/Base", base),
            resolved_class_slot("app/Main", app),
            ReferenceSlot::String(StringSlot {
                value: "greeting".to_string(),
                interned: false,
            }),
        ];
        analyze_and_resolve(&mut f.session, &mut f.universe, &f.dictionary, derived);

        let slots = &f.universe.get(derived).slots;
        // Rule 1 keeps the ancestor reference.
        assert!(slots[0].is_resolved());
        // Rule 4: boot-core holder, application target.
        assert!(!slots[1].is_resolved());
        // Heap snapshotting interns literals eagerly.
        assert!(slots[2].is_resolved());
    }

    #[test]
    fn test_analysis_is_memoized() {
        let (mut f, [_, _, base, derived, _]) = fixture();
        f.universe.get_mut(derived).slots = vec![resolved_class_slot("rt/Base", base)];
        analyze_and_resolve(&mut f.session, &mut f.universe, &f.dictionary, derived);

        // A second pass must not reconsider the type even if its slots change.
        let app = f.universe.lookup(LoaderTier::Application, "app/Main").unwrap();
        f.universe.get_mut(derived).slots = vec![resolved_class_slot("app/Main", app)];
        analyze_and_resolve(&mut f.session, &mut f.universe, &f.dictionary, derived);
        assert!(f.universe.get(derived).slots[0].is_resolved());
    }

    #[test]
    fn test_glue_type_slots_are_force_resolved() {
        let (mut f, [_, _, base, ..]) = fixture();
        let glue = f.universe.add_type(TypeData {
            slots: vec![
                ReferenceSlot::Class(ClassSlot::unresolved("rt/Base")),
                ReferenceSlot::Method(MemberSlot::new(0, "reset", "()V")),
            ],
            ..TypeData::new("invoke/Adapter", LoaderTier::BootCore)
        });
        f.dictionary.define(LoaderTier::BootCore, "invoke/Adapter", glue);
        f.session.config.glue_type_names = vec!["invoke/Adapter".to_string()];
        // Preloaded so rule 3 accepts the committed resolution.
        assert!(f.session.is_preloaded_type(base));

        analyze_and_resolve(&mut f.session, &mut f.universe, &f.dictionary, glue);
        assert!(f.universe.get(glue).slots[0].is_resolved());
        assert!(f.universe.get(glue).slots[1].is_resolved());
    }

    #[test]
    fn test_dynamic_dispatch_gated_by_flag() {
        let (mut f, [_, _, base, derived, _]) = fixture();
        f.universe.get_mut(derived).slots = vec![
            resolved_class_slot("rt/Base", base),
            ReferenceSlot::Method(MemberSlot {
                resolved: true,
                dynamic_dispatch: true,
                ..MemberSlot::new(0, "reset", "()V")
            }),
        ];
        assert!(!can_cache(&mut f.session, &f.universe, &f.dictionary, derived, 1));

        f.session.config.eager_member_resolution = true;
        assert!(can_cache(&mut f.session, &f.universe, &f.dictionary, derived, 1));
    }
}
