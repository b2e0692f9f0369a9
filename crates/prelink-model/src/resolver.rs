//! Symbolic-reference resolvers.
//!
//! These are the runtime's resolution primitives, shared by the build-time
//! analyzer (which uses them to test and perform eligible resolutions) and the
//! replay engine (which performs deferred call-site resolution). Resolution is
//! one-shot per slot per attempt: on failure the slot is left as it was and
//! the caller decides whether to log and move on.

use std::fmt;

use tracing::trace;

use crate::dictionary::Dictionary;
use crate::slot::{ClassState, ReferenceSlot};
use crate::universe::{TypeId, TypeUniverse};

/// Why a single resolution attempt did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The named target is not loaded in any tier visible to the holder.
    TargetNotLoaded { name: String },
    /// A prior resolution of this slot failed permanently.
    PreviouslyFailed { name: String },
    /// The owner class resolved, but the named member does not exist.
    NoSuchMember { class: String, name: String },
    /// The slot at this index is not of the kind the resolver handles.
    WrongSlotKind { expected: &'static str },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::TargetNotLoaded { name } => write!(f, "target not loaded: {name}"),
            ResolveError::PreviouslyFailed { name } => {
                write!(f, "resolution previously failed: {name}")
            }
            ResolveError::NoSuchMember { class, name } => {
                write!(f, "no such member: {class}.{name}")
            }
            ResolveError::WrongSlotKind { expected } => {
                write!(f, "slot is not a {expected} reference")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Resolve the class slot at `slot` in `holder`'s reference table.
///
/// Looks the name up through the holder tier's delegation chain; on success
/// the slot transitions to resolved in place.
pub fn resolve_class_slot(
    universe: &mut TypeUniverse,
    dictionary: &Dictionary,
    holder: TypeId,
    slot: usize,
) -> Result<TypeId, ResolveError> {
    let tier = universe.get(holder).tier;
    let class = match &universe.get(holder).slots[slot] {
        ReferenceSlot::Class(c) => c,
        _ => return Err(ResolveError::WrongSlotKind { expected: "class" }),
    };
    match class.state {
        ClassState::Resolved(id) => return Ok(id),
        ClassState::Failed => {
            return Err(ResolveError::PreviouslyFailed {
                name: class.name.clone(),
            })
        }
        ClassState::Unresolved => {}
    }
    let name = class.name.clone();
    let target = dictionary
        .find_loaded(tier, &name)
        .ok_or(ResolveError::TargetNotLoaded { name: name.clone() })?;
    if let ReferenceSlot::Class(c) = &mut universe.get_mut(holder).slots[slot] {
        c.state = ClassState::Resolved(target);
    }
    trace!(slot, name = %name, "resolved class reference");
    Ok(target)
}

/// Resolve a field or method slot: resolve its owner class slot first, then
/// check the member exists. On success the member slot is marked resolved.
pub fn resolve_member_slot(
    universe: &mut TypeUniverse,
    dictionary: &Dictionary,
    holder: TypeId,
    slot: usize,
) -> Result<TypeId, ResolveError> {
    let (class_slot, name, is_field) = match &universe.get(holder).slots[slot] {
        ReferenceSlot::Field(m) => (m.class_slot, m.name.clone(), true),
        ReferenceSlot::Method(m) => (m.class_slot, m.name.clone(), false),
        _ => return Err(ResolveError::WrongSlotKind { expected: "member" }),
    };
    let owner = resolve_class_slot(universe, dictionary, holder, class_slot)?;
    let found = if is_field {
        universe.find_field(owner, &name).is_some()
    } else {
        universe.find_method(owner, &name).is_some()
    };
    if !found {
        return Err(ResolveError::NoSuchMember {
            class: universe.get(owner).name.clone(),
            name,
        });
    }
    match &mut universe.get_mut(holder).slots[slot] {
        ReferenceSlot::Field(m) | ReferenceSlot::Method(m) => m.resolved = true,
        _ => {}
    }
    Ok(owner)
}

/// Bind the call site at `slot`. The bootstrap invocation itself is the
/// runtime's concern; here binding is recorded on the slot.
pub fn resolve_call_site(
    universe: &mut TypeUniverse,
    holder: TypeId,
    slot: usize,
) -> Result<(), ResolveError> {
    match &mut universe.get_mut(holder).slots[slot] {
        ReferenceSlot::CallSite(cs) => {
            cs.resolved = true;
            Ok(())
        }
        _ => Err(ResolveError::WrongSlotKind {
            expected: "call-site",
        }),
    }
}

/// Intern the string literal at `slot`.
pub fn intern_string(
    universe: &mut TypeUniverse,
    holder: TypeId,
    slot: usize,
) -> Result<(), ResolveError> {
    match &mut universe.get_mut(holder).slots[slot] {
        ReferenceSlot::String(s) => {
            s.interned = true;
            Ok(())
        }
        _ => Err(ResolveError::WrongSlotKind { expected: "string" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::{ClassSlot, MemberSlot};
    use crate::tier::LoaderTier;
    use crate::universe::{FieldDef, TypeData};

    fn universe_with_ref() -> (TypeUniverse, Dictionary, TypeId, TypeId) {
        let mut u = TypeUniverse::new();
        let target = u.add_type(TypeData {
            fields: vec![FieldDef {
                name: "value".to_string(),
                descriptor: "I".to_string(),
                is_static: false,
            }],
            ..TypeData::new("rt/Target", LoaderTier::BootCore)
        });
        let holder = u.add_type(TypeData {
            slots: vec![
                ReferenceSlot::Class(ClassSlot::unresolved("rt/Target")),
                ReferenceSlot::Field(MemberSlot::new(0, "value", "I")),
                ReferenceSlot::Field(MemberSlot::new(0, "missing", "I")),
            ],
            ..TypeData::new("app/Holder", LoaderTier::Application)
        });
        let dict = Dictionary::new();
        dict.define(LoaderTier::BootCore, "rt/Target", target);
        dict.define(LoaderTier::Application, "app/Holder", holder);
        (u, dict, holder, target)
    }

    #[test]
    fn test_class_resolution_through_delegation() {
        let (mut u, dict, holder, target) = universe_with_ref();
        let resolved = resolve_class_slot(&mut u, &dict, holder, 0).unwrap();
        assert_eq!(resolved, target);
        assert!(u.get(holder).slots[0].is_resolved());
        // Second attempt returns the cached result.
        assert_eq!(resolve_class_slot(&mut u, &dict, holder, 0).unwrap(), target);
    }

    #[test]
    fn test_unloaded_target_leaves_slot_unresolved() {
        let mut u = TypeUniverse::new();
        let holder = u.add_type(TypeData {
            slots: vec![ReferenceSlot::Class(ClassSlot::unresolved("rt/Ghost"))],
            ..TypeData::new("app/Holder", LoaderTier::Application)
        });
        let dict = Dictionary::new();
        let err = resolve_class_slot(&mut u, &dict, holder, 0).unwrap_err();
        assert!(matches!(err, ResolveError::TargetNotLoaded { .. }));
        assert!(!u.get(holder).slots[0].is_resolved());
    }

    #[test]
    fn test_member_resolution_checks_existence() {
        let (mut u, dict, holder, target) = universe_with_ref();
        assert_eq!(resolve_member_slot(&mut u, &dict, holder, 1).unwrap(), target);
        assert!(u.get(holder).slots[1].is_resolved());

        let err = resolve_member_slot(&mut u, &dict, holder, 2).unwrap_err();
        assert!(matches!(err, ResolveError::NoSuchMember { .. }));
        assert!(!u.get(holder).slots[2].is_resolved());
    }

    #[test]
    fn test_failed_state_is_sticky() {
        let (mut u, dict, holder, _) = universe_with_ref();
        if let ReferenceSlot::Class(c) = &mut u.get_mut(holder).slots[0] {
            c.state = ClassState::Failed;
        }
        let err = resolve_class_slot(&mut u, &dict, holder, 0).unwrap_err();
        assert!(matches!(err, ResolveError::PreviouslyFailed { .. }));
    }
}
