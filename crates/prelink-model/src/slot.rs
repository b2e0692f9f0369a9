//! Reference slots: entries in a type's symbolic-reference table.
//!
//! Every cross-type reference a type makes goes through one slot in its
//! reference table. Slots are mutated in place by the resolvers; the safety
//! analyzer only reads and classifies them. The five variants form a closed
//! set with one analyzer handler per variant.

use serde::{Deserialize, Serialize};

use crate::universe::TypeId;

/// One entry in a type's symbolic-reference table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSlot {
    /// A reference to another type by name.
    Class(ClassSlot),
    /// A field reference, through a class slot in the same table.
    Field(MemberSlot),
    /// A method reference, through a class slot in the same table.
    Method(MemberSlot),
    /// A dynamically-bound call site, resolved via a bootstrap method.
    CallSite(CallSiteSlot),
    /// A string literal, interned on first use.
    String(StringSlot),
}

/// Resolution state of a class slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassState {
    /// Never resolved; holds only the symbolic name.
    Unresolved,
    /// Resolved to a live type.
    Resolved(TypeId),
    /// Resolution failed permanently; re-resolution must not be attempted.
    Failed,
}

/// A symbolic class reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSlot {
    /// Qualified name of the referenced type.
    pub name: String,
    #[serde(default = "unresolved")]
    pub state: ClassState,
}

fn unresolved() -> ClassState {
    ClassState::Unresolved
}

impl ClassSlot {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ClassState::Unresolved,
        }
    }

    pub fn resolved_type(&self) -> Option<TypeId> {
        match self.state {
            ClassState::Resolved(id) => Some(id),
            _ => None,
        }
    }
}

/// A field or method reference. The owning class is named indirectly through
/// `class_slot`, an index of a [`ReferenceSlot::Class`] entry in the same table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSlot {
    /// Index of the class slot naming the member's owner.
    pub class_slot: usize,
    /// Member name.
    pub name: String,
    /// Member type descriptor.
    pub descriptor: String,
    /// True once the member reference has been resolved.
    #[serde(default)]
    pub resolved: bool,
    /// True for method references bound by dynamic dispatch (virtual or
    /// interface call); false for directly-bound calls.
    #[serde(default)]
    pub dynamic_dispatch: bool,
}

impl MemberSlot {
    pub fn new(class_slot: usize, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            class_slot,
            name: name.into(),
            descriptor: descriptor.into(),
            resolved: false,
            dynamic_dispatch: false,
        }
    }
}

/// Identity of a bootstrap method: the static factory invoked to produce a
/// call site on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapMethod {
    /// Qualified name of the type holding the bootstrap method.
    pub holder: String,
    /// Bootstrap method name.
    pub name: String,
    /// Bootstrap method descriptor.
    pub descriptor: String,
}

impl BootstrapMethod {
    pub fn new(
        holder: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            holder: holder.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// A dynamically-bound call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSiteSlot {
    /// The bootstrap method that binds this call site.
    pub bootstrap: BootstrapMethod,
    /// Descriptor of the invoked call; its return type names the functional
    /// interface produced by metafactory-style bootstraps.
    pub invoked_descriptor: String,
    /// True once the call site has been bound.
    #[serde(default)]
    pub resolved: bool,
}

/// A string literal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringSlot {
    pub value: String,
    /// True once the literal has been interned into the live heap.
    #[serde(default)]
    pub interned: bool,
}

/// Discriminant of a [`ReferenceSlot`], for logging and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Class,
    Field,
    Method,
    CallSite,
    String,
}

impl SlotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotKind::Class => "class",
            SlotKind::Field => "field",
            SlotKind::Method => "method",
            SlotKind::CallSite => "call-site",
            SlotKind::String => "string",
        }
    }
}

impl ReferenceSlot {
    pub fn kind(&self) -> SlotKind {
        match self {
            ReferenceSlot::Class(_) => SlotKind::Class,
            ReferenceSlot::Field(_) => SlotKind::Field,
            ReferenceSlot::Method(_) => SlotKind::Method,
            ReferenceSlot::CallSite(_) => SlotKind::CallSite,
            ReferenceSlot::String(_) => SlotKind::String,
        }
    }

    /// True if the slot has reached a resolved (or interned) state.
    pub fn is_resolved(&self) -> bool {
        match self {
            ReferenceSlot::Class(c) => matches!(c.state, ClassState::Resolved(_)),
            ReferenceSlot::Field(m) | ReferenceSlot::Method(m) => m.resolved,
            ReferenceSlot::CallSite(cs) => cs.resolved,
            ReferenceSlot::String(s) => s.interned,
        }
    }
}

/// Extract the class name of a descriptor's return type.
///
/// Returns `None` for primitive, array, and malformed return types; those are
/// never eligible as functional-interface targets.
pub fn return_type_name(descriptor: &str) -> Option<&str> {
    let (_, ret) = descriptor.rsplit_once(')')?;
    let inner = ret.strip_prefix('L')?;
    inner.strip_suffix(';')
}
