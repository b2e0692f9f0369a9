//! Shared type-system model for the prelink workspace.
//!
//! This crate provides the foundational types used across the build-time
//! analysis crates and the startup replay engine, breaking circular
//! dependency chains:
//!
//! - [`LoaderTier`](tier::LoaderTier) - the four delegation tiers
//! - [`TypeUniverse`](universe::TypeUniverse) - arena of live type definitions
//! - [`ReferenceSlot`](slot::ReferenceSlot) - one symbolic-reference table entry
//! - [`Dictionary`](dictionary::Dictionary) - the global type dictionary and its lock
//! - [`resolver`] - the symbolic-reference resolvers shared by build and replay
//!
//! The prelinker never owns a type's lifetime; everything here is either an
//! arena index ([`TypeId`](universe::TypeId)) or borrowed from the universe.

pub mod dictionary;
pub mod resolver;
pub mod slot;
pub mod tier;
pub mod universe;

pub use dictionary::Dictionary;
pub use resolver::ResolveError;
pub use slot::{
    BootstrapMethod, CallSiteSlot, ClassSlot, ClassState, MemberSlot, ReferenceSlot, SlotKind,
    StringSlot,
};
pub use tier::LoaderTier;
pub use universe::{FieldDef, MethodDef, TypeData, TypeId, TypeUniverse};
