//! Build-time core of the linkage cache.
//!
//! One archive pass runs against a quiesced type universe on a single thread:
//!
//! 1. [`BuildSession::initialize`] seeds the builtin table from the universe's
//!    bootstrap roots.
//! 2. The dependency collector ([`collect_all_tiers`]) walks each tier's
//!    hierarchy and fills the per-tier preload lists and initiation records.
//! 3. The safety analyzer ([`analyze_and_resolve`]) classifies every reference
//!    slot of every preloaded type, committing the cacheable resolutions and
//!    clearing the rest.
//! 4. The recorder ([`finalize_snapshot`]) drains the session into a
//!    [`prelink_snapshot::Snapshot`].
//!
//! All state for the pass lives on the [`BuildSession`]; nothing here touches
//! process-wide statics.

pub mod analyzer;
pub mod callsite;
pub mod collector;
pub mod recorder;
pub mod session;
pub mod tables;

pub use analyzer::{analyze_and_resolve, can_cache, can_cache_resolved_class};
pub use callsite::is_eligible;
pub use collector::{collect_all_tiers, collect_tier};
pub use recorder::finalize_snapshot;
pub use session::{BuildSession, SessionConfig};
pub use tables::{InitiationRecord, TypeSet};
