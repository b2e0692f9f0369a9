//! Startup-side replay of a recorded snapshot.
//!
//! The runtime's class-loading driver calls [`ReplayEngine::replay_tier`]
//! once per loader it instantiates, strictly in tier order, and
//! [`ReplayEngine::replay_deferred_call_sites`] once after the final tier.
//! Completion of the boot-core tier and of the whole replay are published
//! through atomic flags; concurrent readers use acquire loads and never
//! observe a partially replayed tier.

pub mod engine;
pub mod error;
pub mod loader;

pub use engine::{ReplayCounters, ReplayEngine};
pub use error::ReplayError;
pub use loader::{ArchiveLoader, TierLoader};
