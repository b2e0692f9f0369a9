//! The persisted snapshot: tiered preload lists, initiation records, and the
//! buffered type table they index into.
//!
//! A [`Snapshot`](snapshot::Snapshot) is a pure transform of the live
//! universe: the [`ArchiveBuffer`](buffer::ArchiveBuffer) copies each recorded
//! type into an independently-owned buffered descriptor and remaps every live
//! [`TypeId`](prelink_model::TypeId) to a [`BufferedId`](buffer::BufferedId).
//! No live reference survives into the persisted structure, so the two
//! identity spaces can never be confused.
//!
//! Byte layout and relocation of the persisted region are the archive-buffer
//! collaborator's concern; [`serialize`] round-trips the snapshot's table of
//! contents through a versioned bincode framing.

pub mod buffer;
pub mod serialize;
pub mod snapshot;

pub use buffer::{ArchiveBuffer, BufferedId, BufferedSlot, BufferedType};
pub use serialize::{read_from, write_to, SnapshotError};
pub use snapshot::{CallSiteRef, Snapshot, SnapshotGeneration, SnapshotSummary};
