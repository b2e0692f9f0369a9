//! Replay failures.

use std::fmt;

use prelink_model::tier::LoaderTier;

/// Why replay of a snapshot stopped.
///
/// `DefineFailed` is recoverable and handled inside the engine (the type
/// degrades to ordinary lazy loading); it appears here only when a caller
/// drives a [`crate::TierLoader`] directly. The other variants mean the
/// snapshot's structural assumptions no longer hold. `IdentityMismatch` in
/// particular is fatal: the driver must terminate rather than continue with
/// corrupted cached linkage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// A tier was replayed out of order, or twice.
    TierOrder { tier: LoaderTier },
    /// An initiation-record entry was not defined by any ancestor tier.
    /// Only a corrupt snapshot produces this.
    MissingInitiated { name: String },
    /// The definition path failed for one type.
    DefineFailed { name: String, reason: String },
    /// The defined type's identity differs from the snapshot's expectation.
    /// A live instrumentation agent redefined it between build and replay.
    IdentityMismatch {
        name: String,
        expected_tier: LoaderTier,
        found: String,
        found_tier: LoaderTier,
    },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::TierOrder { tier } => {
                write!(f, "tier {tier} replayed out of order")
            }
            ReplayError::MissingInitiated { name } => {
                write!(f, "initiated type {name} not defined by any ancestor tier")
            }
            ReplayError::DefineFailed { name, reason } => {
                write!(f, "definition of {name} failed: {reason}")
            }
            ReplayError::IdentityMismatch {
                name,
                expected_tier,
                found,
                found_tier,
            } => write!(
                f,
                "identity mismatch: expected {name} in {expected_tier}, \
                 produced {found} in {found_tier}"
            ),
        }
    }
}

impl std::error::Error for ReplayError {}

impl ReplayError {
    /// True for the condition the driver must terminate on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReplayError::IdentityMismatch { .. })
    }
}
