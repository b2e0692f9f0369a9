//! Loader delegation tiers.
//!
//! A type belongs to exactly one tier (its defining loader). Tiers are totally
//! ordered by delegation: Application delegates to Platform, which delegates to
//! the bootstrap loader. The bootstrap loader is split into two replay tiers:
//! BootCore holds only base-image types, BootExtended holds the remaining boot
//! types. A tier may additionally *initiate* (resolve without defining) types
//! defined in an ancestor tier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four totally ordered loader delegation levels.
///
/// The derived `Ord` follows delegation order: `BootCore` is the lowest tier
/// and `Application` the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderTier {
    /// Bootstrap loader, base-image types only. Replayed first.
    BootCore,
    /// Bootstrap loader, types outside the base image.
    BootExtended,
    /// Platform loader.
    Platform,
    /// Application loader. Replayed last.
    Application,
}

impl LoaderTier {
    /// All tiers in replay order.
    pub const ALL: [LoaderTier; 4] = [
        LoaderTier::BootCore,
        LoaderTier::BootExtended,
        LoaderTier::Platform,
        LoaderTier::Application,
    ];

    /// The tier this tier delegates to, if any.
    pub fn parent(self) -> Option<LoaderTier> {
        match self {
            LoaderTier::BootCore => None,
            LoaderTier::BootExtended => Some(LoaderTier::BootCore),
            LoaderTier::Platform => Some(LoaderTier::BootExtended),
            LoaderTier::Application => Some(LoaderTier::Platform),
        }
    }

    /// True if `ancestor` is reachable from `self` through the delegation
    /// chain (a tier delegates to itself).
    pub fn delegates_to(self, ancestor: LoaderTier) -> bool {
        ancestor <= self
    }

    /// Both BootCore and BootExtended are served by the bootstrap loader.
    pub fn is_boot(self) -> bool {
        matches!(self, LoaderTier::BootCore | LoaderTier::BootExtended)
    }

    /// True if the two tiers are backed by the same loader instance.
    ///
    /// The boot split is a replay-ordering detail, not a loader boundary, so
    /// no initiation record is kept between the two boot tiers.
    pub fn same_loader(self, other: LoaderTier) -> bool {
        self == other || (self.is_boot() && other.is_boot())
    }

    /// Tiers that keep an initiation record (types referenced but defined by
    /// an ancestor tier). The boot tiers cannot delegate upward and need none.
    pub fn has_initiation_record(self) -> bool {
        matches!(self, LoaderTier::Platform | LoaderTier::Application)
    }

    /// Short label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            LoaderTier::BootCore => "boot-core",
            LoaderTier::BootExtended => "boot-ext",
            LoaderTier::Platform => "platform",
            LoaderTier::Application => "app",
        }
    }
}

impl fmt::Display for LoaderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_order_is_delegation_order() {
        let tiers = LoaderTier::ALL;
        for pair in tiers.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_parent_chain_terminates_at_boot_core() {
        let mut tier = LoaderTier::Application;
        let mut hops = 0;
        while let Some(parent) = tier.parent() {
            assert!(parent < tier);
            tier = parent;
            hops += 1;
        }
        assert_eq!(tier, LoaderTier::BootCore);
        assert_eq!(hops, 3);
    }

    #[test]
    fn test_delegates_to() {
        assert!(LoaderTier::Application.delegates_to(LoaderTier::BootCore));
        assert!(LoaderTier::Application.delegates_to(LoaderTier::Application));
        assert!(!LoaderTier::BootCore.delegates_to(LoaderTier::Platform));
        assert!(!LoaderTier::Platform.delegates_to(LoaderTier::Application));
    }

    #[test]
    fn test_boot_tiers_share_a_loader() {
        assert!(LoaderTier::BootCore.same_loader(LoaderTier::BootExtended));
        assert!(LoaderTier::Platform.same_loader(LoaderTier::Platform));
        assert!(!LoaderTier::Platform.same_loader(LoaderTier::Application));
        assert!(!LoaderTier::BootExtended.same_loader(LoaderTier::Platform));
    }

    #[test]
    fn test_initiation_records_exist_for_two_tiers() {
        let with_records: Vec<_> = LoaderTier::ALL
            .iter()
            .filter(|t| t.has_initiation_record())
            .collect();
        assert_eq!(
            with_records,
            vec![&LoaderTier::Platform, &LoaderTier::Application]
        );
    }
}
