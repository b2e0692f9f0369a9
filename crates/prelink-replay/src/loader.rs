//! The tier-appropriate definition path.
//!
//! The engine materializes a candidate [`TypeData`] from the archive and asks
//! the loader to define it. The loader may instead return a type the runtime
//! already produced for that name, which is how an instrumentation agent's
//! redefinition surfaces: the engine compares the returned identity against
//! the snapshot's expectation.

use prelink_model::tier::LoaderTier;
use prelink_model::universe::{TypeData, TypeId, TypeUniverse};

use crate::error::ReplayError;

/// One loader's definition path.
pub trait TierLoader {
    /// Define the type described by `proto` in `tier`, or return the type
    /// already defined under that name.
    fn define(
        &mut self,
        universe: &mut TypeUniverse,
        tier: LoaderTier,
        proto: TypeData,
    ) -> Result<TypeId, ReplayError>;
}

/// The default path: materialize straight from the archive. Used when no
/// agent or custom definition hook is active.
#[derive(Default)]
pub struct ArchiveLoader;

impl TierLoader for ArchiveLoader {
    fn define(
        &mut self,
        universe: &mut TypeUniverse,
        tier: LoaderTier,
        proto: TypeData,
    ) -> Result<TypeId, ReplayError> {
        if let Some(existing) = universe.lookup(tier, &proto.name) {
            return Ok(existing);
        }
        Ok(universe.add_type(proto))
    }
}
