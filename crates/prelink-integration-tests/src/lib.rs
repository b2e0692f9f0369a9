//! Shared fixtures for the end-to-end tests.

use prelink_model::tier::LoaderTier;
use prelink_model::universe::{TypeData, TypeId, TypeUniverse};

/// `Object <- Base <- Derived`, `Base implements Iface`, all boot-core.
pub struct Diamond {
    pub universe: TypeUniverse,
    pub object: TypeId,
    pub iface: TypeId,
    pub base: TypeId,
    pub derived: TypeId,
}

pub fn diamond() -> Diamond {
    let mut universe = TypeUniverse::new();
    let object = universe.add_type(TypeData::new("rt/Object", LoaderTier::BootCore));
    let iface = universe.add_type(TypeData {
        is_interface: true,
        ..TypeData::new("rt/Iface", LoaderTier::BootCore)
    });
    let base = universe.add_type(TypeData {
        super_type: Some(object),
        interfaces: [iface].into_iter().collect(),
        ..TypeData::new("rt/Base", LoaderTier::BootCore)
    });
    let derived = universe.add_type(TypeData {
        super_type: Some(base),
        ..TypeData::new("rt/Derived", LoaderTier::BootCore)
    });
    Diamond {
        universe,
        object,
        iface,
        base,
        derived,
    }
}
