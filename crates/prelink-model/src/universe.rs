//! The live type universe: an arena of type definitions.
//!
//! The runtime owns every type's lifetime; the prelinker holds only arena
//! indices ([`TypeId`]) into the universe. All hierarchy walks are explicit
//! worklist loops so deep interface hierarchies cannot exhaust the call stack.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::slot::ReferenceSlot;
use crate::tier::LoaderTier;

/// Stable arena index of a type in its [`TypeUniverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A field declared by a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub is_static: bool,
}

/// A method declared by a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub is_static: bool,
}

/// One class or interface in the universe.
///
/// Identity is (qualified name, defining tier). Lifecycle flags advance
/// monotonically: defined, then linked, then initialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeData {
    /// Qualified name. Hidden types carry a synthetic, non-addressable name.
    pub name: String,
    /// Defining loader tier.
    pub tier: LoaderTier,
    #[serde(default)]
    pub super_type: Option<TypeId>,
    /// Directly-implemented interfaces, declaration order preserved.
    #[serde(default)]
    pub interfaces: SmallVec<[TypeId; 4]>,
    #[serde(default)]
    pub is_interface: bool,
    /// Synthetically generated, not addressable by name.
    #[serde(default)]
    pub hidden: bool,
    /// Defined by a non-hierarchical custom loader rather than one of the
    /// four tiers.
    #[serde(default)]
    pub unregistered: bool,
    /// True if the type originates from a named module.
    #[serde(default)]
    pub in_named_module: bool,
    /// True if the backing artifact is the canonical runtime image.
    #[serde(default = "default_true")]
    pub from_runtime_image: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
    /// Has a static initializer of its own.
    #[serde(default)]
    pub has_initializer: bool,
    /// Carries a captured pre-initialized state usable for fast-path init.
    #[serde(default)]
    pub preinitialized: bool,
    /// Excluded from the archive for reasons outside the prelinker.
    #[serde(default)]
    pub excluded_from_archive: bool,
    #[serde(default = "default_true")]
    pub defined: bool,
    #[serde(default = "default_true")]
    pub linked: bool,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    /// The type's symbolic-reference table.
    #[serde(default)]
    pub slots: Vec<ReferenceSlot>,
}

fn default_true() -> bool {
    true
}

impl TypeData {
    /// A plain, defined and linked class in the given tier. Build-time
    /// universes hold only materialized (loaded, linked) types.
    pub fn new(name: impl Into<String>, tier: LoaderTier) -> Self {
        Self {
            name: name.into(),
            tier,
            super_type: None,
            interfaces: SmallVec::new(),
            is_interface: false,
            hidden: false,
            unregistered: false,
            in_named_module: false,
            from_runtime_image: true,
            is_public: true,
            has_initializer: false,
            preinitialized: false,
            excluded_from_archive: false,
            defined: true,
            linked: true,
            initialized: false,
            fields: Vec::new(),
            methods: Vec::new(),
            slots: Vec::new(),
        }
    }
}

/// Arena of all live types, plus the designated bootstrap roots whose closure
/// forms the builtin set resolved unconditionally at runtime start.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TypeUniverse {
    types: Vec<TypeData>,
    #[serde(default)]
    bootstrap_roots: Vec<TypeId>,
}

impl TypeUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, data: TypeData) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(data);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeData {
        &self.types[id.index()]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeData {
        &mut self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate types in materialization order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeData)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (TypeId(i as u32), t))
    }

    /// Mark a type as a bootstrap root; its supertype closure becomes part of
    /// the builtin set at session initialization.
    pub fn mark_bootstrap_root(&mut self, id: TypeId) {
        if !self.bootstrap_roots.contains(&id) {
            self.bootstrap_roots.push(id);
        }
    }

    pub fn bootstrap_roots(&self) -> &[TypeId] {
        &self.bootstrap_roots
    }

    /// Linear lookup by (tier, name). The dictionary is the fast path; this
    /// exists for fixtures and tests.
    pub fn lookup(&self, tier: LoaderTier, name: &str) -> Option<TypeId> {
        self.iter()
            .find(|(_, t)| t.tier == tier && t.name == name)
            .map(|(id, _)| id)
    }

    /// True if `sup` is `sub` itself or a transitive supertype/super-interface
    /// of `sub`.
    pub fn is_subtype_of(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        let mut stack = vec![sub];
        let mut seen = vec![false; self.types.len()];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            if id == sup {
                return true;
            }
            let data = self.get(id);
            if let Some(s) = data.super_type {
                stack.push(s);
            }
            stack.extend(data.interfaces.iter().copied());
        }
        false
    }

    /// True if the type, or any supertype or super-interface of it, declares a
    /// static initializer.
    pub fn has_initializer_in_hierarchy(&self, id: TypeId) -> bool {
        let mut stack = vec![id];
        let mut seen = vec![false; self.types.len()];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            let data = self.get(id);
            if data.has_initializer {
                return true;
            }
            if let Some(s) = data.super_type {
                stack.push(s);
            }
            stack.extend(data.interfaces.iter().copied());
        }
        false
    }

    /// Find a field by name, searching the type then its hierarchy.
    pub fn find_field(&self, id: TypeId, name: &str) -> Option<&FieldDef> {
        let mut stack = vec![id];
        let mut seen = vec![false; self.types.len()];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            let data = self.get(id);
            if let Some(f) = data.fields.iter().find(|f| f.name == name) {
                return Some(f);
            }
            if let Some(s) = data.super_type {
                stack.push(s);
            }
            stack.extend(data.interfaces.iter().copied());
        }
        None
    }

    /// Find a method by name, searching the type then its superclass chain.
    pub fn find_method(&self, id: TypeId, name: &str) -> Option<&MethodDef> {
        let mut current = Some(id);
        while let Some(id) = current {
            let data = self.get(id);
            if let Some(m) = data.methods.iter().find(|m| m.name == name) {
                return Some(m);
            }
            current = data.super_type;
        }
        None
    }
}
