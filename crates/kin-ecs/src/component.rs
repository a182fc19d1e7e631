//! Component kinds and their dense indices.
//!
//! Every distinct Rust type stored on an entity is a component kind. The
//! [`ComponentTypeRegistry`] hands each kind a small, dense [`ComponentType`] index the
//! first time it is seen; the index addresses an entity's component slots and the bits
//! of every presence bitset.

use std::{
    any::{Any, TypeId},
    fmt,
};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

/// Trait for types that can be stored on an entity.
///
/// Implemented for every `Send + Sync + 'static` type. The methods give the engine
/// type-erased access to a boxed component.
///
/// # Example
///
/// ```
/// struct Position { x: f32, y: f32 }
///
/// let mut engine = kin_ecs::Engine::new();
/// let e = engine.spawn().unwrap();
/// engine.insert(e, Position { x: 1.0, y: 2.0 }).unwrap();
/// assert_eq!(engine.get::<Position>(e).map(|p| p.x + p.y), Some(3.0));
/// ```
pub trait Component: Send + Sync + 'static {
    /// Borrow as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as [`Any`] for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Convert a boxed component into a boxed [`Any`].
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Send + Sync + 'static> Component for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Dense index of a component kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentType(u32);

impl ComponentType {
    /// Create a component type from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// The index as a `usize`, for slot and bit addressing.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.0)
    }
}

/// What the registry knows about one component kind.
#[derive(Clone)]
pub struct ComponentInfo {
    ty: ComponentType,
    name: &'static str,
    type_id: TypeId,
}

impl ComponentInfo {
    /// Get the component type.
    #[must_use]
    pub const fn ty(&self) -> ComponentType {
        self.ty
    }

    /// Get the Rust type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Check if this info is for the given type.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("ty", &self.ty)
            .field("name", &self.name)
            .finish()
    }
}

/// Maps Rust types to dense [`ComponentType`] indices.
///
/// Indices are handed out in first-use order starting at 0, never reused, and stable
/// for the registry's lifetime. Each engine owns its own registry, so independent
/// engines never share an index space.
#[derive(Default)]
pub struct ComponentTypeRegistry {
    by_type_id: HashMap<TypeId, ComponentType, FxBuildHasher>,
    /// Indexed by `ComponentType`.
    infos: Vec<ComponentInfo>,
}

impl ComponentTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the index for `T`, allocating the next one on first use.
    pub fn index_for<T: Component>(&mut self) -> ComponentType {
        let type_id = TypeId::of::<T>();

        if let Some(&ty) = self.by_type_id.get(&type_id) {
            return ty;
        }

        let ty = ComponentType(self.infos.len() as u32);
        self.by_type_id.insert(type_id, ty);
        self.infos.push(ComponentInfo {
            ty,
            name: std::any::type_name::<T>(),
            type_id,
        });
        ty
    }

    /// Get the index for `T` without allocating one.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<ComponentType> {
        self.get_by_type_id(TypeId::of::<T>())
    }

    /// Get the index for a [`TypeId`], if registered.
    #[must_use]
    pub fn get_by_type_id(&self, type_id: TypeId) -> Option<ComponentType> {
        self.by_type_id.get(&type_id).copied()
    }

    /// Get info for a component type.
    #[must_use]
    pub fn info(&self, ty: ComponentType) -> Option<&ComponentInfo> {
        self.infos.get(ty.index())
    }

    /// Type name of a component type, or `"<unknown>"`.
    #[must_use]
    pub fn name(&self, ty: ComponentType) -> &'static str {
        self.info(ty).map_or("<unknown>", ComponentInfo::name)
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Check if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Iterate registered kinds in index order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }
}

impl fmt::Debug for ComponentTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTypeRegistry")
            .field("count", &self.len())
            .field("components", &self.infos)
            .finish()
    }
}
