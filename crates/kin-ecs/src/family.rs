//! Families: predicates over an entity's component kinds.
//!
//! A [`Family`] is an immutable `(all, any, exclude)` triple of component bitsets.
//! Families are interned by a [`FamilyRegistry`]: building the same triple twice, in
//! any call order, yields the same `Arc<Family>` and the same [`FamilyId`].

use std::{fmt, sync::Arc};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;

use crate::{Bits, Component, ComponentType, ComponentTypeRegistry, EntityRecord};

/// Dense index of an interned family.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FamilyId(u32);

impl FamilyId {
    /// Create a family ID from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// The index as a `usize`, for bit and table addressing.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FamilyId({})", self.0)
    }
}

/// An immutable predicate over component presence.
///
/// An entity matches when it has at least one component and
/// - it has every kind in `all`,
/// - it has at least one kind in `any` (if `any` is non-empty),
/// - it has no kind in `exclude`.
pub struct Family {
    id: FamilyId,
    all: Bits,
    any: Bits,
    exclude: Bits,
}

impl Family {
    /// Start describing a family.
    #[must_use]
    pub fn builder() -> FamilyBuilder {
        FamilyBuilder::default()
    }

    /// Get the family's ID.
    #[must_use]
    pub const fn id(&self) -> FamilyId {
        self.id
    }

    /// The family's index, addressing per-entity family bits.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.id.index()
    }

    /// Kinds an entity must all have.
    #[must_use]
    pub const fn all(&self) -> &Bits {
        &self.all
    }

    /// Kinds an entity must have at least one of.
    #[must_use]
    pub const fn any(&self) -> &Bits {
        &self.any
    }

    /// Kinds an entity must have none of.
    #[must_use]
    pub const fn exclude(&self) -> &Bits {
        &self.exclude
    }

    /// Test an entity's components against this family.
    #[must_use]
    pub fn matches(&self, record: &EntityRecord) -> bool {
        self.matches_bits(record.component_bits())
    }

    /// Test a component presence bitset against this family.
    #[must_use]
    pub fn matches_bits(&self, present: &Bits) -> bool {
        if present.is_empty() {
            return false;
        }
        if !present.contains_all(&self.all) {
            return false;
        }
        if !self.any.is_empty() && !self.any.intersects(present) {
            return false;
        }
        self.exclude.is_empty() || !self.exclude.intersects(present)
    }
}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("id", &self.id)
            .field("all", &self.all)
            .field("any", &self.any)
            .field("exclude", &self.exclude)
            .finish()
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Family({}: all=", self.id.0)?;
        write_list(f, &self.all)?;
        f.write_str(" any=")?;
        write_list(f, &self.any)?;
        f.write_str(" exclude=")?;
        write_list(f, &self.exclude)?;
        f.write_str(")")
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, bits: &Bits) -> fmt::Result {
    f.write_str("[")?;
    for (i, index) in bits.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{index}")?;
    }
    f.write_str("]")
}

/// A component kind named either by Rust type or by an already-known index.
#[derive(Clone, Copy, Debug)]
enum ComponentKind {
    Typed(fn(&mut ComponentTypeRegistry) -> ComponentType),
    Index(ComponentType),
}

impl ComponentKind {
    fn resolve(self, types: &mut ComponentTypeRegistry) -> ComponentType {
        match self {
            Self::Typed(index_for) => index_for(types),
            Self::Index(ty) => ty,
        }
    }
}

type Kinds = SmallVec<[ComponentKind; 4]>;

/// Accumulates the three clauses of a family.
///
/// Each call adds to its clause; call order does not matter. The builder is an owned
/// value and is consumed by [`build`](Self::build).
///
/// ```
/// use kin_ecs::{Engine, Family};
///
/// struct Position;
/// struct Velocity;
/// struct Frozen;
///
/// let mut engine = Engine::new();
/// let moving = engine.family(
///     Family::builder()
///         .all::<Position>()
///         .all::<Velocity>()
///         .exclude::<Frozen>(),
/// );
/// let again = engine.family(
///     Family::builder()
///         .exclude::<Frozen>()
///         .all::<Velocity>()
///         .all::<Position>(),
/// );
/// assert_eq!(moving.id(), again.id());
/// ```
#[derive(Clone, Debug, Default)]
pub struct FamilyBuilder {
    all: Kinds,
    any: Kinds,
    exclude: Kinds,
}

impl FamilyBuilder {
    /// Require `T`.
    #[must_use]
    pub fn all<T: Component>(mut self) -> Self {
        self.all
            .push(ComponentKind::Typed(ComponentTypeRegistry::index_for::<T>));
        self
    }

    /// Require at least one of the kinds passed to `any`.
    #[must_use]
    pub fn any<T: Component>(mut self) -> Self {
        self.any
            .push(ComponentKind::Typed(ComponentTypeRegistry::index_for::<T>));
        self
    }

    /// Reject entities with `T`.
    #[must_use]
    pub fn exclude<T: Component>(mut self) -> Self {
        self.exclude
            .push(ComponentKind::Typed(ComponentTypeRegistry::index_for::<T>));
        self
    }

    /// Require every kind in `types`.
    #[must_use]
    pub fn all_types(mut self, types: &[ComponentType]) -> Self {
        self.all
            .extend(types.iter().copied().map(ComponentKind::Index));
        self
    }

    /// Require at least one kind in `types`.
    #[must_use]
    pub fn any_types(mut self, types: &[ComponentType]) -> Self {
        self.any
            .extend(types.iter().copied().map(ComponentKind::Index));
        self
    }

    /// Reject entities with any kind in `types`.
    #[must_use]
    pub fn exclude_types(mut self, types: &[ComponentType]) -> Self {
        self.exclude
            .extend(types.iter().copied().map(ComponentKind::Index));
        self
    }

    /// Resolve the clauses and intern the family.
    pub fn build(
        self,
        types: &mut ComponentTypeRegistry,
        families: &mut FamilyRegistry,
    ) -> Arc<Family> {
        let all = resolve(&self.all, types);
        let any = resolve(&self.any, types);
        let exclude = resolve(&self.exclude, types);
        families.intern(all, any, exclude)
    }
}

fn resolve(kinds: &[ComponentKind], types: &mut ComponentTypeRegistry) -> Bits {
    kinds.iter().map(|kind| kind.resolve(types).index()).collect()
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct FamilyKey {
    all: Bits,
    any: Bits,
    exclude: Bits,
}

/// Interning table for families.
///
/// Families are never removed; IDs are dense from 0.
#[derive(Default)]
pub struct FamilyRegistry {
    by_key: HashMap<FamilyKey, Arc<Family>, FxBuildHasher>,
    /// Indexed by `FamilyId`.
    families: Vec<Arc<Family>>,
}

impl FamilyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the family for a clause triple, creating it on first request.
    pub fn intern(&mut self, all: Bits, any: Bits, exclude: Bits) -> Arc<Family> {
        let key = FamilyKey { all, any, exclude };
        if let Some(family) = self.by_key.get(&key) {
            return Arc::clone(family);
        }

        let family = Arc::new(Family {
            id: FamilyId(self.families.len() as u32),
            all: key.all.clone(),
            any: key.any.clone(),
            exclude: key.exclude.clone(),
        });
        self.families.push(Arc::clone(&family));
        self.by_key.insert(key, Arc::clone(&family));
        family
    }

    /// Get a family by ID.
    #[must_use]
    pub fn get(&self, id: FamilyId) -> Option<&Arc<Family>> {
        self.families.get(id.index())
    }

    /// Check that `family` was interned by this registry.
    #[must_use]
    pub fn owns(&self, family: &Family) -> bool {
        self.families
            .get(family.index())
            .is_some_and(|interned| std::ptr::eq(interned.as_ref(), family))
    }

    /// Number of interned families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Check if no family has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Iterate families in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Family>> {
        self.families.iter()
    }
}

impl fmt::Debug for FamilyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilyRegistry")
            .field("count", &self.len())
            .finish()
    }
}
