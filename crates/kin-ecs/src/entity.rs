//! Entity handles, slot allocation, and per-entity records.
//!
//! Entities use a generational index so a slot can be reused while stale handles to
//! its previous occupant are still detected.

use std::fmt;

use bitflags::bitflags;

use crate::{Bits, Component, ComponentType, pool::Poolable};

/// Generation counter to detect stale entity references.
/// Incremented each time an entity slot is released.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(u32);

impl Generation {
    /// Create a new generation (starts at 0).
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Increment the generation counter.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Get the raw generation value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Raw entity index into the engine's slot table.
pub type EntityId = u32;

/// Handle to an entity in an [`Engine`](crate::Engine).
///
/// A handle is an `id` (slot index) plus the `generation` of the slot at the time the
/// entity was created. Handles are `Copy` and stay valid until the entity is removed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    id: EntityId,
    generation: Generation,
}

impl Entity {
    /// A handle that never refers to a live entity.
    pub const DANGLING: Entity = Entity {
        id: u32::MAX,
        generation: Generation(u32::MAX),
    };

    /// Create a handle from an ID and generation.
    #[must_use]
    pub const fn new(id: EntityId, generation: Generation) -> Self {
        Self { id, generation }
    }

    /// Get the entity's slot index.
    #[must_use]
    pub const fn id(self) -> EntityId {
        self.id
    }

    /// Get the entity's generation.
    #[must_use]
    pub const fn generation(self) -> Generation {
        self.generation
    }

    /// Pack into a single u64.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation.0 as u64) << 32) | (self.id as u64)
    }

    /// Unpack from a u64.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            id: bits as u32,
            generation: Generation((bits >> 32) as u32),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.id, self.generation.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.generation.0)
    }
}

/// Allocator for entity slots with generation tracking.
///
/// Slots released while a tick is running go through [`deallocate_deferred`]: the
/// generation is bumped at once, so stale handles are rejected immediately, but the
/// slot only becomes reusable after [`flush`].
///
/// [`deallocate_deferred`]: Self::deallocate_deferred
/// [`flush`]: Self::flush
pub struct EntityAllocator {
    /// Generation for each slot.
    generations: Vec<Generation>,
    /// Slots ready for reuse.
    free_list: Vec<EntityId>,
    /// Slots released mid-tick.
    pending: Vec<EntityId>,
    alive_count: u32,
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityAllocator {
    /// Create a new allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generations: Vec::new(),
            free_list: Vec::new(),
            pending: Vec::new(),
            alive_count: 0,
        }
    }

    /// Create an allocator with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            generations: Vec::with_capacity(capacity),
            free_list: Vec::with_capacity(capacity / 4),
            pending: Vec::new(),
            alive_count: 0,
        }
    }

    /// Allocate a slot.
    pub fn allocate(&mut self) -> Entity {
        self.alive_count += 1;

        if let Some(id) = self.free_list.pop() {
            Entity::new(id, self.generations[id as usize])
        } else {
            let id = self.generations.len() as EntityId;
            self.generations.push(Generation::new());
            Entity::new(id, Generation::new())
        }
    }

    /// Release a slot for immediate reuse.
    ///
    /// Returns `true` if the entity was alive.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.retire(entity) {
            return false;
        }
        self.free_list.push(entity.id());
        true
    }

    /// Release a slot, holding it back from reuse until [`flush`](Self::flush).
    ///
    /// Returns `true` if the entity was alive.
    pub fn deallocate_deferred(&mut self, entity: Entity) -> bool {
        if !self.retire(entity) {
            return false;
        }
        self.pending.push(entity.id());
        true
    }

    /// Make every deferred slot reusable. Returns how many were released.
    pub fn flush(&mut self) -> usize {
        let count = self.pending.len();
        self.free_list.append(&mut self.pending);
        count
    }

    fn retire(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.generations[entity.id() as usize];
        *slot = slot.next();
        self.alive_count -= 1;
        true
    }

    /// Check if an entity is currently alive.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.generations
            .get(entity.id() as usize)
            .is_some_and(|&generation| generation == entity.generation())
    }

    /// Number of live entities.
    #[must_use]
    pub const fn alive_count(&self) -> u32 {
        self.alive_count
    }

    /// Number of slots ever allocated.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    /// Number of slots waiting for [`flush`](Self::flush).
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

bitflags! {
    /// Lifecycle state of an entity inside the engine.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntityFlags: u8 {
        /// Registered with the engine and tracked by families.
        const REGISTERED = 1 << 0;
        /// `add_entity` was deferred and has not been applied yet.
        const PENDING_ADD = 1 << 1;
        /// `remove_entity` was deferred and has not been applied yet.
        const SCHEDULED_FOR_REMOVAL = 1 << 2;
        /// Removal is in progress; the entity matches no family.
        const REMOVING = 1 << 3;
    }
}

/// Everything the engine stores for one entity.
///
/// Holds the component bag (at most one value per [`ComponentType`]), the bitset of
/// present component kinds, and the bitset of families the entity currently belongs
/// to.
pub struct EntityRecord {
    entity: Entity,
    /// Indexed by `ComponentType`.
    components: Vec<Option<Box<dyn Component>>>,
    component_bits: Bits,
    family_bits: Bits,
    state: EntityFlags,
    flags: u32,
}

impl Default for EntityRecord {
    fn default() -> Self {
        Self {
            entity: Entity::DANGLING,
            components: Vec::new(),
            component_bits: Bits::new(),
            family_bits: Bits::new(),
            state: EntityFlags::empty(),
            flags: 0,
        }
    }
}

impl Poolable for EntityRecord {
    fn reset(&mut self) {
        self.entity = Entity::DANGLING;
        self.components.clear();
        self.component_bits.clear();
        self.family_bits.clear();
        self.state = EntityFlags::empty();
        self.flags = 0;
    }
}

impl EntityRecord {
    pub(crate) fn attach(&mut self, entity: Entity) {
        self.entity = entity;
    }

    /// The handle this record belongs to.
    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.entity
    }

    /// Borrow the component of kind `ty`.
    #[must_use]
    pub fn component(&self, ty: ComponentType) -> Option<&dyn Component> {
        self.components.get(ty.index()).and_then(Option::as_deref)
    }

    /// Borrow the component of kind `ty` as `T`.
    #[must_use]
    pub fn get<T: Component>(&self, ty: ComponentType) -> Option<&T> {
        self.component(ty)?.as_any().downcast_ref()
    }

    pub(crate) fn component_mut(
        &mut self,
        ty: ComponentType,
    ) -> Option<&mut (dyn Component + 'static)> {
        self.components
            .get_mut(ty.index())
            .and_then(Option::as_deref_mut)
    }

    /// Iterate the components in kind order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentType, &dyn Component)> {
        self.components
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_deref()
                    .map(|component| (ComponentType::from_raw(index as u32), component))
            })
    }

    /// Number of components held.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.component_bits.len()
    }

    /// Kinds of the components currently held.
    #[must_use]
    pub const fn component_bits(&self) -> &Bits {
        &self.component_bits
    }

    /// Families the entity currently belongs to, by family index.
    #[must_use]
    pub const fn family_bits(&self) -> &Bits {
        &self.family_bits
    }

    pub(crate) fn family_bits_mut(&mut self) -> &mut Bits {
        &mut self.family_bits
    }

    /// Store `component`, returning the value it replaces.
    pub(crate) fn put(
        &mut self,
        ty: ComponentType,
        component: Box<dyn Component>,
    ) -> Option<Box<dyn Component>> {
        let index = ty.index();
        if index >= self.components.len() {
            self.components.resize_with(index + 1, || None);
        }
        self.component_bits.set(index);
        self.components[index].replace(component)
    }

    pub(crate) fn take(&mut self, ty: ComponentType) -> Option<Box<dyn Component>> {
        let taken = self.components.get_mut(ty.index())?.take();
        self.component_bits.unset(ty.index());
        taken
    }

    /// Remove every component, leaving the slot storage allocated.
    pub(crate) fn drain_components(
        &mut self,
    ) -> impl Iterator<Item = (ComponentType, Box<dyn Component>)> + '_ {
        self.component_bits.clear();
        self.components
            .drain(..)
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.map(|component| (ComponentType::from_raw(index as u32), component))
            })
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EntityFlags {
        self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut EntityFlags {
        &mut self.state
    }

    /// Check if the entity is registered with the engine.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.state.contains(EntityFlags::REGISTERED)
    }

    /// Check if a deferred add is waiting to be applied.
    #[must_use]
    pub const fn is_pending_add(&self) -> bool {
        self.state.contains(EntityFlags::PENDING_ADD)
    }

    /// Check if a deferred removal is waiting to be applied.
    #[must_use]
    pub const fn is_scheduled_for_removal(&self) -> bool {
        self.state.contains(EntityFlags::SCHEDULED_FOR_REMOVAL)
    }

    /// Check if the entity is being removed right now.
    #[must_use]
    pub const fn is_removing(&self) -> bool {
        self.state.contains(EntityFlags::REMOVING)
    }

    /// User-defined tag bits.
    #[must_use]
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    pub(crate) fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
}

impl fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRecord")
            .field("entity", &self.entity)
            .field("components", &self.component_bits)
            .field("families", &self.family_bits)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .finish()
    }
}
