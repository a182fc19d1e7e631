//! Engine - the container for entities, families, listeners, and systems.
//!
//! The engine owns every entity record and keeps each registered family's entity list
//! in step with the entities' components. Structural changes requested while
//! listeners are being notified, or while a tick is running, are queued as
//! [`Command`]s and applied once the current dispatch or system update returns.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use crate::{
    Component, ComponentType, ComponentTypeRegistry, EcsError, EcsResult, EngineConfig,
    EntityEvent, EntityListener, Family, FamilyId, FamilyRegistry,
    command::{Command, CommandQueue},
    entity::{Entity, EntityAllocator, EntityFlags, EntityRecord},
    listener::ListenerRegistry,
    membership::FamilyState,
    pool::{ComponentPools, Pool, Poolable},
    scheduler::{SystemId, SystemSlot},
};

/// The ECS engine.
///
/// Single-threaded: the engine is `Send` but not internally synchronised.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) types: ComponentTypeRegistry,
    pub(crate) family_registry: FamilyRegistry,
    pub(crate) allocator: EntityAllocator,
    /// Indexed by entity ID.
    pub(crate) records: Vec<Option<EntityRecord>>,
    /// Registered entities, in registration order.
    pub(crate) entities: Vec<Entity>,
    /// Indexed by `FamilyId`; `None` until the family is registered.
    pub(crate) families: Vec<Option<FamilyState>>,
    pub(crate) registered_families: Vec<FamilyId>,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) commands: CommandQueue,
    pub(crate) entity_pool: Option<Pool<EntityRecord>>,
    pub(crate) component_pools: ComponentPools,
    pub(crate) systems: Vec<SystemSlot>,
    pub(crate) next_system_id: u64,
    /// System order captured at the start of the running tick.
    pub(crate) tick_order: Vec<SystemId>,
    pub(crate) dispatch_scratch: Vec<Arc<dyn EntityListener>>,
    pub(crate) notifying: bool,
    pub(crate) updating: bool,
    /// A family list is being walked by index.
    pub(crate) iterating: bool,
    pub(crate) tick: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine without pooling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine that recycles entity records and poolable components.
    #[must_use]
    pub fn pooled() -> Self {
        Self::with_config(EngineConfig::pooled())
    }

    /// Create an engine from a configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let capacity = config.entity_capacity;
        Self {
            types: ComponentTypeRegistry::new(),
            family_registry: FamilyRegistry::new(),
            allocator: EntityAllocator::with_capacity(capacity),
            records: Vec::with_capacity(capacity),
            entities: Vec::with_capacity(capacity),
            families: Vec::new(),
            registered_families: Vec::new(),
            listeners: ListenerRegistry::default(),
            commands: CommandQueue::new(),
            entity_pool: config
                .pooled
                .then(|| Pool::new(config.max_pooled_entities)),
            component_pools: ComponentPools::new(config.max_pooled_components),
            systems: Vec::new(),
            next_system_id: 0,
            tick_order: Vec::new(),
            dispatch_scratch: Vec::new(),
            notifying: false,
            updating: false,
            iterating: false,
            tick: 0,
            config,
        }
    }

    /// The configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check if structural changes are currently being deferred.
    pub(crate) const fn is_deferring(&self) -> bool {
        self.notifying || self.updating || self.iterating
    }

    /// Run `walk` with structural changes deferred, then apply them unless an outer
    /// walk, dispatch or tick is still running.
    pub(crate) fn deferring<F>(&mut self, walk: F) -> EcsResult<()>
    where
        F: FnOnce(&mut Self) -> EcsResult<()>,
    {
        let was_iterating = std::mem::replace(&mut self.iterating, true);
        let result = walk(self);
        self.iterating = was_iterating;
        self.finish(result)
    }

    // ==================== Entity Operations ====================

    /// Create a detached entity.
    ///
    /// The entity can hold components but is invisible to families and listeners
    /// until [`add_entity`](Self::add_entity) is called.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let mut record = match &mut self.entity_pool {
            Some(pool) => pool.obtain(),
            None => EntityRecord::default(),
        };
        record.attach(entity);

        let index = entity.id() as usize;
        if index >= self.records.len() {
            self.records.resize_with(index + 1, || None);
        }
        self.records[index] = Some(record);
        entity
    }

    /// Create an entity and register it.
    pub fn spawn(&mut self) -> EcsResult<Entity> {
        let entity = self.create_entity();
        self.add_entity(entity)?;
        Ok(entity)
    }

    /// Register an entity with the engine.
    ///
    /// The entity joins every registered family it matches, then the global listeners
    /// and the listeners of those families are notified. While the engine is
    /// notifying or updating, registration is queued instead.
    pub fn add_entity(&mut self, entity: Entity) -> EcsResult<()> {
        let deferring = self.is_deferring();
        let record = self
            .record_mut(entity)
            .ok_or(EcsError::NoSuchEntity(entity))?;

        if record
            .state()
            .intersects(EntityFlags::REGISTERED | EntityFlags::PENDING_ADD)
        {
            return Err(EcsError::AlreadyAdded(entity));
        }

        if deferring {
            record.state_mut().insert(EntityFlags::PENDING_ADD);
            self.commands.push(Command::AddEntity(entity));
            return Ok(());
        }

        let result = self.add_entity_now(entity);
        self.finish(result)
    }

    pub(crate) fn add_entity_now(&mut self, entity: Entity) -> EcsResult<()> {
        let Some(record) = self.record_mut(entity) else {
            return Ok(());
        };
        let state = record.state_mut();
        state.remove(EntityFlags::PENDING_ADD);
        state.insert(EntityFlags::REGISTERED);
        self.entities.push(entity);

        self.refresh_membership(entity, Some(EntityEvent::Added))
    }

    /// Remove an entity from the engine and release it.
    ///
    /// The entity leaves every family, the global listeners and the listeners of
    /// those families are notified, and its handle becomes stale. Removing a stale
    /// handle, or an entity already being removed, does nothing. A detached entity is
    /// released without notifications.
    pub fn remove_entity(&mut self, entity: Entity) -> EcsResult<()> {
        let deferring = self.is_deferring();
        let Some(record) = self.record_mut(entity) else {
            return Ok(());
        };

        let state = record.state();
        if state.intersects(EntityFlags::SCHEDULED_FOR_REMOVAL | EntityFlags::REMOVING) {
            return Ok(());
        }
        if !state.intersects(EntityFlags::REGISTERED | EntityFlags::PENDING_ADD) {
            self.release(entity);
            return Ok(());
        }

        if deferring || state.contains(EntityFlags::PENDING_ADD) {
            record
                .state_mut()
                .insert(EntityFlags::SCHEDULED_FOR_REMOVAL);
            self.commands.push(Command::RemoveEntity(entity));
            return self.finish(Ok(()));
        }

        let result = self.remove_entity_now(entity);
        self.finish(result)
    }

    pub(crate) fn remove_entity_now(&mut self, entity: Entity) -> EcsResult<()> {
        let Some(record) = self.record_mut(entity) else {
            return Ok(());
        };
        if !record.is_registered() {
            self.release(entity);
            return Ok(());
        }

        let state = record.state_mut();
        state.remove(EntityFlags::SCHEDULED_FOR_REMOVAL);
        state.insert(EntityFlags::REMOVING);

        if let Some(position) = self.entities.iter().position(|&e| e == entity) {
            self.entities.remove(position);
        }

        let result = self.refresh_membership(entity, Some(EntityEvent::Removed));
        self.release(entity);
        result
    }

    /// Remove every registered entity, then every entity waiting to be registered.
    ///
    /// Returns the first listener error; every entity is removed regardless.
    pub fn remove_all_entities(&mut self) -> EcsResult<()> {
        let mut targets = self.entities.clone();
        targets.extend(
            self.records
                .iter()
                .flatten()
                .filter(|record| record.is_pending_add())
                .map(EntityRecord::entity),
        );
        self.remove_each(targets)
    }

    /// Remove every entity currently in `family`.
    ///
    /// Returns the first listener error; every entity is removed regardless.
    pub fn remove_all_entities_for(&mut self, family: &Family) -> EcsResult<()> {
        let targets = self.family_entities(family).to_vec();
        self.remove_each(targets)
    }

    fn remove_each(&mut self, targets: Vec<Entity>) -> EcsResult<()> {
        let mut result = Ok(());
        for entity in targets {
            let removed = self.remove_entity(entity);
            if result.is_ok() {
                result = removed;
            }
        }
        result
    }

    /// Return the record to the pool (if pooled) and free the entity's slot.
    ///
    /// While a tick runs both go through the cache stage and only become reusable
    /// once the tick ends.
    fn release(&mut self, entity: Entity) {
        let Some(slot) = self.records.get_mut(entity.id() as usize) else {
            return;
        };
        if !slot.as_ref().is_some_and(|record| record.entity() == entity) {
            return;
        }
        let Some(mut record) = slot.take() else {
            return;
        };

        let deferred = self.updating;
        if let Some(pool) = &mut self.entity_pool {
            for (ty, component) in record.drain_components() {
                self.component_pools.recycle(ty, component, deferred);
            }
            if deferred {
                pool.defer_free(record);
            } else {
                pool.free(record);
            }
        }

        if deferred {
            self.allocator.deallocate_deferred(entity);
        } else {
            self.allocator.deallocate(entity);
        }
    }

    /// Check if the handle refers to a live entity, registered or not.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.record(entity).is_some()
    }

    /// Check if the entity is registered with the engine.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.record(entity).is_some_and(EntityRecord::is_registered)
    }

    /// Get an entity's record.
    #[must_use]
    pub fn entity(&self, entity: Entity) -> Option<&EntityRecord> {
        self.record(entity)
    }

    /// Registered entities, in registration order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of registered entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Set an entity's user tag bits.
    pub fn set_flags(&mut self, entity: Entity, flags: u32) -> EcsResult<()> {
        self.record_mut(entity)
            .ok_or(EcsError::NoSuchEntity(entity))?
            .set_flags(flags);
        Ok(())
    }

    /// Get an entity's user tag bits.
    #[must_use]
    pub fn flags(&self, entity: Entity) -> Option<u32> {
        self.record(entity).map(EntityRecord::flags)
    }

    pub(crate) fn record(&self, entity: Entity) -> Option<&EntityRecord> {
        self.records
            .get(entity.id() as usize)?
            .as_ref()
            .filter(|record| record.entity() == entity)
    }

    pub(crate) fn record_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        self.records
            .get_mut(entity.id() as usize)?
            .as_mut()
            .filter(|record| record.entity() == entity)
    }

    // ==================== Component Operations ====================

    /// Get the [`ComponentType`] for `T`, registering it on first use.
    pub fn component_type<T: Component>(&mut self) -> ComponentType {
        self.types.index_for::<T>()
    }

    /// The engine's component type registry.
    #[must_use]
    pub const fn component_types(&self) -> &ComponentTypeRegistry {
        &self.types
    }

    /// Add a component to an entity.
    ///
    /// If the entity already has a `T`, the old value is removed first (with the
    /// usual membership updates and notifications) and the new value is then added.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> EcsResult<()> {
        let ty = self.types.index_for::<T>();
        let record = self
            .record_mut(entity)
            .ok_or(EcsError::NoSuchEntity(entity))?;

        let replaced = match record.take(ty) {
            Some(old) => {
                let result = self.component_changed(Command::ComponentRemoved {
                    entity,
                    component: ty,
                });
                self.discard(ty, old);
                result
            }
            None => Ok(()),
        };

        if let Some(record) = self.record_mut(entity) {
            record.put(ty, Box::new(component));
        }
        let added = self.component_changed(Command::ComponentAdded {
            entity,
            component: ty,
        });

        self.finish(replaced.and(added))
    }

    /// Remove a component from an entity, returning it.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> EcsResult<Option<T>> {
        let ty = self.types.get::<T>();
        let record = self
            .record_mut(entity)
            .ok_or(EcsError::NoSuchEntity(entity))?;
        let Some((ty, old)) = ty.and_then(|ty| record.take(ty).map(|old| (ty, old))) else {
            return Ok(None);
        };

        let value = old.into_any().downcast::<T>().ok().map(|boxed| *boxed);
        let result = self.component_changed(Command::ComponentRemoved {
            entity,
            component: ty,
        });
        self.finish(result)?;
        Ok(value)
    }

    /// Remove every component from an entity.
    pub fn remove_all_components(&mut self, entity: Entity) -> EcsResult<()> {
        let record = self
            .record_mut(entity)
            .ok_or(EcsError::NoSuchEntity(entity))?;
        let removed: SmallVec<[(ComponentType, Box<dyn Component>); 8]> =
            record.drain_components().collect();
        let Some(&(first, _)) = removed.first() else {
            return Ok(());
        };

        let result = self.component_changed(Command::ComponentRemoved {
            entity,
            component: first,
        });
        for (ty, component) in removed {
            self.discard(ty, component);
        }
        self.finish(result)
    }

    /// Borrow an entity's component.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let ty = self.types.get::<T>()?;
        self.record(entity)?.get(ty)
    }

    /// Mutably borrow an entity's component.
    ///
    /// Changing a component's value never changes family membership.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let ty = self.types.get::<T>()?;
        self.record_mut(entity)?
            .component_mut(ty)?
            .as_any_mut()
            .downcast_mut()
    }

    /// Check if an entity has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.types.get::<T>().is_some_and(|ty| {
            self.record(entity)
                .is_some_and(|record| record.component_bits().get(ty.index()))
        })
    }

    /// Borrow a component by kind.
    #[must_use]
    pub fn component_by_type(&self, entity: Entity, ty: ComponentType) -> Option<&dyn Component> {
        self.record(entity)?.component(ty)
    }

    /// Mutably borrow a component by kind.
    pub fn component_by_type_mut(
        &mut self,
        entity: Entity,
        ty: ComponentType,
    ) -> Option<&mut (dyn Component + 'static)> {
        self.record_mut(entity)?.component_mut(ty)
    }

    /// Take a `T` from its pool, or construct a fresh one.
    pub fn obtain_component<T: Poolable + Component>(&mut self) -> T {
        let ty = self.types.index_for::<T>();
        self.component_pools.obtain(ty)
    }

    /// Reset a `T` and return it to its pool.
    pub fn free_component<T: Poolable + Component>(&mut self, component: T) {
        let ty = self.types.index_for::<T>();
        self.component_pools.free(ty, component);
    }

    /// Number of idle values in `T`'s pool.
    #[must_use]
    pub fn pooled_component_count<T: Component>(&self) -> usize {
        self.types
            .get::<T>()
            .map_or(0, |ty| self.component_pools.free_count(ty))
    }

    /// Number of idle entity records.
    #[must_use]
    pub fn pooled_entity_count(&self) -> usize {
        self.entity_pool.as_ref().map_or(0, Pool::free_count)
    }

    /// Drop every idle and cached record and component value.
    pub fn clear_pools(&mut self) {
        if let Some(pool) = &mut self.entity_pool {
            pool.clear();
        }
        self.component_pools.clear();
    }

    /// Recompute membership after a component change, or queue it while deferring.
    fn component_changed(&mut self, command: Command) -> EcsResult<()> {
        let entity = command.entity();
        let Some(record) = self.record(entity) else {
            return Ok(());
        };
        if !record.is_registered() || record.is_removing() {
            return Ok(());
        }
        if self.is_deferring() {
            self.commands.push(command);
            return Ok(());
        }
        self.refresh_membership(entity, None)
    }

    /// Drop a component that left an entity, or recycle it on pooled engines.
    fn discard(&mut self, ty: ComponentType, component: Box<dyn Component>) {
        if self.entity_pool.is_some() {
            self.component_pools.recycle(ty, component, self.updating);
        }
    }

    // ==================== Deferred Commands ====================

    /// Apply queued commands if nothing is being walked, propagating `result` first.
    pub(crate) fn finish(&mut self, result: EcsResult<()>) -> EcsResult<()> {
        result?;
        if self.is_deferring() {
            return Ok(());
        }
        self.drain_commands()
    }

    /// Apply queued commands in FIFO order.
    ///
    /// Stops at the first error and leaves the remaining commands queued.
    pub(crate) fn drain_commands(&mut self) -> EcsResult<()> {
        if self.commands.is_empty() {
            return Ok(());
        }

        let mut applied = 0_usize;
        while let Some(command) = self.commands.pop() {
            applied += 1;
            self.apply(command)?;
        }
        trace!(applied, "drained deferred commands");
        Ok(())
    }

    fn apply(&mut self, command: Command) -> EcsResult<()> {
        let entity = command.entity();
        let Some(record) = self.record(entity) else {
            return Ok(());
        };
        let pending_add = record.is_pending_add();
        let scheduled = record.is_scheduled_for_removal();
        let tracked = record.is_registered() && !record.is_removing();

        match command {
            Command::AddEntity(_) if pending_add => self.add_entity_now(entity),
            Command::RemoveEntity(_) if scheduled => self.remove_entity_now(entity),
            Command::ComponentAdded { .. } | Command::ComponentRemoved { .. } if tracked => {
                self.refresh_membership(entity, None)
            }
            _ => Ok(()),
        }
    }

    /// Apply any queued commands now.
    ///
    /// Does nothing while the engine is notifying or updating. Useful after a
    /// listener error left commands queued.
    pub fn process_pending(&mut self) -> EcsResult<()> {
        if self.is_deferring() {
            return Ok(());
        }
        self.drain_commands()
    }

    /// Number of queued commands.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Check if a tick is running.
    #[must_use]
    pub const fn is_updating(&self) -> bool {
        self.updating
    }

    /// Check if listeners are being notified.
    #[must_use]
    pub const fn is_notifying(&self) -> bool {
        self.notifying
    }

    /// Number of completed ticks.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("entity_count", &self.entities.len())
            .field("component_types", &self.types.len())
            .field("families", &self.registered_families.len())
            .field("listeners", &self.listeners.len())
            .field("systems", &self.systems.len())
            .field("pending", &self.commands.len())
            .field("tick", &self.tick)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Health(u32);

    impl Poolable for Health {}

    #[test]
    fn test_spawn_and_get() {
        let mut engine = Engine::new();

        let entity = engine.spawn().unwrap();
        engine.insert(entity, Position { x: 1.0, y: 2.0 }).unwrap();

        assert!(engine.contains(entity));
        assert_eq!(engine.entity_count(), 1);
        assert_eq!(engine.get::<Position>(entity), Some(&Position { x: 1.0, y: 2.0 }));
    }

    #[test]
    fn test_get_mut() {
        let mut engine = Engine::new();
        let entity = engine.spawn().unwrap();
        engine.insert(entity, Position { x: 1.0, y: 2.0 }).unwrap();

        engine.get_mut::<Position>(entity).unwrap().x += 10.0;

        assert_eq!(engine.get::<Position>(entity).unwrap().x, 11.0);
    }

    #[test]
    fn test_detached_entity() {
        let mut engine = Engine::new();
        let entity = engine.create_entity();

        assert!(engine.is_alive(entity));
        assert!(!engine.contains(entity));
        engine.insert(entity, Velocity { x: 0.5, y: 0.5 }).unwrap();
        assert!(engine.has::<Velocity>(entity));
        assert!(engine.entities().is_empty());

        engine.add_entity(entity).unwrap();
        assert_eq!(engine.entities(), &[entity]);
    }

    #[test]
    fn test_add_twice_fails() {
        let mut engine = Engine::new();
        let entity = engine.spawn().unwrap();

        assert!(matches!(
            engine.add_entity(entity),
            Err(EcsError::AlreadyAdded(e)) if e == entity
        ));
    }

    #[test]
    fn test_stale_handle() {
        let mut engine = Engine::new();
        let entity = engine.spawn().unwrap();
        engine.remove_entity(entity).unwrap();

        assert!(!engine.is_alive(entity));
        assert!(matches!(
            engine.add_entity(entity),
            Err(EcsError::NoSuchEntity(_))
        ));
        assert!(matches!(
            engine.insert(entity, Position { x: 0.0, y: 0.0 }),
            Err(EcsError::NoSuchEntity(_))
        ));
        assert!(engine.remove_entity(entity).is_ok());

        let reused = engine.create_entity();
        assert_eq!(reused.id(), entity.id());
        assert!(engine.get::<Position>(entity).is_none());
    }

    #[test]
    fn test_remove_component() {
        let mut engine = Engine::new();
        let entity = engine.spawn().unwrap();
        engine.insert(entity, Position { x: 1.0, y: 2.0 }).unwrap();
        engine.insert(entity, Velocity { x: 0.5, y: 0.5 }).unwrap();

        let removed = engine.remove::<Velocity>(entity).unwrap();
        assert_eq!(removed, Some(Velocity { x: 0.5, y: 0.5 }));
        assert_eq!(engine.remove::<Velocity>(entity).unwrap(), None);

        assert!(engine.has::<Position>(entity));
        assert!(!engine.has::<Velocity>(entity));
    }

    #[test]
    fn test_insert_replaces() {
        let mut engine = Engine::new();
        let entity = engine.spawn().unwrap();

        engine.insert(entity, Position { x: 1.0, y: 1.0 }).unwrap();
        engine.insert(entity, Position { x: 2.0, y: 2.0 }).unwrap();

        assert_eq!(engine.entity(entity).unwrap().component_count(), 1);
        assert_eq!(engine.get::<Position>(entity).unwrap().x, 2.0);
    }

    #[test]
    fn test_remove_all_components() {
        let mut engine = Engine::new();
        let family = engine.family(Family::builder().all::<Position>());
        let entity = engine.spawn().unwrap();
        engine.insert(entity, Position { x: 1.0, y: 1.0 }).unwrap();
        engine.insert(entity, Velocity { x: 1.0, y: 1.0 }).unwrap();
        assert_eq!(engine.entities_for(&family), &[entity]);

        engine.remove_all_components(entity).unwrap();

        assert_eq!(engine.entity(entity).unwrap().component_count(), 0);
        assert!(engine.family_entities(&family).is_empty());
        assert!(engine.contains(entity));
    }

    #[test]
    fn test_flags() {
        let mut engine = Engine::new();
        let entity = engine.spawn().unwrap();

        assert_eq!(engine.flags(entity), Some(0));
        engine.set_flags(entity, 0b101).unwrap();
        assert_eq!(engine.flags(entity), Some(0b101));
    }

    #[test]
    fn test_remove_detached_entity_releases_it() {
        let mut engine = Engine::new();
        let entity = engine.create_entity();

        engine.remove_entity(entity).unwrap();

        assert!(!engine.is_alive(entity));
    }

    #[test]
    fn test_pooled_engine_recycles() {
        let mut engine = Engine::pooled();

        let health: Health = engine.obtain_component();
        let entity = engine.spawn().unwrap();
        engine.insert(entity, health).unwrap();
        engine.get_mut::<Health>(entity).unwrap().0 = 42;

        engine.remove_entity(entity).unwrap();

        assert_eq!(engine.pooled_entity_count(), 1);
        assert_eq!(engine.pooled_component_count::<Health>(), 1);
        assert_eq!(engine.obtain_component::<Health>(), Health(0));

        let next = engine.create_entity();
        assert_eq!(engine.pooled_entity_count(), 0);
        assert_eq!(engine.entity(next).unwrap().component_count(), 0);

        engine.remove_entity(next).unwrap();
        assert_eq!(engine.pooled_entity_count(), 1);
        engine.clear_pools();
        assert_eq!(engine.pooled_entity_count(), 0);
    }

    #[test]
    fn test_remove_all_entities() {
        let mut engine = Engine::new();
        for _ in 0..5 {
            engine.spawn().unwrap();
        }

        engine.remove_all_entities().unwrap();

        assert_eq!(engine.entity_count(), 0);
        assert_eq!(engine.allocator.alive_count(), 0);
    }

    #[test]
    fn test_debug() {
        let mut engine = Engine::new();
        engine.spawn().unwrap();
        let debug = format!("{engine:?}");
        assert!(debug.contains("entity_count: 1"));
    }
}
