//! Family registration and incremental membership.
//!
//! A family is registered the first time its entity list is requested; registration
//! seeds the list with one scan over the registered entities. From then on every
//! structural change re-tests only the changed entity against each registered
//! family, flipping the entity's family bit and its list membership where the
//! result differs.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    Bits, EcsResult, Engine, Entity, EntityEvent, EntityListener, EntityRecord, Family,
    FamilyBuilder, FamilyRegistry, ListenerId,
};

/// A registered family and its members, in the order they joined.
pub(crate) struct FamilyState {
    pub(crate) family: Arc<Family>,
    pub(crate) entities: Vec<Entity>,
}

impl Engine {
    // ==================== Families ====================

    /// Build (or look up) a family using this engine's registries.
    pub fn family(&mut self, builder: FamilyBuilder) -> Arc<Family> {
        builder.build(&mut self.types, &mut self.family_registry)
    }

    /// The engine's family registry.
    #[must_use]
    pub const fn families(&self) -> &FamilyRegistry {
        &self.family_registry
    }

    /// Entities in `family`, registering the family on first request.
    ///
    /// The returned slice is always current: membership is maintained incrementally
    /// once the family is registered.
    ///
    /// # Panics
    ///
    /// Panics if `family` was not built by this engine.
    pub fn entities_for(&mut self, family: &Family) -> &[Entity] {
        self.register_family(family);
        self.family_entities(family)
    }

    /// Entities in `family`, or an empty slice if it is not registered.
    #[must_use]
    pub fn family_entities(&self, family: &Family) -> &[Entity] {
        self.families
            .get(family.index())
            .and_then(Option::as_ref)
            .filter(|state| std::ptr::eq(state.family.as_ref(), family))
            .map_or(&[], |state| state.entities.as_slice())
    }

    /// Check if `family` has been registered.
    #[must_use]
    pub fn is_family_registered(&self, family: &Family) -> bool {
        self.families
            .get(family.index())
            .is_some_and(Option::is_some)
    }

    /// Check if a registered entity currently belongs to `family`.
    ///
    /// Unregistered entities, and entities being removed, match nothing.
    #[must_use]
    pub fn matches(&self, entity: Entity, family: &Family) -> bool {
        self.record(entity).is_some_and(|record| {
            record.is_registered() && !record.is_removing() && family.matches(record)
        })
    }

    fn register_family(&mut self, family: &Family) {
        assert!(
            self.family_registry.owns(family),
            "{family} was not built by this engine"
        );

        let index = family.index();
        if self.families.get(index).is_some_and(Option::is_some) {
            return;
        }
        if index >= self.families.len() {
            self.families.resize_with(index + 1, || None);
        }

        let mut members = Vec::new();
        for &entity in &self.entities {
            let Some(record) = self
                .records
                .get_mut(entity.id() as usize)
                .and_then(Option::as_mut)
            else {
                continue;
            };
            if !record.is_removing() && family.matches(record) {
                record.family_bits_mut().set(index);
                members.push(entity);
            }
        }

        debug!(%family, members = members.len(), "registered family");

        let Some(shared) = self.family_registry.get(family.id()).cloned() else {
            return;
        };
        self.families[index] = Some(FamilyState {
            family: shared,
            entities: members,
        });
        self.registered_families.push(family.id());
    }

    /// Re-test `entity` against every registered family and notify.
    ///
    /// `global` names the event the global listeners receive, if the entity itself
    /// is being added or removed. Listeners of families the entity left are notified
    /// first, then listeners of families it joined. Each notification selects its
    /// listeners only when it starts, so listeners registered or unregistered by a
    /// callback of the first are seen by the second.
    pub(crate) fn refresh_membership(
        &mut self,
        entity: Entity,
        global: Option<EntityEvent>,
    ) -> EcsResult<()> {
        let Some(record) = self
            .records
            .get_mut(entity.id() as usize)
            .and_then(Option::as_mut)
            .filter(|record| record.entity() == entity)
        else {
            return Ok(());
        };

        let mut joined = Bits::new();
        let mut left = Bits::new();
        let removing = record.is_removing();
        for &id in &self.registered_families {
            let index = id.index();
            let Some(state) = self.families[index].as_mut() else {
                continue;
            };

            let belongs = record.family_bits().get(index);
            let matches = !removing && state.family.matches(record);
            if belongs == matches {
                continue;
            }

            if matches {
                record.family_bits_mut().set(index);
                state.entities.push(entity);
                joined.set(index);
            } else {
                record.family_bits_mut().unset(index);
                if let Some(position) = state.entities.iter().position(|&e| e == entity) {
                    state.entities.remove(position);
                }
                left.set(index);
            }
        }

        let left = self.dispatch(
            entity,
            EntityEvent::Removed,
            global == Some(EntityEvent::Removed),
            &left,
        );
        let joined = self.dispatch(
            entity,
            EntityEvent::Added,
            global == Some(EntityEvent::Added),
            &joined,
        );
        left.and(joined)
    }

    /// Notify the global listeners (when `global` is set) and the listeners of
    /// `families`, in priority order.
    ///
    /// The selected listeners are snapshotted first, so listeners added or removed by
    /// a callback do not affect this dispatch. Every listener runs even if an earlier
    /// one fails; the first error is returned.
    fn dispatch(
        &mut self,
        entity: Entity,
        event: EntityEvent,
        global: bool,
        families: &Bits,
    ) -> EcsResult<()> {
        if !global && families.is_empty() {
            return Ok(());
        }

        let mut snapshot = std::mem::take(&mut self.dispatch_scratch);
        self.listeners.snapshot_into(global, families, &mut snapshot);

        let was_notifying = std::mem::replace(&mut self.notifying, true);
        let mut first_error = None;
        for listener in snapshot.drain(..) {
            let result = match event {
                EntityEvent::Added => listener.entity_added(self, entity),
                EntityEvent::Removed => listener.entity_removed(self, entity),
            };
            if let Err(error) = result {
                warn!(%entity, ?event, %error, "entity listener failed");
                first_error.get_or_insert(error);
            }
        }
        self.notifying = was_notifying;
        self.dispatch_scratch = snapshot;

        first_error.map_or(Ok(()), Err)
    }

    // ==================== Listeners ====================

    /// Listen for entities being added to and removed from the engine.
    ///
    /// Lower priorities run first; equal priorities run in registration order.
    pub fn add_entity_listener<L: EntityListener>(&mut self, listener: L, priority: i32) -> ListenerId {
        self.listeners.insert(Arc::new(listener), priority, None)
    }

    /// Listen for entities joining and leaving `family`.
    ///
    /// Registers the family if needed.
    ///
    /// # Panics
    ///
    /// Panics if `family` was not built by this engine.
    pub fn add_family_listener<L: EntityListener>(
        &mut self,
        family: &Family,
        listener: L,
        priority: i32,
    ) -> ListenerId {
        self.register_family(family);
        self.listeners
            .insert(Arc::new(listener), priority, Some(family.id()))
    }

    /// Unregister a listener. Returns `false` if the ID is unknown.
    pub fn remove_entity_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EntityRecord {
    /// Check if the entity currently belongs to `family`.
    #[must_use]
    pub fn in_family(&self, family: &Family) -> bool {
        self.family_bits().get(family.index())
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::{EcsError, ListenerResult};

    struct A;
    struct B;
    struct C;

    fn recorder(log: &Log, name: &'static str) -> impl EntityListener {
        let log = Arc::clone(log);
        move |_: &mut Engine, entity: Entity, event: EntityEvent| -> ListenerResult {
            log.lock().push((name, event, entity));
            Ok(())
        }
    }

    #[test]
    fn test_seed_scan_on_registration() {
        let mut engine = Engine::new();
        let with_a = engine.spawn().unwrap();
        engine.insert(with_a, A).unwrap();
        let with_b = engine.spawn().unwrap();
        engine.insert(with_b, B).unwrap();

        let family = engine.family(Family::builder().all::<A>());
        assert!(!engine.is_family_registered(&family));
        assert!(engine.family_entities(&family).is_empty());

        assert_eq!(engine.entities_for(&family), &[with_a]);
        assert!(engine.is_family_registered(&family));
        assert!(engine.entity(with_a).unwrap().in_family(&family));
        assert!(!engine.entity(with_b).unwrap().in_family(&family));
    }

    #[test]
    fn test_incremental_updates() {
        let mut engine = Engine::new();
        let family = engine.family(Family::builder().all::<A>().exclude::<C>());
        engine.entities_for(&family);

        let e = engine.spawn().unwrap();
        engine.insert(e, A).unwrap();
        assert_eq!(engine.family_entities(&family), &[e]);

        engine.insert(e, C).unwrap();
        assert!(engine.family_entities(&family).is_empty());
        assert!(!engine.matches(e, &family));

        engine.remove::<C>(e).unwrap();
        assert_eq!(engine.family_entities(&family), &[e]);
        assert!(engine.matches(e, &family));
    }

    #[test]
    fn test_family_order_is_join_order() {
        let mut engine = Engine::new();
        let family = engine.family(Family::builder().all::<A>());
        engine.entities_for(&family);

        let entities: Vec<Entity> = (0..5).map(|_| engine.spawn().unwrap()).collect();
        for &e in entities.iter().rev() {
            engine.insert(e, A).unwrap();
        }
        engine.remove_entity(entities[2]).unwrap();

        let expected: Vec<Entity> = [4, 3, 1, 0].iter().map(|&i| entities[i]).collect();
        assert_eq!(engine.family_entities(&family), expected.as_slice());
    }

    #[test]
    fn test_family_listener_scope() {
        let mut engine = Engine::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let family = engine.family(Family::builder().all::<A>());

        engine.add_family_listener(&family, recorder(&log, "family"), 0);
        engine.add_entity_listener(recorder(&log, "global"), 1);

        let e = engine.spawn().unwrap();
        engine.insert(e, A).unwrap();
        engine.remove::<A>(e).unwrap();
        engine.insert(e, B).unwrap();
        engine.remove_entity(e).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                ("global", EntityEvent::Added, e),
                ("family", EntityEvent::Added, e),
                ("family", EntityEvent::Removed, e),
                ("global", EntityEvent::Removed, e),
            ]
        );
    }

    #[test]
    fn test_replacement_reruns_remove_and_add() {
        let mut engine = Engine::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let family = engine.family(Family::builder().all::<A>());
        engine.add_family_listener(&family, recorder(&log, "family"), 0);

        let e = engine.spawn().unwrap();
        engine.insert(e, A).unwrap();
        engine.insert(e, A).unwrap();

        let events: Vec<EntityEvent> = log.lock().iter().map(|&(_, event, _)| event).collect();
        assert_eq!(
            events,
            vec![EntityEvent::Added, EntityEvent::Removed, EntityEvent::Added]
        );
        assert_eq!(engine.family_entities(&family), &[e]);
    }

    #[test]
    fn test_removed_listener_is_not_called() {
        let mut engine = Engine::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = engine.add_entity_listener(recorder(&log, "global"), 0);
        assert!(engine.remove_entity_listener(id));
        assert!(!engine.remove_entity_listener(id));

        engine.spawn().unwrap();
        assert!(log.lock().is_empty());
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn test_listener_removal_during_dispatch_uses_snapshot() {
        let mut engine = Engine::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let victim = Arc::new(Mutex::new(None::<ListenerId>));

        let victim_slot = Arc::clone(&victim);
        engine.add_entity_listener(
            move |engine: &mut Engine, _: Entity, _: EntityEvent| -> ListenerResult {
                if let Some(id) = victim_slot.lock().take() {
                    engine.remove_entity_listener(id);
                }
                Ok(())
            },
            0,
        );
        let id = engine.add_entity_listener(recorder(&log, "victim"), 1);
        *victim.lock() = Some(id);

        let first = engine.spawn().unwrap();
        engine.spawn().unwrap();

        assert_eq!(*log.lock(), vec![("victim", EntityEvent::Added, first)]);
    }

    type Log = Arc<Mutex<Vec<(&'static str, EntityEvent, Entity)>>>;

    /// An entity in `all(A).exclude(B)` that moves to `all(A, B)` on `insert(e, B)`.
    /// The leaving family's listener runs `on_leave` from its removal callback.
    fn leave_and_join<F>(on_leave: F) -> (Engine, Log, Entity, Arc<Family>)
    where
        F: Fn(&mut Engine, &Log) + Send + Sync + 'static,
    {
        let mut engine = Engine::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let leaving = engine.family(Family::builder().all::<A>().exclude::<B>());
        let joining = engine.family(Family::builder().all::<A>().all::<B>());

        let leave_log = Arc::clone(&log);
        engine.add_family_listener(
            &leaving,
            move |engine: &mut Engine, entity: Entity, event: EntityEvent| -> ListenerResult {
                leave_log.lock().push(("left", event, entity));
                if event == EntityEvent::Removed {
                    on_leave(engine, &leave_log);
                }
                Ok(())
            },
            0,
        );
        engine.add_family_listener(&joining, recorder(&log, "joined"), 1);

        let e = engine.spawn().unwrap();
        engine.insert(e, A).unwrap();
        engine.insert(e, B).unwrap();
        (engine, log, e, joining)
    }

    #[test]
    fn test_join_notified_after_leave_listener_unregisters_itself() {
        let (engine, log, e, joining) = leave_and_join(|engine, _| {
            assert!(engine.remove_entity_listener(ListenerId::new(0)));
        });

        assert_eq!(
            *log.lock(),
            vec![
                ("left", EntityEvent::Added, e),
                ("left", EntityEvent::Removed, e),
                ("joined", EntityEvent::Added, e),
            ]
        );
        assert_eq!(engine.family_entities(&joining), &[e]);
        assert_eq!(engine.listener_count(), 1);
    }

    #[test]
    fn test_join_notified_after_leave_listener_registers_another() {
        let (mut engine, log, e, joining) = leave_and_join(|engine, log| {
            if engine.listener_count() == 2 {
                engine.add_entity_listener(recorder(log, "global"), -5);
            }
        });

        assert_eq!(
            *log.lock(),
            vec![
                ("left", EntityEvent::Added, e),
                ("left", EntityEvent::Removed, e),
                ("joined", EntityEvent::Added, e),
            ]
        );
        assert_eq!(engine.family_entities(&joining), &[e]);

        log.lock().clear();
        engine.remove_entity(e).unwrap();
        assert_eq!(
            *log.lock(),
            vec![
                ("global", EntityEvent::Removed, e),
                ("joined", EntityEvent::Removed, e),
            ]
        );
    }

    #[test]
    fn test_matches_is_false_while_removing() {
        let mut engine = Engine::new();
        let family = engine.family(Family::builder().all::<A>());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_in_listener = Arc::clone(&seen);
        let family_in_listener = Arc::clone(&family);
        engine.add_entity_listener(
            move |engine: &mut Engine, entity: Entity, event: EntityEvent| -> ListenerResult {
                if event == EntityEvent::Removed {
                    seen_in_listener.lock().push((
                        engine.matches(entity, &family_in_listener),
                        engine.has::<A>(entity),
                    ));
                }
                Ok(())
            },
            0,
        );

        let e = engine.spawn().unwrap();
        engine.insert(e, A).unwrap();
        assert!(engine.matches(e, &family));
        engine.remove_entity(e).unwrap();

        assert_eq!(*seen.lock(), vec![(false, true)]);
    }

    #[test]
    fn test_listener_error_restores_state() {
        let mut engine = Engine::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        engine.add_entity_listener(
            |engine: &mut Engine, _: Entity, event: EntityEvent| -> ListenerResult {
                if event == EntityEvent::Added {
                    let extra = engine.create_entity();
                    engine.add_entity(extra)?;
                    return Err(EcsError::listener("refused"));
                }
                Ok(())
            },
            0,
        );
        engine.add_entity_listener(recorder(&log, "after"), 1);

        let err = engine.spawn().unwrap_err();
        assert!(matches!(err, EcsError::Listener(_)));
        assert!(!engine.is_notifying());
        assert_eq!(log.lock().len(), 1, "later listeners still run");
        assert_eq!(engine.pending_commands(), 1);
        assert_eq!(engine.entity_count(), 1);
    }

    #[test]
    #[should_panic(expected = "was not built by this engine")]
    fn test_foreign_family_panics() {
        let mut other = Engine::new();
        let foreign = other.family(Family::builder().all::<A>());

        let mut engine = Engine::new();
        engine.entities_for(&foreign);
    }
}
