//! System registry and the update tick.
//!
//! Systems are kept sorted by priority (stable, so equal priorities keep their
//! insertion order). A tick walks the order captured when it started, so a system
//! added mid-tick first runs on the next tick. The running system is taken out of
//! its slot for the duration of its update; removing it mid-tick marks the slot and
//! finishes the removal once the update returns.

use std::any::TypeId;

use tracing::{debug, trace};

use crate::{EcsError, EcsResult, Engine, System, pool::Pool};

/// Identifier of a system added to an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(u64);

impl SystemId {
    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

pub(crate) struct SystemSlot {
    id: SystemId,
    type_id: TypeId,
    name: &'static str,
    priority: i32,
    /// `None` while the system is running.
    system: Option<Box<dyn System>>,
    /// Removed while running; dropped when its update returns.
    removed: bool,
}

impl SystemSlot {
    fn is<S: System>(&self) -> bool {
        !self.removed && self.type_id == TypeId::of::<S>()
    }
}

impl Engine {
    // ==================== Systems ====================

    /// Add a system, replacing any existing system of the same type.
    pub fn add_system<S: System>(&mut self, mut system: S) -> SystemId {
        if self.systems.iter().any(SystemSlot::is::<S>) {
            self.remove_system::<S>();
        }

        system.added_to_engine(self);

        let id = SystemId(self.next_system_id);
        self.next_system_id += 1;
        let name = std::any::type_name::<S>();
        let priority = system.priority();

        self.systems.push(SystemSlot {
            id,
            type_id: TypeId::of::<S>(),
            name,
            priority,
            system: Some(Box::new(system)),
            removed: false,
        });
        self.systems.sort_by_key(|slot| slot.priority);

        debug!(system = name, priority, "added system");
        id
    }

    /// Borrow the system of type `S`.
    ///
    /// Returns `None` while `S` itself is running.
    #[must_use]
    pub fn get_system<S: System>(&self) -> Option<&S> {
        self.systems
            .iter()
            .filter(|slot| slot.is::<S>())
            .find_map(|slot| slot.system.as_deref()?.as_any().downcast_ref())
    }

    /// Mutably borrow the system of type `S`.
    pub fn get_system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems
            .iter_mut()
            .filter(|slot| slot.is::<S>())
            .find_map(|slot| slot.system.as_deref_mut()?.as_any_mut().downcast_mut())
    }

    /// Remove the system of type `S` and hand it back.
    ///
    /// If `S` is the running system, the removal completes when its update returns
    /// and `None` is returned.
    pub fn remove_system<S: System>(&mut self) -> Option<S> {
        let position = self.systems.iter().position(SystemSlot::is::<S>)?;
        let slot = &mut self.systems[position];
        let Some(mut system) = slot.system.take() else {
            slot.removed = true;
            return None;
        };

        let slot = self.systems.remove(position);
        system.removed_from_engine(self);
        debug!(system = slot.name, "removed system");

        system.into_any().downcast::<S>().ok().map(|boxed| *boxed)
    }

    /// Remove every system.
    pub fn remove_all_systems(&mut self) {
        let mut index = 0;
        while index < self.systems.len() {
            let slot = &mut self.systems[index];
            let Some(mut system) = slot.system.take() else {
                slot.removed = true;
                index += 1;
                continue;
            };

            let slot = self.systems.remove(index);
            system.removed_from_engine(self);
            debug!(system = slot.name, "removed system");
        }
    }

    /// Systems in update order. The running system is not included.
    pub fn systems(&self) -> impl Iterator<Item = &(dyn System + 'static)> {
        self.systems
            .iter()
            .filter(|slot| !slot.removed)
            .filter_map(|slot| slot.system.as_deref())
    }

    /// Number of systems, including the running one.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.iter().filter(|slot| !slot.removed).count()
    }

    // ==================== Tick ====================

    /// Run every processing system once, in priority order.
    ///
    /// Commands queued by a system are applied as soon as it returns, so later
    /// systems of the same tick see the result. Records and entity slots released
    /// during the tick only become reusable after it ends. A system error stops the
    /// tick and is returned.
    pub fn update(&mut self, delta: f32) -> EcsResult<()> {
        if self.updating {
            return Err(EcsError::AlreadyUpdating);
        }
        self.process_pending()?;

        self.updating = true;
        let mut order = std::mem::take(&mut self.tick_order);
        order.clear();
        order.extend(
            self.systems
                .iter()
                .filter(|slot| !slot.removed)
                .map(|slot| slot.id),
        );

        let mut result = Ok(());
        for &id in &order {
            result = self.run_system(id, delta);
            if result.is_err() {
                break;
            }
        }

        let systems = order.len();
        self.tick_order = order;
        self.updating = false;
        self.tick += 1;
        self.flush_released();

        trace!(tick = self.tick, systems, "tick complete");
        result
    }

    fn run_system(&mut self, id: SystemId, delta: f32) -> EcsResult<()> {
        let Some(slot) = self
            .systems
            .iter_mut()
            .find(|slot| slot.id == id && !slot.removed)
        else {
            return Ok(());
        };
        let Some(mut system) = slot.system.take() else {
            return Ok(());
        };

        let result = if system.is_processing() {
            system.update(self, delta)
        } else {
            Ok(())
        };
        self.restore_system(id, system);

        let drained = self.drain_commands();
        result.and(drained)
    }

    fn restore_system(&mut self, id: SystemId, mut system: Box<dyn System>) {
        let Some(position) = self.systems.iter().position(|slot| slot.id == id) else {
            return;
        };

        if self.systems[position].removed {
            let slot = self.systems.remove(position);
            system.removed_from_engine(self);
            debug!(system = slot.name, "removed system");
        } else {
            self.systems[position].system = Some(system);
        }
    }

    /// Move everything released during the tick to the reusable free lists.
    fn flush_released(&mut self) {
        let records = self.entity_pool.as_mut().map_or(0, Pool::flush);
        let components = self.component_pools.flush();
        let slots = self.allocator.flush();
        if records + components + slots > 0 {
            trace!(records, components, slots, "flushed release caches");
        }
    }
}
