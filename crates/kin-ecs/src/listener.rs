//! Entity listeners.
//!
//! Listeners are callbacks that run when an entity enters or leaves the engine, or
//! enters or leaves a particular family. They are kept in one list sorted by ascending
//! priority (insertion order among equal priorities), each tagged with its scope:
//! global or one family. Selecting several scopes at once therefore still walks
//! them in priority order.

use std::sync::Arc;

use crate::{Bits, Engine, Entity, FamilyId, ListenerResult};

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u32);

impl ListenerId {
    /// Create a listener ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Which notification a closure listener is receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEvent {
    /// The entity entered the listener's scope.
    Added,
    /// The entity left the listener's scope.
    Removed,
}

/// Callbacks for entities entering and leaving a scope.
///
/// Structural changes made through `engine` from inside a callback are deferred
/// until the current dispatch completes.
///
/// Implemented for closures of the form
/// `Fn(&mut Engine, Entity, EntityEvent) -> ListenerResult`.
pub trait EntityListener: Send + Sync + 'static {
    /// The entity entered the scope.
    fn entity_added(&self, engine: &mut Engine, entity: Entity) -> ListenerResult;

    /// The entity left the scope.
    fn entity_removed(&self, engine: &mut Engine, entity: Entity) -> ListenerResult;
}

impl<F> EntityListener for F
where
    F: Fn(&mut Engine, Entity, EntityEvent) -> ListenerResult + Send + Sync + 'static,
{
    fn entity_added(&self, engine: &mut Engine, entity: Entity) -> ListenerResult {
        self(engine, entity, EntityEvent::Added)
    }

    fn entity_removed(&self, engine: &mut Engine, entity: Entity) -> ListenerResult {
        self(engine, entity, EntityEvent::Removed)
    }
}

struct ListenerEntry {
    id: ListenerId,
    priority: i32,
    /// `None` for global listeners.
    family: Option<FamilyId>,
    listener: Arc<dyn EntityListener>,
}

/// Listeners sorted by ascending priority, each tagged with its scope.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: Vec<ListenerEntry>,
    next_id: u32,
}

impl ListenerRegistry {
    pub(crate) fn insert(
        &mut self,
        listener: Arc<dyn EntityListener>,
        priority: i32,
        family: Option<FamilyId>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        let position = self
            .entries
            .partition_point(|entry| entry.priority <= priority);
        self.entries.insert(
            position,
            ListenerEntry {
                id,
                priority,
                family,
                listener,
            },
        );
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let Some(position) = self.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        self.entries.remove(position);
        true
    }

    /// Append the selected listeners to `out`, in priority order.
    ///
    /// Selects the global listeners when `global` is set, plus the listeners of
    /// every family whose index is in `families`.
    pub(crate) fn snapshot_into(
        &self,
        global: bool,
        families: &Bits,
        out: &mut Vec<Arc<dyn EntityListener>>,
    ) {
        out.extend(
            self.selected(global, families)
                .map(|entry| Arc::clone(&entry.listener)),
        );
    }

    fn selected<'a>(
        &'a self,
        global: bool,
        families: &'a Bits,
    ) -> impl Iterator<Item = &'a ListenerEntry> + 'a {
        self.entries.iter().filter(move |entry| {
            entry
                .family
                .map_or(global, |family| families.get(family.index()))
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl core::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("count", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
