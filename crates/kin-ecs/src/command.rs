//! Deferred structural operations.
//!
//! While the engine is notifying listeners or running a tick, structural changes
//! cannot touch the lists being walked. They are recorded here instead and replayed
//! in FIFO order once the current dispatch or system update finishes.

use std::collections::VecDeque;

use crate::{ComponentType, Entity};

/// A structural operation waiting to be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Register the entity with the engine.
    AddEntity(Entity),
    /// Remove the entity from the engine.
    RemoveEntity(Entity),
    /// A component was added to the entity; recompute its family membership.
    ComponentAdded {
        entity: Entity,
        component: ComponentType,
    },
    /// A component was removed from the entity; recompute its family membership.
    ComponentRemoved {
        entity: Entity,
        component: ComponentType,
    },
}

impl Command {
    /// The entity the command targets.
    #[must_use]
    pub const fn entity(&self) -> Entity {
        match *self {
            Self::AddEntity(entity)
            | Self::RemoveEntity(entity)
            | Self::ComponentAdded { entity, .. }
            | Self::ComponentRemoved { entity, .. } => entity,
        }
    }
}

/// FIFO queue of deferred [`Command`]s.
///
/// The backing buffer is kept between drains, so steady-state queuing does not
/// allocate.
#[derive(Default)]
pub struct CommandQueue {
    pending: VecDeque<Command>,
}

impl CommandQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command.
    pub fn push(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    /// Take the oldest command.
    pub fn pop(&mut self) -> Option<Command> {
        self.pending.pop_front()
    }

    /// Iterate queued commands, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.pending.iter()
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every queued command.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl core::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.pending.len())
            .finish()
    }
}
