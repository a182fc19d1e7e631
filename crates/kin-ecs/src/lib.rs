// Allow missing docs for now
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::float_cmp)]
#![allow(clippy::redundant_pub_crate)]

//! Kin ECS - Family-matching Entity Component System
//!
//! Systems operate on dynamic subsets of entities, *families*, selected by the set
//! of component kinds each entity carries. Family membership is maintained
//! incrementally: a component change re-tests only the changed entity, never the
//! whole population, and every registered family list stays current even while a
//! system is iterating it.
//!
//! # Key Concepts
//!
//! - **Entity**: A generational handle to a record holding at most one component per kind
//! - **Component**: Any `Send + Sync + 'static` value, indexed by a dense [`ComponentType`]
//! - **Family**: An interned `(all, any, exclude)` predicate over component kinds
//! - **Listener**: A callback fired when an entity enters or leaves the engine or a family
//! - **System**: Per-tick logic, run in ascending priority order
//!
//! # Deferred Mutation
//!
//! While listeners are being notified or a tick is running, structural changes are
//! queued and applied right after the current dispatch or system update. Component
//! values themselves change immediately; only family membership waits. Records and
//! entity slots released during a tick are recycled once the tick ends.
//!
//! ```
//! use kin_ecs::prelude::*;
//!
//! struct Position(f32);
//! struct Velocity(f32);
//!
//! let mut engine = Engine::new();
//! let moving = engine.family(Family::builder().all::<Position>().all::<Velocity>());
//!
//! let entity = engine.spawn().unwrap();
//! engine.insert(entity, Position(0.0)).unwrap();
//! engine.insert(entity, Velocity(2.0)).unwrap();
//!
//! engine.add_system(IteratingSystem::new(
//!     moving,
//!     |engine: &mut Engine, entity: Entity, delta: f32| -> EcsResult<()> {
//!         let speed = engine.get::<Velocity>(entity).map_or(0.0, |v| v.0);
//!         if let Some(position) = engine.get_mut::<Position>(entity) {
//!             position.0 += speed * delta;
//!         }
//!         Ok(())
//!     },
//! ));
//!
//! engine.update(0.5).unwrap();
//! assert_eq!(engine.get::<Position>(entity).unwrap().0, 1.0);
//! ```

mod bits;
mod command;
mod component;
mod config;
mod engine;
mod entity;
mod error;
mod family;
mod listener;
mod mapper;
mod membership;
mod pool;
mod scheduler;
mod system;

pub use bits::{Bits, Ones};
pub use component::{Component, ComponentInfo, ComponentType, ComponentTypeRegistry};
pub use config::EngineConfig;
pub use engine::Engine;
pub use entity::{Entity, EntityAllocator, EntityFlags, EntityId, EntityRecord, Generation};
pub use error::{EcsError, EcsResult, ListenerResult};
pub use family::{Family, FamilyBuilder, FamilyId, FamilyRegistry};
pub use listener::{EntityEvent, EntityListener, ListenerId};
pub use mapper::ComponentMapper;
pub use pool::{Pool, Poolable};
pub use scheduler::SystemId;
pub use system::{
    AsAny, EntityProcessor, IntervalSystem, IntervalTask, IteratingSystem, System,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Component, ComponentMapper, EcsError, EcsResult, Engine, Entity, EntityEvent,
        EntityListener, Family, IntervalSystem, IteratingSystem, ListenerResult, Poolable,
        System,
    };
}
