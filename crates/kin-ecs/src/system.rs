//! Systems: per-tick logic run by the engine in priority order.
//!
//! Besides the [`System`] trait itself this module provides two common shapes:
//! [`IteratingSystem`], which processes every entity of a family once per tick, and
//! [`IntervalSystem`], which runs a task at a fixed step regardless of frame delta.

use std::{any::Any, fmt, sync::Arc};

use crate::{EcsResult, Engine, Entity, Family};

/// Upcasting helpers for downcasting trait objects back to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
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

/// A unit of per-tick logic.
///
/// Systems run in ascending [`priority`](Self::priority) order; systems with equal
/// priority run in the order they were added. Structural changes made from
/// [`update`](Self::update) are deferred until the system returns.
pub trait System: AsAny + Send {
    /// Lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Systems that are not processing are skipped by the tick.
    fn is_processing(&self) -> bool {
        true
    }

    /// Called once when the system is added to an engine.
    fn added_to_engine(&mut self, _engine: &mut Engine) {}

    /// Called once when the system is removed from an engine.
    fn removed_from_engine(&mut self, _engine: &mut Engine) {}

    /// Run one tick.
    fn update(&mut self, engine: &mut Engine, delta: f32) -> EcsResult<()>;
}

// ==================== Iterating ====================

/// Per-entity logic for an [`IteratingSystem`].
///
/// Implemented for closures of the form `FnMut(&mut Engine, Entity, f32) -> EcsResult<()>`.
pub trait EntityProcessor: Send + 'static {
    fn process(&mut self, engine: &mut Engine, entity: Entity, delta: f32) -> EcsResult<()>;
}

impl<F> EntityProcessor for F
where
    F: FnMut(&mut Engine, Entity, f32) -> EcsResult<()> + Send + 'static,
{
    fn process(&mut self, engine: &mut Engine, entity: Entity, delta: f32) -> EcsResult<()> {
        self(engine, entity, delta)
    }
}

/// Runs a processor over every entity of a family, once per tick.
///
/// The family's list is walked by index. Inside a tick, entities removed by the
/// processor stay in the list until the system returns, so no entity is skipped or
/// visited twice.
pub struct IteratingSystem<P> {
    family: Arc<Family>,
    processor: P,
    priority: i32,
    processing: bool,
}

impl<P: EntityProcessor> IteratingSystem<P> {
    #[must_use]
    pub const fn new(family: Arc<Family>, processor: P) -> Self {
        Self {
            family,
            processor,
            priority: 0,
            processing: true,
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn family(&self) -> &Arc<Family> {
        &self.family
    }

    #[must_use]
    pub const fn processor(&self) -> &P {
        &self.processor
    }

    pub const fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }

    pub const fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }
}

impl<P: EntityProcessor> System for IteratingSystem<P> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_processing(&self) -> bool {
        self.processing
    }

    fn added_to_engine(&mut self, engine: &mut Engine) {
        engine.entities_for(&self.family);
    }

    /// Structural changes made by the processor are deferred until the walk ends,
    /// also when the system is updated directly rather than by [`Engine::update`].
    fn update(&mut self, engine: &mut Engine, delta: f32) -> EcsResult<()> {
        let family: &Family = &self.family;
        let processor = &mut self.processor;
        engine.deferring(|engine| {
            let mut index = 0;
            while let Some(&entity) = engine.family_entities(family).get(index) {
                processor.process(engine, entity, delta)?;
                index += 1;
            }
            Ok(())
        })
    }
}

impl<P> fmt::Debug for IteratingSystem<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IteratingSystem")
            .field("family", &self.family.id())
            .field("priority", &self.priority)
            .field("processing", &self.processing)
            .finish_non_exhaustive()
    }
}

// ==================== Interval ====================

/// Fixed-step logic for an [`IntervalSystem`].
///
/// Implemented for closures of the form `FnMut(&mut Engine) -> EcsResult<()>`.
pub trait IntervalTask: Send + 'static {
    fn run(&mut self, engine: &mut Engine) -> EcsResult<()>;
}

impl<F> IntervalTask for F
where
    F: FnMut(&mut Engine) -> EcsResult<()> + Send + 'static,
{
    fn run(&mut self, engine: &mut Engine) -> EcsResult<()> {
        self(engine)
    }
}

/// Runs a task every `interval` units of accumulated delta time.
///
/// A long frame runs the task several times; a short one may not run it at all.
pub struct IntervalSystem<T> {
    task: T,
    interval: f32,
    accumulator: f32,
    priority: i32,
    processing: bool,
}

impl<T: IntervalTask> IntervalSystem<T> {
    /// # Panics
    ///
    /// Panics if `interval` is not positive.
    #[must_use]
    pub fn new(interval: f32, task: T) -> Self {
        assert!(interval > 0.0, "interval must be positive, got {interval}");
        Self {
            task,
            interval,
            accumulator: 0.0,
            priority: 0,
            processing: true,
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn interval(&self) -> f32 {
        self.interval
    }

    /// Delta time carried over to the next tick.
    #[must_use]
    pub const fn accumulator(&self) -> f32 {
        self.accumulator
    }

    #[must_use]
    pub const fn task(&self) -> &T {
        &self.task
    }

    pub const fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }

    pub const fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }
}

impl<T: IntervalTask> System for IntervalSystem<T> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_processing(&self) -> bool {
        self.processing
    }

    fn update(&mut self, engine: &mut Engine, delta: f32) -> EcsResult<()> {
        self.accumulator += delta;
        while self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            self.task.run(engine)?;
        }
        Ok(())
    }
}

impl<T> fmt::Debug for IntervalSystem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalSystem")
            .field("interval", &self.interval)
            .field("accumulator", &self.accumulator)
            .field("priority", &self.priority)
            .field("processing", &self.processing)
            .finish_non_exhaustive()
    }
}
