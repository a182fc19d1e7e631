//! Object pools with a two-phase release.
//!
//! A value freed while a tick is running might still be observed through a stale
//! handle later in the same tick, so it is parked in a cache stage
//! ([`Pool::defer_free`]) and only becomes reusable when the engine flushes its pools
//! at the end of the tick.

use std::any::{Any, type_name};

use crate::{Component, ComponentType};

/// Types that can be recycled through a [`Pool`].
///
/// `reset` runs every time a value goes back into a pool and must leave it in a state
/// indistinguishable from a fresh `Default` value as far as callers are concerned.
pub trait Poolable: Default + 'static {
    /// Clear the value before reuse.
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A free list of reusable values plus a cache stage for values freed mid-tick.
pub struct Pool<T> {
    free: Vec<T>,
    cache: Vec<T>,
    max_free: usize,
    peak: usize,
}

impl<T: Poolable> Pool<T> {
    /// Create a pool that keeps at most `max_free` idle values.
    #[must_use]
    pub const fn new(max_free: usize) -> Self {
        Self {
            free: Vec::new(),
            cache: Vec::new(),
            max_free,
            peak: 0,
        }
    }

    /// Take a value from the free list, or construct a fresh one.
    pub fn obtain(&mut self) -> T {
        self.free.pop().unwrap_or_default()
    }

    /// Reset `value` and return it to the free list.
    ///
    /// Values beyond the pool's bound are dropped.
    pub fn free(&mut self, mut value: T) {
        value.reset();
        if self.free.len() < self.max_free {
            self.free.push(value);
            self.peak = self.peak.max(self.free.len());
        }
    }

    /// Park `value` until the next [`flush`](Self::flush).
    pub fn defer_free(&mut self, value: T) {
        self.cache.push(value);
    }

    /// Move every cached value to the free list. Returns how many were moved.
    pub fn flush(&mut self) -> usize {
        let mut cache = std::mem::take(&mut self.cache);
        let count = cache.len();
        for value in cache.drain(..) {
            self.free(value);
        }
        self.cache = cache;
        count
    }

    /// Number of values ready for reuse.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of values waiting in the cache stage.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Largest size the free list has reached.
    #[must_use]
    pub const fn peak(&self) -> usize {
        self.peak
    }

    /// Drop every idle and cached value.
    pub fn clear(&mut self) {
        self.free.clear();
        self.cache.clear();
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("type", &type_name::<T>())
            .field("free", &self.free.len())
            .field("cached", &self.cache.len())
            .field("max_free", &self.max_free)
            .finish()
    }
}

/// Type-erased view of a `Pool<T>` for the per-kind pool table.
trait ErasedPool: Send {
    fn recycle(&mut self, value: Box<dyn Component>, deferred: bool);
    fn flush(&mut self) -> usize;
    fn clear(&mut self);
    fn free_count(&self) -> usize;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Poolable + Component> ErasedPool for Pool<T> {
    fn recycle(&mut self, value: Box<dyn Component>, deferred: bool) {
        let Ok(value) = value.into_any().downcast::<T>() else {
            panic!("value recycled into the pool of `{}`", type_name::<T>());
        };
        if deferred {
            self.defer_free(*value);
        } else {
            self.free(*value);
        }
    }

    fn flush(&mut self) -> usize {
        Pool::flush(self)
    }

    fn clear(&mut self) {
        Pool::clear(self);
    }

    fn free_count(&self) -> usize {
        Pool::free_count(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One pool per component kind, indexed by [`ComponentType`].
///
/// A kind gets a pool the first time it is obtained or freed through the engine.
/// Values of kinds without a pool are simply dropped on release.
pub(crate) struct ComponentPools {
    pools: Vec<Option<Box<dyn ErasedPool>>>,
    max_free: usize,
}

impl ComponentPools {
    pub(crate) const fn new(max_free: usize) -> Self {
        Self {
            pools: Vec::new(),
            max_free,
        }
    }

    fn pool_mut<T: Poolable + Component>(&mut self, ty: ComponentType) -> &mut Pool<T> {
        let index = ty.index();
        if index >= self.pools.len() {
            self.pools.resize_with(index + 1, || None);
        }
        let max_free = self.max_free;
        let slot = self.pools[index].get_or_insert_with(|| Box::new(Pool::<T>::new(max_free)));
        let pool: &mut dyn ErasedPool = &mut **slot;
        match pool.as_any_mut().downcast_mut::<Pool<T>>() {
            Some(pool) => pool,
            None => panic!("{ty:?} is not pooled as `{}`", type_name::<T>()),
        }
    }

    pub(crate) fn obtain<T: Poolable + Component>(&mut self, ty: ComponentType) -> T {
        self.pool_mut::<T>(ty).obtain()
    }

    pub(crate) fn free<T: Poolable + Component>(&mut self, ty: ComponentType, value: T) {
        self.pool_mut::<T>(ty).free(value);
    }

    /// Return a released component to its kind's pool. Returns `false` (and drops the
    /// value) if the kind is not pooled.
    pub(crate) fn recycle(
        &mut self,
        ty: ComponentType,
        value: Box<dyn Component>,
        deferred: bool,
    ) -> bool {
        match self.pools.get_mut(ty.index()).and_then(Option::as_mut) {
            Some(pool) => {
                pool.recycle(value, deferred);
                true
            }
            None => false,
        }
    }

    pub(crate) fn free_count(&self, ty: ComponentType) -> usize {
        self.pools
            .get(ty.index())
            .and_then(Option::as_ref)
            .map_or(0, |pool| pool.free_count())
    }

    /// Flush every pool's cache stage. Returns the total moved.
    pub(crate) fn flush(&mut self) -> usize {
        self.pools.iter_mut().flatten().map(|pool| pool.flush()).sum()
    }

    pub(crate) fn clear(&mut self) {
        for pool in self.pools.iter_mut().flatten() {
            pool.clear();
        }
    }
}

impl std::fmt::Debug for ComponentPools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentPools")
            .field("kinds", &self.pools.iter().flatten().count())
            .field("max_free", &self.max_free)
            .finish()
    }
}
