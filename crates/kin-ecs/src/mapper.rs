//! Typed component access with the kind resolved up front.

use std::{fmt, marker::PhantomData};

use crate::{Component, ComponentType, Engine, Entity};

/// Resolves `T`'s [`ComponentType`] once and then reads `T` by slot index.
///
/// Handy inside processors that touch the same kinds for many entities:
///
/// ```
/// use kin_ecs::{ComponentMapper, Engine};
///
/// struct Health(u32);
///
/// let mut engine = Engine::new();
/// let health = ComponentMapper::<Health>::new(&mut engine);
///
/// let entity = engine.spawn().unwrap();
/// engine.insert(entity, Health(10)).unwrap();
///
/// health.get_mut(&mut engine, entity).unwrap().0 -= 3;
/// assert_eq!(health.get(&engine, entity).unwrap().0, 7);
/// ```
pub struct ComponentMapper<T> {
    ty: ComponentType,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentMapper<T> {
    /// Create a mapper, registering `T` with the engine if needed.
    pub fn new(engine: &mut Engine) -> Self {
        Self {
            ty: engine.component_type::<T>(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn component_type(&self) -> ComponentType {
        self.ty
    }

    #[must_use]
    pub fn get<'a>(&self, engine: &'a Engine, entity: Entity) -> Option<&'a T> {
        engine.entity(entity)?.get(self.ty)
    }

    pub fn get_mut<'a>(&self, engine: &'a mut Engine, entity: Entity) -> Option<&'a mut T> {
        engine
            .component_by_type_mut(entity, self.ty)?
            .as_any_mut()
            .downcast_mut()
    }

    #[must_use]
    pub fn has(&self, engine: &Engine, entity: Entity) -> bool {
        engine
            .entity(entity)
            .is_some_and(|record| record.component_bits().get(self.ty.index()))
    }
}

impl<T> Clone for ComponentMapper<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentMapper<T> {}

impl<T> fmt::Debug for ComponentMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMapper")
            .field("type", &std::any::type_name::<T>())
            .field("ty", &self.ty)
            .finish()
    }
}
