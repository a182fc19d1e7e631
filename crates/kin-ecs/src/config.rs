//! Engine configuration.

/// Settings fixed when an [`Engine`](crate::Engine) is constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Recycle entity records and poolable components.
    pub pooled: bool,
    /// Entity slots reserved up front.
    pub entity_capacity: usize,
    /// Upper bound on idle records kept by the entity pool.
    pub max_pooled_entities: usize,
    /// Upper bound on idle values kept by each component pool.
    pub max_pooled_components: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooled: false,
            entity_capacity: 0,
            max_pooled_entities: 1024,
            max_pooled_components: 1024,
        }
    }
}

impl EngineConfig {
    /// Default configuration with pooling enabled.
    #[must_use]
    pub fn pooled() -> Self {
        Self::default().with_pooled(true)
    }

    /// Enable or disable pooling.
    #[must_use]
    pub const fn with_pooled(mut self, pooled: bool) -> Self {
        self.pooled = pooled;
        self
    }

    /// Reserve room for `capacity` entities.
    #[must_use]
    pub const fn with_entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    /// Bound the entity pool.
    #[must_use]
    pub const fn with_max_pooled_entities(mut self, max: usize) -> Self {
        self.max_pooled_entities = max;
        self
    }

    /// Bound each component pool.
    #[must_use]
    pub const fn with_max_pooled_components(mut self, max: usize) -> Self {
        self.max_pooled_components = max;
        self
    }
}
