//! Runtime configuration
//!
//! Tunables for the scripting runtime: how deep a synchronous emission chain
//! may nest, how much deferred work runs per tick, and whether spawn
//! triggers fire when an entity is first bound.

use crate::Result;
use serde::{Deserialize, Serialize};

/// Hard ceiling for [`RuntimeConfig::max_dispatch_depth`]
pub const MAX_DISPATCH_DEPTH: usize = 1024;

/// Configuration for a [`Runtime`](crate::Runtime)
///
/// # Example
///
/// ```
/// use smart_core::RuntimeConfig;
///
/// let config = RuntimeConfig::default();
/// assert_eq!(config.max_dispatch_depth(), 32);
/// assert_eq!(config.deferred_per_tick(), 1);
///
/// let config = RuntimeConfig::default().with_max_dispatch_depth(0);
/// assert_eq!(config.max_dispatch_depth(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bound on nested emissions within one synchronous call chain
    ///
    /// Clamped to `[1, MAX_DISPATCH_DEPTH]`. Cyclic authoring data (a state
    /// change whose trigger sets the state again) stops here instead of
    /// overflowing the stack.
    max_dispatch_depth: usize,

    /// Deferred work items drained per tick (at least 1)
    deferred_per_tick: usize,

    /// Fire `on_spawn` triggers when an entity is first bound
    spawn_on_bind: bool,
}

impl RuntimeConfig {
    /// Parse a configuration from RON
    ///
    /// Missing fields take their defaults; out-of-range values are clamped.
    ///
    /// ```
    /// use smart_core::RuntimeConfig;
    ///
    /// let config = RuntimeConfig::from_ron("(max_dispatch_depth: 8)").unwrap();
    /// assert_eq!(config.max_dispatch_depth(), 8);
    /// assert!(config.spawn_on_bind());
    /// ```
    pub fn from_ron(content: &str) -> Result<Self> {
        let raw: RuntimeConfig = ron::from_str(content)?;
        Ok(Self::default()
            .with_max_dispatch_depth(raw.max_dispatch_depth)
            .with_deferred_per_tick(raw.deferred_per_tick)
            .with_spawn_on_bind(raw.spawn_on_bind))
    }

    /// Set the maximum dispatch depth
    pub fn with_max_dispatch_depth(mut self, depth: usize) -> Self {
        self.set_max_dispatch_depth(depth);
        self
    }

    /// Set the number of deferred items drained per tick
    pub fn with_deferred_per_tick(mut self, n: usize) -> Self {
        self.deferred_per_tick = n.max(1);
        self
    }

    /// Enable or disable spawn triggers at bind time
    pub fn with_spawn_on_bind(mut self, enabled: bool) -> Self {
        self.spawn_on_bind = enabled;
        self
    }

    /// Get the maximum dispatch depth
    pub fn max_dispatch_depth(&self) -> usize {
        self.max_dispatch_depth
    }

    /// Set the maximum dispatch depth, clamped to `[1, MAX_DISPATCH_DEPTH]`
    pub fn set_max_dispatch_depth(&mut self, depth: usize) {
        self.max_dispatch_depth = depth.clamp(1, MAX_DISPATCH_DEPTH);
    }

    /// Get the number of deferred items drained per tick
    pub fn deferred_per_tick(&self) -> usize {
        self.deferred_per_tick
    }

    /// Whether spawn triggers fire at bind time
    pub fn spawn_on_bind(&self) -> bool {
        self.spawn_on_bind
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_dispatch_depth: 32,
            deferred_per_tick: 1,
            spawn_on_bind: true,
        }
    }
}
