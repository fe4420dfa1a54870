//! Registry configuration and capacity policy.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CapacityPolicy
// ---------------------------------------------------------------------------

/// Which sessions go first when the registry is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Oldest `last_activity_at` first. Matches stale reaping.
    #[default]
    LeastRecentlyActive,
    /// Smallest participant count first; ties go to the least recently
    /// active session.
    FewestParticipants,
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`SessionRegistry`](crate::SessionRegistry).
///
/// Every field has a default, so a partial JSON object deserializes into
/// a complete config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How many sessions may exist at once before `create` evicts.
    pub max_sessions: usize,

    /// Fraction of the registry evicted when `create` finds it full.
    /// At least one session is always evicted.
    pub eviction_fraction: f64,

    /// Which sessions capacity eviction picks.
    pub capacity_policy: CapacityPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            eviction_fraction: 0.10,
            capacity_policy: CapacityPolicy::default(),
        }
    }
}

impl RegistryConfig {
    /// A default config with a different capacity.
    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `max_sessions` is at least 1.
    /// - `eviction_fraction` is within `(0, 1]`; NaN falls back to the default.
    pub fn validated(mut self) -> Self {
        if self.max_sessions == 0 {
            tracing::warn!("max_sessions is 0, clamping to 1");
            self.max_sessions = 1;
        }
        if self.eviction_fraction.is_nan() || self.eviction_fraction <= 0.0 {
            tracing::warn!(
                fraction = self.eviction_fraction,
                "eviction_fraction must be positive, using default"
            );
            self.eviction_fraction = Self::default().eviction_fraction;
        }
        self.eviction_fraction = self.eviction_fraction.min(1.0);
        self
    }

    /// How many sessions to evict from a registry holding `len`.
    pub fn eviction_count(&self, len: usize) -> usize {
        let count = (len as f64 * self.eviction_fraction).ceil() as usize;
        count.clamp(1, len.max(1))
    }
}
