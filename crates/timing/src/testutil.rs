//! Test helpers for code that records repository timings.
//!
//! Available under `#[cfg(test)]` and with the `testutil` feature.
//!
//! - [`CapturingRegistry`] keeps every observation for later inspection.
//! - [`RejectingRegistry`] refuses every observation.
//! - [`single_timer`] looks up the one timer for a class/method pair.

use parking_lot::Mutex;

use crate::{
    error::{RegistryError, SearchError},
    recorder::{MeterRegistry, Observation},
    registry::{SimpleMeterRegistry, TimerSnapshot},
};

/// A [`MeterRegistry`] that stores observations in arrival order.
#[derive(Debug, Default)]
pub struct CapturingRegistry {
    observations: Mutex<Vec<Observation>>,
}

impl CapturingRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().clone()
    }

    /// Number of observations recorded so far.
    pub fn len(&self) -> usize {
        self.observations.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.observations.lock().is_empty()
    }
}

impl MeterRegistry for CapturingRegistry {
    fn record(&self, observation: Observation) -> Result<(), RegistryError> {
        self.observations.lock().push(observation);
        Ok(())
    }
}

/// A [`MeterRegistry`] that refuses every observation with
/// [`RegistryError::Unavailable`], like a registry whose backend is down.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectingRegistry;

impl MeterRegistry for RejectingRegistry {
    fn record(&self, _observation: Observation) -> Result<(), RegistryError> {
        Err(RegistryError::unavailable("registry is closed"))
    }
}

/// Returns the only timer under metric `repository` tagged with `class` and `method`.
///
/// # Errors
///
/// Returns [`SearchError`] unless exactly one timer matches.
pub fn single_timer(
    registry: &SimpleMeterRegistry,
    class: &str,
    method: &str,
) -> Result<TimerSnapshot, SearchError> {
    registry
        .find(crate::config::DEFAULT_METRIC_NAME)
        .tag("class", class)
        .tag("method", method)
        .single()
}

/// Asserts that `registry` holds exactly `expected` observations.
#[macro_export]
macro_rules! assert_observation_count {
    ($registry:expr, $expected:expr) => {{
        let actual = $registry.len();
        assert_eq!(
            actual, $expected,
            "expected {} observations, got {}: {:?}",
            $expected,
            actual,
            $registry.observations()
        );
    }};
}
