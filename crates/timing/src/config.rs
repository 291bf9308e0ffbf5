//! Configuration for the repository timer.
//!
//! [`TimerConfig`] carries the metric name, the percentile breakpoints requested
//! for every observation, the operations that are never timed and an optional
//! slow-call threshold. It can be built in code with [`TimerConfig::builder`]
//! or deserialized; both paths go through the same validation, so a loaded
//! configuration is ready to hand to the timer.
//!
//! ```
//! use repo_timing::TimerConfig;
//!
//! let config: TimerConfig = serde_json::from_str(
//!     r#"{ "metric_name": "dao", "slow_call_threshold": "250ms" }"#,
//! )?;
//! assert_eq!(config.metric_name(), "dao");
//! assert_eq!(config.percentiles(), &[0.5, 0.75, 0.9, 0.95, 0.99]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Metric name observations are published under.
pub const DEFAULT_METRIC_NAME: &str = "repository";

/// Percentile breakpoints requested for aggregation.
pub const DEFAULT_PERCENTILES: [f64; 5] = [0.5, 0.75, 0.9, 0.95, 0.99];

/// Operations that are proceeded without timing.
pub const DEFAULT_BYPASS_OPERATIONS: [&str; 2] = ["fmt", "to_string"];

fn default_metric_name() -> String {
    DEFAULT_METRIC_NAME.to_owned()
}

fn default_percentiles() -> Vec<f64> {
    DEFAULT_PERCENTILES.to_vec()
}

fn default_bypass_operations() -> Vec<String> {
    DEFAULT_BYPASS_OPERATIONS.iter().map(|op| (*op).to_owned()).collect()
}

/// Settings for [`RepositoryTimer`](crate::RepositoryTimer).
///
/// Every `TimerConfig` in existence has passed validation: the builder
/// returns an error instead of an invalid value and deserialization fails the
/// same way.
///
/// # Validation
///
/// - `metric_name` must not be blank
/// - `percentiles` must be non-empty, each in `(0.0, 1.0]`
/// - `bypass_operations` entries must not be blank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimerConfig")]
pub struct TimerConfig {
    metric_name: String,
    percentiles: Vec<f64>,
    bypass_operations: Vec<String>,
    #[serde(serialize_with = "humantime_serde::serialize", skip_serializing_if = "Option::is_none")]
    slow_call_threshold: Option<Duration>,
}

/// Wire form of [`TimerConfig`], checked before it is accepted.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTimerConfig {
    #[serde(default = "default_metric_name")]
    metric_name: String,

    #[serde(default = "default_percentiles")]
    percentiles: Vec<f64>,

    #[serde(default = "default_bypass_operations")]
    bypass_operations: Vec<String>,

    /// Calls slower than this are logged at `warn`.
    #[serde(with = "humantime_serde", default)]
    slow_call_threshold: Option<Duration>,
}

impl TryFrom<RawTimerConfig> for TimerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawTimerConfig) -> Result<Self, Self::Error> {
        let config = Self {
            metric_name: raw.metric_name,
            percentiles: raw.percentiles,
            bypass_operations: raw.bypass_operations,
            slow_call_threshold: raw.slow_call_threshold,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            metric_name: default_metric_name(),
            percentiles: default_percentiles(),
            bypass_operations: default_bypass_operations(),
            slow_call_threshold: None,
        }
    }
}

#[bon::bon]
impl TimerConfig {
    /// Creates a validated configuration. Unset fields take their defaults and
    /// `slow_call_threshold` logs calls slower than it at `warn`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `metric_name` is blank
    /// - `percentiles` is empty or contains a value outside `(0.0, 1.0]`
    /// - a bypass operation name is blank
    #[builder]
    pub fn new(
        #[builder(into, default = default_metric_name())] metric_name: String,
        #[builder(
            with = |iter: impl IntoIterator<Item = f64>| iter.into_iter().collect(),
            default = default_percentiles()
        )]
        percentiles: Vec<f64>,
        #[builder(
            with = |iter: impl IntoIterator<Item = impl Into<String>>| {
                iter.into_iter().map(Into::into).collect()
            },
            default = default_bypass_operations()
        )]
        bypass_operations: Vec<String>,
        slow_call_threshold: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let config = Self { metric_name, percentiles, bypass_operations, slow_call_threshold };
        config.validate()?;
        Ok(config)
    }

    /// Returns the metric name.
    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Returns the requested percentile breakpoints.
    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }

    /// Returns the operations proceeded without timing.
    pub fn bypass_operations(&self) -> &[String] {
        &self.bypass_operations
    }

    /// Returns `true` if `operation` is never timed.
    pub fn is_bypassed(&self, operation: &str) -> bool {
        self.bypass_operations.iter().any(|op| op == operation)
    }

    /// Returns the slow-call threshold, if any.
    pub fn slow_call_threshold(&self) -> Option<Duration> {
        self.slow_call_threshold
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metric_name.trim().is_empty() {
            return Err(ConfigError::Blank { field: "metric_name" });
        }
        if self.percentiles.is_empty() {
            return Err(ConfigError::Empty { field: "percentiles" });
        }
        if let Some(bad) = self.percentiles.iter().find(|q| !(**q > 0.0 && **q <= 1.0)) {
            return Err(ConfigError::OutOfRange {
                field: "percentiles",
                value: bad.to_string(),
                expected: "(0.0, 1.0]",
            });
        }
        if self.bypass_operations.iter().any(|op| op.trim().is_empty()) {
            return Err(ConfigError::Blank { field: "bypass_operations" });
        }
        Ok(())
    }
}
