//! Error types for the timing core.
//!
//! None of these errors ever reach the caller of a timed operation. Wrapped
//! operation failures pass through the interceptor untouched; the types here
//! cover configuration, meter registry submission and registry lookups.
//!
//! # Error Types
//!
//! - [`ConfigError`] - Invalid [`TimerConfig`](crate::TimerConfig) values
//! - [`RegistryError`] - A [`MeterRegistry`](crate::MeterRegistry) refused an observation
//! - [`SearchError`] - A registry lookup did not match exactly one timer

use thiserror::Error;

/// Errors raised while validating timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required text field is empty or whitespace.
    #[error("{field} must not be blank")]
    Blank {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A required collection is empty.
    #[error("{field} must contain at least one entry")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A numeric value lies outside its accepted range.
    #[error("{field} value {value} is out of range, expected {expected}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value, rendered for display.
        value: String,
        /// Human-readable description of the accepted range.
        expected: &'static str,
    },

    /// A numeric value is below its minimum.
    #[error("{field} value {value} is below the minimum of {min}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value, rendered for display.
        value: String,
        /// The minimum accepted value, rendered for display.
        min: String,
    },
}

/// Errors a [`MeterRegistry`](crate::MeterRegistry) may report when an
/// observation cannot be accepted.
///
/// The [`TimingRecorder`](crate::TimingRecorder) logs and absorbs these; they
/// are never propagated into the timed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The registry refused the observation.
    #[error("observation for metric {metric} rejected: {reason}")]
    Rejected {
        /// Metric name of the refused observation.
        metric: String,
        /// Why the registry refused it.
        reason: String,
    },

    /// The registry is not able to accept observations at all.
    #[error("meter registry unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

impl RegistryError {
    /// Creates a new `Rejected` error.
    #[must_use]
    pub fn rejected(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected { metric: metric.into(), reason: reason.into() }
    }

    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into() }
    }
}

/// Errors returned by [`Search::single`](crate::registry::Search::single).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// No timer matched the metric name and tags.
    #[error("no timer found for metric {metric} with tags {tags:?}")]
    NoMatch {
        /// The searched metric name.
        metric: String,
        /// The searched tag pairs.
        tags: Vec<(String, String)>,
    },

    /// More than one timer matched.
    #[error("{count} timers found for metric {metric} with tags {tags:?}, expected exactly one")]
    Ambiguous {
        /// The searched metric name.
        metric: String,
        /// The searched tag pairs.
        tags: Vec<(String, String)>,
        /// How many timers matched.
        count: usize,
    },
}
