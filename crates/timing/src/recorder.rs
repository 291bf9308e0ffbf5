//! The start/stop/tag/publish protocol against a meter registry.
//!
//! [`TimingRecorder::start`] opens a [`Sample`] before the wrapped call runs;
//! [`TimingRecorder::record`] closes it, builds one [`Observation`] and
//! submits it to the injected [`MeterRegistry`]. A sample is not `Clone` and
//! `record` takes it by value, so each sample is recorded at most once.
//!
//! Recording never fails from the caller's point of view. A registry that
//! refuses an observation is logged at `warn` and otherwise ignored.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{trace, warn};

use crate::{config::TimerConfig, error::RegistryError, identity::ComponentIdentity};

/// An open timing measurement for one invocation.
#[derive(Debug)]
#[must_use = "a sample must be passed to `TimingRecorder::record`"]
pub struct Sample {
    start: Instant,
    identity: ComponentIdentity,
    operation: Arc<str>,
}

impl Sample {
    /// Identity of the timed component.
    pub fn identity(&self) -> &ComponentIdentity {
        &self.identity
    }

    /// Name of the timed operation.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Time elapsed since the sample was opened.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// One timed, tagged record submitted to a [`MeterRegistry`].
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct Observation {
    /// Metric name.
    #[builder(into)]
    pub name: Arc<str>,
    /// `class` tag: the component identity.
    pub class: ComponentIdentity,
    /// `method` tag: the operation name.
    #[builder(into)]
    pub method: Arc<str>,
    /// `successful` tag.
    pub successful: bool,
    /// Time from sample creation to recording.
    pub duration: Duration,
    /// Percentile breakpoints requested for aggregation.
    #[builder(into)]
    pub percentiles: Arc<[f64]>,
}

impl Observation {
    /// Returns the tag pairs in a fixed order: `class`, `method`, `successful`.
    pub fn tags(&self) -> [(&'static str, &str); 3] {
        [
            ("class", self.class.as_str()),
            ("method", &self.method),
            ("successful", if self.successful { "true" } else { "false" }),
        ]
    }
}

/// Accepts completed observations and aggregates them.
///
/// Implementations must tolerate concurrent calls from any number of threads.
pub trait MeterRegistry: Send + Sync {
    /// Accumulates `observation` into the timer keyed by its name and tags.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the observation cannot be accepted.
    fn record(&self, observation: Observation) -> Result<(), RegistryError>;
}

impl<R: MeterRegistry + ?Sized> MeterRegistry for Arc<R> {
    fn record(&self, observation: Observation) -> Result<(), RegistryError> {
        (**self).record(observation)
    }
}

/// Closes samples and publishes observations.
///
/// Cheap to clone; clones share the registry and configuration.
#[derive(Clone)]
pub struct TimingRecorder {
    inner: Arc<RecorderInner>,
}

struct RecorderInner {
    registry: Box<dyn MeterRegistry>,
    metric_name: Arc<str>,
    percentiles: Arc<[f64]>,
    slow_call_threshold: Option<Duration>,
}

impl TimingRecorder {
    /// Creates a recorder publishing to `registry` with the metric name,
    /// percentiles and slow-call threshold from `config`.
    pub fn new(registry: impl MeterRegistry + 'static, config: &TimerConfig) -> Self {
        Self {
            inner: Arc::new(RecorderInner {
                registry: Box::new(registry),
                metric_name: Arc::from(config.metric_name()),
                percentiles: Arc::from(config.percentiles()),
                slow_call_threshold: config.slow_call_threshold(),
            }),
        }
    }

    /// Metric name observations are published under.
    pub fn metric_name(&self) -> &str {
        &self.inner.metric_name
    }

    /// Opens a sample for `operation` on `identity`, capturing the start instant.
    pub fn start(&self, identity: ComponentIdentity, operation: &str) -> Sample {
        Sample { start: Instant::now(), identity, operation: Arc::from(operation) }
    }

    /// Closes `sample` and publishes one observation.
    ///
    /// `failure` is the error the wrapped call ended with, if any.
    pub fn record(&self, sample: Sample, failure: Option<&dyn fmt::Display>) {
        let duration = sample.start.elapsed();
        let inner = &*self.inner;

        if let Some(threshold) = inner.slow_call_threshold.filter(|t| duration > *t) {
            warn!(
                class = %sample.identity,
                method = %sample.operation,
                duration_us = duration.as_micros() as u64,
                threshold_us = threshold.as_micros() as u64,
                "Slow repository call"
            );
        }

        trace!(
            metric = %inner.metric_name,
            class = %sample.identity,
            method = %sample.operation,
            successful = failure.is_none(),
            error = failure.map(tracing::field::display),
            duration_us = duration.as_micros() as u64,
            "Recording repository call"
        );

        let observation = Observation::builder()
            .name(Arc::clone(&inner.metric_name))
            .class(sample.identity)
            .method(sample.operation)
            .successful(failure.is_none())
            .duration(duration)
            .percentiles(Arc::clone(&inner.percentiles))
            .build();

        if let Err(err) = inner.registry.record(observation) {
            warn!(error = %err, metric = %inner.metric_name, "Failed to record repository timing");
        }
    }
}

impl fmt::Debug for TimingRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingRecorder")
            .field("metric_name", &self.inner.metric_name)
            .field("percentiles", &self.inner.percentiles)
            .field("slow_call_threshold", &self.inner.slow_call_threshold)
            .finish_non_exhaustive()
    }
}
