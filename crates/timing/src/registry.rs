//! In-memory meter registry.
//!
//! [`SimpleMeterRegistry`] aggregates observations into one timer per
//! [`MeterId`] (metric name plus tag set) and answers lookups through
//! [`SimpleMeterRegistry::find`]. It is what tests and small deployments plug
//! into a [`RepositoryTimer`](crate::RepositoryTimer).
//!
//! # Aggregation
//!
//! Each timer keeps a count, the total and maximum duration, and a bounded
//! sliding window of the most recent durations (1024 by default). Percentiles
//! are computed from that window at snapshot time with the nearest-rank
//! method. The percentile set requested by the first observation for a meter
//! is the one that meter reports.
//!
//! A snapshot taken while observations are being recorded may lag behind, but
//! every duration its total includes is also reflected in its count and max,
//! so `max >= mean` holds for every snapshot.
//!
//! ```
//! use std::time::Duration;
//!
//! use repo_timing::{ComponentIdentity, MeterRegistry, Observation, SimpleMeterRegistry};
//!
//! let registry = SimpleMeterRegistry::new();
//! registry.record(
//!     Observation::builder()
//!         .name("repository")
//!         .class(ComponentIdentity::new("ConfigRepository"))
//!         .method("save")
//!         .successful(true)
//!         .duration(Duration::from_millis(3))
//!         .percentiles(vec![0.5, 0.99])
//!         .build(),
//! )?;
//!
//! let timer = registry.find("repository").tag("method", "save").single()?;
//! assert_eq!(timer.count, 1);
//! assert_eq!(timer.percentile(0.99), Some(Duration::from_millis(3)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::{
    error::{ConfigError, RegistryError, SearchError},
    recorder::{MeterRegistry, Observation},
};

/// Default number of durations retained per timer.
pub const DEFAULT_WINDOW_SIZE: usize = 1024;

/// Failure rate above which [`SimpleMeterRegistry::log_metrics`] warns.
const FAILURE_RATE_WARN_THRESHOLD: f64 = 0.05;

// ── MeterId ─────────────────────────────────────────────────────────────

/// Key of one timer: metric name plus tag set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeterId {
    /// Metric name.
    pub name: String,
    /// Tag pairs, ordered by key.
    pub tags: BTreeMap<String, String>,
}

impl MeterId {
    fn of(observation: &Observation) -> Self {
        Self {
            name: observation.name.to_string(),
            tags: observation
                .tags()
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        }
    }

    /// Returns the value of tag `key`, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name)?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

// ── LatencyHistogram ────────────────────────────────────────────────────

/// Bounded sliding window of recent durations, in nanoseconds.
struct LatencyHistogram {
    inner: Mutex<HistogramInner>,
}

struct HistogramInner {
    buf: Vec<u64>,
    pos: usize,
    capacity: usize,
}

impl LatencyHistogram {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HistogramInner {
                buf: Vec::with_capacity(capacity),
                pos: 0,
                capacity,
            }),
        }
    }

    fn record(&self, nanos: u64) {
        let mut inner = self.inner.lock();
        let pos = inner.pos;
        if inner.buf.len() < inner.capacity {
            inner.buf.push(nanos);
        } else {
            inner.buf[pos] = nanos;
        }
        inner.pos = (pos + 1) % inner.capacity;
    }

    /// Value at each requested quantile. Empty windows report zero.
    fn percentiles(&self, quantiles: &[f64]) -> Vec<(f64, Duration)> {
        let mut sorted = self.inner.lock().buf.clone();
        sorted.sort_unstable();
        quantiles
            .iter()
            .map(|&q| {
                let nanos =
                    if sorted.is_empty() { 0 } else { sorted[percentile_index(sorted.len(), q)] };
                (q, Duration::from_nanos(nanos))
            })
            .collect()
    }
}

/// Nearest-rank index: `ceil(q * len) - 1`, clamped to the valid range.
fn percentile_index(len: usize, quantile: f64) -> usize {
    if len == 0 {
        return 0;
    }
    // Absorb float error so 0.95 * 100 ranks as 95, not 96.
    let rank = (quantile * len as f64 - 1e-9).ceil();
    let rank = if rank.is_finite() && rank > 0.0 { rank as usize } else { 0 };
    rank.saturating_sub(1).min(len - 1)
}

// ── Timer ───────────────────────────────────────────────────────────────

struct Timer {
    count: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
    histogram: LatencyHistogram,
    percentiles: Arc<[f64]>,
}

impl Timer {
    fn new(window_size: usize, percentiles: Arc<[f64]>) -> Self {
        Self {
            count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            max_nanos: AtomicU64::new(0),
            histogram: LatencyHistogram::new(window_size),
            percentiles,
        }
    }

    fn record(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        // Written max, count, total; `snapshot` reads them in reverse.
        self.max_nanos.fetch_max(nanos, Ordering::Release);
        self.count.fetch_add(1, Ordering::Release);
        self.total_nanos.fetch_add(nanos, Ordering::Release);
        self.histogram.record(nanos);
    }

    fn snapshot(&self, id: &MeterId) -> TimerSnapshot {
        let total = self.total_nanos.load(Ordering::Acquire);
        let count = self.count.load(Ordering::Acquire);
        let max = self.max_nanos.load(Ordering::Acquire);
        TimerSnapshot::builder()
            .id(id.clone())
            .count(count)
            .total(Duration::from_nanos(total))
            .max(Duration::from_nanos(max))
            .percentiles(self.histogram.percentiles(&self.percentiles))
            .build()
    }
}

// ── TimerSnapshot ───────────────────────────────────────────────────────

/// Point-in-time view of one timer.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct TimerSnapshot {
    /// Which timer this is.
    pub id: MeterId,
    /// Number of recorded observations.
    #[builder(default)]
    pub count: u64,
    /// Sum of all recorded durations.
    #[builder(default)]
    pub total: Duration,
    /// Largest recorded duration.
    #[builder(default)]
    pub max: Duration,
    /// Value at each requested quantile over the retained window.
    #[builder(default)]
    pub percentiles: Vec<(f64, Duration)>,
}

impl TimerSnapshot {
    /// Mean duration, or zero if nothing was recorded.
    #[must_use]
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((self.total.as_nanos() / u128::from(self.count)) as u64)
    }

    /// Value at quantile `q`, if `q` was one of the requested percentiles.
    #[must_use]
    pub fn percentile(&self, q: f64) -> Option<Duration> {
        self.percentiles.iter().find(|(p, _)| (p - q).abs() < 1e-9).map(|(_, d)| *d)
    }
}

// ── SimpleMeterRegistry ─────────────────────────────────────────────────

/// Thread-safe in-memory [`MeterRegistry`].
///
/// Cheap to clone; clones share the same timers.
#[derive(Clone)]
pub struct SimpleMeterRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    timers: RwLock<BTreeMap<MeterId, Arc<Timer>>>,
    window_size: usize,
}

impl SimpleMeterRegistry {
    /// Creates an empty registry with the default window size.
    #[must_use]
    pub fn new() -> Self {
        Self::build(DEFAULT_WINDOW_SIZE)
    }

    /// Creates an empty registry retaining `window_size` durations per timer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `window_size` is 0.
    pub fn with_window_size(window_size: usize) -> Result<Self, ConfigError> {
        if window_size == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "window_size",
                value: window_size.to_string(),
                min: "1".to_owned(),
            });
        }
        Ok(Self::build(window_size))
    }

    fn build(window_size: usize) -> Self {
        let inner = RegistryInner { timers: RwLock::new(BTreeMap::new()), window_size };
        Self { inner: Arc::new(inner) }
    }

    /// Starts a lookup of timers under metric `name`.
    pub fn find(&self, name: impl Into<String>) -> Search<'_> {
        Search { registry: self, name: name.into(), tags: Vec::new() }
    }

    /// Identifiers of every registered timer, in key order.
    pub fn meters(&self) -> Vec<MeterId> {
        self.inner.timers.read().keys().cloned().collect()
    }

    /// Snapshots of every registered timer, in key order.
    pub fn snapshot(&self) -> Vec<TimerSnapshot> {
        self.inner.timers.read().iter().map(|(id, timer)| timer.snapshot(id)).collect()
    }

    /// Removes every timer.
    pub fn clear(&self) {
        self.inner.timers.write().clear();
    }

    /// Logs one `info` line per timer and a `warn` for every
    /// `(class, method)` pair whose failure rate exceeds 5%.
    pub fn log_metrics(&self) {
        let snapshots = self.snapshot();
        if snapshots.is_empty() {
            return;
        }

        // (class, method) -> (failures, total)
        let mut outcomes: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();

        for timer in &snapshots {
            info!(
                meter = %timer.id,
                count = timer.count,
                mean_us = timer.mean().as_micros() as u64,
                max_us = timer.max.as_micros() as u64,
                p50_us = timer.percentile(0.5).map(|d| d.as_micros() as u64),
                p99_us = timer.percentile(0.99).map(|d| d.as_micros() as u64),
                "Repository timer snapshot"
            );

            let key = (
                timer.id.tag("class").unwrap_or_default().to_owned(),
                timer.id.tag("method").unwrap_or_default().to_owned(),
            );
            let entry = outcomes.entry(key).or_default();
            if timer.id.tag("successful") == Some("false") {
                entry.0 += timer.count;
            }
            entry.1 += timer.count;
        }

        for ((class, method), (failures, total)) in outcomes {
            if total == 0 {
                continue;
            }
            let failure_rate = failures as f64 / total as f64;
            if failure_rate > FAILURE_RATE_WARN_THRESHOLD {
                warn!(
                    class = %class,
                    method = %method,
                    failure_rate,
                    failure_count = failures,
                    total_calls = total,
                    "High repository failure rate detected"
                );
            }
        }
    }

    fn timer_for(&self, observation: &Observation) -> Arc<Timer> {
        let id = MeterId::of(observation);
        if let Some(timer) = self.inner.timers.read().get(&id) {
            return Arc::clone(timer);
        }
        let mut timers = self.inner.timers.write();
        Arc::clone(timers.entry(id).or_insert_with(|| {
            Arc::new(Timer::new(self.inner.window_size, Arc::clone(&observation.percentiles)))
        }))
    }
}

impl Default for SimpleMeterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimpleMeterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleMeterRegistry")
            .field("timers", &self.inner.timers.read().len())
            .field("window_size", &self.inner.window_size)
            .finish()
    }
}

impl MeterRegistry for SimpleMeterRegistry {
    fn record(&self, observation: Observation) -> Result<(), RegistryError> {
        if observation.name.trim().is_empty() {
            return Err(RegistryError::rejected(&*observation.name, "metric name is blank"));
        }
        self.timer_for(&observation).record(observation.duration);
        Ok(())
    }
}

// ── Search ──────────────────────────────────────────────────────────────

/// A timer lookup built with [`SimpleMeterRegistry::find`].
#[derive(Debug)]
pub struct Search<'a> {
    registry: &'a SimpleMeterRegistry,
    name: String,
    tags: Vec<(String, String)>,
}

impl Search<'_> {
    /// Requires tag `key` to equal `value`.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Snapshots of every matching timer.
    pub fn timers(&self) -> Vec<TimerSnapshot> {
        self.registry
            .inner
            .timers
            .read()
            .iter()
            .filter(|(id, _)| self.matches(id))
            .map(|(id, timer)| timer.snapshot(id))
            .collect()
    }

    /// The only matching timer.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::NoMatch`] if nothing matches and
    /// [`SearchError::Ambiguous`] if more than one timer matches.
    pub fn single(&self) -> Result<TimerSnapshot, SearchError> {
        let mut timers = self.timers();
        match timers.len() {
            1 => Ok(timers.remove(0)),
            0 => Err(SearchError::NoMatch { metric: self.name.clone(), tags: self.tags.clone() }),
            count => Err(SearchError::Ambiguous {
                metric: self.name.clone(),
                tags: self.tags.clone(),
                count,
            }),
        }
    }

    fn matches(&self, id: &MeterId) -> bool {
        id.name == self.name && self.tags.iter().all(|(k, v)| id.tag(k) == Some(v.as_str()))
    }
}
