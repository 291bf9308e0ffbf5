//! Call-timing interception for data-access components.
//!
//! Every call routed through a [`RepositoryTimer`] produces exactly one
//! [`Observation`] under the metric `repository`, tagged with the logical
//! component name (`class`), the operation name (`method`) and the outcome
//! (`successful`). Synchronous calls are recorded when they return; calls that
//! return a [`ListenableFuture`] are recorded when the handle completes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │              Timed repository proxy (caller side)            │
//! │     builds a MethodInvocation for every repository call      │
//! ├──────────────────────────────────────────────────────────────┤
//! │                      RepositoryTimer                         │
//! │   bypass check → identity::resolve → sync / deferred path    │
//! ├──────────────────────────────────────────────────────────────┤
//! │                       TimingRecorder                         │
//! │          Sample → Observation → MeterRegistry::record        │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │     SimpleMeterRegistry      │   any other MeterRegistry     │
//! └──────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use repo_timing::{
//!     ComponentDescriptor, MethodInvocation, RepositoryTimer, SimpleMeterRegistry,
//! };
//!
//! struct StorageConfigRepository;
//!
//! let registry = SimpleMeterRegistry::new();
//! let timer = RepositoryTimer::with_defaults(registry.clone());
//! let target = ComponentDescriptor::proxy::<StorageConfigRepository>([
//!     "ConfigRepository",
//!     "Repository",
//! ]);
//!
//! let saved: Result<u32, String> =
//!     timer.intercept(MethodInvocation::new(&target, "save", || Ok(1)));
//! assert_eq!(saved, Ok(1));
//!
//! let snapshot = registry.find("repository").tag("class", "ConfigRepository").single()?;
//! assert_eq!(snapshot.count, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Error Handling
//!
//! Errors from the wrapped operation are returned to the caller unchanged.
//! Failures to record are logged with `tracing` and never surface to the
//! caller. [`ConfigError`] covers invalid [`TimerConfig`] values.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with capturing and rejecting registries and a
//!   timer lookup helper. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod config;
pub mod deferred;
pub mod error;
pub mod identity;
pub mod interceptor;
pub mod invocation;
pub mod recorder;
pub mod registry;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

// Re-export primary types at crate root for convenience
pub use config::{DEFAULT_METRIC_NAME, DEFAULT_PERCENTILES, TimerConfig, TimerConfigBuilder};
pub use deferred::{Cancelled, Completer, Deferred, ListenableFuture, NoRuntime};
pub use error::{ConfigError, RegistryError, SearchError};
pub use identity::{ComponentDescriptor, ComponentIdentity, FALLBACK_IDENTITY};
pub use interceptor::RepositoryTimer;
pub use invocation::{Invocation, MethodInvocation, Outcome, ResultContract};
pub use recorder::{MeterRegistry, Observation, Sample, TimingRecorder};
pub use registry::{MeterId, Search, SimpleMeterRegistry, TimerSnapshot};
