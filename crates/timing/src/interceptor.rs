//! The interception entry point.
//!
//! [`RepositoryTimer::intercept`] wraps one [`Invocation`]: it resolves the
//! component identity, opens a sample, proceeds with the real call and makes
//! sure exactly one observation is recorded for it.
//!
//! - Operations in the bypass set are proceeded without any timing.
//! - Immediate outcomes are recorded as soon as `proceed` returns. A drop guard also records the
//!   call if `proceed` unwinds, tagged unsuccessful.
//! - Deferred outcomes are recorded from a completion listener. The handle is returned to the
//!   caller before it completes. If the handle is cancelled no observation is recorded.
//!
//! The wrapped call's result, error or panic always reaches the caller unchanged.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    config::TimerConfig,
    deferred::Deferred,
    identity,
    invocation::{Invocation, Outcome, ResultContract},
    recorder::{MeterRegistry, Sample, TimingRecorder},
};

/// Failure text recorded for an operation that unwound.
const PANICKED: &str = "operation panicked";

/// Times every intercepted call on a data-access component.
///
/// Cheap to clone; clones share the recorder and configuration.
#[derive(Clone)]
pub struct RepositoryTimer {
    recorder: TimingRecorder,
    config: Arc<TimerConfig>,
}

impl RepositoryTimer {
    /// Creates a timer publishing to `registry`.
    pub fn new(registry: impl MeterRegistry + 'static, config: TimerConfig) -> Self {
        Self { recorder: TimingRecorder::new(registry, &config), config: Arc::new(config) }
    }

    /// Creates a timer publishing to `registry` with [`TimerConfig::default`].
    pub fn with_defaults(registry: impl MeterRegistry + 'static) -> Self {
        Self::new(registry, TimerConfig::default())
    }

    /// The recorder observations go through.
    pub fn recorder(&self) -> &TimingRecorder {
        &self.recorder
    }

    /// The active configuration.
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Runs `invocation`, recording one observation unless its operation is bypassed.
    pub fn intercept<I: Invocation>(&self, invocation: I) -> I::Output {
        if self.config.is_bypassed(invocation.operation()) {
            return invocation.proceed();
        }

        let identity = identity::resolve(invocation.target());
        let sample = self.recorder.start(identity, invocation.operation());
        let contract = invocation.result_contract();
        let pending = PendingObservation { recorder: &self.recorder, sample: Some(sample) };

        let output = invocation.proceed();

        match contract {
            ResultContract::Immediate => pending.finish(output.failure()),
            ResultContract::Deferred => match output.as_deferred() {
                Some(deferred) => {
                    if let Some(sample) = pending.disarm() {
                        self.listen(deferred, sample);
                    }
                },
                None => {
                    debug!("deferred outcome exposes no completion listener; recording now");
                    pending.finish(output.failure());
                },
            },
        }

        output
    }

    /// Records `sample` from whichever completion listener fires first.
    fn listen(&self, deferred: &dyn Deferred, sample: Sample) {
        let slot = Arc::new(Mutex::new(Some(sample)));

        let on_success = {
            let slot = Arc::clone(&slot);
            let recorder = self.recorder.clone();
            Box::new(move || {
                let sample = slot.lock().take();
                if let Some(sample) = sample {
                    recorder.record(sample, None);
                }
            })
        };

        let on_failure = {
            let recorder = self.recorder.clone();
            Box::new(move |failure: &dyn fmt::Display| {
                let sample = slot.lock().take();
                if let Some(sample) = sample {
                    recorder.record(sample, Some(failure));
                }
            })
        };

        deferred.add_listener(on_success, on_failure);
    }
}

impl fmt::Debug for RepositoryTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryTimer")
            .field("recorder", &self.recorder)
            .field("bypass_operations", &self.config.bypass_operations())
            .finish()
    }
}

/// Records its sample exactly once: explicitly through `finish`, or on drop
/// if the wrapped call unwound.
struct PendingObservation<'a> {
    recorder: &'a TimingRecorder,
    sample: Option<Sample>,
}

impl PendingObservation<'_> {
    fn finish(mut self, failure: Option<&dyn fmt::Display>) {
        if let Some(sample) = self.sample.take() {
            self.recorder.record(sample, failure);
        }
    }

    /// Hands the sample to a deferred listener instead.
    fn disarm(mut self) -> Option<Sample> {
        self.sample.take()
    }
}

impl Drop for PendingObservation<'_> {
    fn drop(&mut self) {
        if let Some(sample) = self.sample.take() {
            self.recorder.record(sample, Some(&PANICKED));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;
    use crate::{
        ListenableFuture,
        deferred::Cancelled,
        identity::ComponentDescriptor,
        invocation::MethodInvocation,
        testutil::{CapturingRegistry, RejectingRegistry},
    };

    struct StorageConfigRepository;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum RepoError {
        Unavailable,
        Cancelled,
    }

    impl fmt::Display for RepoError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Unavailable => f.write_str("backend unavailable"),
                Self::Cancelled => f.write_str("cancelled"),
            }
        }
    }

    impl From<Cancelled> for RepoError {
        fn from(_: Cancelled) -> Self {
            Self::Cancelled
        }
    }

    fn setup() -> (Arc<CapturingRegistry>, RepositoryTimer, ComponentDescriptor) {
        let registry = Arc::new(CapturingRegistry::new());
        let timer = RepositoryTimer::with_defaults(Arc::clone(&registry));
        let target = ComponentDescriptor::proxy::<StorageConfigRepository>([
            "ConfigRepository",
            "Repository",
        ]);
        (registry, timer, target)
    }

    #[test]
    fn test_sync_success_records_once() {
        let (registry, timer, target) = setup();

        let result = timer.intercept(MethodInvocation::new(&target, "save", || {
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok::<_, RepoError>(5)
        }));

        assert_eq!(result, Ok(5));
        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert_eq!(
            observations[0].tags(),
            [("class", "ConfigRepository"), ("method", "save"), ("successful", "true")]
        );
        assert!(!observations[0].duration.is_zero());
    }

    #[test]
    fn test_sync_failure_records_and_passes_error_through() {
        let (registry, timer, target) = setup();

        let result = timer.intercept(MethodInvocation::new(&target, "find_by_id", || {
            Err::<u32, _>(RepoError::Unavailable)
        }));

        assert_eq!(result, Err(RepoError::Unavailable));
        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert!(!observations[0].successful);
    }

    #[test]
    fn test_sync_panic_records_failure_and_resumes() {
        let (registry, timer, target) = setup();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            timer.intercept(MethodInvocation::new(&target, "count", || -> Result<u32, RepoError> {
                panic!("driver bug")
            }))
        }));

        assert!(outcome.is_err());
        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert!(!observations[0].successful);
        assert_eq!(&*observations[0].method, "count");
    }

    #[test]
    fn test_bypassed_operation_is_not_timed() {
        let (registry, timer, target) = setup();

        let text = timer.intercept(MethodInvocation::new(&target, "to_string", || {
            String::from("StorageConfigRepository")
        }));

        assert_eq!(text, "StorageConfigRepository");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_bypass_set_comes_from_config() {
        let registry = Arc::new(CapturingRegistry::new());
        let config = TimerConfig::builder().bypass_operations(["count"]).build().unwrap();
        let timer = RepositoryTimer::new(Arc::clone(&registry), config);
        let target = ComponentDescriptor::unknown();

        let _ = timer.intercept(MethodInvocation::new(&target, "count", || Ok::<_, RepoError>(1)));
        let _ = timer.intercept(MethodInvocation::new(&target, "to_string", String::new));

        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].tags()[0], ("class", "Repository"));
        assert_eq!(&*observations[0].method, "to_string");
    }

    #[test]
    fn test_loaded_config_names_every_observation() {
        assert!(serde_json::from_str::<TimerConfig>(r#"{ "metric_name": "" }"#).is_err());

        let registry = Arc::new(CapturingRegistry::new());
        let config: TimerConfig = serde_json::from_str(r#"{ "metric_name": "dao" }"#).unwrap();
        let timer = RepositoryTimer::new(Arc::clone(&registry), config);
        let target = ComponentDescriptor::unknown();

        for _ in 0..3 {
            let invocation = MethodInvocation::new(&target, "save", || Ok::<_, RepoError>(1));
            let _ = timer.intercept(invocation);
        }

        let observations = registry.observations();
        assert_eq!(observations.len(), 3);
        assert!(observations.iter().all(|o| &*o.name == "dao"));
    }

    #[test]
    fn test_async_success_records_on_completion() {
        let (registry, timer, target) = setup();
        let (completer, handle) = ListenableFuture::<u32, RepoError>::channel();

        let returned = timer.intercept(MethodInvocation::new(&target, "save_async", || handle));

        assert!(!returned.is_done());
        assert!(registry.is_empty());

        completer.complete(Ok(1));

        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert!(observations[0].successful);
        assert_eq!(&*observations[0].method, "save_async");
    }

    #[test]
    fn test_async_failure_records_unsuccessful() {
        let (registry, timer, target) = setup();
        let (completer, handle) = ListenableFuture::<u32, RepoError>::channel();

        let _returned = timer.intercept(MethodInvocation::new(&target, "save_async", || handle));
        completer.complete(Err(RepoError::Unavailable));

        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert!(!observations[0].successful);
    }

    #[test]
    fn test_async_already_completed_records_immediately() {
        let (registry, timer, target) = setup();

        let returned = timer.intercept(MethodInvocation::new(&target, "find_latest", || {
            ListenableFuture::<u32, RepoError>::completed(Ok(3))
        }));

        assert!(returned.is_done());
        crate::assert_observation_count!(registry, 1);
    }

    #[test]
    fn test_async_cancelled_records_nothing() {
        let (registry, timer, target) = setup();
        let (completer, handle) = ListenableFuture::<u32, RepoError>::channel();

        let returned = timer.intercept(MethodInvocation::new(&target, "save_async", || handle));
        drop(completer);

        assert!(returned.is_cancelled());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_async_observation_precedes_await() {
        let (registry, timer, target) = setup();

        let handle = timer.intercept(MethodInvocation::new(&target, "save_async", || {
            ListenableFuture::<u32, RepoError>::spawn_blocking(|| {
                std::thread::sleep(std::time::Duration::from_millis(2));
                Ok(8)
            })
            .unwrap()
        }));

        assert_eq!(handle.await, Ok(8));
        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert!(observations[0].duration >= std::time::Duration::from_millis(2));
    }

    /// Declares a deferred contract but cannot register listeners.
    struct OpaqueHandle;

    impl Outcome for OpaqueHandle {
        const CONTRACT: ResultContract = ResultContract::Deferred;
    }

    #[test]
    fn test_deferred_without_listener_records_immediately() {
        let (registry, timer, target) = setup();

        let _ = timer.intercept(MethodInvocation::new(&target, "save_async", || OpaqueHandle));

        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert!(observations[0].successful);
    }

    #[test]
    fn test_registry_failure_does_not_reach_caller() {
        let timer = RepositoryTimer::with_defaults(RejectingRegistry);
        let target = ComponentDescriptor::unknown();

        let ok = timer.intercept(MethodInvocation::new(&target, "save", || Ok::<_, RepoError>(1)));
        let err = timer.intercept(MethodInvocation::new(&target, "save", || {
            Err::<u32, _>(RepoError::Unavailable)
        }));

        assert_eq!(ok, Ok(1));
        assert_eq!(err, Err(RepoError::Unavailable));
    }

    #[test]
    fn test_identity_resolved_per_target() {
        let (registry, timer, _) = setup();
        let marker_only = ComponentDescriptor::proxy::<StorageConfigRepository>(["Repository"]);
        let direct = ComponentDescriptor::direct::<StorageConfigRepository>();

        for target in [&marker_only, &direct] {
            let invocation = MethodInvocation::new(target, "save", || Ok::<_, RepoError>(()));
            let _ = timer.intercept(invocation);
        }

        let classes: Vec<_> =
            registry.observations().iter().map(|o| o.class.as_str().to_owned()).collect();
        assert_eq!(classes, ["StorageConfigRepository", "StorageConfigRepository"]);
    }

    #[test]
    fn test_concurrent_invocations_each_record_once() {
        let (registry, timer, target) = setup();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let (timer, target) = (&timer, &target);
                scope.spawn(move || {
                    for _ in 0..100 {
                        let call = || Ok::<_, RepoError>(());
                        let _ = timer.intercept(MethodInvocation::new(target, "save", call));
                    }
                });
            }
        });

        assert_eq!(registry.len(), 800);
    }
}
