use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use repo_timing::{
    ComponentDescriptor, ListenableFuture, MethodInvocation, RepositoryTimer, SimpleMeterRegistry,
    identity,
};

struct StorageConfigRepository;

fn target() -> ComponentDescriptor {
    ComponentDescriptor::proxy::<StorageConfigRepository>(["ConfigRepository", "Repository"])
}

// ---------------------------------------------------------------------------
// 1. identity resolution
// ---------------------------------------------------------------------------

fn resolve_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_identity");

    let proxy = target();
    group.bench_function("proxy_with_capability", |b| {
        b.iter(|| identity::resolve(black_box(&proxy)));
    });

    let marker_only = ComponentDescriptor::proxy::<StorageConfigRepository>(["Repository"]);
    group.bench_function("proxy_marker_only", |b| {
        b.iter(|| identity::resolve(black_box(&marker_only)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. interception overhead
// ---------------------------------------------------------------------------

fn intercept_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("intercept_sync");
    let target = target();

    group.bench_function("direct_call", |b| {
        b.iter(|| black_box(Ok::<u64, String>(black_box(1))));
    });

    for &distinct_methods in &[1usize, 16] {
        let registry = SimpleMeterRegistry::new();
        let timer = RepositoryTimer::with_defaults(registry);
        let methods: Vec<String> = (0..distinct_methods).map(|i| format!("method_{i}")).collect();
        let mut next = 0usize;
        group.bench_with_input(
            BenchmarkId::new("timed_call", distinct_methods),
            &distinct_methods,
            |b, _| {
                b.iter(|| {
                    next = (next + 1) % methods.len();
                    timer.intercept(MethodInvocation::new(&target, &methods[next], || {
                        Ok::<u64, String>(black_box(1))
                    }))
                });
            },
        );
    }

    let timer = RepositoryTimer::with_defaults(SimpleMeterRegistry::new());
    group.bench_function("bypassed_call", |b| {
        b.iter(|| {
            timer.intercept(MethodInvocation::new(&target, "to_string", || {
                String::from("StorageConfigRepository")
            }))
        });
    });

    group.finish();
}

fn intercept_deferred(c: &mut Criterion) {
    let mut group = c.benchmark_group("intercept_deferred");
    let target = target();
    let timer = RepositoryTimer::with_defaults(SimpleMeterRegistry::new());

    group.bench_function("complete_after_return", |b| {
        b.iter(|| {
            let (completer, handle) = ListenableFuture::<u64, String>::channel();
            let handle = timer.intercept(MethodInvocation::new(&target, "save_async", || handle));
            completer.complete(Ok(black_box(1)));
            handle
        });
    });

    group.bench_function("already_completed", |b| {
        b.iter(|| {
            timer.intercept(MethodInvocation::new(&target, "save_async", || {
                ListenableFuture::<u64, String>::completed(Ok(black_box(1)))
            }))
        });
    });

    group.finish();
}

criterion_group!(benches, resolve_identity, intercept_sync, intercept_deferred);
criterion_main!(benches);
