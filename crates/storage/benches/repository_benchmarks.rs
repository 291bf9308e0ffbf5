#![allow(clippy::expect_used)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use repo_timing::{RepositoryTimer, SimpleMeterRegistry};
use repo_timing_storage::{
    Config, ConfigRepository, MemoryBackend, StorageConfigRepository, TimedRepository,
    UserBookmark, UserBookmarkKey, UserBookmarkRepository,
};
use tokio::runtime::Runtime;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rt() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime")
}

fn timed<R: repo_timing_storage::Repository>(repo: R) -> TimedRepository<R> {
    TimedRepository::new(repo, RepositoryTimer::with_defaults(SimpleMeterRegistry::new()))
}

/// Creates a bookmark repository holding `count` bookmarks for `user_id`.
fn populated_bookmarks(user_id: Uuid, count: usize) -> UserBookmarkRepository<MemoryBackend> {
    let repo = UserBookmarkRepository::new(MemoryBackend::new());
    let now = chrono::Utc::now();
    for i in 0..count {
        let key = UserBookmarkKey::new(user_id, now - chrono::Duration::minutes(i as i64));
        repo.save(UserBookmark::new(key, format!("https://example.com/{i}")))
            .expect("populate save failed");
    }
    repo
}

// ---------------------------------------------------------------------------
// 1. config_operations
// ---------------------------------------------------------------------------

fn config_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_operations");

    let direct = StorageConfigRepository::new(MemoryBackend::new());
    direct.save(Config::new("website", "https://example.com")).expect("seed failed");
    let proxied = timed(StorageConfigRepository::new(MemoryBackend::new()));
    proxied.inner().save(Config::new("website", "https://example.com")).expect("seed failed");

    group.bench_function("find_by_id/direct", |b| {
        b.iter(|| black_box(direct.find_by_id("website").expect("find failed")));
    });
    group.bench_function("find_by_id/timed", |b| {
        b.iter(|| black_box(proxied.find_by_id("website").expect("find failed")));
    });
    group.bench_function("save/timed", |b| {
        b.iter(|| {
            proxied.save(Config::new("website", "https://example.com")).expect("save failed")
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. bookmark_lookups
// ---------------------------------------------------------------------------

fn bookmark_lookups(c: &mut Criterion) {
    let mut group = c.benchmark_group("bookmark_lookups");
    let rt = rt();
    let user = Uuid::new_v4();

    for &limit in &[1usize, 10, 100] {
        let repo = timed(populated_bookmarks(user, 100));

        group.bench_with_input(BenchmarkId::new("sync", limit), &limit, |b, &limit| {
            b.iter(|| black_box(repo.find_latest_bookmarks(user, limit).expect("lookup failed")));
        });

        group.bench_with_input(BenchmarkId::new("async", limit), &limit, |b, &limit| {
            b.iter(|| {
                rt.block_on(async {
                    black_box(
                        repo.find_latest_bookmarks_async(user, limit).await.expect("lookup failed"),
                    )
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, config_operations, bookmark_lookups);
criterion_main!(benches);
