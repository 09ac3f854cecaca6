use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use tokio::runtime::Runtime;
use turnstile::{InMemoryCounterStore, Policy, RequestLimiter};

// Budgets large enough that the hot path never hits the denial branch.
fn engine() -> RequestLimiter<InMemoryCounterStore> {
    RequestLimiter::new(
        InMemoryCounterStore::new(),
        Policy::new(u64::MAX, Duration::from_secs(60)).expect("valid policy"),
        InMemoryCounterStore::new(),
        Policy::new(u64::MAX, Duration::from_secs(60)).expect("valid policy"),
    )
}

fn bench_admission(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");

    let limiter = engine();
    c.bench_function("allow_request_ip", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(limiter.allow_request("203.0.113.5", "").await) })
    });

    let limiter = engine();
    c.bench_function("allow_request_token", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(limiter.allow_request("", "bench-token").await) })
    });
}

criterion_group!(benches, bench_admission);
criterion_main!(benches);
