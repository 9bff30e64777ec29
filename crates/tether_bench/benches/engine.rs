//! Sync engine round benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use tether_engine::{EngineConfig, MockTransport, SyncEngine};
use tether_testkit::todo_list;

fn ready_engine(len: usize) -> SyncEngine<MockTransport> {
    let mut engine = SyncEngine::new(
        EngineConfig::new("https://bench.example.com/model"),
        MockTransport::new(),
    );
    engine.initialize(|_| {}).unwrap();
    engine.transport().respond(todo_list(len).to_string());
    engine.pump().unwrap();
    engine
}

/// Benchmark a commit signal with nothing changed.
fn bench_idle_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("idle_commit");

    for len in [10, 100, 1000] {
        let mut engine = ready_engine(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| black_box(engine.commit().unwrap()));
        });
    }

    group.finish();
}

/// Benchmark a full round: edit, commit, answer, re-baseline.
fn bench_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("round");

    for len in [10, 100, 1000] {
        let mut engine = ready_engine(len);
        let mut counter = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                counter += 1;
                engine.model_mut().unwrap()["items"][0]["title$"] = json!(counter);
                engine.commit().unwrap();
                engine.transport().respond("[]");
                black_box(engine.pump().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_idle_commit, bench_round);
criterion_main!(benches);
