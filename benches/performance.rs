//! Performance benchmarks for live collections.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use live_collection::{
    fields_from, project, Document, Filter, LiveCollection, MemoryStore, ProjectorConfig, Query,
    Snapshot,
};
use serde_json::json;
use std::sync::Arc;

fn make_snapshot(size: usize) -> Snapshot {
    let documents = (0..size)
        .map(|i| {
            let mut fields = fields_from(json!({
                "title": format!("project {}", i),
                "userId": format!("u{}", i % 7),
                "tasks": [],
            }));
            // Every tenth entry is still pending.
            if i % 10 != 0 {
                fields.insert("createdAt".to_string(), json!(i as i64));
            }
            Document::new(format!("doc{}", i), fields)
        })
        .collect();

    Snapshot {
        collection: "projects".to_string(),
        documents,
        version: 1,
    }
}

/// Benchmark snapshot projection with varying result sizes
fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");
    let config = ProjectorConfig::default();

    for size in [10, 100, 1000, 10000] {
        let snapshot = make_snapshot(size);
        group.bench_with_input(BenchmarkId::new("documents", size), &snapshot, |b, snap| {
            b.iter(|| black_box(project(snap, &config)));
        });
    }

    group.finish();
}

/// Benchmark query evaluation (filter + order) over a collection
fn bench_query_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_evaluation");
    let query = Query::collection("projects")
        .where_(Filter::eq("userId", "u3"))
        .build()
        .unwrap();

    for size in [100, 1000, 10000] {
        let snapshot = make_snapshot(size);
        group.bench_with_input(BenchmarkId::new("documents", size), &snapshot, |b, snap| {
            b.iter(|| black_box(query.evaluate(&snap.documents)));
        });
    }

    group.finish();
}

/// Benchmark write + broadcast with varying listener counts
fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");

    for listeners in [1, 10, 50] {
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &listeners,
            |b, &count| {
                let store = Arc::new(MemoryStore::new());
                for i in 0..200 {
                    store.add("projects", &json!({"n": i})).unwrap();
                }
                let mut subscribers: Vec<LiveCollection> = (0..count)
                    .map(|_| {
                        let mut live = LiveCollection::new(store.clone());
                        live.subscribe_to("projects", None).unwrap();
                        live
                    })
                    .collect();

                b.iter(|| {
                    store.add("projects", &json!({"n": 0})).unwrap();
                    for live in subscribers.iter_mut() {
                        black_box(live.poll());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_projection, bench_query_evaluation, bench_broadcast);
criterion_main!(benches);
