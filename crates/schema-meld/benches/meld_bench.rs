//! Benchmarks for steady-state witness melding.
//!
//! Run with: cargo bench -p schema-meld
//!
//! Key metrics:
//! - homogeneous: every witness has the same shape (pure overhead of melding)
//! - conflicting: alternating field types keep unions busy
//! - dynamic_keys: per-witness object keys, promoted to a map early on

use criterion::{
    BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use schema_meld::{EndpointSensor, Location, Meta, Witness};
use serde_json::json;

fn body_witness(status: u16, body: serde_json::Value) -> Witness {
    Witness::default()
        .arg(Meta::arg(Location::Query, "limit"), json!(50))
        .response(Meta::response(status, Location::Body, "application/json"), body)
}

/// Same shape every time
fn make_homogeneous(i: u64) -> Witness {
    body_witness(
        200,
        json!({
            "id": format!("u{i}"),
            "age": i % 90,
            "tags": ["a", "b"],
            "profile": {"bio": "hello", "verified": i % 2 == 0}
        }),
    )
}

/// Field types alternate between witnesses
fn make_conflicting(i: u64) -> Witness {
    let id = if i % 2 == 0 { json!(i) } else { json!(format!("u{i}")) };
    let status = if i % 5 == 0 { 404 } else { 200 };
    body_witness(status, json!({"id": id, "items": [i, "x", {"n": i}]}))
}

/// Object keys change with every witness
fn make_dynamic_keys(i: u64) -> Witness {
    let mut sessions = serde_json::Map::new();
    for j in 0..20 {
        sessions.insert(
            format!("sess_{:08x}", i * 100 + j),
            json!({"started_at": 1700000000 + i, "user_id": j}),
        );
    }
    body_witness(200, json!({"id": i, "sessions": sessions}))
}

fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("meld");
    group.throughput(Throughput::Elements(1000));

    for (name, make_witness) in [
        ("homogeneous", make_homogeneous as fn(u64) -> Witness),
        ("conflicting", make_conflicting),
        ("dynamic_keys", make_dynamic_keys),
    ] {
        group.bench_with_input(BenchmarkId::new("warm", name), &make_witness, |b, make| {
            b.iter_batched(
                || {
                    let mut sensor = EndpointSensor::enabled();
                    for i in 0..100 {
                        sensor.observe("GET /bench", &make(i)).unwrap();
                    }
                    let witnesses: Vec<_> = (1000..2000).map(make).collect();
                    (sensor, witnesses)
                },
                |(mut sensor, witnesses)| {
                    for witness in &witnesses {
                        black_box(sensor.observe("GET /bench", witness).unwrap());
                    }
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_steady_state);
criterion_main!(benches);
