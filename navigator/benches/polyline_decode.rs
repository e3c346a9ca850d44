use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use navigator::polyline;
use navigator::routing::{parse_directions, route_from_polyline};

/// A wiggly track heading north-east from Berlin.
fn synthetic_track(points: usize) -> String {
    let track: Vec<(f64, f64)> = (0..points)
        .map(|i| {
            let t = i as f64 * 0.0005;
            (52.52 + t + (t * 40.0).sin() * 0.002, 13.405 + t + (t * 40.0).cos() * 0.002)
        })
        .collect();
    polyline::encode(&track)
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("polyline_decode");

    for points in [10usize, 500, 5_000] {
        let encoded = synthetic_track(points);
        group.bench_with_input(BenchmarkId::from_parameter(points), &encoded, |b, encoded| {
            b.iter(|| polyline::decode(black_box(encoded)));
        });
    }

    group.finish();
}

fn benchmark_route_from_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_from_response");

    let encoded = synthetic_track(2_000);
    let body = serde_json::json!({
        "code": "Ok",
        "routes": [{"geometry": encoded}]
    })
    .to_string();

    group.bench_function("reorder_only", |b| {
        b.iter(|| route_from_polyline(black_box(&encoded)));
    });
    group.bench_function("parse_and_reorder", |b| {
        b.iter(|| parse_directions(black_box(&body)));
    });

    group.finish();
}

criterion_group!(benches, benchmark_decode, benchmark_route_from_response);
criterion_main!(benches);
