//! Resolution benchmarks.
//!
//! Run with: `cargo bench -p penta-router`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use penta_router::RouteTree;

fn build_tree(num_routes: usize) -> RouteTree<usize> {
    let mut tree = RouteTree::new();
    let per_kind = num_routes / 3;

    for i in 0..per_kind {
        tree.insert(&format!("/api/v1/resource{i}"), &[Method::GET], i)
            .expect("static template");
    }
    for i in 0..per_kind {
        tree.insert(
            &format!("/api/v1/resource{i}/{{int:id}}"),
            &[Method::GET, Method::DELETE],
            per_kind + i,
        )
        .expect("param template");
    }
    for i in 0..per_kind {
        tree.insert(
            &format!("/api/v1/org/{{slug:org}}/resource{i}/{{id}}"),
            &[Method::GET],
            2 * per_kind + i,
        )
        .expect("nested template");
    }

    tree
}

fn bench_static_match(c: &mut Criterion) {
    let tree = build_tree(99);
    c.bench_function("static_match", |b| {
        b.iter(|| black_box(tree.resolve(&Method::GET, "/api/v1/resource20")));
    });
}

fn bench_converter_match(c: &mut Criterion) {
    let tree = build_tree(99);
    c.bench_function("converter_match", |b| {
        b.iter(|| black_box(tree.resolve(&Method::DELETE, "/api/v1/resource25/12345")));
    });
}

fn bench_nested_match(c: &mut Criterion) {
    let tree = build_tree(99);
    c.bench_function("nested_match", |b| {
        b.iter(|| {
            black_box(tree.resolve(&Method::GET, "/api/v1/org/acme-corp/resource10/12345"))
        });
    });
}

fn bench_miss(c: &mut Criterion) {
    let tree = build_tree(99);
    c.bench_function("miss", |b| {
        b.iter(|| black_box(tree.resolve(&Method::GET, "/api/v1/nonexistent/path")));
    });
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");

    for num_routes in [12, 48, 96, 480, 960] {
        let tree = build_tree(num_routes);
        group.bench_with_input(
            BenchmarkId::new("last_static", num_routes),
            &num_routes,
            |b, &n| {
                let path = format!("/api/v1/resource{}", n / 3 - 1);
                b.iter(|| black_box(tree.resolve(&Method::GET, &path)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_static_match,
    bench_converter_match,
    bench_nested_match,
    bench_miss,
    bench_scaling
);
criterion_main!(benches);
