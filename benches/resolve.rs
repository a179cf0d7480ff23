use criterion::{criterion_group, criterion_main, Criterion};
use routeloop::router::RouteIndex;
use routeloop::table::{HandlerRef, RouteDeclaration, RouteMethod};
use std::hint::black_box;

fn route(id: String, method: RouteMethod, path: String) -> RouteDeclaration {
    RouteDeclaration {
        handler: HandlerRef::new(format!("bench::{id}")),
        id,
        method,
        path,
        auth: None,
        tags: Vec::new(),
        summary: None,
        sourcemap: false,
    }
}

/// 50 resources, each with a literal list route and two templated routes.
fn build_index() -> RouteIndex {
    let mut routes = Vec::new();
    for i in 0..50 {
        routes.push(route(
            format!("list_{i}"),
            RouteMethod::Get,
            format!("/api/v1/resource{i}"),
        ));
        routes.push(route(
            format!("get_{i}"),
            RouteMethod::Get,
            format!("/api/v1/resource{i}/{{id}}"),
        ));
        routes.push(route(
            format!("child_{i}"),
            RouteMethod::Get,
            format!("/api/v1/resource{i}/{{id}}/children/{{child_id}}"),
        ));
    }
    RouteIndex::new(routes).unwrap_or_default()
}

fn bench_resolve(c: &mut Criterion) {
    let index = build_index();

    c.bench_function("resolve_exact", |b| {
        b.iter(|| index.resolve(RouteMethod::Get, black_box("/api/v1/resource25")))
    });
    c.bench_function("resolve_pattern_first", |b| {
        b.iter(|| index.resolve(RouteMethod::Get, black_box("/api/v1/resource0/42")))
    });
    c.bench_function("resolve_pattern_last", |b| {
        b.iter(|| {
            index.resolve(
                RouteMethod::Get,
                black_box("/api/v1/resource49/42/children/7"),
            )
        })
    });
    c.bench_function("resolve_miss", |b| {
        b.iter(|| index.resolve(RouteMethod::Get, black_box("/api/v2/unknown/path")))
    });
    c.bench_function("covers_path", |b| {
        b.iter(|| index.covers_path(black_box("/api/v1/resource30/9")))
    });
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
