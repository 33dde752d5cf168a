use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::prelude::*;

use common::shapes::{Aabb, Circle, Vec2};
use quadtree::{BoxTree, PointTree};

fn world() -> Aabb<f32> {
    Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0))
}

fn filled_point_tree(rng: &mut StdRng, n: usize) -> PointTree<Vec2<f32>, f32> {
    let mut tree = PointTree::new(world()).unwrap();
    for _ in 0..n {
        tree.insert(world().random_point_inside(rng)).unwrap();
    }
    tree
}

fn filled_box_tree(rng: &mut StdRng, n: usize) -> BoxTree<Aabb<f32>, f32> {
    let mut tree = BoxTree::new(world()).unwrap();
    for _ in 0..n {
        tree.insert(Aabb::new(
            Vec2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)),
            Vec2::new(rng.gen_range(0.0..5.0), rng.gen_range(0.0..5.0)),
        ))
        .unwrap();
    }
    tree
}

fn point_insert_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    c.bench_function("point_tree_insert_10k", |b| {
        b.iter(|| black_box(filled_point_tree(&mut rng, 10_000)))
    });
}

fn point_query_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let tree = filled_point_tree(&mut rng, 10_000);
    c.bench_function("point_tree_query_circle", |b| {
        b.iter(|| {
            let query = Circle::new(world().random_point_inside(&mut rng), 20.0);
            let mut handles = Vec::new();
            tree.query(black_box(&query), &mut handles);
            black_box(handles.len())
        })
    });
}

fn box_insert_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    c.bench_function("box_tree_insert_10k", |b| {
        b.iter(|| black_box(filled_box_tree(&mut rng, 10_000).len()))
    });
}

fn box_query_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(4);
    let tree = filled_box_tree(&mut rng, 10_000);
    c.bench_function("box_tree_query_circle", |b| {
        b.iter(|| {
            let query = Circle::new(world().random_point_inside(&mut rng), 20.0);
            let mut handles = Vec::new();
            tree.query(black_box(&query), &mut handles);
            black_box(handles.len())
        })
    });
}

fn box_apply_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(5);
    let mut tree = filled_box_tree(&mut rng, 10_000);
    c.bench_function("box_tree_apply_translate", |b| {
        let mut flip = 1.0f32;
        b.iter(|| {
            tree.apply(|aabb| aabb.center.x += 0.25 * flip);
            flip = -flip;
        })
    });
}

criterion_group!(
    benches,
    point_insert_benchmark,
    point_query_benchmark,
    box_insert_benchmark,
    box_query_benchmark,
    box_apply_benchmark
);
criterion_main!(benches);
