// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use canopy_index::{RTree, Rect3, Region, Vec3};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

use rstar::primitives::Rectangle;
use rstar::AABB;

fn gen_lattice_boxes(n: usize, cell: f64) -> Vec<Rect3> {
    let mut out = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let min = Vec3::new(x as f64 * cell, y as f64 * cell, z as f64 * cell);
                out.push(Rect3::new(min, min + Vec3::splat(cell)));
            }
        }
    }
    out
}

fn to_rstar_boxes(v: &[Rect3]) -> Vec<Rectangle<[f64; 3]>> {
    v.iter()
        .map(|r| {
            Rectangle::from_corners([r.min.x, r.min.y, r.min.z], [r.max.x, r.max.y, r.max.z])
        })
        .collect()
}

fn bench_rtree_external_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_external_compare_3d");
    for &n in &[16usize, 24] {
        let boxes = gen_lattice_boxes(n, 10.0);
        let query = Rect3::new(Vec3::splat(30.0), Vec3::splat(90.0));
        group.throughput(Throughput::Elements((n * n * n) as u64));

        group.bench_function(format!("canopy_insert_query_n{n}"), |b| {
            b.iter_batched(
                RTree::<Rect3>::default,
                |mut tree| {
                    for r in &boxes {
                        let _ = tree.insert(*r);
                    }
                    let mut hits = 0_usize;
                    tree.search(&Region::Intersecting(query), |_| {
                        hits += 1;
                        true
                    });
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_insert_query_n{n}"), |b| {
            b.iter_batched(
                || to_rstar_boxes(&boxes),
                |rectangles| {
                    let mut tree = rstar::RTree::new();
                    for r in rectangles {
                        tree.insert(r);
                    }
                    let aabb = AABB::from_corners(
                        [query.min.x, query.min.y, query.min.z],
                        [query.max.x, query.max.y, query.max.z],
                    );
                    let hits: usize = tree.locate_in_envelope_intersecting(&aabb).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_bulk_load_query_n{n}"), |b| {
            b.iter_batched(
                || to_rstar_boxes(&boxes),
                |rectangles| {
                    let tree = rstar::RTree::bulk_load(rectangles);
                    let aabb = AABB::from_corners(
                        [query.min.x, query.min.y, query.min.z],
                        [query.max.x, query.max.y, query.max.z],
                    );
                    let hits: usize = tree.locate_in_envelope_intersecting(&aabb).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rtree_external_compare);
criterion_main!(benches);
