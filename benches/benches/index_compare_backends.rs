// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_index::{
    CancelSignal, GridHash, Octree, RTree, Rect3, Region, SharedIndex, Vec3, cancel_pair,
};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use crossbeam::channel::bounded;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WORLD: f64 = 2_000.0;

fn world() -> Rect3 {
    Rect3::new(Vec3::ZERO, Vec3::splat(WORLD))
}

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

fn gen_random_boxes(count: usize, side: f64, seed: u64) -> Vec<Rect3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let min = Vec3::new(
                rng.random_range(0.0..WORLD - side),
                rng.random_range(0.0..WORLD - side),
                rng.random_range(0.0..WORLD - side),
            );
            Rect3::new(min, min + Vec3::splat(side))
        })
        .collect()
}

fn gen_clustered_boxes(n_clusters: usize, per_cluster: usize, spread: f64) -> Vec<Rect3> {
    let mut rng = StdRng::seed_from_u64(0xC1A5_7E55_9999_ABCD);
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    for _ in 0..n_clusters {
        let center = Vec3::splat(spread) + Vec3::new(
            rng.random_range(0.0..WORLD - 2.0 * spread),
            rng.random_range(0.0..WORLD - 2.0 * spread),
            rng.random_range(0.0..WORLD - 2.0 * spread),
        );
        for _ in 0..per_cluster {
            let offset = Vec3::new(
                rng.random_range(-0.5..0.5),
                rng.random_range(-0.5..0.5),
                rng.random_range(-0.5..0.5),
            ) * spread;
            out.push(Rect3::from_center_half_extents(center + offset, Vec3::splat(6.0)));
        }
    }
    out
}

fn query_box() -> Rect3 {
    Rect3::new(Vec3::splat(800.0), Vec3::splat(1_200.0))
}

fn count_hits<F: FnOnce(&mut dyn FnMut(&Rect3) -> bool)>(walk: F) -> usize {
    let mut hits = 0;
    walk(&mut |_| {
        hits += 1;
        true
    });
    hits
}

fn bench_insert_query(c: &mut Criterion) {
    for &n in &[16usize, 32] {
        let boxes = gen_lattice_boxes(n, WORLD / n as f64);
        let region = Region::Intersecting(query_box());
        let mut group = c.benchmark_group(format!("insert_query_lattice_n{n}"));
        group.throughput(Throughput::Elements((n * n * n) as u64));

        group.bench_function("octree", |b| {
            b.iter_batched(
                || Octree::new(world()).expect("valid root"),
                |mut tree| {
                    for r in &boxes {
                        let _ = tree.add(*r);
                    }
                    black_box(count_hits(|f| {
                        tree.query(&region, f);
                    }));
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function("rtree", |b| {
            b.iter_batched(
                RTree::<Rect3>::default,
                |mut tree| {
                    for r in &boxes {
                        let _ = tree.insert(*r);
                    }
                    black_box(count_hits(|f| {
                        tree.search(&region, f);
                    }));
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function("grid_hash", |b| {
            b.iter_batched(
                || GridHash::<Rect3>::new(16).expect("valid size"),
                |mut grid| {
                    for r in &boxes {
                        let _ = grid.add(*r);
                    }
                    black_box(grid.len());
                },
                BatchSize::SmallInput,
            )
        });
        group.finish();
    }
}

fn bench_query_heavy(c: &mut Criterion) {
    let boxes = gen_random_boxes(20_000, 12.0, 0xCAFE_F00D_DEAD_BEEF);
    let mut octree = Octree::new(world()).expect("valid root");
    let mut rtree = RTree::default();
    for r in &boxes {
        let _ = octree.add(*r);
        let _ = rtree.insert(*r);
    }
    let probes: Vec<Region> = (0..256)
        .map(|q| {
            let min = Vec3::new(
                f64::from(q % 16) * 120.0,
                f64::from(q / 16) * 120.0,
                900.0,
            );
            Region::Intersecting(Rect3::new(min, min + Vec3::splat(150.0)))
        })
        .collect();

    let mut group = c.benchmark_group("query_heavy_random");
    group.throughput(Throughput::Elements(probes.len() as u64));
    group.bench_function("octree", |b| {
        b.iter(|| {
            let total: usize = probes
                .iter()
                .map(|p| count_hits(|f| {
                    octree.query(p, f);
                }))
                .sum();
            black_box(total)
        })
    });
    group.bench_function("rtree", |b| {
        b.iter(|| {
            let total: usize = probes
                .iter()
                .map(|p| count_hits(|f| {
                    rtree.search(p, f);
                }))
                .sum();
            black_box(total)
        })
    });
    group.finish();
}

fn bench_nearest(c: &mut Criterion) {
    let boxes = gen_clustered_boxes(16, 512, 160.0);
    let mut octree = Octree::new(world()).expect("valid root");
    let mut rtree = RTree::default();
    let mut grid = GridHash::new(16).expect("valid size");
    for r in &boxes {
        let _ = octree.add(*r);
        let _ = rtree.insert(*r);
        let _ = grid.add(*r);
    }
    let p = Vec3::splat(WORLD / 2.0);

    let mut group = c.benchmark_group("nearest_first_32_clustered");
    group.bench_function("octree", |b| {
        b.iter(|| {
            let mut left = 32;
            octree.nearest(p, |r| {
                black_box(r);
                left -= 1;
                left > 0
            })
        })
    });
    group.bench_function("rtree", |b| {
        b.iter(|| {
            let mut left = 32;
            rtree.nearest(p, |r| {
                black_box(r);
                left -= 1;
                left > 0
            })
        })
    });
    group.bench_function("grid_hash", |b| {
        b.iter(|| {
            let mut left = 32;
            grid.nearest(p, |r| {
                black_box(r);
                left -= 1;
                left > 0
            })
        })
    });
    group.bench_function("grid_hash_cell_sweep", |b| {
        b.iter(|| grid.nearest_cells(p, |cell| black_box(cell) < usize::MAX))
    });
    group.finish();
}

fn bench_streaming(c: &mut Criterion) {
    let boxes = gen_random_boxes(20_000, 12.0, 0xFACE_FEED_CAFE_BABE);
    let index = SharedIndex::new(RTree::default());
    for r in &boxes {
        let _ = index.add(*r);
    }
    let everything = Region::Intersecting(world());

    let mut group = c.benchmark_group("streaming_rtree_20k");
    group.bench_function("drain_channel", |b| {
        b.iter(|| {
            let (rx, _canceller, handle) = index.query_channel(everything.clone());
            let n = rx.iter().count();
            black_box(handle.join());
            n
        })
    });
    group.bench_function("synchronous_visit", |b| {
        b.iter(|| count_hits(|f| {
            index.visit(&everything, f);
        }))
    });
    group.bench_function("cancel_after_100", |b| {
        b.iter(|| {
            let (tx, rx) = bounded(32);
            let (canceller, signal) = cancel_pair();
            let handle = index.query(everything.clone(), tx, signal);
            let n = rx.iter().take(100).count();
            canceller.cancel();
            black_box(handle.join());
            n
        })
    });
    group.bench_function("never_cancelled_unbuffered", |b| {
        b.iter(|| {
            let (tx, rx) = bounded(0);
            let handle = index.query(everything.clone(), tx, CancelSignal::never());
            let n = rx.iter().count();
            black_box(handle.join());
            n
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_insert_query,
    bench_query_heavy,
    bench_nearest,
    bench_streaming,
);
criterion_main!(benches);
