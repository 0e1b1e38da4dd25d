// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Octree streaming query.
//!
//! Fill an octree from several writer threads, then stream a region query
//! through a bounded channel while another writer is waiting.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p canopy_demos --example octree_stream`

use std::thread;

use canopy_index::{Octree, Rect3, Region, SharedIndex, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let world = Rect3::new(Vec3::splat(-1_000.0), Vec3::splat(1_000.0));
    let index = SharedIndex::new(Octree::new(world)?);

    let writers: Vec<_> = (0..4_u64)
        .map(|seed| {
            let index = index.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..2_500 {
                    let c = Vec3::new(
                        rng.random_range(-990.0..990.0),
                        rng.random_range(-990.0..990.0),
                        rng.random_range(-990.0..990.0),
                    );
                    let half = Vec3::splat(rng.random_range(0.5..8.0));
                    if let Err(e) = index.add(Rect3::from_center_half_extents(c, half)) {
                        log::warn!("rejected: {e}");
                    }
                }
            })
        })
        .collect();
    for w in writers {
        w.join().map_err(|_| "writer thread panicked")?;
    }
    {
        let tree = index.read();
        log::info!(
            "{} objects in {} nodes, depth {}",
            tree.len(),
            tree.node_count(),
            tree.depth()
        );
    }

    let region = Region::Intersecting(Rect3::new(Vec3::splat(-200.0), Vec3::splat(200.0)));
    let (rx, _canceller, handle) = index.query_channel(region);

    // This add blocks until the producer releases its read lock.
    let late = {
        let index = index.clone();
        thread::spawn(move || index.add(Rect3::new(Vec3::ZERO, Vec3::splat(1.0))))
    };

    let mut volume = 0.0;
    for b in rx {
        volume += b.area();
    }
    let outcome = handle.join();
    late.join().map_err(|_| "writer thread panicked")??;
    println!(
        "streamed {} boxes (total volume {volume:.1}), cancelled: {}",
        outcome.emitted, outcome.cancelled
    );
    println!("index now holds {} boxes", index.len());
    Ok(())
}
