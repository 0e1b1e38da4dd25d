// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cancelling an R-tree query.
//!
//! Start a large query, take a handful of results, fire the canceller and
//! check how many buffered items were still delivered.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p canopy_demos --example rtree_cancel`

use std::time::Duration;

use canopy_index::{RTree, Rect3, Region, SharedIndex, StreamConfig, Vec3, cancel_pair};
use crossbeam::channel::bounded;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let index = SharedIndex::with_stream_config(RTree::new(8, 16)?, StreamConfig { capacity: 8 });
    for i in 0..50_000 {
        let x = f64::from(i % 250) * 4.0;
        let y = f64::from(i / 250) * 4.0;
        index.add(Rect3::new(Vec3::new(x, y, 0.0), Vec3::new(x + 3.0, y + 3.0, 3.0)))?;
    }
    log::info!("r-tree height {}", index.read().height());

    let everything = Region::Intersecting(Rect3::new(Vec3::splat(-1.0), Vec3::splat(1_001.0)));
    let (rx, canceller, handle) = index.query_channel(everything.clone());
    let first: Vec<Rect3> = rx.iter().take(10).collect();
    canceller.cancel();
    let outcome = handle.join();
    let trailing = rx.iter().count();
    println!(
        "took {}, producer sent {} before stopping, {trailing} were still buffered",
        first.len(),
        outcome.emitted
    );

    // A timeout is just a canceller fired from another thread.
    let (tx, rx) = bounded(1);
    let (canceller, signal) = cancel_pair();
    let handle = index.query(everything, tx, signal);
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(5));
        canceller.cancel();
    });
    let mut slow = 0;
    for _ in rx {
        slow += 1;
        std::thread::sleep(Duration::from_micros(50));
    }
    println!("slow consumer received {slow} items, outcome {:?}", handle.join());
    Ok(())
}
