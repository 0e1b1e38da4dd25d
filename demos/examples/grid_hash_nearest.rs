// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grid hash proximity sweep, with the TOML config loader.
//!
//! Run:
//! - `cargo run -p canopy_demos --example grid_hash_nearest`

use canopy_index::{GridHash, IndexConfig, Octree, Rect3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CONFIG: &str = r#"
[grid]
size = 8

[octree]
split_threshold = 4
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = IndexConfig::from_toml_str(CONFIG)?;
    log::info!("effective config:\n{}", config.to_toml_string()?);

    let mut grid = GridHash::with_config(config.grid)?;
    let world = Rect3::new(Vec3::splat(-100.0), Vec3::splat(100.0));
    let mut octree = Octree::with_config(world, config.octree)?;

    let mut rng = StdRng::seed_from_u64(0x5EED);
    let mut keys = Vec::new();
    for _ in 0..2_000 {
        let c = Vec3::new(
            rng.random_range(-95.0..95.0),
            rng.random_range(-95.0..95.0),
            rng.random_range(-95.0..95.0),
        );
        let b = Rect3::from_center_half_extents(c, Vec3::splat(0.5));
        keys.push(grid.add(b)?);
        octree.add(b)?;
    }
    for key in keys.iter().step_by(4) {
        grid.remove(*key);
    }
    println!(
        "grid holds {} boxes, running avg |center|² {:.1}",
        grid.len(),
        grid.avg_len_sq()
    );

    let p = Vec3::new(10.0, -20.0, 30.0);
    let mut approx = Vec::new();
    grid.nearest(p, |b| {
        approx.push(b.center().distance_sq(p).sqrt());
        approx.len() < 5
    });
    let mut exact = Vec::new();
    octree.nearest(p, |b| {
        exact.push(b.center().distance_sq(p).sqrt());
        exact.len() < 5
    });
    println!("grid hash sweep (approximate): {approx:.2?}");
    println!("octree best-first (exact):     {exact:.2?}");
    Ok(())
}
