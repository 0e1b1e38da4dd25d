// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Canopy Index: build each index, query a region, walk nearest-first.

use canopy_index::{GridHash, Octree, RTree, Rect3, Region, Vec3};

fn main() -> Result<(), canopy_index::Error> {
    let boxes = [
        Rect3::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0)),
        Rect3::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(15.0, 15.0, 15.0)),
        Rect3::new(Vec3::new(40.0, 0.0, 0.0), Vec3::new(45.0, 5.0, 5.0)),
    ];

    let mut octree = Octree::new(Rect3::new(Vec3::splat(-64.0), Vec3::splat(64.0)))?;
    let mut rtree = RTree::new(2, 4)?;
    let mut grid = GridHash::new(4)?;
    for b in boxes {
        octree.add(b)?;
        rtree.insert(b)?;
        let _key = grid.add(b)?;
    }

    // Query a point
    let at = Region::Containing(Vec3::splat(6.0));
    let mut hits = Vec::new();
    octree.query(&at, |b| {
        hits.push(*b);
        true
    });
    println!("octree hits at (6,6,6): {hits:?}");

    let mut hits = 0;
    rtree.search(&Region::Within(Rect3::new(Vec3::ZERO, Vec3::splat(50.0))), |_| {
        hits += 1;
        true
    });
    println!("r-tree boxes within [0, 50]³: {hits}");

    // Nearest first from the far box
    let p = Vec3::new(42.0, 2.0, 2.0);
    octree.nearest(p, |b| {
        println!("octree nearest: {b:?}");
        true
    });
    let seen = grid.nearest(p, |_| true);
    println!("grid hash sweep visited {seen} boxes");
    Ok(())
}
