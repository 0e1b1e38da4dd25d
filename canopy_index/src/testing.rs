// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixtures shared by the unit tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::stream::Region;
use crate::types::{Rect3, Vec3};

pub(crate) fn world() -> Rect3 {
    Rect3::new(Vec3::splat(-500.0), Vec3::splat(500.0))
}

/// `n` boxes inside [`world`], deterministic for a given seed.
pub(crate) fn random_boxes(seed: u64, n: usize) -> Vec<Rect3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let center = Vec3::new(
                rng.random_range(-480.0..480.0),
                rng.random_range(-480.0..480.0),
                rng.random_range(-480.0..480.0),
            );
            let half = Vec3::new(
                rng.random_range(0.5..20.0),
                rng.random_range(0.5..20.0),
                rng.random_range(0.5..20.0),
            );
            Rect3::from_center_half_extents(center, half)
        })
        .collect()
}

pub(crate) fn sorted(mut boxes: Vec<Rect3>) -> Vec<Rect3> {
    boxes.sort_by(|a, b| {
        let ka = [a.min.x, a.min.y, a.min.z, a.max.x, a.max.y, a.max.z];
        let kb = [b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z];
        ka.iter()
            .zip(&kb)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(core::cmp::Ordering::Equal)
    });
    boxes
}

/// Linear-scan reference answer, sorted.
pub(crate) fn brute_force(boxes: &[Rect3], region: &Region) -> Vec<Rect3> {
    sorted(boxes.iter().copied().filter(|b| region.matches(b)).collect())
}
