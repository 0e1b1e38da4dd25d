// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use core::ops::{Add, Mul, Sub};
use std::rc::Rc;
use std::sync::Arc;

/// A point or direction in 3D space with `f64` components.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a vector from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// A vector with all three components set to `v`.
    pub const fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    /// Componentwise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    /// Componentwise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    /// Squared length.
    pub fn length_sq(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Squared distance to `other`.
    pub fn distance_sq(self, other: Self) -> f64 {
        (self - other).length_sq()
    }

    /// True if no component is NaN or infinite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Axis-aligned bounding box in 3D.
///
/// Intervals are closed for containment: a box touching the boundary of another
/// is contained by it. Overlap is strict: two boxes that only share a face do
/// not intersect, because their common region has no volume.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect3 {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Rect3 {
    /// Create a new AABB from min/max corners.
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from its center and half-extents.
    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        Self::new(center - half, center + half)
    }

    /// Center point, `(min + max) / 2`.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Side lengths, `max - min`.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Volume (product of the side lengths). Inverted boxes count as zero.
    pub fn area(&self) -> f64 {
        let s = self.size();
        s.x.max(0.0) * s.y.max(0.0) * s.z.max(0.0)
    }

    /// True if `min >= max` on any axis (no volume).
    pub fn is_empty(&self) -> bool {
        !(self.min.x < self.max.x && self.min.y < self.max.y && self.min.z < self.max.z)
    }

    /// True if both corners are finite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Whether `other` fits entirely inside this box (closed intervals).
    pub fn contains(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
            && other.max.z <= self.max.z
    }

    /// Whether this box contains the point (closed intervals).
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.x <= p.x
            && p.x <= self.max.x
            && self.min.y <= p.y
            && p.y <= self.max.y
            && self.min.z <= p.z
            && p.z <= self.max.z
    }

    /// The overlap of two boxes, or `None` unless all three axes overlap strictly.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let r = Self::new(self.min.max(other.min), self.max.min(other.max));
        if r.is_empty() { None } else { Some(r) }
    }

    /// Whether the two boxes share a region with non-zero volume.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }

    /// Smallest box enclosing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Squared distance from `p` to the nearest point of this box; zero inside.
    pub fn distance_sq_to_point(&self, p: Vec3) -> f64 {
        let gap = |lo: f64, hi: f64, v: f64| (lo - v).max(0.0).max(v - hi);
        let dx = gap(self.min.x, self.max.x, p.x);
        let dy = gap(self.min.y, self.max.y, p.y);
        let dz = gap(self.min.z, self.max.z, p.z);
        dx * dx + dy * dy + dz * dz
    }

    /// Squared distance from `p` to the farthest corner of this box.
    pub fn farthest_distance_sq(&self, p: Vec3) -> f64 {
        let reach = |lo: f64, hi: f64, v: f64| (v - lo).abs().max((hi - v).abs());
        let dx = reach(self.min.x, self.max.x, p.x);
        let dy = reach(self.min.y, self.max.y, p.y);
        let dz = reach(self.min.z, self.max.z, p.z);
        dx * dx + dy * dy + dz * dz
    }

    /// The `i`-th octant (`0..8`) of this box split at its center.
    ///
    /// Bit 0 selects the upper half on x, bit 1 on y, bit 2 on z.
    pub fn octant(&self, i: usize) -> Self {
        debug_assert!(i < 8, "octant index out of range: {i}");
        let c = self.center();
        let pick = |bit: usize, lo: f64, mid: f64, hi: f64| {
            if i & bit != 0 { (mid, hi) } else { (lo, mid) }
        };
        let (x0, x1) = pick(1, self.min.x, c.x, self.max.x);
        let (y0, y1) = pick(2, self.min.y, c.y, self.max.y);
        let (z0, z1) = pick(4, self.min.z, c.z, self.max.z);
        Self::new(Vec3::new(x0, y0, z0), Vec3::new(x1, y1, z1))
    }
}

/// Anything a spatial index can hold: reports its axis-aligned bounds.
///
/// Indices read the bounds once, at insertion, and keep them beside the item.
/// An item whose bounds change must be removed and re-added.
pub trait Boundable {
    /// Current bounding box.
    fn bounds(&self) -> Rect3;
}

impl Boundable for Rect3 {
    fn bounds(&self) -> Rect3 {
        *self
    }
}

impl<B: Boundable + ?Sized> Boundable for &B {
    fn bounds(&self) -> Rect3 {
        (**self).bounds()
    }
}

impl<B: Boundable + ?Sized> Boundable for Box<B> {
    fn bounds(&self) -> Rect3 {
        (**self).bounds()
    }
}

impl<B: Boundable + ?Sized> Boundable for Arc<B> {
    fn bounds(&self) -> Rect3 {
        (**self).bounds()
    }
}

impl<B: Boundable + ?Sized> Boundable for Rc<B> {
    fn bounds(&self) -> Rect3 {
        (**self).bounds()
    }
}

/// Volume growth needed for `a` to also cover `b`.
#[inline]
pub(crate) fn enlargement(a: &Rect3, b: &Rect3) -> f64 {
    a.union(b).area() - a.area()
}

/// Validate bounds an index is about to store.
pub(crate) fn check_bounds(b: &Rect3) -> crate::Result<()> {
    if !b.is_finite() {
        return Err(crate::Error::InvalidArgument(format!(
            "non-finite bounds {b:?}"
        )));
    }
    if b.is_empty() {
        return Err(crate::Error::InvalidArgument(format!("empty bounds {b:?}")));
    }
    Ok(())
}
