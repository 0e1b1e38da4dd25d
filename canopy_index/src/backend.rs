// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait implemented by every spatial index.

use core::fmt::Debug;

use crate::error::Result;
use crate::stream::{Region, Visitor};
use crate::types::{Boundable, Vec3};

/// Spatial backend abstraction used by [`SharedIndex`](crate::SharedIndex).
///
/// Traversals report through a [`Visitor`] and return `true` if they ran to
/// completion, `false` if the visitor stopped them.
pub trait Backend {
    /// Stored object type.
    type Item: Boundable;

    /// Handle returned by [`insert`](Self::insert). Backends without removal use `()`.
    type Key: Copy + Debug;

    /// Insert an object. On error the backend is unchanged.
    fn insert(&mut self, item: Self::Item) -> Result<Self::Key>;

    /// Number of stored objects.
    fn len(&self) -> usize;

    /// Whether nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every object, keeping the configuration.
    fn clear(&mut self);

    /// Number of levels below the root; `0` for flat structures.
    fn depth(&self) -> usize;

    /// Visit every object matching `region`.
    fn visit_region(&self, region: &Region, visitor: &mut dyn Visitor<Self::Item>) -> bool;

    /// Visit objects in order of proximity to `point`.
    fn visit_nearest(&self, point: Vec3, visitor: &mut dyn Visitor<Self::Item>) -> bool;
}
