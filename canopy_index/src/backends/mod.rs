// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial index implementations.
//!
//! - `octree`: fixed world cube, eight-way spatial subdivision. Needs the
//!   world extent up front; good when objects are small relative to it.
//! - `rtree`: data-driven bounding hierarchy with quadratic splits. No world
//!   extent, handles clustered and irregular data.
//! - `grid_hash`: `size³` hashed cells for coarse nearest sweeps, with
//!   removal by key.
//!
//! Quadratic split
//! ---------------
//! When an R-tree node overflows to `max + 1` entries, the two entries that
//! would waste the most volume together seed two groups. The remaining
//! entries are then placed one at a time, strongest preference first, into
//! the group whose bounds grow least. Once a group holds `max - min + 1`
//! entries the rest go to the other group, so both end with at least `min`.

pub mod grid_hash;
pub mod octree;
pub mod rtree;

pub use grid_hash::GridHash;
pub use octree::Octree;
pub use rtree::RTree;
