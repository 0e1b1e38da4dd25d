// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Index: concurrent 3D AABB indices with streaming, cancellable queries.
//!
//! - Store anything that reports its bounds ([`Boundable`]) in an [`Octree`],
//!   an [`RTree`] or a [`GridHash`].
//! - Query by [`Region`]: boxes intersecting or within a rectangle or a
//!   sphere, or containing a point. Shapes combine with `!` and `&`.
//! - Walk objects nearest-first from a point.
//! - Share an index between threads with [`SharedIndex`], stream query
//!   results through bounded channels, and cancel them at any time.
//!
//! # Example
//!
//! ```rust
//! use canopy_index::{Octree, Rect3, Region, SharedIndex, Vec3};
//!
//! let world = Rect3::new(Vec3::splat(0.0), Vec3::splat(100.0));
//! let index = SharedIndex::new(Octree::new(world)?);
//! index.add(Rect3::new(Vec3::splat(1.0), Vec3::splat(2.0)))?;
//! index.add(Rect3::new(Vec3::splat(50.0), Vec3::splat(60.0)))?;
//!
//! // Stream results from a producer thread.
//! let near_origin = Region::Intersecting(Rect3::new(Vec3::ZERO, Vec3::splat(3.0)));
//! let (rx, _canceller, handle) = index.query_channel(near_origin);
//! let hits: Vec<Rect3> = rx.iter().collect();
//! assert_eq!(hits.len(), 1);
//! assert!(!handle.join().cancelled);
//!
//! // Or walk synchronously, nearest first.
//! let mut first = None;
//! index.nearest(Vec3::splat(58.0), |b| {
//!     first = Some(*b);
//!     false
//! });
//! assert_eq!(first.map(|b| b.min.x), Some(50.0));
//! # Ok::<(), canopy_index::Error>(())
//! ```
//!
//! Cancelling a query stops the producer within one node visit, and the
//! channel closes after the items already buffered:
//!
//! ```rust
//! use canopy_index::{RTree, Rect3, Region, SharedIndex, Vec3};
//!
//! let index = SharedIndex::new(RTree::new(2, 4)?);
//! for i in 0..1_000 {
//!     let x = f64::from(i);
//!     index.add(Rect3::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 0.5, 1.0, 1.0)))?;
//! }
//! let all = Region::Intersecting(Rect3::new(Vec3::splat(-1.0), Vec3::splat(2_000.0)));
//! let (rx, canceller, handle) = index.query_channel(all);
//! let _first = rx.recv();
//! canceller.cancel();
//! assert!(handle.join().cancelled);
//! assert!(rx.iter().count() <= index.stream_config().capacity);
//! # Ok::<(), canopy_index::Error>(())
//! ```
//!
//! ## Choosing an index
//!
//! - [`Octree`]: needs a fixed world extent. Children are only created once a
//!   node holds more than [`OctreeConfig::split_threshold`] objects.
//! - [`RTree`]: no world extent; bounded fanout with quadratic splits.
//! - [`GridHash`]: fixed `size³` hashed cells. Its nearest walk is a cheap
//!   approximation, ordered exactly only within a cell. Supports removal.
//!
//! ### Float semantics
//!
//! Coordinates are `f64`. Inserting empty or non-finite bounds fails with
//! [`Error::InvalidArgument`]. Intersection is strict: boxes that only share
//! a face do not intersect.

pub mod backend;
pub mod backends;
pub mod config;
pub mod error;
pub mod index;
pub mod stream;
pub mod types;

mod queue;
#[cfg(test)]
mod testing;

pub use backend::Backend;
pub use backends::{GridHash, Octree, RTree};
pub use config::{GridHashConfig, IndexConfig, OctreeConfig, RTreeConfig, StreamConfig};
pub use error::{Error, Result};
pub use index::{Key, QueryHandle, SharedGridHash, SharedIndex, SharedOctree, SharedRTree};
pub use stream::{
    CancelSignal, Canceller, QueryOutcome, Region, VisitFn, Visitor, cancel_pair,
};
pub use types::{Boundable, Rect3, Vec3};
