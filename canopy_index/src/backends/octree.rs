// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Octree over a fixed world cube with deferred subdivision.
//!
//! Each node splits its bounds at the center into eight octants. An object
//! lives in the deepest existing node whose octant fully contains it; objects
//! that straddle a split plane stay in the parent. Children are created
//! lazily, and only once a node is already holding more than
//! [`OctreeConfig::split_threshold`] objects, so sparse regions stay shallow.

use core::fmt::Debug;

use log::{debug, trace};

use crate::backend::Backend;
use crate::config::OctreeConfig;
use crate::error::{Error, Result};
use crate::queue::MinQueue;
use crate::stream::{Region, VisitFn, Visitor};
use crate::types::{Boundable, Rect3, Vec3, check_bounds};

/// An octree over a fixed root cube.
pub struct Octree<T> {
    root: Node<T>,
    config: OctreeConfig,
    len: usize,
    census: Census,
}

struct Node<T> {
    bounds: Rect3,
    depth: usize,
    children: [Option<Box<Node<T>>>; 8],
    objects: Vec<(Rect3, T)>,
}

#[derive(Copy, Clone, Debug)]
struct Census {
    nodes: usize,
    depth: usize,
}

impl Census {
    const ROOT: Self = Self { nodes: 1, depth: 0 };
}

/// The octant of `node` that fully contains `b`, if any.
///
/// Comparisons against the split plane are closed, so a box touching the
/// plane from one side still fits that side.
fn fitting_octant(node: &Rect3, b: &Rect3) -> Option<usize> {
    let c = node.center();
    let mut octant = 0;
    for (bit, lo, hi, mid) in [
        (1, b.min.x, b.max.x, c.x),
        (2, b.min.y, b.max.y, c.y),
        (4, b.min.z, b.max.z, c.z),
    ] {
        if lo >= mid {
            octant |= bit;
        } else if hi > mid {
            return None;
        }
    }
    Some(octant)
}

impl<T> Node<T> {
    fn new(bounds: Rect3, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            children: std::array::from_fn(|_| None),
            objects: Vec::new(),
        }
    }

    fn may_split(&self, config: &OctreeConfig) -> bool {
        self.objects.len() > config.split_threshold && self.depth < config.max_depth
    }

    fn insert(&mut self, bounds: Rect3, item: T, config: &OctreeConfig, census: &mut Census) {
        if let Some(i) = fitting_octant(&self.bounds, &bounds) {
            if self.children[i].is_none() && self.may_split(config) {
                self.materialise(i, config, census);
            }
            if let Some(child) = self.children[i].as_deref_mut() {
                child.insert(bounds, item, config, census);
                return;
            }
        }
        self.objects.push((bounds, item));
    }

    /// Create child `i` and move every object that fits it down.
    fn materialise(&mut self, i: usize, config: &OctreeConfig, census: &mut Census) {
        let mut child = Box::new(Self::new(self.bounds.octant(i), self.depth + 1));
        let parent = self.bounds;
        let (moved, kept): (Vec<_>, Vec<_>) = core::mem::take(&mut self.objects)
            .into_iter()
            .partition(|(b, _)| fitting_octant(&parent, b) == Some(i));
        self.objects = kept;
        census.nodes += 1;
        census.depth = census.depth.max(child.depth);
        debug!(
            "octree: materialised octant {i} at depth {} ({} objects moved down)",
            child.depth,
            moved.len()
        );
        for (b, item) in moved {
            child.insert(b, item, config, census);
        }
        self.children[i] = Some(child);
    }

    fn query(&self, region: &Region, visitor: &mut dyn Visitor<T>) -> bool {
        if !visitor.descend() {
            return false;
        }
        if !region.may_match(&self.bounds) {
            return true;
        }
        let all = region.covers(&self.bounds);
        for (b, item) in &self.objects {
            if (all || region.matches(b)) && !visitor.visit(item) {
                return false;
            }
        }
        self.children
            .iter()
            .flatten()
            .all(|child| child.query(region, visitor))
    }
}

enum Pending<'a, T> {
    Node(&'a Node<T>),
    Object(&'a T),
}

impl<T> Octree<T> {
    /// Create an empty octree over `root` with the default policy.
    pub fn new(root: Rect3) -> Result<Self> {
        Self::with_config(root, OctreeConfig::default())
    }

    /// Create an empty octree over `root` with an explicit policy.
    pub fn with_config(root: Rect3, config: OctreeConfig) -> Result<Self> {
        check_bounds(&root)?;
        Ok(Self {
            root: Node::new(root, 0),
            config,
            len: 0,
            census: Census::ROOT,
        })
    }

    /// Root bounds.
    pub fn bounds(&self) -> Rect3 {
        self.root.bounds
    }

    /// Subdivision policy.
    pub fn config(&self) -> OctreeConfig {
        self.config
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Deepest materialised level; the root alone is depth 0.
    pub fn depth(&self) -> usize {
        self.census.depth
    }

    /// Number of materialised nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.census.nodes
    }

    /// Drop every object and child node.
    pub fn clear(&mut self) {
        self.root = Node::new(self.root.bounds, 0);
        self.len = 0;
        self.census = Census::ROOT;
    }

    /// Visit objects matching `region` in preorder (node objects, then octants 0..7).
    ///
    /// Returns `false` if `f` stopped the walk.
    pub fn query(&self, region: &Region, f: impl FnMut(&T) -> bool) -> bool {
        self.root.query(region, &mut VisitFn(f))
    }

    /// Visit objects by ascending squared distance from `p` to their bounds center.
    ///
    /// Equal distances are visited in a fixed order. Returns `false` if `f`
    /// stopped the walk.
    pub fn nearest(&self, p: Vec3, f: impl FnMut(&T) -> bool) -> bool {
        self.walk_nearest(p, &mut VisitFn(f))
    }

    fn walk_nearest(&self, p: Vec3, visitor: &mut dyn Visitor<T>) -> bool {
        let mut queue = MinQueue::new();
        queue.push(self.root.bounds.distance_sq_to_point(p), Pending::Node(&self.root));
        while let Some((_, next)) = queue.pop() {
            match next {
                Pending::Node(node) => {
                    if !visitor.descend() {
                        return false;
                    }
                    for (b, item) in &node.objects {
                        queue.push(b.center().distance_sq(p), Pending::Object(item));
                    }
                    for child in node.children.iter().flatten() {
                        queue.push(child.bounds.distance_sq_to_point(p), Pending::Node(child));
                    }
                }
                Pending::Object(item) => {
                    if !visitor.visit(item) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl<T: Boundable> Octree<T> {
    /// Insert an object.
    ///
    /// Fails with [`Error::InvalidArgument`] for empty or non-finite bounds and
    /// [`Error::OutOfDomain`] when the root does not contain them. The tree
    /// is unchanged on error.
    pub fn add(&mut self, item: T) -> Result<()> {
        let bounds = item.bounds();
        check_bounds(&bounds)?;
        if !self.root.bounds.contains(&bounds) {
            return Err(Error::OutOfDomain {
                bounds,
                root: self.root.bounds,
            });
        }
        self.root.insert(bounds, item, &self.config, &mut self.census);
        self.len += 1;
        trace!("octree: added {bounds:?}, {} objects", self.len);
        Ok(())
    }
}

impl<T: Boundable> Backend for Octree<T> {
    type Item = T;
    type Key = ();

    fn insert(&mut self, item: T) -> Result<()> {
        self.add(item)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn depth(&self) -> usize {
        self.census.depth
    }

    fn visit_region(&self, region: &Region, visitor: &mut dyn Visitor<T>) -> bool {
        self.root.query(region, visitor)
    }

    fn visit_nearest(&self, point: Vec3, visitor: &mut dyn Visitor<T>) -> bool {
        self.walk_nearest(point, visitor)
    }
}

impl<T> Debug for Octree<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Octree")
            .field("bounds", &self.root.bounds)
            .field("len", &self.len)
            .field("nodes", &self.census.nodes)
            .field("depth", &self.census.depth)
            .finish_non_exhaustive()
    }
}
