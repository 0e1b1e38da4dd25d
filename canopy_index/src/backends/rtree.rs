// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena-backed R-tree with quadratic splits.
//!
//! Nodes live in a `Vec` and refer to their children by index. Parent links
//! are not stored: an insertion records the path it descended and walks it
//! back up to tighten bounds and propagate splits.

use core::cmp::Ordering;
use core::fmt::Debug;

use log::{debug, trace};

use crate::backend::Backend;
use crate::config::RTreeConfig;
use crate::error::Result;
use crate::queue::MinQueue;
use crate::stream::{Region, VisitFn, Visitor};
use crate::types::{Boundable, Rect3, Vec3, check_bounds, enlargement};

/// R-tree with bounded fanout.
pub struct RTree<T> {
    config: RTreeConfig,
    root: Option<NodeIdx>,
    arena: Vec<RNode<T>>,
    len: usize,
}

struct RNode<T> {
    bbox: Rect3,
    /// Leaf nodes are height 0.
    height: usize,
    children: Vec<RChild<T>>,
}

enum RChild<T> {
    Node(NodeIdx),
    Item { bbox: Rect3, item: T },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(usize);

impl NodeIdx {
    const fn new(i: usize) -> Self {
        Self(i)
    }

    const fn get(self) -> usize {
        self.0
    }
}

enum Pending<'a, T> {
    Node(NodeIdx),
    Object(&'a T),
}

impl<T> Default for RTree<T> {
    fn default() -> Self {
        Self {
            config: RTreeConfig::default(),
            root: None,
            arena: Vec::new(),
            len: 0,
        }
    }
}

impl<T> RTree<T> {
    /// Create an empty tree. Fails unless `0 < min` and `2 * min <= max`.
    pub fn new(min_children: usize, max_children: usize) -> Result<Self> {
        Self::with_config(RTreeConfig {
            min_children,
            max_children,
        })
    }

    /// Create an empty tree from a validated config.
    pub fn with_config(config: RTreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Fanout bounds.
    pub fn config(&self) -> RTreeConfig {
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

    /// Height of the root; a tree whose root is a leaf (or that is empty) has height 0.
    pub fn height(&self) -> usize {
        self.root.map_or(0, |r| self.arena[r.get()].height)
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.root = None;
        self.arena.clear();
        self.len = 0;
    }

    /// Visit objects matching `region`, depth first in child order.
    ///
    /// Returns `false` if `f` stopped the walk.
    pub fn search(&self, region: &Region, f: impl FnMut(&T) -> bool) -> bool {
        self.walk_region(region, &mut VisitFn(f))
    }

    /// Visit objects by ascending squared distance from `p` to their bounds center.
    pub fn nearest(&self, p: Vec3, f: impl FnMut(&T) -> bool) -> bool {
        self.walk_nearest(p, &mut VisitFn(f))
    }

    fn walk_region(&self, region: &Region, visitor: &mut dyn Visitor<T>) -> bool {
        match self.root {
            Some(root) => self.search_node(root, region, visitor),
            None => true,
        }
    }

    fn search_node(&self, idx: NodeIdx, region: &Region, visitor: &mut dyn Visitor<T>) -> bool {
        if !visitor.descend() {
            return false;
        }
        let node = &self.arena[idx.get()];
        if !region.may_match(&node.bbox) {
            return true;
        }
        let all = region.covers(&node.bbox);
        for child in &node.children {
            let more = match child {
                RChild::Node(ci) => self.search_node(*ci, region, visitor),
                RChild::Item { bbox, item } => !(all || region.matches(bbox)) || visitor.visit(item),
            };
            if !more {
                return false;
            }
        }
        true
    }

    fn walk_nearest(&self, p: Vec3, visitor: &mut dyn Visitor<T>) -> bool {
        let Some(root) = self.root else {
            return true;
        };
        let mut queue = MinQueue::new();
        queue.push(
            self.arena[root.get()].bbox.distance_sq_to_point(p),
            Pending::Node(root),
        );
        while let Some((_, next)) = queue.pop() {
            match next {
                Pending::Node(idx) => {
                    if !visitor.descend() {
                        return false;
                    }
                    for child in &self.arena[idx.get()].children {
                        match child {
                            RChild::Node(ci) => queue.push(
                                self.arena[ci.get()].bbox.distance_sq_to_point(p),
                                Pending::Node(*ci),
                            ),
                            RChild::Item { bbox, item } => {
                                queue.push(bbox.center().distance_sq(p), Pending::Object(item));
                            }
                        }
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

    fn child_bbox(&self, c: &RChild<T>) -> Rect3 {
        match c {
            RChild::Node(i) => self.arena[i.get()].bbox,
            RChild::Item { bbox, .. } => *bbox,
        }
    }

    fn union_of(&self, children: &[RChild<T>]) -> Rect3 {
        let mut boxes = children.iter().map(|c| self.child_bbox(c));
        let first = boxes.next().unwrap_or_default();
        boxes.fold(first, |acc, b| acc.union(&b))
    }

    fn push_node(&mut self, node: RNode<T>) -> NodeIdx {
        let idx = NodeIdx::new(self.arena.len());
        self.arena.push(node);
        idx
    }

    /// Descend from `root` by least enlargement (ties: smaller volume),
    /// returning the path from the root to the chosen leaf.
    fn choose_leaf(&self, root: NodeIdx, bbox: &Rect3) -> Vec<NodeIdx> {
        let mut path = vec![root];
        let mut current = root;
        while self.arena[current.get()].height > 0 {
            let mut best: Option<(f64, f64, NodeIdx)> = None;
            for child in &self.arena[current.get()].children {
                let RChild::Node(ci) = child else {
                    continue;
                };
                let cb = self.arena[ci.get()].bbox;
                let (grow, vol) = (enlargement(&cb, bbox), cb.area());
                let better = best.is_none_or(|(g, v, _)| {
                    grow.total_cmp(&g).then(vol.total_cmp(&v)) == Ordering::Less
                });
                if better {
                    best = Some((grow, vol, *ci));
                }
            }
            let Some((_, _, next)) = best else {
                break;
            };
            current = next;
            path.push(current);
        }
        path
    }

    fn tighten(&mut self, idx: NodeIdx) {
        let bbox = self.union_of(&self.arena[idx.get()].children);
        self.arena[idx.get()].bbox = bbox;
    }

    /// Split `idx` if it holds more than `max` entries, returning the new sibling.
    fn split_if_overfull(&mut self, idx: NodeIdx) -> Option<NodeIdx> {
        if self.arena[idx.get()].children.len() <= self.config.max_children {
            return None;
        }
        let entries = core::mem::take(&mut self.arena[idx.get()].children);
        let boxes: Vec<Rect3> = entries.iter().map(|c| self.child_bbox(c)).collect();
        let (left, right) = quadratic_split(entries, &boxes, self.config);
        let (left_bbox, right_bbox) = (self.union_of(&left), self.union_of(&right));
        let height = self.arena[idx.get()].height;
        let node = &mut self.arena[idx.get()];
        node.children = left;
        node.bbox = left_bbox;
        Some(self.push_node(RNode {
            bbox: right_bbox,
            height,
            children: right,
        }))
    }

    /// Walk `path` bottom-up, tightening bounds and inserting any split
    /// sibling beside the node it came from. Grows a new root if the old
    /// root split.
    fn adjust_tree(&mut self, path: &[NodeIdx], mut split: Option<NodeIdx>) {
        if let Some(&leaf) = path.last() {
            self.tighten(leaf);
        }
        for pair in path.windows(2).rev() {
            let (parent, child) = (pair[0], pair[1]);
            if let Some(sibling) = split.take() {
                let children = &mut self.arena[parent.get()].children;
                let at = children
                    .iter()
                    .position(|c| matches!(c, RChild::Node(i) if *i == child))
                    .map_or(children.len(), |p| p + 1);
                children.insert(at, RChild::Node(sibling));
                split = self.split_if_overfull(parent);
            }
            self.tighten(parent);
        }
        if let (Some(sibling), Some(old)) = (split, self.root) {
            let height = self.arena[old.get()].height + 1;
            let bbox = self.arena[old.get()]
                .bbox
                .union(&self.arena[sibling.get()].bbox);
            let root = self.push_node(RNode {
                bbox,
                height,
                children: vec![RChild::Node(old), RChild::Node(sibling)],
            });
            self.root = Some(root);
            debug!("r-tree: root split, height now {height}");
        }
    }
}

impl<T: Boundable> RTree<T> {
    /// Insert an object. Fails with [`InvalidArgument`](crate::Error::InvalidArgument)
    /// for empty or non-finite bounds, leaving the tree unchanged.
    pub fn insert(&mut self, item: T) -> Result<()> {
        let bbox = item.bounds();
        check_bounds(&bbox)?;
        let entry = RChild::Item { bbox, item };
        match self.root {
            None => {
                let idx = self.push_node(RNode {
                    bbox,
                    height: 0,
                    children: vec![entry],
                });
                self.root = Some(idx);
            }
            Some(root) => {
                let path = self.choose_leaf(root, &bbox);
                let leaf = path[path.len() - 1];
                self.arena[leaf.get()].children.push(entry);
                let split = self.split_if_overfull(leaf);
                self.adjust_tree(&path, split);
            }
        }
        self.len += 1;
        Ok(())
    }
}

/// Pick the two entries that would waste the most volume if grouped together.
fn pick_seeds(boxes: &[Rect3]) -> (usize, usize) {
    let mut seeds = (0, 1);
    let mut worst = f64::NEG_INFINITY;
    for (i, a) in boxes.iter().enumerate() {
        for (j, b) in boxes.iter().enumerate().skip(i + 1) {
            let waste = a.union(b).area() - a.area() - b.area();
            if waste > worst {
                worst = waste;
                seeds = (i, j);
            }
        }
    }
    seeds
}

/// Guttman's quadratic split of `max + 1` entries into two groups of at least `min`.
fn quadratic_split<C>(
    entries: Vec<C>,
    boxes: &[Rect3],
    config: RTreeConfig,
) -> (Vec<C>, Vec<C>) {
    let (a, b) = pick_seeds(boxes);
    trace!("r-tree: splitting {} entries, seeds {a} and {b}", boxes.len());
    let mut side: Vec<Option<usize>> = vec![None; boxes.len()];
    side[a] = Some(0);
    side[b] = Some(1);
    let mut group_bbox = [boxes[a], boxes[b]];
    let mut group_len = [1_usize, 1];
    let cap = config.max_children + 1 - config.min_children;
    let mut remaining = boxes.len() - 2;

    while remaining > 0 {
        if let Some(full) = (0..2).find(|&g| group_len[g] >= cap) {
            let other = 1 - full;
            for s in side.iter_mut().filter(|s| s.is_none()) {
                *s = Some(other);
            }
            group_len[other] += remaining;
            break;
        }

        // PickNext: the entry with the strongest preference for one group.
        let mut next: Option<(usize, f64, f64)> = None;
        let mut best_diff = f64::NEG_INFINITY;
        for (e, bb) in boxes.iter().enumerate() {
            if side[e].is_some() {
                continue;
            }
            let d0 = enlargement(&group_bbox[0], bb);
            let d1 = enlargement(&group_bbox[1], bb);
            let diff = (d0 - d1).abs();
            if diff > best_diff {
                best_diff = diff;
                next = Some((e, d0, d1));
            }
        }
        let Some((e, d0, d1)) = next else {
            break;
        };
        let g = match d0
            .total_cmp(&d1)
            .then(group_bbox[0].area().total_cmp(&group_bbox[1].area()))
            .then(group_len[0].cmp(&group_len[1]))
        {
            Ordering::Greater => 1,
            _ => 0,
        };
        side[e] = Some(g);
        group_bbox[g] = group_bbox[g].union(&boxes[e]);
        group_len[g] += 1;
        remaining -= 1;
    }

    let mut left = Vec::with_capacity(group_len[0]);
    let mut right = Vec::with_capacity(group_len[1]);
    for (entry, s) in entries.into_iter().zip(side) {
        if s == Some(1) {
            right.push(entry);
        } else {
            left.push(entry);
        }
    }
    (left, right)
}

impl<T: Boundable> Backend for RTree<T> {
    type Item = T;
    type Key = ();

    fn insert(&mut self, item: T) -> Result<()> {
        Self::insert(self, item)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn depth(&self) -> usize {
        self.height()
    }

    fn visit_region(&self, region: &Region, visitor: &mut dyn Visitor<T>) -> bool {
        self.walk_region(region, visitor)
    }

    fn visit_nearest(&self, point: Vec3, visitor: &mut dyn Visitor<T>) -> bool {
        self.walk_nearest(point, visitor)
    }
}

impl<T> Debug for RTree<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("min_children", &self.config.min_children)
            .field("max_children", &self.config.max_children)
            .field("arena_nodes", &self.arena.len())
            .field("len", &self.len)
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}
