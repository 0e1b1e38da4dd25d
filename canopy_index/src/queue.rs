// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Min-priority queue for best-first traversals.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Queued<P> {
    dist_sq: f64,
    seq: u64,
    payload: P,
}

impl<P> PartialEq for Queued<P> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<P> Eq for Queued<P> {}

impl<P> PartialOrd for Queued<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for Queued<P> {
    // Reversed so the std max-heap pops the smallest distance first, and
    // among equal distances the earliest pushed.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist_sq
            .total_cmp(&self.dist_sq)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pops payloads by ascending squared distance, ties in push order.
pub(crate) struct MinQueue<P> {
    heap: BinaryHeap<Queued<P>>,
    seq: u64,
}

impl<P> MinQueue<P> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub(crate) fn push(&mut self, dist_sq: f64, payload: P) {
        self.heap.push(Queued {
            dist_sq,
            seq: self.seq,
            payload,
        });
        self.seq += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<(f64, P)> {
        self.heap.pop().map(|q| (q.dist_sq, q.payload))
    }
}
