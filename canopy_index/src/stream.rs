// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Query shapes, the traversal [`Visitor`] contract, and the cancellable
//! channel protocol used by streaming queries.
//!
//! A streaming query has three parts: the query shape, a bounded
//! [`Sender`] the producer writes results to, and a [`CancelSignal`] the
//! producer polls before every node and every send. Each send is a
//! `select!` between the result channel and the signal, so a producer
//! blocked on a full channel still notices cancellation. The producer drops
//! its sender when it finishes, which closes the channel once every other
//! sender clone is gone.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam::channel::{Receiver, Sender, TryRecvError, bounded};

use crate::types::{Rect3, Vec3};

/// The shape of a region query.
///
/// Shapes compose: `!shape` matches what `shape` rejects, and `a & b`
/// matches what both accept.
///
/// ```rust
/// use canopy_index::{Rect3, Region, Vec3};
///
/// let hole = Region::Within(Rect3::new(Vec3::splat(-1.0), Vec3::splat(1.0)));
/// let ball = Region::WithinSphere { center: Vec3::ZERO, radius: 10.0 };
/// let shell = ball & !hole;
/// assert!(shell.matches(&Rect3::new(Vec3::splat(2.0), Vec3::splat(3.0))));
/// assert!(!shell.matches(&Rect3::new(Vec3::ZERO, Vec3::splat(0.5))));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Region {
    /// Objects whose bounds overlap the rectangle with non-zero volume.
    Intersecting(Rect3),
    /// Objects whose bounds lie entirely inside the rectangle.
    Within(Rect3),
    /// Objects whose (closed) bounds contain the point.
    Containing(Vec3),
    /// Objects whose bounds come strictly closer than `radius` to `center`.
    ///
    /// A negative or NaN radius matches nothing.
    IntersectingSphere {
        /// Sphere center.
        center: Vec3,
        /// Sphere radius.
        radius: f64,
    },
    /// Objects whose every corner lies in the closed ball.
    WithinSphere {
        /// Sphere center.
        center: Vec3,
        /// Sphere radius.
        radius: f64,
    },
    /// Objects the inner shape rejects.
    Not(Box<Region>),
    /// Objects both shapes accept.
    And(Box<Region>, Box<Region>),
}

/// Squared radius, or `-inf` so that no distance compares below it.
fn radius_sq(radius: f64) -> f64 {
    if radius >= 0.0 {
        radius * radius
    } else {
        f64::NEG_INFINITY
    }
}

impl Region {
    /// Whether an object with bounds `b` matches.
    pub fn matches(&self, b: &Rect3) -> bool {
        match self {
            Self::Intersecting(r) => b.intersects(r),
            Self::Within(r) => r.contains(b),
            Self::Containing(p) => b.contains_point(*p),
            Self::IntersectingSphere { center, radius } => {
                b.distance_sq_to_point(*center) < radius_sq(*radius)
            }
            Self::WithinSphere { center, radius } => {
                b.farthest_distance_sq(*center) <= radius_sq(*radius)
            }
            Self::Not(inner) => !inner.matches(b),
            Self::And(a, c) => a.matches(b) && c.matches(b),
        }
    }

    /// Whether a node bounding `node` can hold any match. Failing nodes are pruned.
    ///
    /// Must only return `false` when no non-empty object inside `node` matches.
    pub(crate) fn may_match(&self, node: &Rect3) -> bool {
        match self {
            Self::Intersecting(r) | Self::Within(r) => node.intersects(r),
            Self::Containing(p) => node.contains_point(*p),
            Self::IntersectingSphere { center, radius } => {
                node.distance_sq_to_point(*center) < radius_sq(*radius)
            }
            Self::WithinSphere { center, radius } => {
                node.distance_sq_to_point(*center) <= radius_sq(*radius)
            }
            Self::Not(inner) => !inner.covers(node),
            Self::And(a, b) => a.may_match(node) && b.may_match(node),
        }
    }

    /// Whether every non-empty object inside `node` matches without testing it.
    pub(crate) fn covers(&self, node: &Rect3) -> bool {
        match self {
            Self::Intersecting(r) | Self::Within(r) => r.contains(node),
            Self::Containing(_) => false,
            Self::IntersectingSphere { center, radius } => {
                node.farthest_distance_sq(*center) < radius_sq(*radius)
            }
            Self::WithinSphere { center, radius } => {
                node.farthest_distance_sq(*center) <= radius_sq(*radius)
            }
            Self::Not(inner) => !inner.may_match(node),
            Self::And(a, b) => a.covers(node) && b.covers(node),
        }
    }
}

impl core::ops::Not for Region {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl core::ops::BitAnd for Region {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::And(Box::new(self), Box::new(rhs))
    }
}

/// Receives items during a traversal.
///
/// Traversals call [`descend`](Self::descend) before entering each node (or
/// cell) and [`visit`](Self::visit) for each matching item. Returning `false`
/// from either stops the traversal, and the traversal then returns `false`.
pub trait Visitor<T: ?Sized> {
    /// Handle one item. Return `false` to stop.
    fn visit(&mut self, item: &T) -> bool;

    /// Called between nodes. Return `false` to stop.
    fn descend(&mut self) -> bool {
        true
    }
}

/// Adapts a closure into a [`Visitor`] that never stops between nodes.
#[derive(Debug)]
pub struct VisitFn<F>(pub F);

impl<T: ?Sized, F: FnMut(&T) -> bool> Visitor<T> for VisitFn<F> {
    fn visit(&mut self, item: &T) -> bool {
        (self.0)(item)
    }
}

/// Create a linked [`Canceller`] and [`CancelSignal`].
///
/// The signal fires when [`Canceller::cancel`] is called or when the last
/// clone of the canceller is dropped.
pub fn cancel_pair() -> (Canceller, CancelSignal) {
    let (tx, rx) = bounded::<()>(0);
    let canceller = Canceller {
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    let signal = CancelSignal { rx, _keep: None };
    (canceller, signal)
}

/// The firing side of a cancel signal. Clones share one signal.
#[derive(Clone, Debug)]
pub struct Canceller {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

impl Canceller {
    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        let taken = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(taken);
    }
}

/// The observing side of a cancel signal. Cheap to clone.
///
/// Nothing is ever sent on the underlying channel: cancellation is the
/// disconnection of its only sender, which every clone observes at once.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: Receiver<()>,
    // Holds the sender for signals that can never fire.
    _keep: Option<Sender<()>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (tx, rx) = bounded::<()>(0);
        Self { rx, _keep: Some(tx) }
    }

    /// Poll without blocking.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the signal fires.
    pub fn wait(&self) {
        // Only a disconnect can wake this; no values are ever sent.
        let _ = self.rx.recv();
    }
}

/// What a finished producer reports.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Items successfully sent.
    pub emitted: usize,
    /// True if the producer stopped early: the signal fired or the receiver
    /// was dropped.
    pub cancelled: bool,
    /// True if the producer thread panicked. `emitted` is then unknown and
    /// reported as zero.
    pub panicked: bool,
}

/// Visitor that forwards items into a result channel, racing every send
/// against the cancel signal.
pub(crate) struct Emitter<'a, T> {
    out: &'a Sender<T>,
    cancel: &'a CancelSignal,
    emitted: usize,
    stopped: bool,
}

impl<'a, T> Emitter<'a, T> {
    pub(crate) fn new(out: &'a Sender<T>, cancel: &'a CancelSignal) -> Self {
        Self {
            out,
            cancel,
            emitted: 0,
            stopped: false,
        }
    }

    pub(crate) fn finish(self) -> QueryOutcome {
        QueryOutcome {
            emitted: self.emitted,
            cancelled: self.stopped,
            panicked: false,
        }
    }

    fn halt(&mut self) -> bool {
        self.stopped = true;
        false
    }
}

impl<T: Clone> Visitor<T> for Emitter<'_, T> {
    fn visit(&mut self, item: &T) -> bool {
        if self.cancel.is_cancelled() {
            return self.halt();
        }
        crossbeam::channel::select! {
            send(self.out, item.clone()) -> res => match res {
                Ok(()) => {
                    self.emitted += 1;
                    true
                }
                // Receiver dropped: nobody is listening.
                Err(_) => self.halt(),
            },
            recv(self.cancel.rx) -> _ => self.halt(),
        }
    }

    fn descend(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return self.halt();
        }
        true
    }
}
