// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thread-safe handle over any [`Backend`], with streaming producers.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender, bounded};
use log::{debug, trace};

use crate::backend::Backend;
use crate::backends::{GridHash, Octree, RTree};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::stream::{
    CancelSignal, Canceller, Emitter, QueryOutcome, Region, VisitFn, Visitor, cancel_pair,
};
use crate::types::{Boundable, Vec3};

/// Generational handle for grid hash entries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(u32, u32);

impl Key {
    /// Key for slot `idx`. Fails once slot indices no longer fit in 32 bits.
    pub(crate) fn new(idx: usize, generation: u32) -> Result<Self> {
        let idx = u32::try_from(idx)
            .map_err(|_| Error::CapacityExhausted(format!("slot index {idx} exceeds u32::MAX")))?;
        Ok(Self(idx, generation))
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

/// Join handle of a streaming producer thread.
#[derive(Debug)]
pub struct QueryHandle(JoinHandle<QueryOutcome>);

impl QueryHandle {
    /// Wait for the producer to finish.
    ///
    /// A producer that panicked reports [`QueryOutcome::panicked`] with
    /// nothing emitted.
    pub fn join(self) -> QueryOutcome {
        self.0.join().unwrap_or(QueryOutcome {
            emitted: 0,
            cancelled: false,
            panicked: true,
        })
    }

    /// Whether the producer has exited.
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

/// A cloneable, thread-safe handle to a spatial index.
///
/// Writers take an exclusive lock for the duration of one insertion; queries
/// hold a shared lock for the duration of their traversal. Streaming queries
/// run on their own thread and deliver results through a bounded channel.
///
/// A panic while a lock is held does not make the index unusable: every
/// mutation validates its input before touching the structure, so the data
/// behind a poisoned lock is still consistent.
#[derive(Debug)]
pub struct SharedIndex<B> {
    inner: Arc<RwLock<B>>,
    stream: StreamConfig,
}

impl<B> Clone for SharedIndex<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            stream: self.stream,
        }
    }
}

/// A shared [`Octree`].
pub type SharedOctree<T> = SharedIndex<Octree<T>>;
/// A shared [`RTree`].
pub type SharedRTree<T> = SharedIndex<RTree<T>>;
/// A shared [`GridHash`].
pub type SharedGridHash<T> = SharedIndex<GridHash<T>>;

fn read_lock<B>(lock: &RwLock<B>) -> RwLockReadGuard<'_, B> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

impl<B: Backend> SharedIndex<B> {
    /// Share `backend`, with default streaming settings.
    pub fn new(backend: B) -> Self {
        Self::with_stream_config(backend, StreamConfig::default())
    }

    /// Share `backend` with explicit streaming settings.
    pub fn with_stream_config(backend: B, stream: StreamConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(backend)),
            stream,
        }
    }

    /// Streaming settings.
    pub fn stream_config(&self) -> StreamConfig {
        self.stream
    }

    /// Insert an object under the write lock.
    pub fn add(&self, item: B::Item) -> Result<B::Key> {
        self.write().insert(item)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove every object.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Shared access to the backend for synchronous work.
    ///
    /// Writers block while the guard is alive.
    pub fn read(&self) -> RwLockReadGuard<'_, B> {
        read_lock(&self.inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, B> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Visit objects matching `region` on the calling thread.
    pub fn visit(&self, region: &Region, f: impl FnMut(&B::Item) -> bool) -> bool {
        self.read().visit_region(region, &mut VisitFn(f))
    }

    /// Visit objects nearest-first on the calling thread, under the read lock.
    pub fn nearest(&self, point: Vec3, f: impl FnMut(&B::Item) -> bool) -> bool {
        self.read().visit_nearest(point, &mut VisitFn(f))
    }
}

impl<B> SharedIndex<B>
where
    B: Backend + Send + Sync + 'static,
    B::Item: Clone + Send + 'static,
{
    /// Stream every object matching `region` into `out` from a new thread.
    ///
    /// The producer holds the read lock for the whole traversal, checks
    /// `cancel` between nodes and races every send against it, and drops
    /// `out` when done. The channel closes once the caller's own sender
    /// clones are gone too.
    pub fn query(&self, region: Region, out: Sender<B::Item>, cancel: CancelSignal) -> QueryHandle {
        self.spawn_producer(out, cancel, move |backend, visitor| {
            backend.visit_region(&region, visitor)
        })
    }

    /// Stream objects nearest-first into `out` from a new thread.
    pub fn nearest_stream(
        &self,
        point: Vec3,
        out: Sender<B::Item>,
        cancel: CancelSignal,
    ) -> QueryHandle {
        self.spawn_producer(out, cancel, move |backend, visitor| {
            backend.visit_nearest(point, visitor)
        })
    }

    /// Start a region query on a fresh channel of the configured capacity.
    ///
    /// Drop the receiver or call [`Canceller::cancel`] to stop early.
    pub fn query_channel(&self, region: Region) -> (Receiver<B::Item>, Canceller, QueryHandle) {
        let (tx, rx) = bounded(self.stream.capacity);
        let (canceller, signal) = cancel_pair();
        let handle = self.query(region, tx, signal);
        (rx, canceller, handle)
    }

    fn spawn_producer<F>(&self, out: Sender<B::Item>, cancel: CancelSignal, walk: F) -> QueryHandle
    where
        F: FnOnce(&B, &mut dyn Visitor<B::Item>) -> bool + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        QueryHandle(thread::spawn(move || {
            let guard = read_lock(&inner);
            let mut emitter = Emitter::new(&out, &cancel);
            let completed = walk(&guard, &mut emitter);
            drop(guard);
            let outcome = emitter.finish();
            if completed {
                trace!("query finished after {} items", outcome.emitted);
            } else {
                debug!("query stopped early after {} items", outcome.emitted);
            }
            outcome
        }))
    }
}

impl<T: Boundable> SharedIndex<GridHash<T>> {
    /// Remove the object behind `key`. Stale keys return `None`.
    pub fn remove(&self, key: Key) -> Option<T> {
        self.write().remove(key)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::testing::{brute_force, random_boxes, sorted, world};
    use crate::types::Rect3;

    fn cube(lo: f64, hi: f64) -> Rect3 {
        Rect3::new(Vec3::splat(lo), Vec3::splat(hi))
    }

    fn stream_all<B>(index: &SharedIndex<B>, region: Region) -> (Vec<Rect3>, QueryOutcome)
    where
        B: Backend<Item = Rect3> + Send + Sync + 'static,
    {
        let (rx, _canceller, handle) = index.query_channel(region);
        let got: Vec<Rect3> = rx.iter().collect();
        (got, handle.join())
    }

    #[test]
    fn octree_single_object_stream() {
        let index = SharedIndex::new(Octree::new(cube(0.0, 100.0)).expect("valid root"));
        let a = cube(1.0, 2.0);
        index.add(a).expect("inside root");
        let (got, outcome) = stream_all(&index, Region::Intersecting(cube(0.0, 3.0)));
        assert_eq!(got, vec![a]);
        assert_eq!(
            outcome,
            QueryOutcome {
                emitted: 1,
                cancelled: false,
                panicked: false,
            }
        );
    }

    #[test]
    fn out_of_domain_add_through_the_handle() {
        let index = SharedIndex::new(Octree::new(cube(0.0, 100.0)).expect("valid root"));
        index.add(cube(1.0, 2.0)).expect("inside root");
        assert!(matches!(
            index.add(cube(99.0, 101.0)),
            Err(Error::OutOfDomain { .. })
        ));
        assert_eq!(index.len(), 1);
    }

    type Indices = (
        SharedOctree<Rect3>,
        SharedRTree<Rect3>,
        SharedGridHash<Rect3>,
    );

    fn every_index(boxes: &[Rect3]) -> Indices {
        let octree = SharedIndex::new(Octree::new(world()).expect("valid root"));
        let rtree = SharedIndex::new(RTree::default());
        let grid = SharedIndex::new(GridHash::new(8).expect("valid size"));
        for b in boxes {
            octree.add(*b).expect("inside world");
            rtree.add(*b).expect("valid bounds");
            grid.add(*b).expect("valid bounds");
        }
        (octree, rtree, grid)
    }

    #[test]
    fn every_backend_streams_each_match_exactly_once() {
        let boxes = random_boxes(42, 5_000);
        let (octree, rtree, grid) = every_index(&boxes);

        let everything = Region::Intersecting(world());
        let (o, _) = stream_all(&octree, everything.clone());
        let (r, _) = stream_all(&rtree, everything.clone());
        let (g, _) = stream_all(&grid, everything);
        let expected = sorted(boxes.clone());
        assert_eq!(sorted(o), expected);
        assert_eq!(sorted(r), expected);
        assert_eq!(sorted(g), expected);

        let window = Region::Intersecting(Rect3::new(
            Vec3::new(-120.0, 0.0, -300.0),
            Vec3::new(80.0, 260.0, 10.0),
        ));
        let expected = brute_force(&boxes, &window);
        assert!(!expected.is_empty());
        assert_eq!(sorted(stream_all(&octree, window.clone()).0), expected);
        assert_eq!(sorted(stream_all(&rtree, window.clone()).0), expected);
        assert_eq!(sorted(stream_all(&grid, window).0), expected);
    }

    #[test]
    fn spheres_and_combinators_stream_like_a_linear_scan() {
        let boxes = random_boxes(7, 5_000);
        let (octree, rtree, grid) = every_index(&boxes);
        let center = Vec3::new(40.0, -60.0, 25.0);
        let cut = Rect3::new(Vec3::new(-200.0, -200.0, -50.0), Vec3::new(150.0, 100.0, 300.0));
        let shapes = [
            Region::IntersectingSphere {
                center,
                radius: 180.0,
            },
            Region::WithinSphere {
                center,
                radius: 220.0,
            },
            !Region::Intersecting(cut),
            Region::WithinSphere {
                center,
                radius: 300.0,
            } & !Region::Within(cut),
            !Region::IntersectingSphere {
                center,
                radius: 120.0,
            } & Region::Intersecting(cut),
        ];
        for shape in shapes {
            let expected = brute_force(&boxes, &shape);
            assert!(!expected.is_empty(), "{shape:?} matches nothing");
            assert_eq!(sorted(stream_all(&octree, shape.clone()).0), expected, "octree {shape:?}");
            assert_eq!(sorted(stream_all(&rtree, shape.clone()).0), expected, "rtree {shape:?}");
            assert_eq!(sorted(stream_all(&grid, shape.clone()).0), expected, "grid {shape:?}");
        }
    }

    #[test]
    fn tiny_boxes_stream_exactly_once() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut corner = || {
            Vec3::new(
                rng.random_range(-0.1..0.1),
                rng.random_range(-0.1..0.1),
                rng.random_range(-0.1..0.1),
            )
        };
        let domain = Rect3::new(Vec3::splat(-0.1), Vec3::splat(0.1));
        let index = SharedIndex::new(RTree::default());
        let mut boxes = Vec::with_capacity(5_000);
        while boxes.len() < 5_000 {
            let (a, b) = (corner(), corner());
            let r = Rect3::new(a.min(b), a.max(b));
            if r.is_empty() {
                continue;
            }
            index.add(r).expect("valid bounds");
            boxes.push(r);
        }

        let (tx, rx) = bounded(16);
        let handle = index.query(Region::Intersecting(domain), tx, CancelSignal::never());
        let got: Vec<Rect3> = rx.iter().collect();
        assert_eq!(got.len(), 5_000);
        assert_eq!(sorted(got), sorted(boxes));
        let outcome = handle.join();
        assert_eq!(outcome.emitted, 5_000);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn cancellation_stops_the_producer_promptly() {
        let index = SharedIndex::new(Octree::new(world()).expect("valid root"));
        for b in random_boxes(5, 100_000) {
            index.add(b).expect("inside world");
        }
        let depth = index.read().depth();
        let (rx, canceller, handle) = index.query_channel(Region::Intersecting(world()));
        for _ in 0..10 {
            rx.recv().expect("producer is streaming");
        }
        canceller.cancel();
        let outcome = handle.join();
        assert!(outcome.cancelled);
        assert!(outcome.emitted < 100_000);
        let further = rx.iter().count();
        assert!(
            further <= 10 + depth,
            "{further} items after cancel at depth {depth}"
        );
    }

    #[test]
    fn cancellation_with_a_large_buffer_is_bounded_by_capacity() {
        let config = StreamConfig { capacity: 64 };
        let index = SharedIndex::with_stream_config(RTree::default(), config);
        for i in 0..100_000 {
            let x = f64::from(i % 100) * 2.0;
            let y = f64::from((i / 100) % 100) * 2.0;
            let z = f64::from(i / 10_000) * 2.0;
            index
                .add(Rect3::new(Vec3::new(x, y, z), Vec3::new(x + 1.0, y + 1.0, z + 1.0)))
                .expect("valid bounds");
        }
        let (rx, canceller, handle) = index.query_channel(Region::Intersecting(cube(-1.0, 1_000.0)));
        for _ in 0..10 {
            rx.recv().expect("producer is streaming");
        }
        canceller.cancel();
        assert!(handle.join().cancelled);
        let further = rx.iter().count();
        assert!(further <= config.capacity + 1, "{further} items after cancel");
    }

    #[test]
    fn dropping_the_receiver_ends_the_query() {
        let index = SharedIndex::new(RTree::default());
        for b in random_boxes(1, 2_000) {
            index.add(b).expect("valid bounds");
        }
        let (rx, _canceller, handle) = index.query_channel(Region::Intersecting(world()));
        assert!(rx.recv().is_ok());
        drop(rx);
        let outcome = handle.join();
        assert!(outcome.cancelled);
        assert!(outcome.emitted < 2_000);
        // The read lock is released; writers proceed.
        index.add(cube(0.0, 1.0)).expect("valid bounds");
    }

    #[test]
    fn writers_wait_for_streaming_readers() {
        let index = SharedIndex::new(Octree::new(world()).expect("valid root"));
        for b in random_boxes(8, 500) {
            index.add(b).expect("inside world");
        }
        let (tx, rx) = bounded(1);
        let handle = index.query(Region::Intersecting(world()), tx, CancelSignal::never());
        // The producer is parked on the full channel holding the read lock.
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

        let writer = {
            let index = index.clone();
            thread::spawn(move || index.add(cube(0.0, 1.0)))
        };
        let drained = rx.iter().count();
        assert_eq!(drained + 1, 500, "snapshot excludes the concurrent add");
        assert!(writer.join().expect("writer thread").is_ok());
        assert_eq!(handle.join().emitted, 500);
        assert_eq!(index.len(), 501);
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let index = SharedIndex::new(RTree::new(4, 8).expect("valid fanout"));
        let boxes = random_boxes(99, 4_000);
        let writers: Vec<_> = boxes
            .chunks(1_000)
            .map(|chunk| {
                let index = index.clone();
                let chunk = chunk.to_vec();
                thread::spawn(move || {
                    for b in chunk {
                        index.add(b).expect("valid bounds");
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = index.clone();
                thread::spawn(move || {
                    let (rx, _c, handle) = index.query_channel(Region::Intersecting(world()));
                    let received = rx.iter().count();
                    let outcome = handle.join();
                    assert!(!outcome.cancelled);
                    assert_eq!(outcome.emitted, received);
                    assert!(received <= 4_000);
                })
            })
            .collect();
        for w in writers {
            w.join().expect("writer");
        }
        for r in readers {
            r.join().expect("reader");
        }
        assert_eq!(index.len(), 4_000);
    }

    #[test]
    fn nearest_stream_matches_synchronous_nearest() {
        let index = SharedIndex::new(Octree::new(world()).expect("valid root"));
        for b in random_boxes(31, 1_000) {
            index.add(b).expect("inside world");
        }
        let p = Vec3::new(5.0, 5.0, 5.0);
        let mut sync = Vec::new();
        assert!(!index.nearest(p, |b| {
            sync.push(*b);
            sync.len() < 25
        }));

        let (tx, rx) = bounded(8);
        let (canceller, signal) = cancel_pair();
        let handle = index.nearest_stream(p, tx, signal);
        let streamed: Vec<Rect3> = rx.iter().take(25).collect();
        canceller.cancel();
        drop(rx);
        assert!(handle.join().cancelled);
        assert_eq!(streamed, sync);
    }

    #[test]
    fn grid_remove_through_the_handle() {
        let index = SharedIndex::new(GridHash::new(4).expect("valid size"));
        let key = index.add(cube(0.0, 1.0)).expect("valid bounds");
        assert_eq!(index.remove(key), Some(cube(0.0, 1.0)));
        assert_eq!(index.remove(key), None);
        assert!(index.is_empty());
    }

    #[test]
    fn panicking_visitor_does_not_poison_the_index() {
        let index = SharedIndex::new(RTree::default());
        index.add(cube(0.0, 1.0)).expect("valid bounds");
        let shared = index.clone();
        let result = thread::spawn(move || {
            shared.visit(&Region::Intersecting(world()), |_| panic!("visitor failure"))
        })
        .join();
        assert!(result.is_err());
        index.add(cube(2.0, 3.0)).expect("lock recovered");
        assert_eq!(index.len(), 2);
        index.clear();
        assert!(index.is_empty());
    }

    #[derive(Debug)]
    struct Brittle(Rect3);

    impl Clone for Brittle {
        fn clone(&self) -> Self {
            panic!("clone failure");
        }
    }

    impl Boundable for Brittle {
        fn bounds(&self) -> Rect3 {
            self.0
        }
    }

    #[test]
    fn producer_panic_is_not_a_cancellation() {
        let index = SharedIndex::new(RTree::default());
        index.add(Brittle(cube(0.0, 1.0))).expect("valid bounds");
        let (rx, _canceller, handle) = index.query_channel(Region::Intersecting(world()));
        assert_eq!(rx.iter().count(), 0);
        let outcome = handle.join();
        assert!(outcome.panicked);
        assert!(!outcome.cancelled);
        index.add(Brittle(cube(2.0, 3.0))).expect("lock still usable");
        assert_eq!(index.len(), 2);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn slot_indices_past_u32_are_rejected() {
        let last = usize::try_from(u32::MAX).expect("fits in a 64-bit usize");
        assert_eq!(Key::new(last, 3).map(Key::idx), Ok(last));
        assert!(matches!(
            Key::new(last + 1, 1),
            Err(Error::CapacityExhausted(_))
        ));
    }
}
