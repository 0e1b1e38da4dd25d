// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-size spatial hash for coarse proximity sweeps.
//!
//! The table has `size³` cells. A point maps to a cell by scaling each
//! coordinate with a large prime, flooring, and reducing modulo `size`, so
//! distant regions of space share cells. Each object is recorded in the cells
//! of its min corner, center and max corner.
//!
//! [`GridHash::nearest`] is approximate: it sweeps cells in a fixed order and
//! sorts only within each cell. Use it to get "somewhere nearby" quickly, not
//! for exact k-nearest answers.

use core::fmt::Debug;

use log::{debug, trace};

use crate::backend::Backend;
use crate::config::GridHashConfig;
use crate::error::{Error, Result};
use crate::index::Key;
use crate::stream::{Region, VisitFn, Visitor};
use crate::types::{Boundable, Rect3, Vec3, check_bounds};

/// Per-axis multipliers applied before flooring into cell coordinates.
const PRIMES: [f64; 3] = [104_009.0, 194_101.0, 115_561.0];

#[derive(Copy, Clone, Debug)]
struct CellRecord {
    /// Running average at the time the record was added.
    avg_len_sq: f64,
    slot: usize,
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    entry: Option<(Rect3, T)>,
}

/// Spatial hash with `size³` cells and generational keys.
pub struct GridHash<T> {
    size: usize,
    cells: Vec<Vec<CellRecord>>,
    slots: Vec<Slot<T>>,
    free_list: Vec<usize>,
    avg_len_sq: f64,
    len: usize,
}

impl<T> GridHash<T> {
    /// Create an empty table with `size` cells per axis. Fails on `size == 0`.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_config(GridHashConfig { size })
    }

    /// Create an empty table from a validated config.
    pub fn with_config(config: GridHashConfig) -> Result<Self> {
        config.validate()?;
        let size = config.size;
        let cells = size
            .checked_pow(3)
            .ok_or_else(|| Error::InvalidArgument(format!("grid hash size {size} overflows")))?;
        debug!("grid hash: {size}³ = {cells} cells");
        Ok(Self {
            size,
            cells: vec![Vec::new(); cells],
            slots: Vec::new(),
            free_list: Vec::new(),
            avg_len_sq: 0.0,
            len: 0,
        })
    }

    /// Cells per axis.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Running midpoint `(avg + |center|²) / 2` over every add so far.
    pub fn avg_len_sq(&self) -> f64 {
        self.avg_len_sq
    }

    /// Flat cell index `x + size·(y + size·z)` of the cell holding `p`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Floored coordinates saturate into i64 and are reduced into 0..size before widening."
    )]
    pub fn cell_index(&self, p: Vec3) -> usize {
        let n = self.size as i64;
        let coord = |v: f64, prime: f64| ((v * prime).floor() as i64).rem_euclid(n) as usize;
        let x = coord(p.x, PRIMES[0]);
        let y = coord(p.y, PRIMES[1]);
        let z = coord(p.z, PRIMES[2]);
        x + self.size * (y + self.size * z)
    }

    /// Number of records in cell `i`; zero when out of range.
    pub fn cell_len(&self, i: usize) -> usize {
        self.cells.get(i).map_or(0, Vec::len)
    }

    /// Objects recorded in cell `i`, each with the running average of
    /// [`avg_len_sq`](Self::avg_len_sq) as it stood when the object was added.
    pub fn cell_entries(&self, i: usize) -> impl Iterator<Item = (f64, &T)> + '_ {
        self.cells.get(i).into_iter().flatten().filter_map(|r| {
            let (_, item) = self.slots[r.slot].entry.as_ref()?;
            Some((r.avg_len_sq, item))
        })
    }

    /// The live object behind `key`.
    pub fn get(&self, key: Key) -> Option<&T> {
        let slot = self.slots.get(key.idx())?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.entry.as_ref().map(|(_, item)| item)
    }

    /// Remove the object behind `key` from every cell it was recorded in.
    ///
    /// Returns `None` for stale or unknown keys.
    pub fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self.slots.get_mut(key.idx())?;
        if slot.generation != key.generation() {
            return None;
        }
        let (bounds, item) = slot.entry.take()?;
        for cell in self.cells_of(&bounds) {
            self.cells[cell].retain(|r| r.slot != key.idx());
        }
        self.free_list.push(key.idx());
        self.len -= 1;
        trace!("grid hash: removed slot {}", key.idx());
        Some(item)
    }

    /// Drop every object. Keys issued before the call stay invalid.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        for slot in &mut self.slots {
            slot.entry = None;
        }
        self.free_list = (0..self.slots.len()).rev().collect();
        self.avg_len_sq = 0.0;
        self.len = 0;
    }

    /// Call `f` with the cell index of `p + (dx, dy, dz)` for every offset in
    /// `[0, size)³`, `dx` outermost and `dz` innermost. Returns `false` if `f`
    /// stopped the sweep.
    pub fn nearest_cells(&self, p: Vec3, mut f: impl FnMut(usize) -> bool) -> bool {
        for dx in 0..self.size {
            for dy in 0..self.size {
                for dz in 0..self.size {
                    let q = p + Vec3::new(dx as f64, dy as f64, dz as f64);
                    if !f(self.cell_index(q)) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Visit objects cell by cell in [`nearest_cells`](Self::nearest_cells)
    /// order. Inside a cell objects come by ascending squared distance from
    /// `p` to their bounds center; each object is visited at most once.
    ///
    /// Returns how many objects were passed to `f`.
    pub fn nearest(&self, p: Vec3, f: impl FnMut(&T) -> bool) -> usize {
        self.walk_nearest(p, &mut VisitFn(f)).1
    }

    fn walk_nearest(&self, p: Vec3, visitor: &mut dyn Visitor<T>) -> (bool, usize) {
        let mut visited = vec![false; self.slots.len()];
        let mut scratch: Vec<(f64, usize)> = Vec::new();
        let mut emitted = 0;
        let completed = self.nearest_cells(p, |cell| {
            if !visitor.descend() {
                return false;
            }
            scratch.clear();
            scratch.extend(self.cells[cell].iter().filter_map(|r| {
                let (b, _) = self.slots[r.slot].entry.as_ref()?;
                Some((b.center().distance_sq(p), r.slot))
            }));
            scratch.sort_by(|a, b| a.0.total_cmp(&b.0));
            for &(_, slot) in &scratch {
                if visited[slot] {
                    continue;
                }
                visited[slot] = true;
                let Some((_, item)) = &self.slots[slot].entry else {
                    continue;
                };
                emitted += 1;
                if !visitor.visit(item) {
                    return false;
                }
            }
            true
        });
        (completed, emitted)
    }

    fn walk_region(&self, region: &Region, visitor: &mut dyn Visitor<T>) -> bool {
        if !visitor.descend() {
            return false;
        }
        for (b, item) in self.slots.iter().filter_map(|s| s.entry.as_ref()) {
            if region.matches(b) && !visitor.visit(item) {
                return false;
            }
        }
        true
    }

    /// Deduplicated cells of the min corner, center and max corner.
    fn cells_of(&self, b: &Rect3) -> Vec<usize> {
        let mut out = Vec::with_capacity(3);
        for p in [b.min, b.center(), b.max] {
            let cell = self.cell_index(p);
            if !out.contains(&cell) {
                out.push(cell);
            }
        }
        out
    }

    fn alloc(&mut self, entry: (Rect3, T)) -> Result<Key> {
        if let Some(&idx) = self.free_list.last() {
            let generation = self.slots[idx].generation.wrapping_add(1);
            let key = Key::new(idx, generation)?;
            self.free_list.pop();
            self.slots[idx] = Slot {
                generation,
                entry: Some(entry),
            };
            Ok(key)
        } else {
            let key = Key::new(self.slots.len(), 1)?;
            self.slots.push(Slot {
                generation: 1,
                entry: Some(entry),
            });
            Ok(key)
        }
    }
}

impl<T: Boundable> GridHash<T> {
    /// Insert an object, returning a key for [`remove`](Self::remove) and
    /// [`get`](Self::get).
    ///
    /// Fails for empty or non-finite bounds, and with
    /// [`Error::CapacityExhausted`] once slot indices would pass `u32::MAX`.
    pub fn add(&mut self, item: T) -> Result<Key> {
        let bounds = item.bounds();
        check_bounds(&bounds)?;
        let cells = self.cells_of(&bounds);
        let key = self.alloc((bounds, item))?;
        self.avg_len_sq = (self.avg_len_sq + bounds.center().length_sq()) / 2.0;
        let record = CellRecord {
            avg_len_sq: self.avg_len_sq,
            slot: key.idx(),
        };
        for &cell in &cells {
            self.cells[cell].push(record);
        }
        self.len += 1;
        trace!("grid hash: slot {} in cells {cells:?}", key.idx());
        Ok(key)
    }
}

impl<T: Boundable> Backend for GridHash<T> {
    type Item = T;
    type Key = Key;

    fn insert(&mut self, item: T) -> Result<Key> {
        self.add(item)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn depth(&self) -> usize {
        0
    }

    fn visit_region(&self, region: &Region, visitor: &mut dyn Visitor<T>) -> bool {
        self.walk_region(region, visitor)
    }

    fn visit_nearest(&self, point: Vec3, visitor: &mut dyn Visitor<T>) -> bool {
        self.walk_nearest(point, visitor).0
    }
}

impl<T> Debug for GridHash<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let records: usize = self.cells.iter().map(Vec::len).sum();
        f.debug_struct("GridHash")
            .field("size", &self.size)
            .field("len", &self.len)
            .field("records", &records)
            .field("avg_len_sq", &self.avg_len_sq)
            .finish_non_exhaustive()
    }
}
