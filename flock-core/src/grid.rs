use crate::{error::FlockError, types::SlotIndex};
use glam::{IVec3, Vec3};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Odd multipliers for the cell hash.
pub const HASH_PRIMES: [i32; 3] = [73_856_093, 19_349_663, 83_492_791];

const MIN_BUCKETS: usize = 16;
const NEIGHBORHOOD_CELLS: usize = 27;

/// Integer cell coordinate containing `position`.
#[inline]
pub fn cell_of(position: Vec3, cell_size: f32) -> IVec3 {
    (position / cell_size).floor().as_ivec3()
}

/// Hashes a cell coordinate with `x*P1 ^ y*P2 ^ z*P3` (wrapping).
///
/// Distinct cells may collide. Collisions only cost extra distance checks
/// because every candidate is re-tested against the exact radius.
#[inline]
pub fn bucket_hash(cell: IVec3) -> u32 {
    let h = cell.x.wrapping_mul(HASH_PRIMES[0])
        ^ cell.y.wrapping_mul(HASH_PRIMES[1])
        ^ cell.z.wrapping_mul(HASH_PRIMES[2]);
    h as u32
}

/// A uniform 3-D spatial hash over the positions of one snapshot.
///
/// Entries are stored bucket-contiguously: bucket `b` owns
/// `entries[starts[b]..starts[b + 1]]`. The structure is immutable once
/// built, so any number of threads may query it at once.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    cell_size: f32,
    mask: usize,
    starts: Vec<usize>,
    entries: Vec<SlotIndex>,
}

impl SpatialHashGrid {
    /// Buckets every position into exactly one hash bucket.
    ///
    /// The build runs in three passes:
    ///
    /// 1. Bucket ids are computed for all positions in parallel.
    /// 2. Bucket sizes are counted with atomic increments, then turned into
    ///    start offsets by a serial prefix sum.
    /// 3. Each position claims a slot in its bucket through an atomic cursor
    ///    and writes its index there.
    ///
    /// Order within a bucket depends on thread scheduling and carries no
    /// meaning.
    ///
    /// ### Parameters
    /// - `positions` - Agent positions, indexed by [`SlotIndex`].
    /// - `cell_size` - Edge length of one grid cell.
    ///
    /// ### Returns
    /// The built grid, or [`FlockError::InvalidConfig`] when `cell_size` is
    /// not a positive finite number.
    pub fn build(positions: &[Vec3], cell_size: f32) -> Result<Self, FlockError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(FlockError::InvalidConfig("cell_size must be positive"));
        }

        let bucket_count = (positions.len() * 2).next_power_of_two().max(MIN_BUCKETS);
        let mask = bucket_count - 1;

        let keys: Vec<usize> = positions
            .par_iter()
            .map(|&p| bucket_hash(cell_of(p, cell_size)) as usize & mask)
            .collect();

        let counts: Vec<AtomicUsize> = (0..bucket_count).map(|_| AtomicUsize::new(0)).collect();
        keys.par_iter().for_each(|&k| {
            counts[k].fetch_add(1, Ordering::Relaxed);
        });

        let mut starts = Vec::with_capacity(bucket_count + 1);
        let mut total = 0;
        for count in counts {
            starts.push(total);
            total += count.into_inner();
        }
        starts.push(total);

        let cursors: Vec<AtomicUsize> = starts[..bucket_count]
            .iter()
            .map(|&s| AtomicUsize::new(s))
            .collect();
        let slots: Vec<AtomicUsize> = (0..positions.len()).map(|_| AtomicUsize::new(0)).collect();
        keys.par_iter().enumerate().for_each(|(slot, &k)| {
            let at = cursors[k].fetch_add(1, Ordering::Relaxed);
            slots[at].store(slot, Ordering::Relaxed);
        });

        Ok(Self {
            cell_size,
            mask,
            starts,
            entries: slots.into_iter().map(AtomicUsize::into_inner).collect(),
        })
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of indexed positions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.mask + 1
    }

    /// Number of buckets holding at least one entry.
    pub fn occupied_buckets(&self) -> usize {
        self.starts.windows(2).filter(|w| w[1] > w[0]).count()
    }

    /// Bucket id a position falls into.
    #[inline]
    pub fn bucket_of(&self, position: Vec3) -> usize {
        bucket_hash(cell_of(position, self.cell_size)) as usize & self.mask
    }

    #[inline]
    pub fn bucket(&self, bucket: usize) -> &[SlotIndex] {
        &self.entries[self.starts[bucket]..self.starts[bucket + 1]]
    }

    /// Iterates over every entry stored in the 3x3x3 cells around
    /// `position`.
    ///
    /// Buckets shared by several of the 27 cells are visited once, so no
    /// entry is yielded twice. The caller still has to skip the querying
    /// agent and apply the exact radius test.
    pub fn neighbors_of(&self, position: Vec3) -> Neighborhood<'_> {
        let center = cell_of(position, self.cell_size);
        let mut buckets = [0usize; NEIGHBORHOOD_CELLS];
        let mut len = 0;

        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let cell = center.wrapping_add(IVec3::new(dx, dy, dz));
                    let bucket = bucket_hash(cell) as usize & self.mask;
                    if !buckets[..len].contains(&bucket) {
                        buckets[len] = bucket;
                        len += 1;
                    }
                }
            }
        }

        Neighborhood {
            grid: self,
            buckets,
            len,
            next: 0,
            current: &[],
        }
    }
}

/// Iterator returned by [`SpatialHashGrid::neighbors_of`].
pub struct Neighborhood<'a> {
    grid: &'a SpatialHashGrid,
    buckets: [usize; NEIGHBORHOOD_CELLS],
    len: usize,
    next: usize,
    current: &'a [SlotIndex],
}

impl Iterator for Neighborhood<'_> {
    type Item = SlotIndex;

    fn next(&mut self) -> Option<SlotIndex> {
        loop {
            if let Some((&slot, rest)) = self.current.split_first() {
                self.current = rest;
                return Some(slot);
            }
            if self.next >= self.len {
                return None;
            }
            self.current = self.grid.bucket(self.buckets[self.next]);
            self.next += 1;
        }
    }
}
