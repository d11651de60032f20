//! Edge-coverage bitmap.
//!
//! Every instrumentation point reported by the simulation is combined with the previously
//! reported one into an offset in a fixed map of 8-bit hit counters. The map is shared by all
//! threads of the process and updated without synchronization: the counters are atomics so the
//! updates are well-defined, but increments are plain relaxed load/store pairs and concurrent
//! callers can lose hits. Hosts that need exact counts must serialize their calls.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use log::warn;

pub const MAP_SIZE_LOG2: u32 = 16;
/// Number of counters in the map.
pub const MAP_SIZE: usize = 1 << MAP_SIZE_LOG2;
pub const MAP_MASK: u64 = (MAP_SIZE - 1) as u64;
/// Size of the map after [`CoverageMap::compress`].
pub const COMPRESSED_MAP_SIZE: usize = MAP_SIZE / 2;

/// Nibble written by [`CoverageMap::compress`] for a counter that was never hit.
pub const NOT_HIT: u8 = 0x0f;

/// Offset of the transition `previous -> current` in the map.
///
/// The previous location is shifted so that `a -> b` and `b -> a` land in different buckets,
/// and so that `a -> a` does not always land in bucket zero.
#[inline(always)]
pub const fn edge_offset(current: u64, previous: u64) -> usize {
    ((current ^ (previous >> 1)) & MAP_MASK) as usize
}

/// Coarse magnitude class of a hit counter, as stored in one nibble of the compressed map.
#[inline]
pub const fn bucket_class(count: u8) -> u8 {
    if count == 0 {
        NOT_HIT
    } else {
        count.leading_zeros() as u8
    }
}

pub struct CoverageMap {
    buckets: Box<[AtomicU8]>,
    previous_location: AtomicU64,
    compressed: AtomicBool,
}

impl Default for CoverageMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CoverageMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageMap")
            .field("previous_location", &self.previous_location())
            .field("compressed", &self.is_compressed())
            .field("hit_buckets", &self.view().iter().filter(|b| *b != 0).count())
            .finish()
    }
}

impl CoverageMap {
    pub fn new() -> Self {
        Self {
            buckets: (0..MAP_SIZE).map(|_| AtomicU8::new(0)).collect(),
            previous_location: AtomicU64::new(0),
            compressed: AtomicBool::new(false),
        }
    }

    /// Records that execution reached `location` coming from the previously recorded location.
    ///
    /// Counters wrap on overflow: 256 hits of the same edge read as zero.
    #[inline]
    pub fn record_transition(&self, location: u64) {
        let previous = self.previous_location.load(Ordering::Relaxed);
        let offset = edge_offset(location, previous);
        self.previous_location.store(location, Ordering::Relaxed);

        // `offset` is masked into range
        let bucket = &self.buckets[offset];
        bucket.store(
            bucket.load(Ordering::Relaxed).wrapping_add(1),
            Ordering::Relaxed,
        );
    }

    pub fn bucket(&self, index: usize) -> u8 {
        self.buckets[index].load(Ordering::Relaxed)
    }

    pub fn previous_location(&self) -> u64 {
        self.previous_location.load(Ordering::Relaxed)
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed.load(Ordering::Acquire)
    }

    /// Halves the map in place, replacing every pair of counters `(a, b)` by the byte
    /// `bucket_class(a) << 4 | bucket_class(b)`.
    ///
    /// Only meant to be called once, after the simulation stopped recording. Compressing is
    /// not idempotent, so a repeated call leaves the map untouched and returns the existing
    /// compressed view. Transitions recorded afterwards land in the overwritten buffer and
    /// have no meaningful interpretation.
    pub fn compress(&self) -> MapView<'_> {
        if self.compressed.swap(true, Ordering::AcqRel) {
            warn!("Coverage map is already compressed, not compressing it again");
            return self.view();
        }

        // Pair `i` reads from `2i` and `2i + 1`, which are never below `i`, so walking upwards
        // never reads a slot that was already overwritten.
        for i in 0..COMPRESSED_MAP_SIZE {
            let high = bucket_class(self.bucket(2 * i));
            let low = bucket_class(self.bucket(2 * i + 1));
            self.buckets[i].store((high << 4) | low, Ordering::Relaxed);
        }

        self.view()
    }

    /// The bytes that are persisted for this map: all counters, or the first half once
    /// compressed.
    pub fn view(&self) -> MapView<'_> {
        let len = if self.is_compressed() {
            COMPRESSED_MAP_SIZE
        } else {
            MAP_SIZE
        };

        MapView {
            buckets: &self.buckets[..len],
        }
    }
}

/// Borrowed, read-only view into a [`CoverageMap`].
#[derive(Clone, Copy)]
pub struct MapView<'a> {
    buckets: &'a [AtomicU8],
}

impl<'a> MapView<'a> {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.buckets.get(index).map(|b| b.load(Ordering::Relaxed))
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + 'a {
        self.buckets.iter().map(|b| b.load(Ordering::Relaxed))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl std::fmt::Debug for MapView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MapView({} bytes)", self.len())
    }
}
