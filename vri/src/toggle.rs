//! Signal toggle counting.
//!
//! [`Counting`] wraps a register value and, on every assignment, adds the Hamming distance
//! between the old and the new value to an accumulator owned by the calling thread. Thread
//! accumulators are folded into the process-wide [`GLOBAL_TOGGLES`] when the thread exits (or
//! earlier through [`drain`]), so the hot path never touches shared memory.
//!
//! Thread-local destructors of spawned threads have run once the thread has been joined. The
//! thread that performs the final flush has to [`drain`] itself, which
//! [`crate::session::Session::shutdown`] does.

use std::cell::Cell;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

mod private {
    pub trait Sealed {}
}

/// Register widths that can be toggle-counted.
pub trait ToggleWidth:
    private::Sealed + Copy + Default + Eq + Ord + Hash + fmt::Debug + fmt::Display + 'static
{
    const BITS: u32;

    /// Number of bits that differ between `self` and `other`.
    fn toggles(self, other: Self) -> u32;
}

macro_rules! impl_toggle_width {
    ( $( $ty:ty ),* ) => {
        $(
            impl private::Sealed for $ty {}

            impl ToggleWidth for $ty {
                const BITS: u32 = <$ty>::BITS;

                #[inline(always)]
                fn toggles(self, other: Self) -> u32 {
                    (self ^ other).count_ones()
                }
            }

            impl From<Counting<$ty>> for $ty {
                fn from(value: Counting<$ty>) -> Self {
                    value.get()
                }
            }
        )*
    };
}

impl_toggle_width!(u8, u16, u32, u64);

/// Process-wide toggle total. Only written when a thread accumulator is folded.
#[derive(Debug, Default)]
pub struct GlobalAccumulator {
    value: AtomicU64,
}

impl GlobalAccumulator {
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn fold(&self, value: u64) {
        if value != 0 {
            self.value.fetch_add(value, Ordering::AcqRel);
        }
    }

    pub fn total(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

pub static GLOBAL_TOGGLES: GlobalAccumulator = GlobalAccumulator::new();

/// Toggle total of a single thread, folded into its [`GlobalAccumulator`] when dropped.
#[derive(Debug)]
pub struct ThreadAccumulator {
    value: Cell<u64>,
    global: &'static GlobalAccumulator,
}

impl ThreadAccumulator {
    pub fn new(global: &'static GlobalAccumulator) -> Self {
        Self {
            value: Cell::new(0),
            global,
        }
    }

    #[inline(always)]
    pub fn add(&self, distance: u64) {
        self.value.set(self.value.get().wrapping_add(distance));
    }

    pub fn value(&self) -> u64 {
        self.value.get()
    }

    /// Moves the current value into the global accumulator and returns it.
    pub fn drain(&self) -> u64 {
        let value = self.value.replace(0);
        self.global.fold(value);
        value
    }
}

impl Drop for ThreadAccumulator {
    fn drop(&mut self) {
        self.drain();
    }
}

thread_local! {
    static THREAD_TOGGLES: ThreadAccumulator = ThreadAccumulator::new(&GLOBAL_TOGGLES);
}

/// Adds `distance` toggles to the calling thread's accumulator.
#[inline]
pub fn add_toggles(distance: u64) {
    if THREAD_TOGGLES.try_with(|acc| acc.add(distance)).is_err() {
        // the accumulator of this thread was already folded
        GLOBAL_TOGGLES.fold(distance);
    }
}

/// Folds the calling thread's accumulator into [`GLOBAL_TOGGLES`] and returns what was moved.
pub fn drain() -> u64 {
    THREAD_TOGGLES
        .try_with(ThreadAccumulator::drain)
        .unwrap_or(0)
}

/// Toggles recorded by the calling thread that were not folded yet.
pub fn thread_total() -> u64 {
    THREAD_TOGGLES
        .try_with(ThreadAccumulator::value)
        .unwrap_or(0)
}

/// Toggles folded into the process-wide total so far.
pub fn global_total() -> u64 {
    GLOBAL_TOGGLES.total()
}

/// A register value that counts the bits flipped by every assignment.
///
/// Reads have no side effect. Only [`Counting::set`] and [`Counting::update`] are counted
/// assignments: replacing the whole wrapper with `=` (from `Counting::new` or another counted
/// value) and copies are not counted, so generated code must assign through `set`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Counting<T: ToggleWidth> {
    data: T,
}

impl<T: ToggleWidth> Counting<T> {
    pub const fn new(value: T) -> Self {
        Self { data: value }
    }

    #[inline(always)]
    pub fn get(&self) -> T {
        self.data
    }

    /// Assigns `value`, returning the number of toggled bits that were recorded.
    #[inline]
    pub fn set(&mut self, value: T) -> u32 {
        let distance = self.data.toggles(value);
        add_toggles(u64::from(distance));
        self.data = value;
        distance
    }

    /// Assigns `f(current)`.
    #[inline]
    pub fn update<F>(&mut self, f: F) -> u32
    where
        F: FnOnce(T) -> T,
    {
        self.set(f(self.data))
    }
}

impl<T: ToggleWidth> From<T> for Counting<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ToggleWidth> PartialEq<T> for Counting<T> {
    fn eq(&self, other: &T) -> bool {
        self.data == *other
    }
}

impl<T: ToggleWidth> fmt::Debug for Counting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.data, f)
    }
}

impl<T: ToggleWidth> fmt::Display for Counting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.data, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_distance<T: ToggleWidth>(old: T, new: T, expected: u32) {
        let mut value = Counting::new(old);
        let before = thread_total();

        assert_eq!(value.set(new), expected, "{} -> {}", old, new);
        assert_eq!(thread_total() - before, u64::from(expected));
        assert_eq!(value, new);
    }

    #[test]
    fn test_distance_per_width() {
        assert_distance(0u8, 0xffu8, 8);
        assert_distance(0b1010u8, 0b0101u8, 4);
        assert_distance(0x00ffu16, 0xff00u16, 16);
        assert_distance(0x8000u16, 0x8001u16, 1);
        assert_distance(0u32, 0xffff_ffffu32, 32);
        assert_distance(0xf0f0_f0f0u32, 0x0f0f_0f0fu32, 32);
        assert_distance(u64::MAX, 0u64, 64);
        assert_distance(1u64 << 63, 1u64, 2);
    }

    #[test]
    fn test_same_value_is_free() {
        assert_distance(0x5au8, 0x5au8, 0);
        assert_distance(0xdead_beefu32, 0xdead_beefu32, 0);
        assert_distance(u64::MAX, u64::MAX, 0);
    }

    #[test]
    fn test_reads_do_not_count() {
        let value = Counting::new(0xabcdu16);
        let before = thread_total();

        let raw: u16 = value.into();
        assert_eq!(raw, 0xabcd);
        assert_eq!(value.get(), 0xabcd);
        assert_eq!(format!("{}", value), "43981");
        assert_eq!(format!("{:?}", value), "43981");

        let copy = value;
        assert_eq!(copy, value);
        assert_eq!(thread_total(), before);
    }

    #[test]
    fn test_sequence_of_assignments() {
        let mut value = Counting::<u8>::default();
        let before = thread_total();

        value.set(1); // 1
        value.set(3); // 1
        value.set(0); // 2
        value.update(|v| v.wrapping_sub(1)); // 8

        assert_eq!(value, 0xffu8);
        assert_eq!(thread_total() - before, 12);
    }

    #[test]
    fn test_replacing_the_wrapper_is_not_counted() {
        let mut value = Counting::new(0u32);
        let before = thread_total();

        value = Counting::new(u32::MAX);
        assert_eq!(value, u32::MAX);
        let other = Counting::new(0x0f0fu32);
        value = other;
        assert_eq!(value, 0x0f0fu32);
        assert_eq!(thread_total(), before);

        value.set(0);
        assert_eq!(thread_total() - before, 8);
    }

    #[test]
    fn test_thread_accumulator_folds_on_drop() {
        static GLOBAL: GlobalAccumulator = GlobalAccumulator::new();

        let acc = ThreadAccumulator::new(&GLOBAL);
        acc.add(7);
        acc.add(35);
        assert_eq!(acc.value(), 42);
        assert_eq!(GLOBAL.total(), 0);

        drop(acc);
        assert_eq!(GLOBAL.total(), 42);
    }

    #[test]
    fn test_drain_does_not_double_count() {
        static GLOBAL: GlobalAccumulator = GlobalAccumulator::new();

        let acc = ThreadAccumulator::new(&GLOBAL);
        acc.add(5);
        assert_eq!(acc.drain(), 5);
        assert_eq!(acc.value(), 0);
        assert_eq!(acc.drain(), 0);

        acc.add(1);
        drop(acc);
        assert_eq!(GLOBAL.total(), 6);
    }

    #[test]
    fn test_global_accumulator_from_threads() {
        static GLOBAL: GlobalAccumulator = GlobalAccumulator::new();

        let handles: Vec<_> = (1..=8u64)
            .map(|n| {
                std::thread::spawn(move || {
                    let acc = ThreadAccumulator::new(&GLOBAL);
                    for _ in 0..100 {
                        acc.add(n);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(GLOBAL.total(), 100 * (1..=8).sum::<u64>());
    }
}
