// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A lock-free atomic wrapper over integer and floating-point values.

use std::fmt;
use std::sync::atomic::{
    AtomicI32, AtomicI64, AtomicIsize, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};

mod sealed {
    pub trait Sealed {}
}

/// A value type that can be stored in an [`Atomic`].
///
/// This trait is sealed: it is implemented for `i32`, `i64`, `isize`, `u32`,
/// `u64`, `usize`, `f32` and `f64`.
pub trait AtomicValue: Copy + fmt::Debug + sealed::Sealed {
    /// Underlying atomic storage.
    #[doc(hidden)]
    type Storage: Send + Sync;

    /// The additive identity.
    #[doc(hidden)]
    const ZERO: Self;
    /// The value added by [`Atomic::increment()`].
    #[doc(hidden)]
    const ONE: Self;

    /// Creates the storage for an initial value.
    #[doc(hidden)]
    fn new_storage(value: Self) -> Self::Storage;
    /// Loads the stored value.
    #[doc(hidden)]
    fn load(storage: &Self::Storage) -> Self;
    /// Stores a value, returning the previous one.
    #[doc(hidden)]
    fn swap(storage: &Self::Storage, value: Self) -> Self;
    /// Adds to the stored value, returning the previous one.
    #[doc(hidden)]
    fn fetch_add(storage: &Self::Storage, delta: Self) -> Self;
    /// Subtracts from the stored value, returning the previous one.
    #[doc(hidden)]
    fn fetch_sub(storage: &Self::Storage, delta: Self) -> Self;
    /// Conditionally replaces the stored value.
    #[doc(hidden)]
    fn compare_and_swap(storage: &Self::Storage, current: Self, new: Self) -> bool;
    /// Unwraps the stored value.
    #[doc(hidden)]
    fn into_inner(storage: Self::Storage) -> Self;
    /// Addition with the same overflow behavior as [`Atomic::fetch_add()`].
    #[doc(hidden)]
    fn plus(self, rhs: Self) -> Self;
    /// Subtraction with the same overflow behavior as [`Atomic::fetch_sub()`].
    #[doc(hidden)]
    fn minus(self, rhs: Self) -> Self;
}

/// Integers map directly onto the native atomic instructions. Arithmetic wraps
/// around on overflow.
macro_rules! impl_atomic_integer {
    ( $( $t:ty => $atomic:ty ),* $(,)? ) => {
        $(
            impl sealed::Sealed for $t {}

            impl AtomicValue for $t {
                type Storage = $atomic;

                const ZERO: Self = 0;
                const ONE: Self = 1;

                fn new_storage(value: Self) -> $atomic {
                    <$atomic>::new(value)
                }

                fn load(storage: &$atomic) -> Self {
                    storage.load(Ordering::SeqCst)
                }

                fn swap(storage: &$atomic, value: Self) -> Self {
                    storage.swap(value, Ordering::SeqCst)
                }

                fn fetch_add(storage: &$atomic, delta: Self) -> Self {
                    storage.fetch_add(delta, Ordering::SeqCst)
                }

                fn fetch_sub(storage: &$atomic, delta: Self) -> Self {
                    storage.fetch_sub(delta, Ordering::SeqCst)
                }

                fn compare_and_swap(storage: &$atomic, current: Self, new: Self) -> bool {
                    storage
                        .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                }

                fn into_inner(storage: $atomic) -> Self {
                    storage.into_inner()
                }

                fn plus(self, rhs: Self) -> Self {
                    self.wrapping_add(rhs)
                }

                fn minus(self, rhs: Self) -> Self {
                    self.wrapping_sub(rhs)
                }
            }
        )*
    };
}

impl_atomic_integer!(
    i32 => AtomicI32,
    i64 => AtomicI64,
    isize => AtomicIsize,
    u32 => AtomicU32,
    u64 => AtomicU64,
    usize => AtomicUsize,
);

/// Floats are stored as their bit pattern in an unsigned integer of the same
/// width. Arithmetic is a compare-and-swap retry loop over that bit pattern,
/// and [`Atomic::compare_and_swap()`] compares bit patterns (so `0.0` and
/// `-0.0` are distinct, and a NaN matches itself bit for bit).
macro_rules! impl_atomic_float {
    ( $( $t:ty => $atomic:ty ),* $(,)? ) => {
        $(
            impl sealed::Sealed for $t {}

            impl AtomicValue for $t {
                type Storage = $atomic;

                const ZERO: Self = 0.0;
                const ONE: Self = 1.0;

                fn new_storage(value: Self) -> $atomic {
                    <$atomic>::new(value.to_bits())
                }

                fn load(storage: &$atomic) -> Self {
                    <$t>::from_bits(storage.load(Ordering::SeqCst))
                }

                fn swap(storage: &$atomic, value: Self) -> Self {
                    <$t>::from_bits(storage.swap(value.to_bits(), Ordering::SeqCst))
                }

                fn fetch_add(storage: &$atomic, delta: Self) -> Self {
                    let mut current = storage.load(Ordering::SeqCst);
                    loop {
                        let new = (<$t>::from_bits(current) + delta).to_bits();
                        match storage.compare_exchange_weak(
                            current,
                            new,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        ) {
                            Ok(previous) => return <$t>::from_bits(previous),
                            Err(actual) => current = actual,
                        }
                    }
                }

                fn fetch_sub(storage: &$atomic, delta: Self) -> Self {
                    Self::fetch_add(storage, -delta)
                }

                fn compare_and_swap(storage: &$atomic, current: Self, new: Self) -> bool {
                    storage
                        .compare_exchange(
                            current.to_bits(),
                            new.to_bits(),
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok()
                }

                fn into_inner(storage: $atomic) -> Self {
                    <$t>::from_bits(storage.into_inner())
                }

                fn plus(self, rhs: Self) -> Self {
                    self + rhs
                }

                fn minus(self, rhs: Self) -> Self {
                    self - rhs
                }
            }
        )*
    };
}

impl_atomic_float!(f32 => AtomicU32, f64 => AtomicU64);

/// An atomic value of type `T`.
///
/// All the operations are lock-free and use sequentially consistent ordering.
/// Integer operations map to a single native instruction, while floating-point
/// arithmetic loops over compare-and-swap until it succeeds.
///
/// ```
/// # use taskmgr::sync::Atomic;
/// let counter = Atomic::new(41);
/// assert_eq!(counter.increment(), 42);
/// assert!(counter.compare_and_swap(42, 0));
/// assert_eq!(counter.load(), 0);
///
/// let total = Atomic::new(1.5f64);
/// assert_eq!(total.add(2.0), 3.5);
/// ```
pub struct Atomic<T: AtomicValue> {
    storage: T::Storage,
}

impl<T: AtomicValue> Atomic<T> {
    /// Creates a new atomic initialized with the given value.
    pub fn new(value: T) -> Self {
        Self {
            storage: T::new_storage(value),
        }
    }

    /// Returns the current value.
    pub fn load(&self) -> T {
        T::load(&self.storage)
    }

    /// Replaces the current value.
    pub fn store(&self, value: T) {
        T::swap(&self.storage, value);
    }

    /// Replaces the current value, returning the previous one.
    pub fn swap(&self, value: T) -> T {
        T::swap(&self.storage, value)
    }

    /// Adds `delta`, returning the previous value.
    pub fn fetch_add(&self, delta: T) -> T {
        T::fetch_add(&self.storage, delta)
    }

    /// Subtracts `delta`, returning the previous value.
    pub fn fetch_sub(&self, delta: T) -> T {
        T::fetch_sub(&self.storage, delta)
    }

    /// Adds `delta`, returning the new value.
    pub fn add(&self, delta: T) -> T {
        self.fetch_add(delta).plus(delta)
    }

    /// Subtracts `delta`, returning the new value.
    pub fn sub(&self, delta: T) -> T {
        self.fetch_sub(delta).minus(delta)
    }

    /// Adds one, returning the new value.
    pub fn increment(&self) -> T {
        self.add(T::ONE)
    }

    /// Subtracts one, returning the new value.
    pub fn decrement(&self) -> T {
        self.sub(T::ONE)
    }

    /// Adds one, returning the previous value.
    pub fn fetch_increment(&self) -> T {
        self.fetch_add(T::ONE)
    }

    /// Subtracts one, returning the previous value.
    pub fn fetch_decrement(&self) -> T {
        self.fetch_sub(T::ONE)
    }

    /// Replaces the value with `new` if it is currently equal to `current`.
    ///
    /// Returns whether the value was replaced.
    pub fn compare_and_swap(&self, current: T, new: T) -> bool {
        T::compare_and_swap(&self.storage, current, new)
    }

    /// Consumes the atomic and returns the contained value.
    pub fn into_inner(self) -> T {
        T::into_inner(self.storage)
    }
}

impl<T: AtomicValue> Default for Atomic<T> {
    fn default() -> Self {
        Self::new(T::ZERO)
    }
}

impl<T: AtomicValue> From<T> for Atomic<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: AtomicValue> fmt::Debug for Atomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Atomic").field(&self.load()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn test_integer_operations() {
        let atomic = Atomic::new(10i32);
        assert_eq!(atomic.load(), 10);
        assert_eq!(atomic.fetch_add(5), 10);
        assert_eq!(atomic.add(5), 20);
        assert_eq!(atomic.fetch_sub(3), 20);
        assert_eq!(atomic.sub(7), 10);
        assert_eq!(atomic.increment(), 11);
        assert_eq!(atomic.fetch_increment(), 11);
        assert_eq!(atomic.decrement(), 11);
        assert_eq!(atomic.fetch_decrement(), 11);
        assert_eq!(atomic.swap(-4), 10);
        atomic.store(7);
        assert_eq!(atomic.into_inner(), 7);
    }

    #[test]
    fn test_compare_and_swap() {
        let atomic = Atomic::new(0usize);
        assert!(!atomic.compare_and_swap(1, 2));
        assert_eq!(atomic.load(), 0);
        assert!(atomic.compare_and_swap(0, 1));
        assert_eq!(atomic.load(), 1);
        assert!(!atomic.compare_and_swap(0, 1));
    }

    #[test]
    fn test_integer_wraps_around() {
        let atomic = Atomic::new(u32::MAX);
        assert_eq!(atomic.increment(), 0);
        assert_eq!(atomic.decrement(), u32::MAX);

        let atomic = Atomic::new(i64::MIN);
        assert_eq!(atomic.sub(1), i64::MAX);
    }

    #[test]
    fn test_float_operations() {
        let atomic = Atomic::new(1.5f32);
        assert_eq!(atomic.fetch_add(1.0), 1.5);
        assert_eq!(atomic.add(0.5), 3.0);
        assert_eq!(atomic.sub(2.0), 1.0);
        assert_eq!(atomic.increment(), 2.0);
        assert_eq!(atomic.decrement(), 1.0);
        assert_eq!(atomic.swap(-8.25), 1.0);
        assert_eq!(atomic.load(), -8.25);

        let atomic = Atomic::new(0.25f64);
        assert!(atomic.compare_and_swap(0.25, 0.75));
        assert!(!atomic.compare_and_swap(0.25, 1.0));
        assert_eq!(atomic.into_inner(), 0.75);
    }

    #[test]
    fn test_float_compare_and_swap_uses_bit_patterns() {
        let atomic = Atomic::new(0.0f64);
        assert!(!atomic.compare_and_swap(-0.0, 1.0));
        assert_eq!(atomic.load(), 0.0);

        let atomic = Atomic::new(f32::NAN);
        assert!(atomic.compare_and_swap(f32::NAN, 2.0));
        assert_eq!(atomic.load(), 2.0);
    }

    #[test]
    fn test_default_and_debug() {
        assert_eq!(Atomic::<i64>::default().load(), 0);
        assert_eq!(Atomic::<f64>::default().load(), 0.0);
        assert_eq!(format!("{:?}", Atomic::from(3u64)), "Atomic(3)");
    }

    #[test]
    fn test_concurrent_increments() {
        const NUM_THREADS: usize = 8;
        const NUM_INCREMENTS: i32 = 10_000;

        let atomic = Atomic::new(100i32);
        let barrier = Barrier::new(NUM_THREADS);
        std::thread::scope(|scope| {
            for _ in 0..NUM_THREADS {
                scope.spawn(|| {
                    barrier.wait();
                    for _ in 0..NUM_INCREMENTS {
                        atomic.increment();
                    }
                });
            }
        });
        assert_eq!(atomic.load(), 100 + NUM_THREADS as i32 * NUM_INCREMENTS);
    }

    #[test]
    fn test_concurrent_increments_and_decrements() {
        const NUM_THREADS: usize = 4;
        const NUM_STEPS: usize = 10_000;

        let atomic = Atomic::new(0isize);
        let barrier = Barrier::new(2 * NUM_THREADS);
        std::thread::scope(|scope| {
            for _ in 0..NUM_THREADS {
                scope.spawn(|| {
                    barrier.wait();
                    for _ in 0..NUM_STEPS {
                        atomic.fetch_increment();
                    }
                });
                scope.spawn(|| {
                    barrier.wait();
                    for _ in 0..NUM_STEPS {
                        atomic.fetch_decrement();
                    }
                });
            }
        });
        assert_eq!(atomic.load(), 0);
    }

    #[test]
    fn test_concurrent_float_adds() {
        const NUM_THREADS: usize = 8;
        const NUM_ADDS: usize = 1_000;

        // Small integers are exactly representable, so the sum is exact.
        let atomic = Atomic::new(0.0f64);
        let barrier = Barrier::new(NUM_THREADS);
        std::thread::scope(|scope| {
            for _ in 0..NUM_THREADS {
                scope.spawn(|| {
                    barrier.wait();
                    for _ in 0..NUM_ADDS {
                        atomic.add(2.0);
                    }
                });
            }
        });
        assert_eq!(atomic.load(), (2 * NUM_THREADS * NUM_ADDS) as f64);
    }
}
