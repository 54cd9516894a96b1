// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Busy-waiting locks built on [`Atomic`].
//!
//! These locks burn CPU while waiting and never yield to the OS scheduler.
//! Only use them to guard critical sections of a few instructions; longer
//! holds must use the [blocking](super::blocking) primitives.

use super::atomic::Atomic;
use crossbeam_utils::{Backoff, CachePadded};
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};

const UNLOCKED: i32 = 0;
const LOCKED: i32 = 1;

/// A mutual-exclusion lock that spins until it is acquired.
///
/// ```
/// # use taskmgr::sync::SpinLock;
/// let lock = SpinLock::new(0);
/// *lock.lock() += 1;
/// assert_eq!(*lock.lock(), 1);
/// ```
pub struct SpinLock<T: ?Sized> {
    /// Either `UNLOCKED` or `LOCKED`. Padded so that two neighboring locks
    /// don't share a cache line.
    state: CachePadded<Atomic<i32>>,
    value: UnsafeCell<T>,
}

// SAFETY: The lock hands out access to the value to one thread at a time, so
// sharing the lock only requires the value to be sendable.
unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
// SAFETY: Same as above.
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new unlocked spin lock protecting the given value.
    pub fn new(value: T) -> Self {
        Self {
            state: CachePadded::new(Atomic::new(UNLOCKED)),
            value: UnsafeCell::new(value),
        }
    }

    /// Consumes the lock and returns the protected value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Makes a single attempt to acquire the lock.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self.state.compare_and_swap(UNLOCKED, LOCKED) {
            Some(SpinLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Spins until the lock is acquired.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let backoff = Backoff::new();
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            backoff.spin();
        }
    }

    /// Returns whether the lock is currently held by some thread.
    pub fn is_locked(&self) -> bool {
        self.state.load() == LOCKED
    }

    /// Returns a mutable reference to the protected value. No locking is
    /// needed as the exclusive borrow statically guarantees it.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Access to the value of a [`SpinLock`]. The lock is released when this guard
/// is dropped.
pub struct SpinLockGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
}

// SAFETY: Sharing the guard shares a `&T`, which requires `T: Sync`.
unsafe impl<T: ?Sized + Sync> Sync for SpinLockGuard<'_, T> {}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: This guard exists only while the lock is held, so no other
        // thread accesses the value.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: This guard exists only while the lock is held, so no other
        // thread accesses the value.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.store(UNLOCKED);
    }
}

/// A writer-preferring reader/writer lock that spins until it is acquired.
///
/// Readers take the inner [`SpinLock`] only for the time needed to register
/// themselves, and unregister without locking. A writer holds the inner lock
/// for its whole critical section, and spins until the registered readers
/// are gone. While a writer waits for readers to drain, no new reader can
/// register.
///
/// ```
/// # use taskmgr::sync::RwSpinLock;
/// let lock = RwSpinLock::new(vec![1, 2]);
/// lock.write().push(3);
/// assert_eq!(lock.read().len(), 3);
/// ```
pub struct RwSpinLock<T: ?Sized> {
    /// Held by writers, and briefly by readers while registering.
    lock: SpinLock<()>,
    /// Number of active readers.
    readers: CachePadded<Atomic<i32>>,
    value: UnsafeCell<T>,
}

// SAFETY: The lock hands out either exclusive access to one thread or shared
// access to many, like `std::sync::RwLock`.
unsafe impl<T: ?Sized + Send> Send for RwSpinLock<T> {}
// SAFETY: Shared access from several threads requires `T: Sync`.
unsafe impl<T: ?Sized + Send + Sync> Sync for RwSpinLock<T> {}

impl<T> RwSpinLock<T> {
    /// Creates a new unlocked reader/writer spin lock protecting the given
    /// value.
    pub fn new(value: T) -> Self {
        Self {
            lock: SpinLock::new(()),
            readers: CachePadded::new(Atomic::new(0)),
            value: UnsafeCell::new(value),
        }
    }

    /// Consumes the lock and returns the protected value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> RwSpinLock<T> {
    /// Spins until shared access is acquired.
    pub fn read(&self) -> RwSpinReadGuard<'_, T> {
        let _registration = self.lock.lock();
        self.readers.increment();
        RwSpinReadGuard { lock: self }
    }

    /// Attempts to acquire shared access without spinning.
    pub fn try_read(&self) -> Option<RwSpinReadGuard<'_, T>> {
        let _registration = self.lock.try_lock()?;
        self.readers.increment();
        Some(RwSpinReadGuard { lock: self })
    }

    /// Spins until exclusive access is acquired.
    pub fn write(&self) -> RwSpinWriteGuard<'_, T> {
        let guard = self.lock.lock();
        let backoff = Backoff::new();
        while self.readers.load() > 0 {
            backoff.spin();
        }
        RwSpinWriteGuard {
            lock: self,
            _guard: guard,
        }
    }

    /// Attempts to acquire exclusive access without spinning. This fails if
    /// another writer holds the lock or if any reader is active.
    pub fn try_write(&self) -> Option<RwSpinWriteGuard<'_, T>> {
        let guard = self.lock.try_lock()?;
        if self.readers.load() > 0 {
            return None;
        }
        Some(RwSpinWriteGuard {
            lock: self,
            _guard: guard,
        })
    }

    /// Returns the number of readers currently holding the lock.
    pub fn reader_count(&self) -> usize {
        self.readers.load() as usize
    }

    /// Returns a mutable reference to the protected value.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: Default> Default for RwSpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for RwSpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwSpinLock")
            .field("readers", &self.reader_count())
            .field("write_locked", &self.lock.is_locked())
            .finish_non_exhaustive()
    }
}

/// Shared access to the value of a [`RwSpinLock`].
pub struct RwSpinReadGuard<'a, T: ?Sized> {
    lock: &'a RwSpinLock<T>,
}

impl<T: ?Sized> Deref for RwSpinReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: While a reader is registered, writers spin and never touch
        // the value.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for RwSpinReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.readers.decrement();
    }
}

/// Exclusive access to the value of a [`RwSpinLock`].
pub struct RwSpinWriteGuard<'a, T: ?Sized> {
    lock: &'a RwSpinLock<T>,
    _guard: SpinLockGuard<'a, ()>,
}

impl<T: ?Sized> Deref for RwSpinWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The inner lock is held and no reader is registered.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> DerefMut for RwSpinWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The inner lock is held and no reader is registered.
        unsafe { &mut *self.lock.value.get() }
    }
}
