// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Blocking synchronization primitives, backed by the OS.
//!
//! These are thin wrappers around [`std::sync`]. A poisoned lock means that a
//! thread panicked in the middle of a critical section, leaving the protected
//! state undefined: all the operations below treat that as fatal and panic.

use crate::macros::log_error;
use std::fmt;
use std::sync::{
    Condvar, LockResult, MutexGuard, RwLockReadGuard, RwLockWriteGuard, TryLockError,
    TryLockResult,
};

/// Unwraps the result of a lock operation, panicking if the lock is poisoned.
fn unpoison<G>(result: LockResult<G>, what: &str) -> G {
    match result {
        Ok(guard) => guard,
        Err(_e) => {
            log_error!("Failed to acquire {what}, the lock was poisoned: {_e:?}");
            panic!("Failed to acquire {what}, the lock was poisoned");
        }
    }
}

/// Like [`unpoison()`], for non-blocking lock attempts.
fn unpoison_try<G>(result: TryLockResult<G>, what: &str) -> Option<G> {
    match result {
        Ok(guard) => Some(guard),
        Err(TryLockError::WouldBlock) => None,
        Err(TryLockError::Poisoned(e)) => Some(unpoison(Err(e), what)),
    }
}

/// A blocking mutual-exclusion lock.
pub struct Mutex<T: ?Sized> {
    inner: std::sync::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new unlocked mutex protecting the given value.
    pub fn new(value: T) -> Self {
        Self {
            inner: std::sync::Mutex::new(value),
        }
    }

    /// Consumes the mutex and returns the protected value.
    pub fn into_inner(self) -> T {
        unpoison(self.inner.into_inner(), "the mutex")
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Blocks until the mutex is acquired.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        unpoison(self.inner.lock(), "the mutex")
    }

    /// Attempts to acquire the mutex without blocking.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        unpoison_try(self.inner.try_lock(), "the mutex")
    }

    /// Returns a mutable reference to the protected value.
    pub fn get_mut(&mut self) -> &mut T {
        unpoison(self.inner.get_mut(), "the mutex")
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

/// A condition variable, used together with a [`Mutex`] to block a thread
/// until another thread signals it.
///
/// A waiting thread locks the mutex, checks its condition, and calls
/// [`wait()`](Self::wait) which releases the mutex while blocked and
/// reacquires it before returning. Wakeups may be spurious, so the condition
/// must be checked again in a loop (or with [`wait_while()`](Self::wait_while)).
#[derive(Debug, Default)]
pub struct ConditionVariable {
    inner: Condvar,
}

impl ConditionVariable {
    /// Creates a new condition variable.
    pub fn new() -> Self {
        Self {
            inner: Condvar::new(),
        }
    }

    /// Atomically releases the mutex held by `guard` and blocks until
    /// notified, then reacquires the mutex.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        unpoison(self.inner.wait(guard), "the mutex after waiting")
    }

    /// Blocks as long as the predicate is true on the protected value.
    pub fn wait_while<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        predicate: impl FnMut(&mut T) -> bool,
    ) -> MutexGuard<'a, T> {
        unpoison(
            self.inner.wait_while(guard, predicate),
            "the mutex after waiting",
        )
    }

    /// Wakes up at most one waiting thread.
    pub fn notify_one(&self) {
        self.inner.notify_one()
    }

    /// Wakes up all the waiting threads.
    pub fn notify_all(&self) {
        self.inner.notify_all()
    }
}

/// A blocking reader/writer lock.
pub struct RwLock<T: ?Sized> {
    inner: std::sync::RwLock<T>,
}

impl<T> RwLock<T> {
    /// Creates a new unlocked reader/writer lock protecting the given value.
    pub fn new(value: T) -> Self {
        Self {
            inner: std::sync::RwLock::new(value),
        }
    }

    /// Consumes the lock and returns the protected value.
    pub fn into_inner(self) -> T {
        unpoison(self.inner.into_inner(), "the rwlock")
    }
}

impl<T: ?Sized> RwLock<T> {
    /// Blocks until shared access is acquired.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        unpoison(self.inner.read(), "the rwlock for reading")
    }

    /// Blocks until exclusive access is acquired.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        unpoison(self.inner.write(), "the rwlock for writing")
    }

    /// Attempts to acquire shared access without blocking.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        unpoison_try(self.inner.try_read(), "the rwlock for reading")
    }

    /// Attempts to acquire exclusive access without blocking.
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        unpoison_try(self.inner.try_write(), "the rwlock for writing")
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}
