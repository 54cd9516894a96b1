// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Synchronization primitives: a lock-free [`Atomic`], busy-waiting
//! [`SpinLock`] and [`RwSpinLock`], and blocking [`Mutex`],
//! [`ConditionVariable`] and [`RwLock`].

mod atomic;
mod blocking;
mod spin;

pub use atomic::{Atomic, AtomicValue};
pub use blocking::{ConditionVariable, Mutex, RwLock};
pub use spin::{RwSpinLock, RwSpinReadGuard, RwSpinWriteGuard, SpinLock, SpinLockGuard};
