// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::error::Error;
use std::fmt;
use std::io;

/// Error returned when a [`TaskMgr`](crate::TaskMgr) fails to start.
///
/// When this is returned, any worker thread that was already started has been
/// shut down and joined.
#[derive(Debug)]
pub enum InitError {
    /// The pool was asked to start without any worker thread.
    ZeroWorkers,
    /// Getting the available parallelism failed.
    AvailableParallelism(io::Error),
    /// The OS failed to spawn a worker thread.
    Spawn {
        /// Index of the worker thread.
        worker: usize,
        /// Underlying error.
        source: io::Error,
    },
    /// Pinning a worker thread to its CPU failed, with
    /// [`CpuPinningPolicy::Always`](crate::CpuPinningPolicy::Always).
    CpuPinning {
        /// Index of the worker thread.
        worker: usize,
        /// Underlying error.
        source: io::Error,
    },
    /// [`CpuPinningPolicy::Always`](crate::CpuPinningPolicy::Always) was
    /// requested on a platform where CPU pinning isn't implemented.
    CpuPinningUnsupported,
    /// A worker thread exited before reporting that it started.
    WorkerExited,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::ZeroWorkers => f.write_str("A task manager needs at least one worker"),
            InitError::AvailableParallelism(_) => {
                f.write_str("Getting the available parallelism failed")
            }
            InitError::Spawn { worker, .. } => {
                write!(f, "Failed to spawn worker thread #{worker}")
            }
            InitError::CpuPinning { worker, .. } => {
                write!(f, "Failed to set CPU affinity for worker thread #{worker}")
            }
            InitError::CpuPinningUnsupported => {
                f.write_str("Pinning threads to CPUs is not implemented on this platform.")
            }
            InitError::WorkerExited => {
                f.write_str("A worker thread exited before reporting that it started")
            }
        }
    }
}

impl Error for InitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InitError::AvailableParallelism(source)
            | InitError::Spawn { source, .. }
            | InitError::CpuPinning { source, .. } => Some(source),
            InitError::ZeroWorkers | InitError::CpuPinningUnsupported | InitError::WorkerExited => {
                None
            }
        }
    }
}
