// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

mod error;
mod macros;
mod queue;
pub mod sync;
mod task;
mod task_mgr;

pub use error::InitError;
pub use task::{task_fn, FnTask, Task};
pub use task_mgr::{CpuPinningPolicy, TaskMgr, TaskMgrBuilder, TaskStats, ThreadCount};
