// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Units of work processed by a [`TaskMgr`](crate::TaskMgr).

use std::fmt;

/// A named, prioritized unit of deferred work.
///
/// Once scheduled, a task is owned by the [`TaskMgr`](crate::TaskMgr): it is
/// run exactly once by one worker thread and then dropped, whether it
/// succeeded or not.
///
/// ```
/// # use taskmgr::Task;
/// struct Greet(String);
///
/// impl Task for Greet {
///     fn run(&mut self) -> bool {
///         println!("Hello, {}!", self.0);
///         true
///     }
///
///     fn priority(&self) -> f32 {
///         2.0
///     }
///
///     fn name(&self) -> &str {
///         "greet"
///     }
/// }
/// ```
pub trait Task: Send {
    /// Performs the work, returning whether it succeeded.
    ///
    /// A failure is logged by the worker thread and otherwise ignored.
    fn run(&mut self) -> bool;

    /// Ordering metric: tasks with a higher priority run first.
    fn priority(&self) -> f32 {
        0.0
    }

    /// Name used to query pending tasks and for debugging. Doesn't need to be
    /// unique.
    fn name(&self) -> &str {
        "Task"
    }
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name())
            .field("priority", &self.priority())
            .finish_non_exhaustive()
    }
}

/// A [`Task`] running a closure.
///
/// ```
/// # use taskmgr::{task_fn, Task};
/// let mut task = task_fn("answer", || true).with_priority(4.0);
/// assert_eq!(task.name(), "answer");
/// assert_eq!(task.priority(), 4.0);
/// assert!(task.run());
/// ```
pub struct FnTask<F> {
    name: String,
    priority: f32,
    f: F,
}

/// Creates a [`FnTask`] with the given name, running the given closure, with
/// the default priority of zero.
pub fn task_fn<F>(name: impl Into<String>, f: F) -> FnTask<F>
where
    F: FnMut() -> bool + Send,
{
    FnTask {
        name: name.into(),
        priority: 0.0,
        f,
    }
}

impl<F> FnTask<F> {
    /// Sets the priority of this task.
    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = priority;
        self
    }
}

impl<F: FnMut() -> bool + Send> Task for FnTask<F> {
    fn run(&mut self) -> bool {
        (self.f)()
    }

    fn priority(&self) -> f32 {
        self.priority
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
