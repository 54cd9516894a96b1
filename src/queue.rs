// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Priority queue of pending tasks.

use crate::task::Task;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};

/// A task with its name and priority captured once.
///
/// Capturing them keeps the heap order and the name counts consistent even if
/// a task's accessors were to return different values later on. It also lets
/// the [`TaskMgr`](crate::TaskMgr) call these user-provided accessors before
/// taking its lock.
pub struct QueuedTask {
    priority: f32,
    name: String,
    task: Box<dyn Task>,
}

impl QueuedTask {
    /// Captures the name and priority of the given task.
    pub fn new(task: Box<dyn Task>) -> Self {
        Self {
            name: task.name().to_owned(),
            priority: task.priority(),
            task,
        }
    }

    /// Name of the task when it was captured.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Priority of the task when it was captured.
    pub fn priority(&self) -> f32 {
        self.priority
    }

    /// Splits into the captured name and the task.
    pub fn into_parts(self) -> (String, Box<dyn Task>) {
        (self.name, self.task)
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    /// Tasks are only ordered by priority. A NaN priority sorts above all
    /// numbers.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.total_cmp(&other.priority)
    }
}

/// Max-heap of pending tasks keyed by [`Task::priority()`], with a multiset of
/// the pending task names.
///
/// Tasks of equal priority are popped in an unspecified order.
///
/// This isn't synchronized: the [`TaskMgr`](crate::TaskMgr) only accesses it
/// under its mutex.
#[derive(Default)]
pub struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,
    /// Number of occurrences of each name in the heap.
    pending_names: HashMap<String, usize>,
}

impl TaskQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task to the queue. No user code runs here.
    pub fn push(&mut self, queued: QueuedTask) {
        *self.pending_names.entry(queued.name.clone()).or_insert(0) += 1;
        self.heap.push(queued);
    }

    /// Removes the task with the highest priority.
    pub fn pop(&mut self) -> Option<QueuedTask> {
        let queued = self.heap.pop()?;
        match self.pending_names.entry(queued.name.clone()) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() -= 1;
                if *entry.get() == 0 {
                    entry.remove();
                }
            }
            Entry::Vacant(entry) => {
                panic!("Popped task {:?} wasn't a pending name", entry.key())
            }
        }
        Some(queued)
    }

    /// Returns whether a task with the given name is in the queue.
    pub fn contains_name(&self, name: &str) -> bool {
        self.pending_names.contains_key(name)
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Removes all the tasks from the queue, in no particular order.
    ///
    /// The caller decides where the tasks get dropped, e.g. after releasing a
    /// lock.
    pub fn drain(&mut self) -> Vec<Box<dyn Task>> {
        self.pending_names.clear();
        self.heap.drain().map(|queued| queued.task).collect()
    }
}
