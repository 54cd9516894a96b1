// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A task manager: a fixed pool of worker threads consuming a shared priority
//! queue of tasks.

use crate::error::InitError;
use crate::macros::{log_debug, log_error, log_trace, log_warn};
use crate::queue::{QueuedTask, TaskQueue};
use crate::sync::{Atomic, ConditionVariable, Mutex};
use crate::task::{task_fn, Task};
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::convert::TryFrom;
use std::io;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

/// Number of worker threads to spawn in a task manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadCount {
    /// Spawn the number of threads returned by
    /// [`std::thread::available_parallelism()`].
    AvailableParallelism,
    /// Spawn the given number of threads.
    Count(NonZeroUsize),
}

impl ThreadCount {
    /// Resolves the number of threads to spawn.
    pub fn count(self) -> io::Result<NonZeroUsize> {
        match self {
            ThreadCount::AvailableParallelism => std::thread::available_parallelism(),
            ThreadCount::Count(count) => Ok(count),
        }
    }
}

impl TryFrom<usize> for ThreadCount {
    type Error = <NonZeroUsize as TryFrom<usize>>::Error;

    fn try_from(thread_count: usize) -> Result<Self, Self::Error> {
        let count = NonZeroUsize::try_from(thread_count)?;
        Ok(ThreadCount::Count(count))
    }
}

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on this
    /// platform (or not implemented), building a task manager fails.
    Always,
}

/// A builder for [`TaskMgr`].
#[derive(Clone, Debug)]
pub struct TaskMgrBuilder {
    /// Number of worker threads to spawn.
    pub num_threads: ThreadCount,
    /// Policy to pin worker threads to CPUs.
    pub cpu_pinning: CpuPinningPolicy,
    /// Worker threads are named `{thread_name_prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for TaskMgrBuilder {
    fn default() -> Self {
        Self {
            num_threads: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::No,
            thread_name_prefix: "taskmgr-worker".to_owned(),
        }
    }
}

impl TaskMgrBuilder {
    /// Spawns the worker threads and returns the task manager once all of them
    /// have started.
    ///
    /// If any worker fails to start, the workers that did start are shut down
    /// and joined before the error is returned.
    ///
    /// ```
    /// # use taskmgr::{CpuPinningPolicy, TaskMgrBuilder, ThreadCount};
    /// let task_mgr = TaskMgrBuilder {
    ///     num_threads: ThreadCount::try_from(2).unwrap(),
    ///     cpu_pinning: CpuPinningPolicy::No,
    ///     ..Default::default()
    /// }
    /// .build()
    /// .unwrap();
    /// assert_eq!(task_mgr.num_threads().get(), 2);
    /// ```
    pub fn build(&self) -> Result<TaskMgr, InitError> {
        TaskMgr::new(self)
    }
}

/// Counters of the tasks processed by a [`TaskMgr`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Number of tasks currently running on a worker thread.
    pub running: usize,
    /// Number of tasks that ran and returned `true`.
    pub succeeded: usize,
    /// Number of tasks that ran and returned `false` or panicked.
    pub failed: usize,
}

/// A pool of worker threads processing [`Task`]s in priority order.
///
/// Tasks are posted with [`schedule()`](Self::schedule), from any number of
/// threads. Each idle worker thread picks the pending task with the highest
/// priority, runs it and drops it. Task failures are logged but never reported
/// to the producer.
///
/// Dropping the task manager discards the pending tasks, waits for the running
/// tasks to complete and joins all the worker threads.
///
/// ```
/// # use taskmgr::TaskMgr;
/// # use std::sync::mpsc;
/// let task_mgr = TaskMgr::init(2).unwrap();
/// let (tx, rx) = mpsc::channel();
/// task_mgr.schedule_fn("hello", 1.0, move || tx.send("hello").is_ok());
/// assert_eq!(rx.recv().unwrap(), "hello");
/// ```
pub struct TaskMgr {
    /// State shared with the worker threads.
    shared: Arc<Shared>,
    /// Handles to all the worker threads in the pool.
    threads: Vec<WorkerThreadHandle>,
}

/// Handle to a worker thread in a task manager.
struct WorkerThreadHandle {
    /// Thread handle object.
    handle: JoinHandle<()>,
}

/// Context shared between the task manager and the worker threads.
struct Shared {
    /// Pending tasks and shutdown flag.
    state: Mutex<State>,
    /// Signaled when a task is added, or on shutdown.
    new_work: ConditionVariable,
    /// Number of tasks currently running.
    running: Atomic<usize>,
    /// Number of tasks that succeeded.
    succeeded: Atomic<usize>,
    /// Number of tasks that failed.
    failed: Atomic<usize>,
}

/// State protected by the task manager's mutex.
struct State {
    /// Pending tasks.
    queue: TaskQueue,
    /// Whether the worker threads must exit.
    done: bool,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: TaskQueue::new(),
                done: false,
            }),
            new_work: ConditionVariable::new(),
            running: Atomic::new(0),
            succeeded: Atomic::new(0),
            failed: Atomic::new(0),
        }
    }

    fn schedule(&self, task: Box<dyn Task>) {
        // The task's accessors are user code: call them before locking, so that
        // a panic there can't poison the mutex.
        let queued = QueuedTask::new(task);
        let mut state = self.state.lock();
        state.queue.push(queued);
        // Exactly one task became available, so one worker is enough.
        self.new_work.notify_one();
        log_trace!("Add: Task queue has {} entries", state.queue.len());
    }

    /// Blocks until a task is available and pops it, or returns [`None`] once
    /// the task manager is shutting down.
    ///
    /// The popped task is counted as running before the lock is released, so
    /// that a task is always either pending or running until it completes.
    fn wait_for_task(&self) -> Option<QueuedTask> {
        let mut state = self.state.lock();
        loop {
            if let Some(queued) = state.queue.pop() {
                self.running.increment();
                log_trace!(
                    "Pop: Task queue has {} entries after {:?}",
                    state.queue.len(),
                    queued.name()
                );
                return Some(queued);
            }
            if state.done {
                return None;
            }
            state = self.new_work.wait(state);
        }
    }

    /// Discards the pending tasks and tells all the worker threads to exit.
    /// Returns the number of discarded tasks.
    fn shut_down(&self) -> usize {
        let mut state = self.state.lock();
        let discarded = state.queue.drain();
        state.done = true;
        drop(state);
        self.new_work.notify_all();

        // Tasks are dropped outside of the lock, as their destructor may run
        // arbitrary code.
        let count = discarded.len();
        for task in discarded {
            if panic::catch_unwind(AssertUnwindSafe(move || drop(task))).is_err() {
                log_error!("[main thread] A discarded task panicked while being dropped");
            }
        }
        count
    }
}

impl TaskMgr {
    /// Starts a task manager with the given number of worker threads.
    ///
    /// This is a shorthand for [`TaskMgrBuilder::build()`] with default
    /// settings.
    pub fn init(worker_count: usize) -> Result<Self, InitError> {
        let num_threads =
            ThreadCount::try_from(worker_count).map_err(|_| InitError::ZeroWorkers)?;
        TaskMgrBuilder {
            num_threads,
            ..Default::default()
        }
        .build()
    }

    /// Creates a new task manager using the given parameters.
    fn new(builder: &TaskMgrBuilder) -> Result<Self, InitError> {
        let num_threads: usize = builder
            .num_threads
            .count()
            .map_err(InitError::AvailableParallelism)?
            .into();
        let cpu_pinning = builder.cpu_pinning;

        #[cfg(any(
            miri,
            not(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "linux"
            ))
        ))]
        match cpu_pinning {
            CpuPinningPolicy::No => (),
            CpuPinningPolicy::IfSupported => {
                log_warn!("Pinning threads to CPUs is not implemented on this platform.")
            }
            CpuPinningPolicy::Always => return Err(InitError::CpuPinningUnsupported),
        }

        // If anything fails below, dropping this partially started task manager
        // shuts down and joins the workers spawned so far.
        let mut task_mgr = Self {
            shared: Arc::new(Shared::new()),
            threads: Vec::with_capacity(num_threads),
        };

        let (started_tx, started_rx) = mpsc::channel();
        for id in 0..num_threads {
            let context = WorkerContext {
                id,
                shared: task_mgr.shared.clone(),
            };
            let started = started_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{id}", builder.thread_name_prefix))
                .spawn(move || {
                    let result = pin_to_cpu(id, cpu_pinning);
                    let is_ok = result.is_ok();
                    // The receiver outlives this message, as the task manager waits for
                    // all the workers to report before returning.
                    let _ = started.send(result);
                    drop(started);
                    if is_ok {
                        context.run()
                    }
                })
                .map_err(|source| InitError::Spawn { worker: id, source })?;
            task_mgr.threads.push(WorkerThreadHandle { handle });
        }
        drop(started_tx);
        log_debug!("[main thread] Spawned {num_threads} threads");

        for _ in 0..num_threads {
            match started_rx.recv() {
                Ok(Ok(())) => (),
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(InitError::WorkerExited),
            }
        }
        log_debug!("[main thread] All threads started");

        Ok(task_mgr)
    }

    /// Returns the number of worker threads in this task manager.
    pub fn num_threads(&self) -> NonZeroUsize {
        // There is always at least one worker: the constructor rejects zero.
        NonZeroUsize::new(self.threads.len()).unwrap_or(NonZeroUsize::MIN)
    }

    /// Posts a task for processing, waking up one idle worker thread.
    ///
    /// The task manager takes ownership of the task: it will be run exactly
    /// once and then dropped, unless the task manager shuts down before a
    /// worker picks it up, in which case it's dropped without running.
    pub fn schedule(&self, task: Box<dyn Task>) {
        self.shared.schedule(task)
    }

    /// Posts a closure for processing, as a task with the given name and
    /// priority.
    pub fn schedule_fn(
        &self,
        name: impl Into<String>,
        priority: f32,
        f: impl FnMut() -> bool + Send + 'static,
    ) {
        self.schedule(Box::new(task_fn(name, f).with_priority(priority)))
    }

    /// Returns whether a task with the given name is waiting in the queue.
    ///
    /// Tasks that a worker thread already picked up (even if still running)
    /// don't count as pending.
    pub fn is_pending(&self, name: &str) -> bool {
        self.shared.state.lock().queue.contains_name(name)
    }

    /// Returns whether no task is waiting in the queue.
    ///
    /// This doesn't account for tasks that are currently running on a worker
    /// thread: a dormant task manager may still be busy. See
    /// [`stats()`](Self::stats) for the number of running tasks.
    pub fn dormant(&self) -> bool {
        self.shared.state.lock().queue.is_empty()
    }

    /// Returns the number of tasks waiting in the queue.
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Returns a snapshot of the task counters. The counters are read
    /// independently of each other, so they may be slightly out of sync while
    /// tasks are running.
    pub fn stats(&self) -> TaskStats {
        TaskStats {
            running: self.shared.running.load(),
            succeeded: self.shared.succeeded.load(),
            failed: self.shared.failed.load(),
        }
    }

    /// Shuts down the task manager. This is equivalent to dropping it.
    pub fn shutdown(self) {
        drop(self)
    }
}

impl Drop for TaskMgr {
    /// Discards the pending tasks and joins all the threads in the pool.
    #[allow(clippy::unused_enumerate_index)]
    fn drop(&mut self) {
        let _discarded = self.shared.shut_down();
        log_debug!("[main thread] Discarded {_discarded} pending task(s). Joining threads in the pool...");

        for (_i, t) in self.threads.drain(..).enumerate() {
            let result = t.handle.join();
            match result {
                Ok(_) => log_debug!("[main thread] Thread {_i} joined with result: {result:?}"),
                Err(_) => log_error!("[main thread] Thread {_i} joined with result: {result:?}"),
            }
        }
        log_debug!("[main thread] Joined threads.");
    }
}

/// Pins the current thread to the CPU with the same index, according to the
/// policy.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
fn pin_to_cpu(id: usize, cpu_pinning: CpuPinningPolicy) -> Result<(), InitError> {
    let try_pin = || -> nix::Result<()> {
        let mut cpu_set = CpuSet::new();
        cpu_set.set(id)?;
        sched_setaffinity(Pid::from_raw(0), &cpu_set)
    };
    match cpu_pinning {
        CpuPinningPolicy::No => Ok(()),
        CpuPinningPolicy::IfSupported => {
            match try_pin() {
                Ok(()) => log_debug!("Pinned thread #{id} to CPU #{id}"),
                Err(_e) => log_warn!("Failed to set CPU affinity for thread #{id}: {_e}"),
            }
            Ok(())
        }
        CpuPinningPolicy::Always => match try_pin() {
            Ok(()) => {
                log_debug!("Pinned thread #{id} to CPU #{id}");
                Ok(())
            }
            Err(e) => Err(InitError::CpuPinning {
                worker: id,
                source: e.into(),
            }),
        },
    }
}

/// CPU pinning isn't implemented on this platform. Unsupported policies are
/// rejected before spawning any thread.
#[cfg(any(
    miri,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    ))
))]
fn pin_to_cpu(_id: usize, _cpu_pinning: CpuPinningPolicy) -> Result<(), InitError> {
    Ok(())
}

/// Context object owned by a worker thread.
struct WorkerContext {
    /// Thread index.
    #[cfg_attr(not(feature = "log"), allow(dead_code))]
    id: usize,
    /// Context shared with the task manager.
    shared: Arc<Shared>,
}

impl WorkerContext {
    /// Main function run by this thread.
    fn run(&self) {
        log_debug!("[thread {}] Waiting for tasks", self.id);
        while let Some(queued) = self.shared.wait_for_task() {
            if self.run_task(queued) {
                self.shared.succeeded.increment();
            } else {
                self.shared.failed.increment();
            }
            // Counted as running until now, after the outcome was recorded.
            self.shared.running.decrement();
        }
        log_debug!("[thread {}] Received shutdown signal, exiting", self.id);
    }

    /// Runs a task and drops it, returning whether it succeeded.
    ///
    /// A panic in either [`Task::run()`] or the task's destructor counts as a
    /// failure: the worker survives it so that the pool keeps its size.
    fn run_task(&self, queued: QueuedTask) -> bool {
        let (_name, mut task) = queued.into_parts();
        let succeeded = match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
            Ok(true) => true,
            Ok(false) => {
                log_error!("[thread {}] Task {_name:?} failed", self.id);
                false
            }
            Err(_) => {
                log_error!("[thread {}] Task {_name:?} panicked", self.id);
                false
            }
        };
        if panic::catch_unwind(AssertUnwindSafe(move || drop(task))).is_err() {
            log_error!("[thread {}] Task {_name:?} panicked while being dropped", self.id);
            return false;
        }
        succeeded
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Waits until the counters reach the expected values. Counters are updated
    /// right after a task returns, so a task's side effects can be observed
    /// slightly before its outcome is counted.
    fn wait_for_stats(task_mgr: &TaskMgr, expected: TaskStats) {
        while task_mgr.stats() != expected {
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_thread_count_try_from_usize() {
        assert!(ThreadCount::try_from(0).is_err());
        assert_eq!(
            ThreadCount::try_from(1),
            Ok(ThreadCount::Count(NonZeroUsize::try_from(1).unwrap()))
        );
    }

    #[test]
    fn test_thread_count_resolves() {
        assert_eq!(
            ThreadCount::AvailableParallelism.count().unwrap(),
            std::thread::available_parallelism().unwrap()
        );
        assert_eq!(
            ThreadCount::try_from(3).unwrap().count().unwrap().get(),
            3
        );
    }

    #[test]
    fn test_init_zero_workers() {
        assert!(matches!(TaskMgr::init(0), Err(InitError::ZeroWorkers)));
    }

    #[test]
    fn test_num_threads() {
        let task_mgr = TaskMgrBuilder::default().build().unwrap();
        assert_eq!(
            task_mgr.num_threads(),
            std::thread::available_parallelism().unwrap()
        );

        let task_mgr = TaskMgr::init(4).unwrap();
        assert_eq!(task_mgr.num_threads(), NonZeroUsize::try_from(4).unwrap());
    }

    #[test]
    fn test_thread_names() {
        let task_mgr = TaskMgrBuilder {
            num_threads: ThreadCount::try_from(1).unwrap(),
            thread_name_prefix: "custom".to_owned(),
            ..Default::default()
        }
        .build()
        .unwrap();

        let (tx, rx) = mpsc::channel();
        task_mgr.schedule_fn("name", 0.0, move || {
            let name = std::thread::current().name().map(str::to_owned);
            tx.send(name).is_ok()
        });
        assert_eq!(rx.recv().unwrap().as_deref(), Some("custom-0"));
    }

    #[test]
    fn test_cpu_pinning_if_supported() {
        let task_mgr = TaskMgrBuilder {
            num_threads: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::IfSupported,
            ..Default::default()
        }
        .build()
        .unwrap();

        let (tx, rx) = mpsc::channel();
        task_mgr.schedule_fn("pinned", 0.0, move || tx.send(()).is_ok());
        rx.recv().unwrap();
    }

    #[cfg(all(
        not(miri),
        any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        )
    ))]
    #[test]
    fn test_cpu_pinning_always() {
        let task_mgr = TaskMgrBuilder {
            num_threads: ThreadCount::try_from(1).unwrap(),
            cpu_pinning: CpuPinningPolicy::Always,
            ..Default::default()
        }
        .build()
        .unwrap();

        let (tx, rx) = mpsc::channel();
        task_mgr.schedule_fn("pinned", 0.0, move || tx.send(()).is_ok());
        rx.recv().unwrap();
    }

    #[cfg(all(
        not(miri),
        any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        )
    ))]
    #[test]
    fn test_cpu_pinning_always_partial_pool() {
        // There is no CPU for the last worker to be pinned to, so it fails after
        // all the other workers started. Returning at all means that the started
        // workers were shut down and joined.
        let num_cpus = std::thread::available_parallelism().unwrap().get();
        let result = TaskMgrBuilder {
            num_threads: ThreadCount::try_from(num_cpus + 1).unwrap(),
            cpu_pinning: CpuPinningPolicy::Always,
            ..Default::default()
        }
        .build();
        assert!(matches!(
            result,
            Err(InitError::CpuPinning { worker, .. }) if worker == num_cpus
        ));
    }

    #[cfg(any(
        miri,
        not(any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        ))
    ))]
    #[test]
    fn test_cpu_pinning_always_not_supported() {
        let result = TaskMgrBuilder {
            num_threads: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::Always,
            ..Default::default()
        }
        .build();
        assert!(matches!(result, Err(InitError::CpuPinningUnsupported)));
    }

    #[test]
    fn test_failing_and_panicking_tasks() {
        let task_mgr = TaskMgr::init(1).unwrap();
        task_mgr.schedule_fn("fail", 3.0, || false);
        task_mgr.schedule_fn("panic", 2.0, || panic!("task panic"));

        // The single worker survived both failures if it runs this one.
        let (tx, rx) = mpsc::channel();
        task_mgr.schedule_fn("succeed", 1.0, move || tx.send(()).is_ok());
        rx.recv().unwrap();

        wait_for_stats(
            &task_mgr,
            TaskStats {
                running: 0,
                succeeded: 1,
                failed: 2,
            },
        );
    }

    /// Task that panics when dropped.
    struct PanicOnDrop;

    impl Task for PanicOnDrop {
        fn run(&mut self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "panic on drop"
        }
    }

    impl Drop for PanicOnDrop {
        fn drop(&mut self) {
            panic!("task destructor panic");
        }
    }

    #[test]
    fn test_task_panicking_on_drop() {
        let task_mgr = TaskMgr::init(1).unwrap();
        task_mgr.schedule(Box::new(PanicOnDrop));

        // The single worker survived the destructor if it runs this one.
        let (tx, rx) = mpsc::channel();
        task_mgr.schedule_fn("after", -1.0, move || tx.send(()).is_ok());
        rx.recv_timeout(Duration::from_secs(10)).unwrap();

        wait_for_stats(
            &task_mgr,
            TaskStats {
                running: 0,
                succeeded: 1,
                failed: 1,
            },
        );
    }

    #[test]
    fn test_discarded_task_panicking_on_drop() {
        let shared = Shared::new();
        shared.schedule(Box::new(PanicOnDrop));
        shared.schedule(Box::new(task_fn("other", || true)));
        assert_eq!(shared.shut_down(), 2);
        assert!(shared.wait_for_task().is_none());
    }

    #[test]
    fn test_schedule_panicking_accessor() {
        struct PanicOnPriority;

        impl Task for PanicOnPriority {
            fn run(&mut self) -> bool {
                true
            }

            fn priority(&self) -> f32 {
                panic!("priority panic")
            }

            fn name(&self) -> &str {
                "bad priority"
            }
        }

        let task_mgr = TaskMgr::init(1).unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            task_mgr.schedule(Box::new(PanicOnPriority))
        }));
        assert!(result.is_err());

        // Neither the queue nor the mutex were affected.
        assert!(!task_mgr.is_pending("bad priority"));
        assert!(task_mgr.dormant());
        let (tx, rx) = mpsc::channel();
        task_mgr.schedule_fn("after", 0.0, move || tx.send(()).is_ok());
        rx.recv().unwrap();
    }

    #[test]
    fn test_stats_running() {
        let task_mgr = TaskMgr::init(2).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        task_mgr.schedule_fn("blocker", 0.0, move || {
            started_tx.send(()).unwrap();
            release_rx.recv().is_ok()
        });
        started_rx.recv().unwrap();
        assert_eq!(task_mgr.stats().running, 1);
        assert!(task_mgr.dormant());

        release_tx.send(()).unwrap();
        wait_for_stats(
            &task_mgr,
            TaskStats {
                running: 0,
                succeeded: 1,
                failed: 0,
            },
        );
    }

    #[test]
    fn test_shutdown_waits_for_running_task() {
        let task_mgr = TaskMgr::init(1).unwrap();
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();
        task_mgr.schedule_fn("slow", 0.0, {
            let finished = finished.clone();
            move || {
                started_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(50));
                finished.store(true, Ordering::SeqCst);
                true
            }
        });
        started_rx.recv().unwrap();
        task_mgr.shutdown();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_wait_for_task_after_shutdown() {
        let shared = Shared::new();
        shared.schedule(Box::new(task_fn("discarded", || true)));
        assert_eq!(shared.shut_down(), 1);
        assert!(shared.wait_for_task().is_none());
    }

    #[test]
    fn test_popped_task_counts_as_running() {
        let shared = Shared::new();
        shared.schedule(Box::new(task_fn("task", || true)));
        assert_eq!(shared.running.load(), 0);
        let queued = shared.wait_for_task().unwrap();
        assert!(shared.state.lock().queue.is_empty());
        assert_eq!(shared.running.load(), 1);
        drop(queued);
    }

    #[test]
    fn test_task_always_pending_or_running() {
        const NUM_ROUNDS: usize = 1_000;

        let task_mgr = TaskMgr::init(2).unwrap();
        for round in 0..NUM_ROUNDS {
            task_mgr.schedule_fn("round", 0.0, || true);
            // Read in this order, a task that is neither pending nor running must
            // already be counted as completed.
            loop {
                let pending = task_mgr.pending_count();
                let running = task_mgr.stats().running;
                let succeeded = task_mgr.stats().succeeded;
                if pending == 0 && running == 0 {
                    assert_eq!(succeeded, round + 1);
                    break;
                }
                std::thread::yield_now();
            }
        }
    }

    #[test]
    fn test_wait_for_task_pops_highest_priority() {
        let shared = Shared::new();
        shared.schedule(Box::new(task_fn("low", || true).with_priority(1.0)));
        shared.schedule(Box::new(task_fn("high", || true).with_priority(5.0)));
        assert_eq!(shared.wait_for_task().unwrap().name(), "high");
        assert_eq!(shared.wait_for_task().unwrap().name(), "low");
    }

    #[test]
    fn test_wait_for_task_wakes_up() {
        let shared = Shared::new();
        std::thread::scope(|scope| {
            let waiter =
                scope.spawn(|| shared.wait_for_task().map(|task| task.name().to_owned()));
            shared.schedule(Box::new(task_fn("wake", || true)));
            assert_eq!(waiter.join().unwrap().as_deref(), Some("wake"));

            let waiter = scope.spawn(|| shared.wait_for_task().is_none());
            shared.shut_down();
            assert!(waiter.join().unwrap());
        });
    }
}
