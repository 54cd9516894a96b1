// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool to run a batch of tasks on a task manager.
//!
//! Build with `--features log` and set `RUST_LOG=debug` (or `trace` with the
//! `log_tasks` feature) to follow the workers' lifecycle.

use clap::{Parser, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::hint::black_box;
use std::num::NonZeroUsize;
use std::sync::mpsc;
use std::time::Instant;
use taskmgr::sync::Atomic;
use taskmgr::{CpuPinningPolicy, TaskMgrBuilder, ThreadCount};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let task_mgr = match (TaskMgrBuilder {
        num_threads: match cli.num_threads {
            Some(num_threads) => ThreadCount::Count(num_threads),
            None => ThreadCount::AvailableParallelism,
        },
        cpu_pinning: match cli.cpu_pinning {
            CpuPinningCli::No => CpuPinningPolicy::No,
            CpuPinningCli::IfSupported => CpuPinningPolicy::IfSupported,
            CpuPinningCli::Always => CpuPinningPolicy::Always,
        },
        ..Default::default()
    }
    .build())
    {
        Ok(task_mgr) => task_mgr,
        Err(e) => {
            eprintln!("Failed to start the task manager: {e}");
            std::process::exit(1);
        }
    };
    println!("Started {} worker threads", task_mgr.num_threads());

    let mut rng = ChaCha12Rng::seed_from_u64(42);
    let total = std::sync::Arc::new(Atomic::new(0u64));
    let (done_tx, done_rx) = mpsc::channel();

    let start = Instant::now();
    for i in 0..cli.num_tasks {
        let priority = rng.random_range(0.0..100.0);
        let fails = cli.failure_rate > 0.0 && rng.random_bool(cli.failure_rate);
        let work = cli.work;
        let total = total.clone();
        let done = done_tx.clone();
        task_mgr.schedule_fn(format!("task {i}"), priority, move || {
            let result = (0..work).fold(i, |acc, j| black_box(acc.wrapping_mul(31).wrapping_add(j)));
            total.add(result % 1000);
            let _ = done.send(());
            !fails
        });
    }
    println!(
        "Scheduled {} tasks, {} still pending",
        cli.num_tasks,
        task_mgr.pending_count()
    );

    for _ in 0..cli.num_tasks {
        done_rx.recv().unwrap();
    }
    let elapsed = start.elapsed();

    println!("All tasks ran in {elapsed:?}, total = {}", total.load());
    println!("Dormant: {}", task_mgr.dormant());
    // Counters are updated right after each task returns.
    while task_mgr.stats().running > 0 {
        std::thread::yield_now();
    }
    println!("Stats: {:?}", task_mgr.stats());
    task_mgr.shutdown();
}

/// CLI tool to run a batch of tasks on a task manager.
#[derive(Parser, Debug, PartialEq)]
#[command(version)]
struct Cli {
    /// Number of worker threads. Default to the available parallelism.
    #[arg(long)]
    num_threads: Option<NonZeroUsize>,

    /// Policy to pin worker threads to CPUs.
    #[arg(long, value_enum, default_value_t = CpuPinningCli::IfSupported)]
    cpu_pinning: CpuPinningCli,

    /// Number of tasks to schedule, with random priorities.
    #[arg(long, default_value_t = 10_000)]
    num_tasks: u64,

    /// Number of loop iterations done by each task.
    #[arg(long, default_value_t = 10_000)]
    work: u64,

    /// Probability that a task reports a failure.
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,
}

/// Policy to pin worker threads to CPUs.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CpuPinningCli {
    /// Don't pin worker threads.
    No,
    /// Pin worker threads if supported by the platform.
    IfSupported,
    /// Pin worker threads, failing if not supported by the platform.
    Always,
}
