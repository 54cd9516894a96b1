// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shows the order in which a single worker thread picks up tasks.

use std::sync::{mpsc, Arc, Barrier};
use taskmgr::{Task, TaskMgr};

/// Task printing a message.
struct Print {
    name: &'static str,
    priority: f32,
}

impl Task for Print {
    fn run(&mut self) -> bool {
        println!("Running {:?} (priority {})", self.name, self.priority);
        true
    }

    fn priority(&self) -> f32 {
        self.priority
    }

    fn name(&self) -> &str {
        self.name
    }
}

fn main() {
    env_logger::init();

    let task_mgr = match TaskMgr::init(1) {
        Ok(task_mgr) => task_mgr,
        Err(e) => {
            eprintln!("Failed to start the task manager: {e}");
            std::process::exit(1);
        }
    };

    // Keep the only worker busy while the other tasks are scheduled.
    let gate = Arc::new(Barrier::new(2));
    let (started_tx, started_rx) = mpsc::channel();
    task_mgr.schedule_fn("gate", f32::INFINITY, {
        let gate = gate.clone();
        move || {
            let _ = started_tx.send(());
            gate.wait();
            true
        }
    });
    let _ = started_rx.recv();

    for (name, priority) in [("A", 1.0), ("B", 5.0), ("C", -2.0), ("D", 5.0)] {
        task_mgr.schedule(Box::new(Print { name, priority }));
    }
    println!(
        "Pending: A={} B={} E={}, dormant={}",
        task_mgr.is_pending("A"),
        task_mgr.is_pending("B"),
        task_mgr.is_pending("E"),
        task_mgr.dormant()
    );

    // The last task signals that all the others ran, as it has the lowest
    // priority.
    let (done_tx, done_rx) = mpsc::channel();
    task_mgr.schedule_fn("done", f32::NEG_INFINITY, move || done_tx.send(()).is_ok());

    gate.wait();
    let _ = done_rx.recv();
    println!("Dormant: {}", task_mgr.dormant());
}
