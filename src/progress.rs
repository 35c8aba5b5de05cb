//! Progress aggregation across workers.
//!
//! Workers and the enumerating thread never touch the counters directly:
//! they send events into an internal channel drained by a single reporter
//! thread that owns `added`/`done`/`failed` and the cosmetic progress line.
//! Enumeration overlaps execution, so `added` keeps growing while tasks
//! complete; the reporter only guarantees `done <= added` at every
//! observation and `done == added` once the pool has drained. Failures are
//! tallied separately so a run that "completed" with broken classes is
//! distinguishable from a clean one.

use std::io::Write;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;

use serde::Serialize;

#[derive(Debug, Clone, Copy)]
enum ProgressEvent {
    Added,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub added: u64,
    pub done: u64,
    pub failed: u64,
}

#[derive(Debug, Clone)]
pub struct ProgressHandle {
    tx: Sender<ProgressEvent>,
}

impl ProgressHandle {
    /// Called by the walker before a task is submitted.
    pub fn added(&self) {
        let _ = self.tx.send(ProgressEvent::Added);
    }

    /// Called by a worker after the write step, success or not.
    pub fn done(&self) {
        let _ = self.tx.send(ProgressEvent::Done);
    }

    pub fn failed(&self) {
        let _ = self.tx.send(ProgressEvent::Failed);
    }
}

pub struct ProgressTracker {
    tx: Option<Sender<ProgressEvent>>,
    handle: Option<JoinHandle<Totals>>,
}

impl ProgressTracker {
    pub fn new(display: bool) -> Self {
        let (tx, rx) = std::sync::mpsc::channel::<ProgressEvent>();
        let handle = spawn_reporter(rx, display);
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> ProgressHandle {
        ProgressHandle {
            tx: self.tx.as_ref().cloned().expect("tracker already finished"),
        }
    }

    /// Blocks until every outstanding handle is dropped and all events are
    /// drained, then returns the final tallies.
    pub fn finish(mut self) -> Totals {
        self.tx.take();
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => Totals::default(),
        }
    }
}

fn spawn_reporter(rx: Receiver<ProgressEvent>, display: bool) -> JoinHandle<Totals> {
    std::thread::spawn(move || {
        let mut totals = Totals::default();
        while let Ok(event) = rx.recv() {
            match event {
                ProgressEvent::Added => totals.added += 1,
                ProgressEvent::Done => totals.done += 1,
                ProgressEvent::Failed => totals.failed += 1,
            }
            debug_assert!(totals.done <= totals.added);
            if display && matches!(event, ProgressEvent::Done) {
                print!("\rProgress : {} ({})", totals.done, totals.added);
                let _ = std::io::stdout().flush();
            }
        }
        totals
    })
}
