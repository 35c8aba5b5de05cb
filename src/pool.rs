//! Fixed-size worker pool draining a shared task queue.
//!
//! `new(n)` starts `n` persistent workers that block on the queue, execute
//! whatever arrives and go back for more. Enumeration and execution overlap:
//! the walker keeps submitting while workers drain. Shutdown closes the
//! queue and joins every worker, so every task that was ever enqueued runs
//! to completion; there is no cancellation. A pool of size 1 executes tasks
//! synchronously on the submitting thread; same semantics, no threads.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;
use tracing::{debug, error};

use crate::task::{Task, WorkerContext};

pub const DEFAULT_THREADS: usize = 4;
pub const MAX_THREADS: usize = 16;

/// 0 means "use the default"; anything below 2 disables pooling; anything
/// above the cap is clamped.
pub fn effective_thread_count(requested: usize) -> usize {
    match requested {
        0 => DEFAULT_THREADS,
        1 => 1,
        n => n.min(MAX_THREADS),
    }
}

pub struct WorkerPool {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    inline: Option<WorkerContext>,
}

impl WorkerPool {
    /// Fails only when the OS refuses to spawn a worker thread. Workers
    /// already spawned exit on their own once the local sender drops.
    pub fn new(thread_count: usize, ctx: WorkerContext) -> Result<Self> {
        if thread_count < 2 {
            return Ok(Self {
                tx: None,
                workers: Vec::new(),
                inline: Some(ctx),
            });
        }

        let (tx, rx) = unbounded::<Task>();
        let workers = (0..thread_count)
            .map(|id| {
                let rx = rx.clone();
                let ctx = ctx.clone();
                std::thread::Builder::new()
                    .name(format!("dexray-worker-{id}"))
                    .spawn(move || worker_loop(id, rx, ctx))
                    .with_context(|| format!("cannot spawn worker thread {id}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tx: Some(tx),
            workers,
            inline: None,
        })
    }

    pub fn thread_count(&self) -> usize {
        if self.inline.is_some() { 1 } else { self.workers.len() }
    }

    /// Enqueues a task and wakes one blocked worker. In the degenerate
    /// single-thread mode the task runs right here instead.
    pub fn submit(&self, task: Task) {
        if let Some(ctx) = self.inline.as_ref() {
            execute_guarded(&task, ctx);
            return;
        }
        if let Some(tx) = self.tx.as_ref()
            && tx.send(task).is_err()
        {
            error!("task submitted after pool shutdown was dropped");
        }
    }

    /// Blocks until every submitted task has executed and every worker has
    /// exited. Tasks are drained, never cancelled.
    pub fn shutdown_and_drain(&mut self) {
        self.tx.take();
        self.inline.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_and_drain();
    }
}

fn worker_loop(id: usize, rx: Receiver<Task>, ctx: WorkerContext) {
    debug!(worker = id, "worker started");
    // recv fails only when the channel is closed and empty: drain complete
    while let Ok(task) = rx.recv() {
        execute_guarded(&task, &ctx);
    }
    debug!(worker = id, "worker exiting");
}

// One failing task must never halt the pool. Task::execute already contains
// render/write errors; this guard contains panics from renderer plugins.
fn execute_guarded(task: &Task, ctx: &WorkerContext) {
    let outcome = catch_unwind(AssertUnwindSafe(|| task.execute(ctx)));
    if outcome.is_err() {
        error!(
            class = %task.class().qualified_name,
            "renderer panicked; worker continues"
        );
        ctx.progress.failed();
        ctx.progress.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::TaskArena;
    use crate::meta::{ClassUnit, ContainerMetadata};
    use crate::progress::ProgressTracker;
    use crate::render::Render;
    use crate::task::{RenderKind, RenderUnit};
    use anyhow::bail;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "dexray_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    struct CountingRenderer {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    impl Render for CountingRenderer {
        fn render_source<'a>(
            &self,
            arena: &'a TaskArena,
            _meta: &ContainerMetadata,
            class: &ClassUnit,
        ) -> anyhow::Result<&'a str> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_on == Some(class.simple_name()) {
                bail!("synthetic render failure");
            }
            Ok(arena.alloc_str("// rendered\n"))
        }

        fn render_assembly<'a>(
            &self,
            arena: &'a TaskArena,
            meta: &ContainerMetadata,
            class: &ClassUnit,
        ) -> anyhow::Result<&'a str> {
            self.render_source(arena, meta, class)
        }
    }

    fn meta_of(names: &[&str]) -> Arc<ContainerMetadata> {
        Arc::new(ContainerMetadata {
            origin: "test".to_string(),
            classes: names
                .iter()
                .map(|n| ClassUnit {
                    qualified_name: n.to_string(),
                    access_flags: 0,
                    superclass: None,
                    source_file: None,
                })
                .collect(),
        })
    }

    fn submit_all(pool: &WorkerPool, meta: &Arc<ContainerMetadata>, dir: &Arc<PathBuf>) {
        for i in 0..meta.classes.len() {
            pool.submit(Task::new(
                RenderKind::Source,
                RenderUnit {
                    meta: Arc::clone(meta),
                    class_index: i,
                    save_dir: Arc::clone(dir),
                },
            ));
        }
    }

    fn run_pool(threads: usize, names: &[&str], fail_on: Option<&'static str>) -> (usize, crate::progress::Totals) {
        let dir = Arc::new(temp_dir("pool"));
        let meta = meta_of(names);
        let renderer = Arc::new(CountingRenderer {
            calls: AtomicUsize::new(0),
            fail_on,
        });
        let tracker = ProgressTracker::new(false);
        let ctx = WorkerContext {
            renderer: Arc::clone(&renderer) as Arc<dyn Render>,
            progress: tracker.handle(),
        };
        let mut pool = WorkerPool::new(threads, ctx).unwrap();
        for _ in 0..names.len() {
            tracker.handle().added();
        }
        submit_all(&pool, &meta, &dir);
        pool.shutdown_and_drain();
        let totals = tracker.finish();
        let _ = std::fs::remove_dir_all(dir.as_path());
        (renderer.calls.load(Ordering::Relaxed), totals)
    }

    #[test]
    fn drain_runs_every_submitted_task() {
        let names = ["a.A", "a.B", "a.C", "a.D", "a.E", "a.F", "a.G", "a.H"];
        let (calls, totals) = run_pool(4, &names, None);
        assert_eq!(calls, names.len());
        assert_eq!(totals.done, names.len() as u64);
        assert_eq!(totals.done, totals.added);
        assert_eq!(totals.failed, 0);
    }

    #[test]
    fn single_thread_mode_executes_synchronously() {
        let (calls, totals) = run_pool(1, &["a.A", "a.B"], None);
        assert_eq!(calls, 2);
        assert_eq!(totals.done, 2);
    }

    #[test]
    fn a_failing_task_does_not_halt_the_pool() {
        let names = ["a.A", "a.Bad", "a.C"];
        let (calls, totals) = run_pool(2, &names, Some("Bad"));
        assert_eq!(calls, 3);
        assert_eq!(totals.done, 3);
        assert_eq!(totals.failed, 1);
    }

    #[test]
    fn construction_succeeds_in_both_modes() {
        let tracker = ProgressTracker::new(false);
        let ctx = WorkerContext {
            renderer: Arc::new(CountingRenderer {
                calls: AtomicUsize::new(0),
                fail_on: None,
            }) as Arc<dyn Render>,
            progress: tracker.handle(),
        };
        let inline = WorkerPool::new(1, ctx.clone()).unwrap();
        assert_eq!(inline.thread_count(), 1);
        let pooled = WorkerPool::new(3, ctx).unwrap();
        assert_eq!(pooled.thread_count(), 3);
    }

    #[test]
    fn thread_count_clamping() {
        assert_eq!(effective_thread_count(0), DEFAULT_THREADS);
        assert_eq!(effective_thread_count(1), 1);
        assert_eq!(effective_thread_count(4), 4);
        assert_eq!(effective_thread_count(100), MAX_THREADS);
    }
}
