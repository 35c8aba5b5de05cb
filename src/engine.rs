//! Container-level drivers.
//!
//! One entry point per container format. Each opens its input up front
//! (unreadable files and broken archives abort before any task is scheduled),
//! then starts the tracker and pool, lets the walker stream tasks into the
//! pool, drains, and only then releases the container resources.

use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::ZipArchive;

use crate::arena::TaskArena;
use crate::pool::{WorkerPool, effective_thread_count};
use crate::progress::{ProgressTracker, Totals};
use crate::render::Render;
use crate::task::{RenderKind, WorkerContext};
use crate::walk::Walker;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub save_dir: PathBuf,
    /// Requested worker count; clamped by the pool (0 → default, max 16).
    pub thread_count: usize,
    pub kind: RenderKind,
    pub show_progress: bool,
}

impl AnalysisOptions {
    pub fn new(save_dir: PathBuf) -> Self {
        Self {
            save_dir,
            thread_count: 0,
            kind: RenderKind::Source,
            show_progress: false,
        }
    }
}

pub fn analyse_apk(
    path: &Path,
    opts: &AnalysisOptions,
    renderer: Arc<dyn Render>,
) -> Result<Totals> {
    let mmap = map_file(path)?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("cannot open apk archive {}", path.display()))?;
    run_pipeline(opts, renderer, |walker| walker.walk_apk(&mut archive))
}

pub fn analyse_jar(
    path: &Path,
    opts: &AnalysisOptions,
    renderer: Arc<dyn Render>,
) -> Result<Totals> {
    let mmap = map_file(path)?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("cannot open jar archive {}", path.display()))?;
    run_pipeline(opts, renderer, |walker| walker.walk_jar(&mut archive))
}

pub fn analyse_dex(
    path: &Path,
    opts: &AnalysisOptions,
    renderer: Arc<dyn Render>,
) -> Result<Totals> {
    let mmap = map_file(path)?;
    let origin = path.display().to_string();
    run_pipeline(opts, renderer, |walker| walker.walk_dex(&origin, &mmap))
}

pub fn analyse_class(
    path: &Path,
    opts: &AnalysisOptions,
    renderer: Arc<dyn Render>,
) -> Result<Totals> {
    let mmap = map_file(path)?;
    let origin = path.display().to_string();
    run_pipeline(opts, renderer, |walker| walker.walk_class(&origin, &mmap))
}

/// Renders a standalone class file straight to stdout, bypassing the pool.
pub fn print_class(path: &Path, kind: RenderKind, renderer: &dyn Render) -> Result<()> {
    let mmap = map_file(path)?;
    let meta = crate::class::parse_class(&path.display().to_string(), &mmap)?;
    let arena = TaskArena::new();
    for class in &meta.classes {
        let text = match kind {
            RenderKind::Source => renderer.render_source(&arena, &meta, class)?,
            RenderKind::Assembly => renderer.render_assembly(&arena, &meta, class)?,
        };
        print!("{text}");
    }
    Ok(())
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    // SAFETY: the file is opened read-only and the mapping never outlives
    // this analysis run.
    unsafe { Mmap::map(&file) }.with_context(|| format!("cannot mmap {}", path.display()))
}

fn run_pipeline(
    opts: &AnalysisOptions,
    renderer: Arc<dyn Render>,
    enumerate: impl FnOnce(&Walker) -> Result<()>,
) -> Result<Totals> {
    let tracker = ProgressTracker::new(opts.show_progress);
    let ctx = WorkerContext {
        renderer,
        progress: tracker.handle(),
    };
    let mut pool = WorkerPool::new(effective_thread_count(opts.thread_count), ctx)
        .context("cannot start worker pool")?;

    let enumerated = {
        let walker = Walker::new(&pool, tracker.handle(), opts.kind, opts.save_dir.clone());
        enumerate(&walker)
        // walker (and its progress handle) dropped here
    };

    // drain before surfacing any walker error: tasks already enqueued
    // always run to completion
    pool.shutdown_and_drain();
    let totals = tracker.finish();
    enumerated?;
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SkeletonRenderer;
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

    #[test]
    fn missing_input_fails_before_any_task_is_scheduled() {
        let opts = AnalysisOptions::new(temp_dir("engine_missing"));
        let err = analyse_apk(
            Path::new("/nonexistent/app.apk"),
            &opts,
            Arc::new(SkeletonRenderer),
        );
        assert!(err.is_err());
        assert!(!opts.save_dir.exists());
    }

    #[test]
    fn garbage_archive_fails_to_open() {
        let base = temp_dir("engine_garbage");
        std::fs::create_dir_all(&base).unwrap();
        let bogus = base.join("app.apk");
        std::fs::write(&bogus, b"PK\x03\x04 but not really a zip").unwrap();

        let opts = AnalysisOptions::new(base.join("out"));
        assert!(analyse_apk(&bogus, &opts, Arc::new(SkeletonRenderer)).is_err());
        let _ = std::fs::remove_dir_all(base);
    }
}
