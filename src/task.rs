//! Units of work.
//!
//! A task is one (operation, class) pair, created by the container walker
//! and consumed exactly once by exactly one worker. The two operation kinds
//! are a closed variant rather than opaque closures, so dispatch is plain
//! pattern matching. Within a task the sequence is strict: arena-create →
//! render → write → arena-release → progress-report. A render or write
//! failure is logged and tallied but the task still reports completion,
//! because progress tracks attempted completions, not successful ones.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::arena::TaskArena;
use crate::meta::{ClassUnit, ContainerMetadata};
use crate::output;
use crate::progress::ProgressHandle;
use crate::render::Render;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    /// Reconstructed Java source; nested classes fold into their parent.
    Source,
    /// Smali-style disassembly; every class gets its own listing.
    Assembly,
}

/// Everything a worker needs beyond the task itself.
#[derive(Clone)]
pub struct WorkerContext {
    pub renderer: Arc<dyn Render>,
    pub progress: ProgressHandle,
}

/// Shared payload of a render task. Metadata is written once by the walker
/// and read-only afterwards, so workers share it without locking.
pub struct RenderUnit {
    pub meta: Arc<ContainerMetadata>,
    pub class_index: usize,
    pub save_dir: Arc<PathBuf>,
}

impl RenderUnit {
    fn class(&self) -> &ClassUnit {
        &self.meta.classes[self.class_index]
    }
}

pub enum Task {
    Source(RenderUnit),
    Assembly(RenderUnit),
}

impl Task {
    pub fn new(kind: RenderKind, unit: RenderUnit) -> Self {
        match kind {
            RenderKind::Source => Task::Source(unit),
            RenderKind::Assembly => Task::Assembly(unit),
        }
    }

    pub fn class(&self) -> &ClassUnit {
        match self {
            Task::Source(unit) | Task::Assembly(unit) => unit.class(),
        }
    }

    pub fn execute(&self, ctx: &WorkerContext) {
        let arena = TaskArena::new();
        let result = match self {
            Task::Source(unit) => run_source(&arena, unit, ctx),
            Task::Assembly(unit) => run_assembly(&arena, unit, ctx),
        };
        if let Err(err) = result {
            warn!(
                class = %self.class().qualified_name,
                container = %self.container_origin(),
                "task failed: {err:#}"
            );
            ctx.progress.failed();
        }
        ctx.progress.done();
        // arena dropped here: the task's transient memory is bulk-freed
        // before this worker picks up its next task
    }

    fn container_origin(&self) -> &str {
        match self {
            Task::Source(unit) | Task::Assembly(unit) => &unit.meta.origin,
        }
    }
}

fn run_source(arena: &TaskArena, unit: &RenderUnit, ctx: &WorkerContext) -> Result<()> {
    let class = unit.class();
    // second guard: walkers already skip nested units in source mode, but a
    // nested unit that does arrive produces no file of its own
    if class.is_nested() {
        return Ok(());
    }
    let text = ctx.renderer.render_source(arena, &unit.meta, class)?;
    output::write_text(&output::source_path(&unit.save_dir, &class.qualified_name), text)
}

fn run_assembly(arena: &TaskArena, unit: &RenderUnit, ctx: &WorkerContext) -> Result<()> {
    let class = unit.class();
    let text = ctx.renderer.render_assembly(arena, &unit.meta, class)?;
    output::write_text(
        &output::assembly_path(&unit.save_dir, &class.qualified_name),
        text,
    )
}
