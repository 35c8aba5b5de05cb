//! Output path derivation and writing.
//!
//! Every class writes to a path derived from its qualified name under the
//! save directory, so two tasks from the same container can never collide:
//! qualified names are unique within a container by construction.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub fn source_path(save_dir: &Path, qualified_name: &str) -> PathBuf {
    class_path(save_dir, qualified_name, "java")
}

pub fn assembly_path(save_dir: &Path, qualified_name: &str) -> PathBuf {
    class_path(save_dir, qualified_name, "smali")
}

fn class_path(save_dir: &Path, qualified_name: &str, extension: &str) -> PathBuf {
    let relative = format!("{}.{extension}", qualified_name.replace('.', "/"));
    save_dir.join(relative)
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create output directory {}", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))
}
