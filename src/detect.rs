//! Input type detection and default output location.
//!
//! The container format is decided by the first four bytes, before any task
//! is scheduled. Zip-based archives share a magic, so JAR and APK are told
//! apart by the filename suffix. An unrecognized magic aborts the run.

use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::class::CLASS_MAGIC;
use crate::dex::DEX_MAGIC;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Class,
    Jar,
    Dex,
    Apk,
}

impl FileKind {
    pub fn describe(self) -> &'static str {
        match self {
            FileKind::Class => "Java class",
            FileKind::Jar => "JAR",
            FileKind::Dex => "DEX",
            FileKind::Apk => "APK",
        }
    }
}

pub fn detect_file_kind(path: &Path) -> Result<FileKind> {
    let mut file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .with_context(|| format!("cannot read file magic of {}", path.display()))?;

    if u32::from_be_bytes(magic) == CLASS_MAGIC {
        return Ok(FileKind::Class);
    }
    if magic == DEX_MAGIC {
        return Ok(FileKind::Dex);
    }
    if magic == ZIP_MAGIC {
        let is_apk = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("apk"));
        return Ok(if is_apk { FileKind::Apk } else { FileKind::Jar });
    }
    bail!(
        "{}: not a valid Java class/JAR/DEX/APK file",
        path.display()
    );
}

/// Default save directory: a sibling directory named after the input file,
/// with dots replaced so `app.apk` lands next to it as `app_apk/`.
pub fn default_save_dir(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().replace('.', "_"))
        .unwrap_or_else(|| "out".to_string());
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}
