//! Container walkers.
//!
//! A walker enumerates every renderable unit in an opened container and
//! submits one task per unit while workers are already draining: the queue
//! is a producer/consumer boundary, not a barrier. Damage is contained per
//! entry: a corrupt zip entry or malformed buffer is logged and skipped, and
//! enumeration continues with the next entry.

use anyhow::Result;
use std::io::{Read, Seek};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::class::parse_class;
use crate::dex::parse_dex;
use crate::meta::ContainerMetadata;
use crate::pool::WorkerPool;
use crate::progress::ProgressHandle;
use crate::task::{RenderKind, RenderUnit, Task};

pub struct Walker<'a> {
    pool: &'a WorkerPool,
    progress: ProgressHandle,
    kind: RenderKind,
    save_dir: Arc<PathBuf>,
}

impl<'a> Walker<'a> {
    pub fn new(
        pool: &'a WorkerPool,
        progress: ProgressHandle,
        kind: RenderKind,
        save_dir: PathBuf,
    ) -> Self {
        Self {
            pool,
            progress,
            kind,
            save_dir: Arc::new(save_dir),
        }
    }

    /// APK: every zip entry named `*.dex` is read fully, parsed, and fanned
    /// out class by class. Everything else in the archive is left untouched.
    pub fn walk_apk<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<()> {
        for index in 0..archive.len() {
            let (name, buf) = match read_entry(archive, index, ".dex") {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    warn!("skipping corrupt zip entry #{index}: {err:#}");
                    continue;
                }
            };
            match parse_dex(&name, &buf) {
                Ok(meta) => self.submit_units(Arc::new(meta)),
                Err(err) => warn!("skipping malformed dex entry {name}: {err:#}"),
            }
        }
        Ok(())
    }

    /// JAR: same fan-out with class-file parsing instead of DEX parsing.
    /// Each entry yields a one-class metadata unit.
    pub fn walk_jar<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<()> {
        for index in 0..archive.len() {
            let (name, buf) = match read_entry(archive, index, ".class") {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    warn!("skipping corrupt zip entry #{index}: {err:#}");
                    continue;
                }
            };
            match parse_class(&name, &buf) {
                Ok(meta) => self.submit_units(Arc::new(meta)),
                Err(err) => warn!("skipping malformed class entry {name}: {err:#}"),
            }
        }
        Ok(())
    }

    /// Standalone DEX: the APK inner loop without the zip layer. A parse
    /// failure here is fatal; there is no sibling entry to fall back to.
    pub fn walk_dex(&self, origin: &str, buf: &[u8]) -> Result<()> {
        let meta = parse_dex(origin, buf)?;
        self.submit_units(Arc::new(meta));
        Ok(())
    }

    /// Standalone class file.
    pub fn walk_class(&self, origin: &str, buf: &[u8]) -> Result<()> {
        let meta = parse_class(origin, buf)?;
        self.submit_units(Arc::new(meta));
        Ok(())
    }

    /// Applies the skip rule and submits one task per remaining class.
    /// In source mode nested and anonymous classes are embedded in their
    /// enclosing class's render and get no task; in assembly mode every
    /// class gets its own listing.
    fn submit_units(&self, meta: Arc<ContainerMetadata>) {
        let mut submitted = 0usize;
        for (class_index, class) in meta.classes.iter().enumerate() {
            if self.kind == RenderKind::Source && (class.is_nested() || class.is_anonymous()) {
                continue;
            }
            self.progress.added();
            self.pool.submit(Task::new(
                self.kind,
                RenderUnit {
                    meta: Arc::clone(&meta),
                    class_index,
                    save_dir: Arc::clone(&self.save_dir),
                },
            ));
            submitted += 1;
        }
        debug!(
            origin = %meta.origin,
            classes = meta.classes.len(),
            submitted,
            "enumerated container unit"
        );
    }
}

/// Reads entry `index` fully, but only when its name ends in `suffix`.
/// The name test runs before a single byte of the body is touched, so
/// resources and native libraries are never decompressed just to be
/// thrown away.
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    suffix: &str,
) -> Result<Option<(String, Vec<u8>)>> {
    let mut entry = archive.by_index(index)?;
    if entry.is_dir() || !entry.name().ends_with(suffix) {
        return Ok(None);
    }
    let name = entry.name().to_string();
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok(Some((name, buf)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::testclass::build_class;
    use crate::dex::testdex::build_dex;
    use crate::meta::ACC_PUBLIC;
    use crate::progress::{ProgressTracker, Totals};
    use crate::render::SkeletonRenderer;
    use crate::task::WorkerContext;
    use std::io::{Cursor, Write};
    use std::time::{SystemTime, UNIX_EPOCH};
    use zip::write::FileOptions;

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

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options =
                FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for (name, content) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content).unwrap();
            }
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    // flips bytes right after the entry's name in the local header, which
    // lands in its compressed body
    fn corrupt_entry_body(zip: &mut [u8], name: &str) {
        let needle = name.as_bytes();
        let pos = zip
            .windows(needle.len())
            .position(|window| window == needle)
            .unwrap();
        for byte in &mut zip[pos + needle.len()..pos + needle.len() + 8] {
            *byte ^= 0xFF;
        }
    }

    fn walk(kind: RenderKind, f: impl FnOnce(&Walker)) -> Totals {
        let dir = temp_dir("walk");
        let tracker = ProgressTracker::new(false);
        let ctx = WorkerContext {
            renderer: Arc::new(SkeletonRenderer),
            progress: tracker.handle(),
        };
        let mut pool = WorkerPool::new(2, ctx).unwrap();
        {
            let walker = Walker::new(&pool, tracker.handle(), kind, dir.clone());
            f(&walker);
        }
        pool.shutdown_and_drain();
        let totals = tracker.finish();
        let _ = std::fs::remove_dir_all(dir);
        totals
    }

    fn sample_dex() -> Vec<u8> {
        build_dex(&[
            ("Lcom/example/A;", ACC_PUBLIC),
            ("Lcom/example/A$1;", 0),
            ("Lcom/example/B;", ACC_PUBLIC),
        ])
    }

    #[test]
    fn source_mode_skips_nested_and_anonymous() {
        let totals = walk(RenderKind::Source, |w| {
            w.walk_dex("classes.dex", &sample_dex()).unwrap();
        });
        assert_eq!(totals.added, 2); // A and B, not A$1
        assert_eq!(totals.done, 2);
    }

    #[test]
    fn assembly_mode_submits_every_class() {
        let totals = walk(RenderKind::Assembly, |w| {
            w.walk_dex("classes.dex", &sample_dex()).unwrap();
        });
        assert_eq!(totals.added, 3);
        assert_eq!(totals.done, 3);
    }

    #[test]
    fn apk_walk_skips_non_dex_entries_and_corrupt_dex() {
        let zip = zip_bytes(&[
            ("classes.dex", &sample_dex()),
            ("classes2.dex", b"dex\n035\0truncated"),
            ("res/strings.txt", b"not bytecode"),
        ]);
        let totals = walk(RenderKind::Assembly, |w| {
            let mut archive = ZipArchive::new(Cursor::new(zip.as_slice())).unwrap();
            w.walk_apk(&mut archive).unwrap();
        });
        // only the classes from the valid dex
        assert_eq!(totals.added, 3);
        assert_eq!(totals.done, 3);
        assert_eq!(totals.failed, 0);
    }

    #[test]
    fn non_matching_entries_are_filtered_by_name_without_reading() {
        let dex = sample_dex();
        let mut zip = zip_bytes(&[("classes.dex", &dex), ("res/blob.bin", &[0xAB; 64])]);
        // an undecodable body in a filtered-out entry must never be noticed
        corrupt_entry_body(&mut zip, "res/blob.bin");
        let mut archive = ZipArchive::new(Cursor::new(zip.as_slice())).unwrap();

        assert!(read_entry(&mut archive, 1, ".dex").unwrap().is_none());

        let totals = walk(RenderKind::Assembly, |w| {
            let mut archive = ZipArchive::new(Cursor::new(zip.as_slice())).unwrap();
            w.walk_apk(&mut archive).unwrap();
        });
        assert_eq!(totals.added, 3);
        assert_eq!(totals.failed, 0);
    }

    #[test]
    fn jar_walk_parses_class_entries() {
        let a = build_class("com/example/A", 0x0021);
        let inner = build_class("com/example/A$Inner", 0);
        let zip = zip_bytes(&[
            ("com/example/A.class", &a),
            ("com/example/A$Inner.class", &inner),
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
        ]);

        let totals = walk(RenderKind::Source, |w| {
            let mut archive = ZipArchive::new(Cursor::new(zip.as_slice())).unwrap();
            w.walk_jar(&mut archive).unwrap();
        });
        assert_eq!(totals.added, 1); // the inner class folds into A

        let totals = walk(RenderKind::Assembly, |w| {
            let mut archive = ZipArchive::new(Cursor::new(zip.as_slice())).unwrap();
            w.walk_jar(&mut archive).unwrap();
        });
        assert_eq!(totals.added, 2);
    }

    #[test]
    fn dex_with_zero_classes_submits_zero_tasks() {
        let totals = walk(RenderKind::Source, |w| {
            w.walk_dex("classes.dex", &build_dex(&[])).unwrap();
        });
        assert_eq!(totals, Totals::default());
    }

    #[test]
    fn enumeration_is_deterministic() {
        // same container, same mode -> same set of submitted tasks
        for _ in 0..3 {
            let totals = walk(RenderKind::Source, |w| {
                w.walk_dex("classes.dex", &sample_dex()).unwrap();
            });
            assert_eq!(totals.added, 2);
        }
    }
}
