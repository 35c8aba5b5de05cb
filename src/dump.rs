//! Introspection mode (`-p`): print container metadata instead of
//! rendering, in the spirit of `javap`/`dexdump`. Single-threaded and
//! pool-free on purpose: the output is meant to be read in order.

use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

use crate::class::parse_class;
use crate::detect::FileKind;
use crate::dex::parse_dex;
use crate::meta::ContainerMetadata;

pub fn dump(path: &Path, kind: FileKind) -> Result<()> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("cannot mmap {}", path.display()))?;
    let origin = path.display().to_string();

    match kind {
        FileKind::Class => print_meta(&parse_class(&origin, &mmap)?),
        FileKind::Dex => print_meta(&parse_dex(&origin, &mmap)?),
        FileKind::Jar | FileKind::Apk => {
            let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
                .with_context(|| format!("cannot open archive {}", path.display()))?;
            let suffix = if kind == FileKind::Apk { ".dex" } else { ".class" };
            for index in 0..archive.len() {
                let mut entry = match archive.by_index(index) {
                    Ok(entry) => entry,
                    Err(err) => {
                        eprintln!("[dexray] skipping corrupt zip entry #{index}: {err:#}");
                        continue;
                    }
                };
                if entry.is_dir() || !entry.name().ends_with(suffix) {
                    continue;
                }
                let name = entry.name().to_string();
                let mut buf = Vec::with_capacity(entry.size() as usize);
                if let Err(err) = entry.read_to_end(&mut buf) {
                    eprintln!("[dexray] cannot dump {name}: {err:#}");
                    continue;
                }
                let meta = if kind == FileKind::Apk {
                    parse_dex(&name, &buf)
                } else {
                    parse_class(&name, &buf)
                };
                match meta {
                    Ok(meta) => print_meta(&meta),
                    Err(err) => eprintln!("[dexray] cannot dump {name}: {err:#}"),
                }
            }
        }
    }
    Ok(())
}

fn print_meta(meta: &ContainerMetadata) {
    println!("{} ({} classes)", meta.origin, meta.classes.len());
    for class in &meta.classes {
        let mods = class.modifiers();
        print!("  ");
        if !mods.is_empty() {
            print!("{mods} ");
        }
        print!("{} {}", class.kind_keyword(), class.qualified_name);
        if let Some(superclass) = class.superclass.as_deref()
            && superclass != "java.lang.Object"
        {
            print!(" extends {superclass}");
        }
        if let Some(source) = class.source_file.as_deref() {
            print!("  // source: {source}");
        }
        println!();
    }
}
