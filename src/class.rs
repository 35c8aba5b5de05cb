//! Minimal JVM class-file metadata parser.
//!
//! Walks the constant pool far enough to resolve `this_class` and
//! `super_class`, producing a one-class [`ContainerMetadata`]. Method bodies
//! and attributes are the renderer's business, not ours.

use anyhow::{Context, Result, bail};

use crate::bytes::Reader;
use crate::meta::{ClassUnit, ContainerMetadata, internal_to_qualified};

pub const CLASS_MAGIC: u32 = 0xcafe_babe;

#[derive(Default, Clone)]
enum Constant {
    #[default]
    Other,
    Utf8(String),
    Class(u16),
}

/// Parses one class file into read-only metadata.
pub fn parse_class(origin: &str, buf: &[u8]) -> Result<ContainerMetadata> {
    let mut r = Reader::new(buf);
    let magic = r.u32_be().context("class file truncated")?;
    if magic != CLASS_MAGIC {
        bail!("{origin}: not a class file (bad magic {magic:#x})");
    }
    r.skip(4)?; // minor, major
    let cp_count = r.u16_be()?;

    let mut pool = vec![Constant::Other; cp_count as usize];
    let mut idx = 1u16;
    while idx < cp_count {
        let tag = r.u8()?;
        match tag {
            1 => {
                let len = r.u16_be()? as usize;
                let bytes = r.take(len)?;
                pool[idx as usize] = Constant::Utf8(String::from_utf8_lossy(bytes).into_owned());
            }
            7 => pool[idx as usize] = Constant::Class(r.u16_be()?),
            8 | 16 | 19 | 20 => r.skip(2)?, // String, MethodType, Module, Package
            15 => r.skip(3)?,               // MethodHandle
            3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => r.skip(4)?,
            5 | 6 => {
                // long/double occupy two constant pool slots
                r.skip(8)?;
                idx += 1;
            }
            other => bail!("{origin}: unknown constant pool tag {other} at entry {idx}"),
        }
        idx += 1;
    }

    let access_flags = u32::from(r.u16_be()?);
    let this_class = r.u16_be()?;
    let super_class = r.u16_be()?;

    let qualified_name = internal_to_qualified(class_name(&pool, this_class).with_context(
        || format!("{origin}: unresolvable this_class #{this_class}"),
    )?);
    let superclass = if super_class == 0 {
        None // only java.lang.Object itself has no superclass
    } else {
        Some(internal_to_qualified(
            class_name(&pool, super_class)
                .with_context(|| format!("{origin}: unresolvable super_class #{super_class}"))?,
        ))
    };

    Ok(ContainerMetadata {
        origin: origin.to_string(),
        classes: vec![ClassUnit {
            qualified_name,
            access_flags,
            superclass,
            source_file: None,
        }],
    })
}

fn class_name<'a>(pool: &'a [Constant], idx: u16) -> Result<&'a str> {
    let Some(Constant::Class(name_idx)) = pool.get(idx as usize) else {
        bail!("constant #{idx} is not a Class entry");
    };
    match pool.get(*name_idx as usize) {
        Some(Constant::Utf8(name)) => Ok(name),
        _ => bail!("constant #{name_idx} is not a Utf8 entry"),
    }
}
