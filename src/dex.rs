//! Minimal DEX metadata parser.
//!
//! Reads just enough of the header, string/type tables and `class_defs`
//! section to enumerate the classes in a DEX buffer. Everything is
//! bounds-checked; a truncated or malformed buffer fails the whole buffer
//! with an error and the caller decides how far the damage spreads.

use anyhow::{Context, Result, bail};

use crate::bytes::Reader;
use crate::meta::{ClassUnit, ContainerMetadata, descriptor_to_qualified};

pub const DEX_MAGIC: [u8; 4] = *b"dex\n";
const HEADER_SIZE: usize = 0x70;
const ENDIAN_CONSTANT: u32 = 0x1234_5678;
const CLASS_DEF_SIZE: usize = 0x20;
pub const NO_INDEX: u32 = 0xffff_ffff;

struct Tables<'a> {
    buf: &'a [u8],
    string_ids_size: u32,
    string_ids_off: u32,
    type_ids_size: u32,
    type_ids_off: u32,
}

impl Tables<'_> {
    // Identifiers are plain ASCII in practice; MUTF-8 quirks only affect
    // supplementary characters, so a lossy decode is fine here.
    fn string(&self, idx: u32) -> Result<String> {
        if idx >= self.string_ids_size {
            bail!("string index {idx} out of range ({})", self.string_ids_size);
        }
        let mut ids = Reader::at(self.buf, self.string_ids_off as usize + idx as usize * 4)?;
        let data_off = ids.u32_le()? as usize;
        let mut data = Reader::at(self.buf, data_off)?;
        let _utf16_len = data.uleb128()?;
        let bytes = data.cstr_bytes()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn type_descriptor(&self, idx: u32) -> Result<String> {
        if idx >= self.type_ids_size {
            bail!("type index {idx} out of range ({})", self.type_ids_size);
        }
        let mut ids = Reader::at(self.buf, self.type_ids_off as usize + idx as usize * 4)?;
        let string_idx = ids.u32_le()?;
        self.string(string_idx)
    }
}

fn table_in_bounds(buf: &[u8], off: u32, count: u32, entry_size: usize, what: &str) -> Result<()> {
    let end = (off as usize)
        .checked_add((count as usize).saturating_mul(entry_size))
        .filter(|&e| e <= buf.len());
    if count > 0 && end.is_none() {
        bail!("{what} table ({count} entries at {off:#x}) exceeds buffer");
    }
    Ok(())
}

/// Parses the class list of one DEX buffer into read-only metadata.
pub fn parse_dex(origin: &str, buf: &[u8]) -> Result<ContainerMetadata> {
    let mut r = Reader::new(buf);
    let magic = r.take(8).context("dex header truncated")?;
    if magic[..4] != DEX_MAGIC {
        bail!("{origin}: not a dex buffer (bad magic)");
    }
    r.skip(24)?; // checksum + signature
    let file_size = r.u32_le()?;
    let header_size = r.u32_le()?;
    let endian_tag = r.u32_le()?;
    if endian_tag != ENDIAN_CONSTANT {
        bail!("{origin}: unsupported endian tag {endian_tag:#x}");
    }
    if (header_size as usize) < HEADER_SIZE || (file_size as usize) > buf.len() {
        bail!(
            "{origin}: truncated dex (declares {file_size} bytes, have {})",
            buf.len()
        );
    }
    r.skip(12)?; // link_size, link_off, map_off
    let string_ids_size = r.u32_le()?;
    let string_ids_off = r.u32_le()?;
    let type_ids_size = r.u32_le()?;
    let type_ids_off = r.u32_le()?;
    r.skip(24)?; // proto_ids, field_ids, method_ids
    let class_defs_size = r.u32_le()?;
    let class_defs_off = r.u32_le()?;

    table_in_bounds(buf, string_ids_off, string_ids_size, 4, "string_ids")?;
    table_in_bounds(buf, type_ids_off, type_ids_size, 4, "type_ids")?;
    table_in_bounds(buf, class_defs_off, class_defs_size, CLASS_DEF_SIZE, "class_defs")?;

    let tables = Tables {
        buf,
        string_ids_size,
        string_ids_off,
        type_ids_size,
        type_ids_off,
    };

    let mut classes = Vec::with_capacity(class_defs_size as usize);
    for i in 0..class_defs_size {
        let off = class_defs_off as usize + i as usize * CLASS_DEF_SIZE;
        let mut def = Reader::at(buf, off)?;
        let class_idx = def.u32_le()?;
        let access_flags = def.u32_le()?;
        let superclass_idx = def.u32_le()?;
        def.skip(4)?; // interfaces_off
        let source_file_idx = def.u32_le()?;

        let descriptor = tables
            .type_descriptor(class_idx)
            .with_context(|| format!("{origin}: class_def {i}"))?;
        let qualified_name = descriptor_to_qualified(&descriptor)
            .with_context(|| format!("{origin}: class_def {i}"))?;

        let superclass = if superclass_idx == NO_INDEX {
            None
        } else {
            Some(descriptor_to_qualified(
                &tables.type_descriptor(superclass_idx)?,
            )?)
        };
        let source_file = if source_file_idx == NO_INDEX {
            None
        } else {
            Some(tables.string(source_file_idx)?)
        };

        classes.push(ClassUnit {
            qualified_name,
            access_flags,
            superclass,
            source_file,
        });
    }

    Ok(ContainerMetadata {
        origin: origin.to_string(),
        classes,
    })
}
