//! Structural description of the classes inside one container.
//!
//! A `ContainerMetadata` is produced once by the enumerating thread and then
//! shared read-only (behind an `Arc`) with every worker, so no per-access
//! locking is needed. `ClassUnit` is the unit of rendering: one class
//! definition, immutable after parsing.

use anyhow::{Result, bail};

pub const ACC_PUBLIC: u32 = 0x0001;
pub const ACC_FINAL: u32 = 0x0010;
pub const ACC_INTERFACE: u32 = 0x0200;
pub const ACC_ABSTRACT: u32 = 0x0400;
pub const ACC_ANNOTATION: u32 = 0x2000;
pub const ACC_ENUM: u32 = 0x4000;

#[derive(Debug)]
pub struct ContainerMetadata {
    /// Where the classes came from, for diagnostics (file path or zip entry).
    pub origin: String,
    pub classes: Vec<ClassUnit>,
}

#[derive(Debug, Clone)]
pub struct ClassUnit {
    /// Dotted qualified name, e.g. `com.example.Main$1`.
    pub qualified_name: String,
    pub access_flags: u32,
    pub superclass: Option<String>,
    pub source_file: Option<String>,
}

impl ClassUnit {
    pub fn simple_name(&self) -> &str {
        self.qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_name)
    }

    pub fn package(&self) -> Option<&str> {
        self.qualified_name.rsplit_once('.').map(|(pkg, _)| pkg)
    }

    /// Nested classes (inner, local, anonymous) carry a `$` in the simple
    /// name. In source mode their text is embedded in the enclosing class's
    /// render, so they never get a file of their own.
    pub fn is_nested(&self) -> bool {
        self.simple_name().contains('$')
    }

    pub fn is_anonymous(&self) -> bool {
        match self.simple_name().rsplit_once('$') {
            Some((_, tail)) => !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }

    pub fn modifiers(&self) -> String {
        let mut out = Vec::new();
        if self.access_flags & ACC_PUBLIC != 0 {
            out.push("public");
        }
        if self.access_flags & ACC_FINAL != 0 && self.access_flags & ACC_ENUM == 0 {
            out.push("final");
        }
        if self.access_flags & ACC_ABSTRACT != 0 && self.access_flags & ACC_INTERFACE == 0 {
            out.push("abstract");
        }
        out.join(" ")
    }

    pub fn kind_keyword(&self) -> &'static str {
        if self.access_flags & ACC_ANNOTATION != 0 {
            "@interface"
        } else if self.access_flags & ACC_INTERFACE != 0 {
            "interface"
        } else if self.access_flags & ACC_ENUM != 0 {
            "enum"
        } else {
            "class"
        }
    }
}

/// `Lcom/example/Main;` → `com.example.Main`.
pub fn descriptor_to_qualified(descriptor: &str) -> Result<String> {
    let inner = descriptor
        .strip_prefix('L')
        .and_then(|d| d.strip_suffix(';'));
    match inner {
        Some(inner) if !inner.is_empty() => Ok(inner.replace('/', ".")),
        _ => bail!("not a class descriptor: {descriptor:?}"),
    }
}

/// `com/example/Main` → `com.example.Main` (class-file internal form).
pub fn internal_to_qualified(internal: &str) -> String {
    internal.replace(['/', '\\'], ".")
}

/// `com.example.Main` → `Lcom/example/Main;` for the smali listing.
pub fn qualified_to_descriptor(qualified: &str) -> String {
    format!("L{};", qualified.replace('.', "/"))
}
