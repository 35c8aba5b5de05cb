//! The render seam.
//!
//! Turning a [`ClassUnit`] into text is the job of an external collaborator
//! behind the [`Render`] trait; the pipeline only cares that the result is a
//! string allocated in the task's arena. The built-in [`SkeletonRenderer`]
//! emits declaration-level Java source and a smali-style listing, which is
//! enough to drive the pipeline end to end; a full decompiler plugs in by
//! implementing the trait.

use anyhow::Result;
use bumpalo::collections::String as BumpString;

use crate::arena::TaskArena;
use crate::meta::{ClassUnit, ContainerMetadata, qualified_to_descriptor};

pub trait Render: Send + Sync {
    /// Reconstructed source for one class. Nested classes are rendered as
    /// part of their enclosing class, so callers only pass top-level units.
    fn render_source<'a>(
        &self,
        arena: &'a TaskArena,
        meta: &ContainerMetadata,
        class: &ClassUnit,
    ) -> Result<&'a str>;

    /// Assembly-level listing for one class, nested or not.
    fn render_assembly<'a>(
        &self,
        arena: &'a TaskArena,
        meta: &ContainerMetadata,
        class: &ClassUnit,
    ) -> Result<&'a str>;
}

pub struct SkeletonRenderer;

impl Render for SkeletonRenderer {
    fn render_source<'a>(
        &self,
        arena: &'a TaskArena,
        meta: &ContainerMetadata,
        class: &ClassUnit,
    ) -> Result<&'a str> {
        let mut out = BumpString::new_in(arena.bump());
        if let Some(pkg) = class.package() {
            out.push_str("package ");
            out.push_str(pkg);
            out.push_str(";\n\n");
        }

        let mods = class.modifiers();
        if !mods.is_empty() {
            out.push_str(&mods);
            out.push(' ');
        }
        out.push_str(class.kind_keyword());
        out.push(' ');
        out.push_str(class.simple_name());
        if let Some(superclass) = class.superclass.as_deref()
            && superclass != "java.lang.Object"
            && class.kind_keyword() == "class"
        {
            out.push_str(" extends ");
            out.push_str(superclass);
        }
        out.push_str(" {\n");

        // nested classes are folded into the top-level unit's body
        for nested in &meta.classes {
            let belongs = nested
                .qualified_name
                .strip_prefix(class.qualified_name.as_str())
                .is_some_and(|rest| rest.starts_with('$'));
            if belongs && nested.is_nested() && !nested.is_anonymous() {
                out.push_str("    ");
                let nested_mods = nested.modifiers();
                if !nested_mods.is_empty() {
                    out.push_str(&nested_mods);
                    out.push(' ');
                }
                out.push_str(nested.kind_keyword());
                out.push(' ');
                out.push_str(nested.simple_name().rsplit('$').next().unwrap_or(""));
                out.push_str(" {\n    }\n");
            }
        }

        out.push_str("}\n");
        Ok(out.into_bump_str())
    }

    fn render_assembly<'a>(
        &self,
        arena: &'a TaskArena,
        _meta: &ContainerMetadata,
        class: &ClassUnit,
    ) -> Result<&'a str> {
        let mut out = BumpString::new_in(arena.bump());
        out.push_str(".class ");
        let mods = class.modifiers();
        if !mods.is_empty() {
            out.push_str(&mods);
            out.push(' ');
        }
        if class.kind_keyword() != "class" {
            out.push_str(class.kind_keyword().trim_start_matches('@'));
            out.push(' ');
        }
        out.push_str(&qualified_to_descriptor(&class.qualified_name));
        out.push('\n');

        out.push_str(".super ");
        out.push_str(&qualified_to_descriptor(
            class.superclass.as_deref().unwrap_or("java.lang.Object"),
        ));
        out.push('\n');

        if let Some(source) = class.source_file.as_deref() {
            out.push_str(".source \"");
            out.push_str(source);
            out.push_str("\"\n");
        }
        Ok(out.into_bump_str())
    }
}
