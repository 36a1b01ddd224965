//! C declaration and debug-print text for compiled layouts.
//!
//! Output is plain text for external tooling (debuggers, C readers of
//! saved images). Structs are wrapped in `#pragma pack(1)` with explicit
//! `_padN` members so the C layout matches [`ObjectLayout`] byte for byte
//! regardless of the C compiler's own alignment rules.
//!
//! [`StructDecls`] and [`Printers`] render through [`fmt::Display`], so the
//! text can be streamed into any [`fmt::Write`] sink; [`emit_struct`] and
//! [`emit_printer`] collect it into a `String`.

use std::fmt;

use crate::layout::{FieldLayout, LayoutKind, ObjectLayout};

/// Struct declarations for a layout and every nested record type.
///
/// Nested records are declared first, once per distinct record name.
#[derive(Clone, Copy, Debug)]
pub struct StructDecls<'a> {
    layout: &'a ObjectLayout,
}

impl<'a> StructDecls<'a> {
    /// Declarations for `layout`.
    pub fn new(layout: &'a ObjectLayout) -> Self {
        Self { layout }
    }
}

impl fmt::Display for StructDecls<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#include <stdint.h>\n\n#pragma pack(push, 1)\n")?;
        for l in dependency_order(self.layout) {
            write_struct(f, l)?;
        }
        f.write_str("#pragma pack(pop)\n")
    }
}

/// `print_<name>` routines for a layout and its nested record types.
///
/// Each routine takes the struct pointer and an indent depth.
#[derive(Clone, Copy, Debug)]
pub struct Printers<'a> {
    layout: &'a ObjectLayout,
}

impl<'a> Printers<'a> {
    /// Printers for `layout`.
    pub fn new(layout: &'a ObjectLayout) -> Self {
        Self { layout }
    }
}

impl fmt::Display for Printers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#include <inttypes.h>\n#include <stdio.h>\n\n")?;
        for l in dependency_order(self.layout) {
            write_printer(f, l)?;
        }
        Ok(())
    }
}

/// Emit struct declarations for `layout` and every nested record type.
pub fn emit_struct(layout: &ObjectLayout) -> String {
    StructDecls::new(layout).to_string()
}

/// Emit `print_<name>` routines for `layout` and its nested record types.
pub fn emit_printer(layout: &ObjectLayout) -> String {
    Printers::new(layout).to_string()
}

/// Post-order walk over record types, deduplicated by name.
fn dependency_order(layout: &ObjectLayout) -> Vec<&ObjectLayout> {
    fn visit<'a>(layout: &'a ObjectLayout, out: &mut Vec<&'a ObjectLayout>) {
        for field in &layout.fields {
            if let LayoutKind::Record(child) = &field.kind {
                visit(child, out);
            }
        }
        if !out.iter().any(|l| l.name == layout.name) {
            out.push(layout);
        }
    }
    let mut out = Vec::new();
    visit(layout, &mut out);
    out
}

fn c_type(field: &FieldLayout) -> String {
    match &field.kind {
        LayoutKind::Scalar(ty) => ty.native_name().to_string(),
        LayoutKind::Record(child) => format!("struct {}", child.name),
    }
}

fn write_struct(out: &mut fmt::Formatter<'_>, layout: &ObjectLayout) -> fmt::Result {
    writeln!(out, "struct {} {{", layout.name)?;

    // Members sorted by where their bytes live in the object.
    let mut members: Vec<&FieldLayout> = layout.fields.iter().collect();
    members.sort_by_key(|f| f.offset);

    let mut cursor = 0u64;
    let mut pad = 0usize;
    for field in members {
        let width = if field.is_indirect() { 8 } else { field.size };
        if width == 0 {
            writeln!(out, "    /* {}: empty */", field.name)?;
            continue;
        }
        if field.offset > cursor {
            writeln!(out, "    uint8_t _pad{pad}[{}];", field.offset - cursor)?;
            pad += 1;
        }
        let ty = c_type(field);
        let decl = match (field.is_indirect(), field.len) {
            (true, _) => format!("{ty} *{}", field.name),
            (false, Some(n)) => format!("{ty} {}[{n}]", field.name),
            (false, None) => format!("{ty} {}", field.name),
        };
        writeln!(out, "    {decl}; /* +{} */", field.offset)?;
        cursor = field.offset + width;
    }
    if layout.size > cursor {
        writeln!(out, "    uint8_t _storage[{}];", layout.size - cursor)?;
    }
    writeln!(out, "}};")?;
    writeln!(
        out,
        "_Static_assert(sizeof(struct {0}) == {1}, \"struct {0} must be {1} bytes\");\n",
        layout.name, layout.size
    )
}

fn write_printer(out: &mut fmt::Formatter<'_>, layout: &ObjectLayout) -> fmt::Result {
    writeln!(
        out,
        "void print_{0}(const struct {0} *p, int depth)\n{{",
        layout.name
    )?;
    for field in &layout.fields {
        if field.size == 0 {
            continue;
        }
        let repeated = field.is_array() || field.is_indirect();
        let access = if repeated {
            format!("p->{}[i]", field.name)
        } else {
            format!("p->{}", field.name)
        };
        let (open, close, label) = if repeated {
            (
                format!("    for (uint64_t i = 0; i < {}; i++) {{\n", field.count()),
                "    }\n",
                format!("\"{}[%\" PRIu64 \"]\"", field.name),
            )
        } else {
            (String::new(), "", format!("\"{}\"", field.name))
        };
        let label_args = if open.is_empty() { "" } else { ", i" };
        out.write_str(&open)?;
        match &field.kind {
            LayoutKind::Scalar(ty) => {
                writeln!(
                    out,
                    "        printf(\"%*s\" {label} \" = \" {} \"\\n\", depth * 2, \"\"{label_args}, {access});",
                    ty.format_spec()
                )?;
            }
            LayoutKind::Record(child) => {
                writeln!(
                    out,
                    "        printf(\"%*s\" {label} \":\\n\", depth * 2, \"\"{label_args});"
                )?;
                writeln!(out, "        print_{}(&{access}, depth + 1);", child.name)?;
            }
        }
        out.write_str(close)?;
    }
    writeln!(out, "}}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::schema::{Length, Schema};
    use strata_core::{Args, TypeCatalog};

    fn mesh() -> ObjectLayout {
        let point = Schema::builder("point")
            .scalar("x", "real")
            .scalar("y", "real")
            .build()
            .unwrap();
        let mesh = Schema::builder("mesh")
            .scalar("n", "uint32")
            .array("weights", "f32", Length::fixed(3))
            .record("origin", point)
            .array("samples", "real", Length::arg("n"))
            .indirect()
            .build()
            .unwrap();
        compile(&mesh, &Args::new().with("n", 2), &TypeCatalog::standard()).unwrap()
    }

    #[test]
    fn struct_declares_nested_types_first() {
        let text = emit_struct(&mesh());
        let point_at = text.find("struct point {").unwrap();
        let mesh_at = text.find("struct mesh {").unwrap();
        assert!(point_at < mesh_at);
        assert_eq!(text.matches("struct point {").count(), 1);
    }

    #[test]
    fn struct_has_explicit_padding_and_size_assert() {
        let text = emit_struct(&mesh());
        // n is 4 bytes at +0, weights starts at +8.
        assert!(text.contains("uint32_t n; /* +0 */"));
        assert!(text.contains("uint8_t _pad0[4];"));
        assert!(text.contains("float weights[3]; /* +8 */"));
        assert!(text.contains("struct point origin; /* +24 */"));
        assert!(text.contains("double *samples; /* +40 */"));
        assert!(text.contains("uint8_t _storage[16];"));
        assert!(text.contains("sizeof(struct mesh) == 64"));
    }

    #[test]
    fn printer_uses_catalog_format_specs() {
        let text = emit_printer(&mesh());
        assert!(text.contains("void print_mesh(const struct mesh *p, int depth)"));
        assert!(text.contains("\"%\" PRIu32"));
        assert!(text.contains("for (uint64_t i = 0; i < 3; i++)"));
        assert!(text.contains("print_point(&p->origin, depth + 1);"));
        assert!(text.contains("p->samples[i]"));
    }

    /// Accepts `budget` bytes, then fails every write.
    struct Limited {
        budget: usize,
        written: String,
    }

    impl fmt::Write for Limited {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if s.len() > self.budget {
                return Err(fmt::Error);
            }
            self.budget -= s.len();
            self.written.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn sink_errors_stop_emission() {
        use std::fmt::Write as _;

        let layout = mesh();
        let full = emit_struct(&layout);
        let mut sink = Limited {
            budget: full.len() / 2,
            written: String::new(),
        };
        assert!(write!(sink, "{}", StructDecls::new(&layout)).is_err());
        assert!(sink.written.len() <= full.len() / 2);
        assert!(full.starts_with(&sink.written));

        let mut sink = Limited {
            budget: 0,
            written: String::new(),
        };
        assert!(write!(sink, "{}", Printers::new(&layout)).is_err());
        assert!(sink.written.is_empty());
    }

    #[test]
    fn display_matches_emitted_text() {
        let layout = mesh();
        assert_eq!(format!("{}", StructDecls::new(&layout)), emit_struct(&layout));
        assert_eq!(format!("{}", Printers::new(&layout)), emit_printer(&layout));
    }
}
