//! Two-pass layout compilation.
//!
//! Pass 1 places every inline field in declaration order, padding each
//! offset up to the field's alignment. Pass 2 appends one 8-byte pointer
//! cell per indirect field, then the indirect fields' data in declaration
//! order, again honouring alignment. The object is padded to its own
//! alignment, which is never below [`ObjectLayout::UNIT`].
//!
//! Compilation is pure: the same schema, arguments and catalog always
//! produce an identical layout.

use smallvec::SmallVec;
use strata_core::{Args, TypeCatalog};

use crate::error::LayoutError;
use crate::layout::{FieldLayout, Fixup, LayoutKind, ObjectLayout, Storage};
use crate::schema::{FieldDecl, FieldKind, Schema, StorageMode};

/// Size and alignment of a pointer cell.
const POINTER_SIZE: u64 = 8;

/// A field whose element type and length are known but not yet placed.
struct SizedField<'s> {
    decl: &'s FieldDecl,
    kind: LayoutKind,
    len: Option<u64>,
    elem_size: u64,
    size: u64,
    align: u64,
}

fn align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

fn overflow(field: &str) -> LayoutError {
    LayoutError::SizeOverflow {
        field: field.to_string(),
    }
}

/// Compile `schema` for `args`, resolving scalar names through `catalog`.
///
/// Nested records are compiled recursively with the same arguments, so a
/// nested record's size can itself depend on the arguments.
pub fn compile(
    schema: &Schema,
    args: &Args,
    catalog: &TypeCatalog,
) -> Result<ObjectLayout, LayoutError> {
    let sized = schema
        .fields()
        .iter()
        .map(|decl| size_field(decl, args, catalog))
        .collect::<Result<Vec<_>, _>>()?;

    let mut placed: Vec<Option<FieldLayout>> = vec![None; sized.len()];
    let mut fixups: SmallVec<[Fixup; 4]> = SmallVec::new();
    let mut cursor = 0u64;

    // Pass 1: direct fields.
    for (i, field) in sized.iter().enumerate() {
        if field.decl.storage != StorageMode::Inline {
            continue;
        }
        let name = &field.decl.name;
        let offset = align_up(cursor, field.align).ok_or_else(|| overflow(name))?;
        cursor = offset.checked_add(field.size).ok_or_else(|| overflow(name))?;
        lift_fixups(&mut fixups, field, offset)?;
        placed[i] = Some(place(field, offset, Storage::Inline));
    }

    // Pass 2a: pointer cells.
    let mut cells = Vec::new();
    for (i, field) in sized.iter().enumerate() {
        if field.decl.storage != StorageMode::Indirect {
            continue;
        }
        let cell = align_up(cursor, POINTER_SIZE).ok_or_else(|| overflow(&field.decl.name))?;
        cursor = cell
            .checked_add(POINTER_SIZE)
            .ok_or_else(|| overflow(&field.decl.name))?;
        cells.push((i, cell));
    }

    // Pass 2b: indirect targets.
    for (i, cell) in cells {
        let field = &sized[i];
        let name = &field.decl.name;
        let target = align_up(cursor, field.align).ok_or_else(|| overflow(name))?;
        cursor = target.checked_add(field.size).ok_or_else(|| overflow(name))?;
        fixups.push(Fixup { cell, target });
        lift_fixups(&mut fixups, field, target)?;
        placed[i] = Some(place(field, cell, Storage::Indirect { target }));
    }

    let align = sized
        .iter()
        .map(|f| f.align)
        .fold(ObjectLayout::UNIT, u64::max);
    let size = align_up(cursor, align).ok_or_else(|| overflow(schema.name()))?;

    Ok(ObjectLayout {
        name: schema.name().to_string(),
        fields: placed.into_iter().flatten().collect(),
        size,
        align,
        fixups,
    })
}

fn size_field<'s>(
    decl: &'s FieldDecl,
    args: &Args,
    catalog: &TypeCatalog,
) -> Result<SizedField<'s>, LayoutError> {
    let (kind, elem_size, elem_align) = match &decl.kind {
        FieldKind::Scalar(type_name) => {
            let ty = catalog
                .get(type_name)
                .ok_or_else(|| LayoutError::UnknownScalarType {
                    field: decl.name.clone(),
                    name: type_name.clone(),
                })?;
            (LayoutKind::Scalar(ty), ty.size(), 1)
        }
        FieldKind::Record(schema) => {
            let child = compile(schema, args, catalog)?;
            let (size, align) = (child.size, child.align);
            (LayoutKind::Record(child.into()), size, align)
        }
    };
    let len = decl
        .length
        .as_ref()
        .map(|length| {
            length
                .resolve(args)
                .map_err(|reason| LayoutError::LengthResolution {
                    field: decl.name.clone(),
                    reason,
                })
        })
        .transpose()?;
    let size = elem_size
        .checked_mul(len.unwrap_or(1))
        .ok_or_else(|| overflow(&decl.name))?;
    Ok(SizedField {
        decl,
        kind,
        len,
        elem_size,
        size,
        align: decl.align.max(elem_align),
    })
}

fn place(field: &SizedField<'_>, offset: u64, storage: Storage) -> FieldLayout {
    FieldLayout {
        name: field.decl.name.clone(),
        kind: field.kind.clone(),
        len: field.len,
        elem_size: field.elem_size,
        size: field.size,
        offset,
        align: field.align,
        storage,
        constant: field.decl.constant,
    }
}

/// Copy a nested record's pointer cells into the parent, once per element.
fn lift_fixups(
    fixups: &mut SmallVec<[Fixup; 4]>,
    field: &SizedField<'_>,
    origin: u64,
) -> Result<(), LayoutError> {
    let LayoutKind::Record(child) = &field.kind else {
        return Ok(());
    };
    if child.fixups.is_empty() {
        return Ok(());
    }
    for i in 0..field.len.unwrap_or(1) {
        // Bounded by `size`, which was already checked for overflow.
        let element = origin + i * field.elem_size;
        for f in &child.fixups {
            fixups.push(Fixup {
                cell: element + f.cell,
                target: element + f.target,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Length;
    use strata_core::ScalarType;

    fn catalog() -> TypeCatalog {
        TypeCatalog::standard()
    }

    #[test]
    fn scalar_then_small_array_pads_to_unit() {
        let schema = Schema::builder("s")
            .scalar("a", "i64")
            .array("b", "i32", Length::fixed(3))
            .build()
            .unwrap();
        let layout = compile(&schema, &Args::new(), &catalog()).unwrap();
        let a = layout.field("a").unwrap();
        let b = layout.field("b").unwrap();
        assert_eq!((a.offset, a.size), (0, 8));
        assert_eq!((b.offset, b.size), (8, 12));
        assert_eq!(layout.size, 24);
    }

    #[test]
    fn following_aligned_field_starts_at_next_boundary() {
        let schema = Schema::builder("s")
            .scalar("a", "i64")
            .array("b", "i32", Length::fixed(3))
            .scalar("c", "f64")
            .build()
            .unwrap();
        let layout = compile(&schema, &Args::new(), &catalog()).unwrap();
        assert_eq!(layout.field("c").unwrap().offset, 24);
        assert_eq!(layout.size, 32);
    }

    #[test]
    fn reduced_alignment_packs_tighter() {
        let schema = Schema::builder("s")
            .scalar("a", "u8")
            .align(1)
            .scalar("b", "u16")
            .align(2)
            .scalar("c", "u32")
            .align(4)
            .build()
            .unwrap();
        let layout = compile(&schema, &Args::new(), &catalog()).unwrap();
        assert_eq!(layout.field("b").unwrap().offset, 2);
        assert_eq!(layout.field("c").unwrap().offset, 4);
        assert_eq!(layout.size, 8);
    }

    #[test]
    fn length_from_argument() {
        let schema = Schema::builder("s")
            .scalar("n", "index")
            .array("xs", "real", Length::arg("n"))
            .build()
            .unwrap();
        let layout = compile(&schema, &Args::new().with("n", 5u64), &catalog()).unwrap();
        let xs = layout.field("xs").unwrap();
        assert_eq!(xs.len, Some(5));
        assert_eq!(xs.size, 40);
        assert_eq!(layout.size, 48);
    }

    #[test]
    fn unresolvable_length_is_an_error() {
        let schema = Schema::builder("s")
            .array("xs", "real", Length::arg("n"))
            .build()
            .unwrap();
        let err = compile(&schema, &Args::new(), &catalog()).unwrap_err();
        assert!(matches!(err, LayoutError::LengthResolution { ref field, .. } if field == "xs"));
    }

    #[test]
    fn unknown_scalar_is_an_error() {
        let schema = Schema::builder("s").scalar("q", "quad").build().unwrap();
        let err = compile(&schema, &Args::new(), &catalog()).unwrap_err();
        assert_eq!(
            err,
            LayoutError::UnknownScalarType {
                field: "q".into(),
                name: "quad".into()
            }
        );
    }

    #[test]
    fn pointer_cells_follow_direct_fields() {
        let schema = Schema::builder("s")
            .array("samples", "real", Length::fixed(4))
            .indirect()
            .scalar("a", "i64")
            .scalar("b", "i32")
            .build()
            .unwrap();
        let layout = compile(&schema, &Args::new(), &catalog()).unwrap();
        let samples = layout.field("samples").unwrap();
        // Declaration order is kept in `fields`.
        assert_eq!(layout.fields[0].name, "samples");
        assert_eq!(layout.field("a").unwrap().offset, 0);
        assert_eq!(layout.field("b").unwrap().offset, 8);
        assert_eq!(samples.offset, 16);
        assert_eq!(samples.storage, Storage::Indirect { target: 24 });
        assert_eq!(layout.size, 24 + 32);
        assert_eq!(layout.pointer_cells(), vec![16]);
        assert_eq!(layout.fixups[0], Fixup { cell: 16, target: 24 });
    }

    #[test]
    fn nested_record_size_depends_on_args() {
        let inner = Schema::builder("inner")
            .array("xs", "f32", Length::arg("n"))
            .build()
            .unwrap();
        let outer = Schema::builder("outer")
            .scalar("id", "integer")
            .record("body", inner)
            .build()
            .unwrap();
        let small = compile(&outer, &Args::new().with("n", 1), &catalog()).unwrap();
        let large = compile(&outer, &Args::new().with("n", 10), &catalog()).unwrap();
        assert_eq!(small.size, 16);
        assert_eq!(large.size, 8 + 40);
        let body = large.field("body").unwrap();
        assert_eq!(body.record().unwrap().size, 40);
    }

    #[test]
    fn nested_pointer_cells_are_lifted_per_element() {
        let inner = Schema::builder("inner")
            .scalar("tag", "u64")
            .scalar("payload", "real")
            .indirect()
            .build()
            .unwrap();
        let outer = Schema::builder("outer")
            .record_array("items", inner, Length::fixed(2))
            .build()
            .unwrap();
        let layout = compile(&outer, &Args::new(), &catalog()).unwrap();
        // inner: tag@0, cell@8, payload@16 → 24 bytes.
        assert_eq!(layout.field("items").unwrap().elem_size, 24);
        assert_eq!(
            layout.fixups.as_slice(),
            &[
                Fixup { cell: 8, target: 16 },
                Fixup { cell: 32, target: 40 },
            ]
        );
    }

    #[test]
    fn indirect_record_lifts_relative_to_target() {
        let inner = Schema::builder("inner")
            .scalar("v", "real")
            .indirect()
            .build()
            .unwrap();
        let outer = Schema::builder("outer")
            .scalar("id", "integer")
            .record("child", inner)
            .indirect()
            .build()
            .unwrap();
        let layout = compile(&outer, &Args::new(), &catalog()).unwrap();
        // id@0, child cell@8, child target@16 (inner: cell@0, v@8).
        assert_eq!(
            layout.fixups.as_slice(),
            &[
                Fixup { cell: 8, target: 16 },
                Fixup { cell: 16, target: 24 },
            ]
        );
        assert_eq!(layout.size, 32);
    }

    #[test]
    fn scalar_kind_resolved_through_catalog() {
        let mut catalog = TypeCatalog::empty();
        catalog.register("temperature", ScalarType::F32);
        let schema = Schema::builder("s").scalar("t", "temperature").build().unwrap();
        let layout = compile(&schema, &Args::new(), &catalog).unwrap();
        assert_eq!(layout.field("t").unwrap().scalar(), Some(ScalarType::F32));
        assert_eq!(layout.size, 8);
    }

    #[test]
    fn empty_schema_has_zero_size() {
        let schema = Schema::builder("empty").build().unwrap();
        let layout = compile(&schema, &Args::new(), &catalog()).unwrap();
        assert_eq!(layout.size, 0);
        assert!(layout.fixups.is_empty());
    }

    #[test]
    fn overflowing_size_is_an_error() {
        let schema = Schema::builder("s")
            .array("xs", "f64", Length::fixed(u64::MAX / 4))
            .build()
            .unwrap();
        let err = compile(&schema, &Args::new(), &catalog()).unwrap_err();
        assert!(matches!(err, LayoutError::SizeOverflow { .. }));
    }

    #[test]
    fn pointer_cell_past_the_address_space_is_an_error() {
        let schema = Schema::builder("s")
            .array("a", "u8", Length::fixed(u64::MAX - 7))
            .align(1)
            .scalar("p", "u64")
            .indirect()
            .build()
            .unwrap();
        let err = compile(&schema, &Args::new(), &catalog()).unwrap_err();
        assert!(matches!(err, LayoutError::SizeOverflow { field } if field == "p"));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        const TYPES: [&str; 6] = ["i8", "u16", "i32", "f32", "f64", "u64"];

        fn arb_schema() -> impl Strategy<Value = std::sync::Arc<Schema>> {
            prop::collection::vec(
                (0usize..TYPES.len(), 1u64..6, 0u32..4, any::<bool>(), any::<bool>()),
                1..10,
            )
            .prop_map(|fields| {
                let mut b = Schema::builder("generated");
                for (i, (ty, len, align_pow, is_array, indirect)) in fields.into_iter().enumerate() {
                    let name = format!("f{i}");
                    b = if is_array {
                        b.array(name, TYPES[ty], Length::fixed(len))
                    } else {
                        b.scalar(name, TYPES[ty])
                    };
                    b = b.align(1 << align_pow);
                    if indirect {
                        b = b.indirect();
                    }
                }
                b.build().unwrap()
            })
        }

        proptest! {
            #[test]
            fn compile_is_deterministic(schema in arb_schema()) {
                let a = compile(&schema, &Args::new(), &catalog()).unwrap();
                let b = compile(&schema, &Args::new(), &catalog()).unwrap();
                prop_assert_eq!(a, b);
            }

            #[test]
            fn offsets_aligned_increasing_and_disjoint(schema in arb_schema()) {
                let layout = compile(&schema, &Args::new(), &catalog()).unwrap();
                let mut extents: Vec<(u64, u64)> = Vec::new();
                for f in &layout.fields {
                    prop_assert_eq!(f.offset % if f.is_indirect() { 8 } else { f.align }, 0);
                    match f.storage {
                        Storage::Inline => extents.push((f.offset, f.size)),
                        Storage::Indirect { target } => {
                            prop_assert_eq!(target % f.align, 0);
                            extents.push((f.offset, 8));
                            extents.push((target, f.size));
                        }
                    }
                }
                extents.sort();
                for w in extents.windows(2) {
                    prop_assert!(w[0].0 < w[1].0);
                    prop_assert!(w[0].0 + w[0].1 <= w[1].0);
                }
                if let Some(&(start, len)) = extents.last() {
                    prop_assert!(start + len <= layout.size);
                }
                prop_assert_eq!(layout.size % ObjectLayout::UNIT, 0);
            }

            #[test]
            fn pointer_cells_above_every_direct_field(schema in arb_schema()) {
                let layout = compile(&schema, &Args::new(), &catalog()).unwrap();
                let direct_max = layout
                    .fields
                    .iter()
                    .filter(|f| !f.is_indirect())
                    .map(|f| f.offset)
                    .max();
                for f in layout.fields.iter().filter(|f| f.is_indirect()) {
                    if let Some(max) = direct_max {
                        prop_assert!(f.offset > max);
                    }
                    prop_assert!(f.offset >= layout.direct_end());
                }
                prop_assert_eq!(
                    layout.fixups.len(),
                    layout.fields.iter().filter(|f| f.is_indirect()).count()
                );
            }
        }
    }
}
