//! Compiled, offset-resolved record layouts.

use std::sync::Arc;

use smallvec::SmallVec;
use strata_core::ScalarType;

/// Compiled element type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    /// A scalar resolved through the catalog.
    Scalar(ScalarType),
    /// A nested record, compiled with the parent's arguments.
    Record(Arc<ObjectLayout>),
}

/// Where a compiled field's data lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Storage {
    /// Data at [`FieldLayout::offset`].
    Inline,
    /// [`FieldLayout::offset`] names an 8-byte pointer cell; the data is
    /// appended at object-relative `target`.
    Indirect {
        /// Object-relative offset of the pointed-to data.
        target: u64,
    },
}

/// A pointer cell that holds an absolute address inside the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fixup {
    /// Object-relative offset of the 8-byte cell.
    pub cell: u64,
    /// Object-relative offset the cell points to at construction.
    pub target: u64,
}

/// One field of an [`ObjectLayout`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    /// Field name.
    pub name: String,
    /// Element type.
    pub kind: LayoutKind,
    /// `None` for a single element, `Some(n)` for an array of `n`.
    pub len: Option<u64>,
    /// Size of one element in bytes.
    pub elem_size: u64,
    /// Size of the field data (`elem_size * count`).
    pub size: u64,
    /// Object-relative offset. For indirect fields this is the pointer cell.
    pub offset: u64,
    /// Alignment the offset satisfies.
    pub align: u64,
    /// Inline or indirect.
    pub storage: Storage,
    /// Immutable after construction.
    pub constant: bool,
}

impl FieldLayout {
    /// Number of elements (1 for a non-array field).
    pub fn count(&self) -> u64 {
        self.len.unwrap_or(1)
    }

    /// Whether this field is an array.
    pub fn is_array(&self) -> bool {
        self.len.is_some()
    }

    /// Whether this field is reached through a pointer cell.
    pub fn is_indirect(&self) -> bool {
        matches!(self.storage, Storage::Indirect { .. })
    }

    /// Object-relative offset of the data as laid out at construction.
    pub fn data_offset(&self) -> u64 {
        match self.storage {
            Storage::Inline => self.offset,
            Storage::Indirect { target } => target,
        }
    }

    /// Scalar element type, if this is a scalar field.
    pub fn scalar(&self) -> Option<ScalarType> {
        match &self.kind {
            LayoutKind::Scalar(ty) => Some(*ty),
            LayoutKind::Record(_) => None,
        }
    }

    /// Nested layout, if this is a record field.
    pub fn record(&self) -> Option<&Arc<ObjectLayout>> {
        match &self.kind {
            LayoutKind::Record(layout) => Some(layout),
            LayoutKind::Scalar(_) => None,
        }
    }
}

/// The compiled layout of one record for one set of arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectLayout {
    /// Record name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldLayout>,
    /// Total size in bytes, a multiple of [`ObjectLayout::UNIT`].
    pub size: u64,
    /// Object alignment (at least [`ObjectLayout::UNIT`]).
    pub align: u64,
    /// Every pointer cell in the object, nested records included.
    pub fixups: SmallVec<[Fixup; 4]>,
}

impl ObjectLayout {
    /// Arena storage unit; object sizes are padded to a multiple of it.
    pub const UNIT: u64 = 8;

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Pointer cell offsets to register with the arena at allocation.
    pub fn pointer_cells(&self) -> Vec<u64> {
        self.fixups.iter().map(|f| f.cell).collect()
    }

    /// End of the direct (inline) field area.
    pub fn direct_end(&self) -> u64 {
        self.fields
            .iter()
            .filter(|f| !f.is_indirect())
            .map(|f| f.offset + f.size)
            .max()
            .unwrap_or(0)
    }
}
