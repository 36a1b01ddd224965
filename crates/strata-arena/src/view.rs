//! Field access through compiled layouts.
//!
//! Views are short-lived borrows of an arena plus a layout. Inline fields
//! are found at a fixed offset; indirect fields are found by reading the
//! pointer cell and translating the stored absolute address, so a view
//! sees the same data before and after the arena moves.

use strata_core::{ScalarType, Value, ValueError};
use strata_layout::{FieldLayout, ObjectLayout, Storage};

use crate::arena::Arena;
use crate::error::ArenaError;

fn kind_mismatch(field: &FieldLayout, expected: &'static str) -> ArenaError {
    ArenaError::FieldKindMismatch {
        field: field.name.clone(),
        expected,
    }
}

fn index_out_of_bounds(field: &FieldLayout, index: u64) -> ArenaError {
    ArenaError::IndexOutOfBounds {
        field: field.name.clone(),
        index,
        len: field.count(),
    }
}

fn scalar_type(field: &FieldLayout) -> Result<ScalarType, ArenaError> {
    field.scalar().ok_or_else(|| kind_mismatch(field, "a scalar"))
}

fn encode_scalar(
    field: &FieldLayout,
    ty: ScalarType,
    value: &Value,
    out: &mut [u8],
) -> Result<(), ArenaError> {
    ty.encode(value, out).map_err(|e| match e {
        ValueError::OutOfRange { value, .. } => ArenaError::ValueOutOfRange {
            field: field.name.clone(),
            value,
        },
        ValueError::NotScalar => kind_mismatch(field, "a list"),
    })
}

/// Encode an initializer into a field's data bytes.
///
/// A single value fills a scalar field; a list fills a prefix of an
/// array field.
pub(crate) fn encode_field(
    field: &FieldLayout,
    value: &Value,
    data: &mut [u8],
) -> Result<(), ArenaError> {
    let ty = scalar_type(field)?;
    let elem = field.elem_size as usize;
    match (field.len, value) {
        (None, Value::List(_)) => Err(kind_mismatch(field, "an array")),
        (None, v) => encode_scalar(field, ty, v, &mut data[..elem]),
        (Some(len), Value::List(items)) => {
            if items.len() as u64 > len {
                return Err(index_out_of_bounds(field, len));
            }
            for (i, item) in items.iter().enumerate() {
                encode_scalar(field, ty, item, &mut data[i * elem..(i + 1) * elem])?;
            }
            Ok(())
        }
        (Some(_), _) => Err(kind_mismatch(field, "a single scalar")),
    }
}

/// Find `name` in `layout` and resolve the store offset of its data.
fn locate<'l>(
    arena: &Arena,
    object: u64,
    layout: &'l ObjectLayout,
    name: &str,
) -> Result<(&'l FieldLayout, u64), ArenaError> {
    let field = layout.field(name).ok_or_else(|| ArenaError::UnknownField {
        field: name.to_owned(),
    })?;
    let data = match field.storage {
        Storage::Inline => object + field.offset,
        Storage::Indirect { .. } => {
            let address = arena.word_checked(object + field.offset)?;
            let data = arena.translate(address)?;
            // The whole field must lie in the store.
            arena.bytes_at(data, field.size)?;
            data
        }
    };
    Ok((field, data))
}

fn element(field: &FieldLayout, data: u64, index: u64) -> Result<u64, ArenaError> {
    if index >= field.count() {
        return Err(index_out_of_bounds(field, index));
    }
    Ok(data + index * field.elem_size)
}

/// Read access to one object (or one nested record).
#[derive(Clone, Copy)]
pub struct ObjectView<'a> {
    arena: &'a Arena,
    offset: u64,
    layout: &'a ObjectLayout,
}

impl<'a> ObjectView<'a> {
    pub(crate) fn new(arena: &'a Arena, offset: u64, layout: &'a ObjectLayout) -> Self {
        Self {
            arena,
            offset,
            layout,
        }
    }

    /// Current absolute address of the record.
    pub fn address(&self) -> u64 {
        self.arena.base().wrapping_add(self.offset)
    }

    /// The record's layout.
    pub fn layout(&self) -> &'a ObjectLayout {
        self.layout
    }

    /// Read a scalar field.
    pub fn get(&self, name: &str) -> Result<Value, ArenaError> {
        let (field, data) = locate(self.arena, self.offset, self.layout, name)?;
        let ty = scalar_type(field)?;
        if field.is_array() {
            return Err(kind_mismatch(field, "a single scalar"));
        }
        Ok(ty.decode(self.arena.bytes_at(data, field.elem_size)?))
    }

    /// View an array field.
    pub fn array(&self, name: &str) -> Result<ArrayView<'a>, ArenaError> {
        let (field, data) = locate(self.arena, self.offset, self.layout, name)?;
        if !field.is_array() {
            return Err(kind_mismatch(field, "an array"));
        }
        Ok(ArrayView {
            arena: self.arena,
            data,
            field,
        })
    }

    /// View a nested record field.
    pub fn record(&self, name: &str) -> Result<ObjectView<'a>, ArenaError> {
        let (field, data) = locate(self.arena, self.offset, self.layout, name)?;
        let child = field
            .record()
            .filter(|_| !field.is_array())
            .ok_or_else(|| kind_mismatch(field, "a single record"))?;
        Ok(ObjectView::new(self.arena, data, child))
    }
}

impl std::fmt::Debug for ObjectView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectView")
            .field("layout", &self.layout.name)
            .field("offset", &self.offset)
            .finish()
    }
}

/// Read access to an array field.
#[derive(Clone, Copy)]
pub struct ArrayView<'a> {
    arena: &'a Arena,
    data: u64,
    field: &'a FieldLayout,
}

impl<'a> ArrayView<'a> {
    /// Number of elements.
    pub fn len(&self) -> u64 {
        self.field.count()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read element `index` of a scalar array.
    pub fn get(&self, index: u64) -> Result<Value, ArenaError> {
        let ty = scalar_type(self.field)?;
        let at = element(self.field, self.data, index)?;
        Ok(ty.decode(self.arena.bytes_at(at, self.field.elem_size)?))
    }

    /// Read every element of a scalar array.
    pub fn to_vec(&self) -> Result<Vec<Value>, ArenaError> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// View element `index` of a record array.
    pub fn record(&self, index: u64) -> Result<ObjectView<'a>, ArenaError> {
        let child = self
            .field
            .record()
            .ok_or_else(|| kind_mismatch(self.field, "a record array"))?;
        let at = element(self.field, self.data, index)?;
        Ok(ObjectView::new(self.arena, at, child))
    }
}

impl std::fmt::Debug for ArrayView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayView")
            .field("field", &self.field.name)
            .field("len", &self.len())
            .finish()
    }
}

/// Write access to one object (or one nested record).
///
/// Constant fields reject every write; a constant record field rejects
/// writes to all of its members.
pub struct ObjectViewMut<'a> {
    arena: &'a mut Arena,
    offset: u64,
    layout: &'a ObjectLayout,
}

impl<'a> ObjectViewMut<'a> {
    pub(crate) fn new(arena: &'a mut Arena, offset: u64, layout: &'a ObjectLayout) -> Self {
        Self {
            arena,
            offset,
            layout,
        }
    }

    /// Read-only view of the same record.
    pub fn as_view(&self) -> ObjectView<'_> {
        ObjectView::new(&*self.arena, self.offset, self.layout)
    }

    /// Read a scalar field.
    pub fn get(&self, name: &str) -> Result<Value, ArenaError> {
        self.as_view().get(name)
    }

    /// Locate a writable field.
    fn writable(&self, name: &str) -> Result<(&'a FieldLayout, u64), ArenaError> {
        let (field, data) = locate(&*self.arena, self.offset, self.layout, name)?;
        if field.constant {
            return Err(ArenaError::ImmutableField {
                field: field.name.clone(),
            });
        }
        Ok((field, data))
    }

    /// Write a scalar field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ArenaError> {
        let (field, data) = self.writable(name)?;
        if field.is_array() {
            return Err(kind_mismatch(field, "a single scalar"));
        }
        let ty = scalar_type(field)?;
        let out = self.arena.bytes_mut_at(data, field.elem_size)?;
        encode_scalar(field, ty, &value.into(), out)
    }

    /// Write element `index` of a scalar array.
    pub fn set_index(
        &mut self,
        name: &str,
        index: u64,
        value: impl Into<Value>,
    ) -> Result<(), ArenaError> {
        let (field, data) = self.writable(name)?;
        if !field.is_array() {
            return Err(kind_mismatch(field, "an array"));
        }
        let ty = scalar_type(field)?;
        let at = element(field, data, index)?;
        let out = self.arena.bytes_mut_at(at, field.elem_size)?;
        encode_scalar(field, ty, &value.into(), out)
    }

    /// Overwrite a prefix of a scalar array.
    pub fn set_array(&mut self, name: &str, values: &[Value]) -> Result<(), ArenaError> {
        let (field, data) = self.writable(name)?;
        if !field.is_array() {
            return Err(kind_mismatch(field, "an array"));
        }
        // Encode into a scratch copy so a bad element leaves the field untouched.
        let mut scratch = self.arena.bytes_at(data, field.size)?.to_vec();
        encode_field(field, &Value::List(values.to_vec()), &mut scratch)?;
        self.arena
            .bytes_mut_at(data, field.size)?
            .copy_from_slice(&scratch);
        Ok(())
    }

    /// Write access to a nested record field.
    pub fn record_mut(&mut self, name: &str) -> Result<ObjectViewMut<'_>, ArenaError> {
        let (field, data) = self.writable(name)?;
        let child = field
            .record()
            .filter(|_| !field.is_array())
            .ok_or_else(|| kind_mismatch(field, "a single record"))?;
        Ok(ObjectViewMut::new(&mut *self.arena, data, child))
    }

    /// Write access to element `index` of a record array.
    pub fn record_at_mut(
        &mut self,
        name: &str,
        index: u64,
    ) -> Result<ObjectViewMut<'_>, ArenaError> {
        let (field, data) = self.writable(name)?;
        let child = field
            .record()
            .filter(|_| field.is_array())
            .ok_or_else(|| kind_mismatch(field, "a record array"))?;
        let at = element(field, data, index)?;
        Ok(ObjectViewMut::new(&mut *self.arena, at, child))
    }
}
