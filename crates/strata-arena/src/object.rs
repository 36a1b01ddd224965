//! Typed objects: construction from a schema and attachment to existing
//! directory entries.

use std::sync::Arc;

use strata_core::{Args, TypeId};
use strata_layout::{compile, ObjectLayout, Schema};
use tracing::trace;

use crate::arena::Arena;
use crate::error::ArenaError;
use crate::format::WORD;
use crate::view::{encode_field, ObjectView, ObjectViewMut};

/// A handle to a typed object that survives relocation.
///
/// Holds the object's offset from the arena base, not its absolute
/// address, plus the compiled layout used to interpret it. Resolve it
/// against the arena it came from with [`Arena::view`] or
/// [`Arena::view_mut`].
#[derive(Clone, Debug)]
pub struct ObjectRef {
    offset: u64,
    type_id: TypeId,
    layout: Arc<ObjectLayout>,
}

impl ObjectRef {
    /// Offset of the object from the arena base.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The object's type id.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The layout the object is interpreted with.
    pub fn layout(&self) -> &Arc<ObjectLayout> {
        &self.layout
    }

    /// The object's current absolute address in `arena`.
    pub fn address(&self, arena: &Arena) -> u64 {
        arena.base().wrapping_add(self.offset)
    }
}

impl Arena {
    /// Bind `type_id` to `schema` in this arena's registry.
    pub fn register(&mut self, type_id: TypeId, schema: &Arc<Schema>) -> Result<(), ArenaError> {
        self.registry.register(type_id, schema)
    }

    /// Compile the layout of the schema registered under `type_id`.
    pub fn layout_for(&self, type_id: TypeId, args: &Args) -> Result<Arc<ObjectLayout>, ArenaError> {
        let schema = self
            .registry
            .get(type_id)
            .ok_or(ArenaError::UnregisteredType { type_id })?;
        Ok(Arc::new(compile(schema, args, &self.catalog)?))
    }

    /// Build an object of `schema` in the arena.
    ///
    /// Compiles the layout against `args`, allocates it with one fixup per
    /// indirect field, initializes every field named in `args` and points
    /// each pointer cell at its target. Arguments that name no field must
    /// be read by some length expression; anything else is an
    /// [`ArenaError::UnknownArgument`]. Constant fields may be set here
    /// and only here.
    ///
    /// Nothing is allocated if compilation or initialization fails.
    pub fn create_object(
        &mut self,
        type_id: TypeId,
        schema: &Arc<Schema>,
        args: &Args,
    ) -> Result<ObjectRef, ArenaError> {
        let layout = Arc::new(compile(schema, args, &self.catalog)?);
        if layout.size > isize::MAX as u64 {
            return Err(ArenaError::AddressSpaceExhausted {
                capacities: self.capacities(),
            });
        }

        let mut image = vec![0u8; layout.size as usize];
        for (name, value) in args.iter() {
            match layout.field(name) {
                Some(field) => {
                    let at = field.data_offset() as usize;
                    encode_field(field, value, &mut image[at..at + field.size as usize])?;
                }
                None if schema.references_arg(name) => {}
                None => return Err(ArenaError::UnknownArgument { name: name.into() }),
            }
        }
        self.registry.register(type_id, schema)?;

        let address = self.allocate(layout.size, type_id, &layout.pointer_cells())?;
        for fixup in &layout.fixups {
            let cell = fixup.cell as usize;
            let target = address.wrapping_add(fixup.target);
            image[cell..cell + WORD as usize].copy_from_slice(&target.to_le_bytes());
        }
        let offset = self.translate(address)?;
        self.bytes_mut_at(offset, layout.size)?.copy_from_slice(&image);
        trace!(address, type_id = type_id.0, name = %layout.name, "object created");
        Ok(ObjectRef {
            offset,
            type_id,
            layout,
        })
    }

    /// Attach `layout` to the existing object at `address`.
    ///
    /// The directory entry must exist and agree with the layout on type
    /// id and size; if a schema is registered for the id, its name must
    /// match the layout's.
    pub fn attach(
        &self,
        address: u64,
        type_id: TypeId,
        layout: Arc<ObjectLayout>,
    ) -> Result<ObjectRef, ArenaError> {
        let entry = self
            .entry(address)
            .ok_or(ArenaError::UnknownObject { address })?;
        let mismatch = |reason: String| ArenaError::LayoutMismatch { address, reason };
        if entry.type_id != type_id {
            return Err(mismatch(format!(
                "type id {} recorded, {type_id} requested",
                entry.type_id
            )));
        }
        if entry.size != layout.size {
            return Err(mismatch(format!(
                "{} bytes recorded, layout '{}' needs {}",
                entry.size, layout.name, layout.size
            )));
        }
        if let Some(schema) = self.registry.get(type_id) {
            if schema.name() != layout.name {
                return Err(mismatch(format!(
                    "type id {type_id} is '{}', layout is '{}'",
                    schema.name(),
                    layout.name
                )));
            }
        }
        Ok(ObjectRef {
            offset: self.translate(address)?,
            type_id,
            layout,
        })
    }

    /// Attach using the schema registered for the object's recorded type
    /// id, compiled against `args`.
    pub fn attach_registered(&self, address: u64, args: &Args) -> Result<ObjectRef, ArenaError> {
        let entry = self
            .entry(address)
            .ok_or(ArenaError::UnknownObject { address })?;
        let layout = self.layout_for(entry.type_id, args)?;
        self.attach(address, entry.type_id, layout)
    }

    /// Read access to an object.
    pub fn view<'a>(&'a self, object: &'a ObjectRef) -> ObjectView<'a> {
        ObjectView::new(self, object.offset, &object.layout)
    }

    /// Write access to an object.
    pub fn view_mut<'a>(&'a mut self, object: &'a ObjectRef) -> ObjectViewMut<'a> {
        ObjectViewMut::new(self, object.offset, &object.layout)
    }
}
