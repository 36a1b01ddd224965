//! Per-arena binding of type ids to schemas.
//!
//! Every arena owns its registry, so two arenas can bind the same
//! [`TypeId`] to different schemas without interfering.

use std::sync::Arc;

use indexmap::IndexMap;
use strata_core::TypeId;
use strata_layout::Schema;

use crate::error::ArenaError;

/// Maps each registered [`TypeId`] to the schema its objects were built from.
///
/// Uses `IndexMap` so iteration follows registration order.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    schemas: IndexMap<TypeId, Arc<Schema>>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `type_id` to `schema`.
    ///
    /// Re-registering an equal schema is a no-op; a different schema is a
    /// [`ArenaError::SchemaConflict`].
    pub fn register(&mut self, type_id: TypeId, schema: &Arc<Schema>) -> Result<(), ArenaError> {
        match self.schemas.get(&type_id) {
            Some(existing) if Arc::ptr_eq(existing, schema) || **existing == **schema => Ok(()),
            Some(_) => Err(ArenaError::SchemaConflict { type_id }),
            None => {
                self.schemas.insert(type_id, Arc::clone(schema));
                Ok(())
            }
        }
    }

    /// The schema bound to `type_id`.
    pub fn get(&self, type_id: TypeId) -> Option<&Arc<Schema>> {
        self.schemas.get(&type_id)
    }

    /// Iterate bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Arc<Schema>)> {
        self.schemas.iter().map(|(id, s)| (*id, s))
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
