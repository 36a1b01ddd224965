//! Arena-specific error types.

use std::error::Error;
use std::fmt;
use std::io;

use strata_core::{TypeId, Value};
use strata_layout::LayoutError;

use crate::format::Capacities;

/// Errors that can occur during arena operations.
///
/// Running out of region capacity is never an error: it is resolved by
/// relocation before the operation proceeds.
#[derive(Debug)]
pub enum ArenaError {
    /// The configuration cannot produce an arena.
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },
    /// The requested capacities do not fit in the address space.
    AddressSpaceExhausted {
        /// The capacities that were requested.
        capacities: Capacities,
    },
    /// A pointer cell does not lie entirely inside its object.
    PointerOutsideObject {
        /// Object-relative cell offset.
        cell: u64,
        /// Object size.
        size: u64,
    },
    /// An absolute address outside the arena's store.
    AddressOutOfBounds {
        /// The address.
        address: u64,
    },
    /// A store offset outside the arena's store.
    OffsetOutOfBounds {
        /// The offset.
        offset: u64,
    },
    /// No directory entry has this address.
    UnknownObject {
        /// The address looked up.
        address: u64,
    },
    /// The type id is already bound to a different schema in this arena.
    SchemaConflict {
        /// The contested id.
        type_id: TypeId,
    },
    /// No schema is registered for this type id.
    UnregisteredType {
        /// The id looked up.
        type_id: TypeId,
    },
    /// Layout compilation failed.
    Layout(LayoutError),
    /// An existing object does not match the layout it is attached with.
    LayoutMismatch {
        /// The object's address.
        address: u64,
        /// What differs.
        reason: String,
    },
    /// A constructor argument names no field.
    UnknownArgument {
        /// The argument name.
        name: String,
    },
    /// No field with this name.
    UnknownField {
        /// The field name.
        field: String,
    },
    /// The field exists but is accessed as the wrong kind.
    FieldKindMismatch {
        /// The field name.
        field: String,
        /// What the access required.
        expected: &'static str,
    },
    /// Write to a field declared constant.
    ImmutableField {
        /// The field name.
        field: String,
    },
    /// Array index past the end.
    IndexOutOfBounds {
        /// The field name.
        field: String,
        /// The requested index.
        index: u64,
        /// The array length.
        len: u64,
    },
    /// The value does not fit the field's scalar type.
    ValueOutOfRange {
        /// The field name.
        field: String,
        /// The rejected value.
        value: Value,
    },
    /// A persisted image failed structural validation.
    CorruptImage {
        /// What failed.
        reason: String,
    },
    /// The image was written by an unsupported format version.
    UnsupportedVersion {
        /// The version found.
        found: u64,
    },
    /// The image checksum does not match its contents.
    ChecksumMismatch {
        /// Checksum stored in the image.
        recorded: u64,
        /// Checksum computed on load.
        computed: u64,
    },
    /// An I/O error while saving or loading.
    Io(io::Error),
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
            Self::AddressSpaceExhausted { capacities } => {
                write!(f, "arena capacities {capacities:?} exceed the address space")
            }
            Self::PointerOutsideObject { cell, size } => {
                write!(f, "pointer cell at +{cell} does not fit in a {size}-byte object")
            }
            Self::AddressOutOfBounds { address } => {
                write!(f, "address {address:#x} is outside the arena")
            }
            Self::OffsetOutOfBounds { offset } => {
                write!(f, "offset {offset} is outside the arena")
            }
            Self::UnknownObject { address } => {
                write!(f, "no object at address {address:#x}")
            }
            Self::SchemaConflict { type_id } => {
                write!(f, "type id {type_id} is already bound to a different schema")
            }
            Self::UnregisteredType { type_id } => {
                write!(f, "no schema registered for type id {type_id}")
            }
            Self::Layout(e) => write!(f, "layout error: {e}"),
            Self::LayoutMismatch { address, reason } => {
                write!(f, "object at {address:#x} does not match layout: {reason}")
            }
            Self::UnknownArgument { name } => {
                write!(f, "constructor argument '{name}' names no field")
            }
            Self::UnknownField { field } => write!(f, "unknown field '{field}'"),
            Self::FieldKindMismatch { field, expected } => {
                write!(f, "field '{field}' is not {expected}")
            }
            Self::ImmutableField { field } => {
                write!(f, "field '{field}' is constant after construction")
            }
            Self::IndexOutOfBounds { field, index, len } => {
                write!(f, "index {index} out of bounds for field '{field}' of length {len}")
            }
            Self::ValueOutOfRange { field, value } => {
                write!(f, "value {value} does not fit field '{field}'")
            }
            Self::CorruptImage { reason } => write!(f, "corrupt arena image: {reason}"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported arena format version {found}")
            }
            Self::ChecksumMismatch { recorded, computed } => {
                write!(
                    f,
                    "image checksum mismatch: recorded={recorded:#018x}, computed={computed:#018x}"
                )
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl Error for ArenaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Layout(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LayoutError> for ArenaError {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

impl From<io::Error> for ArenaError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
