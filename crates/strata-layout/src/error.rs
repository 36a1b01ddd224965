//! Layout compilation error types.

use std::error::Error;
use std::fmt;

/// Errors raised while building a schema or compiling a layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// A scalar field names a type missing from the catalog.
    UnknownScalarType {
        /// The field declaring the type.
        field: String,
        /// The unresolved type name.
        name: String,
    },
    /// Two fields in one schema share a name.
    DuplicateField {
        /// The repeated name.
        name: String,
    },
    /// A field alignment that is zero or not a power of two.
    InvalidAlignment {
        /// The offending field.
        field: String,
        /// The requested alignment.
        align: u64,
    },
    /// A repetition length could not be evaluated from the arguments.
    LengthResolution {
        /// The field whose length failed.
        field: String,
        /// Why evaluation failed.
        reason: String,
    },
    /// Field or object size does not fit in 64 bits.
    SizeOverflow {
        /// The field being laid out when the overflow occurred.
        field: String,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownScalarType { field, name } => {
                write!(f, "field '{field}': unknown scalar type '{name}'")
            }
            Self::DuplicateField { name } => write!(f, "duplicate field '{name}'"),
            Self::InvalidAlignment { field, align } => {
                write!(f, "field '{field}': alignment {align} is not a power of two")
            }
            Self::LengthResolution { field, reason } => {
                write!(f, "field '{field}': cannot resolve length: {reason}")
            }
            Self::SizeOverflow { field } => {
                write!(f, "field '{field}': object size overflows")
            }
        }
    }
}

impl Error for LayoutError {}
