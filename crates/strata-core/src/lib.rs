//! Core types for the Strata relocatable arena.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the layout compiler and the arena: object
//! type identifiers, the scalar type catalog, and the dynamic [`Value`]
//! used to read and write fields.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod id;
pub mod scalar;
pub mod value;

pub use id::TypeId;
pub use scalar::{ScalarType, TypeCatalog};
pub use value::{Args, Value, ValueError};
