//! Record schemas and compile-time struct layout for Strata.
//!
//! A caller describes a record with [`Schema::builder`], then
//! [`compile`] resolves it against constructor [`Args`](strata_core::Args)
//! and a [`TypeCatalog`](strata_core::TypeCatalog) into an
//! [`ObjectLayout`]: byte offsets, sizes, alignment and the pointer cells
//! the arena must patch on relocation.
//!
//! # Object shape
//!
//! ```text
//! +--------------------+-----------------+---------------------+-----+
//! | direct fields      | pointer cells   | indirect targets    | pad |
//! | (declaration order)| (one per        | (declaration order) |     |
//! |                    |  indirect field)|                     |     |
//! +--------------------+-----------------+---------------------+-----+
//! ```
//!
//! [`emit`] turns a layout into C declaration and debug-print text for
//! external tooling.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod compiler;
pub mod emit;
pub mod error;
pub mod layout;
pub mod schema;

pub use compiler::compile;
pub use emit::{emit_printer, emit_struct, Printers, StructDecls};
pub use error::LayoutError;
pub use layout::{FieldLayout, Fixup, LayoutKind, ObjectLayout, Storage};
pub use schema::{FieldDecl, FieldKind, Length, Schema, SchemaBuilder, StorageMode};
