//! Strata: a relocatable typed object arena with a struct-layout compiler.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Strata sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let samples = Schema::builder("samples")
//!     .scalar("count", "uint32")
//!     .constant()
//!     .array("data", "real", Length::arg("n"))
//!     .indirect()
//!     .build()
//!     .unwrap();
//!
//! let mut arena = Arena::new(ArenaConfig::default()).unwrap();
//! let args = Args::new().with("n", 3u32).with("count", 3u32).with("data", vec![1.0, 2.0]);
//! let obj = arena.create_object(TypeId(1), &samples, &args).unwrap();
//!
//! arena.view_mut(&obj).set_index("data", 2, 3.0).unwrap();
//! let data = arena.view(&obj).array("data").unwrap().to_vec().unwrap();
//! assert_eq!(data, vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)]);
//!
//! // The whole store moves; the object handle and its pointer cell follow.
//! arena.reserve(1 << 16, 0, 0).unwrap();
//! assert_eq!(arena.view(&obj).array("data").unwrap().get(2).unwrap(), Value::Float(3.0));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `strata-core` | Type ids, scalar types, values, arguments |
//! | [`layout`] | `strata-layout` | Schemas, layout compiler, declaration emitter |
//! | [`arena`] | `strata-arena` | Arena store, relocation, persistence, views |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Type ids, scalar types, values and constructor arguments (`strata-core`).
pub use strata_core as types;

/// Record schemas, layout compilation and C declaration emission
/// (`strata-layout`).
///
/// [`layout::compile`] turns a [`layout::Schema`] into an
/// [`layout::ObjectLayout`]; [`layout::emit_struct`] and
/// [`layout::emit_printer`] render it for external tooling.
pub use strata_layout as layout;

/// The relocatable arena (`strata-arena`).
///
/// [`arena::Arena`] owns the store; [`arena::ObjectRef`] handles survive
/// relocation and save/load.
pub use strata_arena as arena;

/// Common imports for typical Strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use strata_core::{Args, ScalarType, TypeCatalog, TypeId, Value};

    // Layout
    pub use strata_layout::{compile, emit_printer, emit_struct, Length, ObjectLayout, Schema};

    // Arena
    pub use strata_arena::{
        Arena, ArenaConfig, ArenaError, ArrayView, ObjectRef, ObjectView, ObjectViewMut,
    };
}
