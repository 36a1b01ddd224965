//! Growable, relocatable, persistable object arena for Strata.
//!
//! One contiguous byte store holds a self-describing header and four
//! regions. Objects are allocated from Slots; every absolute address
//! stored inside an object is registered in Pointers, so the whole store
//! can move (to grow, or when loaded from disk) with a single uniform
//! patch.
//!
//! # Store layout
//!
//! ```text
//! +--------------------------------------------------------------+
//! | header (80 bytes)                                            |
//! |   self address | total size | header size                    |
//! |   slots ptr | objects ptr | pointers ptr | garbage ptr       |
//! |   magic | version | checksum                                 |
//! +--------------------------------------------------------------+
//! | Slots     [capacity, used] 8-byte units of object payload    |
//! | Objects   [capacity, count] (address, type id, size) triples |
//! | Pointers  [capacity, count] absolute pointer-cell addresses  |
//! | Garbage   [capacity, count] (address, size) released extents |
//! +--------------------------------------------------------------+
//! ```
//!
//! Every header and table word is a little-endian `u64`. Slots comes
//! first, so its offset from the base never changes across growth.
//!
//! # Typed access
//!
//! [`Arena::create_object`] compiles a [`Schema`](strata_layout::Schema)
//! into a layout, allocates it and initializes it from constructor
//! arguments. The returned [`ObjectRef`] is base-relative and stays valid
//! across relocation; [`ObjectView`] and [`ObjectViewMut`] read and write
//! fields through it.
//!
//! # Concurrency
//!
//! An arena is a plain owned value: `Send`, mutated through `&mut self`.
//! Share it across threads behind a lock.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod format;
mod image;
pub mod object;
pub mod registry;
mod relocate;
pub mod view;

pub use arena::{Arena, DirectoryEntry, GarbageEntry, RegionInfo};
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use format::{Capacities, RegionKind, FORMAT_VERSION, HEADER_SIZE};
pub use object::ObjectRef;
pub use registry::TypeRegistry;
pub use view::{ArrayView, ObjectView, ObjectViewMut};
