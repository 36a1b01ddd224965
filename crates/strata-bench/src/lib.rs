//! Benchmark workloads for the Strata arena.
//!
//! - [`populate`]: a deterministic mix of fixture objects
//! - [`populated_arena`]: a fresh arena holding [`populate`]'s output

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use strata_arena::{Arena, ArenaConfig, ObjectRef};
use strata_test_utils::{make_mesh, make_particle, make_point};

/// Add `count` objects to `arena`: mostly points, every eighth a particle
/// and every sixteenth a mesh with indirect samples.
pub fn populate(arena: &mut Arena, count: u64) -> Vec<ObjectRef> {
    (0..count)
        .map(|i| {
            if i % 16 == 0 {
                make_mesh(arena, (i % 32) as u32 + 1, i as f64)
            } else if i % 8 == 0 {
                make_particle(arena, i, i % 12)
            } else {
                make_point(arena, i as f64, -(i as f64))
            }
        })
        .collect()
}

/// A default-configured arena holding `count` objects.
pub fn populated_arena(count: u64) -> Arena {
    let mut arena = Arena::new(ArenaConfig::default()).unwrap();
    populate(&mut arena, count);
    arena
}
