//! Fixture schemas and arena helpers for Strata development.
//!
//! [`fixtures`] provides three standard record schemas covering every
//! layout feature; the functions here build arenas and compare their
//! contents independently of where the store happens to live.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use strata_arena::{Arena, ArenaConfig, RegionKind};

pub use fixtures::{
    make_mesh, make_particle, make_point, mesh_schema, particle_schema, point_schema, MESH,
    PARTICLE, POINT,
};

/// An arena with tiny regions, so that almost any workload relocates.
pub fn tiny_arena() -> Arena {
    Arena::new(ArenaConfig::new().with_capacities(4, 1, 1, 1)).unwrap()
}

/// An arena with default capacities.
pub fn default_arena() -> Arena {
    Arena::new(ArenaConfig::default()).unwrap()
}

/// Used Slots payload with every registered pointer cell rewritten as a
/// base-relative offset.
///
/// Two arenas holding the same objects at different bases compare equal.
pub fn relative_payload(arena: &Arena) -> Vec<u8> {
    let base = arena.base();
    let slots = slots_payload_offset(arena);
    let used = arena.region(RegionKind::Slots).used * 8;
    let mut payload = arena.as_bytes()[slots as usize..(slots + used) as usize].to_vec();
    for cell in arena.fixups() {
        let at = (arena.translate(cell).unwrap() - slots) as usize;
        let relative = arena.read_word(cell).unwrap().wrapping_sub(base);
        payload[at..at + 8].copy_from_slice(&relative.to_le_bytes());
    }
    payload
}

/// Store offset of the first Slots payload byte.
pub fn slots_payload_offset(arena: &Arena) -> u64 {
    arena.header_size() + 16
}

/// Base-relative offset each fixup cell currently points at.
pub fn relative_fixup_targets(arena: &Arena) -> Vec<u64> {
    let base = arena.base();
    arena
        .fixups()
        .map(|cell| arena.read_word(cell).unwrap().wrapping_sub(base))
        .collect()
}

/// Check every fixup cell points inside the arena's used Slots payload.
pub fn assert_fixups_in_bounds(arena: &Arena) {
    let start = slots_payload_offset(arena);
    let end = start + arena.region(RegionKind::Slots).used * 8;
    for target in relative_fixup_targets(arena) {
        assert!(
            (start..=end).contains(&target),
            "fixup target offset {target} outside slots payload {start}..{end}"
        );
    }
}
