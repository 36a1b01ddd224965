//! The relocation protocol.
//!
//! Growing an arena moves its whole store to a new allocation, and loading
//! a saved image places it wherever the allocator chooses. Either way every
//! absolute address held in the store is off by a uniform
//! `delta = new_base - old_base`:
//!
//! 1. [`copy_regions`] carries each region's prefix count and live entries
//!    into the fresh store at the same region-relative offsets (growth only).
//! 2. [`rebase`] adds `delta` to the address column of the directory, the
//!    fixup table and the garbage table, then follows every (already
//!    patched) fixup address and adds `delta` to the pointer stored there.
//!
//! Address arithmetic is wrapping, so a store that moved down in memory is
//! patched by the same add.

use crate::error::ArenaError;
use crate::format::{self, Geometry, RegionKind, REGION_PREFIX, SELF_ADDRESS, WORD};

/// Copy region counts and live entries from `old` into `fresh`.
///
/// `fresh` must already carry a header for `geometry` and have the region
/// capacities written; target capacities must be at least the live counts.
pub(crate) fn copy_regions(
    old: &[u8],
    fresh: &mut [u8],
    geometry: &Geometry,
) -> Result<(), ArenaError> {
    for kind in RegionKind::ALL {
        let src = format::region_offset(old, kind)?;
        let dst = geometry.offset(kind);
        let count = format::word(old, src + WORD)?;
        debug_assert!(count <= geometry.capacities.get(kind));
        format::set_word(fresh, dst + WORD, count)?;

        let len = (count * kind.unit_bytes()) as usize;
        let src_start = (src + REGION_PREFIX) as usize;
        let dst_start = (dst + REGION_PREFIX) as usize;
        let from = old
            .get(src_start..src_start + len)
            .ok_or(ArenaError::OffsetOutOfBounds { offset: src })?;
        let to = fresh
            .get_mut(dst_start..dst_start + len)
            .ok_or(ArenaError::OffsetOutOfBounds { offset: dst })?;
        to.copy_from_slice(from);
    }
    Ok(())
}

/// Patch every stored absolute address by `delta`.
///
/// The store header (self address and region pointers) must already hold
/// the new values. Returns the number of fixup cells patched.
pub(crate) fn rebase(store: &mut [u8], delta: u64) -> Result<u64, ArenaError> {
    if delta == 0 {
        return Ok(0);
    }
    for kind in [RegionKind::Objects, RegionKind::Pointers, RegionKind::Garbage] {
        patch_address_column(store, kind, delta)?;
    }

    let base = format::word(store, SELF_ADDRESS as u64)?;
    let table = format::region_offset(store, RegionKind::Pointers)?;
    let count = format::word(store, table + WORD)?;
    for i in 0..count {
        let cell_address = format::word(store, table + REGION_PREFIX + i * WORD)?;
        let cell = cell_address.wrapping_sub(base);
        let pointer = format::word(store, cell)?;
        format::set_word(store, cell, pointer.wrapping_add(delta))?;
    }
    Ok(count)
}

/// Add `delta` to word 0 of every live entry of a table region.
fn patch_address_column(store: &mut [u8], kind: RegionKind, delta: u64) -> Result<(), ArenaError> {
    let region = format::region_offset(store, kind)?;
    let count = format::word(store, region + WORD)?;
    for i in 0..count {
        let at = region + REGION_PREFIX + i * kind.unit_bytes();
        let address = format::word(store, at)?;
        format::set_word(store, at, address.wrapping_add(delta))?;
    }
    Ok(())
}
