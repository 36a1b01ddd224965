//! Binary layout of an arena store.
//!
//! The store is one contiguous byte buffer, identical in memory and on
//! disk. All header and table words are 8-byte little-endian.
//!
//! ```text
//! +0  self address        +8  total size         +16 header size (80)
//! +24 slots region ptr    +32 objects region ptr +40 pointers region ptr
//! +48 garbage region ptr  +56 magic "STRATA\0\0" +64 format version
//! +72 checksum (zero in memory, FNV-1a 64 of the image when saved)
//! +80 Slots | Objects | Pointers | Garbage
//! ```
//!
//! Each region is `[capacity, count]` followed by `capacity` units.
//! Slots always comes first, so object payload addresses keep the same
//! store offset through every relocation.

use crate::error::ArenaError;

/// Bytes per header/table word.
pub const WORD: u64 = 8;

/// Offset of the self-address word.
pub const SELF_ADDRESS: usize = 0;
/// Offset of the total-size word.
pub const TOTAL_SIZE: usize = 8;
/// Offset of the header-size word.
pub const HEADER_SIZE_WORD: usize = 16;
/// Offset of the first region pointer; pointers follow in [`RegionKind::ALL`] order.
pub const REGION_POINTERS: usize = 24;
/// Offset of the magic word.
pub const MAGIC_WORD: usize = 56;
/// Offset of the format version word.
pub const VERSION_WORD: usize = 64;
/// Offset of the checksum word.
pub const CHECKSUM_WORD: usize = 72;

/// Size of the header; region data starts here.
pub const HEADER_SIZE: u64 = 80;
/// Size of a region's `[capacity, count]` prefix.
pub const REGION_PREFIX: u64 = 2 * WORD;

/// Magic bytes at the start of the header's magic word.
pub const MAGIC: [u8; 8] = *b"STRATA\0\0";

/// Current binary format version.
///
/// History:
/// - v1: header with trailing magic/version/checksum words, four regions.
pub const FORMAT_VERSION: u64 = 1;

/// The four independently sized regions of an arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Bump-allocated object payloads, in 8-byte units.
    Slots,
    /// Directory of `(address, type_id, size)` triples.
    Objects,
    /// Fixup table of pointer-cell addresses.
    Pointers,
    /// Released `(address, size)` extents.
    Garbage,
}

impl RegionKind {
    /// All regions in store order.
    pub const ALL: [RegionKind; 4] = [Self::Slots, Self::Objects, Self::Pointers, Self::Garbage];

    /// Bytes per capacity unit.
    pub fn unit_bytes(self) -> u64 {
        match self {
            Self::Slots | Self::Pointers => WORD,
            Self::Objects => 3 * WORD,
            Self::Garbage => 2 * WORD,
        }
    }

    /// Header offset of this region's pointer word.
    pub fn pointer_word(self) -> usize {
        REGION_POINTERS + self.index() * WORD as usize
    }

    fn index(self) -> usize {
        match self {
            Self::Slots => 0,
            Self::Objects => 1,
            Self::Pointers => 2,
            Self::Garbage => 3,
        }
    }
}

/// Per-region capacities, in region units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capacities {
    /// Slots capacity (8-byte units).
    pub slots: u64,
    /// Directory capacity (entries).
    pub objects: u64,
    /// Fixup table capacity (entries).
    pub pointers: u64,
    /// Garbage table capacity (entries).
    pub garbage: u64,
}

impl Capacities {
    /// Capacity of one region.
    pub fn get(&self, kind: RegionKind) -> u64 {
        match kind {
            RegionKind::Slots => self.slots,
            RegionKind::Objects => self.objects,
            RegionKind::Pointers => self.pointers,
            RegionKind::Garbage => self.garbage,
        }
    }

    /// Mutable capacity of one region.
    pub fn get_mut(&mut self, kind: RegionKind) -> &mut u64 {
        match kind {
            RegionKind::Slots => &mut self.slots,
            RegionKind::Objects => &mut self.objects,
            RegionKind::Pointers => &mut self.pointers,
            RegionKind::Garbage => &mut self.garbage,
        }
    }

    /// Element-wise maximum.
    pub fn max(self, other: Capacities) -> Capacities {
        Capacities {
            slots: self.slots.max(other.slots),
            objects: self.objects.max(other.objects),
            pointers: self.pointers.max(other.pointers),
            garbage: self.garbage.max(other.garbage),
        }
    }
}

/// Store offsets implied by a set of capacities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Capacities the geometry was computed for.
    pub capacities: Capacities,
    offsets: [u64; 4],
    /// Total store size in bytes.
    pub total: u64,
}

impl Geometry {
    /// Lay regions out back to back after the header.
    pub fn new(capacities: Capacities) -> Result<Self, ArenaError> {
        let mut offsets = [0u64; 4];
        let mut cursor = HEADER_SIZE;
        for (i, kind) in RegionKind::ALL.into_iter().enumerate() {
            offsets[i] = cursor;
            cursor = capacities
                .get(kind)
                .checked_mul(kind.unit_bytes())
                .and_then(|payload| payload.checked_add(REGION_PREFIX))
                .and_then(|region| region.checked_add(cursor))
                .ok_or(ArenaError::AddressSpaceExhausted { capacities })?;
        }
        if usize::try_from(cursor).is_err() || cursor > isize::MAX as u64 {
            return Err(ArenaError::AddressSpaceExhausted { capacities });
        }
        Ok(Self {
            capacities,
            offsets,
            total: cursor,
        })
    }

    /// Store offset of a region's prefix.
    pub fn offset(&self, kind: RegionKind) -> u64 {
        self.offsets[kind.index()]
    }
}

/// Read the word at `offset`, bounds-checked.
pub(crate) fn word(store: &[u8], offset: u64) -> Result<u64, ArenaError> {
    let start = usize::try_from(offset).map_err(|_| ArenaError::OffsetOutOfBounds { offset })?;
    let bytes = start
        .checked_add(WORD as usize)
        .and_then(|end| store.get(start..end))
        .ok_or(ArenaError::OffsetOutOfBounds { offset })?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

/// Write the word at `offset`, bounds-checked.
pub(crate) fn set_word(store: &mut [u8], offset: u64, value: u64) -> Result<(), ArenaError> {
    let start = usize::try_from(offset).map_err(|_| ArenaError::OffsetOutOfBounds { offset })?;
    let bytes = start
        .checked_add(WORD as usize)
        .and_then(|end| store.get_mut(start..end))
        .ok_or(ArenaError::OffsetOutOfBounds { offset })?;
    bytes.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Absolute address of a store's first byte.
pub(crate) fn store_address(store: &[u8]) -> u64 {
    store.as_ptr() as usize as u64
}

/// Store offset of a region, derived from the header's absolute pointers.
pub(crate) fn region_offset(store: &[u8], kind: RegionKind) -> Result<u64, ArenaError> {
    let base = word(store, SELF_ADDRESS as u64)?;
    Ok(word(store, kind.pointer_word() as u64)?.wrapping_sub(base))
}

/// Write a complete header for a store at `base` with `geometry`.
///
/// Region prefixes are not touched.
pub(crate) fn write_header(
    store: &mut [u8],
    base: u64,
    geometry: &Geometry,
) -> Result<(), ArenaError> {
    set_word(store, SELF_ADDRESS as u64, base)?;
    set_word(store, TOTAL_SIZE as u64, geometry.total)?;
    set_word(store, HEADER_SIZE_WORD as u64, HEADER_SIZE)?;
    for kind in RegionKind::ALL {
        set_word(
            store,
            kind.pointer_word() as u64,
            base.wrapping_add(geometry.offset(kind)),
        )?;
    }
    set_word(store, MAGIC_WORD as u64, u64::from_le_bytes(MAGIC))?;
    set_word(store, VERSION_WORD as u64, FORMAT_VERSION)?;
    set_word(store, CHECKSUM_WORD as u64, 0)?;
    Ok(())
}
