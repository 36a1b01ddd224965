//! The relocatable arena: one contiguous store with a self-describing header.

use strata_core::{TypeCatalog, TypeId};
use tracing::{debug, trace};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::format::{
    self, Capacities, Geometry, RegionKind, HEADER_SIZE, HEADER_SIZE_WORD, REGION_PREFIX,
    SELF_ADDRESS, TOTAL_SIZE, WORD,
};
use crate::registry::TypeRegistry;
use crate::relocate;

/// Capacity and occupancy of one region, in that region's units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionInfo {
    /// Units the region can hold.
    pub capacity: u64,
    /// Units in use.
    pub used: u64,
}

impl RegionInfo {
    /// Units still available before the region must grow.
    pub fn free(&self) -> u64 {
        self.capacity - self.used
    }
}

/// One object directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Absolute address of the object's first byte.
    pub address: u64,
    /// Type id recorded at allocation.
    pub type_id: TypeId,
    /// Object size in bytes (a multiple of 8).
    pub size: u64,
}

/// A released extent recorded in the Garbage region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GarbageEntry {
    /// Absolute address of the extent at the time of the query.
    pub address: u64,
    /// Extent size in bytes.
    pub size: u64,
}

/// A contiguous, relocatable object store.
///
/// The store begins with a header recording its own absolute address, its
/// total size and the absolute address of each region (Slots, Objects,
/// Pointers, Garbage). Every absolute address stored anywhere in the
/// arena is registered in the Pointers region, so moving the store is a
/// single uniform patch of those addresses.
///
/// All addresses handed out are absolute and valid only until the next
/// mutating call, which may relocate. Use
/// [`ObjectRef`](crate::ObjectRef) for handles that survive relocation.
pub struct Arena {
    pub(crate) store: Vec<u8>,
    pub(crate) config: ArenaConfig,
    pub(crate) catalog: TypeCatalog,
    pub(crate) registry: TypeRegistry,
    relocations: u64,
}

impl Arena {
    /// Create an empty arena with the standard scalar catalog.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        Self::with_catalog(config, TypeCatalog::standard())
    }

    /// Create an empty arena resolving scalar type names through `catalog`.
    pub fn with_catalog(config: ArenaConfig, catalog: TypeCatalog) -> Result<Self, ArenaError> {
        config.validate()?;
        let geometry = Geometry::new(config.capacities())?;
        let store = fresh_store(&geometry)?;
        debug!(
            base = format::store_address(&store),
            size = geometry.total,
            "arena created"
        );
        Ok(Self::from_store(store, config, catalog))
    }

    /// Wrap a store whose header and tables are already consistent.
    pub(crate) fn from_store(store: Vec<u8>, config: ArenaConfig, catalog: TypeCatalog) -> Self {
        Self {
            store,
            config,
            catalog,
            registry: TypeRegistry::new(),
            relocations: 0,
        }
    }

    // ── Header accessors ────────────────────────────────────────

    /// Current absolute address of the store's first byte.
    pub fn base(&self) -> u64 {
        self.word_at(SELF_ADDRESS as u64)
    }

    /// Total store size in bytes, as recorded in the header.
    pub fn size(&self) -> u64 {
        self.word_at(TOTAL_SIZE as u64)
    }

    /// Header size in bytes.
    pub fn header_size(&self) -> u64 {
        self.word_at(HEADER_SIZE_WORD as u64)
    }

    /// The raw store, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.store
    }

    /// The configuration this arena grows by.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// The scalar catalog used to compile layouts.
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// The type id bindings of this arena.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// How many times the store has moved since this value was created.
    pub fn relocations(&self) -> u64 {
        self.relocations
    }

    // ── Regions ─────────────────────────────────────────────────

    /// Capacity and occupancy of `kind`.
    pub fn region(&self, kind: RegionKind) -> RegionInfo {
        let offset = self.region_offset(kind);
        RegionInfo {
            capacity: self.word_at(offset),
            used: self.word_at(offset + WORD),
        }
    }

    /// Current capacity of every region.
    pub fn capacities(&self) -> Capacities {
        let mut caps = Capacities::default();
        for kind in RegionKind::ALL {
            *caps.get_mut(kind) = self.region(kind).capacity;
        }
        caps
    }

    /// Free 8-byte units in Slots.
    pub fn free_slots(&self) -> u64 {
        self.region(RegionKind::Slots).free()
    }

    /// Free directory entries.
    pub fn free_objects(&self) -> u64 {
        self.region(RegionKind::Objects).free()
    }

    /// Free fixup table entries.
    pub fn free_pointers(&self) -> u64 {
        self.region(RegionKind::Pointers).free()
    }

    /// Free garbage table entries.
    pub fn free_garbage(&self) -> u64 {
        self.region(RegionKind::Garbage).free()
    }

    /// Guarantee room for the given number of slots, directory entries and
    /// fixups, relocating at most once.
    pub fn reserve(&mut self, slots: u64, objects: u64, pointers: u64) -> Result<(), ArenaError> {
        self.ensure(Capacities {
            slots,
            objects,
            pointers,
            garbage: 0,
        })
    }

    // ── Addressing ──────────────────────────────────────────────

    /// Convert an absolute address into a store offset.
    pub fn translate(&self, address: u64) -> Result<u64, ArenaError> {
        let offset = address.wrapping_sub(self.base());
        if offset < self.store.len() as u64 {
            Ok(offset)
        } else {
            Err(ArenaError::AddressOutOfBounds { address })
        }
    }

    /// Read the 8-byte word at an absolute address.
    pub fn read_word(&self, address: u64) -> Result<u64, ArenaError> {
        let offset = self.translate(address)?;
        format::word(&self.store, offset).map_err(|_| ArenaError::AddressOutOfBounds { address })
    }

    /// Borrow `len` bytes starting at an absolute address.
    pub fn bytes(&self, address: u64, len: u64) -> Result<&[u8], ArenaError> {
        let offset = self.translate(address)?;
        self.bytes_at(offset, len)
            .map_err(|_| ArenaError::AddressOutOfBounds { address })
    }

    pub(crate) fn bytes_at(&self, offset: u64, len: u64) -> Result<&[u8], ArenaError> {
        let range = self.range(offset, len)?;
        Ok(&self.store[range])
    }

    pub(crate) fn bytes_mut_at(&mut self, offset: u64, len: u64) -> Result<&mut [u8], ArenaError> {
        let range = self.range(offset, len)?;
        Ok(&mut self.store[range])
    }

    pub(crate) fn word_checked(&self, offset: u64) -> Result<u64, ArenaError> {
        format::word(&self.store, offset)
    }

    fn range(&self, offset: u64, len: u64) -> Result<std::ops::Range<usize>, ArenaError> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.store.len() as u64)
            .ok_or(ArenaError::OffsetOutOfBounds { offset })?;
        Ok(offset as usize..end as usize)
    }

    // ── Allocation ──────────────────────────────────────────────

    /// Reserve `size` bytes (rounded up to whole slots), record a
    /// directory entry and register each object-relative `cells` offset
    /// as a pointer cell. Returns the object's absolute address.
    ///
    /// Every registered cell is patched on relocation, whatever it holds.
    /// The returned memory is zero-filled.
    pub fn allocate(
        &mut self,
        size: u64,
        type_id: TypeId,
        cells: &[u64],
    ) -> Result<u64, ArenaError> {
        let units = size.div_ceil(WORD);
        let size = units
            .checked_mul(WORD)
            .ok_or(ArenaError::AddressSpaceExhausted {
                capacities: self.capacities(),
            })?;
        for &cell in cells {
            if cell.checked_add(WORD).is_none_or(|end| end > size) {
                return Err(ArenaError::PointerOutsideObject { cell, size });
            }
        }

        self.ensure(Capacities {
            slots: units,
            objects: 1,
            pointers: cells.len() as u64,
            garbage: 0,
        })?;

        let base = self.base();
        let slots = self.region_offset(RegionKind::Slots);
        let used = self.word_at(slots + WORD);
        let offset = slots + REGION_PREFIX + used * WORD;
        let address = base.wrapping_add(offset);
        self.set_word_at(slots + WORD, used + units);

        self.push_entry(RegionKind::Objects, &[address, type_id.0, size])?;
        for &cell in cells {
            self.push_entry(RegionKind::Pointers, &[address + cell])?;
        }
        trace!(address, size, type_id = type_id.0, cells = cells.len(), "allocated");
        Ok(address)
    }

    // ── Enumeration ─────────────────────────────────────────────

    /// Live directory entries in allocation order.
    pub fn objects(&self) -> impl Iterator<Item = DirectoryEntry> + '_ {
        self.entries(RegionKind::Objects).map(|at| DirectoryEntry {
            address: self.word_at(at),
            type_id: TypeId(self.word_at(at + WORD)),
            size: self.word_at(at + 2 * WORD),
        })
    }

    /// The directory entry for the object at `address`.
    pub fn entry(&self, address: u64) -> Option<DirectoryEntry> {
        self.objects().find(|e| e.address == address)
    }

    /// Absolute addresses of every registered pointer cell.
    pub fn fixups(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries(RegionKind::Pointers).map(|at| self.word_at(at))
    }

    /// Released extents in release order.
    pub fn garbage(&self) -> impl Iterator<Item = GarbageEntry> + '_ {
        self.entries(RegionKind::Garbage).map(|at| GarbageEntry {
            address: self.word_at(at),
            size: self.word_at(at + WORD),
        })
    }

    /// Store offsets of each live entry of a table region.
    fn entries(&self, kind: RegionKind) -> impl Iterator<Item = u64> {
        let region = self.region_offset(kind);
        let count = self.word_at(region + WORD);
        let unit = kind.unit_bytes();
        (0..count).map(move |i| region + REGION_PREFIX + i * unit)
    }

    // ── Release ─────────────────────────────────────────────────

    /// Drop the object at `address` from the directory, unregister its
    /// pointer cells and record its extent as garbage.
    ///
    /// The extent is not reused by later allocations.
    pub fn release(&mut self, address: u64) -> Result<DirectoryEntry, ArenaError> {
        let before = self
            .entry(address)
            .ok_or(ArenaError::UnknownObject { address })?;
        let offset = address.wrapping_sub(self.base());

        // May relocate; everything below works from the new base.
        self.ensure(Capacities {
            garbage: 1,
            ..Capacities::default()
        })?;
        let address = self.base().wrapping_add(offset);
        let size = before.size;

        self.remove_entries(RegionKind::Objects, |arena, at| arena.word_at(at) == address);
        self.remove_entries(RegionKind::Pointers, |arena, at| {
            let cell = arena.word_at(at);
            cell.wrapping_sub(address) < size
        });
        self.push_entry(RegionKind::Garbage, &[address, size])?;
        debug!(address, size, type_id = before.type_id.0, "object released");
        Ok(DirectoryEntry { address, ..before })
    }

    /// Compact a table region, keeping entries for which `remove` is false.
    fn remove_entries(&mut self, kind: RegionKind, remove: impl Fn(&Self, u64) -> bool) {
        let region = self.region_offset(kind);
        let count = self.word_at(region + WORD);
        let unit = kind.unit_bytes();
        let start = region + REGION_PREFIX;
        let mut kept = 0;
        for i in 0..count {
            let at = start + i * unit;
            if remove(self, at) {
                continue;
            }
            if kept != i {
                let from = at as usize;
                let to = (start + kept * unit) as usize;
                self.store.copy_within(from..from + unit as usize, to);
            }
            kept += 1;
        }
        let tail = (start + kept * unit) as usize;
        let end = (start + count * unit) as usize;
        self.store[tail..end].fill(0);
        self.set_word_at(region + WORD, kept);
    }

    // ── Growth and relocation ───────────────────────────────────

    /// Relocate once if any region lacks room for `need` more units.
    fn ensure(&mut self, need: Capacities) -> Result<(), ArenaError> {
        let mut target = self.capacities();
        let mut grow = false;
        for kind in RegionKind::ALL {
            let info = self.region(kind);
            let wanted = need.get(kind);
            if info.free() >= wanted {
                continue;
            }
            let required = info
                .used
                .checked_add(wanted)
                .ok_or(ArenaError::AddressSpaceExhausted { capacities: target })?;
            *target.get_mut(kind) = info
                .capacity
                .max(required.saturating_mul(self.config.growth_factor));
            grow = true;
        }
        if grow {
            self.relocate(target)?;
        }
        Ok(())
    }

    /// Move the store to a fresh allocation with `target` capacities.
    ///
    /// Capacities never shrink: each region gets at least its current size.
    fn relocate(&mut self, target: Capacities) -> Result<(), ArenaError> {
        let geometry = Geometry::new(target.max(self.capacities()))?;
        let mut fresh = fresh_store(&geometry)?;
        relocate::copy_regions(&self.store, &mut fresh, &geometry)?;

        let old_base = self.base();
        let new_base = format::store_address(&fresh);
        let delta = new_base.wrapping_sub(old_base);
        let patched = relocate::rebase(&mut fresh, delta)?;

        let old_size = self.size();
        self.store = fresh;
        self.relocations += 1;
        debug!(
            old_base,
            new_base,
            delta,
            old_size,
            new_size = geometry.total,
            capacities = ?geometry.capacities,
            fixups = patched,
            "arena relocated"
        );
        Ok(())
    }

    // ── Raw store access ────────────────────────────────────────

    fn region_offset(&self, kind: RegionKind) -> u64 {
        self.word_at(kind.pointer_word() as u64).wrapping_sub(self.base())
    }

    /// Append one entry to a table region with room for it.
    fn push_entry(&mut self, kind: RegionKind, words: &[u64]) -> Result<(), ArenaError> {
        debug_assert_eq!(words.len() as u64 * WORD, kind.unit_bytes());
        let region = self.region_offset(kind);
        let count = self.word_at(region + WORD);
        debug_assert!(count < self.word_at(region));
        let at = region + REGION_PREFIX + count * kind.unit_bytes();
        for (i, &w) in words.iter().enumerate() {
            format::set_word(&mut self.store, at + i as u64 * WORD, w)?;
        }
        self.set_word_at(region + WORD, count + 1);
        Ok(())
    }

    /// Read a word at a store offset that is in bounds by construction:
    /// the header, region prefixes and live table entries.
    fn word_at(&self, offset: u64) -> u64 {
        let at = offset as usize;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.store[at..at + WORD as usize]);
        u64::from_le_bytes(buf)
    }

    fn set_word_at(&mut self, offset: u64, value: u64) {
        let at = offset as usize;
        self.store[at..at + WORD as usize].copy_from_slice(&value.to_le_bytes());
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("base", &format_args!("{:#x}", self.base()))
            .field("size", &self.size())
            .field("objects", &self.region(RegionKind::Objects).used)
            .field("relocations", &self.relocations)
            .finish()
    }
}

/// A zeroed store with a header and region capacities for `geometry`,
/// addressed at its own allocation.
fn fresh_store(geometry: &Geometry) -> Result<Vec<u8>, ArenaError> {
    debug_assert!(geometry.total >= HEADER_SIZE);
    let mut store = vec![0u8; geometry.total as usize];
    let base = format::store_address(&store);
    format::write_header(&mut store, base, geometry)?;
    for kind in RegionKind::ALL {
        format::set_word(
            &mut store,
            geometry.offset(kind),
            geometry.capacities.get(kind),
        )?;
    }
    Ok(store)
}
