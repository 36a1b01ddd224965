//! Saving and loading arena images.
//!
//! An image is the store byte for byte, with the header's checksum word
//! set to an FNV-1a hash of the image computed with that word zeroed.
//! Loading reads the image into a fresh allocation, validates every
//! header and table invariant, then runs the same rebase pass as growth
//! with `delta = new_base - recorded_base`.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use strata_core::TypeCatalog;
use tracing::{debug, warn};

use crate::arena::Arena;
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::format::{
    self, Capacities, Geometry, RegionKind, CHECKSUM_WORD, FORMAT_VERSION, HEADER_SIZE,
    HEADER_SIZE_WORD, MAGIC, MAGIC_WORD, REGION_PREFIX, SELF_ADDRESS, TOTAL_SIZE, VERSION_WORD,
    WORD,
};
use crate::relocate;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

#[inline]
fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash = (hash ^ b as u64).wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Checksum of an image, treating the checksum word as zero.
fn checksum(image: &[u8]) -> u64 {
    let word = CHECKSUM_WORD;
    let hash = fnv1a(FNV_OFFSET, &image[..word]);
    let hash = fnv1a(hash, &[0u8; WORD as usize]);
    fnv1a(hash, &image[word + WORD as usize..])
}

fn corrupt(reason: impl Into<String>) -> ArenaError {
    ArenaError::CorruptImage {
        reason: reason.into(),
    }
}

impl Arena {
    /// Write the arena image to `writer`.
    pub fn write_image<W: Write>(&self, mut writer: W) -> Result<(), ArenaError> {
        let image = self.as_bytes();
        let sum = checksum(image);
        writer.write_all(&image[..CHECKSUM_WORD])?;
        writer.write_all(&sum.to_le_bytes())?;
        writer.write_all(&image[CHECKSUM_WORD + WORD as usize..])?;
        Ok(())
    }

    /// Save the arena image to `path`.
    ///
    /// Writes a sibling temporary file, syncs it and renames it over
    /// `path`, so a crash never leaves a partially written image behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArenaError> {
        let path = path.as_ref();
        let temp_path = temp_path(path)?;
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        self.write_image(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&temp_path, path)?;
        debug!(path = %path.display(), size = self.size(), "arena saved");
        Ok(())
    }

    /// Read an arena image from `reader`.
    ///
    /// The reader must yield exactly one image. `config` governs future
    /// growth; `catalog` resolves scalar names for layouts compiled
    /// against the loaded arena. The type registry starts empty.
    pub fn read_image<R: Read>(
        mut reader: R,
        config: ArenaConfig,
        catalog: TypeCatalog,
    ) -> Result<Arena, ArenaError> {
        config.validate()?;
        let mut header = [0u8; HEADER_SIZE as usize];
        read_exact_or_truncated(&mut reader, &mut header)?;
        check_identity(&header)?;

        let total = format::word(&header, TOTAL_SIZE as u64)?;
        if total < HEADER_SIZE || total > isize::MAX as u64 {
            return Err(corrupt(format!("recorded size {total} is impossible")));
        }

        // Grow with the data actually read so a lying size word cannot
        // force a huge allocation up front.
        let mut store = header.to_vec();
        reader
            .by_ref()
            .take(total - HEADER_SIZE)
            .read_to_end(&mut store)?;
        if store.len() as u64 != total {
            return Err(corrupt(format!(
                "truncated: {} of {total} bytes",
                store.len()
            )));
        }
        let mut probe = [0u8; 1];
        if reader.read(&mut probe)? != 0 {
            return Err(corrupt("trailing bytes after image"));
        }

        let geometry = validate(&store)?;
        let recorded_base = format::word(&store, SELF_ADDRESS as u64)?;
        let new_base = format::store_address(&store);
        let delta = new_base.wrapping_sub(recorded_base);

        format::write_header(&mut store, new_base, &geometry)?;
        let patched = relocate::rebase(&mut store, delta)?;
        debug!(
            recorded_base,
            new_base,
            size = total,
            fixups = patched,
            "arena image loaded"
        );
        Ok(Arena::from_store(store, config, catalog))
    }

    /// Load an image saved by [`save`](Arena::save) with the default
    /// config and the standard catalog.
    pub fn load(path: impl AsRef<Path>) -> Result<Arena, ArenaError> {
        Self::load_with(path, ArenaConfig::default(), TypeCatalog::standard())
    }

    /// Load an image with an explicit config and catalog.
    pub fn load_with(
        path: impl AsRef<Path>,
        config: ArenaConfig,
        catalog: TypeCatalog,
    ) -> Result<Arena, ArenaError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::read_image(BufReader::new(file), config, catalog).inspect_err(|e| {
            if !matches!(e, ArenaError::Io(_)) {
                warn!(path = %path.display(), error = %e, "rejected arena image");
            }
        })
    }
}

fn temp_path(path: &Path) -> Result<PathBuf, ArenaError> {
    let mut name = path
        .file_name()
        .ok_or_else(|| {
            ArenaError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            ))
        })?
        .to_os_string();
    name.push(".tmp");
    Ok(path.with_file_name(name))
}

fn read_exact_or_truncated<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), ArenaError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            corrupt("truncated header")
        } else {
            ArenaError::Io(e)
        }
    })
}

/// Magic and version, checked before anything is allocated.
fn check_identity(header: &[u8]) -> Result<(), ArenaError> {
    let magic = format::word(header, MAGIC_WORD as u64)?;
    if magic != u64::from_le_bytes(MAGIC) {
        return Err(corrupt("bad magic"));
    }
    let version = format::word(header, VERSION_WORD as u64)?;
    if version != FORMAT_VERSION {
        return Err(ArenaError::UnsupportedVersion { found: version });
    }
    Ok(())
}

/// Check every invariant a loaded image must satisfy before rebasing.
///
/// All addresses are checked against the *recorded* base.
fn validate(image: &[u8]) -> Result<Geometry, ArenaError> {
    let word = |offset: u64| {
        format::word(image, offset)
            .map_err(|_| corrupt(format!("word at offset {offset} is outside the image")))
    };

    let recorded = word(CHECKSUM_WORD as u64)?;
    let computed = checksum(image);
    if recorded != computed {
        return Err(ArenaError::ChecksumMismatch { recorded, computed });
    }
    let header_size = word(HEADER_SIZE_WORD as u64)?;
    if header_size != HEADER_SIZE {
        return Err(corrupt(format!("header size {header_size}, expected {HEADER_SIZE}")));
    }

    let base = word(SELF_ADDRESS as u64)?;
    let mut capacities = Capacities::default();
    let mut counts = Capacities::default();
    let mut offsets = [0u64; 4];
    for (i, kind) in RegionKind::ALL.into_iter().enumerate() {
        let offset = word(kind.pointer_word() as u64)?.wrapping_sub(base);
        offsets[i] = offset;
        *capacities.get_mut(kind) = word(offset)?;
        *counts.get_mut(kind) = word(offset.wrapping_add(WORD))?;
    }
    let geometry =
        Geometry::new(capacities).map_err(|_| corrupt("region capacities are impossible"))?;
    for (i, kind) in RegionKind::ALL.into_iter().enumerate() {
        if geometry.offset(kind) != offsets[i] {
            return Err(corrupt(format!("{kind:?} region is misplaced")));
        }
        if counts.get(kind) > capacities.get(kind) {
            return Err(corrupt(format!("{kind:?} count exceeds capacity")));
        }
    }
    if geometry.total != image.len() as u64 {
        return Err(corrupt("regions do not fill the image"));
    }

    // Used Slots payload, as store offsets.
    let slots_start = geometry.offset(RegionKind::Slots) + REGION_PREFIX;
    let slots_end = slots_start + counts.slots * WORD;
    let extent_ok = |address: u64, size: u64| {
        let start = address.wrapping_sub(base);
        start >= slots_start
            && start
                .checked_add(size)
                .is_some_and(|end| end <= slots_end)
    };

    let table = |kind: RegionKind| {
        let start = geometry.offset(kind) + REGION_PREFIX;
        (0..counts.get(kind)).map(move |i| start + i * kind.unit_bytes())
    };
    for at in table(RegionKind::Objects) {
        let (address, size) = (word(at)?, word(at + 2 * WORD)?);
        if size % WORD != 0 || !extent_ok(address, size) {
            return Err(corrupt(format!("directory entry {address:#x} is out of bounds")));
        }
    }
    for at in table(RegionKind::Pointers) {
        let cell = word(at)?;
        if !extent_ok(cell, WORD) {
            return Err(corrupt(format!("pointer cell {cell:#x} is out of bounds")));
        }
    }
    for at in table(RegionKind::Garbage) {
        let (address, size) = (word(at)?, word(at + WORD)?);
        if !extent_ok(address, size) {
            return Err(corrupt(format!("garbage extent {address:#x} is out of bounds")));
        }
    }
    Ok(geometry)
}
