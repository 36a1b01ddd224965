//! Arena configuration parameters.

use crate::error::ArenaError;
use crate::format::{Capacities, Geometry};

/// Configuration for an [`Arena`](crate::Arena).
///
/// Capacities are the *initial* region sizes; every region grows on
/// demand by relocation. Validated at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Initial Slots capacity in 8-byte units.
    ///
    /// Default: 1024 (8 KiB of object payload).
    pub slots: u64,

    /// Initial directory capacity (live objects).
    pub objects: u64,

    /// Initial fixup table capacity (pointer cells).
    pub pointers: u64,

    /// Initial garbage table capacity (released extents).
    pub garbage: u64,

    /// Multiplier applied to the required size of a region that must grow.
    ///
    /// Default: 2. Must be at least 2 so that a run of allocations
    /// triggers a logarithmic number of relocations.
    pub growth_factor: u64,
}

impl ArenaConfig {
    /// Default Slots capacity.
    pub const DEFAULT_SLOTS: u64 = 1024;
    /// Default directory capacity.
    pub const DEFAULT_OBJECTS: u64 = 64;
    /// Default fixup table capacity.
    pub const DEFAULT_POINTERS: u64 = 64;
    /// Default garbage table capacity.
    pub const DEFAULT_GARBAGE: u64 = 16;
    /// Default growth factor.
    pub const DEFAULT_GROWTH_FACTOR: u64 = 2;

    /// A config with default values.
    pub fn new() -> Self {
        Self {
            slots: Self::DEFAULT_SLOTS,
            objects: Self::DEFAULT_OBJECTS,
            pointers: Self::DEFAULT_POINTERS,
            garbage: Self::DEFAULT_GARBAGE,
            growth_factor: Self::DEFAULT_GROWTH_FACTOR,
        }
    }

    /// Set all initial capacities at once.
    pub fn with_capacities(mut self, slots: u64, objects: u64, pointers: u64, garbage: u64) -> Self {
        self.slots = slots;
        self.objects = objects;
        self.pointers = pointers;
        self.garbage = garbage;
        self
    }

    /// Set the growth factor.
    pub fn with_growth_factor(mut self, growth_factor: u64) -> Self {
        self.growth_factor = growth_factor;
        self
    }

    /// The initial capacities as a [`Capacities`] value.
    pub fn capacities(&self) -> Capacities {
        Capacities {
            slots: self.slots,
            objects: self.objects,
            pointers: self.pointers,
            garbage: self.garbage,
        }
    }

    /// Check the config describes a buildable arena.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.growth_factor < 2 {
            return Err(ArenaError::InvalidConfig {
                reason: format!("growth_factor must be >= 2 (got {})", self.growth_factor),
            });
        }
        Geometry::new(self.capacities()).map(|_| ())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
