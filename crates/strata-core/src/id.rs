//! Strongly-typed identifiers.

use std::fmt;

/// Identifies the schema an allocated object was built from.
///
/// Type ids are chosen by the caller and stored verbatim in the arena
/// directory, so they survive a save/load cycle. Each arena keeps its own
/// registry binding ids to schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u64);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TypeId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
