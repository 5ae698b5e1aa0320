//! Shadow identities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable id of one logical node for as long as it stays mounted
///
/// Ids start at 1; 0 means "none" on the wire (no parent, no owner).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShadowId(pub u32);

impl ShadowId {
    /// Wire value
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Wire value of an optional id (0 = none)
    #[inline]
    pub fn raw_or_zero(id: Option<ShadowId>) -> u32 {
        id.map_or(0, ShadowId::raw)
    }
}

impl fmt::Debug for ShadowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ShadowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ShadowId> for u32 {
    fn from(id: ShadowId) -> u32 {
        id.0
    }
}
