//! Opaque status flag values carried by the timing feed

use serde::{Deserialize, Serialize};

/// Driver or segment status flags, passed through from the wire unresolved.
///
/// The meaning of individual bits is undocumented by the feed; interpreting them is
/// left to presentation code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct StatusBits(pub u32);

impl StatusBits {
    /// Create from a raw wire value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Check if a specific bit is set.
    pub fn is_set(&self, bit: u32) -> bool {
        bit < 32 && (self.0 & (1 << bit)) != 0
    }

    /// Check if any bit of `mask` is set.
    pub fn has_flag(&self, mask: u32) -> bool {
        (self.0 & mask) != 0
    }

    /// Get the raw value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_queries() {
        let bits = StatusBits::new(2049);
        assert!(bits.is_set(0));
        assert!(bits.is_set(11));
        assert!(!bits.is_set(1));
        assert!(!bits.is_set(40));
        assert!(bits.has_flag(2048));
        assert_eq!(bits.value(), 2049);
    }
}
