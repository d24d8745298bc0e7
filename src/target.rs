use alloy_primitives::U256;

/// Difficulty gate for puzzle hashes.
///
/// A hash wins when, read as a big-endian integer, it is divisible by the
/// difficulty. The modulus is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyTarget {
    modulus: U256,
}

impl DifficultyTarget {
    /// Returns `None` for a zero difficulty
    pub fn new(difficulty: U256) -> Option<Self> {
        if difficulty.is_zero() {
            None
        } else {
            Some(Self {
                modulus: difficulty,
            })
        }
    }

    pub fn from_u64(difficulty: u64) -> Option<Self> {
        Self::new(U256::from(difficulty))
    }

    /// Check if the given 32-byte hash satisfies the puzzle
    #[inline(always)]
    pub fn matches(&self, hash: &[u8; 32]) -> bool {
        (U256::from_be_bytes(*hash) % self.modulus).is_zero()
    }

    pub fn difficulty(&self) -> U256 {
        self.modulus
    }

    /// Estimate attempts needed (average case), saturating at `u64::MAX`
    pub fn estimated_attempts(&self) -> u64 {
        if self.modulus.bit_len() > 64 {
            u64::MAX
        } else {
            self.modulus.as_limbs()[0]
        }
    }
}
