//! Mining configuration

use std::ops::RangeInclusive;

/// Candidates hashed between two staleness checkpoints
pub const DEFAULT_BATCH_SIZE: u64 = 10_000;

/// Inclusive range nonce candidates are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceSpace {
    min: u64,
    max: u64,
}

impl NonceSpace {
    /// Seven-digit decimal nonces
    pub const DEFAULT: NonceSpace = NonceSpace {
        min: 1_000_000,
        max: 9_999_999,
    };

    /// Returns `None` for an empty range
    pub fn new(min: u64, max: u64) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn range(&self) -> RangeInclusive<u64> {
        self.min..=self.max
    }

    pub fn contains(&self, nonce: u64) -> bool {
        self.range().contains(&nonce)
    }
}

impl Default for NonceSpace {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration for the hash search
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Worker threads hashing each batch (0 = auto-detect)
    pub threads: usize,
    /// Candidates per batch; the staleness check runs between batches
    pub batch_size: u64,
    pub nonce_space: NonceSpace,
}

impl SolverConfig {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: if threads == 0 { num_cpus::get() } else { threads },
            batch_size: DEFAULT_BATCH_SIZE,
            nonce_space: NonceSpace::DEFAULT,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_nonce_space(mut self, nonce_space: NonceSpace) -> Self {
        self.nonce_space = nonce_space;
        self
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_nonce_space_is_seven_digits() {
        let space = NonceSpace::default();
        assert_eq!(space.min(), 1_000_000);
        assert_eq!(space.max(), 9_999_999);
        assert!(space.contains(1_000_000));
        assert!(!space.contains(999_999));
        assert!(!space.contains(10_000_000));
    }

    #[test]
    fn test_empty_nonce_space_rejected() {
        assert!(NonceSpace::new(5, 4).is_none());
        assert_eq!(NonceSpace::new(7, 7).map(|s| s.range()), Some(7..=7));
    }

    #[test]
    fn test_auto_detect_threads() {
        assert!(SolverConfig::new(0).threads >= 1);
        assert_eq!(SolverConfig::new(3).threads, 3);
    }

    #[test]
    fn test_batch_size_never_zero() {
        let config = SolverConfig::default().with_batch_size(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(SolverConfig::default().batch_size, DEFAULT_BATCH_SIZE);
    }
}
