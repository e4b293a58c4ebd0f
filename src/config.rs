//! Traversal configuration.
//!
//! A `TraversalConfig` is built once, validated, and then handed by value to
//! every engine that needs it. Nothing here is process-global: parallel shard
//! engines each receive their own copy.

use crate::error::{PileupError, Result};

/// Default per-sample read cap at a single locus.
pub const DEFAULT_MAX_READS_PER_LOCUS_PER_SAMPLE: u32 = 1000;

/// Default number of reference bases per shard.
pub const DEFAULT_SHARD_SIZE: u64 = 100_000;

/// Default downsampling seed. Fixed so repeated runs make identical choices.
pub const DEFAULT_RANDOM_SEED: u64 = 38_148_309;

/// Options recognized by the traversal core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalConfig {
    /// Maximum number of reads per sample kept active at one locus (must be > 0)
    pub max_reads_per_locus_per_sample: u32,
    /// Report reads that are inside a deletion as deletion markers
    pub include_reads_with_deletion_at_loci: bool,
    /// Emit extended-event pileups for insertions and deletions
    pub generate_extended_events: bool,
    /// Reference bases per shard (must be > 0)
    pub shard_size: u64,
    /// Seed for the downsampling random source
    pub random_seed: u64,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TraversalConfig {
    pub fn new() -> Self {
        Self {
            max_reads_per_locus_per_sample: DEFAULT_MAX_READS_PER_LOCUS_PER_SAMPLE,
            include_reads_with_deletion_at_loci: false,
            generate_extended_events: false,
            shard_size: DEFAULT_SHARD_SIZE,
            random_seed: DEFAULT_RANDOM_SEED,
        }
    }

    /// Configuration with an effectively unlimited downsampling cap.
    pub fn unbounded() -> Self {
        Self::new().with_max_reads(u32::MAX)
    }

    /// Set the per-sample read cap.
    pub fn with_max_reads(mut self, max_reads: u32) -> Self {
        self.max_reads_per_locus_per_sample = max_reads;
        self
    }

    /// Include reads with a deletion at the locus as deletion markers.
    pub fn with_deletions(mut self, include: bool) -> Self {
        self.include_reads_with_deletion_at_loci = include;
        self
    }

    /// Enable or disable extended-event pileups.
    pub fn with_extended_events(mut self, enabled: bool) -> Self {
        self.generate_extended_events = enabled;
        self
    }

    /// Set the shard size in reference bases.
    pub fn with_shard_size(mut self, shard_size: u64) -> Self {
        self.shard_size = shard_size;
        self
    }

    /// Set the downsampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Reject values the traversal cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_reads_per_locus_per_sample == 0 {
            return Err(PileupError::InvalidConfiguration(
                "max reads per locus per sample must be greater than 0".to_string(),
            ));
        }
        if self.shard_size == 0 {
            return Err(PileupError::InvalidConfiguration(
                "shard size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TraversalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.random_seed, DEFAULT_RANDOM_SEED);
        assert!(!config.generate_extended_events);
        assert!(!config.include_reads_with_deletion_at_loci);
    }

    #[test]
    fn test_zero_cap_rejected() {
        let config = TraversalConfig::new().with_max_reads(0);
        assert!(matches!(
            config.validate(),
            Err(PileupError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_shard_size_rejected() {
        let config = TraversalConfig::new().with_shard_size(0);
        assert!(matches!(
            config.validate(),
            Err(PileupError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_builder_chain() {
        let config = TraversalConfig::unbounded()
            .with_deletions(true)
            .with_extended_events(true)
            .with_seed(7);
        assert_eq!(config.max_reads_per_locus_per_sample, u32::MAX);
        assert!(config.include_reads_with_deletion_at_loci);
        assert!(config.generate_extended_events);
        assert_eq!(config.random_seed, 7);
    }
}
