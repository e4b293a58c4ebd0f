//! Inline sort validation for read streams.
//!
//! The traversal needs reads ordered by (dictionary contig index, alignment
//! start). Any consistent dictionary order works; chromosome names are never
//! compared lexicographically.

use crate::error::{PileupError, Result};
use crate::genome::SequenceDictionary;
use crate::locus::GenomeCoordinate;

/// Validates coordinate order as records stream past.
#[derive(Debug, Default)]
pub struct SortValidator {
    prev: Option<GenomeCoordinate>,
    record_count: usize,
}

impl SortValidator {
    /// Create a new sort validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `start` lies on a contig of `dict` and does not precede the
    /// previous record's start.
    #[inline]
    pub fn validate(
        &mut self,
        read_name: &str,
        start: GenomeCoordinate,
        dict: &SequenceDictionary,
    ) -> Result<()> {
        self.record_count += 1;

        if !dict.has_id(start.contig()) {
            return Err(PileupError::UnknownContig(format!(
                "#{} (read '{}', record {})",
                start.contig().0,
                read_name,
                self.record_count
            )));
        }

        if let Some(prev) = self.prev {
            if start < prev {
                let message = if start.contig() != prev.contig() {
                    format!(
                        "read '{}' (record {}) on {} appears after reads on {}; contigs must follow dictionary order",
                        read_name,
                        self.record_count,
                        dict.name(start.contig()),
                        dict.name(prev.contig())
                    )
                } else {
                    format!(
                        "read '{}' (record {}) starts at {} after a read starting at {}",
                        read_name,
                        self.record_count,
                        start.display(dict),
                        prev.display(dict)
                    )
                };
                return Err(PileupError::UnsortedInput(message));
            }
        }

        self.prev = Some(start);
        Ok(())
    }

    /// Get the number of records validated.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}
