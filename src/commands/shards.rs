//! Print a shard plan.

use std::io::Write;

use crate::error::Result;
use crate::genome::SequenceDictionary;
use crate::locus::GenomeRegion;
use crate::shard::{ContigShardStrategy, LocusShardStrategy, ShardStrategy};
use crate::streaming::PileupWriter;

/// Shard plan command configuration.
#[derive(Debug, Clone)]
pub struct ShardsCommand {
    /// Regions to cover; empty means the whole genome
    pub regions: Vec<GenomeRegion>,
    pub shard_size: u64,
    pub per_contig: bool,
}

impl ShardsCommand {
    pub fn new(shard_size: u64) -> Self {
        Self {
            regions: Vec::new(),
            shard_size,
            per_contig: false,
        }
    }

    pub fn with_regions(mut self, regions: Vec<GenomeRegion>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_per_contig(mut self, per_contig: bool) -> Self {
        self.per_contig = per_contig;
        self
    }

    /// Write `shard_index  contig  start  end`, one line per range.
    /// Returns the number of shards.
    pub fn run<W: Write>(&self, dict: &SequenceDictionary, output: W) -> Result<usize> {
        let strategy: Box<dyn ShardStrategy> = if self.per_contig {
            Box::new(ContigShardStrategy::new(dict, self.regions.clone()))
        } else {
            Box::new(LocusShardStrategy::new(
                dict,
                self.regions.clone(),
                self.shard_size,
            )?)
        };

        let mut writer = PileupWriter::new(output);
        let mut count = 0;
        for shard in strategy.shards() {
            for range in &shard.ranges {
                let line = format!(
                    "{}\t{}\t{}\t{}",
                    shard.index,
                    dict.name(range.contig),
                    range.start,
                    range.end
                );
                writer.write_line(line.as_bytes())?;
            }
            count += 1;
        }
        writer.flush()?;
        Ok(count)
    }
}
