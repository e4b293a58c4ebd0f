//! Pileup depth report.
//!
//! Runs the locus traversal over a read table and writes one summary line
//! per emitted pileup. Without sharding the reads stream straight through a
//! single engine, holding only the reads overlapping the current position.
//! With sharding the reads are loaded once and shards run in parallel, with
//! output concatenated in shard order.

use std::io::{Read, Write};
use std::sync::Arc;

use log::info;

use crate::config::TraversalConfig;
use crate::engine::{LocusTraversalEngine, SampleSet, TraversalStats};
use crate::error::Result;
use crate::genome::SequenceDictionary;
use crate::locus::GenomeRegion;
use crate::parallel::traverse_shards;
use crate::read::AlignedRead;
use crate::reader::ReadTableReader;
use crate::shard::{ContigShardStrategy, LocusShardStrategy, ShardStrategy};
use crate::streaming::PileupWriter;

/// How the traversal is decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMode {
    /// One engine over the whole stream
    Streaming,
    /// Fixed-size shards of `shard_size` bases
    Sharded,
    /// One shard per contig
    PerContig,
}

/// Depth command configuration.
#[derive(Debug, Clone)]
pub struct DepthCommand {
    pub config: TraversalConfig,
    /// Emission regions; empty means the whole genome
    pub regions: Vec<GenomeRegion>,
    pub samples: SampleSet,
    pub mode: DepthMode,
}

impl Default for DepthCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthCommand {
    pub fn new() -> Self {
        Self {
            config: TraversalConfig::new(),
            regions: Vec::new(),
            samples: SampleSet::any(),
            mode: DepthMode::Streaming,
        }
    }

    pub fn with_config(mut self, config: TraversalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_regions(mut self, regions: Vec<GenomeRegion>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_samples(mut self, samples: SampleSet) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_mode(mut self, mode: DepthMode) -> Self {
        self.mode = mode;
        self
    }

    /// Execute the traversal, writing summary lines to `output`.
    pub fn run<R: Read, W: Write>(
        &self,
        reader: ReadTableReader<R>,
        dict: &Arc<SequenceDictionary>,
        output: W,
    ) -> Result<TraversalStats> {
        self.config.validate()?;
        let mut writer = PileupWriter::new(output);
        let stats = match self.mode {
            DepthMode::Streaming => self.run_streaming(reader, dict, &mut writer)?,
            DepthMode::Sharded | DepthMode::PerContig => {
                self.run_sharded(reader, dict, &mut writer)?
            }
        };
        writer.flush()?;
        Ok(stats)
    }

    fn run_streaming<R: Read, W: Write>(
        &self,
        reader: ReadTableReader<R>,
        dict: &Arc<SequenceDictionary>,
        writer: &mut PileupWriter<W>,
    ) -> Result<TraversalStats> {
        let mut engine = LocusTraversalEngine::new(
            reader,
            Arc::clone(dict),
            self.samples.clone(),
            self.config,
        )?;
        if !self.regions.is_empty() {
            engine = engine.with_regions(self.regions.clone());
        }

        for pileup in engine.by_ref() {
            writer.write_pileup(&pileup?, dict)?;
        }
        Ok(engine.into_stats())
    }

    fn run_sharded<R: Read, W: Write>(
        &self,
        reader: ReadTableReader<R>,
        dict: &Arc<SequenceDictionary>,
        writer: &mut PileupWriter<W>,
    ) -> Result<TraversalStats> {
        let reads: Vec<Arc<AlignedRead>> = reader
            .map(|read| read.map(Arc::new))
            .collect::<Result<_>>()?;
        info!("loaded {} reads", reads.len());

        let strategy: Box<dyn ShardStrategy> = match self.mode {
            DepthMode::PerContig => Box::new(ContigShardStrategy::new(dict, self.regions.clone())),
            _ => Box::new(LocusShardStrategy::new(
                dict,
                self.regions.clone(),
                self.config.shard_size,
            )?),
        };

        let outcomes = traverse_shards(&reads, dict, &self.samples, strategy.as_ref(), self.config)?;
        let mut stats = TraversalStats::default();
        for outcome in outcomes {
            stats.merge(&outcome.stats);
            for pileup in outcome.pileups? {
                writer.write_pileup(&pileup, dict)?;
            }
        }
        Ok(stats)
    }
}
