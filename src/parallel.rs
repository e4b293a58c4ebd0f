//! Parallel shard traversal using Rayon.
//!
//! Each shard gets its own [`LocusTraversalEngine`] over the reads that
//! overlap it. Engines share nothing but the read-only dictionary and the
//! configuration (including the random seed), so outcomes depend only on the
//! input and the shard plan, never on scheduling.

use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;

use crate::config::TraversalConfig;
use crate::engine::{LocusTraversalEngine, SampleSet, TraversalStats};
use crate::error::{PileupError, Result};
use crate::genome::SequenceDictionary;
use crate::pileup::LocusPileup;
use crate::read::AlignedRead;
use crate::shard::{Shard, ShardStrategy};
use crate::streaming::validation::SortValidator;

/// Minimum number of shards before enabling parallelization.
pub const PARALLEL_THRESHOLD: usize = 2;

/// Result of traversing one shard.
#[derive(Debug)]
pub struct ShardOutcome {
    pub shard: Shard,
    pub pileups: Result<Vec<LocusPileup>>,
    pub stats: TraversalStats,
}

/// Longest reference span of any read in `reads`.
pub fn max_reference_span(reads: &[Arc<AlignedRead>]) -> u64 {
    reads
        .iter()
        .map(|read| read.reference_length())
        .max()
        .unwrap_or(0)
}

/// The sorted sub-slice of `reads` that can reach `shard`.
///
/// Reads starting more than `max_span` bases before the shard cannot overlap
/// it, so both ends are found by binary search.
pub fn shard_window<'a>(
    reads: &'a [Arc<AlignedRead>],
    shard: &Shard,
    max_span: u64,
) -> &'a [Arc<AlignedRead>] {
    let (Some(first), Some(last)) = (shard.first(), shard.last()) else {
        return &[];
    };
    let floor = (first.contig(), first.position().saturating_sub(max_span));
    let lower = reads.partition_point(|read| {
        let start = read.start();
        (start.contig(), start.position()) < floor
    });
    // Reads starting on the base after the shard can still be placeholders in
    // an extended pileup anchored on its last base.
    let upper = reads.partition_point(|read| read.start() <= last.next());
    reads.get(lower..upper).unwrap_or(&[])
}

/// Traverse one shard over a sorted read slice, such as one returned by
/// [`shard_window`]. Reads that miss the shard are skipped.
pub fn traverse_shard(
    reads: &[Arc<AlignedRead>],
    shard: Shard,
    dict: &Arc<SequenceDictionary>,
    samples: &SampleSet,
    config: TraversalConfig,
) -> ShardOutcome {
    let source = reads
        .iter()
        .filter(|read| {
            read.end().is_some_and(|end| {
                let from = read.start().position().saturating_sub(1);
                shard.overlaps_span(end.contig(), from, end.position())
            })
        })
        .cloned()
        .map(Ok::<_, PileupError>);

    let mut engine = match LocusTraversalEngine::new(source, Arc::clone(dict), samples.clone(), config)
    {
        Ok(engine) => engine.with_regions(shard.ranges.clone()),
        Err(e) => {
            return ShardOutcome {
                shard,
                pileups: Err(e),
                stats: TraversalStats::default(),
            }
        }
    };

    let pileups: Result<Vec<LocusPileup>> = engine.by_ref().collect();
    let stats = engine.into_stats();

    match &pileups {
        Ok(p) => info!("shard {} done: {} pileups", shard.index, p.len()),
        Err(e) => warn!("shard {} failed: {}", shard.index, e),
    }

    ShardOutcome {
        shard,
        pileups,
        stats,
    }
}

/// Traverse every shard of `strategy` in parallel, returning outcomes in
/// shard order. A failing shard does not stop the others.
///
/// Fails up front if `reads` is not sorted.
pub fn traverse_shards(
    reads: &[Arc<AlignedRead>],
    dict: &Arc<SequenceDictionary>,
    samples: &SampleSet,
    strategy: &dyn ShardStrategy,
    config: TraversalConfig,
) -> Result<Vec<ShardOutcome>> {
    config.validate()?;
    let mut validator = SortValidator::new();
    for read in reads {
        validator.validate(read.name(), read.start(), dict)?;
    }

    let shards: Vec<Shard> = strategy.shards().collect();
    let max_span = max_reference_span(reads);
    info!(
        "traversing {} reads over {} shards ({} regions)",
        reads.len(),
        shards.len(),
        strategy.regions().len()
    );

    let outcomes: Vec<ShardOutcome> = if shards.len() >= PARALLEL_THRESHOLD {
        shards
            .into_par_iter()
            .map(|shard| {
                let window = shard_window(reads, &shard, max_span);
                traverse_shard(window, shard, dict, samples, config)
            })
            .collect()
    } else {
        shards
            .into_iter()
            .map(|shard| {
                let window = shard_window(reads, &shard, max_span);
                traverse_shard(window, shard, dict, samples, config)
            })
            .collect()
    };
    Ok(outcomes)
}

/// Concatenate shard outcomes in order, surfacing the first failure.
pub fn concat_outcomes(outcomes: Vec<ShardOutcome>) -> Result<(Vec<LocusPileup>, TraversalStats)> {
    let mut all = Vec::new();
    let mut stats = TraversalStats::default();
    for outcome in outcomes {
        stats.merge(&outcome.stats);
        all.extend(outcome.pileups?);
    }
    Ok((all, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::ContigId;
    use crate::locus::{GenomeCoordinate, GenomeRegion};
    use crate::read::parse_cigar;
    use crate::shard::{ContigShardStrategy, LocusShardStrategy};

    fn dict() -> Arc<SequenceDictionary> {
        let mut d = SequenceDictionary::new();
        d.push("chr1", 1_000);
        d.push("chr2", 1_000);
        Arc::new(d)
    }

    fn read(name: &str, contig: u32, pos: u64, cigar: &str) -> Arc<AlignedRead> {
        let start = GenomeCoordinate::new(ContigId(contig), pos).unwrap();
        AlignedRead::new(name, "s", start, parse_cigar(cigar).unwrap(), Vec::new(), 60)
            .unwrap()
            .into_shared()
    }

    fn loci(pileups: &[LocusPileup]) -> Vec<(bool, u32, u64, usize)> {
        pileups
            .iter()
            .map(|p| (p.is_extended(), p.locus().contig().0, p.locus().position(), p.size()))
            .collect()
    }

    #[test]
    fn test_sharded_matches_single_pass() {
        let d = dict();
        let reads = vec![
            read("a", 0, 5, "20M"),
            read("b", 0, 8, "4M2I10M"),
            read("c", 0, 18, "3M4D10M"),
            read("d", 0, 40, "5M"),
            read("e", 1, 1, "12M"),
        ];
        let config = TraversalConfig::unbounded()
            .with_deletions(true)
            .with_extended_events(true);

        let single: Vec<LocusPileup> = LocusTraversalEngine::new(
            reads.iter().cloned().map(Ok::<_, PileupError>),
            Arc::clone(&d),
            SampleSet::any(),
            config,
        )
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();

        for shard_size in [1, 3, 7, 100] {
            let strategy = LocusShardStrategy::new(&d, Vec::new(), shard_size).unwrap();
            let outcomes =
                traverse_shards(&reads, &d, &SampleSet::any(), &strategy, config).unwrap();
            let (sharded, _) = concat_outcomes(outcomes).unwrap();
            assert_eq!(loci(&sharded), loci(&single), "shard size {}", shard_size);
        }
    }

    #[test]
    fn test_shard_window_bounds() {
        let d = dict();
        let reads = vec![
            read("early", 0, 10, "5M"),
            read("long", 0, 100, "150M"),
            read("inside", 0, 240, "5M"),
            read("next", 0, 261, "5M"),
            read("after", 0, 300, "5M"),
            read("other", 1, 1, "5M"),
        ];
        let max_span = max_reference_span(&reads);
        assert_eq!(max_span, 150);

        let region = GenomeRegion::new(ContigId(0), 241, 260).unwrap();
        let strategy = LocusShardStrategy::new(&d, vec![region], 100).unwrap();
        let shard = strategy.shards().next().unwrap();
        let names: Vec<&str> = shard_window(&reads, &shard, max_span)
            .iter()
            .map(|r| r.name())
            .collect();
        assert_eq!(names, vec!["long", "inside", "next"]);

        let window = shard_window(&reads, &shard, max_span);
        let outcome =
            traverse_shard(window, shard, &d, &SampleSet::any(), TraversalConfig::unbounded());
        let positions: Vec<u64> = outcome
            .pileups
            .unwrap()
            .iter()
            .map(|p| p.locus().position())
            .collect();
        assert_eq!(positions, (241..=249).collect::<Vec<u64>>());
    }

    #[test]
    fn test_outcomes_in_shard_order() {
        let d = dict();
        let reads = vec![read("a", 0, 1, "10M"), read("b", 1, 1, "10M")];
        let strategy = ContigShardStrategy::new(&d, Vec::new());
        let outcomes =
            traverse_shards(&reads, &d, &SampleSet::any(), &strategy, TraversalConfig::unbounded())
                .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].shard.index, 0);
        assert_eq!(outcomes[1].shard.index, 1);
        assert_eq!(outcomes[0].stats.base_pileups, 10);
        assert_eq!(outcomes[1].stats.base_pileups, 10);
    }

    #[test]
    fn test_failed_shard_does_not_stop_others() {
        let d = dict();
        let reads = vec![read("bad", 0, 1, "1M1I1D1M"), read("good", 1, 1, "3M")];
        let config = TraversalConfig::unbounded().with_extended_events(true);
        let strategy = ContigShardStrategy::new(&d, Vec::new());
        let outcomes = traverse_shards(&reads, &d, &SampleSet::any(), &strategy, config).unwrap();

        assert!(outcomes[0].pileups.is_err());
        assert_eq!(outcomes[1].pileups.as_ref().map(Vec::len).ok(), Some(3));
        assert!(matches!(
            concat_outcomes(outcomes),
            Err(PileupError::InconsistentAlignment { .. })
        ));
    }

    #[test]
    fn test_unsorted_reads_rejected() {
        let d = dict();
        let reads = vec![read("b", 1, 1, "3M"), read("a", 0, 1, "3M")];
        let strategy = ContigShardStrategy::new(&d, Vec::new());
        let result =
            traverse_shards(&reads, &d, &SampleSet::any(), &strategy, TraversalConfig::unbounded());
        assert!(matches!(result, Err(PileupError::UnsortedInput(_))));
    }

    #[test]
    fn test_region_restricted_shards() {
        let d = dict();
        let reads = vec![read("a", 0, 1, "50M")];
        let region = GenomeRegion::new(ContigId(0), 20, 29).unwrap();
        let strategy = LocusShardStrategy::new(&d, vec![region], 4).unwrap();
        let outcomes =
            traverse_shards(&reads, &d, &SampleSet::any(), &strategy, TraversalConfig::unbounded())
                .unwrap();
        let (pileups, stats) = concat_outcomes(outcomes).unwrap();
        let positions: Vec<u64> = pileups.iter().map(|p| p.locus().position()).collect();
        assert_eq!(positions, (20..=29).collect::<Vec<u64>>());
        assert_eq!(stats.base_pileups, 10);
    }
}
