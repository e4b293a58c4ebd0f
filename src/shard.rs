//! Genome partitioning for parallel traversal.
//!
//! A strategy turns a set of regions into an ordered sequence of disjoint
//! [`Shard`]s that together cover the union of the regions exactly once.
//! Shards never span two contigs, and strategies hold no mutable state, so
//! asking again for the shards of the same strategy yields the same plan.

use crate::error::{PileupError, Result};
use crate::genome::{ContigId, SequenceDictionary};
use crate::locus::{merge_regions, whole_genome, GenomeCoordinate, GenomeRegion};

/// A contiguous ordered set of ranges assigned to one traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    /// Position of this shard in the plan
    pub index: usize,
    /// Disjoint, ascending ranges on a single contig
    pub ranges: Vec<GenomeRegion>,
}

impl Shard {
    pub fn contig(&self) -> Option<ContigId> {
        self.ranges.first().map(|r| r.contig)
    }

    /// First position covered by the shard.
    pub fn first(&self) -> Option<GenomeCoordinate> {
        self.ranges.first().map(GenomeRegion::first)
    }

    /// Last position covered by the shard.
    pub fn last(&self) -> Option<GenomeCoordinate> {
        self.ranges.last().map(GenomeRegion::last)
    }

    /// Total reference bases covered.
    pub fn len(&self) -> u64 {
        self.ranges.iter().map(GenomeRegion::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// True if `[start, end]` on `contig` touches any range of the shard.
    pub fn overlaps_span(&self, contig: ContigId, start: u64, end: u64) -> bool {
        self.ranges
            .iter()
            .any(|r| r.overlaps_span(contig, start, end))
    }
}

/// Partitions regions into an ordered sequence of disjoint shards.
pub trait ShardStrategy: Sync {
    /// The shards, in ascending coordinate order.
    fn shards(&self) -> Box<dyn Iterator<Item = Shard> + '_>;

    /// The merged regions the shards cover.
    fn regions(&self) -> &[GenomeRegion];
}

fn target_regions(dict: &SequenceDictionary, regions: Vec<GenomeRegion>) -> Vec<GenomeRegion> {
    if regions.is_empty() {
        whole_genome(dict)
    } else {
        merge_regions(regions)
    }
}

/// Fixed-size sharding: each shard holds at most `shard_size` reference
/// bases from one contig, packing several small regions together when they
/// fit.
#[derive(Debug, Clone)]
pub struct LocusShardStrategy {
    regions: Vec<GenomeRegion>,
    shard_size: u64,
}

impl LocusShardStrategy {
    /// Plan shards over `regions`, or the whole dictionary when empty.
    pub fn new(
        dict: &SequenceDictionary,
        regions: Vec<GenomeRegion>,
        shard_size: u64,
    ) -> Result<Self> {
        if shard_size == 0 {
            return Err(PileupError::InvalidConfiguration(
                "shard size must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            regions: target_regions(dict, regions),
            shard_size,
        })
    }

    pub fn shard_size(&self) -> u64 {
        self.shard_size
    }
}

impl ShardStrategy for LocusShardStrategy {
    fn shards(&self) -> Box<dyn Iterator<Item = Shard> + '_> {
        Box::new(LocusShards {
            regions: &self.regions,
            shard_size: self.shard_size,
            region_idx: 0,
            resume_at: None,
            index: 0,
        })
    }

    fn regions(&self) -> &[GenomeRegion] {
        &self.regions
    }
}

struct LocusShards<'a> {
    regions: &'a [GenomeRegion],
    shard_size: u64,
    region_idx: usize,
    /// Where to continue inside a region split by the previous shard
    resume_at: Option<u64>,
    index: usize,
}

impl Iterator for LocusShards<'_> {
    type Item = Shard;

    fn next(&mut self) -> Option<Shard> {
        let contig = self.regions.get(self.region_idx)?.contig;
        let mut budget = self.shard_size;
        let mut ranges = Vec::new();

        while budget > 0 {
            let Some(region) = self.regions.get(self.region_idx) else {
                break;
            };
            if region.contig != contig {
                break;
            }
            let start = self.resume_at.unwrap_or(region.start);
            let remaining = region.end - start + 1;
            let take = remaining.min(budget);
            ranges.push(GenomeRegion {
                contig,
                start,
                end: start + take - 1,
            });
            budget -= take;
            if take == remaining {
                self.region_idx += 1;
                self.resume_at = None;
            } else {
                self.resume_at = Some(start + take);
            }
        }

        let shard = Shard {
            index: self.index,
            ranges,
        };
        self.index += 1;
        Some(shard)
    }
}

/// One shard per contig, holding every region on it.
#[derive(Debug, Clone)]
pub struct ContigShardStrategy {
    regions: Vec<GenomeRegion>,
}

impl ContigShardStrategy {
    /// Plan shards over `regions`, or the whole dictionary when empty.
    pub fn new(dict: &SequenceDictionary, regions: Vec<GenomeRegion>) -> Self {
        Self {
            regions: target_regions(dict, regions),
        }
    }
}

impl ShardStrategy for ContigShardStrategy {
    fn shards(&self) -> Box<dyn Iterator<Item = Shard> + '_> {
        Box::new(
            self.regions
                .chunk_by(|a, b| a.contig == b.contig)
                .enumerate()
                .map(|(index, ranges)| Shard {
                    index,
                    ranges: ranges.to_vec(),
                }),
        )
    }

    fn regions(&self) -> &[GenomeRegion] {
        &self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> SequenceDictionary {
        let mut d = SequenceDictionary::new();
        d.push("chr1", 250);
        d.push("chr2", 100);
        d
    }

    fn region(contig: u32, start: u64, end: u64) -> GenomeRegion {
        GenomeRegion::new(ContigId(contig), start, end).unwrap()
    }

    fn covered(shards: &[Shard]) -> Vec<GenomeRegion> {
        merge_regions(shards.iter().flat_map(|s| s.ranges.clone()).collect())
    }

    #[test]
    fn test_whole_genome_fixed_size() {
        let d = dict();
        let strategy = LocusShardStrategy::new(&d, Vec::new(), 100).unwrap();
        let shards: Vec<Shard> = strategy.shards().collect();

        let spans: Vec<(u32, u64, u64)> = shards
            .iter()
            .flat_map(|s| s.ranges.iter().map(|r| (r.contig.0, r.start, r.end)))
            .collect();
        assert_eq!(
            spans,
            vec![(0, 1, 100), (0, 101, 200), (0, 201, 250), (1, 1, 100)]
        );
        assert_eq!(shards.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(covered(&shards), whole_genome(&d));
    }

    #[test]
    fn test_small_regions_are_packed() {
        let d = dict();
        let regions = vec![region(0, 10, 19), region(0, 50, 59), region(0, 100, 139)];
        let strategy = LocusShardStrategy::new(&d, regions.clone(), 30).unwrap();
        let shards: Vec<Shard> = strategy.shards().collect();

        assert_eq!(shards[0].ranges, vec![region(0, 10, 19), region(0, 50, 59), region(0, 100, 109)]);
        assert_eq!(shards[1].ranges, vec![region(0, 110, 139)]);
        assert!(shards.iter().all(|s| s.len() <= 30));
        assert_eq!(covered(&shards), regions);
    }

    #[test]
    fn test_shards_never_span_contigs() {
        let d = dict();
        let regions = vec![region(0, 240, 250), region(1, 1, 5)];
        let strategy = LocusShardStrategy::new(&d, regions, 1000).unwrap();
        let shards: Vec<Shard> = strategy.shards().collect();
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[0].contig(), Some(ContigId(0)));
        assert_eq!(shards[1].contig(), Some(ContigId(1)));
    }

    #[test]
    fn test_overlapping_regions_covered_once() {
        let d = dict();
        let regions = vec![region(0, 10, 60), region(0, 40, 90), region(0, 91, 95)];
        let strategy = LocusShardStrategy::new(&d, regions, 25).unwrap();
        let shards: Vec<Shard> = strategy.shards().collect();
        let total: u64 = shards.iter().map(Shard::len).sum();
        assert_eq!(total, 86);
        assert_eq!(covered(&shards), vec![region(0, 10, 95)]);
    }

    #[test]
    fn test_restartable() {
        let d = dict();
        let strategy = LocusShardStrategy::new(&d, Vec::new(), 37).unwrap();
        let first: Vec<Shard> = strategy.shards().collect();
        let second: Vec<Shard> = strategy.shards().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_shard_size_rejected() {
        assert!(matches!(
            LocusShardStrategy::new(&dict(), Vec::new(), 0),
            Err(PileupError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_contig_strategy() {
        let d = dict();
        let regions = vec![region(1, 5, 9), region(0, 1, 10), region(0, 20, 30)];
        let strategy = ContigShardStrategy::new(&d, regions);
        let shards: Vec<Shard> = strategy.shards().collect();
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[0].ranges, vec![region(0, 1, 10), region(0, 20, 30)]);
        assert_eq!(shards[1].ranges, vec![region(1, 5, 9)]);
        assert_eq!(shards[1].first(), GenomeCoordinate::new(ContigId(1), 5));
        assert_eq!(shards[1].last(), GenomeCoordinate::new(ContigId(1), 9));
    }
}
