//! Locus-by-locus traversal over a coordinate-sorted read stream.
//!
//! The engine pulls reads lazily, admits them into a per-sample bounded
//! [`ReservoirSampler`] of [`ReadCursor`]s, and emits one pileup per covered
//! reference position in strictly increasing order. When extended events are
//! enabled, a pileup of the indels anchored at the previous position is
//! emitted before the base pileup that follows them.
//!
//! Memory is bounded by the reads overlapping the current position (after
//! downsampling) plus a single lookahead read.

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use rustc_hash::FxHashSet;

use crate::config::TraversalConfig;
use crate::cursor::ReadCursor;
use crate::error::{PileupError, Result};
use crate::genome::SequenceDictionary;
use crate::locus::{merge_regions, GenomeCoordinate, GenomeRegion};
use crate::pileup::{ExtendedEventElement, ExtendedEventPileup, LocusPileup, Pileup, PileupElement};
use crate::read::{AlignedRead, OpKind};
use crate::sampler::{ReservoirSampler, SampleNamePartitioner};
use crate::streaming::validation::SortValidator;

/// The set of samples whose reads take part in the traversal.
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    names: Option<FxHashSet<Arc<str>>>,
}

impl SampleSet {
    /// Accept reads from every sample.
    pub fn any() -> Self {
        Self { names: None }
    }

    /// Accept reads only from the named samples.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    #[inline]
    pub fn contains(&self, sample: &str) -> bool {
        self.names.as_ref().is_none_or(|names| names.contains(sample))
    }
}

/// Statistics from one traversal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TraversalStats {
    /// Reads pulled from the source
    pub reads_pulled: usize,
    /// Reads skipped for an unlisted sample or because they miss every region
    pub reads_filtered: usize,
    /// Reads with no aligned reference base
    pub reads_unaligned: usize,
    /// Reads admitted into the active set
    pub reads_admitted: usize,
    /// Active reads evicted by downsampling
    pub reads_evicted: usize,
    /// Incoming reads rejected by downsampling
    pub reads_dropped: usize,
    /// Base pileups emitted
    pub base_pileups: usize,
    /// Extended-event pileups emitted
    pub extended_pileups: usize,
    /// Largest active set seen (memory high-water mark)
    pub max_active: usize,
}

impl TraversalStats {
    /// Fold another traversal's counts into this one.
    pub fn merge(&mut self, other: &TraversalStats) {
        self.reads_pulled += other.reads_pulled;
        self.reads_filtered += other.reads_filtered;
        self.reads_unaligned += other.reads_unaligned;
        self.reads_admitted += other.reads_admitted;
        self.reads_evicted += other.reads_evicted;
        self.reads_dropped += other.reads_dropped;
        self.base_pileups += other.base_pileups;
        self.extended_pileups += other.extended_pileups;
        self.max_active = self.max_active.max(other.max_active);
    }
}

impl fmt::Display for TraversalStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reads: {} (filtered {}, unaligned {}), Admitted: {}, Evicted: {}, Dropped: {}, \
             Pileups: {} base + {} extended, Max active: {}",
            self.reads_pulled,
            self.reads_filtered,
            self.reads_unaligned,
            self.reads_admitted,
            self.reads_evicted,
            self.reads_dropped,
            self.base_pileups,
            self.extended_pileups,
            self.max_active
        )
    }
}

/// Streaming pileup producer.
///
/// `I` yields reads sorted by (contig dictionary index, alignment start).
/// Each read may arrive owned or already shared.
pub struct LocusTraversalEngine<I> {
    source: I,
    source_done: bool,
    lookahead: Option<Arc<AlignedRead>>,
    dict: Arc<SequenceDictionary>,
    samples: SampleSet,
    config: TraversalConfig,
    /// Merged, sorted emission regions; None means everywhere
    regions: Option<Vec<GenomeRegion>>,
    active: ReservoirSampler<ReadCursor, SampleNamePartitioner>,
    frontier: Option<GenomeCoordinate>,
    extended_pending: bool,
    validator: SortValidator,
    stats: TraversalStats,
    deferred: Option<PileupError>,
    failed: bool,
}

impl<I, R> LocusTraversalEngine<I>
where
    I: Iterator<Item = Result<R>>,
    R: Into<Arc<AlignedRead>>,
{
    /// Create an engine over `source`. Fails on an invalid configuration.
    pub fn new(
        source: I,
        dict: Arc<SequenceDictionary>,
        samples: SampleSet,
        config: TraversalConfig,
    ) -> Result<Self> {
        config.validate()?;
        let active = ReservoirSampler::new(
            config.max_reads_per_locus_per_sample,
            SampleNamePartitioner,
            config.random_seed,
        )?;
        Ok(Self {
            source,
            source_done: false,
            lookahead: None,
            dict,
            samples,
            config,
            regions: None,
            active,
            frontier: None,
            extended_pending: false,
            validator: SortValidator::new(),
            stats: TraversalStats::default(),
            deferred: None,
            failed: false,
        })
    }

    /// Restrict emitted pileups to `regions`. Reads that miss every region
    /// are skipped without entering the active set.
    pub fn with_regions(mut self, regions: Vec<GenomeRegion>) -> Self {
        self.regions = Some(merge_regions(regions));
        self
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    pub fn stats(&self) -> &TraversalStats {
        &self.stats
    }

    pub fn into_stats(self) -> TraversalStats {
        self.stats
    }

    /// Position of the next base pileup, once known.
    pub fn frontier(&self) -> Option<GenomeCoordinate> {
        self.frontier
    }

    /// Pull reads until one is accepted or the source ends, returning the
    /// start of the lookahead read.
    fn fill_lookahead(&mut self) -> Result<Option<GenomeCoordinate>> {
        while self.lookahead.is_none() && !self.source_done {
            let read: Arc<AlignedRead> = match self.source.next() {
                Some(item) => item?.into(),
                None => {
                    self.source_done = true;
                    break;
                }
            };
            self.stats.reads_pulled += 1;
            self.validator
                .validate(read.name(), read.start(), &self.dict)?;

            if !self.samples.contains(read.sample()) {
                trace!("skipping read '{}' from unlisted sample '{}'", read.name(), read.sample());
                self.stats.reads_filtered += 1;
                continue;
            }
            let Some(end) = read.end() else {
                debug!("skipping read '{}' with no aligned reference bases", read.name());
                self.stats.reads_unaligned += 1;
                continue;
            };
            if !self.overlaps_regions(read.start(), end) {
                self.stats.reads_filtered += 1;
                continue;
            }
            self.lookahead = Some(read);
        }
        Ok(self.lookahead.as_ref().map(|read| read.start()))
    }

    fn overlaps_regions(&self, start: GenomeCoordinate, end: GenomeCoordinate) -> bool {
        let Some(regions) = &self.regions else {
            return true;
        };
        // A read starting right after a region still shows up as a placeholder
        // in an extended pileup anchored on the region's last base.
        let from = start.position().saturating_sub(1);
        let key = (start.contig(), from);
        let idx = regions.partition_point(|r| (r.contig, r.end) < key);
        regions
            .get(idx)
            .is_some_and(|r| r.overlaps_span(start.contig(), from, end.position()))
    }

    fn in_regions(&self, locus: GenomeCoordinate) -> bool {
        let Some(regions) = &self.regions else {
            return true;
        };
        let key = (locus.contig(), locus.position());
        let idx = regions.partition_point(|r| (r.contig, r.end) < key);
        regions.get(idx).is_some_and(|r| r.contains(&locus))
    }

    /// True once nothing at or after `frontier` can be emitted.
    fn past_regions(&self, frontier: GenomeCoordinate) -> bool {
        let Some(last) = self.regions.as_ref().and_then(|r| r.last()) else {
            return false;
        };
        let last = last.last();
        // An extended pileup for the last base is emitted from the base after it.
        match frontier.prev() {
            Some(anchor) => anchor > last,
            None => frontier > last,
        }
    }

    /// Admit every pending read that starts at the frontier, moving the
    /// frontier to the next read when nothing is active.
    fn collect_pending(&mut self) -> Result<()> {
        loop {
            let Some(start) = self.fill_lookahead()? else {
                return Ok(());
            };

            let frontier = match self.frontier {
                Some(f) if !self.active.is_empty() || start <= f => f,
                _ => {
                    self.frontier = Some(start);
                    start
                }
            };
            if start > frontier {
                return Ok(());
            }
            if start < frontier {
                return Err(PileupError::UnsortedInput(format!(
                    "read starting at {} arrived after traversal reached {}",
                    start.display(&self.dict),
                    frontier.display(&self.dict)
                )));
            }

            let batch = self.take_batch(start)?;
            let incoming = batch.len();
            let outcome = self.active.admit(batch);
            self.stats.reads_admitted += outcome.admitted;
            self.stats.reads_evicted += outcome.evicted;
            self.stats.reads_dropped += outcome.dropped;
            self.stats.max_active = self.stats.max_active.max(self.active.len());
            if outcome.evicted > 0 || outcome.dropped > 0 {
                debug!(
                    "downsampled at {}: admitted {}/{} reads, evicted {}, {} active",
                    start.display(&self.dict),
                    outcome.admitted,
                    incoming,
                    outcome.evicted,
                    self.active.len()
                );
            }
        }
    }

    /// Take every lookahead read starting at `start`, stepping each onto its
    /// first reference base.
    fn take_batch(&mut self, start: GenomeCoordinate) -> Result<Vec<ReadCursor>> {
        let mut batch = Vec::new();
        while self.fill_lookahead()? == Some(start) {
            let Some(read) = self.lookahead.take() else {
                break;
            };
            let mut cursor = ReadCursor::new(read, self.config.generate_extended_events);
            cursor.step()?;
            if cursor.had_indel() {
                self.extended_pending = true;
            }
            batch.push(cursor);
        }
        Ok(batch)
    }

    /// Indels anchored at the base before `frontier`, plus placeholders for
    /// the other active reads.
    fn extended_pileup(&self, frontier: GenomeCoordinate) -> Option<ExtendedEventPileup> {
        let anchor = frontier.prev()?;
        if !self.active.iter().any(ReadCursor::had_indel) {
            return None;
        }

        let include_deletions = self.config.include_reads_with_deletion_at_loci;
        let elements = self
            .active
            .iter()
            .filter_map(|cursor| {
                let read = Arc::clone(cursor.read());
                if let Some(event) = cursor.event() {
                    return Some(ExtendedEventElement::indel(read, event.clone()));
                }
                match cursor.current_op()? {
                    OpKind::ReferenceSkip => None,
                    OpKind::Deletion => {
                        include_deletions.then(|| ExtendedEventElement::no_event(read, None))
                    }
                    _ => {
                        let offset = cursor.read_offset().and_then(|o| o.checked_sub(1));
                        Some(ExtendedEventElement::no_event(read, offset))
                    }
                }
            })
            .collect();
        let mq0_count = self
            .active
            .iter()
            .filter(|cursor| cursor.read().mapping_quality() == 0)
            .count();

        Some(ExtendedEventPileup::new(anchor, elements, mq0_count))
    }

    fn base_pileup(&self, frontier: GenomeCoordinate) -> Pileup {
        let include_deletions = self.config.include_reads_with_deletion_at_loci;
        let mut mq0_count = 0;
        let elements = self
            .active
            .iter()
            .filter_map(|cursor| {
                let op = cursor.current_op()?;
                if cursor.read().mapping_quality() == 0 {
                    mq0_count += 1;
                }
                debug_assert_eq!(cursor.position(), frontier);
                let read = Arc::clone(cursor.read());
                match op {
                    OpKind::Deletion => include_deletions.then(|| PileupElement::new(read, None)),
                    OpKind::ReferenceSkip => None,
                    _ => Some(PileupElement::new(read, cursor.read_offset())),
                }
            })
            .collect();
        Pileup::new(frontier, elements, mq0_count)
    }

    /// Step every active cursor one base, dropping finished ones.
    fn advance_cursors(&mut self) -> Result<()> {
        let mut saw_indel = false;
        let result = self.active.try_retain_mut(|cursor| {
            cursor.step()?;
            saw_indel |= cursor.had_indel();
            Ok::<_, PileupError>(!cursor.is_finished())
        });
        if saw_indel {
            self.extended_pending = true;
        }
        result
    }

    fn next_pileup(&mut self) -> Result<Option<LocusPileup>> {
        loop {
            self.collect_pending()?;
            let Some(frontier) = self.frontier else {
                return Ok(None);
            };
            if self.active.is_empty() {
                return Ok(None);
            }
            if self.past_regions(frontier) {
                debug!("traversal passed the last region at {}", frontier.display(&self.dict));
                self.active.clear();
                self.lookahead = None;
                self.source_done = true;
                return Ok(None);
            }

            if self.extended_pending {
                self.extended_pending = false;
                if let Some(pileup) = self.extended_pileup(frontier) {
                    if self.in_regions(pileup.locus()) {
                        self.stats.extended_pileups += 1;
                        return Ok(Some(LocusPileup::Extended(pileup)));
                    }
                }
            }

            let pileup = self.base_pileup(frontier);
            let stepped = self.advance_cursors();
            self.frontier = Some(frontier.next());

            let emit = !pileup.is_empty() && self.in_regions(frontier);
            if emit {
                self.stats.base_pileups += 1;
            }
            match (stepped, emit) {
                (Ok(()), true) => return Ok(Some(LocusPileup::Base(pileup))),
                (Ok(()), false) => continue,
                // The pileup was built before the failing step, so it is still sound.
                (Err(e), true) => {
                    self.deferred = Some(e);
                    return Ok(Some(LocusPileup::Base(pileup)));
                }
                (Err(e), false) => return Err(e),
            }
        }
    }
}

impl<I, R> Iterator for LocusTraversalEngine<I>
where
    I: Iterator<Item = Result<R>>,
    R: Into<Arc<AlignedRead>>,
{
    type Item = Result<LocusPileup>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(e) = self.deferred.take() {
            self.failed = true;
            return Some(Err(e));
        }
        match self.next_pileup() {
            Ok(Some(pileup)) => Some(Ok(pileup)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
