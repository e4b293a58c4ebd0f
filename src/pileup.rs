//! Pileup values emitted by the traversal.
//!
//! A pileup is a snapshot of every active read observation at one reference
//! position. Pileups are immutable once built and own shared handles to
//! their reads, so they can outlive the engine that produced them.

use std::sync::Arc;

use crate::cursor::IndelEvent;
use crate::locus::GenomeCoordinate;
use crate::read::AlignedRead;

/// One read's observation at a base pileup position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PileupElement {
    read: Arc<AlignedRead>,
    /// Read offset of the aligned base; None for a deletion marker
    offset: Option<usize>,
}

impl PileupElement {
    pub fn new(read: Arc<AlignedRead>, offset: Option<usize>) -> Self {
        Self { read, offset }
    }

    #[inline]
    pub fn read(&self) -> &Arc<AlignedRead> {
        &self.read
    }

    #[inline]
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    #[inline]
    pub fn is_deletion(&self) -> bool {
        self.offset.is_none()
    }

    /// Observed base, None for deletion markers.
    #[inline]
    pub fn base(&self) -> Option<u8> {
        self.offset.map(|o| self.read.base_at(o))
    }
}

/// All base observations at one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pileup {
    locus: GenomeCoordinate,
    elements: Vec<PileupElement>,
    deletion_count: usize,
    mq0_count: usize,
}

impl Pileup {
    /// Build a pileup, deriving the deletion count from the elements.
    ///
    /// `mq0_count` covers every active read at the locus, including reads in
    /// a deletion or skip that contribute no element.
    pub fn new(locus: GenomeCoordinate, elements: Vec<PileupElement>, mq0_count: usize) -> Self {
        let deletion_count = elements.iter().filter(|e| e.is_deletion()).count();
        Self {
            locus,
            elements,
            deletion_count,
            mq0_count,
        }
    }

    #[inline]
    pub fn locus(&self) -> GenomeCoordinate {
        self.locus
    }

    #[inline]
    pub fn elements(&self) -> &[PileupElement] {
        &self.elements
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub fn deletion_count(&self) -> usize {
        self.deletion_count
    }

    #[inline]
    pub fn mq0_count(&self) -> usize {
        self.mq0_count
    }

    /// Observed bases, skipping deletion markers.
    pub fn bases(&self) -> Vec<u8> {
        self.elements.iter().filter_map(|e| e.base()).collect()
    }
}

/// One read's entry in an extended-event pileup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedEventElement {
    read: Arc<AlignedRead>,
    /// Read offset of the last base at or before the anchor position
    read_offset: Option<usize>,
    /// The indel, or None for reads that span the anchor without one
    event: Option<IndelEvent>,
}

impl ExtendedEventElement {
    /// Element carrying an indel event.
    pub fn indel(read: Arc<AlignedRead>, event: IndelEvent) -> Self {
        Self {
            read,
            read_offset: event.read_offset,
            event: Some(event),
        }
    }

    /// Placeholder for a read without an event at the anchor.
    pub fn no_event(read: Arc<AlignedRead>, read_offset: Option<usize>) -> Self {
        Self {
            read,
            read_offset,
            event: None,
        }
    }

    #[inline]
    pub fn read(&self) -> &Arc<AlignedRead> {
        &self.read
    }

    #[inline]
    pub fn read_offset(&self) -> Option<usize> {
        self.read_offset
    }

    #[inline]
    pub fn event(&self) -> Option<&IndelEvent> {
        self.event.as_ref()
    }

    #[inline]
    pub fn is_indel(&self) -> bool {
        self.event.is_some()
    }

    #[inline]
    pub fn is_insertion(&self) -> bool {
        self.event.as_ref().is_some_and(|e| e.is_insertion())
    }

    #[inline]
    pub fn is_deletion(&self) -> bool {
        self.event.as_ref().is_some_and(|e| e.is_deletion())
    }

    /// Event length, 0 for placeholders.
    #[inline]
    pub fn event_length(&self) -> u32 {
        self.event.as_ref().map_or(0, |e| e.length)
    }
}

/// Indel observations anchored to one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedEventPileup {
    locus: GenomeCoordinate,
    elements: Vec<ExtendedEventElement>,
    insertion_count: usize,
    deletion_count: usize,
    mq0_count: usize,
    max_deletion_length: u32,
}

impl ExtendedEventPileup {
    /// `mq0_count` covers every active read, with or without an element.
    pub fn new(
        locus: GenomeCoordinate,
        elements: Vec<ExtendedEventElement>,
        mq0_count: usize,
    ) -> Self {
        let mut insertion_count = 0;
        let mut deletion_count = 0;
        let mut max_deletion_length = 0;
        for element in &elements {
            if element.is_insertion() {
                insertion_count += 1;
            } else if element.is_deletion() {
                deletion_count += 1;
                max_deletion_length = max_deletion_length.max(element.event_length());
            }
        }
        Self {
            locus,
            elements,
            insertion_count,
            deletion_count,
            mq0_count,
            max_deletion_length,
        }
    }

    #[inline]
    pub fn locus(&self) -> GenomeCoordinate {
        self.locus
    }

    #[inline]
    pub fn elements(&self) -> &[ExtendedEventElement] {
        &self.elements
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub fn insertion_count(&self) -> usize {
        self.insertion_count
    }

    #[inline]
    pub fn deletion_count(&self) -> usize {
        self.deletion_count
    }

    #[inline]
    pub fn mq0_count(&self) -> usize {
        self.mq0_count
    }

    #[inline]
    pub fn max_deletion_length(&self) -> u32 {
        self.max_deletion_length
    }
}

/// One item of the traversal output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocusPileup {
    Base(Pileup),
    Extended(ExtendedEventPileup),
}

impl LocusPileup {
    #[inline]
    pub fn locus(&self) -> GenomeCoordinate {
        match self {
            LocusPileup::Base(p) => p.locus(),
            LocusPileup::Extended(p) => p.locus(),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        match self {
            LocusPileup::Base(p) => p.size(),
            LocusPileup::Extended(p) => p.size(),
        }
    }

    #[inline]
    pub fn is_extended(&self) -> bool {
        matches!(self, LocusPileup::Extended(_))
    }

    pub fn deletion_count(&self) -> usize {
        match self {
            LocusPileup::Base(p) => p.deletion_count(),
            LocusPileup::Extended(p) => p.deletion_count(),
        }
    }

    /// Insertions are only observed in extended-event pileups.
    pub fn insertion_count(&self) -> usize {
        match self {
            LocusPileup::Base(_) => 0,
            LocusPileup::Extended(p) => p.insertion_count(),
        }
    }

    pub fn mq0_count(&self) -> usize {
        match self {
            LocusPileup::Base(p) => p.mq0_count(),
            LocusPileup::Extended(p) => p.mq0_count(),
        }
    }

    /// Names of the reads contributing to this pileup, in element order.
    pub fn read_names(&self) -> Vec<&str> {
        match self {
            LocusPileup::Base(p) => p.elements().iter().map(|e| e.read().name()).collect(),
            LocusPileup::Extended(p) => p.elements().iter().map(|e| e.read().name()).collect(),
        }
    }

    pub fn as_base(&self) -> Option<&Pileup> {
        match self {
            LocusPileup::Base(p) => Some(p),
            LocusPileup::Extended(_) => None,
        }
    }

    pub fn as_extended(&self) -> Option<&ExtendedEventPileup> {
        match self {
            LocusPileup::Base(_) => None,
            LocusPileup::Extended(p) => Some(p),
        }
    }
}
