//! Per-read traversal state machine.
//!
//! A [`ReadCursor`] walks one read along the reference one base per
//! [`step`](ReadCursor::step). Operations that do not consume reference
//! (clips, pads, insertions) are absorbed inside a single step, so every
//! successful step lands on exactly one reference base: a match, a deleted
//! base or a skipped base.
//!
//! With extended events enabled, an insertion or the first base of a deletion
//! leaves a pending [`IndelEvent`]. The event stays visible through
//! [`had_indel`](ReadCursor::had_indel) for exactly one reference step, the
//! step that lands on the base right after the anchor, and is cleared by the
//! following step. Insertions arm the delay at 2 because absorbing them costs
//! no reference step; deletions arm it at 2 and consume one tick immediately.

use std::sync::Arc;

use crate::error::{PileupError, Result};
use crate::locus::GenomeCoordinate;
use crate::read::{AlignedRead, OpKind};

/// Delay armed when an indel is recorded; see the module docs.
const EVENT_DELAY: u8 = 2;

/// Kind of an extended event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndelKind {
    Insertion,
    Deletion,
}

/// An insertion or deletion anchored to the reference base before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndelEvent {
    pub kind: IndelKind,
    /// Length of the insertion or deletion
    pub length: u32,
    /// Read offset of the last base before the event; None if the event
    /// precedes every aligned base of the read
    pub read_offset: Option<usize>,
    /// Inserted bases, empty for deletions
    pub inserted_bases: Vec<u8>,
}

impl IndelEvent {
    #[inline]
    pub fn is_insertion(&self) -> bool {
        self.kind == IndelKind::Insertion
    }

    #[inline]
    pub fn is_deletion(&self) -> bool {
        self.kind == IndelKind::Deletion
    }
}

/// Outcome of one [`ReadCursor::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Landed on an aligned read base
    Matched,
    /// Landed on a reference base right after an insertion
    InsertionEvent,
    /// Landed on the first base of a deletion
    DeletionEvent,
    /// Landed on a later base of a deletion
    Deleted,
    /// Landed on a base inside a reference skip
    Skipped,
    /// Past the last aligned base
    Exhausted,
}

impl Step {
    #[inline]
    pub fn is_exhausted(self) -> bool {
        self == Step::Exhausted
    }
}

/// Traversal state for one read.
#[derive(Debug, Clone)]
pub struct ReadCursor {
    read: Arc<AlignedRead>,
    extended_events: bool,
    /// Index of the operation under the cursor; None before the first step
    op_index: Option<usize>,
    /// Portion of the current operation already consumed
    op_consumed: u32,
    /// Read bases consumed so far (the current base is `read_consumed - 1`)
    read_consumed: usize,
    /// Reference bases stepped over since the alignment start
    genome_consumed: u64,
    exhausted: bool,
    event: Option<IndelEvent>,
    event_delay: u8,
}

impl ReadCursor {
    /// Create a cursor positioned before the read's first base.
    pub fn new(read: Arc<AlignedRead>, extended_events: bool) -> Self {
        Self {
            read,
            extended_events,
            op_index: None,
            op_consumed: 0,
            read_consumed: 0,
            genome_consumed: 0,
            exhausted: false,
            event: None,
            event_delay: 0,
        }
    }

    #[inline]
    pub fn read(&self) -> &Arc<AlignedRead> {
        &self.read
    }

    /// Offset of the read base under the cursor (or the last base consumed,
    /// when standing in a deletion). None before any base was consumed.
    #[inline]
    pub fn read_offset(&self) -> Option<usize> {
        self.read_consumed.checked_sub(1)
    }

    /// Reference position under the cursor.
    #[inline]
    pub fn position(&self) -> GenomeCoordinate {
        self.read
            .start()
            .offset(self.genome_consumed.saturating_sub(1))
    }

    /// Operation that produced the current reference step; None before the
    /// first step and once exhausted.
    #[inline]
    pub fn current_op(&self) -> Option<OpKind> {
        if self.exhausted {
            return None;
        }
        self.op_index.map(|i| self.read.ops()[i].kind)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// True while an indel immediately preceding the current base is pending.
    #[inline]
    pub fn had_indel(&self) -> bool {
        self.event_delay > 0 && self.event.is_some()
    }

    /// The pending indel, if any.
    #[inline]
    pub fn event(&self) -> Option<&IndelEvent> {
        if self.event_delay > 0 {
            self.event.as_ref()
        } else {
            None
        }
    }

    /// True once the cursor can be dropped from the active set.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.exhausted && !self.had_indel()
    }

    /// Advance one reference base, reporting the op kind stepped onto.
    pub fn advance(&mut self) -> Result<Option<OpKind>> {
        self.step()?;
        Ok(self.current_op())
    }

    /// Advance one reference base.
    ///
    /// Fails with `InconsistentAlignment` when two indels follow each other
    /// without a reference base between them.
    pub fn step(&mut self) -> Result<Step> {
        if self.exhausted {
            self.step_past_end();
            return Ok(Step::Exhausted);
        }

        let mut fresh: Option<IndelKind> = None;
        loop {
            let index = match self.op_index {
                Some(i) if self.op_consumed < self.read.ops()[i].len => i,
                current => {
                    let next = current.map_or(0, |i| i + 1);
                    if next >= self.read.ops().len() {
                        self.exhausted = true;
                        self.step_past_end();
                        return Ok(Step::Exhausted);
                    }
                    self.op_index = Some(next);
                    self.op_consumed = 0;
                    next
                }
            };
            let op = self.read.ops()[index];

            match op.kind {
                OpKind::HardClip | OpKind::Pad => {
                    self.op_consumed = op.len;
                    continue;
                }
                OpKind::Insertion | OpKind::SoftClip => {
                    if op.kind == OpKind::Insertion && self.extended_events {
                        self.record_event(IndelKind::Insertion, op.len)?;
                        fresh = Some(IndelKind::Insertion);
                    }
                    self.op_consumed = op.len;
                    self.read_consumed += op.len as usize;
                    continue;
                }
                OpKind::Deletion => {
                    if self.extended_events && self.op_consumed == 0 {
                        self.record_event(IndelKind::Deletion, op.len)?;
                        fresh = Some(IndelKind::Deletion);
                    }
                    self.op_consumed += 1;
                    self.genome_consumed += 1;
                }
                OpKind::ReferenceSkip => {
                    self.op_consumed += 1;
                    self.genome_consumed += 1;
                }
                OpKind::Match => {
                    self.op_consumed += 1;
                    self.read_consumed += 1;
                    self.genome_consumed += 1;
                }
            }

            self.tick();

            return Ok(match (fresh, op.kind) {
                (Some(IndelKind::Insertion), _) => Step::InsertionEvent,
                (Some(IndelKind::Deletion), _) => Step::DeletionEvent,
                (None, OpKind::Deletion) => Step::Deleted,
                (None, OpKind::ReferenceSkip) => Step::Skipped,
                (None, _) => Step::Matched,
            });
        }
    }

    fn record_event(&mut self, kind: IndelKind, length: u32) -> Result<()> {
        if self.event_delay > 1 {
            return Err(PileupError::inconsistent(
                self.read.name(),
                format!(
                    "adjacent insertion/deletion events without an intervening reference base near {}",
                    self.read.start().position() + self.genome_consumed
                ),
            ));
        }

        let inserted_bases = match kind {
            IndelKind::Insertion => (0..length as usize)
                .map(|i| self.read.base_at(self.read_consumed + i))
                .collect(),
            IndelKind::Deletion => Vec::new(),
        };

        self.event = Some(IndelEvent {
            kind,
            length,
            read_offset: self.read_offset(),
            inserted_bases,
        });
        self.event_delay = EVENT_DELAY;
        Ok(())
    }

    /// One reference base elapsed: age the pending event.
    #[inline]
    fn tick(&mut self) {
        if self.event_delay > 0 {
            self.event_delay -= 1;
            if self.event_delay == 0 {
                self.event = None;
            }
        }
    }

    /// Past the end the cursor keeps moving along the reference only while a
    /// trailing insertion still has to be reported.
    fn step_past_end(&mut self) {
        if self.extended_events && self.event_delay > 0 {
            self.genome_consumed += 1;
            self.tick();
        }
    }
}
