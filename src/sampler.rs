//! Per-sample bounded reservoir of active items.
//!
//! The sampler owns every item currently in play, in admission order, and
//! keeps each partition (sample) at or below a fixed cap. Items live in an
//! arena and are threaded onto two index-linked lists: the global admission
//! order and a per-partition order. Both support O(1) unlink.
//!
//! # Admission policy
//!
//! Items arrive in batches sharing one alignment start. For each partition in
//! the batch (in order of first appearance):
//!
//! 1. If the batch holds more than `cap` items for the partition, keep a
//!    uniform subset of `cap` (Algorithm R), in original order.
//! 2. If existing + incoming fits, admit everything.
//! 3. Otherwise prune existing items in rounds. Each round walks the
//!    partition from its rightmost item backwards, grouping items by equal
//!    alignment start; every group with more than one member loses one member
//!    chosen at random, until the partition would fit. Rounds repeat while
//!    they remove anything.
//! 4. If the partition is still at or above the cap, evict its leftmost item.
//! 5. Admit incoming items in order until the partition reaches the cap; the
//!    rest are dropped.
//!
//! The random source is seeded once at construction, so identical input in
//! identical order always yields identical choices.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::cursor::ReadCursor;
use crate::error::{PileupError, Result};
use crate::locus::GenomeCoordinate;

const NIL: usize = usize::MAX;

/// Maps an item to the partition it is bounded within.
pub trait Partitioner<T> {
    type Key: Eq + Hash + Clone;

    fn partition(&self, item: &T) -> Self::Key;
}

/// Items that know the reference position their alignment starts at.
pub trait AlignmentStart {
    fn alignment_start(&self) -> GenomeCoordinate;
}

/// Partitions read cursors by sample name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleNamePartitioner;

impl Partitioner<ReadCursor> for SampleNamePartitioner {
    type Key = Arc<str>;

    #[inline]
    fn partition(&self, item: &ReadCursor) -> Arc<str> {
        Arc::clone(item.read().sample())
    }
}

impl AlignmentStart for ReadCursor {
    #[inline]
    fn alignment_start(&self) -> GenomeCoordinate {
        self.read().start()
    }
}

/// Counts from one [`ReservoirSampler::admit`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdmitOutcome {
    /// Items added to the reservoir
    pub admitted: usize,
    /// Existing items removed to make room
    pub evicted: usize,
    /// Incoming items that were not admitted
    pub dropped: usize,
}

#[derive(Debug)]
struct Node<T> {
    item: Option<T>,
    prev: usize,
    next: usize,
    part_prev: usize,
    part_next: usize,
    part: usize,
}

#[derive(Debug, Clone, Copy)]
struct PartList {
    head: usize,
    tail: usize,
    len: usize,
}

impl PartList {
    const EMPTY: PartList = PartList {
        head: NIL,
        tail: NIL,
        len: 0,
    };
}

/// Bounded, partitioned, deterministic reservoir.
pub struct ReservoirSampler<T, P: Partitioner<T>> {
    cap: usize,
    partitioner: P,
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
    parts: FxHashMap<P::Key, usize>,
    part_lists: Vec<PartList>,
    rng: SmallRng,
}

impl<T, P> ReservoirSampler<T, P>
where
    T: AlignmentStart,
    P: Partitioner<T>,
{
    /// Create a sampler keeping at most `cap` items per partition.
    pub fn new(cap: u32, partitioner: P, seed: u64) -> Result<Self> {
        if cap == 0 {
            return Err(PileupError::InvalidConfiguration(
                "reservoir cap must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            cap: cap as usize,
            partitioner,
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
            parts: FxHashMap::default(),
            part_lists: Vec::new(),
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    #[inline]
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Number of items in the reservoir.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of items currently held for one partition.
    pub fn partition_len(&self, key: &P::Key) -> usize {
        self.parts
            .get(key)
            .map_or(0, |&p| self.part_lists[p].len)
    }

    /// Admit a batch of items, applying the cap per partition.
    pub fn admit(&mut self, batch: Vec<T>) -> AdmitOutcome {
        let mut outcome = AdmitOutcome::default();

        let mut order: Vec<P::Key> = Vec::new();
        let mut grouped: FxHashMap<P::Key, Vec<T>> = FxHashMap::default();
        for item in batch {
            let key = self.partitioner.partition(&item);
            grouped
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(item);
        }

        for key in order {
            let Some(items) = grouped.remove(&key) else {
                continue;
            };
            let offered = items.len();
            let items = self.reservoir_subset(items);
            outcome.dropped += offered - items.len();

            let part = self.part_slot(key);
            let incoming = items.len();

            if self.part_lists[part].len + incoming <= self.cap {
                for item in items {
                    self.push_back(part, item);
                    outcome.admitted += 1;
                }
                continue;
            }

            outcome.evicted += self.prune_crowded(part, incoming);

            if self.part_lists[part].len >= self.cap {
                let leftmost = self.part_lists[part].head;
                self.unlink(leftmost);
                outcome.evicted += 1;
            }

            let mut remaining = items.into_iter();
            for item in remaining.by_ref() {
                self.push_back(part, item);
                outcome.admitted += 1;
                if self.part_lists[part].len >= self.cap {
                    break;
                }
            }
            outcome.dropped += remaining.count();
        }

        outcome
    }

    /// Keep a uniform subset of at most `cap` items, preserving input order.
    fn reservoir_subset(&mut self, items: Vec<T>) -> Vec<T> {
        if items.len() <= self.cap {
            return items;
        }
        let mut reservoir: Vec<(usize, T)> = Vec::with_capacity(self.cap);
        for (i, item) in items.into_iter().enumerate() {
            if i < self.cap {
                reservoir.push((i, item));
            } else {
                let j = self.rng.gen_range(0..=i);
                if j < self.cap {
                    reservoir[j] = (i, item);
                }
            }
        }
        reservoir.sort_unstable_by_key(|(i, _)| *i);
        reservoir.into_iter().map(|(_, item)| item).collect()
    }

    /// Evict one random member from each crowded alignment-start group,
    /// walking from the right, until `incoming` more items would fit.
    fn prune_crowded(&mut self, part: usize, incoming: usize) -> usize {
        let cap = self.cap;
        let mut evicted = 0;
        let mut group: Vec<usize> = Vec::new();
        let mut to_prune: Vec<usize> = Vec::new();

        loop {
            let existing = self.part_lists[part].len;
            if existing + incoming <= cap {
                break;
            }

            to_prune.clear();
            group.clear();
            let mut cursor = self.part_lists[part].tail;
            while cursor != NIL {
                let start = self.start_of(cursor);
                if group.is_empty() || self.start_of(group[0]) == start {
                    group.push(cursor);
                } else {
                    if group.len() > 1 {
                        let pick = group[self.rng.gen_range(0..group.len())];
                        to_prune.push(pick);
                        if existing - to_prune.len() + incoming <= cap {
                            break;
                        }
                    }
                    group.clear();
                    group.push(cursor);
                }
                cursor = self.nodes[cursor].part_prev;
            }

            if group.len() > 1 && existing - to_prune.len() + incoming > cap {
                let pick = group[self.rng.gen_range(0..group.len())];
                to_prune.push(pick);
            }

            if to_prune.is_empty() {
                break;
            }
            for &idx in &to_prune {
                self.unlink(idx);
                evicted += 1;
            }
        }

        evicted
    }

    #[inline]
    fn start_of(&self, idx: usize) -> GenomeCoordinate {
        match &self.nodes[idx].item {
            Some(item) => item.alignment_start(),
            None => unreachable!("linked arena slot {} is vacant", idx),
        }
    }

    fn part_slot(&mut self, key: P::Key) -> usize {
        let next = self.part_lists.len();
        let slot = *self.parts.entry(key).or_insert(next);
        if slot == next {
            self.part_lists.push(PartList::EMPTY);
        }
        slot
    }

    fn push_back(&mut self, part: usize, item: T) {
        let node = Node {
            item: Some(item),
            prev: self.tail,
            next: NIL,
            part_prev: self.part_lists[part].tail,
            part_next: NIL,
            part,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        if self.tail != NIL {
            self.nodes[self.tail].next = idx;
        } else {
            self.head = idx;
        }
        self.tail = idx;
        self.len += 1;

        let list = &mut self.part_lists[part];
        if list.tail != NIL {
            let old_tail = list.tail;
            list.tail = idx;
            list.len += 1;
            self.nodes[old_tail].part_next = idx;
        } else {
            list.head = idx;
            list.tail = idx;
            list.len = 1;
        }
    }

    /// Detach a node from both lists and return its item.
    fn unlink(&mut self, idx: usize) -> Option<T> {
        let (prev, next, part_prev, part_next, part) = {
            let n = &self.nodes[idx];
            (n.prev, n.next, n.part_prev, n.part_next, n.part)
        };

        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }

        if part_prev != NIL {
            self.nodes[part_prev].part_next = part_next;
        } else {
            self.part_lists[part].head = part_next;
        }
        if part_next != NIL {
            self.nodes[part_next].part_prev = part_prev;
        } else {
            self.part_lists[part].tail = part_prev;
        }
        self.part_lists[part].len -= 1;
        self.len -= 1;

        self.free.push(idx);
        self.nodes[idx].item.take()
    }

    /// Iterate over items in admission order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            nodes: &self.nodes,
            next: self.head,
        }
    }

    /// Visit every item in admission order, keeping those for which `f`
    /// returns `Ok(true)`. Stops at the first error, leaving unvisited
    /// items untouched.
    pub fn try_retain_mut<E, F>(&mut self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut T) -> std::result::Result<bool, E>,
    {
        let mut idx = self.head;
        while idx != NIL {
            let next = self.nodes[idx].next;
            let keep = match self.nodes[idx].item.as_mut() {
                Some(item) => f(item)?,
                None => true,
            };
            if !keep {
                self.unlink(idx);
            }
            idx = next;
        }
        Ok(())
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
        for list in &mut self.part_lists {
            *list = PartList::EMPTY;
        }
    }
}

/// Admission-order iterator over a [`ReservoirSampler`].
pub struct Iter<'a, T> {
    nodes: &'a [Node<T>],
    next: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        while self.next != NIL {
            let node = &self.nodes[self.next];
            self.next = node.next;
            if let Some(item) = node.item.as_ref() {
                return Some(item);
            }
        }
        None
    }
}
