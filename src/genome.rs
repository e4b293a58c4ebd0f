//! Reference sequence dictionary.
//!
//! Parses genome files (tab-delimited: name\tlength, extra columns ignored so
//! a FASTA `.fai` index also works). Contig order is the file order and
//! defines the total order of [`GenomeCoordinate`](crate::locus::GenomeCoordinate).

use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{PileupError, Result};

/// Index of a contig in its sequence dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContigId(pub u32);

impl ContigId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named reference contig and its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    pub name: String,
    pub length: u64,
}

/// Ordered contig list with name lookup.
///
/// Read-only once built; shared by reference between parallel shard engines.
#[derive(Debug, Clone, Default)]
pub struct SequenceDictionary {
    contigs: Vec<Contig>,
    by_name: FxHashMap<String, ContigId>,
}

impl SequenceDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dictionary from a genome or `.fai` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a dictionary from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut dict = Self::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let (Some(name), Some(length)) = (fields.next(), fields.next()) else {
                return Err(PileupError::Parse {
                    line: line_num + 1,
                    message: "Genome file requires two columns: name and length".to_string(),
                });
            };

            let length: u64 = length.trim().parse().map_err(|_| PileupError::Parse {
                line: line_num + 1,
                message: format!("Invalid contig length: {}", length),
            })?;

            if dict.contains(name) {
                return Err(PileupError::Parse {
                    line: line_num + 1,
                    message: format!("Duplicate contig: {}", name),
                });
            }
            dict.push(name, length);
        }

        Ok(dict)
    }

    /// Append a contig, returning its id. Re-adding an existing name keeps
    /// the original position and updates its length.
    pub fn push(&mut self, name: impl Into<String>, length: u64) -> ContigId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            self.contigs[id.index()].length = length;
            return id;
        }
        let id = ContigId(self.contigs.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.contigs.push(Contig { name, length });
        id
    }

    /// Look up a contig id by name.
    #[inline]
    pub fn id_of(&self, name: &str) -> Option<ContigId> {
        self.by_name.get(name).copied()
    }

    /// Look up a contig id by name, failing with `UnknownContig`.
    pub fn require(&self, name: &str) -> Result<ContigId> {
        self.id_of(name)
            .ok_or_else(|| PileupError::UnknownContig(name.to_string()))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// True if `id` names a contig of this dictionary.
    #[inline]
    pub fn has_id(&self, id: ContigId) -> bool {
        id.index() < self.contigs.len()
    }

    /// Contig name for an id. Panics on ids from another dictionary.
    #[inline]
    pub fn name(&self, id: ContigId) -> &str {
        &self.contigs[id.index()].name
    }

    #[inline]
    pub fn length(&self, id: ContigId) -> u64 {
        self.contigs[id.index()].length
    }

    /// Iterate over (id, contig) in dictionary order.
    pub fn iter(&self) -> impl Iterator<Item = (ContigId, &Contig)> {
        self.contigs
            .iter()
            .enumerate()
            .map(|(i, c)| (ContigId(i as u32), c))
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }
}
