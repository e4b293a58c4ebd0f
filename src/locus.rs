//! Genome coordinates and regions.
//!
//! All coordinates are 1-based. Regions are closed intervals `[start, end]`.
//! Ordering follows the sequence dictionary: contig index first, then position.

use std::fmt;

use crate::error::{PileupError, Result};
use crate::genome::{ContigId, SequenceDictionary};

/// A single reference position.
///
/// The derived ordering is (contig index, position), which is the dictionary
/// order the traversal emits pileups in. Position is always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenomeCoordinate {
    contig: ContigId,
    position: u64,
}

impl GenomeCoordinate {
    /// Create a coordinate. Returns None for position 0.
    #[inline]
    pub fn new(contig: ContigId, position: u64) -> Option<Self> {
        (position >= 1).then_some(Self { contig, position })
    }

    #[inline]
    pub fn contig(&self) -> ContigId {
        self.contig
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The next position on the same contig.
    #[inline]
    pub fn next(&self) -> Self {
        Self {
            contig: self.contig,
            position: self.position + 1,
        }
    }

    /// The previous position on the same contig, or None at position 1.
    #[inline]
    pub fn prev(&self) -> Option<Self> {
        Self::new(self.contig, self.position - 1)
    }

    /// Offset this coordinate forward along its contig.
    #[inline]
    pub fn offset(&self, delta: u64) -> Self {
        Self {
            contig: self.contig,
            position: self.position + delta,
        }
    }

    /// Render as `contig:position` using the dictionary's names.
    pub fn display<'a>(&self, dict: &'a SequenceDictionary) -> CoordinateDisplay<'a> {
        CoordinateDisplay {
            name: dict.name(self.contig),
            position: self.position,
        }
    }
}

/// Helper returned by [`GenomeCoordinate::display`].
pub struct CoordinateDisplay<'a> {
    name: &'a str,
    position: u64,
}

impl fmt::Display for CoordinateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.position)
    }
}

/// A closed range of positions on one contig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenomeRegion {
    pub contig: ContigId,
    pub start: u64,
    pub end: u64,
}

impl GenomeRegion {
    /// Create a region, rejecting position 0 and inverted bounds.
    pub fn new(contig: ContigId, start: u64, end: u64) -> Result<Self> {
        if start == 0 || start > end {
            return Err(PileupError::InvalidConfiguration(format!(
                "invalid region bounds {}-{}",
                start, end
            )));
        }
        Ok(Self { contig, start, end })
    }

    /// Number of positions covered.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Regions always cover at least one position.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn first(&self) -> GenomeCoordinate {
        GenomeCoordinate {
            contig: self.contig,
            position: self.start,
        }
    }

    #[inline]
    pub fn last(&self) -> GenomeCoordinate {
        GenomeCoordinate {
            contig: self.contig,
            position: self.end,
        }
    }

    #[inline]
    pub fn contains(&self, coord: &GenomeCoordinate) -> bool {
        coord.contig == self.contig && coord.position >= self.start && coord.position <= self.end
    }

    /// True if `[start, end]` on `contig` shares at least one position with this region.
    #[inline]
    pub fn overlaps_span(&self, contig: ContigId, start: u64, end: u64) -> bool {
        self.contig == contig && start <= self.end && self.start <= end
    }

    pub fn display<'a>(&self, dict: &'a SequenceDictionary) -> RegionDisplay<'a> {
        RegionDisplay {
            name: dict.name(self.contig),
            start: self.start,
            end: self.end,
        }
    }
}

/// Helper returned by [`GenomeRegion::display`].
pub struct RegionDisplay<'a> {
    name: &'a str,
    start: u64,
    end: u64,
}

impl fmt::Display for RegionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.name, self.start, self.end)
    }
}

/// Parse `contig`, `contig:pos` or `contig:start-end` against a dictionary.
///
/// A string naming a contig exactly wins over splitting on ':', so contig
/// names containing colons still resolve. Thousands separators are allowed.
pub fn parse_region(s: &str, dict: &SequenceDictionary) -> Result<GenomeRegion> {
    let s = s.trim();
    if let Some(id) = dict.id_of(s) {
        return whole_contig(dict, id);
    }

    let Some((name, range)) = s.rsplit_once(':') else {
        return Err(PileupError::UnknownContig(s.to_string()));
    };
    let id = dict.require(name)?;

    let parse_pos = |field: &str| -> Result<u64> {
        field.replace(',', "").parse().map_err(|_| {
            PileupError::InvalidConfiguration(format!("invalid position '{}' in region '{}'", field, s))
        })
    };

    let (start, end) = match range.split_once('-') {
        Some((a, b)) => (parse_pos(a)?, parse_pos(b)?),
        None => {
            let p = parse_pos(range)?;
            (p, p)
        }
    };

    let length = dict.length(id);
    if end > length {
        return Err(PileupError::InvalidConfiguration(format!(
            "region '{}' extends past the end of {} ({} bp)",
            s, name, length
        )));
    }
    GenomeRegion::new(id, start, end)
}

fn whole_contig(dict: &SequenceDictionary, id: ContigId) -> Result<GenomeRegion> {
    let length = dict.length(id);
    if length == 0 {
        return Err(PileupError::InvalidConfiguration(format!(
            "contig '{}' has zero length",
            dict.name(id)
        )));
    }
    GenomeRegion::new(id, 1, length)
}

/// One region per non-empty contig, in dictionary order.
pub fn whole_genome(dict: &SequenceDictionary) -> Vec<GenomeRegion> {
    dict.iter()
        .filter(|(_, c)| c.length > 0)
        .map(|(id, c)| GenomeRegion {
            contig: id,
            start: 1,
            end: c.length,
        })
        .collect()
}

/// Sort regions and coalesce overlapping or adjacent ones.
///
/// The result covers exactly the union of the input, each position once.
pub fn merge_regions(mut regions: Vec<GenomeRegion>) -> Vec<GenomeRegion> {
    regions.sort_unstable();

    let mut merged: Vec<GenomeRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        match merged.last_mut() {
            Some(current) if current.contig == region.contig && region.start <= current.end + 1 => {
                current.end = current.end.max(region.end);
            }
            _ => merged.push(region),
        }
    }
    merged
}
