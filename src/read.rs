//! Aligned read records and their alignment operations.

use std::fmt;
use std::sync::Arc;

use crate::error::{PileupError, Result};
use crate::locus::GenomeCoordinate;

/// Kind of a single alignment (CIGAR) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// M, = or X: consumes read and reference
    Match,
    /// I: consumes read only
    Insertion,
    /// D: consumes reference only
    Deletion,
    /// S: consumes read only, not aligned
    SoftClip,
    /// H: consumes neither
    HardClip,
    /// P: consumes neither
    Pad,
    /// N: consumes reference only (spliced gap)
    ReferenceSkip,
}

impl OpKind {
    /// Parse a SAM CIGAR operation character.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'M' | '=' | 'X' => Some(OpKind::Match),
            'I' => Some(OpKind::Insertion),
            'D' => Some(OpKind::Deletion),
            'S' => Some(OpKind::SoftClip),
            'H' => Some(OpKind::HardClip),
            'P' => Some(OpKind::Pad),
            'N' => Some(OpKind::ReferenceSkip),
            _ => None,
        }
    }

    #[inline]
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            OpKind::Match | OpKind::Deletion | OpKind::ReferenceSkip
        )
    }

    #[inline]
    pub fn consumes_read(self) -> bool {
        matches!(self, OpKind::Match | OpKind::Insertion | OpKind::SoftClip)
    }

    pub fn as_char(self) -> char {
        match self {
            OpKind::Match => 'M',
            OpKind::Insertion => 'I',
            OpKind::Deletion => 'D',
            OpKind::SoftClip => 'S',
            OpKind::HardClip => 'H',
            OpKind::Pad => 'P',
            OpKind::ReferenceSkip => 'N',
        }
    }
}

/// A run-length alignment operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentOp {
    pub kind: OpKind,
    pub len: u32,
}

impl AlignmentOp {
    #[inline]
    pub fn new(kind: OpKind, len: u32) -> Self {
        Self { kind, len }
    }
}

impl fmt::Display for AlignmentOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.as_char())
    }
}

/// Parse a CIGAR string such as `5M2I3M`. `*` parses to an empty list.
pub fn parse_cigar(cigar: &str) -> std::result::Result<Vec<AlignmentOp>, String> {
    if cigar == "*" {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    let mut num_start = 0;

    for (i, c) in cigar.char_indices() {
        if c.is_ascii_digit() {
            continue;
        }
        let len: u32 = cigar[num_start..i]
            .parse()
            .map_err(|_| format!("invalid CIGAR length in '{}'", cigar))?;
        let kind = OpKind::from_char(c)
            .ok_or_else(|| format!("unknown CIGAR operation '{}' in '{}'", c, cigar))?;
        ops.push(AlignmentOp::new(kind, len));
        num_start = i + 1;
    }

    if num_start != cigar.len() {
        return Err(format!("CIGAR '{}' ends without an operation", cigar));
    }

    Ok(ops)
}

/// Render an operation list back to CIGAR text.
pub fn format_cigar(ops: &[AlignmentOp]) -> String {
    if ops.is_empty() {
        return "*".to_string();
    }
    ops.iter().map(|op| op.to_string()).collect()
}

/// One aligned read. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    name: String,
    sample: Arc<str>,
    start: GenomeCoordinate,
    ops: Vec<AlignmentOp>,
    bases: Vec<u8>,
    mapping_quality: u8,
}

impl AlignedRead {
    /// Build a read, checking that its operations are consistent.
    ///
    /// Every operation must have length >= 1, and when bases are present the
    /// read-consuming operations (M/I/S) must account for exactly all of them.
    pub fn new(
        name: impl Into<String>,
        sample: impl Into<Arc<str>>,
        start: GenomeCoordinate,
        ops: Vec<AlignmentOp>,
        bases: Vec<u8>,
        mapping_quality: u8,
    ) -> Result<Self> {
        let name = name.into();

        if let Some(op) = ops.iter().find(|op| op.len == 0) {
            return Err(PileupError::inconsistent(
                &name,
                format!("zero-length {} operation", op.kind.as_char()),
            ));
        }

        if !bases.is_empty() {
            let query_len: u64 = ops
                .iter()
                .filter(|op| op.kind.consumes_read())
                .map(|op| op.len as u64)
                .sum();
            if query_len != bases.len() as u64 {
                return Err(PileupError::inconsistent(
                    &name,
                    format!(
                        "CIGAR {} accounts for {} bases but the read has {}",
                        format_cigar(&ops),
                        query_len,
                        bases.len()
                    ),
                ));
            }
        }

        Ok(Self {
            name,
            sample: sample.into(),
            start,
            ops,
            bases,
            mapping_quality,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn sample(&self) -> &Arc<str> {
        &self.sample
    }

    /// First aligned reference position.
    #[inline]
    pub fn start(&self) -> GenomeCoordinate {
        self.start
    }

    #[inline]
    pub fn ops(&self) -> &[AlignmentOp] {
        &self.ops
    }

    /// Read bases; empty when the record stored none.
    #[inline]
    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    #[inline]
    pub fn mapping_quality(&self) -> u8 {
        self.mapping_quality
    }

    /// Base at a read offset, `N` when no bases were stored.
    #[inline]
    pub fn base_at(&self, offset: usize) -> u8 {
        self.bases.get(offset).copied().unwrap_or(b'N')
    }

    /// Reference bases spanned (Match + Deletion + ReferenceSkip).
    pub fn reference_length(&self) -> u64 {
        self.ops
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| op.len as u64)
            .sum()
    }

    /// Last aligned reference position, or None if nothing is aligned.
    pub fn end(&self) -> Option<GenomeCoordinate> {
        match self.reference_length() {
            0 => None,
            n => Some(self.start.offset(n - 1)),
        }
    }

    /// Cheap shared handle for pileups.
    pub fn into_shared(self) -> Arc<AlignedRead> {
        Arc::new(self)
    }
}
