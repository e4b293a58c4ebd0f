//! Streaming reader for tab-separated aligned-read tables.
//!
//! Columns: `name  sample  contig  position  mapq  cigar  bases`.
//! Positions are 1-based. `bases` may be `*` when the record stores none.
//! Empty lines and lines starting with `#` are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{PileupError, Result};
use crate::genome::SequenceDictionary;
use crate::locus::GenomeCoordinate;
use crate::read::{parse_cigar, AlignedRead};
use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, DEFAULT_LINE_BUFFER};
use crate::streaming::parsing::{
    parse_u64_fast, should_skip_line, tab_fields, trim_line_end, TabFields,
};

/// A streaming read-table reader.
pub struct ReadTableReader<R: Read> {
    reader: BufReader<R>,
    dict: Arc<SequenceDictionary>,
    line_number: usize,
    buffer: Vec<u8>,
    // Sample names are interned so every read of a sample shares one allocation.
    samples: FxHashMap<Box<str>, Arc<str>>,
}

impl ReadTableReader<File> {
    /// Open a read table from a path.
    pub fn from_path<P: AsRef<Path>>(path: P, dict: Arc<SequenceDictionary>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file, dict))
    }
}

impl ReadTableReader<Box<dyn Read + Send>> {
    /// Open a path, treating `-` as standard input.
    pub fn open(path: &Path, dict: Arc<SequenceDictionary>) -> Result<Self> {
        let source: Box<dyn Read + Send> = if path.as_os_str() == "-" {
            Box::new(io::stdin())
        } else {
            Box::new(File::open(path)?)
        };
        Ok(Self::new(source, dict))
    }
}

impl<R: Read> ReadTableReader<R> {
    /// Create a reader over any readable source.
    pub fn new(reader: R, dict: Arc<SequenceDictionary>) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_INPUT_BUFFER, reader),
            dict,
            line_number: 0,
            buffer: Vec::with_capacity(DEFAULT_LINE_BUFFER),
            samples: FxHashMap::default(),
        }
    }

    /// Read the next aligned read.
    pub fn read_record(&mut self) -> Result<Option<AlignedRead>> {
        loop {
            self.buffer.clear();
            let bytes_read = self.reader.read_until(b'\n', &mut self.buffer)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            if should_skip_line(trim_line_end(&self.buffer)) {
                continue;
            }

            let buffer = std::mem::take(&mut self.buffer);
            let parsed = self.parse_line(trim_line_end(&buffer));
            self.buffer = buffer;
            return parsed.map(Some);
        }
    }

    fn parse_error(&self, message: impl Into<String>) -> PileupError {
        PileupError::Parse {
            line: self.line_number,
            message: message.into(),
        }
    }

    fn text<'a>(&self, field: &'a [u8], what: &str) -> Result<&'a str> {
        std::str::from_utf8(field)
            .map_err(|_| self.parse_error(format!("{} is not valid UTF-8", what)))
    }

    fn column<'a>(&self, fields: &mut TabFields<'a>, what: &str) -> Result<&'a [u8]> {
        fields
            .next()
            .ok_or_else(|| self.parse_error(format!("missing {} column", what)))
    }

    fn parse_line(&mut self, line: &[u8]) -> Result<AlignedRead> {
        let mut fields = tab_fields(line);
        let name = self.column(&mut fields, "name")?;
        let sample = self.column(&mut fields, "sample")?;
        let contig = self.column(&mut fields, "contig")?;
        let pos = self.column(&mut fields, "position")?;
        let mapq = self.column(&mut fields, "mapping quality")?;
        let cigar = self.column(&mut fields, "cigar")?;
        let bases = self.column(&mut fields, "bases")?;

        let name = self.text(name, "read name")?;
        let sample = self.text(sample, "sample name")?;
        let contig = self.text(contig, "contig name")?;
        let cigar = self.text(cigar, "cigar")?;

        let contig = self.dict.require(contig)?;
        let position = parse_u64_fast(pos)
            .ok_or_else(|| self.parse_error(format!("invalid position for read '{}'", name)))?;
        let start = GenomeCoordinate::new(contig, position)
            .ok_or_else(|| PileupError::inconsistent(name, "alignment start 0 is below 1"))?;
        if position > self.dict.length(contig) {
            return Err(self.parse_error(format!(
                "read '{}' starts at {} past the end of {}",
                name,
                position,
                self.dict.name(contig)
            )));
        }
        let mapping_quality = parse_u64_fast(mapq)
            .and_then(|q| u8::try_from(q).ok())
            .ok_or_else(|| {
                self.parse_error(format!("invalid mapping quality for read '{}'", name))
            })?;
        let ops = parse_cigar(cigar).map_err(|message| PileupError::inconsistent(name, message))?;
        let bases = if bases == b"*" { Vec::new() } else { bases.to_vec() };

        let sample = self.intern_sample(sample);
        AlignedRead::new(name, sample, start, ops, bases, mapping_quality)
    }

    fn intern_sample(&mut self, sample: &str) -> Arc<str> {
        if let Some(shared) = self.samples.get(sample) {
            return shared.clone();
        }
        let shared: Arc<str> = Arc::from(sample);
        self.samples.insert(sample.into(), shared.clone());
        shared
    }

    /// Current line number (1-based, counting skipped lines).
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Collect every remaining read.
    pub fn read_all(mut self) -> Result<Vec<AlignedRead>> {
        let mut reads = Vec::new();
        while let Some(read) = self.read_record()? {
            reads.push(read);
        }
        Ok(reads)
    }
}

impl<R: Read> Iterator for ReadTableReader<R> {
    type Item = Result<AlignedRead>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
