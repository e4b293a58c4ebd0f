//! Pileup summary output.
//!
//! One line per emitted pileup:
//! `contig  position  kind  depth  deletions  insertions  mq0`
//! where kind is `B` for a base pileup and `E` for an extended-event pileup.

use std::io::{BufWriter, Write};

use super::buffers::DEFAULT_OUTPUT_BUFFER;
use crate::error::Result;
use crate::genome::SequenceDictionary;
use crate::pileup::LocusPileup;

/// Buffered tab-separated pileup writer using itoa for integers.
pub struct PileupWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
}

impl<W: Write> PileupWriter<W> {
    /// Create a new writer with the default output buffer.
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER, output)
    }

    /// Create a new writer with a specific buffer size.
    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
        }
    }

    #[inline]
    fn write_field(&mut self, value: u64) -> Result<()> {
        self.writer.write_all(b"\t")?;
        self.writer
            .write_all(self.itoa_buf.format(value).as_bytes())?;
        Ok(())
    }

    /// Write the summary line for one pileup.
    pub fn write_pileup(&mut self, pileup: &LocusPileup, dict: &SequenceDictionary) -> Result<()> {
        let locus = pileup.locus();
        self.writer.write_all(dict.name(locus.contig()).as_bytes())?;
        self.write_field(locus.position())?;
        self.writer
            .write_all(if pileup.is_extended() { b"\tE" } else { b"\tB" })?;
        self.write_field(pileup.size() as u64)?;
        self.write_field(pileup.deletion_count() as u64)?;
        self.write_field(pileup.insertion_count() as u64)?;
        self.write_field(pileup.mq0_count() as u64)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write a full line as-is with newline.
    pub fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.writer.write_all(line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush the buffer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
