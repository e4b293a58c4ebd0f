//! Buffer size constants for the read-table reader and pileup writer.

/// Default output buffer size (2 MB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Default input buffer size (256 KB).
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Default line buffer capacity.
/// Read-table lines carry full base strings, so this is larger than a
/// typical interval line.
pub const DEFAULT_LINE_BUFFER: usize = 4 * 1024;
