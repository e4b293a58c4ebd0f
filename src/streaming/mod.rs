//! Streaming utilities shared by the reader, the engine and the commands:
//! - Zero-allocation field parsing
//! - Sort validation
//! - Buffered pileup output

pub mod buffers;
pub mod output;
pub mod parsing;
pub mod validation;

pub use output::PileupWriter;
pub use parsing::{parse_u64_fast, should_skip_line, tab_fields};
pub use validation::SortValidator;
