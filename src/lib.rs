// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! Locus-by-locus pileup traversal over coordinate-sorted aligned reads.
//!
//! The crate turns a stream of reads into one pileup per covered reference
//! position, in strictly increasing order.
//!
//! # Features
//!
//! - **Per-read state machine**: [`cursor::ReadCursor`] walks each read's
//!   alignment operations one reference base at a time
//! - **Per-sample downsampling**: [`sampler::ReservoirSampler`] bounds reads
//!   per sample with seeded, reproducible choices
//! - **Extended events**: optional insertion/deletion pileups anchored at the
//!   base before each event
//! - **Parallel shards**: [`shard`] plans and [`parallel`] runs independent
//!   engines with Rayon, concatenating results in shard order
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pileup_genomics::prelude::*;
//!
//! let dict = Arc::new(SequenceDictionary::from_file("genome.txt").unwrap());
//! let reader = ReadTableReader::from_path("reads.tsv", Arc::clone(&dict)).unwrap();
//! let config = TraversalConfig::new().with_extended_events(true);
//!
//! let engine = LocusTraversalEngine::new(reader, dict, SampleSet::any(), config).unwrap();
//! for pileup in engine {
//!     let pileup = pileup.unwrap();
//!     println!("{:?} {}", pileup.locus(), pileup.size());
//! }
//! ```

pub mod commands;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod genome;
pub mod locus;
pub mod logging;
pub mod parallel;
pub mod pileup;
pub mod read;
pub mod reader;
pub mod sampler;
pub mod shard;
pub mod streaming;

// Re-export commonly used types
pub use engine::{LocusTraversalEngine, SampleSet, TraversalStats};
pub use error::{PileupError, Result};
pub use locus::GenomeCoordinate;
pub use pileup::LocusPileup;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{DepthCommand, DepthMode, ShardsCommand};
    pub use crate::config::TraversalConfig;
    pub use crate::cursor::{IndelEvent, ReadCursor, Step};
    pub use crate::engine::{LocusTraversalEngine, SampleSet, TraversalStats};
    pub use crate::error::{PileupError, Result};
    pub use crate::genome::{ContigId, SequenceDictionary};
    pub use crate::locus::{parse_region, GenomeCoordinate, GenomeRegion};
    pub use crate::parallel::{concat_outcomes, traverse_shards, ShardOutcome};
    pub use crate::pileup::{ExtendedEventPileup, LocusPileup, Pileup};
    pub use crate::read::{parse_cigar, AlignedRead};
    pub use crate::reader::ReadTableReader;
    pub use crate::sampler::ReservoirSampler;
    pub use crate::shard::{ContigShardStrategy, LocusShardStrategy, Shard, ShardStrategy};
}
