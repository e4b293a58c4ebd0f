//! Command implementations for the pileup CLI.

pub mod depth;
pub mod shards;

pub use depth::{DepthCommand, DepthMode};
pub use shards::ShardsCommand;
