// Clippy allows
#![allow(clippy::too_many_arguments)]

//! pileup: locus-by-locus pileup traversal over aligned reads
//!
//! Usage: pileup <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use pileup_genomics::commands::{DepthCommand, DepthMode, ShardsCommand};
use pileup_genomics::config::{
    TraversalConfig, DEFAULT_MAX_READS_PER_LOCUS_PER_SAMPLE, DEFAULT_RANDOM_SEED,
    DEFAULT_SHARD_SIZE,
};
use pileup_genomics::engine::SampleSet;
use pileup_genomics::error::PileupError;
use pileup_genomics::genome::SequenceDictionary;
use pileup_genomics::locus::{parse_region, GenomeRegion};
use pileup_genomics::logging::init_logger;
use pileup_genomics::reader::ReadTableReader;

#[derive(Parser)]
#[command(name = "pileup")]
#[command(version)]
#[command(about = "Locus-by-locus pileup traversal with per-sample downsampling", long_about = None)]
struct Cli {
    /// Number of threads to use (default: number of CPUs)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    /// Log progress to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report depth, deletions, insertions and MQ0 reads per covered position
    Depth {
        /// Input read table, sorted by contig then position (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Genome file (contig<TAB>length) defining contig order
        #[arg(short = 'g', long)]
        genome: PathBuf,

        /// Restrict output to a region (chr, chr:pos or chr:start-end); repeatable
        #[arg(short = 'L', long = "region")]
        regions: Vec<String>,

        /// Only use reads from this sample; repeatable
        #[arg(short = 's', long = "sample")]
        samples: Vec<String>,

        /// Maximum reads per sample at any position
        #[arg(long, default_value_t = DEFAULT_MAX_READS_PER_LOCUS_PER_SAMPLE)]
        max_reads: u32,

        /// Count reads with a deletion at a position
        #[arg(long)]
        include_deletions: bool,

        /// Emit insertion/deletion event pileups
        #[arg(long)]
        extended_events: bool,

        /// Seed for downsampling decisions
        #[arg(long, default_value_t = DEFAULT_RANDOM_SEED)]
        seed: u64,

        /// Split the traversal into shards of this many bases and run them in parallel
        #[arg(long)]
        shard_size: Option<u64>,

        /// Run one shard per contig in parallel
        #[arg(long, conflicts_with = "shard_size")]
        per_contig: bool,

        /// Print traversal statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Print the shard plan for a genome
    Shards {
        /// Genome file (contig<TAB>length)
        #[arg(short = 'g', long)]
        genome: PathBuf,

        /// Regions to cover (default: whole genome); repeatable
        #[arg(short = 'L', long = "region")]
        regions: Vec<String>,

        /// Bases per shard
        #[arg(long, default_value_t = DEFAULT_SHARD_SIZE)]
        shard_size: u64,

        /// One shard per contig instead of fixed-size shards
        #[arg(long)]
        per_contig: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    // Configure thread pool if --threads specified
    if let Some(n) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
        {
            eprintln!("Error: failed to initialize thread pool: {}", e);
            process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Depth {
            input,
            genome,
            regions,
            samples,
            max_reads,
            include_deletions,
            extended_events,
            seed,
            shard_size,
            per_contig,
            stats,
        } => {
            let mut config = TraversalConfig::new()
                .with_max_reads(max_reads)
                .with_deletions(include_deletions)
                .with_extended_events(extended_events)
                .with_seed(seed);
            let mode = match (shard_size, per_contig) {
                (Some(size), _) => {
                    config = config.with_shard_size(size);
                    DepthMode::Sharded
                }
                (None, true) => DepthMode::PerContig,
                (None, false) => DepthMode::Streaming,
            };
            run_depth(input, genome, regions, samples, config, mode, stats)
        }

        Commands::Shards {
            genome,
            regions,
            shard_size,
            per_contig,
        } => run_shards(genome, regions, shard_size, per_contig),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_dictionary(genome: &Path) -> Result<Arc<SequenceDictionary>, PileupError> {
    let dict = SequenceDictionary::from_file(genome)?;
    log::info!("loaded {} contigs from {}", dict.len(), genome.display());
    Ok(Arc::new(dict))
}

fn parse_regions(
    regions: &[String],
    dict: &SequenceDictionary,
) -> Result<Vec<GenomeRegion>, PileupError> {
    regions.iter().map(|s| parse_region(s, dict)).collect()
}

fn run_depth(
    input: PathBuf,
    genome: PathBuf,
    regions: Vec<String>,
    samples: Vec<String>,
    config: TraversalConfig,
    mode: DepthMode,
    stats: bool,
) -> Result<(), PileupError> {
    let dict = load_dictionary(&genome)?;
    let regions = parse_regions(&regions, &dict)?;
    let samples = if samples.is_empty() {
        SampleSet::any()
    } else {
        SampleSet::from_names(samples)
    };

    let cmd = DepthCommand::new()
        .with_config(config)
        .with_regions(regions)
        .with_samples(samples)
        .with_mode(mode);

    let reader = ReadTableReader::open(&input, Arc::clone(&dict))?;
    let stdout = io::stdout();
    let handle = stdout.lock();
    let result = cmd.run(reader, &dict, handle)?;

    if stats {
        eprintln!("Traversal stats: {}", result);
    }
    Ok(())
}

fn run_shards(
    genome: PathBuf,
    regions: Vec<String>,
    shard_size: u64,
    per_contig: bool,
) -> Result<(), PileupError> {
    let dict = load_dictionary(&genome)?;
    let regions = parse_regions(&regions, &dict)?;

    let cmd = ShardsCommand::new(shard_size)
        .with_regions(regions)
        .with_per_contig(per_contig);

    let stdout = io::stdout();
    let handle = stdout.lock();
    let count = cmd.run(&dict, handle)?;
    log::info!("{} shards", count);
    Ok(())
}
