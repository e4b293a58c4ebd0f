//! Property tests for the traversal over generated read sets.
//!
//! Reads are generated from a seeded RNG so every run sees the same data.
//! Each test checks one guarantee across the whole pileup stream: ordering,
//! coverage conservation, the downsampling bound, determinism and shard
//! equivalence.

use std::collections::HashMap;
use std::sync::Arc;

use pileup_genomics::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const CONTIG_LEN: u64 = 3_000;

fn dictionary() -> Arc<SequenceDictionary> {
    let mut dict = SequenceDictionary::new();
    dict.push("chr1", CONTIG_LEN);
    dict.push("chr2", CONTIG_LEN);
    Arc::new(dict)
}

/// A cigar of matches separated by single indels, never two indels in a row.
fn random_cigar(rng: &mut SmallRng, allow_leading_insertion: bool) -> String {
    let mut cigar = String::new();
    if rng.gen_bool(0.2) {
        cigar.push_str(&format!("{}S", rng.gen_range(1..5)));
    }
    if allow_leading_insertion && rng.gen_bool(0.1) {
        cigar.push_str(&format!("{}I", rng.gen_range(1..3)));
    }
    cigar.push_str(&format!("{}M", rng.gen_range(1..25)));
    for _ in 0..rng.gen_range(0..4) {
        let op = if rng.gen_bool(0.5) { 'I' } else { 'D' };
        cigar.push_str(&format!("{}{}", rng.gen_range(1..4), op));
        cigar.push_str(&format!("{}M", rng.gen_range(1..25)));
    }
    if rng.gen_bool(0.1) {
        cigar.push_str(&format!("{}I", rng.gen_range(1..3)));
    }
    cigar
}

fn generate_reads(seed: u64, count: usize, samples: &[&str]) -> Vec<Arc<AlignedRead>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut starts: Vec<(u32, u64)> = (0..count)
        .map(|_| (rng.gen_range(0..2), rng.gen_range(1..CONTIG_LEN - 200)))
        .collect();
    starts.sort_unstable();

    starts
        .into_iter()
        .enumerate()
        .map(|(i, (contig, pos))| {
            let start = GenomeCoordinate::new(ContigId(contig), pos).unwrap();
            let ops = parse_cigar(&random_cigar(&mut rng, pos > 1)).unwrap();
            let sample = samples[i % samples.len()];
            let mapq = if i % 7 == 0 { 0 } else { 60 };
            AlignedRead::new(format!("read{}", i), sample, start, ops, Vec::new(), mapq)
                .unwrap()
                .into_shared()
        })
        .collect()
}

fn traverse(reads: &[Arc<AlignedRead>], config: TraversalConfig) -> Vec<LocusPileup> {
    LocusTraversalEngine::new(
        reads.iter().cloned().map(Ok::<_, PileupError>),
        dictionary(),
        SampleSet::any(),
        config,
    )
    .unwrap()
    .collect::<Result<_>>()
    .unwrap()
}

fn signature(pileup: &LocusPileup) -> (bool, GenomeCoordinate, Vec<String>) {
    let mut names: Vec<String> = pileup.read_names().into_iter().map(String::from).collect();
    names.sort();
    (pileup.is_extended(), pileup.locus(), names)
}

#[test]
fn test_pileups_strictly_ordered() {
    let reads = generate_reads(1, 300, &["A", "B"]);
    let config = TraversalConfig::unbounded()
        .with_deletions(true)
        .with_extended_events(true);
    let pileups = traverse(&reads, config);
    assert!(!pileups.is_empty());

    let base_loci: Vec<GenomeCoordinate> = pileups
        .iter()
        .filter(|p| !p.is_extended())
        .map(LocusPileup::locus)
        .collect();
    assert!(base_loci.windows(2).all(|w| w[0] < w[1]));

    // An extended pileup never precedes a base pileup at or before its anchor.
    let mut last_base: Option<GenomeCoordinate> = None;
    for pileup in &pileups {
        if pileup.is_extended() {
            if let Some(base) = last_base {
                assert!(pileup.locus() >= base);
            }
        } else {
            last_base = Some(pileup.locus());
        }
    }

    assert!(pileups.iter().all(|p| p.size() > 0));
}

#[test]
fn test_coverage_conservation() {
    let reads = generate_reads(2, 250, &["A", "B", "C"]);
    let config = TraversalConfig::unbounded().with_deletions(true);
    let pileups = traverse(&reads, config);

    let mut contributions: HashMap<&str, u64> = HashMap::new();
    for pileup in &pileups {
        for name in pileup.read_names() {
            *contributions.entry(name).or_default() += 1;
        }
    }

    for read in &reads {
        assert_eq!(
            contributions.get(read.name()).copied().unwrap_or(0),
            read.reference_length(),
            "read {}",
            read.name()
        );
    }
}

#[test]
fn test_downsampling_bound() {
    let mut reads = Vec::new();
    for i in 0..120u64 {
        let sample = if i % 3 == 0 { "rare" } else { "deep" };
        let start = GenomeCoordinate::new(ContigId(0), 100 + i / 4).unwrap();
        let read = AlignedRead::new(
            format!("r{}", i),
            sample,
            start,
            parse_cigar("60M").unwrap(),
            Vec::new(),
            60,
        )
        .unwrap();
        reads.push(read.into_shared());
    }

    let cap = 5;
    let config = TraversalConfig::new().with_max_reads(cap);
    let pileups = traverse(&reads, config);
    assert!(!pileups.is_empty());

    let mut saw_full = false;
    for pileup in &pileups {
        let base = pileup.as_base().unwrap();
        let mut per_sample: HashMap<&str, usize> = HashMap::new();
        for element in base.elements() {
            *per_sample.entry(&**element.read().sample()).or_default() += 1;
        }
        for (&sample, &count) in &per_sample {
            assert!(count <= cap as usize, "{} reads for {} at {:?}", count, sample, pileup.locus());
            saw_full |= count == cap as usize;
        }
    }
    assert!(saw_full);
}

#[test]
fn test_deterministic_downsampling() {
    let reads = generate_reads(3, 400, &["A", "B"]);
    let config = TraversalConfig::new()
        .with_max_reads(4)
        .with_extended_events(true)
        .with_seed(99);

    let first: Vec<_> = traverse(&reads, config).iter().map(signature).collect();
    let second: Vec<_> = traverse(&reads, config).iter().map(signature).collect();
    assert_eq!(first, second);
}

#[test]
fn test_shard_equivalence() {
    let reads = generate_reads(4, 300, &["A", "B"]);
    let dict = dictionary();
    let config = TraversalConfig::unbounded()
        .with_deletions(true)
        .with_extended_events(true);

    let single: Vec<_> = traverse(&reads, config).iter().map(signature).collect();

    for shard_size in [1, 17, 250, 10_000] {
        let strategy = LocusShardStrategy::new(&dict, Vec::new(), shard_size).unwrap();
        let outcomes = traverse_shards(&reads, &dict, &SampleSet::any(), &strategy, config).unwrap();
        let (sharded, _) = concat_outcomes(outcomes).unwrap();
        let sharded: Vec<_> = sharded.iter().map(signature).collect();
        assert_eq!(sharded, single, "shard size {}", shard_size);
    }

    let strategy = ContigShardStrategy::new(&dict, Vec::new());
    let outcomes = traverse_shards(&reads, &dict, &SampleSet::any(), &strategy, config).unwrap();
    let (per_contig, _) = concat_outcomes(outcomes).unwrap();
    let per_contig: Vec<_> = per_contig.iter().map(signature).collect();
    assert_eq!(per_contig, single);
}

#[test]
fn test_region_restriction_matches_filtered_full_run() {
    let reads = generate_reads(5, 200, &["A"]);
    let dict = dictionary();
    let config = TraversalConfig::unbounded().with_extended_events(true);
    let region = parse_region("chr1:500-900", &dict).unwrap();

    let full: Vec<_> = traverse(&reads, config)
        .iter()
        .filter(|p| region.contains(&p.locus()))
        .map(signature)
        .collect();

    let restricted: Vec<_> = LocusTraversalEngine::new(
        reads.iter().cloned().map(Ok::<_, PileupError>),
        Arc::clone(&dict),
        SampleSet::any(),
        config,
    )
    .unwrap()
    .with_regions(vec![region])
    .collect::<Result<Vec<_>>>()
    .unwrap()
    .iter()
    .map(signature)
    .collect();

    assert_eq!(restricted, full);
}
