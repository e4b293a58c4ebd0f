//! End-to-end tests for the `pileup` binary.

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const GENOME: &str = "chr1\t1000\nchr2\t500\n";

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file.flush().unwrap();
    file
}

fn run_pileup(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pileup"))
        .args(args)
        .output()
        .expect("Failed to run pileup")
}

fn run_depth(reads: &str, extra: &[&str]) -> Output {
    let genome = write_temp(GENOME);
    let input = write_temp(reads);
    let mut args = vec![
        "depth",
        "-i",
        input.path().to_str().unwrap(),
        "-g",
        genome.path().to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    run_pileup(&args)
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(String::from)
        .collect()
}

#[test]
fn test_insertion_event_between_bases() {
    let reads = "r1\tS1\tchr1\t100\t60\t5M2I3M\tACGTAGGCAT\n";
    let output = run_depth(reads, &["--extended-events"]);
    assert!(output.status.success());
    assert_eq!(
        stdout_lines(&output),
        vec![
            "chr1\t100\tB\t1\t0\t0\t0",
            "chr1\t101\tB\t1\t0\t0\t0",
            "chr1\t102\tB\t1\t0\t0\t0",
            "chr1\t103\tB\t1\t0\t0\t0",
            "chr1\t104\tB\t1\t0\t0\t0",
            "chr1\t104\tE\t1\t0\t1\t0",
            "chr1\t105\tB\t1\t0\t0\t0",
            "chr1\t106\tB\t1\t0\t0\t0",
            "chr1\t107\tB\t1\t0\t0\t0",
        ]
    );
}

#[test]
fn test_deletion_markers() {
    let reads = "r1\tS1\tchr1\t50\t0\t3M2D3M\tACGTAC\n";

    let output = run_depth(reads, &["--include-deletions"]);
    assert!(output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 8);
    assert_eq!(lines[3], "chr1\t53\tB\t1\t1\t0\t1");
    assert_eq!(lines[4], "chr1\t54\tB\t1\t1\t0\t1");

    let output = run_depth(reads, &[]);
    let positions: Vec<String> = stdout_lines(&output)
        .iter()
        .map(|l| l.split('\t').nth(1).unwrap().to_string())
        .collect();
    assert_eq!(positions, vec!["50", "51", "52", "55", "56", "57"]);
}

#[test]
fn test_adjacent_indels_fail() {
    let reads = "bad\tS1\tchr1\t10\t60\t1M1I1D1M\tACG\n";
    let output = run_depth(reads, &["--extended-events"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("bad"));
}

#[test]
fn test_unsorted_input_fails() {
    let reads = "a\tS1\tchr2\t5\t60\t2M\tAC\nb\tS1\tchr1\t5\t60\t2M\tAC\n";
    let output = run_depth(reads, &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unsorted input"));
}

#[test]
fn test_region_and_stats() {
    let reads = "a\tS1\tchr1\t1\t60\t20M\t*\nb\tS1\tchr2\t1\t60\t20M\t*\n";
    let output = run_depth(reads, &["-L", "chr1:5-7", "--stats"]);
    assert!(output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(
        lines,
        vec![
            "chr1\t5\tB\t1\t0\t0\t0",
            "chr1\t6\tB\t1\t0\t0\t0",
            "chr1\t7\tB\t1\t0\t0\t0",
        ]
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("Traversal stats:"));
}

#[test]
fn test_sharded_matches_streaming() {
    let reads = "a\tS1\tchr1\t1\t60\t10M2I10M\t*\n\
                 b\tS2\tchr1\t4\t60\t5M3D12M\t*\n\
                 c\tS1\tchr1\t15\t0\t8M\t*\n\
                 d\tS2\tchr2\t30\t60\t6M\t*\n";
    let flags = ["--extended-events", "--include-deletions"];

    let streaming = run_depth(reads, &flags);
    assert!(streaming.status.success());

    let mut sharded_flags = flags.to_vec();
    sharded_flags.extend_from_slice(&["--shard-size", "3", "--threads", "2"]);
    let sharded = run_depth(reads, &sharded_flags);
    assert!(sharded.status.success());

    let mut contig_flags = flags.to_vec();
    contig_flags.push("--per-contig");
    let per_contig = run_depth(reads, &contig_flags);
    assert!(per_contig.status.success());

    assert_eq!(streaming.stdout, sharded.stdout);
    assert_eq!(streaming.stdout, per_contig.stdout);
}

#[test]
fn test_unknown_contig_in_reads() {
    let reads = "a\tS1\tchrZ\t1\t60\t2M\tAC\n";
    let output = run_depth(reads, &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("chrZ"));
}

#[test]
fn test_missing_input_file() {
    let genome = write_temp(GENOME);
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.tsv");
    let output = run_pileup(&[
        "depth",
        "-i",
        missing.to_str().unwrap(),
        "-g",
        genome.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: Input unavailable"));
}

#[test]
fn test_zero_max_reads_rejected() {
    let reads = "a\tS1\tchr1\t1\t60\t2M\tAC\n";
    let output = run_depth(reads, &["--max-reads", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid configuration"));
}

#[test]
fn test_shard_plan() {
    let genome = write_temp(GENOME);
    let output = run_pileup(&[
        "shards",
        "-g",
        genome.path().to_str().unwrap(),
        "--shard-size",
        "400",
    ]);
    assert!(output.status.success());
    assert_eq!(
        stdout_lines(&output),
        vec![
            "0\tchr1\t1\t400",
            "1\tchr1\t401\t800",
            "2\tchr1\t801\t1000",
            "3\tchr2\t1\t400",
            "4\tchr2\t401\t500",
        ]
    );

    let output = run_pileup(&[
        "shards",
        "-g",
        genome.path().to_str().unwrap(),
        "-L",
        "chr2:10-20",
        "-L",
        "chr1",
        "--per-contig",
    ]);
    assert!(output.status.success());
    assert_eq!(
        stdout_lines(&output),
        vec!["0\tchr1\t1\t1000", "1\tchr2\t10\t20"]
    );
}
