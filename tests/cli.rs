//! Command-line tests for the fastx binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn fastx(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fastx"))
        .args(args)
        .output()
        .expect("Failed to run fastx")
}

fn write_fasta(path: &Path, n: usize) {
    let mut content = String::new();
    for i in 0..n {
        content.push_str(&format!(">s{}\nACGTACGTAC\n", i));
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_head_to_stdout() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.fa");
    write_fasta(&input, 10);

    let output = fastx(&["head", "-i", input.to_str().unwrap(), "-n", "2"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        ">s0\nACGTACGTAC\n>s1\nACGTACGTAC\n"
    );
}

#[test]
fn test_sample_prints_summary() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.fa");
    let out = dir.path().join("out.fa");
    write_fasta(&input, 100);

    let output = fastx(&[
        "sample",
        "-i",
        input.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "-b",
        "0.2k",
    ]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("#Subsample Summary"));
    assert!(stderr.contains("Total bases: 1000"));
    assert!(stderr.contains("Expected bases: 200"));
}

#[test]
fn test_sample_rejects_both_targets() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.fa");
    write_fasta(&input, 5);

    let output = fastx(&["sample", "-i", input.to_str().unwrap(), "-b", "10", "-f", "0.5"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));
}

#[test]
fn test_split_writes_numbered_chunks() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.fa");
    write_fasta(&input, 5);
    let prefix = dir.path().join("part");

    let output = fastx(&[
        "split",
        "-i",
        input.to_str().unwrap(),
        "-o",
        prefix.to_str().unwrap(),
        "-r",
        "2",
        "--suffix",
        "fa",
    ]);
    assert!(output.status.success());
    for i in 0..3 {
        assert!(dir.path().join(format!("part.{}.fa", i)).exists());
    }
    assert!(!dir.path().join("part.3.fa").exists());
}

#[test]
fn test_subseq_region_options_are_exclusive() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.fa");
    write_fasta(&input, 1);
    let regions = dir.path().join("regions.txt");
    fs::write(&regions, "s0\n").unwrap();

    let output = fastx(&[
        "subseq",
        "-i",
        input.to_str().unwrap(),
        "-r",
        "s0",
        "-R",
        regions.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_subseq_missing_index() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.fa");
    write_fasta(&input, 1);

    let output = fastx(&["subseq", "-i", input.to_str().unwrap(), "-r", "s0:1-4"]);
    assert_eq!(output.status.code(), Some(1));
}
