//! End-to-end tests for the sample, split, head and subseq pipelines.
//!
//! Tests verify:
//! 1. Sampling keeps input order, honours the base target and is seeded
//! 2. Paired runs keep mates aligned and reject uneven inputs
//! 3. Chunks are named PREFIX.N.SUFFIX and partition the input
//! 4. Head stops at the limit on gzip input
//! 5. Subseq reads an indexed FASTA

use fastx_toolkit::commands::{
    HeadCommand, HeadLimit, SampleCommand, SampleTarget, SplitCommand, SplitSize, SplitThreshold,
    SubseqCommand,
};
use fastx_toolkit::commands::subseq::parse_region_list;
use fastx_toolkit::fastx::parse_records;
use fastx_toolkit::{count, FastxError, Record};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

/// FASTQ with `n` reads of length `len`, named `{tag}{i}`.
fn fastq(tag: &str, n: usize, len: usize) -> String {
    let bases = ["A", "C", "G", "T"];
    let mut out = String::new();
    for i in 0..n {
        let seq = bases[i % 4].repeat(len);
        out.push_str(&format!("@{}{} sample\n{}\n+\n{}\n", tag, i, seq, "I".repeat(len)));
    }
    out
}

fn read_records(path: &Path) -> Vec<Record> {
    let mut reader = fastx_toolkit::FastxReader::from_path(path).unwrap();
    let mut records = Vec::new();
    let mut record = Record::new();
    while reader.read_into(&mut record).unwrap() {
        records.push(record.clone());
    }
    records
}

fn index_of(record: &Record, tag: &str) -> usize {
    record.name_str()[tag.len()..].parse().unwrap()
}

#[test]
fn test_sample_single_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("reads.fq");
    fs::write(&input, fastq("r", 2000, 100)).unwrap();
    let output = dir.path().join("sampled.fq.gz");

    let summary = SampleCommand::new(SampleTarget::Fraction(0.1))
        .with_seed(3)
        .run(&input, &output)
        .unwrap();
    assert_eq!(summary.total_bases, 200_000);
    assert_eq!(summary.expected_bases, 20_000);

    let records = read_records(&output);
    let bases: u64 = records.iter().map(|r| r.len() as u64).sum();
    assert_eq!(bases, summary.real_bases);
    // At most one record past the target
    assert!(bases <= summary.expected_bases + 100);
    assert!(bases > 0);

    let order: Vec<usize> = records.iter().map(|r| index_of(r, "r")).collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_sample_is_reproducible() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("reads.fq");
    fs::write(&input, fastq("r", 500, 50)).unwrap();
    let out1 = dir.path().join("a.fq");
    let out2 = dir.path().join("b.fq");

    let cmd = SampleCommand::new(SampleTarget::Bases(5_000)).with_seed(42);
    cmd.run(&input, &out1).unwrap();
    cmd.run(&input, &out2).unwrap();
    assert_eq!(fs::read(&out1).unwrap(), fs::read(&out2).unwrap());
}

#[test]
fn test_sample_identity_copies_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("reads.fq");
    let content = fastq("r", 10, 20);
    fs::write(&input, &content).unwrap();
    let output = dir.path().join("copy.fq");

    let summary = SampleCommand::new(SampleTarget::Bases(1_000_000))
        .run(&input, &output)
        .unwrap();
    assert_eq!(summary.real_bases, 200);
    assert_eq!(fs::read_to_string(&output).unwrap(), content);
}

#[test]
fn test_sample_paired_keeps_mates() {
    let dir = tempdir().unwrap();
    let in1 = dir.path().join("r1.fq");
    let in2 = dir.path().join("r2.fq");
    fs::write(&in1, fastq("p", 1000, 80)).unwrap();
    fs::write(&in2, fastq("p", 1000, 80)).unwrap();
    let out1 = dir.path().join("o1.fq");
    let out2 = dir.path().join("o2.fq");

    let summary = SampleCommand::new(SampleTarget::Fraction(0.2))
        .run_paired(&in1, &in2, &out1, &out2)
        .unwrap();

    let r1 = read_records(&out1);
    let r2 = read_records(&out2);
    assert_eq!(r1.len(), r2.len());
    assert!(r1.iter().zip(&r2).all(|(a, b)| a.name == b.name));
    let bases: u64 = r1.iter().chain(&r2).map(|r| r.len() as u64).sum();
    assert_eq!(bases, summary.real_bases);
}

#[test]
fn test_sample_paired_uneven_inputs() {
    let dir = tempdir().unwrap();
    let in1 = dir.path().join("r1.fq");
    let in2 = dir.path().join("r2.fq");
    fs::write(&in1, fastq("p", 10, 10)).unwrap();
    fs::write(&in2, fastq("p", 9, 10)).unwrap();

    let err = SampleCommand::new(SampleTarget::Fraction(0.5))
        .run_paired(&in1, &in2, dir.path().join("o1.fq"), dir.path().join("o2.fq"))
        .unwrap_err();
    assert!(matches!(err, FastxError::PairMismatch { read1: 10, read2: 9 }));
}

#[test]
fn test_split_by_reads() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("reads.fq");
    fs::write(&input, fastq("r", 10, 30)).unwrap();
    let prefix = dir.path().join("chunk").to_string_lossy().into_owned();

    let stats = SplitCommand::new(SplitSize::Threshold(SplitThreshold::Reads(4)))
        .run(&input, &prefix)
        .unwrap();
    let reads: Vec<u64> = stats.chunks.iter().map(|c| c.reads).collect();
    assert_eq!(reads, vec![4, 4, 2]);

    let mut names = Vec::new();
    for i in 0..3 {
        let path = format!("{}.{}.fastq.gz", prefix, i);
        for record in read_records(Path::new(&path)) {
            names.push(index_of(&record, "r"));
        }
    }
    assert_eq!(names, (0..10).collect::<Vec<_>>());
    assert!(!Path::new(&format!("{}.3.fastq.gz", prefix)).exists());
}

#[test]
fn test_split_paired_by_number() {
    let dir = tempdir().unwrap();
    let in1 = dir.path().join("r1.fq");
    let in2 = dir.path().join("r2.fq");
    fs::write(&in1, fastq("p", 12, 50)).unwrap();
    fs::write(&in2, fastq("p", 12, 50)).unwrap();
    let prefix1 = dir.path().join("a").to_string_lossy().into_owned();
    let prefix2 = dir.path().join("b").to_string_lossy().into_owned();

    let stats = SplitCommand::new(SplitSize::Number(3))
        .with_suffix("fq")
        .run_paired(&in1, &in2, &prefix1, &prefix2)
        .unwrap();
    assert_eq!(stats.chunks.len(), 3);
    assert_eq!(stats.total_reads(), 12);

    for i in 0..3 {
        let a = read_records(Path::new(&format!("{}.{}.fq", prefix1, i)));
        let b = read_records(Path::new(&format!("{}.{}.fq", prefix2, i)));
        assert_eq!(a.len(), 4);
        assert!(a.iter().zip(&b).all(|(x, y)| x.name == y.name));
    }
}

#[test]
fn test_head_gzip_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("reads.fq.gz");
    {
        let mut enc = GzEncoder::new(fs::File::create(&input).unwrap(), Compression::fast());
        enc.write_all(fastq("r", 5000, 60).as_bytes()).unwrap();
        enc.finish().unwrap();
    }
    let output = dir.path().join("head.fq");

    let stats = HeadCommand::new(HeadLimit::Bases(1000))
        .run(&input, &output)
        .unwrap();
    // 16 reads of 60 bases fit in 1000
    assert_eq!(stats.reads, 16);
    assert_eq!(count(&output).unwrap().bases, 960);
}

#[test]
fn test_subseq_indexed_fasta() {
    let dir = tempdir().unwrap();
    let fasta = dir.path().join("genome.fa");
    fs::write(&fasta, ">chrA assembly\nAAAACCCC\nGGGGTTTT\nAC\n>chrB\nTTGG\n").unwrap();
    fs::write(
        dir.path().join("genome.fa.fai"),
        "chrA\t18\t15\t8\t9\nchrB\t4\t42\t4\t5\n",
    )
    .unwrap();
    let output = dir.path().join("out.fa");

    let regions = parse_region_list("chrA:7-10,chrB").unwrap();
    let stats = SubseqCommand::new().run(&fasta, &regions, &output).unwrap();
    assert_eq!(stats.regions, 2);

    let records = parse_records(&fs::read(&output).unwrap()).unwrap();
    assert_eq!(records[0].name, b"chrA:7-10");
    assert_eq!(records[0].seq, b"CCGG");
    assert_eq!(records[1].name, b"chrB:1-4");
    assert_eq!(records[1].seq, b"TTGG");
}

#[test]
fn test_split_paired_uneven_reports_full_counts() {
    let dir = tempdir().unwrap();
    let in1 = dir.path().join("r1.fq");
    let in2 = dir.path().join("r2.fq");
    fs::write(&in1, fastq("p", 10, 20)).unwrap();
    fs::write(&in2, fastq("p", 4, 20)).unwrap();
    let prefix1 = dir.path().join("a").to_string_lossy().into_owned();
    let prefix2 = dir.path().join("b").to_string_lossy().into_owned();

    let err = SplitCommand::new(SplitSize::Threshold(SplitThreshold::Reads(3)))
        .run_paired(&in1, &in2, &prefix1, &prefix2)
        .unwrap_err();
    assert!(matches!(err, FastxError::PairMismatch { read1: 10, read2: 4 }));
    assert!(err.to_string().contains("read1 has 10 records, read2 has 4 records"));
}
