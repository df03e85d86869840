//! Head command implementation.
//!
//! Copies the leading records of an input (or both mates of a pair) up to
//! a read count or a base budget, then stops the reader without scanning
//! the rest of the file.

use crate::config::{validate_capacity, OutputConfig};
use crate::fastx::{FastxError, Result};
use crate::record::Record;
use crate::streaming::{
    FastxWriter, PairSynchronizer, PairedWriter, RecordChannel, RecordSink, RecordSource,
    DEFAULT_CHANNEL_CAPACITY,
};
use log::info;
use std::fmt;
use std::path::Path;

/// How much of the input to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadLimit {
    /// First n records (pairs)
    Reads(u64),
    /// Records while the running base total stays within n
    Bases(u64),
}

impl HeadLimit {
    pub fn from_options(reads: Option<u64>, bases: Option<u64>) -> Result<Self> {
        match (reads, bases) {
            (Some(n), None) => Ok(Self::Reads(n)),
            (None, Some(b)) => Ok(Self::Bases(b)),
            (Some(_), Some(_)) => Err(FastxError::InvalidConfig(
                "--number and --bases can not be used together".to_string(),
            )),
            (None, None) => Err(FastxError::InvalidConfig(
                "one of --number or --bases is required".to_string(),
            )),
        }
    }
}

/// Records and bases written by a head run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeadStats {
    pub reads: u64,
    pub bases: u64,
}

impl HeadStats {
    /// Account a unit and report whether it fits within `limit`.
    #[inline]
    fn admit(&mut self, limit: HeadLimit, bases: u64) -> bool {
        let fits = match limit {
            HeadLimit::Reads(n) => self.reads < n,
            HeadLimit::Bases(n) => self.bases + bases <= n,
        };
        if fits {
            self.reads += 1;
            self.bases += bases;
        }
        fits
    }

    #[inline]
    fn is_full(&self, limit: HeadLimit) -> bool {
        match limit {
            HeadLimit::Reads(n) => self.reads >= n,
            HeadLimit::Bases(n) => self.bases >= n,
        }
    }
}

impl fmt::Display for HeadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} reads, {} bases", self.reads, self.bases)
    }
}

/// Copy leading records of `source` into `sink`.
pub fn head_source<S: RecordSource, K: RecordSink>(
    source: &mut S,
    sink: &mut K,
    limit: HeadLimit,
) -> Result<HeadStats> {
    let mut stats = HeadStats::default();
    if !stats.is_full(limit) {
        while let Some(record) = source.pull()? {
            if !stats.admit(limit, record.len() as u64) {
                break;
            }
            sink.write_record(record)?;
            if stats.is_full(limit) {
                break;
            }
        }
    }
    source.stop();
    Ok(stats)
}

/// Copy leading pairs; the base budget counts both mates.
pub fn head_pairs<A, B, K>(
    pairs: &mut PairSynchronizer<A, B>,
    output: &mut PairedWriter<K>,
    limit: HeadLimit,
) -> Result<HeadStats>
where
    A: RecordSource,
    B: RecordSource,
    K: RecordSink,
{
    let mut stats = HeadStats::default();
    if !stats.is_full(limit) {
        while let Some((r1, r2)) = pairs.next()? {
            if !stats.admit(limit, pair_len(r1, r2)) {
                break;
            }
            output.write_pair(r1, r2)?;
            if stats.is_full(limit) {
                break;
            }
        }
    }
    pairs.stop();
    Ok(stats)
}

#[inline]
fn pair_len(r1: &Record, r2: &Record) -> u64 {
    (r1.len() + r2.len()) as u64
}

/// Head command configuration.
#[derive(Debug, Clone)]
pub struct HeadCommand {
    pub limit: HeadLimit,
    /// Record slots per input channel
    pub capacity: usize,
    pub output: OutputConfig,
}

impl HeadCommand {
    pub fn new(limit: HeadLimit) -> Self {
        Self {
            limit,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            output: OutputConfig::default(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    fn validate(&self) -> Result<()> {
        validate_capacity(self.capacity)?;
        self.output.validate()
    }

    /// Keep the head of a single file; `-` reads stdin or writes stdout.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output: Q) -> Result<HeadStats> {
        self.validate()?;
        let mut source = RecordChannel::open(input, self.capacity)?;
        let mut sink = FastxWriter::create(output, &self.output)?;
        let stats = head_source(&mut source, &mut sink, self.limit)?;
        sink.close()?;
        info!("kept {}", stats);
        Ok(stats)
    }

    /// Keep the head of a pair of mate files.
    pub fn run_paired<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input1: P,
        input2: P,
        output1: Q,
        output2: Q,
    ) -> Result<HeadStats> {
        self.validate()?;
        let mut pairs = PairSynchronizer::new(
            RecordChannel::open(input1, self.capacity)?,
            RecordChannel::open(input2, self.capacity)?,
        );
        let mut writer = PairedWriter::create(output1, output2, &self.output)?;
        let stats = head_pairs(&mut pairs, &mut writer, self.limit)?;
        writer.close()?;
        info!("kept {} pairs, {} bases", stats.reads, stats.bases);
        Ok(stats)
    }
}
