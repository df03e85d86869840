//! Split command implementation.
//!
//! Routes consecutive records into numbered chunk files, each holding at
//! most a fixed number of reads or bases. The record that reaches the
//! threshold is written to the chunk it was counted against; the next
//! chunk is opened only when another record arrives, so no empty trailing
//! chunk is ever created.
//!
//! Paired input rotates both mates' chunks at the same pair, counting the
//! combined bases of both mates.

use crate::config::{validate_capacity, OutputConfig};
use crate::fastx::{count, count_pair, FastxError, Result};
use crate::record::Record;
use crate::streaming::{
    FastxWriter, PairSynchronizer, PairedWriter, RecordChannel, RecordSink, RecordSource,
    DEFAULT_CHANNEL_CAPACITY,
};
use log::{debug, info};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-chunk limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitThreshold {
    Reads(u64),
    Bases(u64),
}

impl SplitThreshold {
    fn limit(&self) -> u64 {
        match *self {
            Self::Reads(n) | Self::Bases(n) => n,
        }
    }

    /// Amount a unit of `reads` records and `bases` bases adds to a chunk.
    #[inline]
    fn weight(&self, reads: u64, bases: u64) -> u64 {
        match self {
            Self::Reads(_) => reads,
            Self::Bases(_) => bases,
        }
    }
}

/// How the per-chunk limit is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitSize {
    /// Fixed threshold
    Threshold(SplitThreshold),
    /// Produce about this many chunks, splitting by bases
    Number(u64),
}

impl SplitSize {
    /// Build from the three mutually exclusive options.
    pub fn from_options(reads: Option<u64>, bases: Option<u64>, number: Option<u64>) -> Result<Self> {
        let size = match (reads, bases, number) {
            (Some(r), None, None) => Self::Threshold(SplitThreshold::Reads(r)),
            (None, Some(b), None) => Self::Threshold(SplitThreshold::Bases(b)),
            (None, None, Some(n)) => Self::Number(n),
            (None, None, None) => {
                return Err(FastxError::InvalidConfig(
                    "one of --reads, --bases or --number is required".to_string(),
                ))
            }
            _ => {
                return Err(FastxError::InvalidConfig(
                    "--reads, --bases and --number can not be used together".to_string(),
                ))
            }
        };
        size.validate()?;
        Ok(size)
    }

    fn validate(&self) -> Result<()> {
        let value = match *self {
            Self::Threshold(t) => t.limit(),
            Self::Number(n) => n,
        };
        if value == 0 {
            return Err(FastxError::InvalidConfig(
                "split size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a chunk is written.
pub trait ChunkSink {
    fn close_chunk(self) -> Result<()>;
}

impl<W: Write> ChunkSink for FastxWriter<W> {
    fn close_chunk(self) -> Result<()> {
        self.close()
    }
}

impl ChunkSink for Vec<u8> {
    fn close_chunk(self) -> Result<()> {
        Ok(())
    }
}

impl<S: RecordSink> ChunkSink for PairedWriter<S> {
    fn close_chunk(self) -> Result<()> {
        self.close()
    }
}

/// Opens the sink of chunk `index`.
pub trait SinkFactory {
    type Sink: ChunkSink;

    fn open(&mut self, index: usize) -> Result<Self::Sink>;
}

impl<S: ChunkSink, F: FnMut(usize) -> Result<S>> SinkFactory for F {
    type Sink = S;

    fn open(&mut self, index: usize) -> Result<S> {
        self(index)
    }
}

/// Chunk files named `{prefix}.{index}.{suffix}`.
#[derive(Debug, Clone)]
pub struct ChunkFiles {
    pub prefix: String,
    pub suffix: String,
    pub config: OutputConfig,
}

impl ChunkFiles {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>, config: OutputConfig) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            config,
        }
    }

    pub fn path(&self, index: usize) -> PathBuf {
        PathBuf::from(format!("{}.{}.{}", self.prefix, index, self.suffix))
    }
}

impl SinkFactory for ChunkFiles {
    type Sink = FastxWriter<Box<dyn Write + Send>>;

    fn open(&mut self, index: usize) -> Result<Self::Sink> {
        FastxWriter::create(self.path(index), &self.config)
    }
}

/// Mate chunk files opened together.
pub struct PairedChunkFiles {
    pub read1: ChunkFiles,
    pub read2: ChunkFiles,
}

impl SinkFactory for PairedChunkFiles {
    type Sink = PairedWriter<FastxWriter<Box<dyn Write + Send>>>;

    fn open(&mut self, index: usize) -> Result<Self::Sink> {
        Ok(PairedWriter::new(self.read1.open(index)?, self.read2.open(index)?))
    }
}

/// Reads and bases written to one chunk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStats {
    pub reads: u64,
    pub bases: u64,
}

/// Position of the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkState {
    /// Index of the open chunk
    pub index: usize,
    /// Reads or bases written to it, per the threshold kind
    pub count: u64,
    pub threshold: SplitThreshold,
}

/// Statistics from a split run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitStats {
    pub chunks: Vec<ChunkStats>,
}

impl SplitStats {
    pub fn total_reads(&self) -> u64 {
        self.chunks.iter().map(|c| c.reads).sum()
    }

    pub fn total_bases(&self) -> u64 {
        self.chunks.iter().map(|c| c.bases).sum()
    }
}

impl fmt::Display for SplitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chunks, {} reads, {} bases",
            self.chunks.len(),
            self.total_reads(),
            self.total_bases()
        )
    }
}

/// Rotates records across the sinks of a [`SinkFactory`].
pub struct Chunker<F: SinkFactory> {
    factory: F,
    state: ChunkState,
    sink: Option<F::Sink>,
    rotate_pending: bool,
    stats: SplitStats,
}

impl<F: SinkFactory> Chunker<F> {
    /// Open chunk 0 and start filling it.
    pub fn new(mut factory: F, threshold: SplitThreshold) -> Result<Self> {
        SplitSize::Threshold(threshold).validate()?;
        let sink = factory.open(0)?;
        Ok(Self {
            factory,
            state: ChunkState {
                index: 0,
                count: 0,
                threshold,
            },
            sink: Some(sink),
            rotate_pending: false,
            stats: SplitStats {
                chunks: vec![ChunkStats::default()],
            },
        })
    }

    pub fn state(&self) -> &ChunkState {
        &self.state
    }

    /// Sink for the next unit, rotating first if the open chunk is full.
    fn current(&mut self) -> Result<&mut F::Sink> {
        if self.rotate_pending {
            if let Some(full) = self.sink.take() {
                full.close_chunk()?;
            }
            let next = self.state.index + 1;
            self.sink = Some(self.factory.open(next)?);
            debug!(
                "chunk {} full ({} reads), opening chunk {}",
                self.state.index,
                self.stats.chunks[self.state.index].reads,
                next
            );
            self.state.index = next;
            self.state.count = 0;
            self.stats.chunks.push(ChunkStats::default());
            self.rotate_pending = false;
        }
        self.sink
            .as_mut()
            .ok_or_else(|| FastxError::InvalidConfig("chunker already finished".to_string()))
    }

    fn account(&mut self, reads: u64, bases: u64) {
        let chunk = &mut self.stats.chunks[self.state.index];
        chunk.reads += reads;
        chunk.bases += bases;
        self.state.count += self.state.threshold.weight(reads, bases);
        if self.state.count >= self.state.threshold.limit() {
            self.rotate_pending = true;
        }
    }

    /// Close the open chunk and return per-chunk statistics.
    pub fn finish(mut self) -> Result<SplitStats> {
        if let Some(sink) = self.sink.take() {
            sink.close_chunk()?;
        }
        Ok(self.stats)
    }
}

impl<F> Chunker<F>
where
    F: SinkFactory,
    F::Sink: RecordSink,
{
    pub fn push(&mut self, record: &Record) -> Result<()> {
        self.current()?.write_record(record)?;
        self.account(1, record.len() as u64);
        Ok(())
    }
}

impl<F, S> Chunker<F>
where
    F: SinkFactory<Sink = PairedWriter<S>>,
    S: RecordSink,
{
    /// Write both mates to the open chunk pair; one pair counts as one read.
    pub fn push_pair(&mut self, r1: &Record, r2: &Record) -> Result<()> {
        self.current()?.write_pair(r1, r2)?;
        self.account(1, (r1.len() + r2.len()) as u64);
        Ok(())
    }
}

/// Drain a source into a chunker.
pub fn split_source<S, F>(source: &mut S, chunker: &mut Chunker<F>) -> Result<()>
where
    S: RecordSource,
    F: SinkFactory,
    F::Sink: RecordSink,
{
    while let Some(record) = source.pull()? {
        chunker.push(record)?;
    }
    Ok(())
}

/// Drain a synchronized pair into a paired chunker.
pub fn split_pairs<A, B, F, K>(pairs: &mut PairSynchronizer<A, B>, chunker: &mut Chunker<F>) -> Result<()>
where
    A: RecordSource,
    B: RecordSource,
    F: SinkFactory<Sink = PairedWriter<K>>,
    K: RecordSink,
{
    while let Some((r1, r2)) = pairs.next()? {
        chunker.push_pair(r1, r2)?;
    }
    Ok(())
}

fn default_suffix(fastq: bool) -> &'static str {
    if fastq {
        "fastq.gz"
    } else {
        "fasta.gz"
    }
}

/// Split command configuration.
#[derive(Debug, Clone)]
pub struct SplitCommand {
    pub size: SplitSize,
    /// Chunk file suffix; derived from the input kind when unset
    pub suffix: Option<String>,
    /// Record slots per input channel
    pub capacity: usize,
    pub output: OutputConfig,
}

impl SplitCommand {
    pub fn new(size: SplitSize) -> Self {
        Self {
            size,
            suffix: None,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            output: OutputConfig::default(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
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
        self.size.validate()?;
        validate_capacity(self.capacity)?;
        self.output.validate()
    }

    fn suffix_for(&self, fastq: bool) -> String {
        self.suffix
            .clone()
            .unwrap_or_else(|| default_suffix(fastq).to_string())
    }

    /// Split a single-end file into `{prefix}.{index}.{suffix}` chunks.
    pub fn run<P: AsRef<Path>>(&self, input: P, prefix: &str) -> Result<SplitStats> {
        self.validate()?;
        let threshold = match self.size {
            SplitSize::Threshold(t) => t,
            SplitSize::Number(n) => bases_per_chunk(count(&input)?.bases, n),
        };
        info!("splitting {} by {:?}", input.as_ref().display(), threshold);

        let mut source = RecordChannel::open(&input, self.capacity)?;
        let first = source.pull()?;
        let fastq = first.is_some_and(|r| r.is_fastq());
        let files = ChunkFiles::new(prefix, self.suffix_for(fastq), self.output);
        let mut chunker = Chunker::new(files, threshold)?;
        if let Some(record) = first {
            chunker.push(record)?;
            split_source(&mut source, &mut chunker)?;
        }
        let stats = chunker.finish()?;
        info!("wrote {}", stats);
        Ok(stats)
    }

    /// Split a pair of mate files; both mates rotate at the same pair.
    pub fn run_paired<P: AsRef<Path> + Sync>(
        &self,
        input1: P,
        input2: P,
        prefix1: &str,
        prefix2: &str,
    ) -> Result<SplitStats> {
        self.validate()?;
        if prefix1 == prefix2 {
            return Err(FastxError::InvalidConfig(
                "read1 and read2 chunk prefixes must differ".to_string(),
            ));
        }
        let threshold = match self.size {
            SplitSize::Threshold(t) => t,
            SplitSize::Number(n) => bases_per_chunk(count_pair(&input1, &input2)?.bases, n),
        };
        info!("splitting pairs by {:?}", threshold);

        let mut pairs = PairSynchronizer::new(
            RecordChannel::open(&input1, self.capacity)?,
            RecordChannel::open(&input2, self.capacity)?,
        );
        let first = pairs.next()?;
        let fastq = first.is_some_and(|(r1, _)| r1.is_fastq());
        let suffix = self.suffix_for(fastq);
        let files = PairedChunkFiles {
            read1: ChunkFiles::new(prefix1, suffix.clone(), self.output),
            read2: ChunkFiles::new(prefix2, suffix, self.output),
        };
        let mut chunker = Chunker::new(files, threshold)?;
        if let Some((r1, r2)) = first {
            chunker.push_pair(r1, r2)?;
            split_pairs(&mut pairs, &mut chunker)?;
        }
        let stats = chunker.finish()?;
        info!("wrote {}", stats);
        Ok(stats)
    }
}

/// Base threshold that yields about `number` chunks.
pub fn bases_per_chunk(total_bases: u64, number: u64) -> SplitThreshold {
    SplitThreshold::Bases(total_bases.div_ceil(number.max(1)).max(1))
}
