//! Sample command implementation.
//!
//! Subsamples reads (or read pairs) to a target number of bases in a
//! single streaming pass. A counting pre-pass gives the total size and the
//! mean record length; each record is then kept with a probability
//! weighted by its length, and reading stops as soon as the target is met.
//!
//! Stopping at the target under-fills the output on average, so the
//! inclusion fraction is inflated by [`SAMPLING_INFLATION`]. The side
//! effect is a mild bias toward records near the start of the input.

use crate::config::{validate_capacity, validate_fraction, OutputConfig, DEFAULT_SEED};
use crate::fastx::{count, count_pair, FastxError, ReadStats, Result};
use crate::streaming::{
    FastxWriter, PairSynchronizer, PairedWriter, RecordChannel, RecordSink, RecordSource,
    DEFAULT_CHANNEL_CAPACITY,
};
use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Multiplier applied to the requested fraction before sampling.
pub const SAMPLING_INFLATION: f64 = 1.05;

/// What to subsample to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleTarget {
    /// Absolute number of bases
    Bases(u64),
    /// Fraction of the input bases
    Fraction(f64),
}

impl SampleTarget {
    /// Build a target from the two mutually exclusive options.
    pub fn from_options(bases: Option<u64>, fraction: Option<f64>) -> Result<Self> {
        match (bases, fraction) {
            (Some(_), Some(_)) => Err(FastxError::InvalidConfig(
                "--bases and --fraction can not be used together".to_string(),
            )),
            (Some(b), None) => Self::Bases(b).validated(),
            (None, Some(f)) => Self::Fraction(f).validated(),
            (None, None) => Err(FastxError::InvalidConfig(
                "one of --bases or --fraction is required".to_string(),
            )),
        }
    }

    fn validated(self) -> Result<Self> {
        match self {
            Self::Bases(0) => Err(FastxError::InvalidConfig(
                "target bases must be greater than 0".to_string(),
            )),
            Self::Bases(_) => Ok(self),
            Self::Fraction(f) => validate_fraction(f).map(Self::Fraction),
        }
    }
}

/// Per-run sampling state.
#[derive(Debug)]
pub struct SubsampleState {
    /// Bases of every record considered so far
    pub total_processed_bases: u64,
    /// Bases of the records kept so far
    pub accepted_bases: u64,
    /// Stop once `accepted_bases` reaches this
    pub target_bases: u64,
    /// Inflated inclusion threshold
    pub inclusion_fraction: f64,
    rng: SmallRng,
}

/// Length-weighted record selector with early stop.
#[derive(Debug)]
pub struct Sampler {
    state: SubsampleState,
    mean_length: f64,
}

impl Sampler {
    /// Create a sampler for `target_bases`.
    ///
    /// `fraction` is the requested (uninflated) fraction and `mean_length`
    /// the mean size of one unit of decision: a record, or both mates of a
    /// pair.
    pub fn new(target_bases: u64, fraction: f64, mean_length: f64, seed: u64) -> Result<Self> {
        if target_bases == 0 {
            return Err(FastxError::InvalidConfig(
                "target bases must be greater than 0".to_string(),
            ));
        }
        validate_fraction(fraction)?;
        if !(mean_length.is_finite() && mean_length > 0.0) {
            return Err(FastxError::InvalidConfig(format!(
                "mean record length must be positive, got {}",
                mean_length
            )));
        }
        Ok(Self {
            state: SubsampleState {
                total_processed_bases: 0,
                accepted_bases: 0,
                target_bases,
                inclusion_fraction: fraction * SAMPLING_INFLATION,
                rng: SmallRng::seed_from_u64(seed),
            },
            mean_length,
        })
    }

    pub fn state(&self) -> &SubsampleState {
        &self.state
    }

    /// Decide whether to keep a record (or pair) of `len` bases.
    ///
    /// A kept record is accounted in full even when it overshoots the
    /// target.
    #[inline]
    pub fn consider(&mut self, len: u64) -> bool {
        let state = &mut self.state;
        state.total_processed_bases += len;
        let u: f64 = state.rng.gen();
        let p = u * len as f64 / self.mean_length;
        if p <= state.inclusion_fraction && state.accepted_bases < state.target_bases {
            state.accepted_bases += len;
            true
        } else {
            false
        }
    }

    /// True once the target has been reached.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.accepted_bases >= self.state.target_bases
    }

    /// Sample a single stream into `sink`. Returns the accepted bases.
    pub fn run<S: RecordSource, K: RecordSink>(&mut self, source: &mut S, sink: &mut K) -> Result<u64> {
        let mut seen = 0u64;
        while let Some(record) = source.pull()? {
            seen += 1;
            if self.consider(record.len() as u64) {
                sink.write_record(record)?;
            }
            if self.is_done() {
                info!("target reached after {} records, stopping input", seen);
                source.stop();
                break;
            }
        }
        debug!(
            "considered {} bases, kept {}",
            self.state.total_processed_bases, self.state.accepted_bases
        );
        Ok(self.state.accepted_bases)
    }

    /// Sample a synchronized pair; both mates are kept or dropped together.
    pub fn run_paired<A, B, K>(
        &mut self,
        pairs: &mut PairSynchronizer<A, B>,
        output: &mut PairedWriter<K>,
    ) -> Result<u64>
    where
        A: RecordSource,
        B: RecordSource,
        K: RecordSink,
    {
        while let Some((r1, r2)) = pairs.next()? {
            if self.consider((r1.len() + r2.len()) as u64) {
                output.write_pair(r1, r2)?;
            }
            if self.is_done() {
                info!("target reached after {} pairs, stopping input", pairs.pairs());
                pairs.stop();
                break;
            }
        }
        debug!(
            "considered {} bases, kept {}",
            self.state.total_processed_bases, self.state.accepted_bases
        );
        Ok(self.state.accepted_bases)
    }
}

/// Outcome of a subsampling run, reported once at the end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubsampleSummary {
    pub total_bases: u64,
    pub expected_bases: u64,
    pub real_bases: u64,
    pub expected_fraction: f64,
    pub real_fraction: f64,
}

impl fmt::Display for SubsampleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ryu_buf = ryu::Buffer::new();
        writeln!(f, "#Subsample Summary")?;
        writeln!(f, "Total bases: {}", self.total_bases)?;
        writeln!(f, "Expected bases: {}", self.expected_bases)?;
        writeln!(f, "Real bases: {}", self.real_bases)?;
        writeln!(f, "Expected fraction: {}", ryu_buf.format(self.expected_fraction))?;
        write!(f, "Real fraction: {}", ryu_buf.format(self.real_fraction))
    }
}

/// Sampling parameters derived from the counting pre-pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePlan {
    pub total: ReadStats,
    pub fraction: f64,
    pub target_bases: u64,
    pub mean_length: f64,
}

impl SamplePlan {
    /// Derive the plan. For paired input `total` sums both mates and the
    /// mean length is that of a whole pair.
    pub fn new(target: SampleTarget, total: ReadStats, paired: bool) -> Self {
        let (fraction, target_bases) = match target {
            SampleTarget::Bases(b) if total.bases == 0 => (f64::INFINITY, b),
            SampleTarget::Bases(b) => (b as f64 / total.bases as f64, b),
            SampleTarget::Fraction(f) => (f, (f * total.bases as f64).round() as u64),
        };
        let mean_length = if paired {
            total.mean_length() * 2.0
        } else {
            total.mean_length()
        };
        Self {
            total,
            fraction,
            target_bases,
            mean_length,
        }
    }

    /// True if the whole input is kept verbatim.
    pub fn is_identity(&self) -> bool {
        self.fraction >= 1.0 || self.total.bases == 0
    }

    fn summary(&self, real_bases: u64) -> SubsampleSummary {
        let real_fraction = if self.total.bases == 0 {
            1.0
        } else {
            real_bases as f64 / self.total.bases as f64
        };
        SubsampleSummary {
            total_bases: self.total.bases,
            expected_bases: self.target_bases,
            real_bases,
            expected_fraction: self.fraction,
            real_fraction,
        }
    }
}

/// Sample command configuration.
#[derive(Debug, Clone)]
pub struct SampleCommand {
    pub target: SampleTarget,
    /// Seed of the random source
    pub seed: u64,
    /// Record slots per input channel
    pub capacity: usize,
    pub output: OutputConfig,
}

impl SampleCommand {
    pub fn new(target: SampleTarget) -> Self {
        Self {
            target,
            seed: DEFAULT_SEED,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            output: OutputConfig::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
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
        self.target.validated()?;
        validate_capacity(self.capacity)?;
        self.output.validate()
    }

    /// Subsample a single-end file.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output: Q) -> Result<SubsampleSummary> {
        self.validate()?;
        reject_stdin(input.as_ref())?;

        let total = count(&input)?;
        let plan = SamplePlan::new(self.target, total, false);
        info!(
            "input has {} reads and {} bases, target {} bases",
            total.reads, total.bases, plan.target_bases
        );

        if plan.is_identity() {
            copy_verbatim(input.as_ref(), output.as_ref())?;
            return Ok(plan.summary(total.bases));
        }

        let mut sampler = Sampler::new(plan.target_bases, plan.fraction, plan.mean_length, self.seed)?;
        let mut source = RecordChannel::open(&input, self.capacity)?;
        let mut sink = FastxWriter::create(&output, &self.output)?;
        let real = sampler.run(&mut source, &mut sink)?;
        sink.close()?;
        Ok(plan.summary(real))
    }

    /// Subsample a pair of mate files.
    pub fn run_paired<P: AsRef<Path> + Sync, Q: AsRef<Path>>(
        &self,
        input1: P,
        input2: P,
        output1: Q,
        output2: Q,
    ) -> Result<SubsampleSummary> {
        self.validate()?;
        reject_stdin(input1.as_ref())?;
        reject_stdin(input2.as_ref())?;

        let total = count_pair(&input1, &input2)?;
        let plan = SamplePlan::new(self.target, total, true);
        info!(
            "paired input has {} pairs and {} bases, target {} bases",
            total.reads / 2,
            total.bases,
            plan.target_bases
        );

        if plan.is_identity() {
            copy_verbatim(input1.as_ref(), output1.as_ref())?;
            copy_verbatim(input2.as_ref(), output2.as_ref())?;
            return Ok(plan.summary(total.bases));
        }

        let mut sampler = Sampler::new(plan.target_bases, plan.fraction, plan.mean_length, self.seed)?;
        let mut pairs = PairSynchronizer::new(
            RecordChannel::open(&input1, self.capacity)?,
            RecordChannel::open(&input2, self.capacity)?,
        );
        let mut writer = PairedWriter::create(output1, output2, &self.output)?;
        let real = sampler.run_paired(&mut pairs, &mut writer)?;
        writer.close()?;
        Ok(plan.summary(real))
    }
}

fn reject_stdin(path: &Path) -> Result<()> {
    if path.as_os_str() == "-" {
        return Err(FastxError::InvalidConfig(
            "sample reads its input twice and can not read from stdin".to_string(),
        ));
    }
    Ok(())
}

/// Copy a file byte for byte; `-` as output is stdout.
fn copy_verbatim(input: &Path, output: &Path) -> Result<u64> {
    let mut src = File::open(input).map_err(|source| FastxError::Open {
        path: input.to_path_buf(),
        source,
    })?;
    let copied = if output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let n = io::copy(&mut src, &mut handle)?;
        handle.flush()?;
        n
    } else {
        let mut dst = File::create(output).map_err(|source| FastxError::SinkOpen {
            path: output.to_path_buf(),
            source,
        })?;
        io::copy(&mut src, &mut dst)?
    };
    info!("fraction >= 1, copied {} bytes verbatim", copied);
    Ok(copied)
}
