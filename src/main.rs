// Clippy allows
#![allow(clippy::too_many_arguments)]

//! fastx: streaming FASTA/FASTQ toolkit
//!
//! Usage: fastx <COMMAND> [OPTIONS]

use clap::{Args, Parser, Subcommand};
use log::debug;
use std::path::PathBuf;
use std::process;

use fastx_toolkit::commands::subseq::load_regions;
use fastx_toolkit::commands::{
    HeadCommand, HeadLimit, SampleCommand, SampleTarget, SplitCommand, SplitSize, SubseqCommand,
};
use fastx_toolkit::config::{
    OutputConfig, SizeSpec, DEFAULT_CHANNEL_CAPACITY, DEFAULT_COMPRESS_LEVEL, DEFAULT_SEED,
};
use fastx_toolkit::{FastxError, Result};

#[derive(Parser)]
#[command(name = "fastx")]
#[command(version)]
#[command(about = "Streaming FASTA/FASTQ toolkit: sample, split, head and subseq", long_about = None)]
struct Cli {
    /// Number of threads for the counting pre-pass (default: number of CPUs)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Output options shared by every command.
#[derive(Args, Clone, Copy)]
struct OutputArgs {
    /// Gzip level for .gz outputs (0-9)
    #[arg(short = 'l', long = "compress-level", default_value_t = DEFAULT_COMPRESS_LEVEL)]
    compress_level: u32,

    /// Use smaller output buffers
    #[arg(long)]
    low_memory: bool,
}

impl OutputArgs {
    fn config(self) -> OutputConfig {
        OutputConfig::new()
            .with_compress_level(self.compress_level)
            .with_low_memory(self.low_memory)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Randomly subsample reads to a base count or fraction
    Sample {
        /// Input FASTA/FASTQ file (read1 when paired)
        #[arg(short, long)]
        input: PathBuf,

        /// Read2 input file for paired mode
        #[arg(short = 'I', long)]
        input2: Option<PathBuf>,

        /// Output file (use - for stdout; .gz compresses)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Read2 output file for paired mode
        #[arg(short = 'O', long)]
        output2: Option<PathBuf>,

        /// Target number of bases (e.g. 500M, 1.5G)
        #[arg(short, long)]
        bases: Option<SizeSpec>,

        /// Fraction of bases to keep
        #[arg(short, long)]
        fraction: Option<f64>,

        /// Random seed
        #[arg(short, long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Record slots per input channel
        #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
        capacity: usize,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Split reads into chunks by read count, base count or chunk number
    Split {
        /// Input FASTA/FASTQ file (read1 when paired)
        #[arg(short, long)]
        input: PathBuf,

        /// Read2 input file for paired mode
        #[arg(short = 'I', long)]
        input2: Option<PathBuf>,

        /// Chunk prefix; chunks are named PREFIX.N.SUFFIX
        #[arg(short, long)]
        output: String,

        /// Read2 chunk prefix for paired mode
        #[arg(short = 'O', long)]
        output2: Option<String>,

        /// Reads per chunk
        #[arg(short, long)]
        reads: Option<SizeSpec>,

        /// Bases per chunk
        #[arg(short, long)]
        bases: Option<SizeSpec>,

        /// Number of chunks (split by bases)
        #[arg(short, long)]
        number: Option<u64>,

        /// Chunk file suffix (default: fastq.gz or fasta.gz)
        #[arg(long)]
        suffix: Option<String>,

        /// Record slots per input channel
        #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
        capacity: usize,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Keep the first reads or bases
    Head {
        /// Input FASTA/FASTQ file (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Read2 input file for paired mode
        #[arg(short = 'I', long)]
        input2: Option<PathBuf>,

        /// Output file (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Read2 output file for paired mode
        #[arg(short = 'O', long)]
        output2: Option<PathBuf>,

        /// Number of reads (pairs) to keep
        #[arg(short, long)]
        number: Option<SizeSpec>,

        /// Number of bases to keep
        #[arg(short, long)]
        bases: Option<SizeSpec>,

        /// Record slots per input channel
        #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
        capacity: usize,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Extract regions from an indexed FASTA file
    Subseq {
        /// Uncompressed FASTA file with a .fai index next to it
        /// (bgzip-compressed FASTA and FASTQ indexes are not supported)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Comma-separated regions: name, name:start-end (1-based)
        #[arg(short, long)]
        region: Option<String>,

        /// File of regions, one per line, or BED
        #[arg(short = 'R', long)]
        region_file: Option<PathBuf>,

        #[command(flatten)]
        out: OutputArgs,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Configure thread pool if --threads specified
    if let Some(n) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            eprintln!("Error: failed to initialize thread pool: {}", e);
            process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Sample {
            input,
            input2,
            output,
            output2,
            bases,
            fraction,
            seed,
            capacity,
            out,
        } => run_sample(
            input, input2, output, output2, bases, fraction, seed, capacity, out,
        ),

        Commands::Split {
            input,
            input2,
            output,
            output2,
            reads,
            bases,
            number,
            suffix,
            capacity,
            out,
        } => run_split(
            input, input2, output, output2, reads, bases, number, suffix, capacity, out,
        ),

        Commands::Head {
            input,
            input2,
            output,
            output2,
            number,
            bases,
            capacity,
            out,
        } => run_head(input, input2, output, output2, number, bases, capacity, out),

        Commands::Subseq {
            input,
            output,
            region,
            region_file,
            out,
        } => run_subseq(input, output, region, region_file, out),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Second output for paired mode; a second input without one is an error.
fn mate_output<T>(input2: &Option<PathBuf>, output2: Option<T>) -> Result<Option<T>> {
    match (input2, output2) {
        (Some(_), Some(o)) => Ok(Some(o)),
        (Some(_), None) => Err(FastxError::InvalidConfig(
            "paired input (-I) requires a read2 output (-O)".to_string(),
        )),
        (None, Some(_)) => Err(FastxError::InvalidConfig(
            "read2 output (-O) given without read2 input (-I)".to_string(),
        )),
        (None, None) => Ok(None),
    }
}

fn run_sample(
    input: PathBuf,
    input2: Option<PathBuf>,
    output: PathBuf,
    output2: Option<PathBuf>,
    bases: Option<SizeSpec>,
    fraction: Option<f64>,
    seed: u64,
    capacity: usize,
    out: OutputArgs,
) -> Result<()> {
    let target = SampleTarget::from_options(bases.map(|b| b.count), fraction)?;
    let cmd = SampleCommand::new(target)
        .with_seed(seed)
        .with_capacity(capacity)
        .with_output(out.config());

    let summary = match (input2.as_deref(), mate_output(&input2, output2)?) {
        (Some(input2), Some(output2)) => {
            cmd.run_paired(input.as_path(), input2, output.as_path(), output2.as_path())?
        }
        _ => cmd.run(&input, &output)?,
    };

    eprintln!("{}", summary);
    Ok(())
}

fn run_split(
    input: PathBuf,
    input2: Option<PathBuf>,
    prefix: String,
    prefix2: Option<String>,
    reads: Option<SizeSpec>,
    bases: Option<SizeSpec>,
    number: Option<u64>,
    suffix: Option<String>,
    capacity: usize,
    out: OutputArgs,
) -> Result<()> {
    let size = SplitSize::from_options(reads.map(|r| r.count), bases.map(|b| b.count), number)?;
    let mut cmd = SplitCommand::new(size)
        .with_capacity(capacity)
        .with_output(out.config());
    if let Some(suffix) = suffix {
        cmd = cmd.with_suffix(suffix);
    }

    let stats = match (input2.as_deref(), mate_output(&input2, prefix2)?) {
        (Some(input2), Some(prefix2)) => {
            cmd.run_paired(input.as_path(), input2, &prefix, &prefix2)?
        }
        _ => cmd.run(&input, &prefix)?,
    };

    debug!("split stats: {}", stats);
    Ok(())
}

fn run_head(
    input: PathBuf,
    input2: Option<PathBuf>,
    output: PathBuf,
    output2: Option<PathBuf>,
    number: Option<SizeSpec>,
    bases: Option<SizeSpec>,
    capacity: usize,
    out: OutputArgs,
) -> Result<()> {
    let limit = HeadLimit::from_options(number.map(|n| n.count), bases.map(|b| b.count))?;
    let cmd = HeadCommand::new(limit)
        .with_capacity(capacity)
        .with_output(out.config());

    match (input2.as_deref(), mate_output(&input2, output2)?) {
        (Some(input2), Some(output2)) => {
            cmd.run_paired(input.as_path(), input2, output.as_path(), output2.as_path())?;
        }
        _ => {
            cmd.run(&input, &output)?;
        }
    }
    Ok(())
}

fn run_subseq(
    input: PathBuf,
    output: PathBuf,
    region: Option<String>,
    region_file: Option<PathBuf>,
    out: OutputArgs,
) -> Result<()> {
    let regions = load_regions(region.as_deref(), region_file.as_deref())?;
    debug!("extracting {} regions from {}", regions.len(), input.display());
    SubseqCommand::new()
        .with_output(out.config())
        .run(&input, &regions, &output)?;
    Ok(())
}
