// Clippy allows for the whole crate
#![allow(clippy::should_implement_trait)]
#![allow(clippy::type_complexity)]

//! fastx-toolkit: streaming FASTA/FASTQ utilities
//!
//! Records are decoded on a producer thread and handed to the consumer
//! through a bounded channel of reusable record slots. Paired inputs are
//! read in lockstep, so mates always stay aligned.
//!
//! # Features
//!
//! - **Bounded streaming**: memory stays flat regardless of input size
//! - **Early stop**: readers are released as soon as a command has enough
//! - **Gzip in and out**: detected by magic bytes on input, `.gz` on output
//!
//! # Example
//!
//! ```rust,no_run
//! use fastx_toolkit::commands::{SampleCommand, SampleTarget};
//!
//! // Keep about a quarter of the bases
//! let cmd = SampleCommand::new(SampleTarget::Fraction(0.25)).with_seed(7);
//! let summary = cmd.run("reads.fq.gz", "sampled.fq.gz").unwrap();
//! eprintln!("{}", summary);
//! ```

pub mod commands;
pub mod config;
pub mod fastx;
pub mod index;
pub mod record;
pub mod streaming;

// Re-export commonly used types
pub use fastx::{count, count_pair, FastxError, FastxReader, ReadStats, Result};
pub use index::{FaiIndex, IndexedFasta, RegionExtractor};
pub use record::{Record, RecordSlot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{
        HeadCommand, HeadLimit, SampleCommand, SampleTarget, SplitCommand, SplitSize,
        SubseqCommand,
    };
    pub use crate::config::OutputConfig;
    pub use crate::fastx::{FastxError, Result};
    pub use crate::record::Record;
    pub use crate::streaming::{
        FastxWriter, PairSynchronizer, PairedWriter, RecordChannel, RecordSink, RecordSource,
    };
}
