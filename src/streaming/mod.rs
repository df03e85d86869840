//! Streaming record pipeline.
//!
//! This module provides the components shared by all record commands:
//! - A bounded producer/consumer channel with recycled record slots
//! - Lockstep pairing of two mate streams
//! - Record sinks (plain, gzip, in-memory)
//!
//! Memory use is bounded by the channel capacity, never by input size.

pub mod buffers;
pub mod channel;
pub mod output;
pub mod paired;

pub use buffers::DEFAULT_CHANNEL_CAPACITY;
pub use channel::{InlineSource, RecordChannel, RecordSource};
pub use output::{FastxWriter, PairedWriter, RecordSink};
pub use paired::PairSynchronizer;
