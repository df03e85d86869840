//! Command implementations for fastx-toolkit.

pub mod head;
pub mod sample;
pub mod split;
pub mod subseq;

pub use head::{HeadCommand, HeadLimit, HeadStats};
pub use sample::{SampleCommand, SampleTarget, Sampler, SubsampleState, SubsampleSummary};
pub use split::{Chunker, SplitCommand, SplitSize, SplitStats, SplitThreshold};
pub use subseq::{Region, SubseqCommand, SubseqStats};
