//! Lockstep reading of two mate files.

use crate::fastx::{FastxError, Result};
use crate::record::Record;
use crate::streaming::channel::RecordSource;

/// Pulls one record from each of two sources at a time.
///
/// The sources must hold the same number of records. When one ends before
/// the other a [`FastxError::PairMismatch`] is returned carrying the
/// full record counts, e.g. `read1: 4, read2: 5`. Mates are not checked by
/// name.
pub struct PairSynchronizer<A, B> {
    read1: A,
    read2: B,
    pairs: u64,
    finished: bool,
}

impl<A: RecordSource, B: RecordSource> PairSynchronizer<A, B> {
    pub fn new(read1: A, read2: B) -> Self {
        Self {
            read1,
            read2,
            pairs: 0,
            finished: false,
        }
    }

    /// Number of complete pairs delivered so far.
    pub fn pairs(&self) -> u64 {
        self.pairs
    }

    /// Next pair, `Ok(None)` when both sources end together.
    ///
    /// A fault from the first source is reported before one from the
    /// second. When one source ends early the other is read to its end so
    /// the mismatch carries both record counts. After a fault or mismatch
    /// both sources are stopped and every call returns `Ok(None)`.
    pub fn next(&mut self) -> Result<Option<(&Record, &Record)>> {
        if self.finished {
            return Ok(None);
        }
        let has1 = match self.read1.pull() {
            Ok(r) => r.is_some(),
            Err(e) => {
                self.stop();
                return Err(e);
            }
        };
        let has2 = match self.read2.pull() {
            Ok(r) => r.is_some(),
            Err(e) => {
                self.stop();
                return Err(e);
            }
        };

        match (has1, has2) {
            (true, true) => match (self.read1.current(), self.read2.current()) {
                (Some(a), Some(b)) => {
                    self.pairs += 1;
                    Ok(Some((a, b)))
                }
                _ => Ok(None),
            },
            (false, false) => {
                self.stop();
                Ok(None)
            }
            (true, false) => {
                let rest = drain(&mut self.read1);
                self.stop();
                Err(FastxError::PairMismatch {
                    read1: self.pairs + 1 + rest?,
                    read2: self.pairs,
                })
            }
            (false, true) => {
                let rest = drain(&mut self.read2);
                self.stop();
                Err(FastxError::PairMismatch {
                    read1: self.pairs,
                    read2: self.pairs + 1 + rest?,
                })
            }
        }
    }

    /// Stop both sources. Later calls to [`next`](Self::next) return
    /// `Ok(None)`.
    pub fn stop(&mut self) {
        self.finished = true;
        self.read1.stop();
        self.read2.stop();
    }
}

/// Count the records left in `source`.
fn drain<S: RecordSource>(source: &mut S) -> Result<u64> {
    let mut n = 0;
    while source.pull()?.is_some() {
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fastx::FastxReader;
    use crate::streaming::channel::{InlineSource, RecordChannel};
    use std::io::Cursor;

    fn fastq(prefix: &str, n: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..n {
            out.extend_from_slice(format!("@{}{}\nACG\n+\nIII\n", prefix, i).as_bytes());
        }
        out
    }

    fn channel(content: Vec<u8>) -> RecordChannel {
        RecordChannel::spawn(FastxReader::new(Cursor::new(content)), 4).unwrap()
    }

    #[test]
    fn test_equal_lengths() {
        let mut sync = PairSynchronizer::new(channel(fastq("a", 6)), channel(fastq("b", 6)));
        let mut n = 0;
        while let Some((r1, r2)) = sync.next().unwrap() {
            assert_eq!(r1.name_str(), format!("a{}", n));
            assert_eq!(r2.name_str(), format!("b{}", n));
            n += 1;
        }
        assert_eq!(n, 6);
        assert_eq!(sync.pairs(), 6);
        assert!(sync.next().unwrap().is_none());
    }

    #[test]
    fn test_read2_longer() {
        let a = fastq("a", 3);
        let b = fastq("b", 4);
        let mut sync = PairSynchronizer::new(InlineSource::from_bytes(&a), InlineSource::from_bytes(&b));
        for _ in 0..3 {
            assert!(sync.next().unwrap().is_some());
        }
        let err = sync.next().unwrap_err();
        assert!(matches!(err, FastxError::PairMismatch { read1: 3, read2: 4 }));
        assert!(sync.next().unwrap().is_none());
    }

    #[test]
    fn test_read1_longer() {
        let mut sync = PairSynchronizer::new(channel(fastq("a", 5)), channel(fastq("b", 4)));
        for _ in 0..4 {
            assert!(sync.next().unwrap().is_some());
        }
        let err = sync.next().unwrap_err();
        assert!(matches!(err, FastxError::PairMismatch { read1: 5, read2: 4 }));
        assert!(err.to_string().contains("Record number not equal"));
    }

    #[test]
    fn test_mismatch_counts_whole_longer_stream() {
        let mut sync = PairSynchronizer::new(channel(fastq("a", 10)), channel(fastq("b", 4)));
        for _ in 0..4 {
            assert!(sync.next().unwrap().is_some());
        }
        let err = sync.next().unwrap_err();
        assert!(matches!(err, FastxError::PairMismatch { read1: 10, read2: 4 }));
        assert!(err.to_string().contains("read1 has 10 records"));

        let a = fastq("a", 2);
        let b = fastq("b", 7);
        let mut sync = PairSynchronizer::new(InlineSource::from_bytes(&a), InlineSource::from_bytes(&b));
        while sync.next().is_ok_and(|p| p.is_some()) {}
        assert_eq!(sync.pairs(), 2);
    }

    #[test]
    fn test_mismatch_with_fault_in_tail() {
        let a = fastq("a", 1);
        let mut b = fastq("b", 3);
        b.extend_from_slice(b"@b3\nACG\n+\nI");
        let mut sync = PairSynchronizer::new(InlineSource::from_bytes(&a), InlineSource::from_bytes(&b));
        assert!(sync.next().unwrap().is_some());
        assert!(matches!(sync.next(), Err(FastxError::Malformed { .. })));
        assert!(sync.next().unwrap().is_none());
    }

    #[test]
    fn test_empty_pair() {
        let mut sync = PairSynchronizer::new(channel(Vec::new()), channel(Vec::new()));
        assert!(sync.next().unwrap().is_none());
    }

    #[test]
    fn test_fault_in_read1_reported_first() {
        let a = b"@a0\nACG\n+\nII".to_vec();
        let b = b"@b0\nACG\n+\nI".to_vec();
        let mut sync = PairSynchronizer::new(channel(a), channel(b));
        match sync.next().unwrap_err() {
            FastxError::Malformed { message, .. } => {
                assert!(message.contains("quality"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sync.next().unwrap().is_none());
    }
}
