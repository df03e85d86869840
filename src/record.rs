//! Sequence record storage.
//!
//! A [`Record`] owns the byte buffers of one FASTA/FASTQ entry. Buffers are
//! cleared in place between reads so a record can be refilled many times
//! without reallocating.

use std::fmt;
use std::io::{self, Write};

/// One named sequence entry with optional comment and quality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Sequence name (text up to the first whitespace of the header)
    pub name: Vec<u8>,
    /// Rest of the header line after the name
    pub comment: Option<Vec<u8>>,
    /// Sequence symbols
    pub seq: Vec<u8>,
    /// Per-symbol quality, present iff the stream is FASTQ
    pub qual: Option<Vec<u8>>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a FASTA record.
    pub fn fasta(name: impl Into<Vec<u8>>, seq: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            seq: seq.into(),
            qual: None,
        }
    }

    /// Build a FASTQ record.
    pub fn fastq(
        name: impl Into<Vec<u8>>,
        seq: impl Into<Vec<u8>>,
        qual: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            comment: None,
            seq: seq.into(),
            qual: Some(qual.into()),
        }
    }

    /// Attach a comment.
    pub fn with_comment(mut self, comment: impl Into<Vec<u8>>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sequence length in bases.
    #[inline]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// True if the sequence is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// True if the record carries quality scores.
    #[inline]
    pub fn is_fastq(&self) -> bool {
        self.qual.is_some()
    }

    /// Name as lossy UTF-8, for diagnostics.
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Reset all fields while keeping buffer capacity.
    ///
    /// Comment and quality buffers are kept allocated but marked absent,
    /// so the next fill can reuse them.
    pub fn clear(&mut self) {
        self.name.clear();
        self.seq.clear();
        if let Some(c) = self.comment.as_mut() {
            c.clear();
        }
        if let Some(q) = self.qual.as_mut() {
            q.clear();
        }
    }

    /// Encode the record in FASTA or FASTQ text form.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(if self.is_fastq() { b"@" } else { b">" })?;
        writer.write_all(&self.name)?;
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            writer.write_all(b" ")?;
            writer.write_all(comment)?;
        }
        writer.write_all(b"\n")?;
        writer.write_all(&self.seq)?;
        writer.write_all(b"\n")?;
        if let Some(qual) = &self.qual {
            writer.write_all(b"+\n")?;
            writer.write_all(qual)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::with_capacity(self.name.len() + 2 * self.seq.len() + 8);
        self.write_to(&mut buf).map_err(|_| fmt::Error)?;
        // Drop the trailing newline so `{}` behaves like a single value
        buf.pop();
        write!(f, "{}", String::from_utf8_lossy(&buf))
    }
}

/// A record buffer tagged with its position in a channel's slot arena.
#[derive(Debug)]
pub struct RecordSlot {
    /// Arena position (0..capacity)
    pub index: usize,
    /// Backing storage
    pub record: Record,
}

impl RecordSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            record: Record::new(),
        }
    }
}
