//! Streaming FASTA/FASTQ parser.
//!
//! [`FastxReader`] decodes one record at a time into a caller-owned
//! [`Record`], so the same buffers are refilled for every entry. FASTA
//! sequences may span several lines; FASTQ sequence and quality may too,
//! in which case quality lines are consumed until they match the sequence
//! length.
//!
//! The kind of the first record (FASTA or FASTQ) is fixed for the whole
//! stream. A later record of the other kind is a malformed-input error.

use crate::record::Record;
use crate::streaming::buffers::DEFAULT_INPUT_BUFFER;
use flate2::bufread::MultiGzDecoder;
use rayon::join;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading, sampling, splitting or extracting.
#[derive(Error, Debug)]
pub enum FastxError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Can not open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed input at record {record} (last read name was {last_name}): {message}")]
    Malformed {
        record: u64,
        last_name: String,
        message: String,
    },

    #[error(
        "Record number not equal for paired inputs: read1 has {read1} records, read2 has {read2} records"
    )]
    PairMismatch { read1: u64, read2: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Can not open {} for writing: {source}", .path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid region: {0}")]
    Region(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Record producer thread panicked")]
    ProducerPanicked,
}

pub type Result<T> = std::result::Result<T, FastxError>;

/// Kind of records carried by a stream, fixed by its first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Fasta,
    Fastq,
}

/// A streaming FASTA/FASTQ reader.
pub struct FastxReader<R: BufRead> {
    reader: R,
    line: Vec<u8>,
    header: Vec<u8>,
    header_ready: bool,
    kind: Option<RecordKind>,
    records: u64,
    last_name: Option<String>,
}

impl FastxReader<Box<dyn BufRead + Send>> {
    /// Open a (possibly gzip-compressed) file, or stdin for `-`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(open_input(path)?))
    }
}

impl<R: BufRead> FastxReader<R> {
    /// Create a new reader from any buffered source.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(1024),
            header: Vec::with_capacity(256),
            header_ready: false,
            kind: None,
            records: 0,
            last_name: None,
        }
    }

    /// Kind of the stream, known once the first record was read.
    pub fn kind(&self) -> Option<RecordKind> {
        self.kind
    }

    /// Number of records successfully decoded so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Name of the last successfully decoded record.
    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    /// Decode the next record into `record`.
    ///
    /// Returns `Ok(false)` at a clean end of input. On error the content of
    /// `record` is unspecified.
    pub fn read_into(&mut self, record: &mut Record) -> Result<bool> {
        if !self.header_ready && !self.next_header()? {
            return Ok(false);
        }
        self.header_ready = false;

        let kind = match self.header.first() {
            Some(b'>') => RecordKind::Fasta,
            Some(b'@') => RecordKind::Fastq,
            _ => return Err(self.malformed("expected '>' or '@' at start of record")),
        };
        match self.kind {
            None => self.kind = Some(kind),
            Some(k) if k != kind => {
                return Err(self.malformed("record kind differs from the first record of the stream"))
            }
            Some(_) => {}
        }

        record.clear();
        self.parse_header(record)?;

        match kind {
            RecordKind::Fasta => {
                record.qual = None;
                self.read_fasta_sequence(record)?;
            }
            RecordKind::Fastq => self.read_fastq_body(record)?,
        }

        self.records += 1;
        self.last_name = Some(record.name_str());
        Ok(true)
    }

    /// Read the next non-empty line into `self.header`.
    fn next_header(&mut self) -> Result<bool> {
        loop {
            if !self.next_line()? {
                return Ok(false);
            }
            if !self.line.is_empty() {
                std::mem::swap(&mut self.line, &mut self.header);
                return Ok(true);
            }
        }
    }

    /// Read one line into `self.line` without its terminator.
    fn next_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Ok(false);
        }
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Ok(true)
    }

    fn parse_header(&mut self, record: &mut Record) -> Result<()> {
        let body = &self.header[1..];
        let (name, comment) = match memchr::memchr2(b' ', b'\t', body) {
            Some(i) => (&body[..i], Some(trim_start(&body[i + 1..]))),
            None => (body, None),
        };
        if name.is_empty() {
            return Err(self.malformed("empty record name"));
        }
        record.name.extend_from_slice(name);
        match comment.filter(|c| !c.is_empty()) {
            Some(c) => record
                .comment
                .get_or_insert_with(Vec::new)
                .extend_from_slice(c),
            None => record.comment = None,
        }
        Ok(())
    }

    fn read_fasta_sequence(&mut self, record: &mut Record) -> Result<()> {
        while self.next_line()? {
            if self.line.first() == Some(&b'>') {
                std::mem::swap(&mut self.line, &mut self.header);
                self.header_ready = true;
                break;
            }
            record.seq.extend_from_slice(&self.line);
        }
        Ok(())
    }

    fn read_fastq_body(&mut self, record: &mut Record) -> Result<()> {
        loop {
            if !self.next_line()? {
                return Err(self.malformed("unexpected end of input before quality separator"));
            }
            if self.line.first() == Some(&b'+') {
                break;
            }
            record.seq.extend_from_slice(&self.line);
        }

        let qual = record.qual.get_or_insert_with(Vec::new);
        while qual.len() < record.seq.len() {
            self.line.clear();
            let n = self.reader.read_until(b'\n', &mut self.line)?;
            if n == 0 {
                return Err(self.malformed("quality string truncated"));
            }
            while matches!(self.line.last(), Some(b'\n' | b'\r')) {
                self.line.pop();
            }
            qual.extend_from_slice(&self.line);
        }
        if qual.len() != record.seq.len() {
            let message = format!(
                "quality length ({}) does not match sequence length ({})",
                qual.len(),
                record.seq.len()
            );
            return Err(self.malformed(&message));
        }
        Ok(())
    }

    fn malformed(&self, message: &str) -> FastxError {
        FastxError::Malformed {
            record: self.records + 1,
            last_name: self
                .last_name
                .clone()
                .unwrap_or_else(|| "<none>".to_string()),
            message: message.to_string(),
        }
    }
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    &bytes[skip..]
}

/// Wrap a buffered source, transparently decoding gzip if its magic
/// bytes are present.
fn maybe_gzip<R: BufRead + Send + 'static>(mut reader: R) -> io::Result<Box<dyn BufRead + Send>> {
    let is_gzip = {
        let buf = reader.fill_buf()?;
        buf.len() >= 2 && buf[0] == 0x1f && buf[1] == 0x8b
    };
    if is_gzip {
        Ok(Box::new(BufReader::with_capacity(
            DEFAULT_INPUT_BUFFER,
            MultiGzDecoder::new(reader),
        )))
    } else {
        Ok(Box::new(reader))
    }
}

/// Open an input path for reading; `-` is stdin.
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    if path.as_os_str() == "-" {
        let stdin = BufReader::with_capacity(DEFAULT_INPUT_BUFFER, io::stdin());
        return Ok(maybe_gzip(stdin)?);
    }
    let file = File::open(path).map_err(|source| FastxError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(maybe_gzip(BufReader::with_capacity(
        DEFAULT_INPUT_BUFFER,
        file,
    ))?)
}

/// Read and base counts of a stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadStats {
    pub reads: u64,
    pub bases: u64,
}

impl ReadStats {
    /// Mean record length, 0 for an empty stream.
    pub fn mean_length(&self) -> f64 {
        if self.reads == 0 {
            0.0
        } else {
            self.bases as f64 / self.reads as f64
        }
    }
}

/// Count records and bases of any reader.
pub fn count_reader<R: BufRead>(reader: &mut FastxReader<R>) -> Result<ReadStats> {
    let mut stats = ReadStats::default();
    let mut record = Record::new();
    while reader.read_into(&mut record)? {
        stats.reads += 1;
        stats.bases += record.len() as u64;
    }
    Ok(stats)
}

/// Count records and bases of a file.
pub fn count<P: AsRef<Path>>(path: P) -> Result<ReadStats> {
    let mut reader = FastxReader::from_path(path)?;
    count_reader(&mut reader)
}

/// Count both mates of a paired input concurrently.
///
/// Returns the summed reads and bases of both files. Unequal record
/// counts are a [`FastxError::PairMismatch`].
pub fn count_pair<P: AsRef<Path> + Sync>(read1: P, read2: P) -> Result<ReadStats> {
    let (r1, r2) = join(|| count(&read1), || count(&read2));
    let (r1, r2) = (r1?, r2?);
    if r1.reads != r2.reads {
        return Err(FastxError::PairMismatch {
            read1: r1.reads,
            read2: r2.reads,
        });
    }
    Ok(ReadStats {
        reads: r1.reads + r2.reads,
        bases: r1.bases + r2.bases,
    })
}

/// Parse all records from a byte slice (useful for testing).
pub fn parse_records(content: &[u8]) -> Result<Vec<Record>> {
    let mut reader = FastxReader::new(content);
    let mut records = Vec::new();
    let mut record = Record::new();
    while reader.read_into(&mut record)? {
        records.push(record.clone());
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_fastq() {
        let content = b"@r1 1:N:0\nACGT\n+\nIIII\n@r2\nGG\n+r2\nHH\n";
        let records = parse_records(content).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, b"r1");
        assert_eq!(records[0].comment.as_deref(), Some(&b"1:N:0"[..]));
        assert_eq!(records[0].seq, b"ACGT");
        assert_eq!(records[0].qual.as_deref(), Some(&b"IIII"[..]));
        assert_eq!(records[1].comment, None);
        assert_eq!(records[1].qual.as_deref(), Some(&b"HH"[..]));
    }

    #[test]
    fn test_parse_multiline_fasta() {
        let content = b">chr1 desc\nACGT\nTT\n\n>chr2\nGGG\n";
        let records = parse_records(content).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, b"ACGTTT");
        assert_eq!(records[0].comment.as_deref(), Some(&b"desc"[..]));
        assert!(!records[0].is_fastq());
        assert_eq!(records[1].seq, b"GGG");
    }

    #[test]
    fn test_crlf_line_endings() {
        let content = b"@r1\r\nAC\r\n+\r\nII\r\n";
        let records = parse_records(content).unwrap();
        assert_eq!(records[0].seq, b"AC");
        assert_eq!(records[0].qual.as_deref(), Some(&b"II"[..]));
    }

    #[test]
    fn test_multiline_quality() {
        let content = b"@r1\nACGT\nAC\n+\nIIII\nII\n@r2\nA\n+\n@\n";
        let records = parse_records(content).unwrap();
        assert_eq!(records[0].seq, b"ACGTAC");
        assert_eq!(records[0].qual.as_deref(), Some(&b"IIIIII"[..]));
        // quality starting with '@' is still quality
        assert_eq!(records[1].qual.as_deref(), Some(&b"@"[..]));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_records(b"").unwrap().is_empty());
        assert!(parse_records(b"\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_truncated_quality() {
        let content = b"@r1\nACGT\n+\nIIII\n@r2\nACGT\n+\nII";
        let err = parse_records(content).unwrap_err();
        match err {
            FastxError::Malformed {
                record, last_name, ..
            } => {
                assert_eq!(record, 2);
                assert_eq!(last_name, "r1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_quality_longer_than_sequence() {
        let err = parse_records(b"@r1\nAC\n+\nIII\n").unwrap_err();
        assert!(err.to_string().contains("quality length (3)"));
    }

    #[test]
    fn test_missing_separator() {
        let err = parse_records(b"@r1\nACGT\n").unwrap_err();
        assert!(matches!(err, FastxError::Malformed { .. }));
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let err = parse_records(b"@a\nAC\n+\nII\n>b\nAC\n").unwrap_err();
        assert!(err.to_string().contains("record kind differs"));
    }

    #[test]
    fn test_missing_marker() {
        let err = parse_records(b"ACGT\n").unwrap_err();
        assert!(err.to_string().contains("expected '>' or '@'"));
    }

    #[test]
    fn test_empty_name() {
        let err = parse_records(b">\nACGT\n").unwrap_err();
        assert!(err.to_string().contains("empty record name"));
    }

    #[test]
    fn test_reader_reuses_record() {
        let mut reader = FastxReader::new(&b">a desc\nAAAA\n>b\nCC\n"[..]);
        let mut rec = Record::new();
        assert!(reader.read_into(&mut rec).unwrap());
        assert_eq!(rec.comment.as_deref(), Some(&b"desc"[..]));
        assert!(reader.read_into(&mut rec).unwrap());
        assert_eq!(rec.name, b"b");
        assert_eq!(rec.seq, b"CC");
        assert_eq!(rec.comment, None);
        assert!(!reader.read_into(&mut rec).unwrap());
        assert_eq!(reader.records_read(), 2);
        assert_eq!(reader.kind(), Some(RecordKind::Fasta));
    }

    #[test]
    fn test_count_gzip_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let file = NamedTempFile::new().unwrap();
        {
            let mut enc = GzEncoder::new(file.reopen().unwrap(), Compression::default());
            enc.write_all(b"@r1\nACGT\n+\nIIII\n@r2\nAC\n+\nII\n").unwrap();
            enc.finish().unwrap();
        }

        let stats = count(file.path()).unwrap();
        assert_eq!(stats, ReadStats { reads: 2, bases: 6 });
    }

    #[test]
    fn test_count_pair_mismatch() {
        let mut a = NamedTempFile::new().unwrap();
        let mut b = NamedTempFile::new().unwrap();
        write!(a, ">a\nAC\n>b\nAC\n").unwrap();
        write!(b, ">a\nAC\n").unwrap();

        let err = count_pair(a.path(), b.path()).unwrap_err();
        assert!(matches!(
            err,
            FastxError::PairMismatch { read1: 2, read2: 1 }
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let err = count("/nonexistent/reads.fq").unwrap_err();
        assert!(matches!(err, FastxError::Open { .. }));
    }
}
