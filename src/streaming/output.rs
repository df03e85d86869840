//! Record output.
//!
//! A [`RecordSink`] accepts decoded records and serializes them. Closing a
//! sink consumes it, so a closed sink can never be written again. Paths
//! ending in `.gz` are gzip-compressed and `-` is stdout.

use crate::config::{is_gzip_path, OutputConfig};
use crate::fastx::{FastxError, Result};
use crate::record::Record;
use flate2::write::GzEncoder;
use log::trace;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Destination for decoded records.
pub trait RecordSink {
    /// Serialize one record.
    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Flush buffered data and release the destination.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// In-memory sink.
impl RecordSink for Vec<u8> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        record.write_to(self)?;
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

enum Encoder<W: Write> {
    Plain(BufWriter<W>),
    Gzip(BufWriter<GzEncoder<W>>),
}

/// Buffered FASTA/FASTQ writer, optionally gzip-compressed.
pub struct FastxWriter<W: Write> {
    encoder: Encoder<W>,
    records: u64,
    itoa_buf: itoa::Buffer,
}

impl FastxWriter<Box<dyn Write + Send>> {
    /// Create an output file; `.gz` paths are compressed and `-` is stdout.
    pub fn create<P: AsRef<Path>>(path: P, config: &OutputConfig) -> Result<Self> {
        let path = path.as_ref();
        let (output, compress): (Box<dyn Write + Send>, bool) = if path.as_os_str() == "-" {
            (Box::new(io::stdout()), false)
        } else {
            let file = File::create(path).map_err(|source| FastxError::SinkOpen {
                path: path.to_path_buf(),
                source,
            })?;
            (Box::new(file), is_gzip_path(path))
        };
        trace!("opened output {} (gzip: {})", path.display(), compress);
        Ok(Self::from_writer(output, config, compress))
    }
}

impl<W: Write> FastxWriter<W> {
    /// Wrap an existing writer.
    pub fn from_writer(output: W, config: &OutputConfig, compress: bool) -> Self {
        let capacity = config.buffer_size();
        let encoder = if compress {
            Encoder::Gzip(BufWriter::with_capacity(
                capacity,
                GzEncoder::new(output, config.compression()),
            ))
        } else {
            Encoder::Plain(BufWriter::with_capacity(capacity, output))
        };
        Self {
            encoder,
            records: 0,
            itoa_buf: itoa::Buffer::new(),
        }
    }

    /// Number of records written.
    pub fn records(&self) -> u64 {
        self.records
    }

    #[inline]
    fn writer(&mut self) -> &mut dyn Write {
        match &mut self.encoder {
            Encoder::Plain(w) => w,
            Encoder::Gzip(w) => w,
        }
    }

    /// Write a FASTA record from a header (without `>`) and a sequence.
    pub fn write_fasta(&mut self, header: &[u8], seq: &[u8]) -> Result<()> {
        let w = self.writer();
        w.write_all(b">")?;
        w.write_all(header)?;
        w.write_all(b"\n")?;
        w.write_all(seq)?;
        w.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    /// Write a FASTA record named `name:start-end`.
    pub fn write_region(&mut self, name: &[u8], start: u64, end: u64, seq: &[u8]) -> Result<()> {
        let mut header = Vec::with_capacity(name.len() + 24);
        header.extend_from_slice(name);
        header.push(b':');
        header.extend_from_slice(self.itoa_buf.format(start).as_bytes());
        header.push(b'-');
        header.extend_from_slice(self.itoa_buf.format(end).as_bytes());
        self.write_fasta(&header, seq)
    }

    /// Flush and return the underlying writer.
    pub fn finish(self) -> Result<W> {
        match self.encoder {
            Encoder::Plain(w) => {
                let mut inner = w.into_inner().map_err(|e| FastxError::Io(e.into_error()))?;
                inner.flush()?;
                Ok(inner)
            }
            Encoder::Gzip(w) => {
                let encoder = w.into_inner().map_err(|e| FastxError::Io(e.into_error()))?;
                let mut inner = encoder.finish()?;
                inner.flush()?;
                Ok(inner)
            }
        }
    }
}

impl<W: Write> RecordSink for FastxWriter<W> {
    #[inline]
    fn write_record(&mut self, record: &Record) -> Result<()> {
        record.write_to(self.writer())?;
        self.records += 1;
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.finish().map(|_| ())
    }
}

/// A pair of sinks receiving mates in lockstep.
pub struct PairedWriter<S: RecordSink> {
    pub read1: S,
    pub read2: S,
}

impl<S: RecordSink> PairedWriter<S> {
    pub fn new(read1: S, read2: S) -> Self {
        Self { read1, read2 }
    }

    #[inline]
    pub fn write_pair(&mut self, r1: &Record, r2: &Record) -> Result<()> {
        self.read1.write_record(r1)?;
        self.read2.write_record(r2)
    }

    /// Close both sinks. The second is closed even if the first fails.
    pub fn close(self) -> Result<()> {
        let first = self.read1.close();
        let second = self.read2.close();
        first.and(second)
    }
}

impl PairedWriter<FastxWriter<Box<dyn Write + Send>>> {
    /// Create both mate outputs.
    pub fn create<P: AsRef<Path>>(read1: P, read2: P, config: &OutputConfig) -> Result<Self> {
        Ok(Self::new(
            FastxWriter::create(read1, config)?,
            FastxWriter::create(read2, config)?,
        ))
    }
}
