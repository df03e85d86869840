//! Random access to indexed FASTA files.
//!
//! A `.fai` index has one tab-separated line per sequence:
//!
//! ```text
//! NAME  LENGTH  OFFSET  LINEBASES  LINEWIDTH
//! ```
//!
//! `OFFSET` is the byte position of the first base, `LINEBASES` the bases
//! per full line and `LINEWIDTH` the bytes per line including the line
//! terminator. With those, the byte position of any base is computed
//! directly and a region is sliced out of a memory map of the sequence
//! file. Only plain FASTA is supported: FASTQ indexes (a sixth
//! `QUALOFFSET` column) and compressed sequence files are rejected.

use crate::fastx::{FastxError, Result};
use memmap2::Mmap;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One sequence of a `.fai` index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaiEntry {
    pub name: String,
    /// Sequence length in bases
    pub length: u64,
    /// Byte offset of the first base
    pub offset: u64,
    /// Bases per line
    pub line_bases: u64,
    /// Bytes per line, terminator included
    pub line_width: u64,
}

impl FaiEntry {
    /// Parse `NAME\tLENGTH\tOFFSET\tLINEBASES\tLINEWIDTH`.
    pub fn from_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() == 6 {
            return Err(FastxError::Index(format!(
                "{} is a FASTQ index entry; only FASTA indexes are supported",
                fields[0]
            )));
        }
        if fields.len() != 5 {
            return Err(FastxError::Index(format!(
                "expected 5 fields, got {} in line '{}'",
                fields.len(),
                line
            )));
        }
        let number = |i: usize, what: &str| -> Result<u64> {
            fields[i].trim().parse::<u64>().map_err(|_| {
                FastxError::Index(format!("invalid {} '{}' for {}", what, fields[i], fields[0]))
            })
        };

        let entry = Self {
            name: fields[0].to_string(),
            length: number(1, "LENGTH")?,
            offset: number(2, "OFFSET")?,
            line_bases: number(3, "LINEBASES")?,
            line_width: number(4, "LINEWIDTH")?,
        };
        if entry.name.is_empty() {
            return Err(FastxError::Index("empty sequence name".to_string()));
        }
        if entry.line_bases == 0 || entry.line_width < entry.line_bases {
            return Err(FastxError::Index(format!(
                "bad line geometry for {}: {} bases in {} bytes",
                entry.name, entry.line_bases, entry.line_width
            )));
        }
        Ok(entry)
    }

    /// Byte offset of the base at 0-based `position`.
    #[inline]
    pub fn base_offset(&self, position: u64) -> u64 {
        self.offset + (position / self.line_bases) * self.line_width + position % self.line_bases
    }
}

/// A parsed `.fai` index.
#[derive(Debug, Clone, Default)]
pub struct FaiIndex {
    entries: Vec<FaiEntry>,
    by_name: FxHashMap<String, usize>,
}

impl FaiIndex {
    /// Load an index file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| FastxError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse an index from any buffered source. Blank lines are ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = Self::default();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let entry = FaiEntry::from_line(line)?;
            if index.by_name.contains_key(&entry.name) {
                return Err(FastxError::Index(format!(
                    "duplicate sequence name {}",
                    entry.name
                )));
            }
            index.by_name.insert(entry.name.clone(), index.entries.len());
            index.entries.push(entry);
        }
        Ok(index)
    }

    pub fn get(&self, name: &str) -> Option<&FaiEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// Entries in file order.
    pub fn entries(&self) -> &[FaiEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source of subsequences by name and 0-based half-open interval.
pub trait RegionExtractor {
    /// Bases of `name` in `[start, end)`.
    ///
    /// `end` is clamped to the sequence length. An unknown name, a start
    /// at or past the end of the sequence, or an empty interval is an
    /// error.
    fn fetch(&self, name: &str, start: u64, end: u64) -> Result<Vec<u8>>;

    /// Original header line of `name` (name and comment, without `>`).
    fn header_line(&self, name: &str) -> Result<Vec<u8>>;
}

/// A memory-mapped FASTA file with its `.fai` index.
pub struct IndexedFasta {
    data: Mmap,
    index: FaiIndex,
    path: PathBuf,
}

impl IndexedFasta {
    /// Open `fasta` with the index at `<fasta>.fai`.
    pub fn open<P: AsRef<Path>>(fasta: P) -> Result<Self> {
        let fasta = fasta.as_ref();
        let mut fai = fasta.as_os_str().to_owned();
        fai.push(".fai");
        Self::open_with_index(fasta, PathBuf::from(fai))
    }

    /// Open `fasta` with an explicit index path.
    pub fn open_with_index<P: AsRef<Path>, Q: AsRef<Path>>(fasta: P, fai: Q) -> Result<Self> {
        let path = fasta.as_ref().to_path_buf();
        let index = FaiIndex::from_path(fai)?;
        let file = File::open(&path).map_err(|source| FastxError::Open {
            path: path.clone(),
            source,
        })?;
        // SAFETY: the map is read-only; the file must not be truncated
        // while it is open, as with any mmap-based reader.
        let data = unsafe { Mmap::map(&file)? };
        if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
            return Err(FastxError::Index(format!(
                "{} is compressed; region extraction needs an uncompressed FASTA",
                path.display()
            )));
        }
        Ok(Self { data, index, path })
    }

    pub fn index(&self) -> &FaiIndex {
        &self.index
    }

    fn entry(&self, name: &str) -> Result<&FaiEntry> {
        self.index.get(name).ok_or_else(|| {
            FastxError::Region(format!(
                "sequence {} not found in index of {}",
                name,
                self.path.display()
            ))
        })
    }

    fn slice(&self, from: u64, to: u64) -> Result<&[u8]> {
        let len = self.data.len() as u64;
        if from > to || to > len {
            return Err(FastxError::Index(format!(
                "index points past the end of {} ({} > {})",
                self.path.display(),
                to,
                len
            )));
        }
        Ok(&self.data[from as usize..to as usize])
    }
}

impl RegionExtractor for IndexedFasta {
    fn fetch(&self, name: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let entry = self.entry(name)?;
        let end = end.min(entry.length);
        if start >= entry.length || start >= end {
            return Err(FastxError::Region(format!(
                "{}:{}-{} is outside the sequence (length {})",
                name,
                start + 1,
                end,
                entry.length
            )));
        }

        let raw = self.slice(entry.base_offset(start), entry.base_offset(end - 1) + 1)?;
        let mut seq = Vec::with_capacity((end - start) as usize);
        seq.extend(raw.iter().copied().filter(|&b| b != b'\n' && b != b'\r'));
        if seq.len() as u64 != end - start {
            return Err(FastxError::Index(format!(
                "expected {} bases for {}:{}-{}, found {}",
                end - start,
                name,
                start + 1,
                end,
                seq.len()
            )));
        }
        Ok(seq)
    }

    fn header_line(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.entry(name)?;
        let head = self.slice(0, entry.offset)?;
        let mut end = head.len();
        if head.last() == Some(&b'\n') {
            end -= 1;
        }
        if end > 0 && head[end - 1] == b'\r' {
            end -= 1;
        }
        let start = memchr::memrchr(b'\n', &head[..end]).map_or(0, |i| i + 1);
        match head[start..end].split_first() {
            Some((b'>', line)) => Ok(line.to_vec()),
            _ => Err(FastxError::Index(format!(
                "no header line found before sequence {}",
                name
            ))),
        }
    }
}
