//! Subseq command implementation.
//!
//! Extracts named regions from an indexed FASTA file. Regions are given as
//! `name`, `name:start-end` (1-based, inclusive) or tab-separated BED
//! lines (0-based, half-open), either on the command line or in a file.

use crate::config::OutputConfig;
use crate::fastx::{FastxError, Result};
use crate::index::{IndexedFasta, RegionExtractor};
use crate::streaming::FastxWriter;
use log::{debug, info};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;

/// A sequence interval, 0-based half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub start: u64,
    /// `None` selects up to the end of the sequence
    pub end: Option<u64>,
}

impl Region {
    /// The whole of sequence `name`.
    pub fn whole(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 0,
            end: None,
        }
    }

    pub fn new(name: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            name: name.into(),
            start,
            end: Some(end),
        }
    }

    /// True if the region covers a whole sequence by name.
    pub fn is_whole(&self) -> bool {
        self.start == 0 && self.end.is_none()
    }

    /// Parse one region: a BED line if it has tabs, `name:start-end` if
    /// the part after the last `:` is a range, otherwise a bare name.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim_end_matches(['\r', '\n']);
        if s.contains('\t') {
            return Self::from_bed_line(s);
        }
        let s = s.trim();
        if s.is_empty() {
            return Err(FastxError::Region("empty region".to_string()));
        }
        match s.rsplit_once(':') {
            Some((name, range)) if !name.is_empty() && range.contains('-') => {
                Self::from_range(name, range, s)
            }
            _ => Ok(Self::whole(s)),
        }
    }

    fn from_range(name: &str, range: &str, original: &str) -> Result<Self> {
        let malformed = || FastxError::Region(format!("malformed region {}", original));
        let (start, end) = range.split_once('-').ok_or_else(malformed)?;
        let start: u64 = start.trim().parse().map_err(|_| malformed())?;
        let end: u64 = end.trim().parse().map_err(|_| malformed())?;
        if start == 0 || end < start {
            return Err(FastxError::Region(format!(
                "{} must satisfy 1 <= start <= end",
                original
            )));
        }
        Ok(Self::new(name, start - 1, end))
    }

    /// Parse `name\tstart\tend[\t...]`.
    pub fn from_bed_line(line: &str) -> Result<Self> {
        let malformed = || FastxError::Region(format!("malformed bed line {}", line));
        let mut fields = line.split('\t');
        let name = fields.next().filter(|n| !n.is_empty()).ok_or_else(malformed)?;
        let start: u64 = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(malformed)?;
        let end: u64 = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(malformed)?;
        if end <= start {
            return Err(FastxError::Region(format!(
                "bed interval {} has end <= start",
                line
            )));
        }
        Ok(Self::new(name, start, end))
    }
}

impl FromStr for Region {
    type Err = FastxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}:{}-{}", self.name, self.start + 1, end),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Parse a comma-separated region list.
pub fn parse_region_list(list: &str) -> Result<Vec<Region>> {
    list.split(',')
        .filter(|r| !r.trim().is_empty())
        .map(Region::parse)
        .collect()
}

/// Read regions from a file, one per line. Blank lines and BED
/// `#`/`track`/`browser` lines are skipped.
pub fn read_region_file<P: AsRef<Path>>(path: P) -> Result<Vec<Region>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FastxError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut regions = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            continue;
        }
        regions.push(Region::parse(&line)?);
    }
    Ok(regions)
}

/// Regions from either `-r` or `-R`, never both.
pub fn load_regions(list: Option<&str>, file: Option<&Path>) -> Result<Vec<Region>> {
    let regions = match (list, file) {
        (Some(_), Some(_)) => {
            return Err(FastxError::InvalidConfig(
                "--region and --region-file can not be used together".to_string(),
            ))
        }
        (Some(list), None) => parse_region_list(list)?,
        (None, Some(file)) => read_region_file(file)?,
        (None, None) => {
            return Err(FastxError::InvalidConfig(
                "regions must be given by --region or --region-file".to_string(),
            ))
        }
    };
    if regions.is_empty() {
        return Err(FastxError::InvalidConfig("no regions given".to_string()));
    }
    Ok(regions)
}

/// Statistics from a subseq run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubseqStats {
    pub regions: u64,
    pub bases: u64,
}

impl fmt::Display for SubseqStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} regions, {} bases", self.regions, self.bases)
    }
}

/// Write every region as a FASTA record.
///
/// When all regions are bare names the original header lines are kept;
/// otherwise records are named `name:start-end` (1-based, inclusive,
/// clamped to the sequence).
pub fn extract_regions<E: RegionExtractor, W: Write>(
    extractor: &E,
    regions: &[Region],
    writer: &mut FastxWriter<W>,
) -> Result<SubseqStats> {
    let name_list = regions.iter().all(Region::is_whole);
    let mut stats = SubseqStats::default();

    for region in regions {
        let seq = extractor.fetch(&region.name, region.start, region.end.unwrap_or(u64::MAX))?;
        let end = region.start + seq.len() as u64;
        if name_list {
            let header = extractor.header_line(&region.name)?;
            writer.write_fasta(&header, &seq)?;
        } else {
            writer.write_region(region.name.as_bytes(), region.start + 1, end, &seq)?;
        }
        debug!("extracted {} ({} bases)", region, seq.len());
        stats.regions += 1;
        stats.bases += seq.len() as u64;
    }
    Ok(stats)
}

/// Subseq command configuration.
#[derive(Debug, Clone, Default)]
pub struct SubseqCommand {
    pub output: OutputConfig,
}

impl SubseqCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    /// Extract `regions` from `fasta` (indexed by `<fasta>.fai`) into
    /// `output`; `-` is stdout.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        fasta: P,
        regions: &[Region],
        output: Q,
    ) -> Result<SubseqStats> {
        self.output.validate()?;
        if regions.is_empty() {
            return Err(FastxError::InvalidConfig("no regions given".to_string()));
        }
        let indexed = IndexedFasta::open(fasta)?;
        let mut writer = FastxWriter::create(output, &self.output)?;
        let stats = extract_regions(&indexed, regions, &mut writer)?;
        writer.finish()?;
        info!("wrote {}", stats);
        Ok(stats)
    }
}
