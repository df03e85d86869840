//! Run configuration shared by the commands.
//!
//! Everything here is validated before any input is opened, so a bad
//! option never leaves a half-written output behind.

use crate::fastx::{FastxError, Result};
use crate::streaming::buffers::output_buffer_size;
use flate2::Compression;
use std::path::Path;
use std::str::FromStr;

pub use crate::streaming::buffers::DEFAULT_CHANNEL_CAPACITY;

/// Default gzip level for `.gz` outputs.
pub const DEFAULT_COMPRESS_LEVEL: u32 = 6;

/// Default seed of the subsampling random source.
pub const DEFAULT_SEED: u64 = 11;

/// A positive size with an optional K/M/G suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSpec {
    pub count: u64,
}

impl SizeSpec {
    /// Parse a size such as `"100"`, `"10k"` or `"1.5M"`.
    ///
    /// Suffixes are decimal (K = 1e3, M = 1e6, G = 1e9) and
    /// case-insensitive; fractional values are rounded to the nearest
    /// integer. Zero, negative and empty values are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || FastxError::InvalidConfig(format!("invalid size '{}'", s));
        if s.is_empty() {
            return Err(FastxError::InvalidConfig("size string is empty".to_string()));
        }

        let (num_part, multiplier) = match s.as_bytes()[s.len() - 1] {
            b'K' | b'k' => (&s[..s.len() - 1], 1e3),
            b'M' | b'm' => (&s[..s.len() - 1], 1e6),
            b'G' | b'g' => (&s[..s.len() - 1], 1e9),
            _ => (s, 1.0),
        };

        let count = match num_part.parse::<u64>() {
            Ok(n) if multiplier == 1.0 => n,
            _ => {
                let value: f64 = num_part.parse().map_err(|_| invalid())?;
                if !value.is_finite() || value < 0.0 {
                    return Err(invalid());
                }
                (value * multiplier).round() as u64
            }
        };

        if count == 0 {
            return Err(FastxError::InvalidConfig(format!(
                "size '{}' must be greater than 0",
                s
            )));
        }
        Ok(Self { count })
    }

}

impl FromStr for SizeSpec {
    type Err = FastxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Check a sampling fraction.
pub fn validate_fraction(fraction: f64) -> Result<f64> {
    if fraction.is_finite() && fraction > 0.0 {
        Ok(fraction)
    } else {
        Err(FastxError::InvalidConfig(format!(
            "fraction must be greater than 0, got {}",
            fraction
        )))
    }
}

/// Check a channel capacity.
pub fn validate_capacity(capacity: usize) -> Result<usize> {
    if capacity == 0 {
        Err(FastxError::InvalidConfig(
            "channel capacity must be at least 1".to_string(),
        ))
    } else {
        Ok(capacity)
    }
}

/// True if `path` names a gzip output.
pub fn is_gzip_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// How output files are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    /// gzip level (0-9), used for `.gz` paths only
    pub compress_level: u32,
    /// Use smaller write buffers
    pub low_memory: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compress_level: DEFAULT_COMPRESS_LEVEL,
            low_memory: false,
        }
    }
}

impl OutputConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compress_level(mut self, level: u32) -> Self {
        self.compress_level = level;
        self
    }

    pub fn with_low_memory(mut self, low_memory: bool) -> Self {
        self.low_memory = low_memory;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.compress_level > 9 {
            return Err(FastxError::InvalidConfig(format!(
                "compression level must be in 0..=9, got {}",
                self.compress_level
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn compression(&self) -> Compression {
        Compression::new(self.compress_level)
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        output_buffer_size(self.low_memory)
    }
}
