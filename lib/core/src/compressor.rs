//! Compressed-length oracles
//!
//! The distance engine never looks inside a compressor. It only asks for the
//! length of an item under one of three modes: standard, fast, or given a
//! precomputed per-item statistic.

use crate::{Error, Result};
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Which oracle mode to use for individual and joint lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthMode {
    #[default]
    Standard,
    /// Cheaper, possibly less precise lengths
    Fast,
}

/// A compressed-length oracle.
///
/// Implementations must be referentially transparent: the same input always
/// yields the same length.
pub trait Compressor: Send + Sync {
    /// Compressed length of `data` in the default mode
    fn compressed_len(&self, data: &[u8]) -> Result<f64>;

    /// Cheaper approximation of [`Compressor::compressed_len`]
    fn compressed_len_fast(&self, data: &[u8]) -> Result<f64> {
        self.compressed_len(data)
    }

    /// Length estimated from an auxiliary precomputed statistic.
    ///
    /// The default treats `prior` as the item's already-known compressed length.
    fn compressed_len_given_prior(&self, data: &[u8], prior: f64) -> Result<f64> {
        let _ = data;
        Ok(prior)
    }
}

impl<C: Compressor + ?Sized> Compressor for &C {
    fn compressed_len(&self, data: &[u8]) -> Result<f64> {
        (**self).compressed_len(data)
    }

    fn compressed_len_fast(&self, data: &[u8]) -> Result<f64> {
        (**self).compressed_len_fast(data)
    }

    fn compressed_len_given_prior(&self, data: &[u8], prior: f64) -> Result<f64> {
        (**self).compressed_len_given_prior(data, prior)
    }
}

/// Reject lengths that would corrupt a neighbor ranking
#[inline]
pub fn validate_len(len: f64) -> Result<f64> {
    if len.is_finite() && len >= 0.0 {
        Ok(len)
    } else {
        Err(Error::OracleFailure(format!("invalid compressed length {}", len)))
    }
}

/// Container format produced by [`DeflateCompressor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionFormat {
    #[default]
    Gzip,
    Zlib,
    Deflate,
}

/// DEFLATE-family compressor backed by flate2
#[derive(Debug, Clone, Copy)]
pub struct DeflateCompressor {
    format: CompressionFormat,
    level: Compression,
}

impl DeflateCompressor {
    pub const MAX_LEVEL: u32 = 9;

    pub fn new(format: CompressionFormat, level: u32) -> Result<Self> {
        if level > Self::MAX_LEVEL {
            return Err(Error::InvalidConfig(format!(
                "compression level must be in 0..={}, got {}",
                Self::MAX_LEVEL,
                level
            )));
        }
        Ok(Self {
            format,
            level: Compression::new(level),
        })
    }

    /// Gzip at maximum compression
    pub fn gzip() -> Self {
        Self {
            format: CompressionFormat::Gzip,
            level: Compression::best(),
        }
    }

    pub fn format(&self) -> CompressionFormat {
        self.format
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }

    fn encoded_len(&self, data: &[u8], level: Compression) -> std::io::Result<usize> {
        let encoded = match self.format {
            CompressionFormat::Gzip => {
                let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
            CompressionFormat::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
            CompressionFormat::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
        };
        Ok(encoded.len())
    }
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self::gzip()
    }
}

impl Compressor for DeflateCompressor {
    fn compressed_len(&self, data: &[u8]) -> Result<f64> {
        self.encoded_len(data, self.level)
            .map(|len| len as f64)
            .map_err(|e| Error::OracleFailure(e.to_string()))
    }

    fn compressed_len_fast(&self, data: &[u8]) -> Result<f64> {
        self.encoded_len(data, Compression::fast())
            .map(|len| len as f64)
            .map_err(|e| Error::OracleFailure(e.to_string()))
    }
}

/// Precompute per-item lengths, e.g. as the statistic for given-prior mode
pub fn compressed_lengths<C, I>(compressor: &C, items: &[I], mode: LengthMode) -> Result<Vec<f64>>
where
    C: Compressor + ?Sized,
    I: AsRef<[u8]>,
{
    items
        .iter()
        .map(|item| {
            let len = match mode {
                LengthMode::Standard => compressor.compressed_len(item.as_ref())?,
                LengthMode::Fast => compressor.compressed_len_fast(item.as_ref())?,
            };
            validate_len(len)
        })
        .collect()
}
