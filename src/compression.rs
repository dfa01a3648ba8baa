//! Entropy stage shared by the video codecs
//!
//! Thin wrapper over `flate2` deflate streams. Codecs compress their
//! residual buffers through here and record the [`CompressionType`] in their
//! payload header so a decoder knows whether to inflate.
//!
//! # Examples
//!
//! ```
//! use openigtlink_devices::compression::{compress, decompress, CompressionLevel, CompressionType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let residuals = vec![0u8; 10_000];
//! let packed = compress(&residuals, CompressionType::Deflate, CompressionLevel::Fast)?;
//! assert!(packed.len() < residuals.len());
//! assert_eq!(decompress(&packed, CompressionType::Deflate, residuals.len())?, residuals);
//! # Ok(())
//! # }
//! ```

use crate::error::{IgtlError, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use tracing::trace;

/// Entropy coder applied to a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// Stored as-is
    None = 0,
    /// Raw deflate stream
    Deflate = 1,
}

impl CompressionType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Deflate => "deflate",
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Deflate),
            other => Err(IgtlError::DecodeFailed(format!(
                "Unknown entropy mode {}",
                other
            ))),
        }
    }
}

/// Speed/ratio trade-off for deflate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Level 1
    Fast,
    /// Level 6
    #[default]
    Default,
    /// Level 9
    Best,
}

impl CompressionLevel {
    fn to_flate2(self) -> Compression {
        match self {
            Self::Fast => Compression::fast(),
            Self::Default => Compression::default(),
            Self::Best => Compression::best(),
        }
    }
}

/// Compress `data` with the given coder
pub fn compress(
    data: &[u8],
    compression_type: CompressionType,
    level: CompressionLevel,
) -> Result<Vec<u8>> {
    let out = match compression_type {
        CompressionType::None => data.to_vec(),
        CompressionType::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), level.to_flate2());
            encoder
                .write_all(data)
                .map_err(|e| IgtlError::EncodeFailed(format!("Deflate failed: {}", e)))?;
            encoder
                .finish()
                .map_err(|e| IgtlError::EncodeFailed(format!("Deflate finish failed: {}", e)))?
        }
    };

    trace!(
        compression_type = compression_type.name(),
        level = ?level,
        original_size = data.len(),
        compressed_size = out.len(),
        "Compressed payload"
    );
    Ok(out)
}

/// Reverse [`compress`]
///
/// At most `max_len` bytes are produced. Longer output fails with
/// [`IgtlError::DecodeFailed`].
pub fn decompress(
    data: &[u8],
    compression_type: CompressionType,
    max_len: usize,
) -> Result<Vec<u8>> {
    let out = match compression_type {
        CompressionType::None => data.to_vec(),
        CompressionType::Deflate => {
            let mut decoder = DeflateDecoder::new(data).take(max_len as u64 + 1);
            let mut out = Vec::with_capacity(max_len.min(data.len().saturating_mul(4)));
            decoder
                .read_to_end(&mut out)
                .map_err(|e| IgtlError::DecodeFailed(format!("Inflate failed: {}", e)))?;
            out
        }
    };
    if out.len() > max_len {
        return Err(IgtlError::DecodeFailed(format!(
            "Payload expands beyond {} bytes",
            max_len
        )));
    }

    trace!(
        compression_type = compression_type.name(),
        compressed_size = data.len(),
        decompressed_size = out.len(),
        "Decompressed payload"
    );
    Ok(out)
}
