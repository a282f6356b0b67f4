//! Length-prefixed block framing for the probabilistic output file.
//!
//! Every variant's probability payload is framed as one self-delimiting
//! block, optionally compressed through a pluggable [`Compressor`]. The
//! frame shapes are fixed by the target format:
//!
//! ```text
//! uncompressed:  uncompressed_size(4, LE) ‖ payload
//! compressed:    total_size(4, LE) ‖ uncompressed_size(4, LE) ‖ compressed
//! ```
//!
//! where `total_size = len(compressed) + 4`, covering the uncompressed-size
//! field. A compressor failure is fatal; the format records the compression
//! algorithm in the file header, so falling back to an uncompressed frame
//! would corrupt the file.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use zstd::Encoder as ZstdEncoder;

use crate::config::Compression;
use crate::error::{EncodeError, Result};

/// Zstd compression level, matching the block writers elsewhere in the stack
const ZSTD_LEVEL: i32 = 3;

/// Capability interface for the two supported block compression algorithms.
pub trait Compressor {
    /// Compresses `input`, appending to `output`.
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()>;
}

/// Zlib-stream compressor (algorithm code 1)
#[derive(Debug, Clone, Copy)]
pub struct ZlibCompressor {
    level: flate2::Compression,
}
impl ZlibCompressor {
    pub fn new() -> Self {
        Self {
            level: flate2::Compression::default(),
        }
    }
}
impl Default for ZlibCompressor {
    fn default() -> Self {
        Self::new()
    }
}
impl Compressor for ZlibCompressor {
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let mut encoder = ZlibEncoder::new(output, self.level);
        encoder
            .write_all(input)
            .and_then(|()| encoder.finish().map(|_| ()))
            .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;
        Ok(())
    }
}

/// Zstd compressor (algorithm code 2)
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}
impl ZstdCompressor {
    pub fn new() -> Self {
        Self { level: ZSTD_LEVEL }
    }
}
impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new()
    }
}
impl Compressor for ZstdCompressor {
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let run = || -> std::io::Result<()> {
            let mut encoder = ZstdEncoder::new(output, self.level)?;
            encoder.write_all(input)?;
            encoder.finish()?;
            Ok(())
        };
        run().map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;
        Ok(())
    }
}

/// Frames byte buffers as blocks, compressing through the compressor chosen
/// at construction, and tracks both sides of the size ledger.
pub struct BlockCodec {
    compressor: Option<Box<dyn Compressor + Send>>,
    /// Reusable compressed-bytes buffer
    zbuf: Vec<u8>,
    bytes_in: u64,
    bytes_out: u64,
}
impl BlockCodec {
    /// Codec for the configured algorithm; `Compression::None` frames raw.
    pub fn new(selector: Compression) -> Self {
        let compressor: Option<Box<dyn Compressor + Send>> = match selector {
            Compression::None => None,
            Compression::Zlib => Some(Box::new(ZlibCompressor::new())),
            Compression::Zstd => Some(Box::new(ZstdCompressor::new())),
        };
        Self {
            compressor,
            zbuf: Vec::new(),
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Frames `payload` into `out`, returning the framed length in bytes.
    pub fn encode<W: Write>(&mut self, payload: &[u8], out: &mut W) -> Result<usize> {
        let ulen =
            u32::try_from(payload.len()).map_err(|_| EncodeError::BlockTooLarge(payload.len()))?;
        let framed = match &mut self.compressor {
            None => {
                out.write_u32::<LittleEndian>(ulen)?;
                out.write_all(payload)?;
                4 + payload.len()
            }
            Some(compressor) => {
                self.zbuf.clear();
                compressor.compress(payload, &mut self.zbuf)?;
                let total = self
                    .zbuf
                    .len()
                    .checked_add(4)
                    .and_then(|t| u32::try_from(t).ok())
                    .ok_or(EncodeError::BlockTooLarge(self.zbuf.len()))?;
                out.write_u32::<LittleEndian>(total)?;
                out.write_u32::<LittleEndian>(ulen)?;
                out.write_all(&self.zbuf)?;
                8 + self.zbuf.len()
            }
        };
        self.bytes_in += u64::from(ulen);
        self.bytes_out += framed as u64;
        Ok(framed)
    }

    /// Total uncompressed payload bytes framed so far
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Total framed output bytes, length prefixes included
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }
}
