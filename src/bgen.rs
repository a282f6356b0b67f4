//! Header and record framing for the probabilistic genotype file.
//!
//! The file opens with a fixed header whose variant-count and sample-count
//! fields are written as zero placeholders and patched in place on clean
//! completion — a truncated file is therefore detectable by totals that
//! still read zero. An optional sample-identifier block follows the header;
//! after that, one identifying-data record plus one framed probability block
//! per variant.
//!
//! ```text
//! ┌──────────────────────────┐
//! │ block offset      (4)    │
//! │ header length     (4)    │
//! │ variant count     (4)    │  ← patched on finish
//! │ sample count      (4)    │  ← patched on finish
//! │ magic "bgen"      (4)    │
//! │ flag word         (4)    │
//! ├──────────────────────────┤
//! │ sample identifiers (opt) │
//! ├──────────────────────────┤
//! │ variant id data ‖ block  │  × variant count
//! └──────────────────────────┘
//! ```

use std::io::{Seek, SeekFrom, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::config::Compression;
use crate::error::{EncodeError, Result};

/// Magic tag for file identification: "bgen" in ASCII
const MAGIC: u32 = 0x6e65_6762;

/// Length of the fixed header, excluding the leading block-offset word
const HEADER_LENGTH: u32 = 20;

/// Flag bit marking that a sample-identifier block is present
const FLAG_SAMPLE_IDENTIFIERS: u32 = 1 << 3;

/// Absolute file offset of the variant-count placeholder
pub const VARIANT_COUNT_OFFSET: u64 = 8;

/// Absolute file offset of the sample-count placeholder
pub const SAMPLE_COUNT_OFFSET: u64 = 12;

/// Offset of the minimum-ploidy byte within a probability payload
pub const MIN_PLOIDY_OFFSET: usize = 6;

/// Offset of the maximum-ploidy byte within a probability payload
pub const MAX_PLOIDY_OFFSET: usize = 7;

/// Bits per probability value; the only depth this encoder emits
pub const BIT_DEPTH: u8 = 8;

/// File header for the probabilistic genotype output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgenHeader {
    pub compression: Compression,
}
impl BgenHeader {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    /// Writes the header, with zero placeholders for both totals, followed
    /// by the sample-identifier block when `samples` is supplied.
    pub fn write_initial<W: Write>(&self, samples: Option<&[String]>, writer: &mut W) -> Result<()> {
        let sample_block_len = match samples {
            Some(samples) => {
                let body: usize = samples.iter().map(|s| 2 + s.len()).sum();
                u32::try_from(8 + body).map_err(|_| EncodeError::BlockTooLarge(body))?
            }
            None => 0,
        };
        let mut flags = self.compression.code();
        if samples.is_some() {
            flags |= FLAG_SAMPLE_IDENTIFIERS;
        }

        writer.write_u32::<LittleEndian>(HEADER_LENGTH + sample_block_len)?;
        writer.write_u32::<LittleEndian>(HEADER_LENGTH)?;
        writer.write_u32::<LittleEndian>(0)?; // variant count, patched on finish
        writer.write_u32::<LittleEndian>(0)?; // sample count, patched on finish
        writer.write_u32::<LittleEndian>(MAGIC)?;
        writer.write_u32::<LittleEndian>(flags)?;

        if let Some(samples) = samples {
            writer.write_u32::<LittleEndian>(sample_block_len)?;
            writer.write_u32::<LittleEndian>(samples.len() as u32)?;
            for sample in samples {
                writer.write_u16::<LittleEndian>(sample.len() as u16)?;
                writer.write_all(sample.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Overwrites the two total placeholders, restoring the stream position.
    pub fn patch_totals<W: Write + Seek>(
        writer: &mut W,
        variant_count: u32,
        sample_count: u32,
    ) -> Result<()> {
        let end = writer.stream_position()?;
        writer.seek(SeekFrom::Start(VARIANT_COUNT_OFFSET))?;
        writer.write_u32::<LittleEndian>(variant_count)?;
        writer.seek(SeekFrom::Start(SAMPLE_COUNT_OFFSET))?;
        writer.write_u32::<LittleEndian>(sample_count)?;
        writer.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    /// Parses the fixed header fields back out of a serialized file.
    pub fn parse(buffer: &[u8]) -> Result<ParsedHeader> {
        if buffer.len() < 24 {
            return Err(EncodeError::TruncatedHeader(buffer.len()).into());
        }
        Ok(ParsedHeader {
            block_offset: LittleEndian::read_u32(&buffer[0..4]),
            header_length: LittleEndian::read_u32(&buffer[4..8]),
            variant_count: LittleEndian::read_u32(&buffer[8..12]),
            sample_count: LittleEndian::read_u32(&buffer[12..16]),
            magic: LittleEndian::read_u32(&buffer[16..20]),
            flags: LittleEndian::read_u32(&buffer[20..24]),
        })
    }
}

/// Fixed header fields read back from a serialized file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHeader {
    pub block_offset: u32,
    pub header_length: u32,
    pub variant_count: u32,
    pub sample_count: u32,
    pub magic: u32,
    pub flags: u32,
}
impl ParsedHeader {
    pub fn magic_ok(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn compression_code(&self) -> u32 {
        self.flags & 0b11
    }

    pub fn has_sample_identifiers(&self) -> bool {
        self.flags & FLAG_SAMPLE_IDENTIFIERS != 0
    }
}

/// Writes one variant's identifying-data record.
pub fn write_variant_id<W: Write>(
    writer: &mut W,
    id: &str,
    rsid: &str,
    contig: &str,
    position: u64,
    alleles: &[String],
) -> Result<()> {
    writer.write_u16::<LittleEndian>(id.len() as u16)?;
    writer.write_all(id.as_bytes())?;
    writer.write_u16::<LittleEndian>(rsid.len() as u16)?;
    writer.write_all(rsid.as_bytes())?;
    writer.write_u16::<LittleEndian>(contig.len() as u16)?;
    writer.write_all(contig.as_bytes())?;
    writer.write_u32::<LittleEndian>(position as u32)?;
    writer.write_u16::<LittleEndian>(alleles.len() as u16)?;
    for allele in alleles {
        writer.write_u32::<LittleEndian>(allele.len() as u32)?;
        writer.write_all(allele.as_bytes())?;
    }
    Ok(())
}

/// Accumulated probability payload for one variant, assembled at column
/// close.
///
/// The min/max ploidy bytes are patched into their fixed offsets after the
/// rest of the payload is laid out.
#[derive(Debug, Clone)]
pub struct GenotypePayload {
    pub sample_count: u32,
    pub allele_count: u16,
    pub min_ploidy: u8,
    pub max_ploidy: u8,
    pub phased: bool,
    pub ploidy_bytes: Vec<u8>,
    pub probabilities: Vec<u8>,
}
impl GenotypePayload {
    /// Lays out the payload bytes in format order.
    pub fn assemble(&self) -> Vec<u8> {
        let mut payload =
            Vec::with_capacity(10 + self.ploidy_bytes.len() + self.probabilities.len());
        let mut scratch = [0u8; 4];
        LittleEndian::write_u32(&mut scratch, self.sample_count);
        payload.extend_from_slice(&scratch);
        LittleEndian::write_u16(&mut scratch[..2], self.allele_count);
        payload.extend_from_slice(&scratch[..2]);
        payload.push(0); // min ploidy, patched below
        payload.push(0); // max ploidy, patched below
        payload.extend_from_slice(&self.ploidy_bytes);
        payload.push(u8::from(self.phased));
        payload.push(BIT_DEPTH);
        payload.extend_from_slice(&self.probabilities);

        payload[MIN_PLOIDY_OFFSET] = self.min_ploidy;
        payload[MAX_PLOIDY_OFFSET] = self.max_ploidy;
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_placeholders_then_patch() -> anyhow::Result<()> {
        let header = BgenHeader::new(Compression::Zlib);
        let mut cursor = Cursor::new(Vec::new());
        header.write_initial(None, &mut cursor)?;

        let parsed = BgenHeader::parse(cursor.get_ref())?;
        assert!(parsed.magic_ok());
        assert_eq!(parsed.block_offset, 20);
        assert_eq!(parsed.header_length, 20);
        assert_eq!(parsed.variant_count, 0);
        assert_eq!(parsed.sample_count, 0);
        assert_eq!(parsed.compression_code(), 1);
        assert!(!parsed.has_sample_identifiers());

        BgenHeader::patch_totals(&mut cursor, 42, 7)?;
        let parsed = BgenHeader::parse(cursor.get_ref())?;
        assert_eq!(parsed.variant_count, 42);
        assert_eq!(parsed.sample_count, 7);
        Ok(())
    }

    #[test]
    fn test_sample_identifier_block() -> anyhow::Result<()> {
        let header = BgenHeader::new(Compression::None);
        let samples = vec!["HG00096".to_string(), "HG00097".to_string()];
        let mut cursor = Cursor::new(Vec::new());
        header.write_initial(Some(&samples), &mut cursor)?;

        let parsed = BgenHeader::parse(cursor.get_ref())?;
        assert!(parsed.has_sample_identifiers());
        // 8 bytes of block framing plus (2 + 7) per identifier
        assert_eq!(parsed.block_offset, 20 + 8 + 9 + 9);

        let bytes = cursor.get_ref();
        let block = &bytes[24..];
        assert_eq!(LittleEndian::read_u32(&block[0..4]), 8 + 9 + 9);
        assert_eq!(LittleEndian::read_u32(&block[4..8]), 2);
        assert_eq!(LittleEndian::read_u16(&block[8..10]), 7);
        assert_eq!(&block[10..17], b"HG00096");
        Ok(())
    }

    #[test]
    fn test_payload_layout_and_ploidy_offsets() {
        let payload = GenotypePayload {
            sample_count: 3,
            allele_count: 2,
            min_ploidy: 1,
            max_ploidy: 2,
            phased: false,
            ploidy_bytes: vec![2, 0x82, 1],
            probabilities: vec![255, 0, 0, 0, 0],
        }
        .assemble();

        assert_eq!(LittleEndian::read_u32(&payload[0..4]), 3);
        assert_eq!(LittleEndian::read_u16(&payload[4..6]), 2);
        assert_eq!(payload[MIN_PLOIDY_OFFSET], 1);
        assert_eq!(payload[MAX_PLOIDY_OFFSET], 2);
        assert_eq!(&payload[8..11], &[2, 0x82, 1]);
        assert_eq!(payload[11], 0); // unphased
        assert_eq!(payload[12], BIT_DEPTH);
        assert_eq!(&payload[13..], &[255, 0, 0, 0, 0]);
    }

    #[test]
    fn test_variant_id_record() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let alleles = vec!["A".to_string(), "TT".to_string()];
        write_variant_id(&mut out, "chr1:100", "chr1:100", "chr1", 100, &alleles)?;

        let mut pos = 0usize;
        for expected in ["chr1:100", "chr1:100", "chr1"] {
            let len = LittleEndian::read_u16(&out[pos..pos + 2]) as usize;
            assert_eq!(&out[pos + 2..pos + 2 + len], expected.as_bytes());
            pos += 2 + len;
        }
        assert_eq!(LittleEndian::read_u32(&out[pos..pos + 4]), 100);
        pos += 4;
        assert_eq!(LittleEndian::read_u16(&out[pos..pos + 2]), 2);
        pos += 2;
        assert_eq!(LittleEndian::read_u32(&out[pos..pos + 4]), 1);
        assert_eq!(&out[pos + 4..pos + 5], b"A");
        pos += 5;
        assert_eq!(LittleEndian::read_u32(&out[pos..pos + 4]), 2);
        assert_eq!(&out[pos + 4..pos + 6], b"TT");
        Ok(())
    }
}
