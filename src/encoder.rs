//! The stream transducer: ordered genotype calls in, five output files out.
//!
//! The encoder consumes the [`ResultProcessor`] protocol and advances an
//! explicit state machine:
//!
//! ```text
//! HeaderWritten ──on_interval──▶ ColumnOpen ──on_interval──▶ (close, reopen)
//!       │                            │
//!       └────────finish──────────────┴──────▶ Finalized
//! ```
//!
//! Construction writes the fixed file headers with zero placeholders for the
//! totals; `finish` closes the last column, fills the sample file, and
//! patches the totals in place. A pass that never reaches `finish` leaves
//! the placeholders zero, which is how downstream readers detect truncation.
//!
//! Within a column, cells arrive in increasing row order; rows of the
//! declared range that the engine never delivers are synthesized as missing
//! so every column carries exactly one entry per row.
//!
//! # Example
//!
//! ```rust,no_run
//! use genomat::{ExportEncoderBuilder, FieldRegistry, OutputFileSet};
//!
//! let files = OutputFileSet::create("cohort.chr1").unwrap();
//! let mut encoder = ExportEncoderBuilder::default()
//!     .registry(FieldRegistry::genotype_defaults())
//!     .row_range(0, 2503)
//!     .build(files)
//!     .unwrap();
//!
//! // ... the query engine drives encoder.on_interval / encoder.on_cell ...
//!
//! encoder.finish().unwrap();
//! ```

use std::io::{Seek, Write};

use tracing::{debug, info, warn};

use crate::bgen::{self, BgenHeader, GenotypePayload};
use crate::bitpack::BitPacker;
use crate::block::BlockCodec;
use crate::call::{GenotypeCall, GenotypeCode};
use crate::config::Compression;
use crate::error::{ConfigError, EncodeError, FieldError, Result};
use crate::field::{FieldRegistry, GenomicField};
use crate::files::{OutputFileSet, BED_MAGIC};
use crate::interval::GenomicInterval;
use crate::processor::ResultProcessor;

/// Name of the phase-bearing genotype field
const GT_FIELD: &str = "GT";
/// Name of the reference-allele field
const REF_FIELD: &str = "REF";
/// Name of the alternate-alleles field, `|`-delimited
const ALT_FIELD: &str = "ALT";

/// Sentinel extremes the per-column ploidy trackers reset to
const MIN_PLOIDY_SENTINEL: u8 = u8::MAX;
const MAX_PLOIDY_SENTINEL: u8 = 0;

/// Ploidy assumed for fills before any call of the pass has been observed
const DEFAULT_ASSUMED_PLOIDY: u8 = 2;

/// A builder for configured [`ExportEncoder`] instances.
#[derive(Default)]
pub struct ExportEncoderBuilder {
    registry: Option<FieldRegistry>,
    row_range: Option<(u64, u64)>,
    compression: Compression,
    sample_ids: Option<Vec<String>>,
    progress_interval: Option<u64>,
    rank: u32,
}
impl ExportEncoderBuilder {
    /// Field-type registry resolved before the scan begins
    pub fn registry(mut self, registry: FieldRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Inclusive row bounds of the active rank
    pub fn row_range(mut self, lo: u64, hi: u64) -> Self {
        self.row_range = Some((lo, hi));
        self
    }

    /// Block compression for the probabilistic file
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sample identifiers covering the row range; also emitted as the
    /// probabilistic file's identifier block
    pub fn sample_ids(mut self, sample_ids: Vec<String>) -> Self {
        self.sample_ids = Some(sample_ids);
        self
    }

    /// Progress log cadence in variants; 0 disables progress lines
    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    /// Worker rank, used for log context only
    pub fn rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    /// Builds the encoder and writes the initial file headers.
    ///
    /// Fails fast on an inverted row range, a sample list that does not
    /// cover the range, or a registry whose genotype field is not
    /// phase-bearing.
    pub fn build<W: Write + Seek>(self, mut files: OutputFileSet<W>) -> Result<ExportEncoder<W>> {
        let registry = self.registry.unwrap_or_else(FieldRegistry::genotype_defaults);
        let (row_lo, row_hi) = self.row_range.unwrap_or((0, 0));
        if row_lo > row_hi {
            return Err(ConfigError::InvalidRowRange(row_lo, row_hi).into());
        }
        let cardinality = (row_hi - row_lo + 1) as usize;

        // The genotype field assumption is resolved once, before the scan
        if !registry.get(GT_FIELD)?.phase_bearing {
            return Err(ConfigError::NotPhaseBearing(GT_FIELD.to_string()).into());
        }

        let sample_names = match &self.sample_ids {
            Some(ids) => {
                if ids.len() != cardinality {
                    return Err(ConfigError::SampleListMismatch(ids.len(), cardinality).into());
                }
                ids.iter().map(|id| Some(id.clone())).collect()
            }
            None => vec![None; cardinality],
        };

        files.bed_mut().write_all(&BED_MAGIC)?;
        BgenHeader::new(self.compression)
            .write_initial(self.sample_ids.as_deref(), files.bgen_mut())?;

        Ok(ExportEncoder {
            files,
            codec: BlockCodec::new(self.compression),
            row_lo,
            row_hi,
            sample_names,
            progress_interval: self.progress_interval.unwrap_or(1000),
            rank: self.rank,
            variants_total: 0,
            state: EncoderState::HeaderWritten,
        })
    }
}

/// The encoder's position in its lifecycle.
enum EncoderState {
    HeaderWritten,
    ColumnOpen(Box<ColumnState>),
    Finalized,
}

/// Accumulated state of the currently open column.
struct ColumnState {
    contig: String,
    position: u64,
    /// REF followed by the ALT labels; empty until the first cell arrives
    alleles: Vec<String>,
    phased: bool,
    phase_locked: bool,
    min_ploidy: u8,
    max_ploidy: u8,
    /// Most recent observed ploidy, sizing fills for undelivered rows
    assumed_ploidy: u8,
    last_row: Option<u64>,
    packer: BitPacker,
    bed_bytes: Vec<u8>,
    genotype_text: Vec<String>,
    ploidy_bytes: Vec<u8>,
    prob_bytes: Vec<u8>,
}
impl ColumnState {
    fn open(interval: &GenomicInterval, assumed_ploidy: u8) -> Self {
        Self {
            contig: interval.contig().to_string(),
            position: interval.position(),
            alleles: Vec::new(),
            phased: false,
            phase_locked: false,
            min_ploidy: MIN_PLOIDY_SENTINEL,
            max_ploidy: MAX_PLOIDY_SENTINEL,
            assumed_ploidy,
            last_row: None,
            packer: BitPacker::new(),
            bed_bytes: Vec::new(),
            genotype_text: Vec::new(),
            ploidy_bytes: Vec::new(),
            prob_bytes: Vec::new(),
        }
    }

    fn allele_count(&self) -> u16 {
        if self.alleles.is_empty() {
            2
        } else {
            self.alleles.len() as u16
        }
    }

    fn allele_label(&self, index: i32) -> &str {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.alleles.get(i))
            .map_or("0", String::as_str)
    }

    /// Folds one delivered call into the column.
    fn observe_call(&mut self, call: &GenotypeCall) {
        self.min_ploidy = self.min_ploidy.min(call.ploidy());
        self.max_ploidy = self.max_ploidy.max(call.ploidy());
        self.assumed_ploidy = call.ploidy();

        self.packer.push(call.code(), &mut self.bed_bytes);

        let mut text = String::new();
        for (i, &allele) in call.alleles().iter().enumerate() {
            if i > 0 {
                text.push(' ');
            }
            text.push_str(if allele < 0 {
                "0"
            } else {
                self.allele_label(allele)
            });
        }
        self.genotype_text.push(text);

        self.ploidy_bytes.push(call.ploidy_byte());
        call.append_probabilities(self.allele_count(), self.phased, &mut self.prob_bytes);
    }

    /// Synthesizes one undelivered row: missing code, missing-bit ploidy
    /// byte, and an all-zero probability run of the layout the enumerator
    /// dictates for the column's current assumption.
    fn fill_missing(&mut self) {
        self.packer.push(GenotypeCode::Missing, &mut self.bed_bytes);

        let mut text = String::new();
        for i in 0..self.assumed_ploidy {
            if i > 0 {
                text.push(' ');
            }
            text.push('0');
        }
        self.genotype_text.push(text);

        self.ploidy_bytes.push(0x80 | self.assumed_ploidy);
        let zeros = GenotypeCall::slot_count(self.assumed_ploidy, self.allele_count(), self.phased);
        self.prob_bytes.resize(self.prob_bytes.len() + zeros, 0);
    }
}

/// The stream-to-file-set encoder for one worker rank.
///
/// Create one via [`ExportEncoderBuilder`]; the query engine then drives it
/// through the [`ResultProcessor`] protocol, and the caller ends the pass
/// with [`finish`](Self::finish). Dropping an unfinished encoder flushes
/// what was written but leaves the totals zero.
pub struct ExportEncoder<W: Write + Seek> {
    files: OutputFileSet<W>,
    codec: BlockCodec,
    row_lo: u64,
    row_hi: u64,
    sample_names: Vec<Option<String>>,
    progress_interval: u64,
    rank: u32,
    variants_total: u64,
    state: EncoderState,
}
impl<W: Write + Seek> ExportEncoder<W> {
    /// Declared row-range cardinality; every column carries this many entries
    pub fn sample_count(&self) -> usize {
        self.sample_names.len()
    }

    /// Variants opened so far
    pub fn variants_total(&self) -> u64 {
        self.variants_total
    }

    /// Shared view of the output writers (used by tests and callers that
    /// inspect in-memory output)
    pub fn files(&self) -> &OutputFileSet<W> {
        &self.files
    }

    fn handle_interval(&mut self, interval: &GenomicInterval) -> Result<()> {
        if matches!(self.state, EncoderState::Finalized) {
            return Err(EncodeError::AlreadyFinalized.into());
        }
        match std::mem::replace(&mut self.state, EncoderState::HeaderWritten) {
            EncoderState::ColumnOpen(column) => self.close_column(*column)?,
            EncoderState::HeaderWritten | EncoderState::Finalized => {}
        }

        self.variants_total += 1;
        if self.progress_interval > 0 && self.variants_total % self.progress_interval == 0 {
            info!(
                rank = self.rank,
                variants = self.variants_total,
                contig = %interval.contig(),
                position = interval.position(),
                "export progress"
            );
        }

        self.state = EncoderState::ColumnOpen(Box::new(ColumnState::open(
            interval,
            DEFAULT_ASSUMED_PLOIDY,
        )));
        Ok(())
    }

    fn handle_cell(
        &mut self,
        sample: &str,
        coordinates: (u64, u64),
        fields: &[GenomicField<'_>],
    ) -> Result<()> {
        let (row_lo, row_hi) = (self.row_lo, self.row_hi);
        let column = match &mut self.state {
            EncoderState::Finalized => return Err(EncodeError::AlreadyFinalized.into()),
            EncoderState::HeaderWritten => {
                return Err(EncodeError::CellBeforeInterval(sample.to_string()).into());
            }
            EncoderState::ColumnOpen(column) => column,
        };

        let row = coordinates.0;
        if row < row_lo || row > row_hi {
            return Err(EncodeError::RowOutOfRange(row, row_lo, row_hi).into());
        }
        if let Some(last) = column.last_row {
            if row <= last {
                return Err(EncodeError::RowOrderViolation(row, last).into());
            }
        }

        let gt = field_by_name(fields, GT_FIELD)?;
        let call = GenotypeCall::from_field(sample, &gt)?;

        // Allele labels are fixed by the column's first call; later cells
        // must agree on the count
        let cell_alleles = cell_allele_labels(fields)?;
        if column.alleles.is_empty() {
            if let Some(labels) = cell_alleles {
                column.alleles = labels;
            }
        } else if let Some(labels) = cell_alleles {
            if labels.len() != column.alleles.len() {
                return Err(ConfigError::AlleleCountChanged(
                    column.alleles.len() as u16,
                    labels.len() as u16,
                )
                .into());
            }
        }

        if let Some(phased) = call.phased() {
            if !column.phase_locked {
                column.phased = phased;
                column.phase_locked = true;
            } else if phased != column.phased {
                return Err(ConfigError::PhasednessChanged(column.phased).into());
            }
        }

        // Sparse gap: every undelivered row still yields exactly one entry,
        // sized by the assumption this call establishes
        column.assumed_ploidy = call.ploidy();
        let gap_start = column.last_row.map_or(row_lo, |last| last + 1);
        for _ in gap_start..row {
            column.fill_missing();
        }

        let slot = (row - row_lo) as usize;
        if self.sample_names[slot].is_none() {
            self.sample_names[slot] = Some(sample.to_string());
        }

        column.observe_call(&call);
        column.last_row = Some(row);
        Ok(())
    }

    /// Closes the column: trailing fills, partial-byte flush, the text
    /// metadata records, and the framed probability block.
    fn close_column(&mut self, mut column: ColumnState) -> Result<()> {
        let pending = column.last_row.map_or(self.row_lo, |last| last + 1);
        for _ in pending..=self.row_hi {
            column.fill_missing();
        }

        column.packer.flush(&mut column.bed_bytes);
        self.files.bed_mut().write_all(&column.bed_bytes)?;

        if column.alleles.is_empty() {
            column.alleles = vec!["0".to_string(), "0".to_string()];
        }

        let mut itoa_buf = itoa::Buffer::new();
        let position = itoa_buf.format(column.position);
        let id = format!("{}:{position}", column.contig);

        let bim = self.files.bim_mut();
        bim.write_all(column.contig.as_bytes())?;
        write!(bim, "\t{id}\t0\t{position}\t")?;
        bim.write_all(column.alleles[0].as_bytes())?;
        bim.write_all(b"\t")?;
        bim.write_all(column.alleles.get(1).map_or("0", String::as_str).as_bytes())?;
        bim.write_all(b"\n")?;

        let tped = self.files.tped_mut();
        write!(tped, "{} {id} 0 {position}", column.contig)?;
        for text in &column.genotype_text {
            write!(tped, " {text}")?;
        }
        tped.write_all(b"\n")?;

        // Reconcile the ploidy trackers; a column of pure fills reports the
        // assumption on both sides
        let (min_ploidy, max_ploidy) = if column.min_ploidy == MIN_PLOIDY_SENTINEL {
            (column.assumed_ploidy, column.assumed_ploidy)
        } else {
            (column.min_ploidy, column.max_ploidy)
        };

        bgen::write_variant_id(
            self.files.bgen_mut(),
            &id,
            &id,
            &column.contig,
            column.position,
            &column.alleles,
        )?;
        let payload = GenotypePayload {
            sample_count: self.sample_names.len() as u32,
            allele_count: column.alleles.len() as u16,
            min_ploidy,
            max_ploidy,
            phased: column.phased,
            ploidy_bytes: column.ploidy_bytes,
            probabilities: column.prob_bytes,
        }
        .assemble();
        let framed = self.codec.encode(&payload, self.files.bgen_mut())?;

        debug!(
            rank = self.rank,
            variant = %id,
            payload = payload.len(),
            framed,
            "column closed"
        );
        Ok(())
    }

    /// Ends the pass: closes the last column, writes the sample file,
    /// patches the totals, and flushes everything.
    ///
    /// Calling `finish` on an already-finalized encoder is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, EncoderState::Finalized) {
            EncoderState::Finalized => return Ok(()),
            EncoderState::ColumnOpen(column) => self.close_column(*column)?,
            EncoderState::HeaderWritten => {}
        }

        for (offset, name) in self.sample_names.iter().enumerate() {
            let fam = self.files.fam_mut();
            match name {
                Some(name) => writeln!(fam, "{name} {name} 0 0 0 -9")?,
                None => {
                    let row = self.row_lo + offset as u64;
                    writeln!(fam, "sample_{row} sample_{row} 0 0 0 -9")?;
                }
            }
        }

        BgenHeader::patch_totals(
            self.files.bgen_mut(),
            self.variants_total as u32,
            self.sample_names.len() as u32,
        )?;
        self.files.finish()?;

        info!(
            rank = self.rank,
            variants = self.variants_total,
            samples = self.sample_names.len(),
            payload_bytes = self.codec.bytes_in(),
            framed_bytes = self.codec.bytes_out(),
            "export finished"
        );
        Ok(())
    }
}

impl<W: Write + Seek> ResultProcessor for ExportEncoder<W> {
    fn on_interval(&mut self, interval: &GenomicInterval) -> Result<()> {
        self.handle_interval(interval)
    }

    fn on_cell(
        &mut self,
        sample: &str,
        coordinates: (u64, u64),
        _interval: &GenomicInterval,
        fields: &[GenomicField<'_>],
    ) -> Result<()> {
        self.handle_cell(sample, coordinates, fields)
    }
}

impl<W: Write + Seek> Drop for ExportEncoder<W> {
    fn drop(&mut self) {
        if !matches!(self.state, EncoderState::Finalized) {
            warn!(
                rank = self.rank,
                "encoder dropped before finish; output totals left zero"
            );
        }
    }
}

fn field_by_name<'a, 'b>(
    fields: &'a [GenomicField<'b>],
    name: &str,
) -> Result<GenomicField<'b>> {
    fields
        .iter()
        .find(|f| f.name() == name)
        .copied()
        .ok_or_else(|| FieldError::UnknownField(name.to_string()).into())
}

/// REF + `|`-split ALT labels of the cell, if the fields are present.
fn cell_allele_labels(fields: &[GenomicField<'_>]) -> Result<Option<Vec<String>>> {
    let Ok(ref_field) = field_by_name(fields, REF_FIELD) else {
        return Ok(None);
    };
    let Ok(alt_field) = field_by_name(fields, ALT_FIELD) else {
        return Ok(None);
    };
    let mut labels = vec![ref_field.str_view()?.to_string()];
    for alt in alt_field.str_view()?.split('|') {
        if !alt.is_empty() {
            labels.push(alt.to_string());
        }
    }
    Ok(Some(labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgen::{MAX_PLOIDY_OFFSET, MIN_PLOIDY_OFFSET};
    use crate::bitpack::unpack;
    use crate::error::Error;
    use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
    use std::io::Cursor;

    type MemEncoder = ExportEncoder<Cursor<Vec<u8>>>;

    fn mem_files() -> OutputFileSet<Cursor<Vec<u8>>> {
        OutputFileSet::from_writers(
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
        )
    }

    fn gt_bytes(values: &[i32]) -> Vec<u8> {
        let mut buffer = Vec::new();
        for &v in values {
            buffer.write_i32::<LittleEndian>(v).unwrap();
        }
        buffer
    }

    fn deliver_cell(
        encoder: &mut MemEncoder,
        sample: &str,
        row: u64,
        interval: &GenomicInterval,
        gt: &[i32],
    ) -> Result<()> {
        let registry = FieldRegistry::genotype_defaults();
        let bytes = gt_bytes(gt);
        let fields = [
            GenomicField::new(GT_FIELD, *registry.get(GT_FIELD).unwrap(), &bytes, gt.len()),
            GenomicField::new(REF_FIELD, *registry.get(REF_FIELD).unwrap(), b"A", 1),
            GenomicField::new(ALT_FIELD, *registry.get(ALT_FIELD).unwrap(), b"T", 1),
        ];
        encoder.on_cell(sample, (row, interval.position()), interval, &fields)
    }

    fn build(row_lo: u64, row_hi: u64) -> MemEncoder {
        ExportEncoderBuilder::default()
            .row_range(row_lo, row_hi)
            .compression(Compression::None)
            .progress_interval(0)
            .build(mem_files())
            .unwrap()
    }

    /// Walks past the variant identifying data of the first block and
    /// returns the uncompressed payload bytes.
    fn first_payload(bgen: &[u8], header_end: usize) -> &[u8] {
        let mut pos = header_end;
        for _ in 0..3 {
            let len = LittleEndian::read_u16(&bgen[pos..pos + 2]) as usize;
            pos += 2 + len;
        }
        pos += 4; // position
        let allele_count = LittleEndian::read_u16(&bgen[pos..pos + 2]) as usize;
        pos += 2;
        for _ in 0..allele_count {
            let len = LittleEndian::read_u32(&bgen[pos..pos + 4]) as usize;
            pos += 4 + len;
        }
        let payload_len = LittleEndian::read_u32(&bgen[pos..pos + 4]) as usize;
        &bgen[pos + 4..pos + 4 + payload_len]
    }

    #[test]
    fn test_back_patched_totals() -> anyhow::Result<()> {
        // Totals read zero before finish and (V, S) after
        let mut encoder = build(0, 2);
        let iv1 = GenomicInterval::new("chr1", 100, 101);
        let iv2 = GenomicInterval::new("chr1", 250, 251);

        encoder.on_interval(&iv1)?;
        deliver_cell(&mut encoder, "s0", 0, &iv1, &[0, 0, 1])?;
        deliver_cell(&mut encoder, "s1", 1, &iv1, &[1, 0, 1])?;
        deliver_cell(&mut encoder, "s2", 2, &iv1, &[0, 0, 0])?;

        let parsed = BgenHeader::parse(encoder.files().bgen().get_ref())?;
        assert_eq!(parsed.variant_count, 0);
        assert_eq!(parsed.sample_count, 0);

        encoder.on_interval(&iv2)?;
        deliver_cell(&mut encoder, "s0", 0, &iv2, &[0, 0, 1])?;
        encoder.finish()?;

        let parsed = BgenHeader::parse(encoder.files().bgen().get_ref())?;
        assert_eq!(parsed.variant_count, 2);
        assert_eq!(parsed.sample_count, 3);
        assert_eq!(encoder.variants_total(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_cell_fill() -> anyhow::Result<()> {
        // Rows {0,2,4} of [0,4] delivered; 1 and 3 synthesized
        let mut encoder = build(0, 4);
        let iv = GenomicInterval::new("chr2", 500, 501);
        encoder.on_interval(&iv)?;
        deliver_cell(&mut encoder, "s0", 0, &iv, &[0, 0, 0])?;
        deliver_cell(&mut encoder, "s2", 2, &iv, &[0, 0, 1])?;
        deliver_cell(&mut encoder, "s4", 4, &iv, &[1, 0, 1])?;
        encoder.finish()?;

        let bed = encoder.files().bed().get_ref();
        assert_eq!(&bed[..3], &BED_MAGIC);
        let codes = unpack(&bed[3..], 5);
        assert_eq!(codes, vec![0, 3, 1, 3, 2]);

        let payload = first_payload(encoder.files().bgen().get_ref(), 24);
        assert_eq!(LittleEndian::read_u32(&payload[0..4]), 5);
        // Ploidy bytes: delivered rows plain, synthesized rows missing-bit
        assert_eq!(&payload[8..13], &[2, 0x82, 2, 0x82, 2]);
        // Unphased diploid biallelic: two probability bytes per sample
        let probs = &payload[15..];
        assert_eq!(probs.len(), 10);
        assert_eq!(&probs[2..4], &[0, 0]); // row 1, all-zero block
        assert_eq!(&probs[6..8], &[0, 0]); // row 3, all-zero block
        assert_eq!(&probs[0..2], &[255, 0]); // row 0, hom-ref
        assert_eq!(&probs[4..6], &[0, 255]); // row 2, het
        Ok(())
    }

    #[test]
    fn test_ploidy_trackers_reset_per_column() -> anyhow::Result<()> {
        // Min/max reflect only the column's own calls
        let mut encoder = build(0, 1);
        let iv1 = GenomicInterval::new("chr1", 10, 11);
        let iv2 = GenomicInterval::new("chr1", 20, 21);

        encoder.on_interval(&iv1)?;
        deliver_cell(&mut encoder, "s0", 0, &iv1, &[0])?; // haploid
        deliver_cell(&mut encoder, "s1", 1, &iv1, &[0, 0, 1])?; // diploid
        encoder.on_interval(&iv2)?;
        deliver_cell(&mut encoder, "s0", 0, &iv2, &[0, 0, 1])?;
        deliver_cell(&mut encoder, "s1", 1, &iv2, &[1, 0, 1])?;
        encoder.finish()?;

        let bgen = encoder.files().bgen().get_ref();
        let first = first_payload(bgen, 24);
        assert_eq!(first[MIN_PLOIDY_OFFSET], 1);
        assert_eq!(first[MAX_PLOIDY_OFFSET], 2);

        // Skip the first variant's id data and framed block to reach the second
        let mut pos = 24;
        for _ in 0..3 {
            let len = LittleEndian::read_u16(&bgen[pos..pos + 2]) as usize;
            pos += 2 + len;
        }
        pos += 4;
        let k = LittleEndian::read_u16(&bgen[pos..pos + 2]) as usize;
        pos += 2;
        for _ in 0..k {
            let len = LittleEndian::read_u32(&bgen[pos..pos + 4]) as usize;
            pos += 4 + len;
        }
        let block_len = LittleEndian::read_u32(&bgen[pos..pos + 4]) as usize;
        pos += 4 + block_len;

        let second = first_payload(bgen, pos);
        assert_eq!(second[MIN_PLOIDY_OFFSET], 2);
        assert_eq!(second[MAX_PLOIDY_OFFSET], 2);
        Ok(())
    }

    #[test]
    fn test_cell_before_interval_rejected() {
        let mut encoder = build(0, 0);
        let iv = GenomicInterval::new("chr1", 5, 6);
        let result = deliver_cell(&mut encoder, "s0", 0, &iv, &[0, 0, 0]);
        assert!(matches!(
            result,
            Err(Error::EncodeError(EncodeError::CellBeforeInterval(_)))
        ));
    }

    #[test]
    fn test_row_order_violation_rejected() -> anyhow::Result<()> {
        let mut encoder = build(0, 3);
        let iv = GenomicInterval::new("chr1", 5, 6);
        encoder.on_interval(&iv)?;
        deliver_cell(&mut encoder, "s2", 2, &iv, &[0, 0, 0])?;
        let result = deliver_cell(&mut encoder, "s1", 1, &iv, &[0, 0, 0]);
        assert!(matches!(
            result,
            Err(Error::EncodeError(EncodeError::RowOrderViolation(1, 2)))
        ));
        Ok(())
    }

    #[test]
    fn test_row_out_of_range_rejected() -> anyhow::Result<()> {
        let mut encoder = build(2, 4);
        let iv = GenomicInterval::new("chr1", 5, 6);
        encoder.on_interval(&iv)?;
        let result = deliver_cell(&mut encoder, "s9", 9, &iv, &[0, 0, 0]);
        assert!(matches!(
            result,
            Err(Error::EncodeError(EncodeError::RowOutOfRange(9, 2, 4)))
        ));
        Ok(())
    }

    #[test]
    fn test_phasedness_conflict_rejected() -> anyhow::Result<()> {
        let mut encoder = build(0, 1);
        let iv = GenomicInterval::new("chr1", 5, 6);
        encoder.on_interval(&iv)?;
        deliver_cell(&mut encoder, "s0", 0, &iv, &[0, 1, 1])?; // phased
        let result = deliver_cell(&mut encoder, "s1", 1, &iv, &[0, 0, 1]); // unphased
        assert!(matches!(
            result,
            Err(Error::ConfigError(ConfigError::PhasednessChanged(true)))
        ));
        Ok(())
    }

    #[test]
    fn test_events_after_finish_rejected() -> anyhow::Result<()> {
        let mut encoder = build(0, 0);
        let iv = GenomicInterval::new("chr1", 5, 6);
        encoder.on_interval(&iv)?;
        deliver_cell(&mut encoder, "s0", 0, &iv, &[0, 0, 0])?;
        encoder.finish()?;
        assert!(matches!(
            encoder.on_interval(&GenomicInterval::new("chr1", 9, 10)),
            Err(Error::EncodeError(EncodeError::AlreadyFinalized))
        ));
        Ok(())
    }

    #[test]
    fn test_inverted_row_range_rejected() {
        let result = ExportEncoderBuilder::default()
            .row_range(5, 2)
            .build(mem_files());
        assert!(matches!(
            result,
            Err(Error::ConfigError(ConfigError::InvalidRowRange(5, 2)))
        ));
    }

    #[test]
    fn test_sample_list_cardinality_enforced() {
        let result = ExportEncoderBuilder::default()
            .row_range(0, 2)
            .sample_ids(vec!["a".to_string()])
            .build(mem_files());
        assert!(matches!(
            result,
            Err(Error::ConfigError(ConfigError::SampleListMismatch(1, 3)))
        ));
    }

    #[test]
    fn test_fam_lines_mix_seen_and_synthesized() -> anyhow::Result<()> {
        let mut encoder = build(0, 2);
        let iv = GenomicInterval::new("chr1", 5, 6);
        encoder.on_interval(&iv)?;
        deliver_cell(&mut encoder, "HG00096", 0, &iv, &[0, 0, 0])?;
        deliver_cell(&mut encoder, "HG00099", 2, &iv, &[0, 0, 1])?;
        encoder.finish()?;

        let fam = String::from_utf8(encoder.files().fam().get_ref().clone())?;
        assert_eq!(
            fam,
            "HG00096 HG00096 0 0 0 -9\nsample_1 sample_1 0 0 0 -9\nHG00099 HG00099 0 0 0 -9\n"
        );
        Ok(())
    }

    #[test]
    fn test_text_metadata_records() -> anyhow::Result<()> {
        let mut encoder = build(0, 1);
        let iv = GenomicInterval::new("chr7", 140453136, 140453137);
        encoder.on_interval(&iv)?;
        deliver_cell(&mut encoder, "s0", 0, &iv, &[0, 0, 1])?;
        deliver_cell(&mut encoder, "s1", 1, &iv, &[1, 0, 1])?;
        encoder.finish()?;

        let bim = String::from_utf8(encoder.files().bim().get_ref().clone())?;
        assert_eq!(bim, "chr7\tchr7:140453136\t0\t140453136\tA\tT\n");

        let tped = String::from_utf8(encoder.files().tped().get_ref().clone())?;
        assert_eq!(tped, "chr7 chr7:140453136 0 140453136 A T T T\n");
        Ok(())
    }
}
