//! One sample's genotype at one variant column.
//!
//! The genotype field arrives as a flat integer vector with allele indices at
//! even offsets and phase separators at odd offsets (1 = phased), the store's
//! wire layout for genotypes. A negative allele index marks a missing
//! haplotype.

use crate::enumerate::{enumerate_phased, enumerate_unphased, phased_slot_count, unphased_slot_count};
use crate::error::{ConfigError, Result};
use crate::field::GenomicField;

/// 2-bit genotype code in the fixed-genotype output stream.
///
/// The code table is fixed by the target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GenotypeCode {
    HomRef = 0,
    Het = 1,
    HomAlt = 2,
    Missing = 3,
}

/// Hard probability weight written at the observed slot (8-bit depth).
const OBSERVED_WEIGHT: u8 = u8::MAX;

/// One sample's genotype call at one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeCall {
    ploidy: u8,
    alleles: Vec<i32>,
    /// `None` when the call carries no phase separators (haploid)
    phased: Option<bool>,
}
impl GenotypeCall {
    /// Parses a call from the phase-bearing genotype field.
    ///
    /// A field not marked phase-bearing is a fatal configuration error; an
    /// empty vector is as well.
    pub fn from_field(sample: &str, field: &GenomicField<'_>) -> Result<Self> {
        if !field.field_type().phase_bearing {
            return Err(ConfigError::NotPhaseBearing(field.name().to_string()).into());
        }
        let len = field.elements();
        if len == 0 {
            return Err(ConfigError::EmptyGenotype(sample.to_string()).into());
        }

        let ploidy = (len + 1) / 2;
        let mut alleles = Vec::with_capacity(ploidy);
        let mut phased = None;
        for offset in 0..len {
            let value = field.int_at(offset)?;
            if offset % 2 == 0 {
                alleles.push(value);
            } else {
                let sep_phased = value == 1;
                phased = Some(phased.unwrap_or(sep_phased) && sep_phased);
            }
        }
        Ok(Self {
            ploidy: ploidy as u8,
            alleles,
            phased,
        })
    }

    pub fn ploidy(&self) -> u8 {
        self.ploidy
    }

    pub fn alleles(&self) -> &[i32] {
        &self.alleles
    }

    /// Phasedness observed from the call's separators, if it has any
    pub fn phased(&self) -> Option<bool> {
        self.phased
    }

    /// Whether any haplotype is missing
    pub fn is_missing(&self) -> bool {
        self.alleles.iter().any(|&a| a < 0)
    }

    /// The 2-bit code for the fixed-genotype stream.
    pub fn code(&self) -> GenotypeCode {
        if self.is_missing() {
            GenotypeCode::Missing
        } else if self.alleles.iter().all(|&a| a == 0) {
            GenotypeCode::HomRef
        } else if self.alleles.windows(2).all(|w| w[0] == w[1]) {
            GenotypeCode::HomAlt
        } else {
            GenotypeCode::Het
        }
    }

    /// Ploidy byte for the probabilistic payload; bit 7 marks a missing call.
    pub fn ploidy_byte(&self) -> u8 {
        if self.is_missing() {
            0x80 | self.ploidy
        } else {
            self.ploidy
        }
    }

    /// Appends this call's 8-bit probability bytes in canonical slot order.
    ///
    /// The observed genotype's slot gets the full weight, every other slot
    /// zero. A missing call writes zeros across the whole layout. The slot
    /// implied by normalization is never emitted.
    pub fn append_probabilities(&self, allele_count: u16, phased: bool, out: &mut Vec<u8>) {
        if phased {
            self.append_phased(allele_count, out);
        } else {
            self.append_unphased(allele_count, out);
        }
    }

    fn append_phased(&self, allele_count: u16, out: &mut Vec<u8>) {
        if self.is_missing() {
            out.resize(out.len() + phased_slot_count(self.ploidy, allele_count), 0);
            return;
        }
        for (hap, allele) in enumerate_phased(self.ploidy, allele_count) {
            let observed = self.alleles[usize::from(hap)];
            let hit = u16::try_from(observed).map_or(false, |o| o == allele);
            out.push(if hit { OBSERVED_WEIGHT } else { 0 });
        }
    }

    fn append_unphased(&self, allele_count: u16, out: &mut Vec<u8>) {
        let slots = enumerate_unphased(self.ploidy, allele_count);
        if self.is_missing() {
            out.resize(out.len() + slots.len(), 0);
            return;
        }
        let mut counts = vec![0u8; usize::from(allele_count)];
        for &allele in &self.alleles {
            if let Ok(idx) = usize::try_from(allele) {
                if idx < counts.len() {
                    counts[idx] += 1;
                }
            }
        }
        for slot in &slots {
            out.push(if *slot == counts { OBSERVED_WEIGHT } else { 0 });
        }
    }

    /// Number of probability bytes a call of this shape contributes.
    pub fn slot_count(ploidy: u8, allele_count: u16, phased: bool) -> usize {
        if phased {
            phased_slot_count(ploidy, allele_count)
        } else {
            unphased_slot_count(ploidy, allele_count)
        }
    }
}
