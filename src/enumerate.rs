//! Canonical ordering of genotype-probability slots.
//!
//! The probabilistic output format stores, per sample, one 8-bit probability
//! per *slot*, where the slot layout depends on the (ploidy, allele count,
//! phasedness) triple. The final slot of every layout is implied by
//! normalization and never emitted. Both enumerations are pure functions of
//! their inputs; callers may re-enumerate at any time and get identical
//! output.

/// Binomial coefficient over u64, multiplicative form.
fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc = 1u64;
    for i in 0..k {
        acc = acc * (n - i) / (i + 1);
    }
    acc
}

/// Probability slots for a phased sample: one `(haplotype, allele)` entry per
/// haplotype for every allele except the final one, haplotypes outermost.
///
/// Yields exactly `ploidy * (allele_count - 1)` entries.
pub fn enumerate_phased(ploidy: u8, allele_count: u16) -> Vec<(u8, u16)> {
    let mut slots = Vec::with_capacity(phased_slot_count(ploidy, allele_count));
    for hap in 0..ploidy {
        for allele in 0..allele_count.saturating_sub(1) {
            slots.push((hap, allele));
        }
    }
    slots
}

/// Number of probability slots a phased sample contributes.
pub fn phased_slot_count(ploidy: u8, allele_count: u16) -> usize {
    usize::from(ploidy) * usize::from(allele_count.saturating_sub(1))
}

/// Probability slots for an unphased sample: every non-negative allele-count
/// vector of length `allele_count` summing to `ploidy`, first dimension
/// varying slowest (count of allele 0 descends first), with the terminal
/// vector of the recursion (all copies on the final allele) omitted.
///
/// Yields exactly `C(ploidy + allele_count - 1, allele_count - 1) - 1`
/// entries.
pub fn enumerate_unphased(ploidy: u8, allele_count: u16) -> Vec<Vec<u8>> {
    if allele_count == 0 {
        return Vec::new();
    }
    let mut slots = Vec::with_capacity(unphased_slot_count(ploidy, allele_count));
    let mut scratch = vec![0u8; usize::from(allele_count)];
    fill_counts(ploidy, 0, &mut scratch, &mut slots);
    // The last vector is implied by normalization
    slots.pop();
    slots
}

fn fill_counts(remaining: u8, dim: usize, scratch: &mut Vec<u8>, out: &mut Vec<Vec<u8>>) {
    if dim == scratch.len() - 1 {
        scratch[dim] = remaining;
        out.push(scratch.clone());
        return;
    }
    for count in (0..=remaining).rev() {
        scratch[dim] = count;
        fill_counts(remaining - count, dim + 1, scratch, out);
    }
}

/// Number of probability slots an unphased sample contributes.
pub fn unphased_slot_count(ploidy: u8, allele_count: u16) -> usize {
    if allele_count == 0 {
        return 0;
    }
    let total = binomial(
        u64::from(ploidy) + u64::from(allele_count) - 1,
        u64::from(allele_count) - 1,
    );
    (total as usize).saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phased_cardinality() {
        for ploidy in 0..6u8 {
            for alleles in 1..6u16 {
                let slots = enumerate_phased(ploidy, alleles);
                assert_eq!(slots.len(), usize::from(ploidy) * usize::from(alleles - 1));
                assert_eq!(slots.len(), phased_slot_count(ploidy, alleles));
            }
        }
    }

    #[test]
    fn test_phased_ordering_diploid_biallelic() {
        // Haplotypes outer, alleles inner
        assert_eq!(enumerate_phased(2, 2), vec![(0, 0), (1, 0)]);
        assert_eq!(
            enumerate_phased(2, 3),
            vec![(0, 0), (0, 1), (1, 0), (1, 1)]
        );
    }

    #[test]
    fn test_unphased_cardinality() {
        for ploidy in 0..6u8 {
            for alleles in 1..6u16 {
                let slots = enumerate_unphased(ploidy, alleles);
                let expected = binomial(
                    u64::from(ploidy) + u64::from(alleles) - 1,
                    u64::from(alleles) - 1,
                ) as usize
                    - 1;
                assert_eq!(slots.len(), expected);
                assert_eq!(slots.len(), unphased_slot_count(ploidy, alleles));
            }
        }
    }

    #[test]
    fn test_unphased_ordering_diploid_biallelic() {
        // Three combinations, the all-alt vector dropped
        assert_eq!(enumerate_unphased(2, 2), vec![vec![2, 0], vec![1, 1]]);
    }

    #[test]
    fn test_unphased_vectors_sum_to_ploidy() {
        for slot in enumerate_unphased(4, 3) {
            assert_eq!(slot.iter().map(|&c| u32::from(c)).sum::<u32>(), 4);
            assert_eq!(slot.len(), 3);
        }
    }

    #[test]
    fn test_unphased_restartable() {
        // No internal state: identical inputs give identical output
        assert_eq!(enumerate_unphased(3, 3), enumerate_unphased(3, 3));
        assert_eq!(enumerate_phased(3, 3), enumerate_phased(3, 3));
    }

    #[test]
    fn test_diploid_biallelic_counts_match() {
        // ploidy=2, alleles=2: phased and unphased both yield 2 entries
        assert_eq!(enumerate_phased(2, 2).len(), 2);
        assert_eq!(enumerate_unphased(2, 2).len(), 2);
    }

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(3, 1), 3);
        assert_eq!(binomial(5, 2), 10);
        assert_eq!(binomial(4, 0), 1);
        assert_eq!(binomial(2, 5), 0);
    }
}
