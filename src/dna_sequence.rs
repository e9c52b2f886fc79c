use crate::error::DesignError;
use crate::geometry::{GeometryRule, GeometryViolation};
use crate::iupac_code::IupacCode;
use crate::region::{Region, Strand};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated, immutable nucleotide sequence with an identifier.
///
/// Created once at ingestion via [`DnaSequence::validate`]; every stored
/// symbol is an uppercase IUPAC code. There are no mutating accessors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnaSequence {
    name: String,
    seq: Vec<u8>,
}

impl DnaSequence {
    /// Validate raw input into a sequence. Whitespace is stripped and case
    /// folded; any remaining non-IUPAC character fails with its position.
    /// Empty input fails. U is kept as-is (treated as T downstream).
    pub fn validate(name: &str, raw: &str) -> Result<Self, DesignError> {
        let mut seq = Vec::with_capacity(raw.len());
        for c in raw.chars().filter(|c| !c.is_whitespace()) {
            if c.is_ascii() && IupacCode::is_valid_letter(c as u8) {
                seq.push((c as u8).to_ascii_uppercase());
            } else {
                return Err(DesignError::InvalidSequence {
                    name: name.to_string(),
                    position: seq.len(),
                    symbol: c,
                });
            }
        }
        if seq.is_empty() {
            return Err(DesignError::EmptySequence {
                name: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            seq,
        })
    }

    /// Construct from bytes already known to be uppercase IUPAC.
    pub(crate) fn from_validated(name: &str, seq: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            seq,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.seq
    }

    #[inline(always)]
    pub fn base(&self, i: usize) -> Option<u8> {
        self.seq.get(i).copied()
    }

    /// Fraction of G/C bases (the two-fold code S counts as G-or-C).
    pub fn gc_fraction(&self) -> f64 {
        let gc = self
            .seq
            .iter()
            .filter(|&&c| c == b'G' || c == b'C' || c == b'S')
            .count();
        gc as f64 / self.seq.len() as f64
    }

    /// True if any symbol is outside the unambiguous A/C/G/T(/U) set.
    pub fn has_ambiguity(&self) -> bool {
        self.seq
            .iter()
            .any(|&c| !IupacCode::is_unambiguous_letter(c))
    }

    pub fn reverse_complement(&self) -> DnaSequence {
        let seq = reverse_complement_bytes(&self.seq);
        Self {
            name: self.name.clone(),
            seq,
        }
    }

    /// Strand-aware slice: a reverse-strand region yields the reverse
    /// complement of the forward-strand text.
    pub fn slice(&self, region: &Region) -> Result<DnaSequence, DesignError> {
        if region.end() > self.seq.len() {
            return Err(GeometryViolation::new(
                GeometryRule::RegionBounds,
                format!("end <= {} (length of '{}')", self.seq.len(), self.name),
                region.to_string(),
            )
            .into());
        }
        let forward = &self.seq[region.start()..region.end()];
        let seq = match region.strand() {
            Strand::Forward => forward.to_vec(),
            Strand::Reverse => reverse_complement_bytes(forward),
        };
        Ok(Self {
            name: self.name.clone(),
            seq,
        })
    }
}

/// Reverse complement over the full IUPAC alphabet.
pub fn reverse_complement_bytes(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&c| IupacCode::letter_complement(c))
        .collect()
}

impl fmt::Display for DnaSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_symbol() {
        let err = DnaSequence::validate("bad", "ATCGXATCG").unwrap_err();
        assert_eq!(
            err,
            DesignError::InvalidSequence {
                name: "bad".to_string(),
                position: 4,
                symbol: 'X',
            }
        );
    }

    #[test]
    fn test_validate_rejects_empty() {
        let err = DnaSequence::validate("empty", "  \n ").unwrap_err();
        assert_eq!(
            err,
            DesignError::EmptySequence {
                name: "empty".to_string()
            }
        );
    }

    #[test]
    fn test_validate_folds_case_and_whitespace() {
        let dna = DnaSequence::validate("mixed", "at cg\nTA").unwrap();
        assert_eq!(dna.as_bytes(), b"ATCGTA");
        assert_eq!(dna.len(), 6);
    }

    #[test]
    fn test_reverse_complement_simple() {
        let dna = DnaSequence::validate("s", "ATCG").unwrap();
        assert_eq!(dna.reverse_complement().to_string(), "CGAT");
    }

    #[test]
    fn test_reverse_complement_ambiguous() {
        let dna = DnaSequence::validate("amb", "ATCGNRYKMSWBDHV").unwrap();
        assert_eq!(dna.reverse_complement().to_string(), "BDHVWSKMRYNCGAT");
    }

    #[test]
    fn test_reverse_complement_involution() {
        for raw in ["ATCGATCG", "GGGGCCCC", "ATCGNRYKMSWBDHV", "A"] {
            let dna = DnaSequence::validate("s", raw).unwrap();
            assert_eq!(dna.reverse_complement().reverse_complement(), dna);
        }
    }

    #[test]
    fn test_gc_fraction_bounds_and_symmetry() {
        for raw in ["ATCGATCG", "AAAA", "GGGG", "GCSSAT", "ATCGNRYK"] {
            let dna = DnaSequence::validate("s", raw).unwrap();
            let gc = dna.gc_fraction();
            assert!((0.0..=1.0).contains(&gc));
            assert!((gc - dna.reverse_complement().gc_fraction()).abs() < 1e-12);
        }
        let half = DnaSequence::validate("s", "AAAGGGTTTCCC").unwrap();
        assert!((half.gc_fraction() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_slice_strand_aware() {
        let dna = DnaSequence::validate("s", "AATTCCGG").unwrap();
        let fwd = Region::new(2, 6, Strand::Forward).unwrap();
        let rev = Region::new(2, 6, Strand::Reverse).unwrap();
        assert_eq!(dna.slice(&fwd).unwrap().to_string(), "TTCC");
        assert_eq!(dna.slice(&rev).unwrap().to_string(), "GGAA");
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let dna = DnaSequence::validate("s", "AATTCCGG").unwrap();
        let region = Region::new(4, 9, Strand::Forward).unwrap();
        assert!(dna.slice(&region).is_err());
    }

    #[test]
    fn test_has_ambiguity() {
        assert!(!DnaSequence::validate("s", "ATCGU").unwrap().has_ambiguity());
        assert!(DnaSequence::validate("s", "ATCGN").unwrap().has_ambiguity());
        assert!(DnaSequence::validate("s", "ATCRG").unwrap().has_ambiguity());
    }
}
