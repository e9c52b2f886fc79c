use crate::cancel::CancelToken;
use crate::config::DesignConfig;
use crate::dna_sequence::DnaSequence;
use crate::error::DesignError;
use crate::iupac_code::IupacCode;
use crate::primer::PrimerSet;
use crate::region::{Region, Strand};
use serde::{Deserialize, Serialize};

const GAP: u8 = b'-';

/// Multiple-alignment collaborator. Implementations return one gapped
/// row per input sequence, all rows the same length, using `-` for gaps.
pub trait Aligner {
    fn align(&self, sequences: &[DnaSequence]) -> Result<Vec<Vec<u8>>, DesignError>;
}

/// Aligner for inputs that are already the same length (re-sequenced
/// variants of one locus). Anything else needs a real alignment backend.
pub struct EqualLengthAligner;

impl Aligner for EqualLengthAligner {
    fn align(&self, sequences: &[DnaSequence]) -> Result<Vec<Vec<u8>>, DesignError> {
        let len = sequences
            .first()
            .map(|s| s.len())
            .ok_or_else(|| DesignError::Alignment {
                message: "no sequences to align".to_string(),
            })?;
        for s in sequences {
            if s.len() != len {
                return Err(DesignError::Alignment {
                    message: format!(
                        "sequence {} is {} nt, expected {} to match the first input",
                        s.name(),
                        s.len(),
                        len
                    ),
                });
            }
        }
        Ok(sequences.iter().map(|s| s.as_bytes().to_vec()).collect())
    }
}

/// A consensus built from an alignment: the callable template plus a
/// per-position variability profile in [0,1].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusTemplate {
    template: DnaSequence,
    variability: Vec<f64>,
    dropped_columns: usize,
}

impl ConsensusTemplate {
    #[inline(always)]
    pub fn template(&self) -> &DnaSequence {
        &self.template
    }

    /// One entry per template position: fraction of aligned rows that
    /// disagree with the majority symbol there.
    #[inline(always)]
    pub fn variability(&self) -> &[f64] {
        &self.variability
    }

    /// Alignment columns discarded because most rows had a gap there.
    #[inline(always)]
    pub fn dropped_columns(&self) -> usize {
        self.dropped_columns
    }

    /// Positions whose variability exceeds the configured threshold.
    pub fn variable_positions(&self, config: &DesignConfig) -> Vec<usize> {
        self.variability
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > config.variability_threshold)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Column-wise majority consensus over gapped rows.
///
/// Gap-majority columns are dropped. Elsewhere the majority base wins,
/// ties resolved in the fixed order A, C, G, T; when the runner-up also
/// carries at least `degenerate_min_fraction` of the non-gap rows, the
/// two-base degenerate code is emitted instead. Variability is the
/// non-majority fraction of the non-gap rows.
pub fn build_consensus(
    name: &str,
    rows: &[Vec<u8>],
    config: &DesignConfig,
) -> Result<ConsensusTemplate, DesignError> {
    let width = rows
        .first()
        .map(|r| r.len())
        .ok_or_else(|| DesignError::Alignment {
            message: "empty alignment".to_string(),
        })?;
    for row in rows {
        if row.len() != width {
            return Err(DesignError::Alignment {
                message: format!("ragged alignment: row of {} vs {}", row.len(), width),
            });
        }
    }

    let mut seq = Vec::with_capacity(width);
    let mut variability = Vec::with_capacity(width);
    let mut dropped_columns = 0usize;

    for col in 0..width {
        let mut counts = [0usize; 4]; // A C G T
        let mut gaps = 0usize;
        for row in rows {
            match row[col].to_ascii_uppercase() {
                b'A' => counts[0] += 1,
                b'C' => counts[1] += 1,
                b'G' => counts[2] += 1,
                b'T' | b'U' => counts[3] += 1,
                GAP => gaps += 1,
                // Ambiguity codes in the input count as disagreement.
                _ => {}
            }
        }
        if gaps * 2 > rows.len() {
            dropped_columns += 1;
            continue;
        }
        let non_gap = rows.len() - gaps;
        if non_gap == 0 {
            dropped_columns += 1;
            continue;
        }

        const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];
        let mut order: [usize; 4] = [0, 1, 2, 3];
        // Stable by count descending keeps the A,C,G,T tie priority.
        order.sort_by_key(|&i| std::cmp::Reverse(counts[i]));
        let (first, second) = (order[0], order[1]);

        let majority = counts[first];
        let runner_up = counts[second];
        let min_degenerate =
            (config.degenerate_min_fraction * non_gap as f64).ceil() as usize;
        let symbol = if runner_up >= min_degenerate.max(1)
            && majority as f64 / non_gap as f64 >= config.degenerate_min_fraction
        {
            IupacCode::degenerate_letter(BASES[first], BASES[second])
        } else {
            BASES[first]
        };
        seq.push(symbol);
        variability.push(1.0 - majority as f64 / non_gap as f64);
    }

    if seq.is_empty() {
        return Err(DesignError::Alignment {
            message: "consensus is empty after dropping gap columns".to_string(),
        });
    }

    Ok(ConsensusTemplate {
        template: DnaSequence::from_validated(name, seq),
        variability,
        dropped_columns,
    })
}

/// A consensus design run: the derived template and the ranked sets
/// designed on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusDesign {
    pub consensus: ConsensusTemplate,
    pub sets: Vec<PrimerSet>,
}

/// Design primer sets against the consensus of several related
/// sequences. Variability steers scoring toward conserved footprints but
/// never excludes a region outright.
pub fn design_consensus_primers(
    name: &str,
    sequences: &[DnaSequence],
    aligner: &dyn Aligner,
    config: &DesignConfig,
    cancel: &CancelToken,
) -> Result<ConsensusDesign, DesignError> {
    config.validate()?;
    // One sequence has no variation to summarize; that is a plain
    // single-template design, not a consensus.
    if sequences.len() < 2 {
        return Err(DesignError::Alignment {
            message: format!(
                "consensus requires at least 2 sequences, got {}",
                sequences.len()
            ),
        });
    }
    let rows = aligner.align(sequences)?;
    let consensus = build_consensus(name, &rows, config)?;

    let span = Region::new(0, consensus.template().len(), Strand::Forward)?;
    let sets = crate::assembler::design_on(
        consensus.template(),
        &span,
        Some(consensus.variability()),
        config,
        cancel,
    )?;
    Ok(ConsensusDesign { consensus, sets })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dna(name: &str, raw: &str) -> DnaSequence {
        DnaSequence::validate(name, raw).unwrap()
    }

    #[test]
    fn test_identical_rows_give_zero_variability() {
        let config = DesignConfig::default();
        let rows = vec![b"ATCGATCG".to_vec(); 4];
        let consensus = build_consensus("c", &rows, &config).unwrap();
        assert_eq!(consensus.template().to_string(), "ATCGATCG");
        assert!(consensus.variability().iter().all(|&v| v == 0.0));
        assert_eq!(consensus.dropped_columns(), 0);
        assert!(consensus.variable_positions(&config).is_empty());
    }

    #[test]
    fn test_majority_and_tie_priority() {
        let config = DesignConfig::default();
        // Column 0: A,A,G -> A. Column 1: 50/50 C vs T with
        // degenerate_min_fraction met -> Y.
        let rows = vec![
            b"AC".to_vec(),
            b"AC".to_vec(),
            b"GT".to_vec(),
            b"AT".to_vec(),
        ];
        let consensus = build_consensus("c", &rows, &config).unwrap();
        let text = consensus.template().to_string();
        assert_eq!(&text[0..1], "A");
        assert_eq!(&text[1..2], "Y");
        assert!((consensus.variability()[0] - 0.25).abs() < 1e-12);
        assert!((consensus.variability()[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_minor_variant_stays_plain() {
        let mut config = DesignConfig::default();
        config.degenerate_min_fraction = 0.3;
        // 1 of 5 rows differs: below the degenerate floor, so the
        // majority base is emitted and the variability recorded.
        let rows = vec![
            b"A".to_vec(),
            b"A".to_vec(),
            b"A".to_vec(),
            b"A".to_vec(),
            b"G".to_vec(),
        ];
        let consensus = build_consensus("c", &rows, &config).unwrap();
        assert_eq!(consensus.template().to_string(), "A");
        assert!((consensus.variability()[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_gap_majority_columns_dropped() {
        let config = DesignConfig::default();
        let rows = vec![
            b"A-CG".to_vec(),
            b"A-CG".to_vec(),
            b"ATCG".to_vec(),
        ];
        let consensus = build_consensus("c", &rows, &config).unwrap();
        assert_eq!(consensus.template().to_string(), "ACG");
        assert_eq!(consensus.dropped_columns(), 1);
        assert_eq!(consensus.variability().len(), 3);
    }

    #[test]
    fn test_equal_length_aligner_rejects_ragged_input() {
        let seqs = vec![dna("a", "ATCG"), dna("b", "ATCGA")];
        let err = EqualLengthAligner.align(&seqs).unwrap_err();
        assert!(matches!(err, DesignError::Alignment { .. }));
    }

    #[test]
    fn test_tie_priority_order() {
        let config = DesignConfig::default();
        // Exact A/G tie: A wins the majority slot, G qualifies as
        // runner-up, so the degenerate R is emitted.
        let rows = vec![b"A".to_vec(), b"G".to_vec()];
        let consensus = build_consensus("c", &rows, &config).unwrap();
        assert_eq!(consensus.template().to_string(), "R");
    }

    #[test]
    fn test_fewer_than_two_sequences_rejected() {
        let config = DesignConfig::default();
        let cancel = CancelToken::new();
        for seqs in [vec![], vec![dna("v1", "ATCGATCGATCGATCGATCG")]] {
            let err =
                design_consensus_primers("cons", &seqs, &EqualLengthAligner, &config, &cancel)
                    .unwrap_err();
            match err {
                DesignError::Alignment { message } => {
                    assert!(message.contains("at least 2"), "{message}");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_identical_inputs_match_direct_design() {
        const TEMPLATE: &str = concat!(
            "ATGGCGTTCAGGCAAATCGGTGCATGCCTAACGTTGCAGCCTTGATCGGCATTACGGATC",
            "GATTACACCAGGTTCATGACCTGGTAGTTCAACCTGGTAACGGTACCAGATCACTGGCAT",
            "TGACCATTACCAGAGGTCAGGTTCAACTGGTGTGAGGTTACCAGGATCAC",
        );
        let mut config = DesignConfig::default();
        config.tm_min_c = 0.0;
        config.tm_max_c = 120.0;
        config.gc_min = 0.0;
        config.gc_max = 1.0;
        config.hairpin_floor_kcal = -30.0;
        config.tm_spread_max_c = 300.0;
        config.max_sets = 1;
        config.validate().unwrap();
        let cancel = CancelToken::new();
        let seqs = vec![dna("v1", TEMPLATE), dna("v2", TEMPLATE), dna("v3", TEMPLATE)];
        let design =
            design_consensus_primers("cons", &seqs, &EqualLengthAligner, &config, &cancel)
                .unwrap();
        assert_eq!(design.consensus.template().to_string(), TEMPLATE);
        assert!(design.consensus.variability().iter().all(|&v| v == 0.0));
        let template = dna("cons", TEMPLATE);
        let span = Region::new(0, template.len(), Strand::Forward).unwrap();
        let direct =
            crate::assembler::design_primers(&template, &span, &config, &cancel).unwrap();
        assert_eq!(design.sets[0].amplicon(), direct[0].amplicon());
    }
}
