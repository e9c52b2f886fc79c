use crate::dna_sequence::reverse_complement_bytes;
use crate::error::DesignError;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Gas constant in cal/(mol·K).
const GAS_CONSTANT: f64 = 1.987;
const KELVIN_OFFSET: f64 = 273.15;
const REFERENCE_TEMP_K: f64 = 310.15; // 37 °C

/// Minimum sequence length the nearest-neighbor model supports.
pub const MIN_SEQUENCE_LENGTH: usize = 2;

/// Minimum stem and loop sizes considered by the fold scans.
const MIN_STEM: usize = 3;
const MIN_LOOP: usize = 3;

/// Folds weaker than this (ΔG in kcal/mol) are reported as "none".
const STABILITY_FLOOR: f64 = -0.5;

/// Stems are only seeded within this many bases of the 5' end. Keeps the
/// hairpin scan linear in sequence length for long inputs; the scan is
/// deliberately not exhaustive beyond the window.
const STEM_SEARCH_WINDOW: usize = 60;

lazy_static! {
    /// Unified DNA/DNA nearest-neighbor parameters (SantaLucia 1998):
    /// dinucleotide -> (ΔH kcal/mol, ΔS cal/(mol·K)).
    static ref NN_STACKS: HashMap<[u8; 2], (f64, f64)> = {
        let mut m = HashMap::new();
        m.insert(*b"AA", (-7.9, -22.2));
        m.insert(*b"AT", (-7.2, -20.4));
        m.insert(*b"AC", (-8.4, -22.4));
        m.insert(*b"AG", (-7.8, -21.0));
        m.insert(*b"TA", (-7.2, -21.3));
        m.insert(*b"TT", (-7.9, -22.2));
        m.insert(*b"TC", (-8.2, -22.2));
        m.insert(*b"TG", (-8.5, -22.7));
        m.insert(*b"CA", (-8.5, -22.7));
        m.insert(*b"CT", (-7.8, -21.0));
        m.insert(*b"CC", (-8.0, -19.9));
        m.insert(*b"CG", (-10.6, -27.2));
        m.insert(*b"GA", (-8.2, -22.2));
        m.insert(*b"GT", (-8.4, -22.4));
        m.insert(*b"GC", (-9.8, -24.4));
        m.insert(*b"GG", (-8.0, -19.9));
        m
    };

    /// Hairpin loop penalties at 37 °C (loop size -> ΔG kcal/mol).
    static ref HAIRPIN_LOOP_PENALTIES: Vec<(usize, f64)> = vec![
        (3, 3.5),
        (4, 3.5),
        (5, 3.3),
        (6, 4.0),
        (7, 4.2),
        (8, 4.3),
        (9, 4.5),
        (10, 4.6),
        (12, 5.0),
        (14, 5.1),
        (16, 5.3),
        (18, 5.5),
        (20, 5.7),
        (25, 6.1),
        (30, 6.3),
    ];
}

/// Tm estimate; `approximate` flags the GC-content fallback used for
/// sequences carrying ambiguity codes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeltingTemperature {
    celsius: f64,
    approximate: bool,
}

impl MeltingTemperature {
    #[inline(always)]
    pub fn celsius(&self) -> f64 {
        self.celsius
    }

    #[inline(always)]
    pub fn is_approximate(&self) -> bool {
        self.approximate
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoldKind {
    Hairpin,
    Dimer,
}

/// A predicted secondary structure: a self-fold or a cross-molecule duplex.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fold {
    kind: FoldKind,
    delta_g: f64,
    position: usize,
    partner_position: usize,
    stem_len: usize,
    loop_len: usize,
}

impl Fold {
    #[inline(always)]
    pub fn kind(&self) -> FoldKind {
        self.kind
    }

    /// ΔG at 37 °C in kcal/mol; more negative is more stable.
    #[inline(always)]
    pub fn delta_g(&self) -> f64 {
        self.delta_g
    }

    #[inline(always)]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline(always)]
    pub fn partner_position(&self) -> usize {
        self.partner_position
    }

    #[inline(always)]
    pub fn stem_len(&self) -> usize {
        self.stem_len
    }

    #[inline(always)]
    pub fn loop_len(&self) -> usize {
        self.loop_len
    }
}

/// Uppercase and fold U to T; the NN tables are DNA-only.
fn normalize(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|c| match c.to_ascii_uppercase() {
            b'U' => b'T',
            other => other,
        })
        .collect()
}

fn ensure_min_length(len: usize) -> Result<(), DesignError> {
    if len < MIN_SEQUENCE_LENGTH {
        Err(DesignError::SequenceTooShort {
            length: len,
            minimum: MIN_SEQUENCE_LENGTH,
        })
    } else {
        Ok(())
    }
}

#[inline(always)]
fn bases_pair(a: u8, b: u8) -> bool {
    matches!(
        (a, b),
        (b'A', b'T') | (b'T', b'A') | (b'C', b'G') | (b'G', b'C')
    )
}

#[inline(always)]
fn stack_delta_g37(pair: [u8; 2]) -> Option<f64> {
    NN_STACKS
        .get(&pair)
        .map(|(dh, ds)| dh - REFERENCE_TEMP_K * ds / 1000.0)
}

/// Sum nearest-neighbor stacks plus terminal initiation corrections.
/// Stacks containing an ambiguity code contribute nothing; the caller is
/// expected to route ambiguous sequences to the GC fallback for Tm.
fn nearest_neighbor_sum(seq: &[u8]) -> (f64, f64) {
    let mut delta_h = 0.0;
    let mut delta_s = 0.0;
    for pair in seq.windows(2) {
        if let Some((dh, ds)) = NN_STACKS.get(&[pair[0], pair[1]]) {
            delta_h += dh;
            delta_s += ds;
        }
    }
    for &terminal in [seq[0], seq[seq.len() - 1]].iter() {
        if terminal == b'G' || terminal == b'C' {
            delta_h += 0.1;
            delta_s += -2.8;
        } else {
            delta_h += 2.3;
            delta_s += 4.1;
        }
    }
    (delta_h, delta_s)
}

/// True for even-length sequences equal to their own reverse complement.
pub fn is_palindromic(seq: &[u8]) -> bool {
    let s = normalize(seq);
    s.len() % 2 == 0 && reverse_complement_bytes(&s) == s
}

/// Duplex melting temperature from the nearest-neighbor model:
/// `Tm = ΔH / (ΔS' + R·ln(Ct/x)) − 273.15`, with the salt-corrected
/// entropy `ΔS' = ΔS + 0.368·(N−1)·ln[Na⁺]` and x = 4 for the
/// non-self-complementary case (1 for palindromes).
///
/// Sequences with ambiguity codes use a GC-content heuristic instead and
/// are flagged approximate.
pub fn melting_temperature(
    seq: &[u8],
    na_conc_m: f64,
    primer_conc_m: f64,
) -> Result<MeltingTemperature, DesignError> {
    ensure_min_length(seq.len())?;
    let s = normalize(seq);

    if s.iter().any(|&c| !matches!(c, b'A' | b'C' | b'G' | b'T')) {
        return Ok(MeltingTemperature {
            celsius: gc_fallback_tm(&s),
            approximate: true,
        });
    }

    let (delta_h, delta_s) = nearest_neighbor_sum(&s);
    let salted_s = delta_s + 0.368 * (s.len() as f64 - 1.0) * na_conc_m.ln();
    let x = if is_palindromic(&s) { 1.0 } else { 4.0 };
    let tm_kelvin = delta_h * 1000.0 / (salted_s + GAS_CONSTANT * (primer_conc_m / x).ln());
    Ok(MeltingTemperature {
        celsius: tm_kelvin - KELVIN_OFFSET,
        approximate: false,
    })
}

/// GC-content Tm heuristic: Wallace rule below 14 nt, the Marmur-Doty
/// style formula above. Same fallback the model uses for ambiguity codes.
fn gc_fallback_tm(seq: &[u8]) -> f64 {
    let gc = seq
        .iter()
        .filter(|&&c| c == b'G' || c == b'C' || c == b'S')
        .count() as f64;
    let len = seq.len() as f64;
    if seq.len() < 14 {
        let at = len - gc;
        2.0 * at + 4.0 * gc
    } else {
        64.9 + 41.0 * (gc - 16.4) / len
    }
}

/// Duplex free energy ΔG = ΔH − T·ΔS at the given temperature, from the
/// same parameter table as the Tm model. kcal/mol.
pub fn free_energy(seq: &[u8], temp_c: f64) -> Result<f64, DesignError> {
    ensure_min_length(seq.len())?;
    let s = normalize(seq);
    let (delta_h, delta_s) = nearest_neighbor_sum(&s);
    Ok(delta_h - (temp_c + KELVIN_OFFSET) * delta_s / 1000.0)
}

/// ΔG at 37 °C of the 3'-terminal window (default window: config's
/// `end_window`). A primer with an unstable 3' end extends poorly; one
/// with an overly stable end misprimes.
pub fn end_stability(seq: &[u8], window: usize) -> Result<f64, DesignError> {
    ensure_min_length(seq.len())?;
    let start = seq.len().saturating_sub(window.max(MIN_SEQUENCE_LENGTH));
    free_energy(&seq[start..], 37.0)
}

fn loop_penalty(loop_len: usize) -> f64 {
    let table = &*HAIRPIN_LOOP_PENALTIES;
    let (last_len, last_dg) = *table.last().unwrap();
    if loop_len > last_len {
        // Jacobson-Stockmayer extrapolation beyond the table
        return last_dg
            + 1.75 * GAS_CONSTANT * REFERENCE_TEMP_K / 1000.0
                * (loop_len as f64 / last_len as f64).ln();
    }
    let mut penalty = table[0].1;
    for &(len, dg) in table.iter() {
        if len <= loop_len {
            penalty = dg;
        }
    }
    penalty
}

/// Scan for the most stable hairpin: complementary stem pairs (≥3 bp)
/// separated by a loop of ≥3 nt, scored as cumulative stem stacking ΔG
/// plus the loop penalty. Returns `None` when nothing reaches the
/// stability floor. Stems are seeded only within `STEM_SEARCH_WINDOW` of
/// the 5' end, which keeps the scan sub-quadratic for long sequences.
pub fn predict_hairpin(seq: &[u8]) -> Result<Option<Fold>, DesignError> {
    ensure_min_length(seq.len())?;
    let s = normalize(seq);
    let n = s.len();
    if n < 2 * MIN_STEM + MIN_LOOP {
        return Ok(None);
    }

    let mut best: Option<Fold> = None;
    let seed_limit = n.min(STEM_SEARCH_WINDOW);
    for i in 0..seed_limit {
        let j_floor = i + 2 * MIN_STEM + MIN_LOOP - 1;
        if j_floor >= n {
            break;
        }
        for j in j_floor..n {
            let mut stem = 0;
            while bases_pair(s[i + stem], s[j - stem])
                && j - i + 1 >= 2 * (stem + 1) + MIN_LOOP
            {
                stem += 1;
            }
            if stem < MIN_STEM {
                continue;
            }
            let mut stem_dg = 0.0;
            for k in 0..stem - 1 {
                if let Some(dg) = stack_delta_g37([s[i + k], s[i + k + 1]]) {
                    stem_dg += dg;
                }
            }
            let loop_len = j - i + 1 - 2 * stem;
            let delta_g = stem_dg + loop_penalty(loop_len);
            let fold = Fold {
                kind: FoldKind::Hairpin,
                delta_g,
                position: i,
                partner_position: j,
                stem_len: stem,
                loop_len,
            };
            if best.map_or(true, |b| delta_g < b.delta_g) {
                best = Some(fold);
            }
        }
    }
    Ok(best.filter(|f| f.delta_g <= STABILITY_FLOOR))
}

/// Best antiparallel pairing run of `a` against `oligo` for one relative
/// orientation. `a` is read 5'→3'; `oligo` is walked 3'→5'.
fn best_duplex_run(a: &[u8], oligo: &[u8]) -> Option<Fold> {
    let la = a.len() as isize;
    let lb = oligo.len() as isize;
    let mut best: Option<Fold> = None;
    for offset in (1 - lb)..la {
        let lo = offset.max(0);
        let hi = la.min(offset + lb);
        let mut run_start = None;
        let mut i = lo;
        while i <= hi {
            let paired = i < hi && {
                // oligo index counted from its 3' end
                let k = (lb - 1 - (i - offset)) as usize;
                bases_pair(a[i as usize], oligo[k])
            };
            if paired {
                run_start.get_or_insert(i);
            } else if let Some(start) = run_start.take() {
                let run = (i - start) as usize;
                if run >= MIN_STEM {
                    let mut dg = 0.0;
                    for k in start..i - 1 {
                        if let Some(g) = stack_delta_g37([a[k as usize], a[k as usize + 1]]) {
                            dg += g;
                        }
                    }
                    let fold = Fold {
                        kind: FoldKind::Dimer,
                        delta_g: dg,
                        position: start as usize,
                        partner_position: (lb - 1 - (start - offset)) as usize,
                        stem_len: run,
                        loop_len: 0,
                    };
                    if best.map_or(true, |b| fold.delta_g < b.delta_g) {
                        best = Some(fold);
                    }
                }
            }
            i += 1;
        }
    }
    best
}

/// Scan for the most stable inter-molecular duplex between `a` and `b`,
/// considering both relative orientations (`b` and its reverse
/// complement). Pure and deterministic; returns `None` when nothing
/// reaches the stability floor. Self-dimers via `predict_dimer(a, a)`.
pub fn predict_dimer(a: &[u8], b: &[u8]) -> Result<Option<Fold>, DesignError> {
    ensure_min_length(a.len())?;
    ensure_min_length(b.len())?;
    let a = normalize(a);
    let b = normalize(b);
    let b_rc = reverse_complement_bytes(&b);

    let mut best = best_duplex_run(&a, &b);
    if let Some(alt) = best_duplex_run(&a, &b_rc) {
        if best.map_or(true, |f| alt.delta_g < f.delta_g) {
            best = Some(alt);
        }
    }
    Ok(best.filter(|f| f.delta_g <= STABILITY_FLOOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NA: f64 = 0.05;
    const CT: f64 = 1e-7;

    #[test]
    fn test_tm_simple_sequence() {
        let tm = melting_temperature(b"ATCGATCGATCG", NA, CT).unwrap();
        assert!(!tm.is_approximate());
        assert!(tm.celsius() > 30.0 && tm.celsius() < 80.0);
    }

    #[test]
    fn test_tm_gc_rich_above_at_rich() {
        let gc = melting_temperature(b"GCGCGCGCGCGC", NA, CT).unwrap();
        let at = melting_temperature(b"ATATATATATATAT", NA, CT).unwrap();
        assert!(gc.celsius() > at.celsius());
    }

    #[test]
    fn test_tm_deterministic() {
        let first = melting_temperature(b"ATGACCATTACCAGAGGT", NA, CT).unwrap();
        for _ in 0..10 {
            assert_eq!(melting_temperature(b"ATGACCATTACCAGAGGT", NA, CT).unwrap(), first);
        }
    }

    #[test]
    fn test_tm_salt_effect() {
        let low = melting_temperature(b"ATCGATCGATCG", 0.01, CT).unwrap();
        let high = melting_temperature(b"ATCGATCGATCG", 0.1, CT).unwrap();
        assert!(high.celsius() > low.celsius());
    }

    #[test]
    fn test_tm_too_short() {
        assert_eq!(
            melting_temperature(b"A", NA, CT),
            Err(DesignError::SequenceTooShort {
                length: 1,
                minimum: MIN_SEQUENCE_LENGTH
            })
        );
        assert!(melting_temperature(b"AT", NA, CT).is_ok());
    }

    #[test]
    fn test_tm_rna_equivalent() {
        let dna = melting_temperature(b"ATCGATCGATCG", NA, CT).unwrap();
        let rna = melting_temperature(b"AUCGAUCGAUCG", NA, CT).unwrap();
        assert!((dna.celsius() - rna.celsius()).abs() < 0.1);
    }

    #[test]
    fn test_tm_ambiguous_falls_back() {
        let tm = melting_temperature(b"ATCGNATCGATCGR", NA, CT).unwrap();
        assert!(tm.is_approximate());
        assert!(tm.celsius() > 0.0);
    }

    #[test]
    fn test_tm_homopolymers() {
        let a = melting_temperature(b"AAAAAAAAAA", NA, CT).unwrap();
        let g = melting_temperature(b"GGGGGGGGGG", NA, CT).unwrap();
        assert!(g.celsius() > a.celsius());
    }

    #[test]
    fn test_tm_expected_ranges() {
        for (seq, lo, hi) in [
            (&b"ATATATATATATATAT"[..], 10.0, 50.0),
            (&b"GCGCGCGCGCGCGCGC"[..], 55.0, 90.0),
            (&b"ATCGATCGATCGATCG"[..], 35.0, 70.0),
        ] {
            let tm = melting_temperature(seq, NA, CT).unwrap().celsius();
            assert!(tm >= lo && tm <= hi, "Tm {tm} out of [{lo},{hi}]");
        }
    }

    #[test]
    fn test_palindromic_detection() {
        assert!(is_palindromic(b"GAATTC"));
        assert!(is_palindromic(b"ATAT"));
        assert!(!is_palindromic(b"ATCG"));
        assert!(!is_palindromic(b"ATCGATCG"));
        assert!(!is_palindromic(b"ATA")); // odd length can never pair fully
    }

    #[test]
    fn test_free_energy_stable_duplex() {
        let dg = free_energy(b"ATCGATCGATCG", 37.0).unwrap();
        assert!(dg < 0.0);
        // hotter means less stable
        let dg_hot = free_energy(b"ATCGATCGATCG", 65.0).unwrap();
        assert!(dg_hot > dg);
    }

    #[test]
    fn test_end_stability() {
        let dg = end_stability(b"ATCGATCGATCG", 5).unwrap();
        assert!(dg > -20.0 && dg < 5.0);
        // window longer than the sequence degrades to the whole sequence
        let whole = end_stability(b"ATG", 5).unwrap();
        assert!(whole.is_finite());
    }

    #[test]
    fn test_loop_penalty_monotonic_extrapolation() {
        assert!(loop_penalty(50) > loop_penalty(6));
        assert!(loop_penalty(30) >= loop_penalty(3) - 0.3);
        assert_eq!(loop_penalty(3), 3.5);
        assert_eq!(loop_penalty(11), 4.6); // nearest smaller table entry
    }

    #[test]
    fn test_hairpin_strong_structure() {
        let fold = predict_hairpin(b"GCGCGCGCAAAAGCGCGCGC").unwrap();
        let fold = fold.expect("strong hairpin expected");
        assert_eq!(fold.kind(), FoldKind::Hairpin);
        assert!(fold.delta_g() < -3.0);
        assert!(fold.stem_len() >= MIN_STEM);
        assert!(fold.loop_len() >= MIN_LOOP);
    }

    #[test]
    fn test_hairpin_none_for_unstructured() {
        assert_eq!(predict_hairpin(b"AAAAAAAAAAAAAAAA").unwrap(), None);
    }

    #[test]
    fn test_hairpin_short_sequence_is_none_not_error() {
        assert_eq!(predict_hairpin(b"ATCGA").unwrap(), None);
        assert!(predict_hairpin(b"A").is_err());
    }

    #[test]
    fn test_dimer_complementary_sequences() {
        let fold = predict_dimer(b"ATCGATCGATCG", b"CGATCGATCGAT").unwrap();
        let fold = fold.expect("complementary 12-mers must dimerize");
        assert_eq!(fold.kind(), FoldKind::Dimer);
        assert!(fold.delta_g() < -5.0);
        assert!(fold.stem_len() >= MIN_STEM);
    }

    #[test]
    fn test_dimer_no_interaction() {
        assert_eq!(predict_dimer(b"AAAAAAAAAAAAA", b"GGGGGGGGGGGG").unwrap(), None);
    }

    #[test]
    fn test_dimer_deterministic() {
        let a = predict_dimer(b"ATCGGCTAGCTAAC", b"GTTAGCTAGCCGAT").unwrap();
        let b = predict_dimer(b"ATCGGCTAGCTAAC", b"GTTAGCTAGCCGAT").unwrap();
        assert_eq!(a, b);
    }
}
