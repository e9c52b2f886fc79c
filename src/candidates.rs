use crate::cancel::CancelToken;
use crate::config::DesignConfig;
use crate::dna_sequence::DnaSequence;
use crate::error::DesignError;
use crate::geometry::{GeometryRule, GeometryViolation};
use crate::primer::{Primer, PrimerRole};
use crate::region::{Region, Strand};
use crate::thermodynamics::{end_stability, free_energy, melting_temperature, predict_hairpin};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

lazy_static! {
    /// Simple-sequence motifs penalized during scoring. Each distinct
    /// pattern found counts once.
    static ref REPEAT_RE: Regex = Regex::new("AAAA|TTTT|GGGG|CCCC|ATAT|GCGC").unwrap();
}

/// Which template strand each role anneals to. The inner-c and loop-F
/// roles read the opposite strand from their neighbors, which is what
/// lets the loop structures form.
pub fn role_strand(role: PrimerRole) -> Strand {
    match role {
        PrimerRole::F3 | PrimerRole::F2 | PrimerRole::B1c | PrimerRole::LB => Strand::Forward,
        PrimerRole::F1c | PrimerRole::B2 | PrimerRole::B3 | PrimerRole::LF => Strand::Reverse,
        // Composite primers are reported on the forward strand; their
        // halves carry the real orientations.
        PrimerRole::FIP | PrimerRole::BIP => Strand::Forward,
    }
}

/// Number of distinct penalized repeat motifs in the sequence.
fn repeat_pattern_count(seq: &str) -> usize {
    let mut seen: HashSet<&str> = HashSet::new();
    for m in REPEAT_RE.find_iter(seq) {
        seen.insert(m.as_str());
    }
    seen.len()
}

/// A sequence dominated by one base (>60%) or built from a short tandem
/// motif repeated three or more times.
fn is_low_complexity(seq: &[u8]) -> bool {
    let n = seq.len();
    if n == 0 {
        return false;
    }
    for base in [b'A', b'C', b'G', b'T'] {
        let count = seq.iter().filter(|&&c| c == base).count();
        if count as f64 / n as f64 > 0.6 {
            return true;
        }
    }
    for m in 2..=4usize {
        if n % m == 0 && n / m >= 3 {
            let motif = &seq[..m];
            if seq.chunks(m).all(|chunk| chunk == motif) {
                return true;
            }
        }
    }
    false
}

fn gc_fraction_of(seq: &[u8]) -> f64 {
    let gc = seq
        .iter()
        .filter(|&&c| c == b'G' || c == b'C' || c == b'S')
        .count();
    gc as f64 / seq.len() as f64
}

/// Why a window was discarded by the hard filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rejection {
    TmOutOfRange,
    GcOutOfRange,
    HairpinTooStable,
}

/// Tally of examined windows and per-filter rejections; the dominant
/// counter names the binding constraint in failure reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionStats {
    pub examined: u64,
    pub tm_out_of_range: u64,
    pub gc_out_of_range: u64,
    pub hairpin_too_stable: u64,
}

impl RejectionStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::TmOutOfRange => self.tm_out_of_range += 1,
            Rejection::GcOutOfRange => self.gc_out_of_range += 1,
            Rejection::HairpinTooStable => self.hairpin_too_stable += 1,
        }
    }

    /// Name of the filter that discarded the most windows.
    pub fn dominant(&self) -> &'static str {
        let counters = [
            (self.tm_out_of_range, "melting temperature window"),
            (self.gc_out_of_range, "GC content window"),
            (self.hairpin_too_stable, "hairpin stability floor"),
        ];
        counters
            .iter()
            .max_by_key(|(count, _)| *count)
            .map(|(_, name)| *name)
            .unwrap_or("melting temperature window")
    }
}

/// Every accepted candidate for one role, best first, plus the scan
/// statistics and a start-ordered index so the assembler can pull the
/// best candidates inside a coordinate window without walking the whole
/// list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidates {
    role: PrimerRole,
    ranked: Vec<Primer>,
    by_start: Vec<usize>,
    stats: RejectionStats,
}

impl RankedCandidates {
    #[inline(always)]
    pub fn role(&self) -> PrimerRole {
        self.role
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[Primer] {
        &self.ranked
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn top(&self, k: usize) -> &[Primer] {
        &self.ranked[..k.min(self.ranked.len())]
    }

    /// The best-ranked candidates whose region starts inside `starts`
    /// and ends at or before `max_end`, at most `cap` of them.
    pub fn in_window(
        &self,
        starts: std::ops::Range<usize>,
        max_end: usize,
        cap: usize,
    ) -> Vec<&Primer> {
        if starts.start >= starts.end || cap == 0 {
            return Vec::new();
        }
        let lo = self
            .by_start
            .partition_point(|&i| self.ranked[i].region().start() < starts.start);
        let hi = self
            .by_start
            .partition_point(|&i| self.ranked[i].region().start() < starts.end);
        let mut picked: Vec<usize> = self.by_start[lo..hi]
            .iter()
            .copied()
            .filter(|&i| self.ranked[i].region().end() <= max_end)
            .collect();
        // Index order in `ranked` is rank order.
        picked.sort_unstable();
        picked.truncate(cap);
        picked.into_iter().map(|i| &self.ranked[i]).collect()
    }

    #[inline(always)]
    pub fn stats(&self) -> &RejectionStats {
        &self.stats
    }

    /// Fail with the binding constraint when the scan produced nothing.
    pub fn require_nonempty(&self) -> Result<(), DesignError> {
        if self.ranked.is_empty() {
            Err(DesignError::InsufficientCandidates {
                role: Some(self.role),
                dominant_constraint: self.stats.dominant().to_string(),
                examined: self.stats.examined,
            })
        } else {
            Ok(())
        }
    }
}

fn mean_variability(variability: Option<&[f64]>, region: &Region) -> f64 {
    match variability {
        Some(profile) if region.end() <= profile.len() => {
            let window = &profile[region.start()..region.end()];
            window.iter().sum::<f64>() / window.len() as f64
        }
        _ => 0.0,
    }
}

/// Penalty-subtraction score over the soft criteria, clamped to [0,100].
fn score_profile(
    tm_celsius: f64,
    gc: f64,
    end_dg: f64,
    sequence: &str,
    variability: f64,
    config: &DesignConfig,
) -> f64 {
    let w = &config.weights;
    let mut score = 100.0;
    score -= w.tm_per_degree * (tm_celsius - config.tm_opt_c).abs();
    score -= w.gc_per_point * (gc - config.gc_opt).abs() * 100.0;
    score -= w.end_per_kcal * (end_dg - config.end_stability_opt_kcal).abs();
    score -= w.repeat_pattern * repeat_pattern_count(sequence) as f64;
    if is_low_complexity(sequence.as_bytes()) {
        score -= w.low_complexity;
    }
    score -= w.variability * variability;
    score.max(0.0)
}

fn evaluate_window(
    template: &DnaSequence,
    role: PrimerRole,
    region: Region,
    variability: Option<&[f64]>,
    config: &DesignConfig,
) -> Result<Result<(Primer, f64), Rejection>, DesignError> {
    let oriented = template.slice(&region)?;
    let seq = oriented.as_bytes();

    let tm = melting_temperature(seq, config.na_conc_m, config.primer_conc_m)?;
    if tm.celsius() < config.tm_min_c || tm.celsius() > config.tm_max_c {
        return Ok(Err(Rejection::TmOutOfRange));
    }

    let gc = gc_fraction_of(seq);
    if gc < config.gc_min || gc > config.gc_max {
        return Ok(Err(Rejection::GcOutOfRange));
    }

    let hairpin = predict_hairpin(seq)?;
    let hairpin_dg = hairpin.map(|f| f.delta_g());
    if let Some(dg) = hairpin_dg {
        if dg <= config.hairpin_floor_kcal {
            return Ok(Err(Rejection::HairpinTooStable));
        }
    }

    let end_dg = end_stability(seq, config.end_window)?;
    let end_dev = (end_dg - config.end_stability_opt_kcal).abs();
    let delta_g = free_energy(seq, 37.0)?;
    let sequence = oriented.to_string();
    let score = score_profile(
        tm.celsius(),
        gc,
        end_dg,
        &sequence,
        mean_variability(variability, &region),
        config,
    );

    let primer = Primer::new(
        role,
        region,
        vec![(role, region)],
        sequence,
        template.name(),
        tm.celsius(),
        tm.is_approximate(),
        gc,
        delta_g,
        hairpin_dg,
        score,
    );
    Ok(Ok((primer, end_dev)))
}

/// Scan every allowed window of `span` for one role, filter, score and
/// rank. Every accepted window is kept; the assembler applies the
/// per-role budget window by window. Windows are evaluated in parallel;
/// the cancel token is honored per window.
pub fn generate_candidates(
    template: &DnaSequence,
    role: PrimerRole,
    span: &Region,
    variability: Option<&[f64]>,
    config: &DesignConfig,
    cancel: &CancelToken,
) -> Result<RankedCandidates, DesignError> {
    if span.end() > template.len() {
        return Err(GeometryViolation::new(
            GeometryRule::RegionBounds,
            format!("end <= {} (length of '{}')", template.len(), template.name()),
            span.to_string(),
        )
        .into());
    }
    let range = config.primer_lengths.for_role(role);
    let strand = role_strand(role);

    let mut windows = Vec::new();
    for len in range.min..=range.max {
        if len > span.len() {
            break;
        }
        for start in span.start()..=(span.end() - len) {
            windows.push(Region::new(start, start + len, strand)?);
        }
    }

    let outcomes: Vec<Result<(Primer, f64), Rejection>> = windows
        .into_par_iter()
        .map(|region| {
            cancel.check()?;
            evaluate_window(template, role, region, variability, config)
        })
        .collect::<Result<Vec<_>, DesignError>>()?;

    let mut stats = RejectionStats {
        examined: outcomes.len() as u64,
        ..RejectionStats::default()
    };
    let mut keyed = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(accepted) => keyed.push(accepted),
            Err(rejection) => stats.record(rejection),
        }
    }

    // Stable sort keeps scan order as the final tie-breaker; ties on
    // score break toward the 3'-end ΔG closest to its optimum, then
    // toward the middle of the searched span.
    let span_center = span.start() + span.len() / 2;
    keyed.sort_by(|(a, a_dev), (b, b_dev)| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a_dev.partial_cmp(b_dev).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| {
                let da = a.region().center().abs_diff(span_center);
                let db = b.region().center().abs_diff(span_center);
                da.cmp(&db)
            })
    });
    let ranked: Vec<Primer> = keyed.into_iter().map(|(primer, _)| primer).collect();

    let mut by_start: Vec<usize> = (0..ranked.len()).collect();
    by_start.sort_by_key(|&i| ranked[i].region().start());

    Ok(RankedCandidates {
        role,
        ranked,
        by_start,
        stats,
    })
}

/// Join two simple candidates into a composite inner primer (FIP from
/// F1c+F2, BIP from B1c+B2). Returns `None` when the joint sequence
/// fails the composite length range or folds below the hairpin floor.
pub(crate) fn build_composite(
    role: PrimerRole,
    five_prime: &Primer,
    three_prime: &Primer,
    template_name: &str,
    config: &DesignConfig,
) -> Result<Option<Primer>, DesignError> {
    debug_assert!(role.is_composite());
    let sequence = format!("{}{}", five_prime.sequence(), three_prime.sequence());
    if !config.primer_lengths.for_role(role).contains(sequence.len()) {
        return Ok(None);
    }

    let hairpin = predict_hairpin(sequence.as_bytes())?;
    let hairpin_dg = hairpin.map(|f| f.delta_g());
    if let Some(dg) = hairpin_dg {
        if dg <= config.hairpin_floor_kcal {
            return Ok(None);
        }
    }

    let tm = melting_temperature(sequence.as_bytes(), config.na_conc_m, config.primer_conc_m)?;
    let delta_g = free_energy(sequence.as_bytes(), 37.0)?;
    let gc = gc_fraction_of(sequence.as_bytes());

    // Parts in template order; FIP's 5' half (F1c) lies downstream of F2.
    let mut parts = vec![
        (five_prime.role(), *five_prime.region()),
        (three_prime.role(), *three_prime.region()),
    ];
    parts.sort_by_key(|(_, region)| region.start());
    let region = five_prime.region().union(three_prime.region());

    // The joint runs hotter than either half by construction, so quality
    // is the mean of the half scores rather than a fresh Tm deviation.
    let score = (five_prime.score() + three_prime.score()) / 2.0;

    Ok(Some(Primer::new(
        role,
        Region::new(region.start(), region.end(), Strand::Forward)?,
        parts,
        sequence,
        template_name,
        tm.celsius(),
        tm.is_approximate(),
        gc,
        delta_g,
        hairpin_dg,
        score,
    )))
}
