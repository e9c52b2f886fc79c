use crate::cancel::CancelToken;
use crate::candidates::{build_composite, generate_candidates, RankedCandidates};
use crate::config::DesignConfig;
use crate::dna_sequence::DnaSequence;
use crate::error::DesignError;
use crate::primer::{Primer, PrimerRole, PrimerSet};
use crate::region::{Region, Strand};

/// Why assembled layouts were discarded, tallied so a failed run can
/// name its binding constraint.
#[derive(Clone, Copy, Debug, Default)]
struct AssemblyTally {
    examined: u64,
    amplicon: u64,
    composite: u64,
    tm_spread: u64,
}

impl AssemblyTally {
    fn dominant(&self) -> &'static str {
        let counters = [
            (self.amplicon, "amplicon size window"),
            (self.composite, "composite primer assembly"),
            (self.tm_spread, "melting temperature spread"),
        ];
        match counters.iter().max_by_key(|(count, _)| *count) {
            Some(&(count, name)) if count > 0 => name,
            _ => "primer placement within an amplicon window",
        }
    }
}

/// Pick the best-ranked loop candidate that fits entirely inside the
/// window `[lo, hi)`. Loop primers are a bonus, never a requirement.
fn best_loop_fit(candidates: &RankedCandidates, lo: usize, hi: usize) -> Option<Primer> {
    if hi <= lo {
        return None;
    }
    candidates
        .in_window(lo..hi, hi, 1)
        .first()
        .map(|p| (*p).clone())
}

/// Aggregate set quality: mean primer score, penalized when the
/// annealing-Tm spread exceeds the configured limit. Loop primers never
/// gate assembly, but a loop primer melting far from the rest widens
/// the spread seen here and costs score.
fn score_set(set: &PrimerSet, component_tms: &[f64; 6], config: &DesignConfig) -> f64 {
    let primers = set.primers();
    let mean = primers.iter().map(|p| p.score()).sum::<f64>() / primers.len() as f64;
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for tm in component_tms {
        lo = lo.min(*tm);
        hi = hi.max(*tm);
    }
    for loop_primer in [set.lf(), set.lb()].into_iter().flatten() {
        lo = lo.min(loop_primer.tm_celsius());
        hi = hi.max(loop_primer.tm_celsius());
    }
    let excess = ((hi - lo) - config.tm_spread_max_c).max(0.0);
    (mean - excess * config.tm_spread_penalty_per_degree).max(0.0)
}

/// Assemble ranked primer sets for one template, searching only inside
/// `span`. `variability` is an optional per-position profile used for
/// consensus-aware scoring.
///
/// Each top-ranked F3 anchors an amplicon window
/// `[f3.start, f3.start + amplicon_max)` and pairs with the B3
/// candidates that close it, fixing the amplicon frame before any
/// inner primer is drawn. The four inner roles then come best-first
/// from the coordinate ranges the frame leaves them, each range
/// shortened by the minimum lengths of the roles still to place, so
/// every combination reaching the inner loop already satisfies the
/// ordering, inner-gap and amplicon rules. `max_combinations` bounds
/// the partial layouts examined across all loop levels and
/// `max_candidates_per_role` caps the per-role draw inside each window.
pub(crate) fn design_on(
    template: &DnaSequence,
    span: &Region,
    variability: Option<&[f64]>,
    config: &DesignConfig,
    cancel: &CancelToken,
) -> Result<Vec<PrimerSet>, DesignError> {
    config.validate()?;
    if span.len() < config.amplicon_min {
        return Err(DesignError::InsufficientCandidates {
            role: None,
            dominant_constraint: format!(
                "search region of {} nt is shorter than the {} nt amplicon minimum",
                span.len(),
                config.amplicon_min
            ),
            examined: 0,
        });
    }

    let f3s = generate_candidates(template, PrimerRole::F3, span, variability, config, cancel)?;
    let f2s = generate_candidates(template, PrimerRole::F2, span, variability, config, cancel)?;
    let f1cs = generate_candidates(template, PrimerRole::F1c, span, variability, config, cancel)?;
    let b1cs = generate_candidates(template, PrimerRole::B1c, span, variability, config, cancel)?;
    let b2s = generate_candidates(template, PrimerRole::B2, span, variability, config, cancel)?;
    let b3s = generate_candidates(template, PrimerRole::B3, span, variability, config, cancel)?;
    for role_candidates in [&f3s, &f2s, &f1cs, &b1cs, &b2s, &b3s] {
        role_candidates.require_nonempty()?;
    }
    let lfs = generate_candidates(template, PrimerRole::LF, span, variability, config, cancel)?;
    let lbs = generate_candidates(template, PrimerRole::LB, span, variability, config, cancel)?;

    let mut tally = AssemblyTally::default();
    let mut sets: Vec<PrimerSet> = Vec::new();
    let cap = config.max_candidates_per_role;
    let lens = &config.primer_lengths;
    // Minimum room each inner draw must leave for the roles still to be
    // placed before B3's fixed start closes the frame.
    let f2_reserve = lens.f1c.min + config.inner_gap_min + lens.b1c.min + lens.b2.min;
    let f1c_reserve = config.inner_gap_min + lens.b1c.min + lens.b2.min;
    let b1c_reserve = lens.b2.min;

    'search: for f3 in f3s.top(cap) {
        cancel.check()?;
        let window_end = (f3.region().start() + config.amplicon_max).min(span.end());
        let amplicon_floor = f3.region().start() + config.amplicon_min;
        if amplicon_floor > span.end() {
            // Too close to the end of the search region for even the
            // smallest amplicon.
            continue;
        }
        let b3_lo = amplicon_floor
            .saturating_sub(lens.b3.max)
            .max(f3.region().end());
        for b3 in b3s.in_window(b3_lo..window_end, window_end, cap) {
            if tally.examined >= config.max_combinations {
                break 'search;
            }
            tally.examined += 1;
            if b3.region().end() < amplicon_floor {
                tally.amplicon += 1;
                continue;
            }
            let frame = b3.region().start();
            for f2 in f2s.in_window(
                f3.region().end()..frame,
                frame.saturating_sub(f2_reserve),
                cap,
            ) {
                if tally.examined >= config.max_combinations {
                    break 'search;
                }
                tally.examined += 1;
                for f1c in f1cs.in_window(
                    f2.region().end()..frame,
                    frame.saturating_sub(f1c_reserve),
                    cap,
                ) {
                    if tally.examined >= config.max_combinations {
                        break 'search;
                    }
                    tally.examined += 1;
                    let Some(fip) =
                        build_composite(PrimerRole::FIP, f1c, f2, template.name(), config)?
                    else {
                        tally.composite += 1;
                        continue;
                    };
                    let b1c_starts = (f1c.region().end() + config.inner_gap_min)
                        ..(f1c.region().end() + config.inner_gap_max + 1);
                    let b1c_end = frame.saturating_sub(b1c_reserve);
                    for b1c in b1cs.in_window(b1c_starts, b1c_end, cap) {
                        if tally.examined >= config.max_combinations {
                            break 'search;
                        }
                        tally.examined += 1;
                        for b2 in b2s.in_window(b1c.region().end()..frame, frame, cap) {
                            if tally.examined >= config.max_combinations {
                                break 'search;
                            }
                            tally.examined += 1;
                            let Some(bip) =
                                build_composite(PrimerRole::BIP, b1c, b2, template.name(), config)?
                            else {
                                tally.composite += 1;
                                continue;
                            };

                            // The six annealing components must work at
                            // one temperature. The composite primers'
                            // halves each anneal on their own, so their
                            // joint full-length Tm is not the gating
                            // number; loop primers only shift score.
                            let tms = [
                                f3.tm_celsius(),
                                b3.tm_celsius(),
                                f2.tm_celsius(),
                                f1c.tm_celsius(),
                                b1c.tm_celsius(),
                                b2.tm_celsius(),
                            ];
                            let spread = tms.iter().fold(f64::NEG_INFINITY, |m, t| m.max(*t))
                                - tms.iter().fold(f64::INFINITY, |m, t| m.min(*t));
                            if spread > config.tm_spread_max_c {
                                tally.tm_spread += 1;
                                continue;
                            }

                            let amplicon = Region::new(
                                f3.region().start(),
                                b3.region().end(),
                                Strand::Forward,
                            )?;
                            let mut set = PrimerSet::new(
                                f3.clone(),
                                b3.clone(),
                                fip.clone(),
                                bip,
                                amplicon,
                                0.0,
                                template.name(),
                            );
                            set.set_loop_primers(
                                best_loop_fit(&lfs, f2.region().end(), f1c.region().start()),
                                best_loop_fit(&lbs, b1c.region().end(), b2.region().start()),
                            );
                            let score = score_set(&set, &tms, config);
                            set.set_score(score);
                            sets.push(set);
                            if sets.len() >= config.max_sets {
                                break 'search;
                            }
                        }
                    }
                }
            }
        }
    }

    if sets.is_empty() {
        return Err(DesignError::InsufficientCandidates {
            role: None,
            dominant_constraint: tally.dominant().to_string(),
            examined: tally.examined,
        });
    }

    sets.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(sets)
}

/// Design ranked LAMP primer sets on `region` of a validated template.
/// Pass the template's full extent to search everywhere.
pub fn design_primers(
    template: &DnaSequence,
    region: &Region,
    config: &DesignConfig,
    cancel: &CancelToken,
) -> Result<Vec<PrimerSet>, DesignError> {
    design_on(template, region, None, config, cancel)
}
