use crate::assembler::design_primers;
use crate::cancel::CancelToken;
use crate::config::DesignConfig;
use crate::dna_sequence::DnaSequence;
use crate::error::DesignError;
use crate::primer::{PrimerRole, PrimerSet};
use crate::region::{Region, Strand};
use crate::specificity::{cross_set_risk, RiskLevel};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A cross-target interaction stable enough to threaten a shared
/// reaction: the worst primer pair between two selected sets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub target_a: String,
    pub target_b: String,
    pub role_a: PrimerRole,
    pub role_b: PrimerRole,
    pub delta_g: f64,
    pub risk: RiskLevel,
}

/// The set chosen for one target, with its position in that target's
/// ranked alternatives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetAssignment {
    name: String,
    set: PrimerSet,
    alternative_rank: usize,
    alternatives_available: usize,
}

impl TargetAssignment {
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn set(&self) -> &PrimerSet {
        &self.set
    }

    /// 0 means the target's top-ranked set survived refinement.
    #[inline(always)]
    pub fn alternative_rank(&self) -> usize {
        self.alternative_rank
    }

    #[inline(always)]
    pub fn alternatives_available(&self) -> usize {
        self.alternatives_available
    }
}

/// Outcome of multiplex planning. Remaining conflicts are reported, not
/// hidden: a plan with conflicts is a partial answer, not a failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiplexPlan {
    assignments: Vec<TargetAssignment>,
    conflicts: Vec<Conflict>,
    rounds_used: usize,
}

impl MultiplexPlan {
    #[inline(always)]
    pub fn assignments(&self) -> &[TargetAssignment] {
        &self.assignments
    }

    #[inline(always)]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    #[inline(always)]
    pub fn rounds_used(&self) -> usize {
        self.rounds_used
    }

    #[inline(always)]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

struct TargetState {
    name: String,
    alternatives: Vec<PrimerSet>,
    selected: usize,
}

/// Conflicts between the currently selected sets, each tagged with the
/// state indices of its two participants. Refinement works on indices so
/// targets that happen to share a name stay distinct.
fn current_conflicts(
    states: &[TargetState],
    config: &DesignConfig,
) -> Result<Vec<(usize, usize, Conflict)>, DesignError> {
    let mut conflicts = Vec::new();
    for (i, j) in (0..states.len()).tuple_combinations() {
        let a = &states[i].alternatives[states[i].selected];
        let b = &states[j].alternatives[states[j].selected];
        let (risk, worst) = cross_set_risk(a, b, config)?;
        if risk >= config.multiplex_conflict_risk {
            if let Some((role_a, role_b, delta_g)) = worst {
                conflicts.push((
                    i,
                    j,
                    Conflict {
                        target_a: states[i].name.clone(),
                        target_b: states[j].name.clone(),
                        role_a,
                        role_b,
                        delta_g,
                        risk,
                    },
                ));
            }
        }
    }
    Ok(conflicts)
}

/// Design one primer set per target so they can share a reaction tube.
///
/// Each target is designed independently first; refinement then walks
/// the worst remaining cross-target conflict each round and swaps the
/// lower-scoring participant for its next-ranked alternative. Rounds are
/// bounded; conflicts that survive the budget (or run out of
/// alternatives) stay in the plan for the caller to judge.
pub fn design_multiplex(
    targets: &[DnaSequence],
    config: &DesignConfig,
    cancel: &CancelToken,
) -> Result<MultiplexPlan, DesignError> {
    config.validate()?;
    if targets.is_empty() {
        return Err(DesignError::Configuration {
            option: "targets".to_string(),
            message: "at least one target sequence is required".to_string(),
        });
    }

    let mut states = Vec::with_capacity(targets.len());
    for target in targets {
        cancel.check()?;
        let span = Region::new(0, target.len(), Strand::Forward)?;
        let alternatives = design_primers(target, &span, config, cancel)?;
        states.push(TargetState {
            name: target.name().to_string(),
            alternatives,
            selected: 0,
        });
    }

    let mut rounds_used = 0usize;
    let mut conflicts = current_conflicts(&states, config)?;
    while !conflicts.is_empty() && rounds_used < config.max_refinement_rounds {
        cancel.check()?;
        rounds_used += 1;

        let worst = conflicts.iter().min_by(|(_, _, a), (_, _, b)| {
            a.delta_g
                .partial_cmp(&b.delta_g)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let (ia, ib) = match worst {
            Some(&(i, j, _)) => (i, j),
            None => break,
        };

        let score_a = states[ia].alternatives[states[ia].selected].score();
        let score_b = states[ib].alternatives[states[ib].selected].score();
        let (first, second) = if score_a <= score_b { (ia, ib) } else { (ib, ia) };

        let mut swapped = false;
        for i in [first, second] {
            if states[i].selected + 1 < states[i].alternatives.len() {
                states[i].selected += 1;
                swapped = true;
                break;
            }
        }
        if !swapped {
            // Both participants exhausted their alternatives; nothing
            // left to try for this conflict.
            break;
        }

        conflicts = current_conflicts(&states, config)?;
    }

    let assignments = states
        .into_iter()
        .map(|s| TargetAssignment {
            name: s.name,
            alternatives_available: s.alternatives.len(),
            set: s.alternatives[s.selected].clone(),
            alternative_rank: s.selected,
        })
        .collect();

    Ok(MultiplexPlan {
        assignments,
        conflicts: conflicts.into_iter().map(|(_, _, c)| c).collect(),
        rounds_used,
    })
}
