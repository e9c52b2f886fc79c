use crate::error::DesignError;
use crate::primer::PrimerRole;
use crate::specificity::RiskLevel;
use serde::{Deserialize, Serialize};

/// Inclusive length bounds for one primer role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthRange {
    pub min: usize,
    pub max: usize,
}

impl LengthRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    #[inline(always)]
    pub fn contains(&self, len: usize) -> bool {
        len >= self.min && len <= self.max
    }
}

/// Per-role length profile. Defaults follow the standard LAMP design
/// ranges: outer primers 15-25 nt, inner composites 35-50 nt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PrimerLengthProfile {
    pub f3: LengthRange,
    pub f2: LengthRange,
    pub f1c: LengthRange,
    pub b1c: LengthRange,
    pub b2: LengthRange,
    pub b3: LengthRange,
    pub fip: LengthRange,
    pub bip: LengthRange,
    pub lf: LengthRange,
    pub lb: LengthRange,
}

impl Default for PrimerLengthProfile {
    fn default() -> Self {
        Self {
            f3: LengthRange::new(15, 25),
            f2: LengthRange::new(18, 25),
            f1c: LengthRange::new(18, 25),
            b1c: LengthRange::new(18, 25),
            b2: LengthRange::new(18, 25),
            b3: LengthRange::new(15, 25),
            fip: LengthRange::new(35, 50),
            bip: LengthRange::new(35, 50),
            lf: LengthRange::new(15, 25),
            lb: LengthRange::new(15, 25),
        }
    }
}

impl PrimerLengthProfile {
    pub fn for_role(&self, role: PrimerRole) -> LengthRange {
        match role {
            PrimerRole::F3 => self.f3,
            PrimerRole::F2 => self.f2,
            PrimerRole::F1c => self.f1c,
            PrimerRole::B1c => self.b1c,
            PrimerRole::B2 => self.b2,
            PrimerRole::B3 => self.b3,
            PrimerRole::FIP => self.fip,
            PrimerRole::BIP => self.bip,
            PrimerRole::LF => self.lf,
            PrimerRole::LB => self.lb,
        }
    }
}

/// Weights for the candidate score: each term is a penalty subtracted
/// from 100, so a weight of zero disables the term.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScoreWeights {
    /// Penalty per °C of deviation from the target Tm.
    pub tm_per_degree: f64,
    /// Penalty per percentage point of deviation from the target GC.
    pub gc_per_point: f64,
    /// Penalty per kcal/mol of deviation from the target 3'-end ΔG.
    pub end_per_kcal: f64,
    /// Penalty per distinct repeat pattern found in the primer.
    pub repeat_pattern: f64,
    /// Flat penalty for low-complexity sequence.
    pub low_complexity: f64,
    /// Penalty per unit of mean consensus variability under the primer
    /// footprint (soft steering, never a hard exclusion).
    pub variability: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            tm_per_degree: 6.0,
            gc_per_point: 1.0,
            end_per_kcal: 2.0,
            repeat_pattern: 10.0,
            low_complexity: 15.0,
            variability: 50.0,
        }
    }
}

/// ΔG thresholds (kcal/mol) mapping self/cross structure stability to a
/// risk level. Empirical defaults, tunable per assay.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RiskThresholds {
    pub low_kcal: f64,
    pub moderate_kcal: f64,
    pub high_kcal: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low_kcal: -2.0,
            moderate_kcal: -5.0,
            high_kcal: -8.0,
        }
    }
}

/// Rules classifying external search hits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HitRules {
    /// Alignment length at which a flagged-database hit is high risk.
    pub high_min_len: usize,
    /// Perfect 3'-end match length that makes a hot hit high risk.
    pub high_three_prime_match: usize,
    /// "Hot" means hit Tm above assay temperature minus this margin.
    pub high_tm_margin_c: f64,
    pub moderate_min_len: usize,
    pub moderate_min_identity: f64,
    pub moderate_tm_margin_c: f64,
}

impl Default for HitRules {
    fn default() -> Self {
        Self {
            high_min_len: 18,
            high_three_prime_match: 5,
            high_tm_margin_c: 7.0,
            moderate_min_len: 15,
            moderate_min_identity: 85.0,
            moderate_tm_margin_c: 12.0,
        }
    }
}

/// Every recognized design option, with documented defaults. There are no
/// positional or implicit parameters; unknown keys fail at deserialization
/// and out-of-range values fail in [`DesignConfig::validate`] before any
/// design work starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DesignConfig {
    pub primer_lengths: PrimerLengthProfile,

    /// Accepted primer Tm window, °C. Default 60-65, optimum 61.5.
    pub tm_min_c: f64,
    pub tm_max_c: f64,
    pub tm_opt_c: f64,

    /// Accepted GC fraction window. Default 0.40-0.60, optimum 0.50.
    pub gc_min: f64,
    pub gc_max: f64,
    pub gc_opt: f64,

    /// Monovalent cation concentration, mol/L. Default 50 mM.
    pub na_conc_m: f64,
    /// Primer concentration, mol/L. Default 0.1 µM.
    pub primer_conc_m: f64,
    /// Reaction temperature, °C. Default 65.
    pub assay_temp_c: f64,

    /// Allowed F1c→B1c gap, nt. Default 0-100.
    pub inner_gap_min: usize,
    pub inner_gap_max: usize,

    /// Allowed outer F3-start to B3-end span, nt. Default 120-200.
    pub amplicon_min: usize,
    pub amplicon_max: usize,

    /// 3'-end stability window, nt, and its target ΔG (kcal/mol).
    pub end_window: usize,
    pub end_stability_opt_kcal: f64,

    /// Candidates whose best hairpin is more stable than this are
    /// discarded outright (kcal/mol).
    pub hairpin_floor_kcal: f64,

    pub weights: ScoreWeights,

    /// Annealing-Tm spread allowed across a set's six component primers
    /// (F3, B3 and the composite halves F2, F1c, B1c, B2); a spread
    /// above this is a hard reject during assembly. Loop primers are
    /// exempt from the hard gate, but the penalty per excess °C lowers
    /// the score of a set whose loop primers widen the spread.
    pub tm_spread_max_c: f64,
    pub tm_spread_penalty_per_degree: f64,

    pub risk: RiskThresholds,
    pub hit_rules: HitRules,

    /// Cross-target dimer risk at or above which two multiplexed sets
    /// are considered in conflict.
    pub multiplex_conflict_risk: RiskLevel,

    /// Search budgets. All bounded so every search terminates.
    /// `max_candidates_per_role` caps how many ranked candidates the
    /// assembler draws per role inside each anchored amplicon window;
    /// `max_combinations` caps the partial layouts the combination
    /// search may examine.
    pub max_candidates_per_role: usize,
    pub max_combinations: u64,
    pub max_refinement_rounds: usize,
    /// Valid sets returned per design run.
    pub max_sets: usize,

    /// Consensus columns above this variability are flagged non-conserved.
    pub variability_threshold: f64,
    /// Both leading symbols of a near-tied column must reach this
    /// fraction before a degenerate symbol is emitted.
    pub degenerate_min_fraction: f64,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            primer_lengths: PrimerLengthProfile::default(),
            tm_min_c: 60.0,
            tm_max_c: 65.0,
            tm_opt_c: 61.5,
            gc_min: 0.40,
            gc_max: 0.60,
            gc_opt: 0.50,
            na_conc_m: 0.05,
            primer_conc_m: 1e-7,
            assay_temp_c: 65.0,
            inner_gap_min: 0,
            inner_gap_max: 100,
            amplicon_min: 120,
            amplicon_max: 200,
            end_window: 5,
            end_stability_opt_kcal: -8.0,
            hairpin_floor_kcal: -3.0,
            weights: ScoreWeights::default(),
            tm_spread_max_c: 5.0,
            tm_spread_penalty_per_degree: 5.0,
            risk: RiskThresholds::default(),
            hit_rules: HitRules::default(),
            multiplex_conflict_risk: RiskLevel::Low,
            max_candidates_per_role: 50,
            max_combinations: 10_000,
            max_refinement_rounds: 16,
            max_sets: 20,
            variability_threshold: 0.2,
            degenerate_min_fraction: 0.3,
        }
    }
}

fn fail(option: &str, message: impl Into<String>) -> DesignError {
    DesignError::Configuration {
        option: option.to_string(),
        message: message.into(),
    }
}

impl DesignConfig {
    /// Eager validation of every option. Called by all entry points
    /// before any design work; never clamps silently.
    pub fn validate(&self) -> Result<(), DesignError> {
        for (name, range) in [
            ("primer_lengths.f3", self.primer_lengths.f3),
            ("primer_lengths.f2", self.primer_lengths.f2),
            ("primer_lengths.f1c", self.primer_lengths.f1c),
            ("primer_lengths.b1c", self.primer_lengths.b1c),
            ("primer_lengths.b2", self.primer_lengths.b2),
            ("primer_lengths.b3", self.primer_lengths.b3),
            ("primer_lengths.fip", self.primer_lengths.fip),
            ("primer_lengths.bip", self.primer_lengths.bip),
            ("primer_lengths.lf", self.primer_lengths.lf),
            ("primer_lengths.lb", self.primer_lengths.lb),
        ] {
            if range.min == 0 || range.min > range.max {
                return Err(fail(name, format!("invalid range {}-{}", range.min, range.max)));
            }
        }
        let pl = &self.primer_lengths;
        if pl.fip.max < pl.f1c.min + pl.f2.min {
            return Err(fail(
                "primer_lengths.fip",
                "maximum is below the shortest possible F1c+F2 pair",
            ));
        }
        if pl.bip.max < pl.b1c.min + pl.b2.min {
            return Err(fail(
                "primer_lengths.bip",
                "maximum is below the shortest possible B1c+B2 pair",
            ));
        }
        if !(self.tm_min_c <= self.tm_opt_c && self.tm_opt_c <= self.tm_max_c) {
            return Err(fail(
                "tm_opt_c",
                format!(
                    "expected {} <= {} <= {}",
                    self.tm_min_c, self.tm_opt_c, self.tm_max_c
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.gc_min)
            || !(0.0..=1.0).contains(&self.gc_max)
            || !(self.gc_min <= self.gc_opt && self.gc_opt <= self.gc_max)
        {
            return Err(fail("gc_opt", "GC window must be ordered fractions in [0,1]"));
        }
        if self.na_conc_m <= 0.0 {
            return Err(fail("na_conc_m", "must be positive"));
        }
        if self.primer_conc_m <= 0.0 {
            return Err(fail("primer_conc_m", "must be positive"));
        }
        if self.inner_gap_min > self.inner_gap_max {
            return Err(fail("inner_gap_min", "exceeds inner_gap_max"));
        }
        if self.amplicon_min == 0 || self.amplicon_min > self.amplicon_max {
            return Err(fail(
                "amplicon_min",
                format!("invalid range {}-{}", self.amplicon_min, self.amplicon_max),
            ));
        }
        if self.end_window < 2 {
            return Err(fail("end_window", "must be at least 2 nt"));
        }
        for (name, value) in [
            ("weights.tm_per_degree", self.weights.tm_per_degree),
            ("weights.gc_per_point", self.weights.gc_per_point),
            ("weights.end_per_kcal", self.weights.end_per_kcal),
            ("weights.repeat_pattern", self.weights.repeat_pattern),
            ("weights.low_complexity", self.weights.low_complexity),
            ("weights.variability", self.weights.variability),
            (
                "tm_spread_penalty_per_degree",
                self.tm_spread_penalty_per_degree,
            ),
        ] {
            if value < 0.0 {
                return Err(fail(name, "must not be negative"));
            }
        }
        if self.tm_spread_max_c < 0.0 {
            return Err(fail("tm_spread_max_c", "must not be negative"));
        }
        if !(self.risk.high_kcal < self.risk.moderate_kcal
            && self.risk.moderate_kcal < self.risk.low_kcal)
        {
            return Err(fail(
                "risk",
                "thresholds must be ordered high < moderate < low",
            ));
        }
        if self.max_candidates_per_role == 0 {
            return Err(fail("max_candidates_per_role", "must be positive"));
        }
        if self.max_combinations == 0 {
            return Err(fail("max_combinations", "must be positive"));
        }
        if self.max_refinement_rounds == 0 {
            return Err(fail("max_refinement_rounds", "must be positive"));
        }
        if self.max_sets == 0 {
            return Err(fail("max_sets", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.variability_threshold) {
            return Err(fail("variability_threshold", "must be in [0,1]"));
        }
        if !(0.0..=0.5).contains(&self.degenerate_min_fraction) {
            return Err(fail("degenerate_min_fraction", "must be in [0,0.5]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DesignConfig::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_fails_fast() {
        let mut config = DesignConfig::default();
        config.tm_opt_c = 70.0; // above tm_max_c
        let err = config.validate().unwrap_err();
        match err {
            DesignError::Configuration { option, .. } => assert_eq!(option, "tm_opt_c"),
            other => panic!("unexpected error: {other}"),
        }

        let mut config = DesignConfig::default();
        config.gc_min = 1.2;
        assert!(config.validate().is_err());

        let mut config = DesignConfig::default();
        config.na_conc_m = 0.0;
        assert!(config.validate().is_err());

        let mut config = DesignConfig::default();
        config.primer_lengths.f3 = LengthRange::new(20, 10);
        assert!(config.validate().is_err());

        let mut config = DesignConfig::default();
        config.risk.moderate_kcal = -10.0; // below high
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsatisfiable_composite_lengths_fail() {
        let mut config = DesignConfig::default();
        config.primer_lengths.fip = LengthRange::new(10, 20); // < f1c.min + f2.min
        let err = config.validate().unwrap_err();
        match err {
            DesignError::Configuration { option, .. } => {
                assert_eq!(option, "primer_lengths.fip")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        let json = r#"{ "tm_min_c": 60.0, "does_not_exist": 1 }"#;
        assert!(serde_json::from_str::<DesignConfig>(json).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "tm_min_c": 58.0, "amplicon_max": 240 }"#;
        let config: DesignConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tm_min_c, 58.0);
        assert_eq!(config.amplicon_max, 240);
        assert_eq!(config.tm_max_c, 65.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_role_lookup() {
        let profile = PrimerLengthProfile::default();
        assert_eq!(profile.for_role(PrimerRole::F3), LengthRange::new(15, 25));
        assert_eq!(profile.for_role(PrimerRole::FIP), LengthRange::new(35, 50));
        assert!(profile.for_role(PrimerRole::LB).contains(20));
        assert!(!profile.for_role(PrimerRole::F3).contains(26));
    }
}
