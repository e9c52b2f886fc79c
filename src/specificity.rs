use crate::config::DesignConfig;
use crate::error::DesignError;
use crate::primer::{Primer, PrimerRole, PrimerSet};
use crate::thermodynamics::predict_dimer;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered risk scale; the report verdict is the maximum over every
/// finding, so one High finding makes the whole set High.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Moderate,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::None => write!(f, "none"),
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Map a predicted structure's ΔG (kcal/mol, 37 °C) onto the risk scale.
pub fn classify_delta_g(delta_g: f64, config: &DesignConfig) -> RiskLevel {
    let t = &config.risk;
    if delta_g <= t.high_kcal {
        RiskLevel::High
    } else if delta_g <= t.moderate_kcal {
        RiskLevel::Moderate
    } else if delta_g <= t.low_kcal {
        RiskLevel::Low
    } else {
        RiskLevel::None
    }
}

/// One alignment reported by an external sequence search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecificityHit {
    /// Identifier of the matched database sequence.
    pub subject: String,
    /// Alignment length in nt.
    pub length: usize,
    /// Percent identity over the alignment, 0-100.
    pub identity_pct: f64,
    /// Length of the perfect match ending at the primer's 3' end.
    pub three_prime_match: usize,
    /// Predicted annealing Tm of the matched stretch, °C.
    pub tm_celsius: f64,
    /// True when the subject belongs to a flagged off-target database.
    pub flagged: bool,
}

impl SpecificityHit {
    /// Classify one hit. A long alignment against a flagged database, or
    /// a hot 3'-anchored match, is disqualifying on its own; a long,
    /// near-identical, moderately hot match is a warning.
    pub fn risk(&self, config: &DesignConfig) -> RiskLevel {
        let rules = &config.hit_rules;
        if self.flagged && self.length >= rules.high_min_len {
            return RiskLevel::High;
        }
        if self.three_prime_match >= rules.high_three_prime_match
            && self.tm_celsius > config.assay_temp_c - rules.high_tm_margin_c
        {
            return RiskLevel::High;
        }
        if self.length >= rules.moderate_min_len
            && self.identity_pct >= rules.moderate_min_identity
            && self.tm_celsius > config.assay_temp_c - rules.moderate_tm_margin_c
        {
            return RiskLevel::Moderate;
        }
        RiskLevel::Low
    }
}

/// External sequence-search collaborator. Implementations wrap whatever
/// backend is available; a slow backend should give up and return
/// [`DesignError::SpecificityCollaboratorTimeout`], which degrades the
/// report to self-analysis instead of failing the design.
pub trait SpecificitySearch {
    fn search(&self, primer: &Primer) -> Result<Vec<SpecificityHit>, DesignError>;
}

/// Self-analysis findings for one primer of the set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrimerFindings {
    pub role: PrimerRole,
    /// ΔG of the most stable predicted hairpin, if any forms.
    pub hairpin_dg: Option<f64>,
    pub hairpin_risk: RiskLevel,
    /// ΔG of the most stable self-dimer, if any forms.
    pub self_dimer_dg: Option<f64>,
    pub self_dimer_risk: RiskLevel,
    pub hits: Vec<(SpecificityHit, RiskLevel)>,
}

/// A predicted duplex between two different primers of the set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairInteraction {
    pub a: PrimerRole,
    pub b: PrimerRole,
    pub delta_g: f64,
    pub risk: RiskLevel,
}

/// Full specificity assessment of one primer set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecificityReport {
    per_primer: Vec<PrimerFindings>,
    pairwise: Vec<PairInteraction>,
    verdict: RiskLevel,
    /// True when the external collaborator timed out and only
    /// self-analysis findings are present.
    partial: bool,
}

impl SpecificityReport {
    #[inline(always)]
    pub fn per_primer(&self) -> &[PrimerFindings] {
        &self.per_primer
    }

    #[inline(always)]
    pub fn pairwise(&self) -> &[PairInteraction] {
        &self.pairwise
    }

    #[inline(always)]
    pub fn verdict(&self) -> RiskLevel {
        self.verdict
    }

    #[inline(always)]
    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

fn self_analysis(primer: &Primer, config: &DesignConfig) -> Result<PrimerFindings, DesignError> {
    let seq = primer.sequence().as_bytes();
    let hairpin_dg = match primer.hairpin_dg() {
        Some(dg) => Some(dg),
        None => crate::thermodynamics::predict_hairpin(seq)?.map(|f| f.delta_g()),
    };
    let hairpin_risk = hairpin_dg
        .map(|dg| classify_delta_g(dg, config))
        .unwrap_or(RiskLevel::None);
    let self_dimer_dg = predict_dimer(seq, seq)?.map(|f| f.delta_g());
    let self_dimer_risk = self_dimer_dg
        .map(|dg| classify_delta_g(dg, config))
        .unwrap_or(RiskLevel::None);
    Ok(PrimerFindings {
        role: primer.role(),
        hairpin_dg,
        hairpin_risk,
        self_dimer_dg,
        self_dimer_risk,
        hits: Vec::new(),
    })
}

/// Self-analysis plus (when a collaborator is supplied) external hits
/// for one primer. A collaborator timeout sets `partial` instead of
/// failing.
fn analyze_primer(
    primer: &Primer,
    config: &DesignConfig,
    search: Option<&dyn SpecificitySearch>,
    partial: &mut bool,
) -> Result<PrimerFindings, DesignError> {
    let mut findings = self_analysis(primer, config)?;
    if let Some(backend) = search {
        match backend.search(primer) {
            Ok(hits) => {
                findings.hits = hits
                    .into_iter()
                    .map(|h| {
                        let risk = h.risk(config);
                        (h, risk)
                    })
                    .collect();
            }
            Err(DesignError::SpecificityCollaboratorTimeout { .. }) => *partial = true,
            Err(other) => return Err(other),
        }
    }
    Ok(findings)
}

fn verdict_of(per_primer: &[PrimerFindings], pairwise: &[PairInteraction]) -> RiskLevel {
    let mut verdict = RiskLevel::None;
    for findings in per_primer {
        verdict = verdict.max(findings.hairpin_risk).max(findings.self_dimer_risk);
        for (_, risk) in &findings.hits {
            verdict = verdict.max(*risk);
        }
    }
    for pair in pairwise {
        verdict = verdict.max(pair.risk);
    }
    verdict
}

/// Assess one primer on its own: hairpin, self-dimer and (when a
/// collaborator is supplied) external database hits. The report carries
/// a single per-primer entry and no pairwise findings.
pub fn check_primer(
    primer: &Primer,
    config: &DesignConfig,
    search: Option<&dyn SpecificitySearch>,
) -> Result<SpecificityReport, DesignError> {
    config.validate()?;
    let mut partial = false;
    let per_primer = vec![analyze_primer(primer, config, search, &mut partial)?];
    let verdict = verdict_of(&per_primer, &[]);
    Ok(SpecificityReport {
        per_primer,
        pairwise: Vec::new(),
        verdict,
        partial,
    })
}

/// Assess a primer set: per-primer hairpin and self-dimer, every
/// unordered cross-primer pair, and (when a collaborator is supplied)
/// external database hits. The verdict is the maximum risk over all
/// findings. A collaborator timeout downgrades the report to partial
/// rather than failing the run.
pub fn check_specificity(
    set: &PrimerSet,
    config: &DesignConfig,
    search: Option<&dyn SpecificitySearch>,
) -> Result<SpecificityReport, DesignError> {
    config.validate()?;
    let primers = set.primers();

    let mut partial = false;
    let mut per_primer = Vec::with_capacity(primers.len());
    for primer in &primers {
        per_primer.push(analyze_primer(primer, config, search, &mut partial)?);
    }

    let mut pairwise = Vec::new();
    for (a, b) in primers.iter().tuple_combinations() {
        if let Some(fold) = predict_dimer(a.sequence().as_bytes(), b.sequence().as_bytes())? {
            pairwise.push(PairInteraction {
                a: a.role(),
                b: b.role(),
                delta_g: fold.delta_g(),
                risk: classify_delta_g(fold.delta_g(), config),
            });
        }
    }

    let verdict = verdict_of(&per_primer, &pairwise);
    Ok(SpecificityReport {
        per_primer,
        pairwise,
        verdict,
        partial,
    })
}

/// Cross-set interaction risk used by multiplex planning: the risk of
/// the most stable duplex between any primer of `a` and any primer of
/// `b`.
pub fn cross_set_risk(
    a: &PrimerSet,
    b: &PrimerSet,
    config: &DesignConfig,
) -> Result<(RiskLevel, Option<(PrimerRole, PrimerRole, f64)>), DesignError> {
    let mut worst: Option<(PrimerRole, PrimerRole, f64)> = None;
    for pa in a.primers() {
        for pb in b.primers() {
            if let Some(fold) = predict_dimer(pa.sequence().as_bytes(), pb.sequence().as_bytes())?
            {
                let better = match &worst {
                    Some((_, _, dg)) => fold.delta_g() < *dg,
                    None => true,
                };
                if better {
                    worst = Some((pa.role(), pb.role(), fold.delta_g()));
                }
            }
        }
    }
    let risk = worst
        .map(|(_, _, dg)| classify_delta_g(dg, config))
        .unwrap_or(RiskLevel::None);
    Ok((risk, worst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Moderate);
        assert!(RiskLevel::Moderate < RiskLevel::High);
        assert_eq!(RiskLevel::Low.max(RiskLevel::High), RiskLevel::High);
    }

    #[test]
    fn test_classify_delta_g_thresholds() {
        let config = DesignConfig::default();
        assert_eq!(classify_delta_g(-1.0, &config), RiskLevel::None);
        assert_eq!(classify_delta_g(-2.0, &config), RiskLevel::Low);
        assert_eq!(classify_delta_g(-4.9, &config), RiskLevel::Low);
        assert_eq!(classify_delta_g(-5.0, &config), RiskLevel::Moderate);
        assert_eq!(classify_delta_g(-8.0, &config), RiskLevel::High);
        assert_eq!(classify_delta_g(-12.0, &config), RiskLevel::High);
    }

    fn hit(length: usize, identity: f64, three_prime: usize, tm: f64, flagged: bool) -> SpecificityHit {
        SpecificityHit {
            subject: "db|1".to_string(),
            length,
            identity_pct: identity,
            three_prime_match: three_prime,
            tm_celsius: tm,
            flagged,
        }
    }

    #[test]
    fn test_hit_rules() {
        let config = DesignConfig::default();
        // Long flagged-database hit.
        assert_eq!(hit(18, 90.0, 0, 40.0, true).risk(&config), RiskLevel::High);
        assert_eq!(hit(17, 90.0, 0, 40.0, true).risk(&config), RiskLevel::Low);
        // Hot 3'-anchored hit: Tm above 65 - 7 = 58.
        assert_eq!(hit(12, 80.0, 5, 59.0, false).risk(&config), RiskLevel::High);
        assert_eq!(hit(12, 80.0, 5, 57.0, false).risk(&config), RiskLevel::Low);
        // Long near-identical moderately hot hit: Tm above 65 - 12 = 53.
        assert_eq!(
            hit(15, 85.0, 0, 54.0, false).risk(&config),
            RiskLevel::Moderate
        );
        assert_eq!(hit(15, 84.0, 0, 54.0, false).risk(&config), RiskLevel::Low);
    }

    struct SlowBackend;
    impl SpecificitySearch for SlowBackend {
        fn search(&self, _primer: &Primer) -> Result<Vec<SpecificityHit>, DesignError> {
            Err(DesignError::SpecificityCollaboratorTimeout { elapsed_ms: 30_000 })
        }
    }

    struct FlaggingBackend;
    impl SpecificitySearch for FlaggingBackend {
        fn search(&self, primer: &Primer) -> Result<Vec<SpecificityHit>, DesignError> {
            Ok(vec![SpecificityHit {
                subject: "offtarget".to_string(),
                length: primer.len(),
                identity_pct: 100.0,
                three_prime_match: 0,
                tm_celsius: 40.0,
                flagged: true,
            }])
        }
    }

    fn sample_set() -> PrimerSet {
        use crate::region::{Region, Strand};
        let mk = |role, start: usize, seq: &str| {
            let region = Region::new(start, start + seq.len(), Strand::Forward).unwrap();
            Primer::new(
                role,
                region,
                vec![(role, region)],
                seq.to_string(),
                "t",
                61.0,
                false,
                0.5,
                -20.0,
                None,
                80.0,
            )
        };
        let f3 = mk(PrimerRole::F3, 0, "ATGACCATTACCAGAGGT");
        let fip = mk(PrimerRole::FIP, 30, "CAGGTTCAACTGGTGTGAGGTTACCAGGATCACCAGTTCAA");
        let bip = mk(PrimerRole::BIP, 110, "GGATTACACCAGGTTCATGACCTGGTAGTTCAACCTGGTAA");
        let b3 = mk(PrimerRole::B3, 170, "CCTGGTAATGGTCATGAG");
        let amplicon = Region::new(0, 188, Strand::Forward).unwrap();
        PrimerSet::new(f3, b3, fip, bip, amplicon, 70.0, "t")
    }

    #[test]
    fn test_self_only_report() {
        let config = DesignConfig::default();
        let report = check_specificity(&sample_set(), &config, None).unwrap();
        assert!(!report.is_partial());
        assert_eq!(report.per_primer().len(), 4);
        assert!(report.per_primer().iter().all(|f| f.hits.is_empty()));
    }

    #[test]
    fn test_timeout_degrades_to_partial() {
        let config = DesignConfig::default();
        let report = check_specificity(&sample_set(), &config, Some(&SlowBackend)).unwrap();
        assert!(report.is_partial());
        assert!(report.per_primer().iter().all(|f| f.hits.is_empty()));
    }

    #[test]
    fn test_flagged_hits_raise_verdict() {
        let config = DesignConfig::default();
        let report = check_specificity(&sample_set(), &config, Some(&FlaggingBackend)).unwrap();
        assert!(!report.is_partial());
        assert_eq!(report.verdict(), RiskLevel::High);
    }

    #[test]
    fn test_single_primer_report() {
        let config = DesignConfig::default();
        let set = sample_set();
        let primer = set.f3();
        let report = check_primer(primer, &config, None).unwrap();
        assert_eq!(report.per_primer().len(), 1);
        assert_eq!(report.per_primer()[0].role, PrimerRole::F3);
        assert!(report.pairwise().is_empty());
        assert!(!report.is_partial());

        let flagged = check_primer(primer, &config, Some(&FlaggingBackend)).unwrap();
        assert_eq!(flagged.verdict(), RiskLevel::High);

        let timed_out = check_primer(primer, &config, Some(&SlowBackend)).unwrap();
        assert!(timed_out.is_partial());
    }

    #[test]
    fn test_cross_set_risk_identical_sets_is_high() {
        let config = DesignConfig::default();
        let set = sample_set();
        let (risk, worst) = cross_set_risk(&set, &set, &config).unwrap();
        // Every primer pairs perfectly with its own reverse complement
        // scan, so identical sets always collide hard.
        assert_eq!(risk, RiskLevel::High);
        assert!(worst.is_some());
    }
}
