use crate::config::DesignConfig;
use crate::primer::PrimerRole;
use crate::region::{Region, Strand};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of structural rules a candidate layout is checked
/// against. Every violation report names the rule that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryRule {
    /// A region must satisfy `start < end`.
    RegionBounds,
    /// A primer's length must fall in the configured range for its role.
    PrimerLength(PrimerRole),
    /// Regions must appear in template order F3, F2, F1c, B1c, B2, B3.
    RegionOrder,
    /// Adjacent regions must not share template bases.
    Overlap,
    /// The F1c→B1c spacer must fall in the configured range.
    InnerGap,
    /// The outer F3-start to B3-end span must fall in the configured range.
    AmpliconSize,
}

impl fmt::Display for GeometryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryRule::RegionBounds => write!(f, "region bounds"),
            GeometryRule::PrimerLength(role) => write!(f, "{role} length"),
            GeometryRule::RegionOrder => write!(f, "region order"),
            GeometryRule::Overlap => write!(f, "region overlap"),
            GeometryRule::InnerGap => write!(f, "inner gap"),
            GeometryRule::AmpliconSize => write!(f, "amplicon size"),
        }
    }
}

/// One failed rule, carrying what was expected and what was found.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryViolation {
    rule: GeometryRule,
    expected: String,
    actual: String,
}

impl GeometryViolation {
    pub fn new(
        rule: GeometryRule,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            rule,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    #[inline(always)]
    pub fn rule(&self) -> GeometryRule {
        self.rule
    }

    #[inline(always)]
    pub fn expected(&self) -> &str {
        &self.expected
    }

    #[inline(always)]
    pub fn actual(&self) -> &str {
        &self.actual
    }
}

impl fmt::Display for GeometryViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.rule, self.expected, self.actual
        )
    }
}

/// Check a region's length against the configured range for its role.
pub fn check_length(
    role: PrimerRole,
    region: &Region,
    config: &DesignConfig,
) -> Result<(), GeometryViolation> {
    let range = config.primer_lengths.for_role(role);
    if range.contains(region.len()) {
        Ok(())
    } else {
        Err(GeometryViolation::new(
            GeometryRule::PrimerLength(role),
            format!("{}-{} nt", range.min, range.max),
            format!("{} nt", region.len()),
        ))
    }
}

/// Check that `b` starts at or after the end of `a` (ordered and
/// non-overlapping). `labels` names the pair in the violation.
pub fn check_ordered(
    a: &Region,
    b: &Region,
    labels: (PrimerRole, PrimerRole),
) -> Result<(), GeometryViolation> {
    if a.overlaps(b) {
        return Err(GeometryViolation::new(
            GeometryRule::Overlap,
            format!("{} and {} disjoint", labels.0, labels.1),
            format!("{} at {a}, {} at {b}", labels.0, labels.1),
        ));
    }
    if b.start() < a.end() {
        return Err(GeometryViolation::new(
            GeometryRule::RegionOrder,
            format!("{} before {}", labels.0, labels.1),
            format!("{} at {a}, {} at {b}", labels.0, labels.1),
        ));
    }
    Ok(())
}

/// Check the F1c→B1c spacer against the configured window.
pub fn check_inner_gap(
    f1c: &Region,
    b1c: &Region,
    config: &DesignConfig,
) -> Result<(), GeometryViolation> {
    match f1c.gap_to(b1c) {
        Some(gap) if gap >= config.inner_gap_min && gap <= config.inner_gap_max => Ok(()),
        Some(gap) => Err(GeometryViolation::new(
            GeometryRule::InnerGap,
            format!("{}-{} nt", config.inner_gap_min, config.inner_gap_max),
            format!("{gap} nt"),
        )),
        None => Err(GeometryViolation::new(
            GeometryRule::InnerGap,
            "B1c at or after the end of F1c",
            format!("F1c at {f1c}, B1c at {b1c}"),
        )),
    }
}

/// Check the outer span against the configured amplicon window.
pub fn check_amplicon(
    f3: &Region,
    b3: &Region,
    config: &DesignConfig,
) -> Result<(), GeometryViolation> {
    let span = b3.end().saturating_sub(f3.start());
    if span >= config.amplicon_min && span <= config.amplicon_max {
        Ok(())
    } else {
        Err(GeometryViolation::new(
            GeometryRule::AmpliconSize,
            format!("{}-{} nt", config.amplicon_min, config.amplicon_max),
            format!("{span} nt"),
        ))
    }
}

/// The six core regions of a candidate set, in template coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLayout {
    pub f3: Region,
    pub f2: Region,
    pub f1c: Region,
    pub b1c: Region,
    pub b2: Region,
    pub b3: Region,
}

impl SetLayout {
    pub fn region(&self, role: PrimerRole) -> Option<&Region> {
        match role {
            PrimerRole::F3 => Some(&self.f3),
            PrimerRole::F2 => Some(&self.f2),
            PrimerRole::F1c => Some(&self.f1c),
            PrimerRole::B1c => Some(&self.b1c),
            PrimerRole::B2 => Some(&self.b2),
            PrimerRole::B3 => Some(&self.b3),
            _ => None,
        }
    }

    /// Full region spanned by the outer primer pair, on the forward
    /// strand. Valid only for an ordered layout.
    pub fn amplicon(&self) -> Result<Region, GeometryViolation> {
        Region::new(self.f3.start(), self.b3.end(), Strand::Forward)
    }

    /// Run every rule and collect all violations. Nothing short-circuits,
    /// so a failing layout reports everything wrong with it at once.
    pub fn validate(&self, config: &DesignConfig) -> GeometryReport {
        let mut violations = Vec::new();
        let mut checks = 0usize;

        for role in PrimerRole::CORE_ORDER {
            checks += 1;
            let region = self.region(role).unwrap_or(&self.f3);
            if let Err(v) = check_length(role, region, config) {
                violations.push(v);
            }
        }

        let adjacent = [
            (PrimerRole::F3, &self.f3, PrimerRole::F2, &self.f2),
            (PrimerRole::F2, &self.f2, PrimerRole::F1c, &self.f1c),
            (PrimerRole::F1c, &self.f1c, PrimerRole::B1c, &self.b1c),
            (PrimerRole::B1c, &self.b1c, PrimerRole::B2, &self.b2),
            (PrimerRole::B2, &self.b2, PrimerRole::B3, &self.b3),
        ];
        for (role_a, a, role_b, b) in adjacent {
            checks += 1;
            if let Err(v) = check_ordered(a, b, (role_a, role_b)) {
                violations.push(v);
            }
        }

        checks += 1;
        if let Err(v) = check_inner_gap(&self.f1c, &self.b1c, config) {
            violations.push(v);
        }

        checks += 1;
        if let Err(v) = check_amplicon(&self.f3, &self.b3, config) {
            violations.push(v);
        }

        GeometryReport { checks, violations }
    }
}

/// Outcome of a full layout validation: how many rules ran and every
/// one that failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryReport {
    checks: usize,
    violations: Vec<GeometryViolation>,
}

impl GeometryReport {
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    #[inline(always)]
    pub fn checks(&self) -> usize {
        self.checks
    }

    #[inline(always)]
    pub fn violations(&self) -> &[GeometryViolation] {
        &self.violations
    }

    pub fn passed(&self) -> usize {
        self.checks - self.violations.len()
    }
}

impl fmt::Display for GeometryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} constraints passed", self.passed(), self.checks)?;
        for v in &self.violations {
            write!(f, "\n  {v}")?;
        }
        Ok(())
    }
}
