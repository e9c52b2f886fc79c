use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of LAMP primer roles. Role-specific behavior lives in
/// constraint tables looked up by tag, so validators and scorers stay
/// exhaustive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimerRole {
    F3,
    F2,
    F1c,
    B1c,
    B2,
    B3,
    LF,
    LB,
    FIP,
    BIP,
}

impl PrimerRole {
    /// The six simple roles a set is assembled from, in template order.
    pub const CORE_ORDER: [PrimerRole; 6] = [
        PrimerRole::F3,
        PrimerRole::F2,
        PrimerRole::F1c,
        PrimerRole::B1c,
        PrimerRole::B2,
        PrimerRole::B3,
    ];

    /// True for the composite inner primers built from two sub-regions.
    pub fn is_composite(&self) -> bool {
        matches!(self, PrimerRole::FIP | PrimerRole::BIP)
    }
}

impl fmt::Display for PrimerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            PrimerRole::F3 => "F3",
            PrimerRole::F2 => "F2",
            PrimerRole::F1c => "F1c",
            PrimerRole::B1c => "B1c",
            PrimerRole::B2 => "B2",
            PrimerRole::B3 => "B3",
            PrimerRole::LF => "LF",
            PrimerRole::LB => "LB",
            PrimerRole::FIP => "FIP",
            PrimerRole::BIP => "BIP",
        };
        write!(f, "{tag}")
    }
}

/// A designed oligonucleotide: a template region, the strand-resolved
/// 5'→3' text and the derived thermodynamic profile.
///
/// Composite primers (FIP/BIP) span two disjoint sub-regions; `region` is
/// their union and `parts` records each half in template order. The
/// `source` field is a non-owning back-reference (the template's name),
/// kept for traceability only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Primer {
    role: PrimerRole,
    region: Region,
    parts: Vec<(PrimerRole, Region)>,
    sequence: String,
    source: String,
    tm_celsius: f64,
    tm_approximate: bool,
    gc_fraction: f64,
    delta_g: f64,
    hairpin_dg: Option<f64>,
    score: f64,
}

impl Primer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        role: PrimerRole,
        region: Region,
        parts: Vec<(PrimerRole, Region)>,
        sequence: String,
        source: &str,
        tm_celsius: f64,
        tm_approximate: bool,
        gc_fraction: f64,
        delta_g: f64,
        hairpin_dg: Option<f64>,
        score: f64,
    ) -> Self {
        Self {
            role,
            region,
            parts,
            sequence,
            source: source.to_string(),
            tm_celsius,
            tm_approximate,
            gc_fraction,
            delta_g,
            hairpin_dg,
            score,
        }
    }

    #[inline(always)]
    pub fn role(&self) -> PrimerRole {
        self.role
    }

    #[inline(always)]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Sub-regions in template order: one entry for simple primers, two
    /// for FIP ([F2, F1c]) and BIP ([B1c, B2]).
    #[inline(always)]
    pub fn parts(&self) -> &[(PrimerRole, Region)] {
        &self.parts
    }

    pub fn part(&self, role: PrimerRole) -> Option<&Region> {
        self.parts
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, region)| region)
    }

    #[inline(always)]
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    #[inline(always)]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline(always)]
    pub fn tm_celsius(&self) -> f64 {
        self.tm_celsius
    }

    #[inline(always)]
    pub fn tm_approximate(&self) -> bool {
        self.tm_approximate
    }

    #[inline(always)]
    pub fn gc_fraction(&self) -> f64 {
        self.gc_fraction
    }

    /// Duplex ΔG at 37 °C, kcal/mol.
    #[inline(always)]
    pub fn delta_g(&self) -> f64 {
        self.delta_g
    }

    /// Self-structure score: ΔG of the most stable predicted hairpin.
    #[inline(always)]
    pub fn hairpin_dg(&self) -> Option<f64> {
        self.hairpin_dg
    }

    /// Candidate quality, 0-100, higher is better.
    #[inline(always)]
    pub fn score(&self) -> f64 {
        self.score
    }
}

impl fmt::Display for Primer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.role, self.region, self.sequence)
    }
}

/// A complete LAMP primer set: the four mandatory primers (F3, B3, FIP,
/// BIP), optional loop primers, the spanned amplicon and the aggregate
/// score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrimerSet {
    f3: Primer,
    b3: Primer,
    fip: Primer,
    bip: Primer,
    lf: Option<Primer>,
    lb: Option<Primer>,
    amplicon: Region,
    score: f64,
    source: String,
}

impl PrimerSet {
    pub(crate) fn new(
        f3: Primer,
        b3: Primer,
        fip: Primer,
        bip: Primer,
        amplicon: Region,
        score: f64,
        source: &str,
    ) -> Self {
        Self {
            f3,
            b3,
            fip,
            bip,
            lf: None,
            lb: None,
            amplicon,
            score,
            source: source.to_string(),
        }
    }

    pub(crate) fn set_loop_primers(&mut self, lf: Option<Primer>, lb: Option<Primer>) {
        self.lf = lf;
        self.lb = lb;
    }

    pub(crate) fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    #[inline(always)]
    pub fn f3(&self) -> &Primer {
        &self.f3
    }

    #[inline(always)]
    pub fn b3(&self) -> &Primer {
        &self.b3
    }

    #[inline(always)]
    pub fn fip(&self) -> &Primer {
        &self.fip
    }

    #[inline(always)]
    pub fn bip(&self) -> &Primer {
        &self.bip
    }

    #[inline(always)]
    pub fn lf(&self) -> Option<&Primer> {
        self.lf.as_ref()
    }

    #[inline(always)]
    pub fn lb(&self) -> Option<&Primer> {
        self.lb.as_ref()
    }

    /// All primers in the set (4-6 of them).
    pub fn primers(&self) -> Vec<&Primer> {
        let mut ret = vec![&self.f3, &self.fip, &self.bip, &self.b3];
        if let Some(lf) = &self.lf {
            ret.push(lf);
        }
        if let Some(lb) = &self.lb {
            ret.push(lb);
        }
        ret
    }

    /// The region of the simple role `role` on the template, looking
    /// through the composite primers.
    pub fn role_region(&self, role: PrimerRole) -> Option<&Region> {
        match role {
            PrimerRole::F3 => Some(self.f3.region()),
            PrimerRole::B3 => Some(self.b3.region()),
            PrimerRole::FIP => Some(self.fip.region()),
            PrimerRole::BIP => Some(self.bip.region()),
            PrimerRole::F2 | PrimerRole::F1c => self.fip.part(role),
            PrimerRole::B1c | PrimerRole::B2 => self.bip.part(role),
            PrimerRole::LF => self.lf.as_ref().map(|p| p.region()),
            PrimerRole::LB => self.lb.as_ref().map(|p| p.region()),
        }
    }

    /// Full region spanned by the outer primer pair.
    #[inline(always)]
    pub fn amplicon(&self) -> &Region {
        &self.amplicon
    }

    #[inline(always)]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[inline(always)]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tm_range(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for p in self.primers() {
            min = min.min(p.tm_celsius());
            max = max.max(p.tm_celsius());
        }
        (min, max)
    }

    pub fn tm_spread(&self) -> f64 {
        let (min, max) = self.tm_range();
        max - min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Strand;

    fn primer(role: PrimerRole, start: usize, end: usize, tm: f64) -> Primer {
        let region = Region::new(start, end, Strand::Forward).unwrap();
        Primer::new(
            role,
            region,
            vec![(role, region)],
            "A".repeat(end - start),
            "test",
            tm,
            false,
            0.5,
            -10.0,
            None,
            80.0,
        )
    }

    fn sample_set() -> PrimerSet {
        let f3 = primer(PrimerRole::F3, 0, 18, 60.0);
        let b3 = primer(PrimerRole::B3, 180, 198, 61.0);
        let fip = primer(PrimerRole::FIP, 25, 70, 62.0);
        let bip = primer(PrimerRole::BIP, 110, 155, 63.0);
        let amplicon = Region::new(0, 198, Strand::Forward).unwrap();
        PrimerSet::new(f3, b3, fip, bip, amplicon, 75.0, "test")
    }

    #[test]
    fn test_role_display() {
        assert_eq!(PrimerRole::F1c.to_string(), "F1c");
        assert_eq!(PrimerRole::FIP.to_string(), "FIP");
        assert!(PrimerRole::FIP.is_composite());
        assert!(!PrimerRole::LF.is_composite());
    }

    #[test]
    fn test_set_accessors() {
        let set = sample_set();
        assert_eq!(set.primers().len(), 4);
        assert_eq!(set.tm_range(), (60.0, 63.0));
        assert!((set.tm_spread() - 3.0).abs() < 1e-12);
        assert_eq!(set.amplicon().len(), 198);
    }

    #[test]
    fn test_set_with_loop_primers() {
        let mut set = sample_set();
        set.set_loop_primers(Some(primer(PrimerRole::LF, 72, 90, 58.0)), None);
        assert_eq!(set.primers().len(), 5);
        assert_eq!(set.tm_range(), (58.0, 63.0));
        assert!(set.role_region(PrimerRole::LF).is_some());
        assert!(set.role_region(PrimerRole::LB).is_none());
    }

    #[test]
    fn test_serde_roundtrip() {
        let set = sample_set();
        let json = serde_json::to_string(&set).unwrap();
        let back: PrimerSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }
}
