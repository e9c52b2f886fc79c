use crate::geometry::{GeometryRule, GeometryViolation};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// Half-open interval `[start,end)` over a sequence's forward-strand
/// coordinates, plus the strand a primer derived from it anneals to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    start: usize,
    end: usize,
    strand: Strand,
}

impl Region {
    pub fn new(start: usize, end: usize, strand: Strand) -> Result<Self, GeometryViolation> {
        if start >= end {
            return Err(GeometryViolation::new(
                GeometryRule::RegionBounds,
                "start < end",
                format!("[{start},{end})"),
            ));
        }
        Ok(Self { start, end, strand })
    }

    #[inline(always)]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline(always)]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline(always)]
    pub fn strand(&self) -> Strand {
        self.strand
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        false // start < end is a construction invariant
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Bases between the end of `self` and the start of `other`;
    /// `None` when `other` does not start at or after the end of `self`.
    pub fn gap_to(&self, other: &Region) -> Option<usize> {
        if other.start >= self.end {
            Some(other.start - self.end)
        } else {
            None
        }
    }

    pub fn center(&self) -> usize {
        self.start + self.len() / 2
    }

    /// Smallest region covering both inputs, on the strand of `self`.
    pub fn union(&self, other: &Region) -> Region {
        Region {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            strand: self.strand,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}){}", self.start, self.end, self.strand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_invariant() {
        assert!(Region::new(0, 10, Strand::Forward).is_ok());
        assert!(Region::new(10, 10, Strand::Forward).is_err());
        assert!(Region::new(11, 10, Strand::Reverse).is_err());
    }

    #[test]
    fn test_overlaps_and_gap() {
        let a = Region::new(0, 10, Strand::Forward).unwrap();
        let b = Region::new(9, 20, Strand::Forward).unwrap();
        let c = Region::new(15, 25, Strand::Forward).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.gap_to(&c), Some(5));
        assert_eq!(a.gap_to(&b), None);
        assert_eq!(b.gap_to(&c), None);
    }

    #[test]
    fn test_union() {
        let a = Region::new(5, 10, Strand::Forward).unwrap();
        let b = Region::new(20, 30, Strand::Forward).unwrap();
        let u = a.union(&b);
        assert_eq!((u.start(), u.end()), (5, 30));
    }
}
