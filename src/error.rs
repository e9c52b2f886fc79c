use crate::geometry::GeometryViolation;
use crate::primer::PrimerRole;
use std::error::Error;
use std::fmt;

/// Failure taxonomy for the design engine. Every variant carries the
/// structured context needed to diagnose the failure without logs; the
/// engine itself never logs.
#[derive(Debug, Clone, PartialEq)]
pub enum DesignError {
    /// Input contained a character outside the IUPAC nucleotide alphabet.
    InvalidSequence {
        name: String,
        position: usize,
        symbol: char,
    },
    /// Input sequence was empty after whitespace removal.
    EmptySequence { name: String },
    /// Sequence shorter than the minimum the thermodynamic model supports.
    SequenceTooShort { length: usize, minimum: usize },
    /// A geometric layout rule was violated.
    GeometricConstraint(GeometryViolation),
    /// The candidate search space was exhausted without producing a valid
    /// result. Carries the most frequently violated constraint.
    InsufficientCandidates {
        role: Option<PrimerRole>,
        dominant_constraint: String,
        examined: u64,
    },
    /// The alignment collaborator failed or returned inconsistent rows.
    Alignment { message: String },
    /// The optional specificity-search collaborator timed out. Non-fatal:
    /// callers degrade to self-only analysis and flag the verdict partial.
    SpecificityCollaboratorTimeout { elapsed_ms: u64 },
    /// A configuration option was out of its valid range. Raised before any
    /// design work starts.
    Configuration { option: String, message: String },
    /// The run was cancelled through its `CancelToken`.
    Cancelled,
}

impl fmt::Display for DesignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSequence {
                name,
                position,
                symbol,
            } => write!(
                f,
                "sequence '{name}': invalid symbol '{symbol}' at position {position}"
            ),
            Self::EmptySequence { name } => write!(f, "sequence '{name}' is empty"),
            Self::SequenceTooShort { length, minimum } => write!(
                f,
                "sequence too short for thermodynamic model: {length} nt, minimum {minimum}"
            ),
            Self::GeometricConstraint(v) => write!(f, "geometric constraint violation: {v}"),
            Self::InsufficientCandidates {
                role,
                dominant_constraint,
                examined,
            } => match role {
                Some(role) => write!(
                    f,
                    "insufficient {role} candidates after examining {examined} (dominant constraint: {dominant_constraint})"
                ),
                None => write!(
                    f,
                    "no valid primer set within budget of {examined} combinations (dominant constraint: {dominant_constraint})"
                ),
            },
            Self::Alignment { message } => write!(f, "alignment failed: {message}"),
            Self::SpecificityCollaboratorTimeout { elapsed_ms } => write!(
                f,
                "specificity search collaborator timed out after {elapsed_ms} ms"
            ),
            Self::Configuration { option, message } => {
                write!(f, "configuration option '{option}': {message}")
            }
            Self::Cancelled => write!(f, "design run cancelled"),
        }
    }
}

impl Error for DesignError {}

impl From<GeometryViolation> for DesignError {
    fn from(v: GeometryViolation) -> Self {
        DesignError::GeometricConstraint(v)
    }
}
