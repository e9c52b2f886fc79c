pub mod assembler;
pub mod cancel;
pub mod candidates;
pub mod config;
pub mod consensus;
pub mod dna_sequence;
pub mod error;
pub mod geometry;
pub mod iupac_code;
pub mod multiplex;
pub mod primer;
pub mod region;
pub mod specificity;
pub mod thermodynamics;

pub use assembler::design_primers;
pub use cancel::CancelToken;
pub use config::DesignConfig;
pub use consensus::{
    design_consensus_primers, Aligner, ConsensusDesign, ConsensusTemplate, EqualLengthAligner,
};
pub use dna_sequence::DnaSequence;
pub use error::DesignError;
pub use multiplex::{design_multiplex, Conflict, MultiplexPlan};
pub use primer::{Primer, PrimerRole, PrimerSet};
pub use region::{Region, Strand};
pub use specificity::{
    check_primer, check_specificity, RiskLevel, SpecificityReport, SpecificitySearch,
};
