use thiserror::Error;

/// Building operator strings
pub mod operator;

/// One algebraic term: operators, resolved contractions and a prefactor
pub mod rdm;

/// The driving loop and the set of terminal terms
pub mod active;

/// Failures of the contraction engine. All of them mean the operator string was malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WickError {
    #[error("Operator string of odd length {0}")]
    OddLength(usize),
    #[error("Contraction pair matched {found} slots instead of 2")]
    DeltaMismatch { found: usize },
    #[error("Operator {0} has no partner of the same spin, cannot bring the term into canonical order")]
    UnpairedSpin(usize),
}
