use thiserror::Error;

/// Orbital space labels
pub mod space;

/// Spin markers and their arena
pub mod spin;

/// Operator and tensor slots
pub mod index;

/// Symbolic tensors, as they appear in diagrams and contraction trees
pub mod tensor;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StructureError {
    #[error("{0} is not a known orbital space, expected one of [c,x,a,g]")]
    UnknownSpace(char),
    #[error("Empty tensor label")]
    EmptyLabel,
}
