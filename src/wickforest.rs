/*!

Symbolic core of a generator for spin-free multireference correlation programs.

An operator string over an active orbital space (see [`OperatorString`]) is reduced with
Wick's theorem into a set of terminal [`RdmTerm`]s, each carrying the sign, spin
substitutions and multiplicity picked up along the way. The terms are canonicalized to
the alternating `p+ p q+ q ...` layout so that they can be compared.

Tensor-product diagrams built from those terms are assembled into a [`Forest`] of
contraction trees. Sibling contractions that compute into the same slot are merged, single
operand subtrees are elided, and the factored forest is linearized into a [`TaskGraph`]:
an ordered list of tasks with dependency edges, ready for an external code emitter.

Nothing here performs floating point contractions or executes tasks.

*/

/// Orbital spaces, spin handles, indices and symbolic tensors
pub mod structure;

/// Wick contraction engine
pub mod wick;

/// Diagrams and equations, the input to tree assembly
pub mod diagram;

/// Contraction trees and the factorizer
pub mod tree;

/// Task graphs
pub mod task;

pub mod generator;
pub mod settings;

pub mod utils;

pub use diagram::{Diagram, Equation, ListTensor};
pub use generator::{GenerationError, Generator};
pub use settings::GeneratorSettings;
pub use structure::{
    index::Index,
    space::Space,
    spin::{Spin, SpinId, SpinStore},
    tensor::Tensor,
    StructureError,
};
pub use task::{Task, TaskError, TaskGraph, TaskKind};
pub use tree::{Forest, ForestError, QuantityKind};
pub use wick::{active::Active, operator::OperatorString, rdm::RdmTerm, WickError};

#[cfg(test)]
mod tests;
