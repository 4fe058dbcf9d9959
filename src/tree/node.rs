use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::structure::{index::Index, tensor::Tensor};
use crate::utils::join_display;

new_key_type! {
    pub struct TreeId;
    pub struct ContractionId;
}

/// A node of the forest: operands summed into `target`, plus the binary contractions that
/// also write into it.
///
/// Children are owned through the arena. `parent` is a plain handle used for upward
/// queries only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeNode {
    pub(crate) target: Option<Tensor>,
    pub(crate) dagger: bool,
    pub(crate) ops: Vec<Tensor>,
    pub(crate) bcs: Vec<ContractionId>,
    pub(crate) parent: Option<ContractionId>,
}

impl TreeNode {
    pub fn target(&self) -> Option<&Tensor> {
        self.target.as_ref()
    }

    pub fn dagger(&self) -> bool {
        self.dagger
    }

    pub fn ops(&self) -> &[Tensor] {
        &self.ops
    }

    pub fn bcs(&self) -> &[ContractionId] {
        &self.bcs
    }

    pub fn parent(&self) -> Option<ContractionId> {
        self.parent
    }

    /// A bare single operand, which the enclosing contraction can read directly.
    pub fn can_move_up(&self) -> bool {
        self.ops.len() == 1 && self.bcs.is_empty()
    }
}

/// `target = tensor * (sum of subtree targets)`, or `target = tensor * source` once a
/// single-operand subtree has been moved up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryContraction {
    pub(crate) target: Option<Tensor>,
    pub(crate) tensor: Tensor,
    pub(crate) subtrees: Vec<TreeId>,
    pub(crate) source: Option<Tensor>,
    pub(crate) target_index: Vec<Index>,
    pub(crate) dagger: bool,
    pub(crate) parent: Option<TreeId>,
}

impl BinaryContraction {
    pub fn target(&self) -> Option<&Tensor> {
        self.target.as_ref()
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn subtrees(&self) -> &[TreeId] {
        &self.subtrees
    }

    pub fn source(&self) -> Option<&Tensor> {
        self.source.as_ref()
    }

    /// Projection slots, only set on top level contractions.
    pub fn target_index(&self) -> &[Index] {
        &self.target_index
    }

    pub fn dagger(&self) -> bool {
        self.dagger
    }

    pub fn parent(&self) -> Option<TreeId> {
        self.parent
    }

    /// Printable signature of the projection slots, `(c0, a1)` or empty.
    pub fn target_index_str(&self) -> String {
        if self.target_index.is_empty() {
            String::new()
        } else {
            format!("({})", join_display(&self.target_index, ", "))
        }
    }

    /// Whether `self` and `other` compute into the same slot.
    pub(crate) fn same_slot(&self, other: &BinaryContraction) -> bool {
        self.tensor == other.tensor
            && self.dagger == other.dagger
            && self.target_index_str() == other.target_index_str()
    }
}
