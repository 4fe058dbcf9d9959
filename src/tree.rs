use log::debug;
use serde::{Deserialize, Serialize};
use slotmap::{Key, SlotMap};
use std::collections::BTreeSet;
use std::fmt::Display;
use thiserror::Error;

use crate::diagram::{Equation, ListTensor};
use crate::structure::{index::Index, tensor::Tensor};

pub mod node;
/// Rewriting passes over a forest
pub mod passes;

pub use node::{BinaryContraction, ContractionId, TreeId, TreeNode};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForestError {
    #[error("Code generation for tree kind {0} is not implemented")]
    Unimplemented(String),
    #[error("Tree kind {0} has been removed")]
    Removed(String),
    #[error("Diagram with {0} tensors, a contraction needs at least 2")]
    DiagramTooShort(usize),
    #[error("Empty target index list in a top level projection")]
    EmptyTargetIndex,
    #[error("Unknown scalar {0}")]
    UnknownScalar(String),
    #[error("Multiple scalars in one task: {0} and {1}")]
    MultipleScalars(String, String),
    #[error("Daggered projection needs 4 target indices, got {0}")]
    DaggerRank(usize),
}

/// The physical quantities a forest can be generated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityKind {
    Residual,
    Source,
    Density,
    Density1,
    Density2,
    /// CI derivative, any label containing `deci`.
    CiDerivative(String),
    Norm,
}

impl QuantityKind {
    pub fn from_label(label: &str) -> Result<Self, ForestError> {
        match label {
            "residual" => Ok(QuantityKind::Residual),
            "source" => Ok(QuantityKind::Source),
            "density" => Ok(QuantityKind::Density),
            "density1" => Ok(QuantityKind::Density1),
            "density2" => Ok(QuantityKind::Density2),
            "norm" => Ok(QuantityKind::Norm),
            "energy" | "corr" => Err(ForestError::Removed(label.to_string())),
            l if l.contains("deci") => Ok(QuantityKind::CiDerivative(l.to_string())),
            _ => Err(ForestError::Unimplemented(label.to_string())),
        }
    }

    /// Name of the tensor the quantity is accumulated in.
    pub fn output_name(&self) -> &str {
        match self {
            QuantityKind::Residual => "r",
            QuantityKind::Source => "s",
            QuantityKind::Density => "den2",
            QuantityKind::Density1 => "den1",
            QuantityKind::Density2 => "Den1",
            QuantityKind::CiDerivative(_) => "deci",
            QuantityKind::Norm => "n",
        }
    }

    pub fn is_ci_derivative(&self) -> bool {
        matches!(self, QuantityKind::CiDerivative(_))
    }
}

/// All contraction trees of one quantity, stored in two arenas.
///
/// The root tree has no target. Each of its binary contractions is one diagram (or, after
/// factorization, several diagrams sharing their first tensor and projection slots).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forest {
    label: String,
    kind: QuantityKind,
    root_targets: bool,
    root: TreeId,
    pub(crate) trees: SlotMap<TreeId, TreeNode>,
    pub(crate) contractions: SlotMap<ContractionId, BinaryContraction>,
}

impl Forest {
    /// Assembles and runs every pass: factorization, single operand elision, parent
    /// linkage and target propagation.
    pub fn new(eq: &Equation, label: &str) -> Result<Self, ForestError> {
        Ok(Self::assemble(eq, label)?
            .factorize()
            .move_up_operator()
            .set_parent()
            .set_target_rec())
    }

    /// One right-nested chain per diagram, without any rewriting.
    pub fn assemble(eq: &Equation, label: &str) -> Result<Self, ForestError> {
        let kind = QuantityKind::from_label(label)?;
        let mut forest = Forest {
            label: label.to_string(),
            kind,
            root_targets: eq.targets(),
            root: TreeId::null(),
            trees: SlotMap::with_key(),
            contractions: SlotMap::with_key(),
        };

        let mut intermediates = 0;
        let mut bcs = Vec::with_capacity(eq.diagrams().len());
        for d in eq.diagrams() {
            let list = ListTensor::from(d);
            let Some((first, rest)) = list.split_front().filter(|(_, r)| !r.is_empty()) else {
                return Err(ForestError::DiagramTooShort(list.len()));
            };
            let sub = forest.grow(rest, &mut intermediates);
            bcs.push(forest.contractions.insert(BinaryContraction {
                target: None,
                tensor: first.clone(),
                subtrees: vec![sub],
                source: None,
                target_index: d.target_index().to_vec(),
                dagger: d.dagger(),
                parent: None,
            }));
        }
        forest.root = forest.trees.insert(TreeNode {
            bcs,
            ..Default::default()
        });

        debug!(
            "{label}: {} trees, {} contractions from {} diagrams",
            forest.trees.len(),
            forest.contractions.len(),
            eq.diagrams().len()
        );
        Ok(forest)
    }

    fn grow(&mut self, list: ListTensor, intermediates: &mut usize) -> TreeId {
        let target = list.target(*intermediates);
        *intermediates += 1;

        let mut node = TreeNode {
            target: Some(target.clone()),
            dagger: list.dagger(),
            ..Default::default()
        };
        match list.split_front() {
            Some((front, rest)) if !rest.is_empty() => {
                let sub = self.grow(rest, intermediates);
                node.bcs.push(self.contractions.insert(BinaryContraction {
                    target: Some(target),
                    tensor: front.clone(),
                    subtrees: vec![sub],
                    source: None,
                    target_index: Vec::new(),
                    dagger: list.dagger(),
                    parent: None,
                }));
            }
            Some((front, _)) => {
                let mut op = front.clone();
                op.set_factor(op.factor() * list.fac());
                op.set_scalar(list.scalar().map(String::from));
                node.ops.push(op);
            }
            None => {}
        }
        self.trees.insert(node)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &QuantityKind {
        &self.kind
    }

    /// Whether the quantity has projection slots, which decides if a reset task and top level
    /// projections are emitted.
    pub fn root_targets(&self) -> bool {
        self.root_targets
    }

    pub fn root(&self) -> TreeId {
        self.root
    }

    pub fn tree(&self, id: TreeId) -> &TreeNode {
        &self.trees[id]
    }

    pub fn contraction(&self, id: ContractionId) -> &BinaryContraction {
        &self.contractions[id]
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn contraction_count(&self) -> usize {
        self.contractions.len()
    }

    pub fn depth(&self, id: TreeId) -> usize {
        match self.trees[id].parent {
            Some(b) => self.contractions[b].parent.map_or(0, |p| self.depth(p)) + 1,
            None => 0,
        }
    }

    pub fn contraction_depth(&self, id: ContractionId) -> usize {
        self.contractions[id].parent.map_or(0, |t| self.depth(t))
    }

    /// The operand read by a contraction besides its tensor.
    pub fn next_target(&self, id: ContractionId) -> Option<&Tensor> {
        let bc = &self.contractions[id];
        match bc.subtrees.first() {
            Some(&t) => self.trees[t].target.as_ref(),
            None => bc.source.as_ref(),
        }
    }

    /// Slots of the contraction tensor that do not survive into the output.
    pub fn loop_indices(&self, id: ContractionId) -> Vec<Index> {
        let bc = &self.contractions[id];
        let outer = match &bc.target {
            Some(t) => t.indices(),
            None => bc.target_index.as_slice(),
        };
        bc.tensor
            .indices()
            .iter()
            .filter(|i| !outer.iter().any(|o| o.identical(i)))
            .copied()
            .collect()
    }

    pub fn tree_nogamma_upstream(&self, id: TreeId) -> bool {
        self.trees[id]
            .parent
            .map_or(true, |b| self.contraction_nogamma_upstream(b))
    }

    pub fn contraction_nogamma_upstream(&self, id: ContractionId) -> bool {
        let bc = &self.contractions[id];
        !bc.tensor.is_gamma() && bc.parent.map_or(true, |t| self.tree_nogamma_upstream(t))
    }

    pub fn tree_diagonal_only(&self, id: TreeId) -> bool {
        let node = &self.trees[id];
        self.tree_nogamma_upstream(id)
            && node.ops.iter().all(|o| !o.is_gamma())
            && node.bcs.iter().all(|&b| self.contraction_diagonal_only(b))
    }

    /// No density tensor in the contraction, below it, or above it.
    pub fn contraction_diagonal_only(&self, id: ContractionId) -> bool {
        let bc = &self.contractions[id];
        !bc.tensor.is_gamma()
            && bc.subtrees.iter().all(|&t| self.tree_diagonal_only(t))
            && bc.source.as_ref().map_or(true, |s| !s.is_gamma())
            && self.contraction_nogamma_upstream(id)
    }

    /// Every density tensor in the forest: sources and operands below each contraction first,
    /// then the contraction tensors of each tree.
    pub fn gather_gamma(&self) -> Vec<&Tensor> {
        self.gather_gamma_below(self.root)
    }

    fn gather_gamma_below(&self, id: TreeId) -> Vec<&Tensor> {
        let node = &self.trees[id];
        let mut out = Vec::new();
        for &b in &node.bcs {
            let bc = &self.contractions[b];
            for &t in &bc.subtrees {
                out.extend(self.gather_gamma_below(t));
            }
            out.extend(bc.source.iter().filter(|s| s.is_gamma()));
        }
        out.extend(node.ops.iter().filter(|o| o.is_gamma()));
        out.extend(
            node.bcs
                .iter()
                .map(|&b| &self.contractions[b].tensor)
                .filter(|t| t.is_gamma()),
        );
        out
    }

    /// [`Forest::gather_gamma`] without structural duplicates, in order of first appearance.
    pub fn unique_gamma(&self) -> Vec<&Tensor> {
        let mut out: Vec<&Tensor> = Vec::new();
        for g in self.gather_gamma() {
            if !out.iter().any(|o| *o == g) {
                out.push(g);
            }
        }
        out
    }

    /// Density matrices the Gamma tensors of the forest read, `rdm<n>` for a tensor with
    /// `2n` slots, sorted by rank.
    pub fn required_rdm(&self) -> Vec<String> {
        self.unique_gamma()
            .iter()
            .map(|g| g.rank() / 2)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|r| format!("rdm{r}"))
            .collect()
    }

    /// Evaluates the forest with every tensor replaced by a number.
    ///
    /// Contractions become products and operand lists become sums, prefactors included.
    /// Rewriting passes must leave this value unchanged for any `value`.
    pub fn evaluate(&self, value: impl Fn(&Tensor) -> f64) -> f64 {
        self.evaluate_tree(self.root, &value)
    }

    fn evaluate_tree(&self, id: TreeId, value: &impl Fn(&Tensor) -> f64) -> f64 {
        let node = &self.trees[id];
        let ops: f64 = node.ops.iter().map(|o| value(o) * o.factor()).sum();
        let bcs: f64 = node
            .bcs
            .iter()
            .map(|&b| self.evaluate_contraction(b, value))
            .sum();
        ops + bcs
    }

    fn evaluate_contraction(&self, id: ContractionId, value: &impl Fn(&Tensor) -> f64) -> f64 {
        let bc = &self.contractions[id];
        let operand = if bc.subtrees.is_empty() {
            bc.source.as_ref().map_or(0.0, |s| value(s) * s.factor())
        } else {
            bc.subtrees
                .iter()
                .map(|&t| self.evaluate_tree(t, value))
                .sum()
        };
        value(&bc.tensor) * bc.tensor.factor() * operand
    }

    fn fmt_tree(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        id: TreeId,
        depth: usize,
    ) -> std::fmt::Result {
        let node = &self.trees[id];
        let indent = "  ".repeat(depth);
        if let Some(target) = &node.target {
            for op in &node.ops {
                writeln!(
                    f,
                    "{indent}{target} += {op}{}",
                    if node.dagger { " *" } else { "" }
                )?;
            }
        }
        for &b in &node.bcs {
            self.fmt_contraction(f, b, depth)?;
        }
        Ok(())
    }

    fn fmt_contraction(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        id: ContractionId,
        depth: usize,
    ) -> std::fmt::Result {
        let bc = &self.contractions[id];
        write!(f, "{}", "  ".repeat(depth))?;
        if let Some(target) = &bc.target {
            write!(f, "{target} = ")?;
        }
        write!(f, "{}", bc.tensor)?;
        if depth == 0 {
            write!(f, "{}", bc.target_index_str())?;
        }
        match self.next_target(id) {
            Some(next) => writeln!(f, " * {next}")?,
            None => writeln!(f)?,
        }
        for &t in &bc.subtrees {
            self.fmt_tree(f, t, depth + 1)?;
        }
        Ok(())
    }
}

impl Display for Forest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_tree(f, self.root, 0)
    }
}
