use indexmap::IndexSet;
use log::{debug, trace};
use std::collections::BTreeSet;

use super::{Task, TaskKind};
use crate::structure::{index::Index, tensor::Tensor};
use crate::tree::{ContractionId, Forest, ForestError, TreeId};

/// Mutable state of one depth-first walk.
///
/// Ids are handed out when a task is emitted, which happens after everything it reads has
/// been emitted.
pub(super) struct TaskContext<'a> {
    forest: &'a Forest,
    scalars: &'a [&'a str],
    tasks: Vec<Task>,
    reset: Option<usize>,
    declared: IndexSet<String>,
}

/// Everything but id, constructors and the reset edge.
struct Draft {
    kind: TaskKind,
    output: Tensor,
    inputs: Vec<Tensor>,
    outer_indices: Vec<Index>,
    inner_indices: Vec<Index>,
    depends: BTreeSet<usize>,
    diagonal_only: bool,
    dagger: bool,
}

impl<'a> TaskContext<'a> {
    pub(super) fn new(forest: &'a Forest, scalars: &'a [&'a str]) -> Self {
        TaskContext {
            forest,
            scalars,
            tasks: Vec::new(),
            reset: None,
            declared: IndexSet::new(),
        }
    }

    pub(super) fn run(mut self) -> Result<Vec<Task>, ForestError> {
        let forest = self.forest;
        let root = forest.tree(forest.root());

        if forest.root_targets() {
            let output = Tensor::from_parts(forest.kind().output_name(), Vec::new());
            let id = self.emit(Draft {
                kind: TaskKind::Reset,
                output,
                inputs: Vec::new(),
                outer_indices: Vec::new(),
                inner_indices: Vec::new(),
                depends: BTreeSet::new(),
                diagonal_only: false,
                dagger: false,
            })?;
            self.reset = Some(id);
        }

        for &b in root.bcs() {
            if forest.root_targets() {
                self.walk_contraction(b)?;
            } else {
                self.walk_subtrees(b)?;
            }
        }

        debug!("{}: {} tasks", forest.label(), self.tasks.len());
        Ok(self.tasks)
    }

    /// Ids of the tasks emitted directly by the subtrees of `id`, which are the writers of
    /// its operand.
    fn walk_subtrees(&mut self, id: ContractionId) -> Result<Vec<usize>, ForestError> {
        let mut ids = Vec::new();
        for &t in self.forest.contraction(id).subtrees() {
            ids.extend(self.walk_tree(t)?);
        }
        Ok(ids)
    }

    fn walk_tree(&mut self, id: TreeId) -> Result<Vec<usize>, ForestError> {
        let forest = self.forest;
        let node = forest.tree(id);

        let mut ids = Vec::with_capacity(node.bcs().len() + 1);
        for &b in node.bcs() {
            ids.push(self.walk_contraction(b)?);
        }

        if let (Some(target), false) = (node.target(), node.ops().is_empty()) {
            let diagonal_only =
                forest.tree_nogamma_upstream(id) && node.ops().iter().all(|o| !o.is_gamma());
            ids.push(self.emit(Draft {
                kind: TaskKind::Summation,
                output: target.clone(),
                inputs: node.ops().to_vec(),
                outer_indices: target.indices().to_vec(),
                inner_indices: Vec::new(),
                depends: BTreeSet::new(),
                diagonal_only,
                dagger: node.dagger(),
            })?);
        }
        Ok(ids)
    }

    fn walk_contraction(&mut self, id: ContractionId) -> Result<usize, ForestError> {
        let forest = self.forest;
        let depends = self.walk_subtrees(id)?.into_iter().collect();
        let bc = forest.contraction(id);

        let (kind, output) = match bc.target() {
            Some(target) => {
                let ci = forest.kind().is_ci_derivative()
                    && (bc.tensor().is_gamma() || bc.tensor().label().contains("rdm0"));
                let kind = if ci {
                    TaskKind::CiContraction
                } else {
                    TaskKind::Contraction
                };
                (kind, target.clone())
            }
            None => (TaskKind::Projection, self.projection_output(id)?),
        };

        let mut inputs = vec![bc.tensor().clone()];
        inputs.extend(forest.next_target(id).cloned());

        self.emit(Draft {
            kind,
            outer_indices: output.indices().to_vec(),
            output,
            inputs,
            inner_indices: forest.loop_indices(id),
            depends,
            diagonal_only: forest.contraction_diagonal_only(id),
            dagger: bc.dagger(),
        })
    }

    /// The quantity's output tensor, indexed by the projection slots with each pair swapped.
    fn projection_output(&self, id: ContractionId) -> Result<Tensor, ForestError> {
        let bc = self.forest.contraction(id);
        let target_index = bc.target_index();
        if target_index.is_empty() {
            return Err(ForestError::EmptyTargetIndex);
        }
        if bc.dagger() && target_index.len() != 4 {
            return Err(ForestError::DaggerRank(target_index.len()));
        }
        let swapped = target_index
            .chunks(2)
            .flat_map(|pair| pair.iter().rev())
            .copied()
            .collect();
        Ok(Tensor::from_parts(self.forest.kind().output_name(), swapped))
    }

    /// The single scalar the inputs are multiplied by, if any.
    fn scalar_of(&self, inputs: &[Tensor]) -> Result<Option<String>, ForestError> {
        let mut found: Option<&str> = None;
        for s in inputs.iter().filter_map(|t| t.scalar()) {
            if !self.scalars.contains(&s) {
                return Err(ForestError::UnknownScalar(s.to_string()));
            }
            match found {
                Some(f) if f != s => {
                    return Err(ForestError::MultipleScalars(f.to_string(), s.to_string()))
                }
                _ => found = Some(s),
            }
        }
        Ok(found.map(String::from))
    }

    fn emit(&mut self, draft: Draft) -> Result<usize, ForestError> {
        let scalar = self.scalar_of(&draft.inputs)?;
        let id = self.tasks.len();

        let mut depends = draft.depends;
        if let Some(reset) = self.reset {
            if !draft.output.is_gamma() {
                depends.insert(reset);
            }
        }

        let mut constructors = Vec::new();
        for t in std::iter::once(&draft.output).chain(&draft.inputs) {
            if t.is_intermediate() && self.declared.insert(t.label().to_string()) {
                constructors.push(Tensor::from_parts(t.label(), t.indices().to_vec()));
            }
        }

        let task = Task {
            id,
            kind: draft.kind,
            output: draft.output,
            inputs: draft.inputs,
            outer_indices: draft.outer_indices,
            inner_indices: draft.inner_indices,
            depends,
            diagonal_only: draft.diagonal_only,
            constructors,
            scalar,
            dagger: draft.dagger,
        };
        trace!("{task}");
        self.tasks.push(task);
        Ok(id)
    }
}
