use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::structure::{index::Index, tensor::Tensor};
use crate::tree::{Forest, ForestError};
use crate::utils::join_display;

mod builder;

/// Scalars a task may be multiplied by unless configured otherwise.
pub const DEFAULT_SCALARS: [&str; 1] = ["e0"];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum TaskKind {
    /// Zeroes the output tensor of the quantity.
    Reset,
    /// Top level contraction into the output tensor.
    Projection,
    Contraction,
    /// Sum of the operands of a tree into its target.
    Summation,
    /// Contraction of a CI derivative against a density or `rdm0` tensor.
    CiContraction,
}

/// One step of the generated program, as handed to the code emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: usize,
    pub kind: TaskKind,
    pub output: Tensor,
    pub inputs: Vec<Tensor>,
    /// Slots of the output.
    pub outer_indices: Vec<Index>,
    /// Slots summed over.
    pub inner_indices: Vec<Index>,
    pub depends: BTreeSet<usize>,
    /// No density tensor anywhere above or below, the task also runs on the diagonal path.
    pub diagonal_only: bool,
    /// Intermediates this task touches first, to be declared before it runs.
    pub constructors: Vec<Tensor>,
    pub scalar: Option<String>,
    pub dagger: bool,
}

impl Task {
    /// Outer slots followed by the summed ones.
    pub fn loop_indices(&self) -> Vec<Index> {
        self.outer_indices
            .iter()
            .chain(&self.inner_indices)
            .copied()
            .collect()
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{} {} {}", self.id, self.kind, self.output)?;
        if !self.inputs.is_empty() {
            write!(f, " <- {}", join_display(&self.inputs, ", "))?;
        }
        if !self.depends.is_empty() {
            let deps: Vec<usize> = self.depends.iter().copied().collect();
            write!(f, " after {}", join_display(&deps, ", "))?;
        }
        if self.diagonal_only {
            write!(f, " diagonal")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task {task} depends on unknown task {dep}")]
    UnknownDependency { task: usize, dep: usize },
    #[error("Task {task} depends on task {dep}, which does not run before it")]
    OutOfOrder { task: usize, dep: usize },
    #[error("Task at position {position} has id {id}")]
    IdMismatch { position: usize, id: usize },
}

/// The linearized forest of one quantity.
///
/// Task ids are positions in the list, and every task depends only on tasks with smaller
/// ids, so running the list in order respects all dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGraph {
    label: String,
    tasks: Vec<Task>,
    required_rdm: Vec<String>,
}

impl TaskGraph {
    /// Walks `forest` depth first. Task scalars must be one of `scalars`.
    pub fn from_forest<S: AsRef<str>>(
        forest: &Forest,
        scalars: &[S],
    ) -> Result<Self, ForestError> {
        let scalars: Vec<&str> = scalars.iter().map(AsRef::as_ref).collect();
        let tasks = builder::TaskContext::new(forest, &scalars).run()?;
        Ok(TaskGraph {
            label: forest.label().to_string(),
            tasks,
            required_rdm: forest.required_rdm(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: usize) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Density matrices the emitted code has to load, see [`Forest::required_rdm`].
    pub fn required_rdm(&self) -> &[String] {
        &self.required_rdm
    }

    /// Every intermediate of the graph, in declaration order.
    pub fn constructors(&self) -> Vec<&Tensor> {
        self.tasks.iter().flat_map(|t| &t.constructors).collect()
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        for (position, task) in self.tasks.iter().enumerate() {
            if task.id != position {
                return Err(TaskError::IdMismatch {
                    position,
                    id: task.id,
                });
            }
            for &dep in &task.depends {
                if dep >= self.tasks.len() {
                    return Err(TaskError::UnknownDependency { task: task.id, dep });
                }
                if dep >= task.id {
                    return Err(TaskError::OutOfOrder { task: task.id, dep });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for t in &self.tasks {
            writeln!(f, "{t}")?;
        }
        Ok(())
    }
}

impl Forest {
    /// [`TaskGraph::from_forest`] with the default scalar `e0`.
    pub fn task_graph(&self) -> Result<TaskGraph, ForestError> {
        TaskGraph::from_forest(self, &DEFAULT_SCALARS)
    }
}
