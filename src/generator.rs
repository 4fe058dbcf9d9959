use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

use crate::diagram::Equation;
use crate::settings::GeneratorSettings;
use crate::task::{TaskError, TaskGraph};
use crate::tree::{Forest, ForestError};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("No equation for quantity {0}")]
    MissingEquation(String),
    #[error(transparent)]
    Forest(#[from] ForestError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Runs every requested quantity from equations to task graph.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    settings: GeneratorSettings,
}

impl Generator {
    pub fn new(settings: GeneratorSettings) -> Self {
        Generator { settings }
    }

    pub fn from_json(json: &str) -> Result<Self, GenerationError> {
        Ok(Self::new(GeneratorSettings::from_json(json)?))
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// The forest of one quantity, with the passes the settings ask for.
    pub fn forest(&self, eq: &Equation, label: &str) -> Result<Forest, GenerationError> {
        let mut forest = Forest::assemble(eq, label)?;
        if self.settings.factorize {
            forest = forest.factorize();
        }
        if self.settings.elide_single_operands {
            forest = forest.move_up_operator();
        }
        Ok(forest.set_parent().set_target_rec())
    }

    pub fn task_graph(&self, eq: &Equation, label: &str) -> Result<TaskGraph, GenerationError> {
        let forest = self.forest(eq, label)?;
        let graph = TaskGraph::from_forest(&forest, self.settings.scalars.as_slice())?;
        if self.settings.validate {
            graph.validate()?;
        }
        debug!(
            "{label}: {} diagrams, {} contractions, {} tasks",
            eq.diagrams().len(),
            forest.contraction_count(),
            graph.len()
        );
        Ok(graph)
    }

    /// One task graph per requested quantity, in the order of the settings. Each graph
    /// numbers its tasks from 0.
    pub fn run(
        &self,
        equations: &IndexMap<String, Equation>,
    ) -> Result<IndexMap<String, TaskGraph>, GenerationError> {
        let mut out = IndexMap::with_capacity(self.settings.quantities.len());
        for label in &self.settings.quantities {
            let eq = equations
                .get(label)
                .ok_or_else(|| GenerationError::MissingEquation(label.clone()))?;
            out.insert(label.clone(), self.task_graph(eq, label)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::Diagram;
    use crate::structure::{index::Index, space::Space, tensor::Tensor};

    fn t(label: &str, slots: &[(Space, usize)]) -> Tensor {
        Tensor::new(
            label,
            slots
                .iter()
                .map(|&(s, n)| Index::new(s, n, false))
                .collect(),
        )
        .unwrap()
    }

    fn residual() -> Equation {
        let proj = vec![
            Index::new(Space::Closed, 0, false),
            Index::new(Space::Virtual, 1, false),
        ];
        let p = t("P", &[(Space::Closed, 0), (Space::Virtual, 1)]);
        let f1 = t("f1", &[(Space::Virtual, 1), (Space::Virtual, 2)]);
        Equation::new("residual")
            .with_diagram(
                Diagram::new(vec![
                    p.clone(),
                    f1.clone(),
                    t("t1", &[(Space::Virtual, 2), (Space::Closed, 0)]),
                ])
                .with_target_index(proj.clone()),
            )
            .with_diagram(
                Diagram::new(vec![p, f1, t("h1", &[(Space::Virtual, 2), (Space::Closed, 0)])])
                    .with_target_index(proj),
            )
    }

    #[test]
    fn settings_select_passes() {
        let eq = residual();
        let full = Generator::default().forest(&eq, "residual").unwrap();
        assert_eq!(full.contraction_count(), 2);

        let plain = Generator::from_json(r#"{"factorize": false}"#)
            .unwrap()
            .forest(&eq, "residual")
            .unwrap();
        assert_eq!(plain.contraction_count(), 4);
        assert_eq!(plain.tree_count(), 3);

        let unelided =
            Generator::from_json(r#"{"factorize": false, "elide_single_operands": false}"#)
                .unwrap()
                .forest(&eq, "residual")
                .unwrap();
        assert_eq!(unelided.tree_count(), 5);
    }

    #[test]
    fn run_in_settings_order() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut equations = IndexMap::new();
        equations.insert("residual".to_string(), residual());
        let mut source = residual();
        source.merge(residual());
        equations.insert("source".to_string(), source);

        let generator = Generator::new(
            GeneratorSettings::default().with_quantities(["source", "residual"]),
        );
        let graphs = generator.run(&equations).unwrap();
        let labels: Vec<&String> = graphs.keys().collect();
        assert_eq!(labels, vec!["source", "residual"]);
        assert_eq!(graphs["source"].label(), "source");
        assert_eq!(graphs["source"].get(0).map(|t| t.output.label()), Some("s"));
        assert_eq!(graphs["residual"].get(0).map(|t| t.id), Some(0));
    }

    #[test]
    fn errors_abort_the_run() {
        let mut equations = IndexMap::new();
        equations.insert("residual".to_string(), residual());

        let generator = Generator::new(GeneratorSettings::default().with_quantities(["norm"]));
        assert!(matches!(
            generator.run(&equations),
            Err(GenerationError::MissingEquation(l)) if l == "norm"
        ));

        equations.insert("energy".to_string(), residual());
        let generator = Generator::new(GeneratorSettings::default().with_quantities(["energy"]));
        assert!(matches!(
            generator.run(&equations),
            Err(GenerationError::Forest(ForestError::Removed(_)))
        ));

        assert!(matches!(
            Generator::from_json("[1, 2]"),
            Err(GenerationError::Other(_))
        ));
    }
}
