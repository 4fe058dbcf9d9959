use serde::{Deserialize, Serialize};

use crate::structure::{index::Index, tensor::Tensor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One tensor-product term contributing to a physical quantity.
///
/// The first tensor is contracted last, against the product of the remaining ones.
/// `target_index` lists the projection slots of the quantity, it is empty for quantities
/// without outer indices.
pub struct Diagram {
    tensors: Vec<Tensor>,
    target_index: Vec<Index>,
    fac: f64,
    scalar: Option<String>,
    dagger: bool,
}

impl Diagram {
    pub fn new(tensors: Vec<Tensor>) -> Self {
        Diagram {
            tensors,
            target_index: Vec::new(),
            fac: 1.0,
            scalar: None,
            dagger: false,
        }
    }

    pub fn with_target_index(mut self, target_index: Vec<Index>) -> Self {
        self.target_index = target_index;
        self
    }

    pub fn with_factor(mut self, fac: f64) -> Self {
        self.fac = fac;
        self
    }

    pub fn with_scalar(mut self, scalar: impl Into<String>) -> Self {
        self.scalar = Some(scalar.into());
        self
    }

    pub fn with_dagger(mut self, dagger: bool) -> Self {
        self.dagger = dagger;
        self
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn target_index(&self) -> &[Index] {
        &self.target_index
    }

    pub fn fac(&self) -> f64 {
        self.fac
    }

    pub fn scalar(&self) -> Option<&str> {
        self.scalar.as_deref()
    }

    pub fn dagger(&self) -> bool {
        self.dagger
    }
}

/// A named collection of diagrams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    name: String,
    diagrams: Vec<Diagram>,
}

impl Equation {
    pub fn new(name: impl Into<String>) -> Self {
        Equation {
            name: name.into(),
            diagrams: Vec::new(),
        }
    }

    pub fn push(&mut self, diagram: Diagram) {
        self.diagrams.push(diagram);
    }

    pub fn with_diagram(mut self, diagram: Diagram) -> Self {
        self.push(diagram);
        self
    }

    /// Appends the diagrams of `other`.
    pub fn merge(&mut self, other: Equation) {
        self.diagrams.extend(other.diagrams);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn diagrams(&self) -> &[Diagram] {
        &self.diagrams
    }

    /// Whether any diagram carries projection slots.
    pub fn targets(&self) -> bool {
        self.diagrams.iter().any(|d| !d.target_index.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
/// The not yet contracted tail of a diagram, with the diagram's prefactor, scalar and dagger.
pub struct ListTensor {
    tensors: Vec<Tensor>,
    fac: f64,
    scalar: Option<String>,
    dagger: bool,
}

impl From<&Diagram> for ListTensor {
    fn from(d: &Diagram) -> Self {
        ListTensor {
            tensors: d.tensors.clone(),
            fac: d.fac,
            scalar: d.scalar.clone(),
            dagger: d.dagger,
        }
    }
}

impl ListTensor {
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn front(&self) -> Option<&Tensor> {
        self.tensors.first()
    }

    /// Everything but the front.
    pub fn rest(&self) -> ListTensor {
        ListTensor {
            tensors: self.tensors.iter().skip(1).cloned().collect(),
            fac: self.fac,
            scalar: self.scalar.clone(),
            dagger: self.dagger,
        }
    }

    pub fn split_front(&self) -> Option<(&Tensor, ListTensor)> {
        self.front().map(|f| (f, self.rest()))
    }

    pub fn fac(&self) -> f64 {
        self.fac
    }

    pub fn scalar(&self) -> Option<&str> {
        self.scalar.as_deref()
    }

    pub fn dagger(&self) -> bool {
        self.dagger
    }

    /// Slots that occur exactly once in the list, in order of first appearance.
    pub fn open_indices(&self) -> Vec<Index> {
        let all: Vec<&Index> = self.tensors.iter().flat_map(|t| t.indices()).collect();
        all.iter()
            .filter(|i| all.iter().filter(|j| j.identical(i)).count() == 1)
            .map(|i| **i)
            .collect()
    }

    /// The intermediate this list evaluates into, named after `n`.
    pub fn target(&self, n: usize) -> Tensor {
        Tensor::intermediate(n, self.open_indices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::space::Space;

    fn idx(space: Space, num: usize) -> Index {
        Index::new(space, num, false)
    }

    #[test]
    fn open_indices_of_a_product() {
        let t2 = Tensor::new(
            "t2",
            vec![
                idx(Space::Closed, 0),
                idx(Space::Virtual, 1),
                idx(Space::Closed, 2),
                idx(Space::Virtual, 3),
            ],
        )
        .unwrap();
        let f1 = Tensor::new(
            "f1",
            vec![Index::new(Space::Virtual, 3, true), idx(Space::Virtual, 4)],
        )
        .unwrap();
        let d = Diagram::new(vec![t2, f1]).with_factor(-2.0);
        let list = ListTensor::from(&d);

        let open: Vec<String> = list.open_indices().iter().map(|i| i.to_string()).collect();
        assert_eq!(open, vec!["c0", "a1", "c2", "a4"]);

        let target = list.target(7);
        assert_eq!(target.label(), "I7");
        assert_eq!(target.rank(), 4);

        let rest = list.rest();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.front().map(|t| t.label()), Some("f1"));
        assert_eq!(rest.fac(), -2.0);
        assert!(rest.rest().is_empty());
    }

    #[test]
    fn equation_targets() {
        let t = Tensor::new("f1", vec![idx(Space::Closed, 0), idx(Space::Closed, 1)]).unwrap();
        let mut eq = Equation::new("residual");
        eq.push(Diagram::new(vec![t.clone(), t.clone()]));
        assert!(!eq.targets());

        let other = Equation::new("other").with_diagram(
            Diagram::new(vec![t.clone(), t]).with_target_index(vec![idx(Space::Closed, 0)]),
        );
        eq.merge(other);
        assert!(eq.targets());
        assert_eq!(eq.diagrams().len(), 2);
        assert_eq!(eq.name(), "residual");
    }
}
