use serde::{Deserialize, Serialize};

use crate::structure::{
    index::Index,
    space::Space,
    spin::{SpinId, SpinStore},
};

/// Builder for an uncontracted operator string.
///
/// Every pushed operator gets the next `num`, so slots are unique within the string.
/// The builder owns the [`SpinStore`] the resulting terms refer to.
///
/// ```
/// # use wickforest::{OperatorString, Space};
/// let mut ops = OperatorString::new();
/// ops.excitation(Space::Active, Space::Active);
/// ops.excitation(Space::Active, Space::Active);
/// assert_eq!(ops.len(), 4);
/// assert_eq!(ops.spins().len(), 2);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorString {
    spins: SpinStore,
    indices: Vec<Index>,
}

impl OperatorString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_spin(&mut self) -> SpinId {
        self.spins.fresh()
    }

    pub fn push(&mut self, space: Space, dagger: bool, spin: SpinId) -> Index {
        let index = Index::with_spin(space, self.indices.len(), dagger, spin);
        self.indices.push(index);
        index
    }

    /// Appends the spin-summed excitation `p+ q`.
    pub fn excitation(&mut self, p: Space, q: Space) -> (Index, Index) {
        let s = self.new_spin();
        (self.push(p, true, s), self.push(q, false, s))
    }

    /// Appends `p q+`, both on one fresh spin.
    pub fn deexcitation(&mut self, p: Space, q: Space) -> (Index, Index) {
        let s = self.new_spin();
        (self.push(p, false, s), self.push(q, true, s))
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    pub fn spins(&self) -> &SpinStore {
        &self.spins
    }

    pub fn into_parts(self) -> (Vec<Index>, SpinStore) {
        (self.indices, self.spins)
    }
}

#[test]
fn nums_are_unique() {
    let mut ops = OperatorString::new();
    let s = ops.new_spin();
    ops.push(Space::Active, false, s);
    ops.deexcitation(Space::Active, Space::Active);
    ops.push(Space::Active, true, s);

    let nums: Vec<_> = ops.indices().iter().map(|i| i.num()).collect();
    assert_eq!(nums, vec![0, 1, 2, 3]);
    assert!(ops.indices()[0].same_spin(&ops.indices()[3]));
    assert!(ops.indices()[1].same_spin(&ops.indices()[2]));
    assert!(!ops.indices()[0].same_spin(&ops.indices()[1]));
}
