use serde::{Deserialize, Serialize};
use slotmap::Key;
use std::fmt::Display;

use super::{
    space::Space,
    spin::{SpinId, SpinStore},
};
use crate::utils::to_subscript;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// An operator slot or a tensor slot.
///
/// `num` is assigned once when the slot is created and is copied, never changed, by every
/// clone of a term. It is the only identity used to find "the same slot" across copies.
/// Operator slots hold a spin handle, tensor slots hold the null [`SpinId`].
pub struct Index {
    space: Space,
    num: usize,
    dagger: bool,
    spin: SpinId,
}

impl Index {
    /// A tensor slot, without spin.
    pub fn new(space: Space, num: usize, dagger: bool) -> Self {
        Index {
            space,
            num,
            dagger,
            spin: SpinId::null(),
        }
    }

    pub fn with_spin(space: Space, num: usize, dagger: bool, spin: SpinId) -> Self {
        Index {
            space,
            num,
            dagger,
            spin,
        }
    }

    pub fn space(&self) -> Space {
        self.space
    }

    pub fn num(&self) -> usize {
        self.num
    }

    pub fn dagger(&self) -> bool {
        self.dagger
    }

    pub fn spin(&self) -> SpinId {
        self.spin
    }

    pub fn set_spin(&mut self, spin: SpinId) {
        self.spin = spin;
    }

    pub fn same_num(&self, other: &Index) -> bool {
        self.num == other.num
    }

    pub fn same_spin(&self, other: &Index) -> bool {
        self.spin == other.spin
    }

    /// Same slot: space and `num` agree. Spin and dagger are ignored, a contracted slot
    /// shows up as `p+` on one tensor and `p` on the other.
    pub fn identical(&self, other: &Index) -> bool {
        self.space == other.space && self.num == other.num
    }

    /// Displays the slot together with the tag of its spin.
    pub fn with_spins<'a>(&'a self, spins: &'a SpinStore) -> IndexWithSpin<'a> {
        IndexWithSpin { index: self, spins }
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.space,
            self.num,
            if self.dagger { "+" } else { "" }
        )
    }
}

pub struct IndexWithSpin<'a> {
    index: &'a Index,
    spins: &'a SpinStore,
}

impl Display for IndexWithSpin<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.spins.tag(self.index.spin) {
            Some(tag) => write!(f, "{}{}", self.index, to_subscript(tag as isize)),
            None => write!(f, "{}", self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity() {
        let mut spins = SpinStore::new();
        let s0 = spins.fresh();
        let s1 = spins.fresh();

        let a = Index::with_spin(Space::Active, 3, true, s0);
        let b = Index::with_spin(Space::Active, 3, true, s1);
        let c = Index::new(Space::Closed, 3, true);
        let d = Index::new(Space::Active, 3, false);

        assert!(a.identical(&b));
        assert!(a.identical(&d));
        assert!(!a.same_spin(&b));
        assert!(a.same_num(&c));
        assert!(!a.identical(&c));
        assert_ne!(a, b);

        assert_eq!(a.to_string(), "x3+");
        assert_eq!(b.with_spins(&spins).to_string(), "x3+₁");
        assert_eq!(c.with_spins(&spins).to_string(), "c3+");
    }
}
