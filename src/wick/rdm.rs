use ahash::AHashSet;
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::WickError;
use crate::structure::{
    index::Index,
    spin::{SpinId, SpinStore},
};

/// `num`s of annihilation operators that the driving loop has already processed.
pub type DoneSet = AHashSet<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// An operator sequence, the contraction pairs already taken out of it, and a signed prefactor.
///
/// The sequence always has even length. Cloning a term keeps every `num` and every spin
/// handle, so a clone can be matched slot by slot against the term it came from.
pub struct RdmTerm {
    indices: Vec<Index>,
    deltas: Vec<(Index, Index)>,
    fac: f64,
}

impl RdmTerm {
    pub fn new(indices: Vec<Index>) -> Result<Self, WickError> {
        Self::with_factor(indices, 1.0)
    }

    pub fn with_factor(indices: Vec<Index>, fac: f64) -> Result<Self, WickError> {
        let term = RdmTerm {
            indices,
            deltas: Vec::new(),
            fac,
        };
        term.check_parity()?;
        Ok(term)
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    pub fn deltas(&self) -> &[(Index, Index)] {
        &self.deltas
    }

    pub fn fac(&self) -> f64 {
        self.fac
    }

    /// Particle rank of the density matrix this term needs.
    pub fn rank(&self) -> usize {
        self.indices.len() / 2
    }

    fn check_parity(&self) -> Result<(), WickError> {
        if self.indices.len() % 2 == 1 {
            return Err(WickError::OddLength(self.indices.len()));
        }
        Ok(())
    }

    /// Position of the leftmost annihilation operator not yet in `done`.
    fn first_open(&self, done: &DoneSet) -> Option<usize> {
        self.indices
            .iter()
            .position(|i| !i.dagger() && !done.contains(&i.num()))
    }

    /// One Wick step.
    ///
    /// Takes the leftmost unprocessed annihilation operator and returns one branch per
    /// creation operator to its right, with that pair contracted. The operator is then
    /// registered in `done`. Returns no branches when nothing is left to contract.
    pub fn reduce_one(&self, done: &mut DoneSet) -> Result<Vec<RdmTerm>, WickError> {
        self.check_parity()?;
        let Some(p) = self.first_open(done) else {
            return Ok(Vec::new());
        };
        let i = self.indices[p];

        let mut out = Vec::new();
        for j in self.indices[p + 1..].iter().filter(|j| j.dagger()) {
            out.push(self.contract(&i, j)?);
        }
        done.insert(i.num());
        Ok(out)
    }

    fn contract(&self, i: &Index, j: &Index) -> Result<RdmTerm, WickError> {
        let mut tmp = self.clone();

        let matched: Vec<usize> = tmp
            .indices
            .iter()
            .enumerate()
            .filter(|(_, k)| k.same_num(i) || k.same_num(j))
            .map(|(n, _)| n)
            .collect();
        let &[a, b] = matched.as_slice() else {
            return Err(WickError::DeltaMismatch {
                found: matched.len(),
            });
        };

        let (first, second) = (tmp.indices[a], tmp.indices[b]);
        tmp.deltas.push((first, second));

        if (b - a - 1) % 2 == 1 {
            tmp.fac = -tmp.fac;
        }
        if first.same_spin(&second) {
            tmp.fac *= 2.0;
        } else {
            tmp.substitute_spin(j.spin(), i.spin());
        }

        tmp.indices.remove(b);
        tmp.indices.remove(a);
        trace!("contracted {i} with {j}: {tmp}");
        Ok(tmp)
    }

    /// Points every slot holding `from` to `to`.
    fn substitute_spin(&mut self, from: SpinId, to: SpinId) {
        for k in self.indices.iter_mut().filter(|k| k.spin() == from) {
            k.set_spin(to);
        }
    }

    /// Whether the leftmost annihilation operator not in `done` has no creation operator
    /// to its right, so that no further contraction can move it.
    pub fn reduce_done(&self, done: &DoneSet) -> bool {
        match self.first_open(done) {
            Some(p) => !self.indices[p + 1..].iter().any(|j| j.dagger()),
            None => true,
        }
    }

    /// Alternating `p+ p q+ q ...` with each pair on one spin.
    pub fn is_canonical(&self) -> bool {
        self.indices.len() % 2 == 0
            && self
                .indices
                .chunks_exact(2)
                .all(|pair| pair[0].dagger() && !pair[1].dagger() && pair[0].same_spin(&pair[1]))
    }

    /// Moves every annihilation operator next to the creation operator of its spin.
    ///
    /// Each move hops the operator over a block of the sequence and flips the sign when the
    /// block has odd length. Sorting a canonical term does nothing.
    pub fn sort(&mut self) -> Result<(), WickError> {
        self.check_parity()?;
        let mut settled: AHashSet<SpinId> = AHashSet::new();

        while let Some(p) = self
            .indices
            .iter()
            .position(|i| !i.dagger() && !settled.contains(&i.spin()))
        {
            let a = self.indices[p];
            let q = self
                .indices
                .iter()
                .position(|k| k.dagger() && k.same_spin(&a))
                .ok_or(WickError::UnpairedSpin(a.num()))?;

            let op = self.indices.remove(p);
            let (dest, hops) = if q > p { (q, q - p) } else { (q + 1, p - q - 1) };
            self.indices.insert(dest, op);
            if hops % 2 == 1 {
                self.fac = -self.fac;
            }
            settled.insert(a.spin());
        }

        if let Some(pair) = self
            .indices
            .chunks_exact(2)
            .find(|pair| !(pair[0].dagger() && !pair[1].dagger() && pair[0].same_spin(&pair[1])))
        {
            return Err(WickError::UnpairedSpin(pair[0].num()));
        }
        Ok(())
    }

    pub fn with_spins<'a>(&'a self, spins: &'a SpinStore) -> RdmWithSpins<'a> {
        RdmWithSpins { term: self, spins }
    }

    fn write_with(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        index: impl Fn(&Index) -> String,
    ) -> std::fmt::Result {
        let mut parts: Vec<String> = self.indices.iter().map(&index).collect();
        for (a, b) in &self.deltas {
            parts.push(format!("d({a} {b})"));
        }
        write!(f, "{:.1} [{}]", self.fac, parts.join(" "))?;
        if self.is_canonical() {
            write!(f, "*")?;
        }
        Ok(())
    }
}

impl Display for RdmTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_with(f, |i| i.to_string())
    }
}

pub struct RdmWithSpins<'a> {
    term: &'a RdmTerm,
    spins: &'a SpinStore,
}

impl Display for RdmWithSpins<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.term
            .write_with(f, |i| i.with_spins(self.spins).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::space::Space;
    use crate::wick::operator::OperatorString;

    fn term(ops: OperatorString) -> RdmTerm {
        let (indices, _) = ops.into_parts();
        RdmTerm::new(indices).unwrap()
    }

    #[test]
    fn odd_length_is_rejected() {
        let mut ops = OperatorString::new();
        let s = ops.new_spin();
        ops.push(Space::Active, true, s);
        let (indices, _) = ops.into_parts();
        assert_eq!(RdmTerm::new(indices), Err(WickError::OddLength(1)));
    }

    #[test]
    fn duplicate_slot_is_a_delta_mismatch() {
        let mut spins = SpinStore::new();
        let s = spins.fresh();
        let indices = vec![
            Index::with_spin(Space::Active, 0, false, s),
            Index::with_spin(Space::Active, 1, true, s),
            Index::with_spin(Space::Active, 1, true, s),
            Index::with_spin(Space::Active, 2, false, s),
        ];
        let t = RdmTerm::new(indices).unwrap();
        let mut done = DoneSet::new();
        assert_eq!(
            t.reduce_one(&mut done),
            Err(WickError::DeltaMismatch { found: 3 })
        );
    }

    #[test]
    fn adjacent_same_spin_pair() {
        // x0 x1+ on one spin: contraction is adjacent, no sign, multiplicity 2
        let mut ops = OperatorString::new();
        ops.deexcitation(Space::Active, Space::Active);
        let t = term(ops);

        let mut done = DoneSet::new();
        let out = t.reduce_one(&mut done).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].indices().is_empty());
        assert_eq!(out[0].fac(), 2.0);
        assert_eq!(out[0].deltas().len(), 1);
        assert!(done.contains(&0));
        assert!(t.reduce_done(&done));
        assert_eq!(out[0].to_string(), "2.0 [d(x0 x1+)]*");
    }

    #[test]
    fn sign_follows_distance() {
        // x0 x1+ x2+ x3 with x0/x2+ on one spin, x1+/x3 on the other
        let mut spins = SpinStore::new();
        let s0 = spins.fresh();
        let s1 = spins.fresh();
        let t = RdmTerm::new(vec![
            Index::with_spin(Space::Active, 0, false, s0),
            Index::with_spin(Space::Active, 1, true, s1),
            Index::with_spin(Space::Active, 2, true, s0),
            Index::with_spin(Space::Active, 3, false, s1),
        ])
        .unwrap();

        let mut done = DoneSet::new();
        let out = t.reduce_one(&mut done).unwrap();
        assert_eq!(out.len(), 2);

        // adjacent, opposite spins: no sign, no multiplicity, x3 joins x0's spin
        assert_eq!(out[0].fac(), 1.0);
        assert_eq!(out[0].indices()[0].num(), 2);
        assert_eq!(out[0].indices()[1].spin(), s0);
        assert_eq!(out[0].indices()[0].spin(), s0);

        // one operator in between: sign flip, same spin doubles
        assert_eq!(out[1].fac(), -2.0);
        assert_eq!(out[1].indices()[1].spin(), s1);
    }

    #[test]
    fn substitution_reaches_every_slot() {
        // x0(s0) x1+(s1) x2+(s1) x3(s0) x4(s1): contracting x0 with x1+ moves all of s1
        let mut spins = SpinStore::new();
        let s0 = spins.fresh();
        let s1 = spins.fresh();
        let t = RdmTerm::new(vec![
            Index::with_spin(Space::Active, 0, false, s0),
            Index::with_spin(Space::Active, 1, true, s1),
            Index::with_spin(Space::Active, 2, true, s1),
            Index::with_spin(Space::Active, 3, false, s0),
            Index::with_spin(Space::Active, 4, false, s1),
            Index::with_spin(Space::Active, 5, true, s0),
        ])
        .unwrap();
        let mut done = DoneSet::new();
        let out = t.reduce_one(&mut done).unwrap();
        assert!(out[0].indices().iter().all(|i| i.spin() == s0));
        assert_eq!(out[0].indices().len(), 4);
    }

    #[test]
    fn sort_moves_annihilators() {
        let mut spins = SpinStore::new();
        let s0 = spins.fresh();
        let s1 = spins.fresh();
        // x0(s0) x1(s1) x2+(s1) x3+(s0)
        let mut t = RdmTerm::new(vec![
            Index::with_spin(Space::Active, 0, false, s0),
            Index::with_spin(Space::Active, 1, false, s1),
            Index::with_spin(Space::Active, 2, true, s1),
            Index::with_spin(Space::Active, 3, true, s0),
        ])
        .unwrap();
        assert!(!t.is_canonical());
        t.sort().unwrap();
        assert!(t.is_canonical());
        assert_eq!(t.fac(), 1.0);
        let nums: Vec<_> = t.indices().iter().map(|i| i.num()).collect();
        assert_eq!(nums, vec![2, 1, 3, 0]);
        assert_eq!(t.with_spins(&spins).to_string(), "1.0 [x2+₁ x1₁ x3+₀ x0₀]*");

        let once = t.clone();
        t.sort().unwrap();
        assert_eq!(t, once);
    }

    #[test]
    fn sort_backwards_hop() {
        // x0+(s0) x1+(s1) x2(s0) x3(s1): x2 hops back over x1+
        let mut spins = SpinStore::new();
        let s0 = spins.fresh();
        let s1 = spins.fresh();
        let mut t = RdmTerm::new(vec![
            Index::with_spin(Space::Active, 0, true, s0),
            Index::with_spin(Space::Active, 1, true, s1),
            Index::with_spin(Space::Active, 2, false, s0),
            Index::with_spin(Space::Active, 3, false, s1),
        ])
        .unwrap();
        t.sort().unwrap();
        let nums: Vec<_> = t.indices().iter().map(|i| i.num()).collect();
        assert_eq!(nums, vec![0, 2, 1, 3]);
        assert_eq!(t.fac(), -1.0);
    }

    #[test]
    fn sort_rejects_unpaired() {
        let mut spins = SpinStore::new();
        let s0 = spins.fresh();
        let s1 = spins.fresh();
        let mut t = RdmTerm::new(vec![
            Index::with_spin(Space::Active, 0, true, s0),
            Index::with_spin(Space::Active, 1, false, s1),
        ])
        .unwrap();
        assert_eq!(t.sort(), Err(WickError::UnpairedSpin(1)));
    }
}
