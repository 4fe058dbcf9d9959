use ahash::AHashSet;
use log::{debug, trace};
use std::mem;

use super::{ContractionId, Forest, TreeId};
use crate::structure::tensor::Tensor;

impl Forest {
    /// Merges sibling contractions that compute into the same slot, then merges the subtrees
    /// of every contraction, recursively.
    pub fn factorize(&self) -> Forest {
        let mut out = self.clone();
        out.factorize_tree(out.root());
        debug!(
            "{}: factorized {} -> {} contractions",
            self.label(),
            self.contraction_count(),
            out.contraction_count()
        );
        out
    }

    /// Replaces every single operand subtree by a direct source operand.
    pub fn move_up_operator(&self) -> Forest {
        let mut out = self.clone();
        for b in out.trees[out.root()].bcs.clone() {
            out.move_up_contraction(b);
        }
        out
    }

    /// Points every node at its parent.
    pub fn set_parent(&self) -> Forest {
        let mut out = self.clone();
        out.link_tree(out.root(), None);
        out
    }

    /// Makes all subtrees of a contraction write into the target of the first one.
    pub fn set_target_rec(&self) -> Forest {
        let mut out = self.clone();
        for b in out.trees[out.root()].bcs.clone() {
            out.propagate_target(b);
        }
        out
    }

    fn factorize_tree(&mut self, id: TreeId) {
        let bcs = self.trees[id].bcs.clone();
        let mut merged: AHashSet<ContractionId> = AHashSet::new();

        for (n, &i) in bcs.iter().enumerate() {
            if merged.contains(&i) {
                continue;
            }
            for &j in &bcs[n + 1..] {
                let (a, b) = (&self.contractions[i], &self.contractions[j]);
                if merged.contains(&j)
                    || a.source.is_some()
                    || b.source.is_some()
                    || !a.same_slot(b)
                {
                    continue;
                }
                trace!("merging contraction with {}{}", b.tensor, b.target_index_str());
                let moved = mem::take(&mut self.contractions[j].subtrees);
                self.contractions[i].subtrees.extend(moved);
                merged.insert(j);
            }
        }

        self.trees[id].bcs.retain(|b| !merged.contains(b));
        for j in merged {
            self.contractions.remove(j);
        }
        for b in self.trees[id].bcs.clone() {
            self.factorize_contraction(b);
        }
    }

    fn factorize_contraction(&mut self, id: ContractionId) {
        let subtrees = self.contractions[id].subtrees.clone();
        let mut merged: AHashSet<TreeId> = AHashSet::new();

        for (n, &i) in subtrees.iter().enumerate() {
            if merged.contains(&i) {
                continue;
            }
            for &j in &subtrees[n + 1..] {
                if !merged.contains(&j) && self.merge_trees(i, j) {
                    merged.insert(j);
                }
            }
        }

        self.contractions[id].subtrees.retain(|t| !merged.contains(t));
        for j in merged {
            self.trees.remove(j);
        }
        for t in self.contractions[id].subtrees.clone() {
            self.factorize_tree(t);
        }
    }

    /// Moves the contents of `other` into `into` if their leading contraction tensors agree
    /// (or `into` has none), or if `other` only sums operands.
    fn merge_trees(&mut self, into: TreeId, other: TreeId) -> bool {
        let (a, o) = (&self.trees[into], &self.trees[other]);
        if !o.bcs.is_empty() {
            let joinable = match (a.bcs.first(), o.bcs.first()) {
                (None, _) => true,
                (Some(&x), Some(&y)) => self.contractions[x].tensor == self.contractions[y].tensor,
                _ => false,
            };
            if !joinable {
                return false;
            }
            let bcs = mem::take(&mut self.trees[other].bcs);
            let ops = mem::take(&mut self.trees[other].ops);
            let target: Option<Tensor> = self.trees[into].target.clone();
            self.trees[into].bcs.extend(bcs);
            self.trees[into].ops.extend(ops);
            for b in self.trees[into].bcs.clone() {
                self.contractions[b].target = target.clone();
            }
            true
        } else if !o.ops.is_empty() {
            let ops = mem::take(&mut self.trees[other].ops);
            self.trees[into].ops.extend(ops);
            true
        } else {
            false
        }
    }

    fn move_up_contraction(&mut self, id: ContractionId) {
        let subtrees = &self.contractions[id].subtrees;
        if subtrees.len() == 1 && self.trees[subtrees[0]].can_move_up() {
            let t = subtrees[0];
            if let Some(mut node) = self.trees.remove(t) {
                self.contractions[id].source = node.ops.pop();
                self.contractions[id].subtrees.clear();
            }
        }

        for t in self.contractions[id].subtrees.clone() {
            for b in self.trees[t].bcs.clone() {
                self.move_up_contraction(b);
            }
        }
    }

    fn link_tree(&mut self, id: TreeId, parent: Option<ContractionId>) {
        self.trees[id].parent = parent;
        for b in self.trees[id].bcs.clone() {
            self.contractions[b].parent = Some(id);
            for t in self.contractions[b].subtrees.clone() {
                self.link_tree(t, Some(b));
            }
        }
    }

    fn propagate_target(&mut self, id: ContractionId) {
        let subtrees = self.contractions[id].subtrees.clone();
        let Some((&first, rest)) = subtrees.split_first() else {
            return;
        };
        let target = self.trees[first].target.clone();
        for &t in rest {
            self.set_tree_target(t, target.clone());
        }
        for &t in &subtrees {
            for b in self.trees[t].bcs.clone() {
                self.propagate_target(b);
            }
        }
    }

    fn set_tree_target(&mut self, id: TreeId, target: Option<Tensor>) {
        for b in self.trees[id].bcs.clone() {
            self.contractions[b].target = target.clone();
        }
        self.trees[id].target = target;
    }
}
