use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

use super::{
    operator::OperatorString,
    rdm::{DoneSet, RdmTerm},
    WickError,
};
use crate::structure::spin::SpinStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
/// The canonical terminal terms of one operator string.
pub struct Active {
    spins: SpinStore,
    terms: Vec<RdmTerm>,
    passes: usize,
}

impl Active {
    pub fn new(ops: OperatorString) -> Result<Self, WickError> {
        let (indices, spins) = ops.into_parts();
        Self::from_term(RdmTerm::new(indices)?, spins)
    }

    /// Reduces `term` and brings every terminal term into canonical order.
    pub fn from_term(term: RdmTerm, spins: SpinStore) -> Result<Self, WickError> {
        let (mut terms, passes) = Self::reduce(term)?;
        for t in terms.iter_mut() {
            t.sort()?;
        }
        debug!("{} terminal terms after {passes} passes", terms.len());
        Ok(Active {
            spins,
            terms,
            passes,
        })
    }

    /// Breadth-first driving loop over `(term, done)` pairs.
    ///
    /// Every queued term contributes its contracted branches and itself, with the processed
    /// operator registered in its done set. Terms that cannot be contracted further are
    /// accepted, the rest are queued for the next pass. Returns the accepted terms and the
    /// number of passes.
    pub fn reduce(term: RdmTerm) -> Result<(Vec<RdmTerm>, usize), WickError> {
        let mut accepted = Vec::new();
        if term.reduce_done(&DoneSet::new()) {
            accepted.push(term);
            return Ok((accepted, 0));
        }

        let mut queue = vec![(term, DoneSet::new())];
        let mut passes = 0;
        while !queue.is_empty() {
            passes += 1;
            let mut next = Vec::new();
            for (tmp, mut done) in queue {
                let mut out = tmp.reduce_one(&mut done)?;
                out.push(tmp);
                for t in out {
                    if t.reduce_done(&done) {
                        accepted.push(t);
                    } else {
                        next.push((t, done.clone()));
                    }
                }
            }
            trace!(
                "pass {passes}: {} accepted, {} queued",
                accepted.len(),
                next.len()
            );
            queue = next;
        }
        Ok((accepted, passes))
    }

    pub fn terms(&self) -> &[RdmTerm] {
        &self.terms
    }

    pub fn into_terms(self) -> Vec<RdmTerm> {
        self.terms
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn spins(&self) -> &SpinStore {
        &self.spins
    }

    /// Density matrices referenced by the terms, `rdm0` for fully contracted ones.
    pub fn required_rdm(&self) -> Vec<String> {
        self.terms
            .iter()
            .map(|t| t.rank())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|r| format!("rdm{r}"))
            .collect()
    }
}

impl Display for Active {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<String> = self
            .terms
            .iter()
            .map(|t| t.with_spins(&self.spins).to_string())
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}
