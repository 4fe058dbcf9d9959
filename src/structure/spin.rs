use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use std::fmt::Display;

use crate::utils::to_subscript;

new_key_type! {
    /// Handle to a [`Spin`] in a [`SpinStore`].
    ///
    /// Two indices carry the same summed spin variable iff they hold the same handle.
    /// The null key is used for tensor slots, which carry no spin.
    pub struct SpinId;
}

/// A spin marker. The numeric tag is for display only, identity lives in the [`SpinId`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Spin {
    pub tag: usize,
}

impl Display for Spin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", to_subscript(self.tag as isize))
    }
}

/// Arena owning every [`Spin`] created for one operator string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpinStore {
    spins: SlotMap<SpinId, Spin>,
}

impl SpinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a spin with the next free tag.
    pub fn fresh(&mut self) -> SpinId {
        let tag = self.spins.len();
        self.spins.insert(Spin { tag })
    }

    /// Allocates a new spin identity that displays like `like`.
    pub fn fresh_like(&mut self, like: SpinId) -> Option<SpinId> {
        let tag = self.spins.get(like)?.tag;
        Some(self.spins.insert(Spin { tag }))
    }

    pub fn get(&self, id: SpinId) -> Option<&Spin> {
        self.spins.get(id)
    }

    pub fn tag(&self, id: SpinId) -> Option<usize> {
        self.spins.get(id).map(|s| s.tag)
    }

    pub fn len(&self) -> usize {
        self.spins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spins.is_empty()
    }
}
