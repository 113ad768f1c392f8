use std::collections::HashSet;

use crate::slot::{Slot, SlotKey};

/// Slots already reported during this process run.
///
/// Keys are only ever added. A slot that disappears and comes back is not
/// reported again; a restart starts from an empty set.
#[derive(Debug, Default)]
pub struct SeenSlots {
    keys: HashSet<SlotKey>,
}

impl SeenSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the slot and report whether this is the first time it was seen.
    pub fn mark_if_new(&mut self, slot: &Slot) -> bool {
        self.keys.insert(slot.key())
    }

    pub fn contains(&self, slot: &Slot) -> bool {
        self.keys.contains(&slot.key())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
