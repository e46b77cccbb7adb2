//! Storage slots holding unplayed pieces.

use serde::{Deserialize, Serialize};
use tictacarm_rules::Side;
use tracing::{debug, instrument, warn};

/// A storage slot, 0-based internally and shown 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(usize);

impl SlotId {
    /// Index into the side's storage poses.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// Per-side record of which storage slots have been emptied.
///
/// Slots are handed out in order and never returned until [`reset`].
///
/// [`reset`]: PieceInventory::reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceInventory {
    side: Side,
    used: Vec<bool>,
}

impl PieceInventory {
    /// Creates an inventory of `slots` full slots.
    pub fn new(side: Side, slots: usize) -> Self {
        Self {
            side,
            used: vec![false; slots],
        }
    }

    /// Side whose pieces are stored here.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    /// Marks the first unused slot as used and returns it.
    #[instrument(skip(self), fields(side = %self.side))]
    pub fn allocate(&mut self) -> Option<SlotId> {
        match self.used.iter().position(|used| !used) {
            Some(index) => {
                self.used[index] = true;
                let slot = SlotId(index);
                debug!(%slot, "Slot allocated");
                Some(slot)
            }
            None => {
                warn!("No more pieces available");
                None
            }
        }
    }

    /// Number of slots not yet used.
    pub fn remaining(&self) -> usize {
        self.used.iter().filter(|used| !**used).count()
    }

    /// True when every slot has been used.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// True when no slot has been used.
    pub fn all_unused(&self) -> bool {
        self.remaining() == self.capacity()
    }

    /// Marks every slot unused.
    pub fn reset(&mut self) {
        self.used.iter_mut().for_each(|used| *used = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_each_slot_once_in_order() {
        let mut inv = PieceInventory::new(Side::Robot, 5);
        let slots: Vec<usize> = std::iter::from_fn(|| inv.allocate()).map(SlotId::index).collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 4]);
        assert!(inv.is_exhausted());
        assert_eq!(inv.allocate(), None);
    }

    #[test]
    fn test_reset_restores_all() {
        let mut inv = PieceInventory::new(Side::Player, 2);
        inv.allocate();
        assert_eq!(inv.remaining(), 1);
        assert!(!inv.all_unused());
        inv.reset();
        assert!(inv.all_unused());
        assert_eq!(inv.allocate().map(|s| s.to_string()), Some("#1".to_string()));
    }

    #[test]
    fn test_empty_inventory() {
        let mut inv = PieceInventory::new(Side::Robot, 0);
        assert!(inv.is_exhausted());
        assert_eq!(inv.allocate(), None);
    }
}
