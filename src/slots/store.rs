//! Ten-slot content table

use super::content::Content;

/// Number of addressable slots
pub const SLOT_COUNT: usize = 10;

/// Index of a slot, always in `0..SLOT_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u8);

impl SlotIndex {
    /// Create an index, rejecting values outside the slot table
    pub fn new(index: usize) -> Option<Self> {
        (index < SLOT_COUNT).then_some(Self(index as u8))
    }

    /// Map a digit key to its slot in keyboard-row order:
    /// `1` is the first slot and `0` the last.
    pub fn from_digit_key(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self(9)),
            1..=9 => Some(Self(digit - 1)),
            _ => None,
        }
    }

    #[cfg(test)]
    /// All indices in order
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..SLOT_COUNT as u8).map(SlotIndex)
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// One-based label shown to the user
    pub fn label(self) -> usize {
        self.get() + 1
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Ten content slots, created empty and only ever overwritten.
///
/// Owned by the mode controller task, so no locking is needed.
#[derive(Debug, Clone, Default)]
pub struct SlotStore {
    slots: [Content; SLOT_COUNT],
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: SlotIndex) -> &Content {
        &self.slots[index.get()]
    }

    /// Replace the content of a slot
    pub fn set(&mut self, index: SlotIndex, content: Content) {
        self.slots[index.get()] = content;
    }

    /// Copy of all ten slots, for display
    pub fn snapshot(&self) -> [Content; SLOT_COUNT] {
        self.slots.clone()
    }
}
