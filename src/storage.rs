//! Bounded slot containers (§4.A Storage, §4.B Buffer).
//!
//! Both components share the same shape — a fixed-capacity array of
//! optional items with first-empty-slot insertion and linear-scan lookup —
//! so they're both instances of [`Slots`], distinguished only by role at
//! the call site (`Engine::storage` vs `Engine::buffer`).
use crate::message::DataItem;

/// A fixed-capacity container of [`DataItem`]s. Insertion order is not
/// preserved beyond "first empty slot wins"; lookup is a linear scan,
/// which is fine since capacity is configured in the tens of items.
#[derive(Debug, Clone)]
pub struct Slots {
    slots: Vec<Option<DataItem>>,
}

impl Slots {
    /// Create an empty container with room for `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Place `item` into the first empty slot. Returns `false` without
    /// modifying anything if the container is full.
    pub fn store(&mut self, item: DataItem) -> bool {
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(item);
                true
            }
            None => false,
        }
    }

    /// Look up an item by id.
    pub fn get(&self, id: u64) -> Option<&DataItem> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref())
            .find(|item| item.id == id)
    }

    /// Whether an item with this id is present.
    pub fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    /// Clear the slot holding `id`, if any. Returns whether an item was
    /// removed.
    pub fn remove(&mut self, id: u64) -> bool {
        match self.slots.iter_mut().find(
            |slot| matches!(slot, Some(item) if item.id == id),
        ) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Number of empty slots remaining.
    pub fn free_space(&self) -> u32 {
        self.slots.iter().filter(|slot| slot.is_none()).count() as u32
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every stored item.
    pub fn all(&self) -> impl Iterator<Item = &DataItem> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Drain every stored item out of the container, leaving it empty.
    pub fn drain(&mut self) -> Vec<DataItem> {
        self.slots.iter_mut().filter_map(|slot| slot.take()).collect()
    }
}
