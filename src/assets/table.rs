use dashmap::DashMap;
use std::sync::Arc;

use crate::assets::slot::AssetSlot;

/// Name keyed registry of [`AssetSlot`]s. Slots are created on first reference, be it a load or
/// somebody waiting for the asset, and are never evicted.
pub struct AssetTable<T> {
    slots: DashMap<String, Arc<AssetSlot<T>>>,
}

impl<T> AssetTable<T> {
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_capacity(100),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<AssetSlot<T>> {
        // Easy path without allocating the key.
        if let Some(slot) = self.slots.get(name) {
            return slot.value().clone();
        }

        // entry() keeps racing creators from ending up with different slots.
        self.slots
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AssetSlot::new()))
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<AssetSlot<T>>> {
        self.slots.get(name).map(|slot| slot.value().clone())
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.slots
            .get(name)
            .is_some_and(|slot| slot.value().is_resolved())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !slot.value().is_resolved())
            .count()
    }
}

impl<T> Default for AssetTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
