use std::{collections::BTreeMap, time::Duration};

use barn_defence_core::EntityId;

/// Bounded stability cache with age-based expiry.
///
/// Every store takes a fresh sequence number; the smallest live sequence
/// marks the least recently computed entry, which is evicted first when the
/// cache grows past its capacity.
#[derive(Clone, Debug)]
pub(crate) struct StabilityCache {
    entries: BTreeMap<EntityId, Entry>,
    order: BTreeMap<u64, EntityId>,
    next_sequence: u64,
    capacity: usize,
    max_age: Duration,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    value: f32,
    computed_at: Duration,
    sequence: u64,
}

impl StabilityCache {
    pub(crate) fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            order: BTreeMap::new(),
            next_sequence: 0,
            capacity,
            max_age,
        }
    }

    /// Fresh value for `entity`, or `None` when absent or expired.
    pub(crate) fn get(&self, entity: EntityId, now: Duration) -> Option<f32> {
        self.entries
            .get(&entity)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| entry.value)
    }

    /// Stores a value and evicts the oldest entries beyond capacity.
    ///
    /// Returns the number of evicted entries.
    pub(crate) fn store(&mut self, entity: EntityId, value: f32, now: Duration) -> usize {
        let _ = self.invalidate(entity);

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let _ = self.entries.insert(
            entity,
            Entry {
                value,
                computed_at: now,
                sequence,
            },
        );
        let _ = self.order.insert(sequence, entity);

        self.enforce_capacity()
    }

    /// Drops the entry for `entity`, returning whether one existed.
    pub(crate) fn invalidate(&mut self, entity: EntityId) -> bool {
        match self.entries.remove(&entity) {
            Some(entry) => {
                let _ = self.order.remove(&entry.sequence);
                true
            }
            None => false,
        }
    }

    /// Drops expired entries, then trims to capacity.
    pub(crate) fn evict_stale(&mut self, now: Duration) -> usize {
        let expired: Vec<EntityId> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(entity, _)| *entity)
            .collect();

        let mut evicted = 0;
        for entity in expired {
            if self.invalidate(entity) {
                evicted += 1;
            }
        }
        evicted + self.enforce_capacity()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn is_expired(&self, entry: &Entry, now: Duration) -> bool {
        now.saturating_sub(entry.computed_at) >= self.max_age
    }

    fn enforce_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let Some((_, entity)) = self.order.pop_first() else {
                break;
            };
            let _ = self.entries.remove(&entity);
            evicted += 1;
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u32) -> EntityId {
        EntityId::new(value)
    }

    #[test]
    fn entries_expire_at_max_age() {
        let mut cache = StabilityCache::new(10, Duration::from_millis(100));
        let _ = cache.store(id(1), 1.0, Duration::ZERO);

        assert_eq!(cache.get(id(1), Duration::from_millis(99)), Some(1.0));
        assert_eq!(cache.get(id(1), Duration::from_millis(100)), None);
    }

    #[test]
    fn capacity_evicts_least_recently_computed() {
        let mut cache = StabilityCache::new(2, Duration::from_secs(60));
        let _ = cache.store(id(1), 1.0, Duration::ZERO);
        let _ = cache.store(id(2), 0.0, Duration::ZERO);
        let _ = cache.store(id(1), 0.5, Duration::ZERO);

        let evicted = cache.store(id(3), 1.0, Duration::ZERO);

        assert_eq!(evicted, 1);
        assert_eq!(cache.get(id(2), Duration::ZERO), None, "entry 2 was computed longest ago");
        assert_eq!(cache.get(id(1), Duration::ZERO), Some(0.5));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn stale_eviction_counts_removed_entries() {
        let mut cache = StabilityCache::new(10, Duration::from_millis(100));
        let _ = cache.store(id(1), 1.0, Duration::ZERO);
        let _ = cache.store(id(2), 1.0, Duration::from_millis(120));

        assert_eq!(cache.evict_stale(Duration::from_millis(150)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.order.len(), 1);
    }
}
