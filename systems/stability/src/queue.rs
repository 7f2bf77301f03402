use std::collections::{BTreeMap, VecDeque};

use barn_defence_core::{EntityId, Priority};

/// Pending recomputations bucketed by priority, FIFO within a bucket.
///
/// An entity occupies at most one slot. Queuing it again at a more urgent
/// tier moves it; queuing at an equal or less urgent tier is ignored.
#[derive(Clone, Debug, Default)]
pub(crate) struct UpdateQueue {
    buckets: [VecDeque<EntityId>; Priority::ALL.len()],
    slots: BTreeMap<EntityId, Priority>,
}

impl UpdateQueue {
    /// Queues `entity`, returning whether its slot changed.
    pub(crate) fn push(&mut self, entity: EntityId, priority: Priority) -> bool {
        match self.slots.get(&entity).copied() {
            Some(current) if !priority.outranks(current) => false,
            Some(current) => {
                self.buckets[current.index()].retain(|queued| *queued != entity);
                self.buckets[priority.index()].push_back(entity);
                let _ = self.slots.insert(entity, priority);
                true
            }
            None => {
                self.buckets[priority.index()].push_back(entity);
                let _ = self.slots.insert(entity, priority);
                true
            }
        }
    }

    /// Dequeues `entity` wherever it sits.
    pub(crate) fn remove(&mut self, entity: EntityId) -> Option<Priority> {
        let priority = self.slots.remove(&entity)?;
        self.buckets[priority.index()].retain(|queued| *queued != entity);
        Some(priority)
    }

    pub(crate) fn priority_of(&self, entity: EntityId) -> Option<Priority> {
        self.slots.get(&entity).copied()
    }

    /// Moves a whole tier out for draining. Slots stay reserved until
    /// [`UpdateQueue::complete`] or [`UpdateQueue::restore`] runs.
    pub(crate) fn take(&mut self, priority: Priority) -> VecDeque<EntityId> {
        std::mem::take(&mut self.buckets[priority.index()])
    }

    /// Puts undrained entities back at the front of their tier.
    pub(crate) fn restore(&mut self, priority: Priority, mut entities: VecDeque<EntityId>) {
        let bucket = &mut self.buckets[priority.index()];
        entities.append(bucket);
        *bucket = entities;
    }

    /// Releases the slot of an entity taken out for draining.
    pub(crate) fn complete(&mut self, entity: EntityId) {
        let _ = self.slots.remove(&entity);
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len_of(&self, priority: Priority) -> usize {
        self.buckets[priority.index()].len()
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.iter_mut().for_each(VecDeque::clear);
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u32) -> EntityId {
        EntityId::new(value)
    }

    #[test]
    fn requeue_only_upgrades() {
        let mut queue = UpdateQueue::default();

        assert!(queue.push(id(1), Priority::Low));
        assert!(!queue.push(id(1), Priority::Background));
        assert!(!queue.push(id(1), Priority::Low));
        assert_eq!(queue.priority_of(id(1)), Some(Priority::Low));

        assert!(queue.push(id(1), Priority::High));
        assert_eq!(queue.priority_of(id(1)), Some(Priority::High));
        assert_eq!(queue.len_of(Priority::Low), 0);
        assert_eq!(queue.len_of(Priority::High), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn restore_keeps_original_order_ahead_of_new_work() {
        let mut queue = UpdateQueue::default();
        for value in 1..=3 {
            let _ = queue.push(id(value), Priority::Normal);
        }

        let mut taken = queue.take(Priority::Normal);
        let _ = taken.pop_front();
        queue.complete(id(1));
        let _ = queue.push(id(4), Priority::Normal);
        queue.restore(Priority::Normal, taken);

        assert_eq!(
            queue.take(Priority::Normal),
            VecDeque::from([id(2), id(3), id(4)])
        );
        assert_eq!(queue.len(), 3);
    }
}
