use std::{collections::VecDeque, time::Duration};

use barn_defence_core::{Clock, EntityId, Priority, StabilityConfig, SystemClock};
use barn_defence_system_structural_validator::StructuralValidator;

use crate::{cache::StabilityCache, queue::UpdateQueue};

/// Caching, priority-scheduled front end to the structural validator.
#[derive(Debug)]
pub struct StabilityOptimizer<C = SystemClock> {
    validator: StructuralValidator,
    clock: C,
    cache: StabilityCache,
    queue: UpdateQueue,
    counters: Counters,
    frame_count: u64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    cache_hits: u64,
    cache_misses: u64,
    recalculations: u64,
    batches_processed: u64,
    total_process_time: Duration,
}

/// Outcome of a single budgeted queue drain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessReport {
    /// Number of pieces recomputed.
    pub processed: usize,
    /// Number of pieces still queued after the drain.
    pub remaining: usize,
    /// Time spent draining.
    pub elapsed: Duration,
    /// Frame counter after the drain.
    pub frame: u64,
}

/// Diagnostic counters of a [`StabilityOptimizer`].
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizerStats {
    /// Lookups answered from the cache.
    pub cache_hits: u64,
    /// Lookups that required a recomputation.
    pub cache_misses: u64,
    /// Hit ratio formatted as a percentage with two decimals, e.g. `"75.00%"`.
    pub hit_rate: String,
    /// Number of stored cache entries, including expired ones not yet evicted.
    pub cache_size: usize,
    /// Queued pieces per tier, indexed by [`Priority::index`].
    pub pending: [usize; Priority::ALL.len()],
    /// Queued pieces across every tier.
    pub pending_total: usize,
    /// Stability values computed through the validator.
    pub recalculations: u64,
    /// Drains that recomputed at least one piece.
    pub batches_processed: u64,
    /// Accumulated time spent draining the queue.
    pub total_process_time: Duration,
    /// Number of drains performed.
    pub frame_count: u64,
}

impl StabilityOptimizer<SystemClock> {
    /// Creates an optimizer timed by the wall clock.
    #[must_use]
    pub fn new(validator: StructuralValidator, config: &StabilityConfig) -> Self {
        Self::with_clock(validator, config, SystemClock::new())
    }
}

impl<C: Clock> StabilityOptimizer<C> {
    /// Creates an optimizer timed by the provided clock.
    #[must_use]
    pub fn with_clock(validator: StructuralValidator, config: &StabilityConfig, clock: C) -> Self {
        Self {
            validator,
            clock,
            cache: StabilityCache::new(config.max_cache_size, config.max_cache_age()),
            queue: UpdateQueue::default(),
            counters: Counters::default(),
            frame_count: 0,
        }
    }

    /// Stability of `piece`, served from the cache while the entry is fresh.
    pub fn stability(&mut self, piece: EntityId) -> f32 {
        if let Some(value) = self.cache.get(piece, self.clock.now()) {
            self.counters.cache_hits += 1;
            return value;
        }
        self.counters.cache_misses += 1;
        self.recompute(piece)
    }

    /// Invalidates the cached value of `piece` and schedules a recomputation.
    pub fn queue_update(&mut self, piece: EntityId, priority: Priority) {
        let _ = self.cache.invalidate(piece);
        let _ = self.queue.push(piece, priority);
    }

    /// Schedules every piece in `pieces` at the same priority.
    pub fn queue_bulk_update(&mut self, pieces: impl IntoIterator<Item = EntityId>, priority: Priority) {
        for piece in pieces {
            self.queue_update(piece, priority);
        }
    }

    /// Recomputes `piece` right away, dropping any pending request for it.
    pub fn update_immediate(&mut self, piece: EntityId) -> f32 {
        let _ = self.queue.remove(piece);
        self.recompute(piece)
    }

    /// Drains queued work within `budget`.
    ///
    /// Tiers are drained from most to least urgent. Immediate work always
    /// runs; any other tier stops as soon as the elapsed time reaches the
    /// budget, leaving the rest queued for the next frame.
    pub fn process_updates(&mut self, budget: Duration) -> ProcessReport {
        self.process_updates_where(budget, |_| true)
    }

    /// Drains queued work within `budget`, skipping pieces rejected by `filter`.
    ///
    /// Immediate work bypasses the filter as well as the budget. Skipped
    /// pieces stay queued in their original order.
    pub fn process_updates_where<F>(&mut self, budget: Duration, mut filter: F) -> ProcessReport
    where
        F: FnMut(EntityId) -> bool,
    {
        let start = self.clock.now();
        let mut processed = 0;
        let mut exhausted = false;

        for priority in Priority::ALL {
            if exhausted {
                break;
            }

            let mut pending = self.queue.take(priority);
            let mut deferred = VecDeque::with_capacity(pending.len());

            while let Some(piece) = pending.pop_front() {
                if priority != Priority::Immediate && !filter(piece) {
                    deferred.push_back(piece);
                    continue;
                }
                if priority != Priority::Immediate
                    && self.clock.now().saturating_sub(start) >= budget
                {
                    deferred.push_back(piece);
                    deferred.append(&mut pending);
                    exhausted = true;
                    break;
                }

                self.queue.complete(piece);
                let _ = self.recompute(piece);
                processed += 1;
            }

            self.queue.restore(priority, deferred);
        }

        let elapsed = self.clock.now().saturating_sub(start);
        self.frame_count += 1;
        self.counters.total_process_time += elapsed;
        if processed > 0 {
            self.counters.batches_processed += 1;
        }

        let report = ProcessReport {
            processed,
            remaining: self.queue.len(),
            elapsed,
            frame: self.frame_count,
        };
        if report.remaining > 0 {
            tracing::trace!(?report, "stability queue drained partially");
        }
        report
    }

    /// Drops the cached value of `piece`.
    pub fn invalidate_cache(&mut self, piece: EntityId) {
        let _ = self.cache.invalidate(piece);
    }

    /// Schedules a freshly placed piece for recomputation this frame.
    pub fn on_piece_placed(&mut self, piece: EntityId) {
        self.queue_update(piece, Priority::Immediate);
    }

    /// Forgets a destroyed piece and reports the pieces it held up alone.
    ///
    /// The validator is not modified; callers remove the piece from it once
    /// they have acted on the returned set.
    pub fn on_piece_destroyed(&mut self, piece: EntityId) -> Vec<EntityId> {
        let _ = self.cache.invalidate(piece);
        let _ = self.queue.remove(piece);
        self.validator.find_disconnected_after_removal(piece)
    }

    /// Recomputes `pieces` from the lowest elevation upward.
    ///
    /// Returns the computed values in processing order.
    pub fn precompute_region(
        &mut self,
        pieces: impl IntoIterator<Item = EntityId>,
    ) -> Vec<(EntityId, f32)> {
        let mut ordered: Vec<(f32, EntityId)> = pieces
            .into_iter()
            .map(|piece| (self.validator.elevation(piece), piece))
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        ordered
            .into_iter()
            .map(|(_, piece)| (piece, self.recompute(piece)))
            .collect()
    }

    /// Evicts expired entries, then the least recently computed ones until
    /// the cache fits its capacity. Returns the number of evicted entries.
    pub fn evict_stale_entries(&mut self) -> usize {
        let evicted = self.cache.evict_stale(self.clock.now());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.cache.len(), "stability cache evicted");
        }
        evicted
    }

    /// Snapshot of the optimizer counters.
    #[must_use]
    pub fn stats(&self) -> OptimizerStats {
        let Counters {
            cache_hits,
            cache_misses,
            recalculations,
            batches_processed,
            total_process_time,
        } = self.counters;

        let lookups = cache_hits + cache_misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            cache_hits as f64 / lookups as f64 * 100.0
        };

        OptimizerStats {
            cache_hits,
            cache_misses,
            hit_rate: format!("{hit_rate:.2}%"),
            cache_size: self.cache.len(),
            pending: Priority::ALL.map(|priority| self.queue.len_of(priority)),
            pending_total: self.queue.len(),
            recalculations,
            batches_processed,
            total_process_time,
            frame_count: self.frame_count,
        }
    }

    /// Reports whether a fresh value for `piece` is cached.
    #[must_use]
    pub fn is_cached(&self, piece: EntityId) -> bool {
        self.cache.get(piece, self.clock.now()).is_some()
    }

    /// Reports whether `piece` awaits recomputation.
    #[must_use]
    pub fn is_pending(&self, piece: EntityId) -> bool {
        self.queue.priority_of(piece).is_some()
    }

    /// Tier `piece` is queued at, if any.
    #[must_use]
    pub fn pending_priority(&self, piece: EntityId) -> Option<Priority> {
        self.queue.priority_of(piece)
    }

    /// Number of queued pieces across every tier.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of drains performed so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Validator the optimizer computes stability with.
    #[must_use]
    pub fn validator(&self) -> &StructuralValidator {
        &self.validator
    }

    /// Mutable access to the validator.
    ///
    /// Graph changes made here are not tracked; queue the affected pieces.
    pub fn validator_mut(&mut self) -> &mut StructuralValidator {
        &mut self.validator
    }

    /// Clock the optimizer measures ages and budgets with.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Drops every cached value and pending request.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.queue.clear();
    }

    fn recompute(&mut self, piece: EntityId) -> f32 {
        let value = self.validator.stability(piece);
        self.counters.recalculations += 1;
        let _ = self.cache.store(piece, value, self.clock.now());
        tracing::trace!(%piece, value, "stability recomputed");
        value
    }
}
