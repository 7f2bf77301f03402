#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Health, destruction and structural cascades for damageable entities.
//!
//! The system owns health records only. Positions come from the shared
//! [`SpatialIndex`] and structural consequences are delegated to a
//! [`StructureSink`], both handed in per call through a [`DamageContext`].
//! Destroying an entity weakens everything within the cascade radius; the
//! resulting chain is walked with a work queue so it always terminates.

mod collapse;
mod health;

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use barn_defence_core::{DamageConfig, DamageKind, DamageState, EntityId, Event, Position};
use barn_defence_system_spatial_index::SpatialIndex;

pub use collapse::{CollapseAnimation, PendingDestruction};
pub use health::{DamageEntry, HealthRecord};

/// Structure that destroyed entities are detached from.
pub trait StructureSink {
    /// Removes a destroyed entity from the structure.
    ///
    /// Returns the pieces left without a path to the ground. Entities that
    /// are not part of the structure yield an empty list.
    fn detach(&mut self, entity: EntityId) -> Vec<EntityId>;
}

/// Collaborators borrowed by damage operations.
pub struct DamageContext<'a> {
    /// Spatial index holding the positions of damageable entities.
    pub spatial: &'a mut SpatialIndex,
    /// Structure notified of destroyed pieces.
    pub structure: &'a mut dyn StructureSink,
}

/// Result of a hit on a registered entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageOutcome {
    /// Entity that was hit.
    pub entity: EntityId,
    /// Health left after the hit.
    pub health: f32,
    /// Damage band after the hit.
    pub state: DamageState,
    /// Whether the hit destroyed the entity.
    pub destroyed: bool,
}

/// Entity caught in an explosion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExplosionHit {
    /// Entity that was hit.
    pub entity: EntityId,
    /// Planar distance from the blast centre.
    pub distance: f32,
    /// Damage dealt after falloff.
    pub damage: f32,
    /// Effect of the hit on the entity.
    pub outcome: DamageOutcome,
}

/// Applies damage, destroys entities and propagates structural collapse.
#[derive(Clone, Debug)]
pub struct DamageCascade {
    config: DamageConfig,
    elapsed: Duration,
    records: BTreeMap<EntityId, HealthRecord>,
    animations: Vec<CollapseAnimation>,
    pending: Vec<PendingDestruction>,
}

impl DamageCascade {
    /// Creates an empty damage system.
    #[must_use]
    pub fn new(config: &DamageConfig) -> Self {
        Self {
            config: config.clone(),
            elapsed: Duration::ZERO,
            records: BTreeMap::new(),
            animations: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Starts tracking the health of `entity`, resetting any previous record.
    pub fn register(&mut self, entity: EntityId, max_health: f32, has_visual: bool) {
        let _ = self
            .records
            .insert(entity, HealthRecord::new(max_health, has_visual));
    }

    /// Starts tracking `entity` with a partially depleted pool.
    ///
    /// `health` is clamped to `max_health`; a value that is not positive
    /// starts the entity at full health.
    pub fn register_with_health(
        &mut self,
        entity: EntityId,
        max_health: f32,
        health: f32,
        has_visual: bool,
    ) {
        let _ = self.records.insert(
            entity,
            HealthRecord::with_health(max_health, health, has_visual),
        );
    }

    /// Stops tracking `entity` and cancels any collapse scheduled for it.
    pub fn unregister(&mut self, entity: EntityId) -> Option<HealthRecord> {
        self.pending.retain(|pending| pending.entity != entity);
        self.records.remove(&entity)
    }

    /// Health record of `entity`.
    #[must_use]
    pub fn record(&self, entity: EntityId) -> Option<&HealthRecord> {
        self.records.get(&entity)
    }

    /// Simulation time accumulated through [`DamageCascade::update`].
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Collapse animations still playing.
    #[must_use]
    pub fn animations(&self) -> &[CollapseAnimation] {
        &self.animations
    }

    /// Pieces waiting to be destroyed, in scheduling order.
    #[must_use]
    pub fn pending_destructions(&self) -> &[PendingDestruction] {
        &self.pending
    }

    /// Deals `amount` damage to a registered entity.
    ///
    /// Returns `None` when the entity is not registered. A hit that empties
    /// the health pool destroys the entity and cascades into its neighbours.
    pub fn apply_damage(
        &mut self,
        ctx: &mut DamageContext<'_>,
        entity: EntityId,
        amount: f32,
        kind: DamageKind,
        source: Option<EntityId>,
        out: &mut Vec<Event>,
    ) -> Option<DamageOutcome> {
        let outcome = self.hit(entity, amount, kind, source, out)?;
        if outcome.destroyed {
            self.destroy_with_cascade(ctx, entity, kind, source, out);
        }
        Some(outcome)
    }

    /// Damages every registered entity within `radius` of `center`.
    ///
    /// Damage falls off linearly from `base_damage` at the centre to zero at
    /// the rim. Hits are reported in ascending id order.
    pub fn apply_explosive_damage(
        &mut self,
        ctx: &mut DamageContext<'_>,
        center: Position,
        radius: f32,
        base_damage: f32,
        out: &mut Vec<Event>,
    ) -> Vec<ExplosionHit> {
        if radius <= 0.0 {
            return Vec::new();
        }

        let caught = ctx.spatial.query_radius_with_distance(center, radius);
        let mut hits = Vec::with_capacity(caught.len());

        for (entity, distance) in caught {
            let damage = (base_damage * (1.0 - distance / radius)).max(0.0);
            let Some(outcome) =
                self.apply_damage(ctx, entity, damage, DamageKind::Explosive, None, out)
            else {
                continue;
            };
            hits.push(ExplosionHit {
                entity,
                distance,
                damage,
                outcome,
            });
        }

        tracing::debug!(hits = hits.len(), radius, base_damage, "explosion resolved");
        hits
    }

    /// Schedules `entity` for destruction after the collapse delay.
    ///
    /// Returns `false` when it is already scheduled.
    pub fn schedule_collapse(&mut self, entity: EntityId, out: &mut Vec<Event>) -> bool {
        if self.pending.iter().any(|pending| pending.entity == entity) {
            return false;
        }
        let delay = self.config.collapse_delay();
        self.pending.push(PendingDestruction {
            entity,
            due_at: self.elapsed + delay,
        });
        out.push(Event::CollapseScheduled { entity, delay });
        true
    }

    /// Advances simulation time by `dt`.
    ///
    /// Animations whose elapsed time reaches or exceeds their duration emit
    /// [`Event::CollapseCompleted`] and are dropped;
    /// pending destructions that fell due are carried out.
    pub fn update(&mut self, ctx: &mut DamageContext<'_>, dt: Duration, out: &mut Vec<Event>) {
        self.elapsed += dt;
        let now = self.elapsed;

        self.animations.retain(|animation| {
            let finished = animation.is_finished(now);
            if finished {
                out.push(Event::CollapseCompleted {
                    entity: animation.entity,
                });
            }
            !finished
        });

        let (due, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|pending| pending.due_at <= now);
        self.pending = waiting;

        for pending in due {
            let entity = pending.entity;
            if !self.records.contains_key(&entity) && !ctx.spatial.contains(entity) {
                continue;
            }
            if let Some(record) = self.records.get_mut(&entity) {
                record.take_hit(record.health, DamageKind::Structural, None, now);
            }
            self.destroy_with_cascade(ctx, entity, DamageKind::Structural, None, out);
        }
    }

    /// Applies a hit to the health pool without triggering destruction.
    ///
    /// Entities already at zero health are ignored so a chain never destroys
    /// the same entity twice.
    fn hit(
        &mut self,
        entity: EntityId,
        amount: f32,
        kind: DamageKind,
        source: Option<EntityId>,
        out: &mut Vec<Event>,
    ) -> Option<DamageOutcome> {
        let record = self.records.get_mut(&entity)?;
        if record.is_destroyed() {
            return None;
        }

        let amount = amount.max(0.0);
        record.take_hit(amount, kind, source, self.elapsed);
        let outcome = DamageOutcome {
            entity,
            health: record.health,
            state: record.state,
            destroyed: record.is_destroyed(),
        };

        if !outcome.destroyed {
            out.push(Event::EntityDamaged {
                entity,
                amount,
                kind,
                health: outcome.health,
                state: outcome.state,
            });
        }
        Some(outcome)
    }

    fn destroy_with_cascade(
        &mut self,
        ctx: &mut DamageContext<'_>,
        entity: EntityId,
        kind: DamageKind,
        source: Option<EntityId>,
        out: &mut Vec<Event>,
    ) {
        let mut work = VecDeque::from([(entity, kind, source)]);

        while let Some((entity, kind, source)) = work.pop_front() {
            let Some(position) = self.destroy(ctx, entity, kind, source, out) else {
                continue;
            };

            for neighbour in ctx.spatial.query_radius(position, self.config.cascade_radius) {
                let Some(max_health) = self.records.get(&neighbour).map(|r| r.max_health) else {
                    continue;
                };
                let amount = max_health * self.config.cascade_damage_fraction;
                let outcome = self.hit(neighbour, amount, DamageKind::Structural, Some(entity), out);
                if outcome.is_some_and(|outcome| outcome.destroyed) {
                    work.push_back((neighbour, DamageKind::Structural, Some(entity)));
                }
            }
        }
    }

    /// Removes a destroyed entity everywhere and returns its last position.
    fn destroy(
        &mut self,
        ctx: &mut DamageContext<'_>,
        entity: EntityId,
        kind: DamageKind,
        source: Option<EntityId>,
        out: &mut Vec<Event>,
    ) -> Option<Position> {
        let record = self.unregister(entity);
        let position = ctx.spatial.position_of(entity);
        let _ = ctx.spatial.remove(entity);
        let detached = ctx.structure.detach(entity);

        out.push(Event::EntityDestroyed {
            entity,
            kind,
            source,
        });
        if record.as_ref().is_some_and(|record| record.has_visual) {
            self.animations.push(CollapseAnimation {
                entity,
                started_at: self.elapsed,
                duration: self.config.collapse_duration(),
            });
            out.push(Event::CollapseStarted { entity });
        }
        for piece in &detached {
            let _ = self.schedule_collapse(*piece, out);
        }

        tracing::debug!(%entity, ?kind, detached = detached.len(), "entity destroyed");
        position
    }
}
