#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for Barn Defence.
//!
//! The world owns one instance of every simulation system and is mutated
//! exclusively through [`apply`]. Adapters observe it through the emitted
//! [`Event`]s and the read-only [`query`] functions.

use barn_defence_core::{
    Clock, Command, EngineConfig, EntityId, Event, Piece, Position, Priority, SystemClock,
};
use barn_defence_system_damage_cascade::{DamageCascade, DamageContext, StructureSink};
use barn_defence_system_spatial_index::SpatialIndex;
use barn_defence_system_stability::{StabilityOptimizer, ZonedStabilityOptimizer};
use barn_defence_system_structural_validator::StructuralValidator;

/// Represents the authoritative Barn Defence world state.
#[derive(Debug)]
pub struct World<C = SystemClock> {
    config: EngineConfig,
    spatial: SpatialIndex,
    stability: ZonedStabilityOptimizer<C>,
    damage: DamageCascade,
    tick_index: u64,
}

impl World<SystemClock> {
    /// Creates an empty world whose budgets are measured by the wall clock.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> World<C> {
    /// Creates an empty world timed by the provided clock.
    #[must_use]
    pub fn with_clock(config: EngineConfig, clock: C) -> Self {
        let validator = StructuralValidator::new(config.placement.clone());
        let optimizer = StabilityOptimizer::with_clock(validator, &config.stability, clock);
        Self {
            spatial: SpatialIndex::with_config(&config.spatial),
            stability: ZonedStabilityOptimizer::new(optimizer, &config.zones),
            damage: DamageCascade::new(&config.damage),
            tick_index: 0,
            config,
        }
    }

    /// Stability of `piece`, served from the optimizer cache when fresh.
    pub fn stability(&mut self, piece: EntityId) -> f32 {
        self.stability.optimizer_mut().stability(piece)
    }

    fn place_piece(&mut self, piece: Piece, out_events: &mut Vec<Event>) {
        let validator = self.stability.optimizer().validator();
        let moving = validator.piece(piece.id).is_some();
        let precheck = validator.validate_placement(&piece);
        if !precheck.ok {
            out_events.push(Event::PlacementRejected {
                piece: piece.id,
                reasons: precheck.reasons,
            });
            return;
        }

        if moving {
            let detached = detach_piece(&mut self.stability, piece.id);
            self.report_detached(piece.id, detached, out_events);
        }

        let verdict = self
            .stability
            .optimizer_mut()
            .validator_mut()
            .place_piece(piece);
        let position = match piece.position {
            Some(position) if verdict.ok => position,
            _ => {
                out_events.push(Event::PlacementRejected {
                    piece: piece.id,
                    reasons: verdict.reasons,
                });
                return;
            }
        };

        let cell = self.spatial.update(piece.id, position);
        self.stability.on_piece_placed(piece.id, position);
        if self.damage.record(piece.id).is_none() {
            self.damage
                .register_with_health(piece.id, piece.kind.max_health(), piece.health, true);
        }
        out_events.push(Event::PiecePlaced {
            piece: piece.id,
            cell,
            stability: verdict.stability,
        });
    }

    /// Reports a piece leaving the structure and dooms what it held up.
    fn report_detached(
        &mut self,
        piece: EntityId,
        detached: Vec<EntityId>,
        out_events: &mut Vec<Event>,
    ) {
        out_events.push(Event::PieceRemoved {
            piece,
            detached: detached.clone(),
        });
        for doomed in detached {
            let _ = self.damage.schedule_collapse(doomed, out_events);
        }
    }

    fn remove_piece(&mut self, piece: EntityId, out_events: &mut Vec<Event>) {
        if self.stability.optimizer().validator().piece(piece).is_none() {
            return;
        }

        let detached = detach_piece(&mut self.stability, piece);
        let _ = self.spatial.remove(piece);
        let _ = self.damage.unregister(piece);
        self.report_detached(piece, detached, out_events);
    }

    fn track_entity(&mut self, entity: EntityId, position: Position, max_health: f32) {
        let _ = self.spatial.update(entity, position);
        if max_health > 0.0 {
            self.damage.register(entity, max_health, false);
        }
    }

    fn forget_entity(&mut self, entity: EntityId, out_events: &mut Vec<Event>) {
        if self.stability.optimizer().validator().piece(entity).is_some() {
            self.remove_piece(entity, out_events);
            return;
        }
        let _ = self.spatial.remove(entity);
        let _ = self.damage.unregister(entity);
    }
}

/// Bridges destroyed pieces from the damage system into the structure.
struct Structure<'a, C> {
    stability: &'a mut ZonedStabilityOptimizer<C>,
}

impl<C: Clock> StructureSink for Structure<'_, C> {
    fn detach(&mut self, entity: EntityId) -> Vec<EntityId> {
        if self.stability.optimizer().validator().piece(entity).is_none() {
            return Vec::new();
        }
        detach_piece(&mut *self.stability, entity)
    }
}

/// Removes a piece from the structure and queues the pieces it stranded.
fn detach_piece<C: Clock>(
    stability: &mut ZonedStabilityOptimizer<C>,
    piece: EntityId,
) -> Vec<EntityId> {
    let detached = stability.on_piece_destroyed(piece);
    let optimizer = stability.optimizer_mut();
    let _ = optimizer.validator_mut().discard_piece(piece);
    optimizer.queue_bulk_update(detached.iter().copied(), Priority::High);
    detached
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply<C: Clock>(world: &mut World<C>, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::PlacePiece { piece } => world.place_piece(piece, out_events),
        Command::RemovePiece { piece } => world.remove_piece(piece, out_events),
        Command::TrackEntity {
            entity,
            position,
            max_health,
        } => world.track_entity(entity, position, max_health),
        Command::MoveEntity { entity, position } => {
            if world.spatial.contains(entity) {
                let _ = world.spatial.update(entity, position);
            }
        }
        Command::ForgetEntity { entity } => world.forget_entity(entity, out_events),
        Command::ApplyDamage {
            entity,
            amount,
            kind,
            source,
        } => {
            let mut structure = Structure {
                stability: &mut world.stability,
            };
            let mut ctx = DamageContext {
                spatial: &mut world.spatial,
                structure: &mut structure,
            };
            let _ = world
                .damage
                .apply_damage(&mut ctx, entity, amount, kind, source, out_events);
        }
        Command::Explode {
            center,
            radius,
            base_damage,
        } => {
            let mut structure = Structure {
                stability: &mut world.stability,
            };
            let mut ctx = DamageContext {
                spatial: &mut world.spatial,
                structure: &mut structure,
            };
            let _ = world.damage.apply_explosive_damage(
                &mut ctx,
                center,
                radius,
                base_damage,
                out_events,
            );
        }
        Command::SetPlayerPosition { position } => world.stability.set_player_position(position),
        Command::Tick { dt, budget } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });

            let mut structure = Structure {
                stability: &mut world.stability,
            };
            let mut ctx = DamageContext {
                spatial: &mut world.spatial,
                structure: &mut structure,
            };
            world.damage.update(&mut ctx, dt, out_events);

            let report = world.stability.process_active_updates(budget);
            let _ = world.stability.optimizer_mut().evict_stale_entries();
            out_events.push(Event::StabilityRefreshed {
                processed: report.processed,
                remaining: report.remaining,
                frame: report.frame,
            });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use barn_defence_core::{Clock, EngineConfig, EntityId, Piece, Position};
    use barn_defence_system_damage_cascade::{
        CollapseAnimation, HealthRecord, PendingDestruction,
    };
    use barn_defence_system_spatial_index::SpatialStats;
    use barn_defence_system_stability::{OptimizerStats, ZoneStats};
    use barn_defence_system_structural_validator::SerializedGraph;

    use super::World;

    /// Configuration the world was built with.
    #[must_use]
    pub fn config<C>(world: &World<C>) -> &EngineConfig {
        &world.config
    }

    /// Number of ticks applied so far.
    #[must_use]
    pub fn tick_index<C>(world: &World<C>) -> u64 {
        world.tick_index
    }

    /// Registered piece with the given id.
    #[must_use]
    pub fn piece<C: Clock>(world: &World<C>, piece: EntityId) -> Option<&Piece> {
        world.stability.optimizer().validator().piece(piece)
    }

    /// Number of registered pieces.
    #[must_use]
    pub fn piece_count<C: Clock>(world: &World<C>) -> usize {
        world.stability.optimizer().validator().len()
    }

    /// Reports whether a chain of supporters connects `piece` to the ground.
    #[must_use]
    pub fn is_supported<C: Clock>(world: &World<C>, piece: EntityId) -> bool {
        world
            .stability
            .optimizer()
            .validator()
            .graph()
            .has_path_to_ground(piece)
    }

    /// Last known position of a tracked entity.
    #[must_use]
    pub fn position<C>(world: &World<C>, entity: EntityId) -> Option<Position> {
        world.spatial.position_of(entity)
    }

    /// Entity closest to `position` within `max_radius`.
    #[must_use]
    pub fn nearest_entity<C>(
        world: &World<C>,
        position: Position,
        max_radius: f32,
    ) -> Option<EntityId> {
        world.spatial.find_nearest(position, max_radius)
    }

    /// Entities within `radius` of `center`, sorted by id.
    #[must_use]
    pub fn entities_within<C>(world: &World<C>, center: Position, radius: f32) -> Vec<EntityId> {
        world.spatial.query_radius(center, radius)
    }

    /// Health record of a damageable entity.
    #[must_use]
    pub fn health<C>(world: &World<C>, entity: EntityId) -> Option<&HealthRecord> {
        world.damage.record(entity)
    }

    /// Collapse animations still playing.
    #[must_use]
    pub fn animations<C>(world: &World<C>) -> &[CollapseAnimation] {
        world.damage.animations()
    }

    /// Pieces waiting to collapse.
    #[must_use]
    pub fn pending_collapses<C>(world: &World<C>) -> &[PendingDestruction] {
        world.damage.pending_destructions()
    }

    /// Occupancy of the spatial index.
    #[must_use]
    pub fn spatial_stats<C>(world: &World<C>) -> SpatialStats {
        world.spatial.stats()
    }

    /// Counters of the stability optimizer.
    #[must_use]
    pub fn optimizer_stats<C: Clock>(world: &World<C>) -> OptimizerStats {
        world.stability.optimizer().stats()
    }

    /// Occupancy of the stability zones.
    #[must_use]
    pub fn zone_stats<C: Clock>(world: &World<C>) -> ZoneStats {
        world.stability.zone_stats()
    }

    /// Snapshot of the support graph in the portable format.
    #[must_use]
    pub fn serialized_graph<C: Clock>(world: &World<C>) -> SerializedGraph {
        world.stability.optimizer().validator().serialize_graph()
    }
}
