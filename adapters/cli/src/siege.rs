//! Seeded siege script driven through the world's command interface.

use std::{f32::consts::TAU, time::Duration};

use barn_defence_core::{
    Clock, Command, DamageKind, EngineConfig, EntityId, Piece, PieceKind, Position,
};
use barn_defence_world::{query, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ZOMBIE_ID_BASE: u32 = 10_000;
const WALL_OFFSET: f32 = 1.5;
const WALL_HEIGHT: f32 = 2.0;
const MELEE_REACH: f32 = 2.0;

/// Tunables of the generated siege.
#[derive(Clone, Debug)]
pub(crate) struct SiegePlan {
    /// Number of foundation posts in the barricade ring.
    pub(crate) posts: u32,
    /// Number of zombies released at the start.
    pub(crate) zombies: u32,
    /// Frames between explosions; zero disables them.
    pub(crate) explosion_interval: u32,
    /// Simulated duration of a frame.
    pub(crate) frame: Duration,
    /// Stability budget granted to each tick.
    pub(crate) budget: Duration,
}

#[derive(Clone, Copy, Debug)]
struct Zombie {
    id: EntityId,
    position: Position,
    speed: f32,
    target: EntityId,
    target_position: Position,
}

/// Generates the command stream of a siege on a ring-shaped barricade.
#[derive(Debug)]
pub(crate) struct Siege {
    plan: SiegePlan,
    rng: ChaCha8Rng,
    ring_radius: f32,
    posts: Vec<(EntityId, Position)>,
    zombies: Vec<Zombie>,
}

impl Siege {
    /// Creates a siege whose randomness is fully determined by `seed`.
    pub(crate) fn new(plan: SiegePlan, seed: u64) -> Self {
        Self {
            plan,
            rng: ChaCha8Rng::seed_from_u64(seed),
            ring_radius: 0.0,
            posts: Vec::new(),
            zombies: Vec::new(),
        }
    }

    /// Commands that raise the barricade and release the horde.
    pub(crate) fn setup(&mut self, config: &EngineConfig) -> Vec<Command> {
        let placement = &config.placement;
        let anchor = placement.anchor;
        let span = placement.max_distance_from_barn - placement.min_distance_from_barn;
        self.ring_radius = placement.min_distance_from_barn + span * 0.25;
        let spawn_radius =
            (placement.min_distance_from_barn + span * 0.9).max(self.ring_radius + MELEE_REACH);

        let mut commands = vec![Command::SetPlayerPosition { position: anchor }];

        for index in 0..self.plan.posts {
            let jitter = self.rng.gen_range(-0.02f32..0.02);
            let angle = (index as f32 / self.plan.posts as f32 + jitter) * TAU;
            let (sin, cos) = angle.sin_cos();
            let base = Position::planar(
                anchor.x() + self.ring_radius * cos,
                anchor.z() + self.ring_radius * sin,
            );
            let post = EntityId::new(index * 2 + 1);
            self.posts.push((post, base));
            commands.push(Command::PlacePiece {
                piece: Piece::new(post, PieceKind::Foundation, base, true),
            });

            let wall = Position::new(
                base.x() + WALL_OFFSET * cos,
                WALL_HEIGHT,
                base.z() + WALL_OFFSET * sin,
            );
            commands.push(Command::PlacePiece {
                piece: Piece::new(EntityId::new(index * 2 + 2), PieceKind::Wall, wall, false),
            });
        }

        for index in 0..self.plan.zombies {
            let angle = self.rng.gen_range(0.0..TAU);
            let (sin, cos) = angle.sin_cos();
            let position = Position::planar(
                anchor.x() + spawn_radius * cos,
                anchor.z() + spawn_radius * sin,
            );
            let Some((target, target_position)) = self.nearest_post(position) else {
                break;
            };
            let zombie = Zombie {
                id: EntityId::new(ZOMBIE_ID_BASE + index),
                position,
                speed: self.rng.gen_range(1.5..3.5),
                target,
                target_position,
            };
            self.zombies.push(zombie);
            commands.push(Command::TrackEntity {
                entity: zombie.id,
                position,
                max_health: self.rng.gen_range(60.0..120.0),
            });
        }

        tracing::info!(
            posts = self.plan.posts,
            zombies = self.zombies.len(),
            ring_radius = self.ring_radius,
            "siege prepared"
        );
        commands
    }

    /// Commands for a single frame, ending with the tick.
    pub(crate) fn frame<C: Clock>(&mut self, frame: u32, world: &World<C>) -> Vec<Command> {
        let mut commands = Vec::new();
        let dt = self.plan.frame.as_secs_f32();

        self.zombies
            .retain(|zombie| query::position(world, zombie.id).is_some());

        for zombie in &mut self.zombies {
            if query::piece(world, zombie.target).is_none() {
                let Some((target, position)) = nearest_standing(&self.posts, world, zombie.position)
                else {
                    continue;
                };
                zombie.target = target;
                zombie.target_position = position;
            }

            let dx = zombie.target_position.x() - zombie.position.x();
            let dz = zombie.target_position.z() - zombie.position.z();
            let distance = (dx * dx + dz * dz).sqrt();
            if distance > MELEE_REACH {
                let step = (zombie.speed * dt).min(distance - MELEE_REACH);
                zombie.position = Position::planar(
                    zombie.position.x() + dx / distance * step,
                    zombie.position.z() + dz / distance * step,
                );
                commands.push(Command::MoveEntity {
                    entity: zombie.id,
                    position: zombie.position,
                });
            } else {
                commands.push(Command::ApplyDamage {
                    entity: zombie.target,
                    amount: self.rng.gen_range(8.0..20.0),
                    kind: DamageKind::Melee,
                    source: Some(zombie.id),
                });
            }
        }

        let interval = self.plan.explosion_interval;
        if interval > 0 && frame % interval == interval - 1 {
            if let Some(&(_, post)) = self.posts.get(self.rng.gen_range(0..self.posts.len().max(1)))
            {
                commands.push(Command::Explode {
                    center: post,
                    radius: self.rng.gen_range(3.0..6.0),
                    base_damage: self.rng.gen_range(150.0..450.0),
                });
            }
        }

        commands.push(Command::Tick {
            dt: self.plan.frame,
            budget: self.plan.budget,
        });
        commands
    }

    fn nearest_post(&self, position: Position) -> Option<(EntityId, Position)> {
        self.posts
            .iter()
            .copied()
            .min_by(|a, b| {
                a.1.planar_distance(position)
                    .total_cmp(&b.1.planar_distance(position))
            })
    }
}

fn nearest_standing<C: Clock>(
    posts: &[(EntityId, Position)],
    world: &World<C>,
    position: Position,
) -> Option<(EntityId, Position)> {
    posts
        .iter()
        .copied()
        .filter(|(post, _)| query::piece(world, *post).is_some())
        .min_by(|a, b| {
            a.1.planar_distance(position)
                .total_cmp(&b.1.planar_distance(position))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use barn_defence_core::ManualClock;

    fn plan() -> SiegePlan {
        SiegePlan {
            posts: 8,
            zombies: 4,
            explosion_interval: 5,
            frame: Duration::from_millis(100),
            budget: Duration::from_millis(2),
        }
    }

    #[test]
    fn same_seed_produces_the_same_script() {
        let config = EngineConfig::default();
        let world = World::with_clock(config.clone(), ManualClock::new());

        let mut first = Siege::new(plan(), 42);
        let mut second = Siege::new(plan(), 42);

        assert_eq!(first.setup(&config), second.setup(&config));
        assert_eq!(first.frame(0, &world), second.frame(0, &world));
    }

    #[test]
    fn setup_places_a_post_and_wall_per_slot() {
        let config = EngineConfig::default();
        let mut siege = Siege::new(plan(), 7);

        let commands = siege.setup(&config);
        let placements = commands
            .iter()
            .filter(|command| matches!(command, Command::PlacePiece { .. }))
            .count();
        let zombies = commands
            .iter()
            .filter(|command| matches!(command, Command::TrackEntity { .. }))
            .count();

        assert_eq!(placements, 16);
        assert_eq!(zombies, 4);
        assert!(matches!(commands[0], Command::SetPlayerPosition { .. }));
    }

    #[test]
    fn every_frame_ends_with_a_tick() {
        let config = EngineConfig::default();
        let world = World::with_clock(config.clone(), ManualClock::new());
        let mut siege = Siege::new(plan(), 1);
        let _ = siege.setup(&config);

        let commands = siege.frame(4, &world);

        assert!(matches!(commands.last(), Some(Command::Tick { .. })));
        assert!(commands
            .iter()
            .any(|command| matches!(command, Command::Explode { .. })));
    }
}
