use std::time::Duration;

use barn_defence_core::{DamageKind, DamageState, EntityId};

/// Health bookkeeping of a damageable entity.
#[derive(Clone, Debug, PartialEq)]
pub struct HealthRecord {
    /// Remaining hit points, never negative.
    pub health: f32,
    /// Hit points at full health.
    pub max_health: f32,
    /// Damage band derived from the health ratio.
    pub state: DamageState,
    /// Whether the entity plays a collapse animation when destroyed.
    pub has_visual: bool,
    /// Every hit taken, oldest first.
    pub history: Vec<DamageEntry>,
}

/// Single hit recorded against an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageEntry {
    /// Damage requested by the hit.
    pub amount: f32,
    /// Category of the hit.
    pub kind: DamageKind,
    /// Entity responsible for the hit, if known.
    pub source: Option<EntityId>,
    /// Simulation time of the hit.
    pub timestamp: Duration,
    /// Health left after the hit.
    pub health_after: f32,
}

impl HealthRecord {
    pub(crate) fn new(max_health: f32, has_visual: bool) -> Self {
        Self::with_health(max_health, max_health, has_visual)
    }

    /// Record starting at `health`, clamped to `max_health`.
    ///
    /// A pool that is not positive counts as unset and starts full.
    pub(crate) fn with_health(max_health: f32, health: f32, has_visual: bool) -> Self {
        let health = if health > 0.0 {
            health.min(max_health)
        } else {
            max_health
        };
        Self {
            health,
            max_health,
            state: DamageState::classify(health, max_health),
            has_visual,
            history: Vec::new(),
        }
    }

    /// Reports whether the entity has no health left.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }

    pub(crate) fn take_hit(
        &mut self,
        amount: f32,
        kind: DamageKind,
        source: Option<EntityId>,
        timestamp: Duration,
    ) {
        self.health = (self.health - amount).max(0.0);
        self.state = DamageState::classify(self.health, self.max_health);
        self.history.push(DamageEntry {
            amount,
            kind,
            source,
            timestamp,
            health_after: self.health,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_is_clamped_at_zero() {
        let mut record = HealthRecord::new(100.0, false);

        record.take_hit(30.0, DamageKind::Melee, None, Duration::ZERO);
        assert_eq!(record.state, DamageState::Damaged);

        record.take_hit(500.0, DamageKind::Projectile, Some(EntityId::new(7)), Duration::ZERO);
        assert_eq!(record.health, 0.0);
        assert_eq!(record.state, DamageState::Destroyed);
        assert!(record.is_destroyed());
        assert_eq!(record.history.len(), 2);
        assert_eq!(record.history[1].health_after, 0.0);
    }

    #[test]
    fn starting_health_is_clamped_to_the_pool() {
        assert_eq!(HealthRecord::with_health(100.0, 20.0, false).state, DamageState::Critical);
        assert_eq!(HealthRecord::with_health(100.0, 250.0, false).health, 100.0);
        assert_eq!(HealthRecord::with_health(100.0, 0.0, false).health, 100.0);
    }
}
