use std::time::Duration;

use barn_defence_core::EntityId;

/// Collapse animation of a destroyed entity, kept as plain data for renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollapseAnimation {
    /// Entity being animated.
    pub entity: EntityId,
    /// Simulation time the collapse began.
    pub started_at: Duration,
    /// Length of the animation.
    pub duration: Duration,
}

impl CollapseAnimation {
    /// Fraction of the animation played at `now`, clamped to `[0, 1]`.
    #[must_use]
    pub fn progress(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let played = now.saturating_sub(self.started_at).as_secs_f32();
        (played / self.duration.as_secs_f32()).min(1.0)
    }

    /// Reports whether the animation has finished at `now`.
    #[must_use]
    pub fn is_finished(&self, now: Duration) -> bool {
        now.saturating_sub(self.started_at) >= self.duration
    }
}

/// Piece scheduled to be destroyed once it has hung unsupported long enough.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingDestruction {
    /// Doomed piece.
    pub entity: EntityId,
    /// Simulation time at which the piece is destroyed.
    pub due_at: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_saturates_at_completion() {
        let animation = CollapseAnimation {
            entity: EntityId::new(1),
            started_at: Duration::from_millis(100),
            duration: Duration::from_millis(200),
        };

        assert_eq!(animation.progress(Duration::from_millis(50)), 0.0);
        assert!((animation.progress(Duration::from_millis(200)) - 0.5).abs() < 1e-6);
        assert!(!animation.is_finished(Duration::from_millis(299)));
        assert!(animation.is_finished(Duration::from_millis(300)));
        assert_eq!(animation.progress(Duration::from_secs(5)), 1.0);
    }
}
