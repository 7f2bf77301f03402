use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use barn_defence_core::{CellKey, Clock, EntityId, Position, SystemClock, ZoneConfig};

use crate::optimizer::{ProcessReport, StabilityOptimizer};

/// Stability optimizer that only drains work near the player eagerly.
///
/// Pieces are bucketed into square zones keyed like spatial cells. The
/// zones within `active_zone_radius` rings of the player's zone are active;
/// queued work in other zones stays deferred until the player comes close.
/// Until a player position is known every zone counts as active.
#[derive(Debug)]
pub struct ZonedStabilityOptimizer<C = SystemClock> {
    optimizer: StabilityOptimizer<C>,
    zone_size: f32,
    active_radius: u32,
    zones: BTreeMap<CellKey, BTreeSet<EntityId>>,
    piece_zones: BTreeMap<EntityId, CellKey>,
    player_zone: Option<CellKey>,
}

/// Occupancy summary of the zone grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZoneStats {
    /// Zones holding at least one piece.
    pub total_zones: usize,
    /// Pieces registered with a zone.
    pub total_pieces: usize,
    /// Occupied zones inside the active window.
    pub active_zones: usize,
    /// Pieces inside the active window.
    pub active_pieces: usize,
}

impl<C: Clock> ZonedStabilityOptimizer<C> {
    /// Wraps an optimizer with a zone grid.
    #[must_use]
    pub fn new(optimizer: StabilityOptimizer<C>, config: &ZoneConfig) -> Self {
        Self {
            optimizer,
            zone_size: config.zone_size,
            active_radius: config.active_zone_radius,
            zones: BTreeMap::new(),
            piece_zones: BTreeMap::new(),
            player_zone: None,
        }
    }

    /// Moves the centre of the active window to the zone containing `position`.
    pub fn set_player_position(&mut self, position: Position) {
        let zone = CellKey::containing(position, self.zone_size);
        if self.player_zone != Some(zone) {
            tracing::debug!(%zone, "active stability zone moved");
        }
        self.player_zone = Some(zone);
    }

    /// Files `piece` under the zone containing `position`, moving it if needed.
    pub fn register_piece(&mut self, piece: EntityId, position: Position) -> CellKey {
        let zone = CellKey::containing(position, self.zone_size);
        if self.piece_zones.get(&piece) == Some(&zone) {
            return zone;
        }
        let _ = self.unregister_piece(piece);
        let _ = self.zones.entry(zone).or_default().insert(piece);
        let _ = self.piece_zones.insert(piece, zone);
        zone
    }

    /// Removes `piece` from its zone, returning whether it was registered.
    pub fn unregister_piece(&mut self, piece: EntityId) -> bool {
        let Some(zone) = self.piece_zones.remove(&piece) else {
            return false;
        };
        if let Some(members) = self.zones.get_mut(&zone) {
            let _ = members.remove(&piece);
            if members.is_empty() {
                let _ = self.zones.remove(&zone);
            }
        }
        true
    }

    /// Zone `piece` is filed under, if any.
    #[must_use]
    pub fn zone_of(&self, piece: EntityId) -> Option<CellKey> {
        self.piece_zones.get(&piece).copied()
    }

    /// Reports whether work for `piece` is drained eagerly.
    ///
    /// Pieces without a zone are always active.
    #[must_use]
    pub fn is_active(&self, piece: EntityId) -> bool {
        self.piece_zones
            .get(&piece)
            .map_or(true, |zone| zone_is_active(self.player_zone, self.active_radius, *zone))
    }

    /// Occupancy of the zone grid and the active window.
    #[must_use]
    pub fn zone_stats(&self) -> ZoneStats {
        let mut stats = ZoneStats {
            total_zones: self.zones.len(),
            total_pieces: self.piece_zones.len(),
            ..ZoneStats::default()
        };
        for (zone, members) in &self.zones {
            if zone_is_active(self.player_zone, self.active_radius, *zone) {
                stats.active_zones += 1;
                stats.active_pieces += members.len();
            }
        }
        stats
    }

    /// Drains queued work for pieces in active zones within `budget`.
    pub fn process_active_updates(&mut self, budget: Duration) -> ProcessReport {
        let piece_zones = &self.piece_zones;
        let player_zone = self.player_zone;
        let radius = self.active_radius;
        self.optimizer.process_updates_where(budget, |piece| {
            piece_zones
                .get(&piece)
                .map_or(true, |zone| zone_is_active(player_zone, radius, *zone))
        })
    }

    /// Files a freshly placed piece and schedules it for this frame.
    pub fn on_piece_placed(&mut self, piece: EntityId, position: Position) {
        let _ = self.register_piece(piece, position);
        self.optimizer.on_piece_placed(piece);
    }

    /// Unfiles a destroyed piece and reports the pieces it held up alone.
    pub fn on_piece_destroyed(&mut self, piece: EntityId) -> Vec<EntityId> {
        let _ = self.unregister_piece(piece);
        self.optimizer.on_piece_destroyed(piece)
    }

    /// Wrapped optimizer.
    #[must_use]
    pub fn optimizer(&self) -> &StabilityOptimizer<C> {
        &self.optimizer
    }

    /// Mutable access to the wrapped optimizer.
    pub fn optimizer_mut(&mut self) -> &mut StabilityOptimizer<C> {
        &mut self.optimizer
    }
}

fn zone_is_active(player_zone: Option<CellKey>, radius: u32, zone: CellKey) -> bool {
    player_zone.map_or(true, |centre| centre.ring_distance(zone) <= radius)
}
