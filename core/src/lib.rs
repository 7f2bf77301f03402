#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Barn Defence simulation engine.
//!
//! This crate defines the vocabulary that connects the authoritative world,
//! the pure systems and the adapters. Adapters submit [`Command`] values
//! describing desired mutations, the world executes them through its `apply`
//! entry point and broadcasts [`Event`] values describing what happened.
//! Systems never own entities; they refer to them by [`EntityId`] and read
//! positions through the canonical [`Position`] type.

mod clock;
mod config;

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ConfigError, DamageConfig, EngineConfig, PlacementConfig, SpatialConfig, StabilityConfig,
    ZoneConfig,
};

/// Unique identifier assigned to any simulated entity.
///
/// Zombies, projectiles, turrets and buildable pieces share a single id space
/// so every system can key its bookkeeping by the same handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Location of an entity in world space.
///
/// `x` and `z` span the ground plane; `y` is elevation. Every entity type
/// exposes its location through this type, so planar queries never need to
/// guess which field carries the coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    x: f32,
    y: f32,
    z: f32,
}

impl Position {
    /// Creates a new position from its three components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Creates a position on the ground plane at zero elevation.
    #[must_use]
    pub const fn planar(x: f32, z: f32) -> Self {
        Self { x, y: 0.0, z }
    }

    /// Horizontal coordinate along the ground plane.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Elevation above the terrain.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Depth coordinate along the ground plane.
    #[must_use]
    pub const fn z(&self) -> f32 {
        self.z
    }

    /// Euclidean distance between two positions projected onto the ground plane.
    #[must_use]
    pub fn planar_distance(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Absolute elevation difference between two positions.
    #[must_use]
    pub fn vertical_distance(&self, other: Position) -> f32 {
        (self.y - other.y).abs()
    }
}

/// Key of a square cell in a uniform grid laid over the ground plane.
///
/// The same hashing scheme backs the spatial index and the stability zones;
/// only the cell size differs between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    x: i32,
    z: i32,
}

impl CellKey {
    /// Creates a cell key from explicit grid indices.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Computes the key of the cell containing `position`.
    ///
    /// Each axis is floored independently, so a coordinate that is an exact
    /// multiple of `cell_size` belongs to the higher-index cell.
    #[must_use]
    pub fn containing(position: Position, cell_size: f32) -> Self {
        Self {
            x: grid_index(position.x(), cell_size),
            z: grid_index(position.z(), cell_size),
        }
    }

    /// Column index of the cell along the `x` axis.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row index of the cell along the `z` axis.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Returns the key displaced by the provided number of cells.
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            z: self.z.saturating_add(dz),
        }
    }

    /// Number of cell rings separating two keys (Chebyshev distance).
    #[must_use]
    pub fn ring_distance(self, other: CellKey) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

/// Floors a single coordinate into a grid index.
#[must_use]
pub fn grid_index(coordinate: f32, cell_size: f32) -> i32 {
    (coordinate / cell_size).floor() as i32
}

/// Types of buildable structural pieces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    /// Slab laid directly onto the terrain.
    Foundation,
    /// Vertical barrier segment.
    Wall,
    /// Horizontal walkable platform.
    Floor,
    /// Load-bearing column.
    Pillar,
    /// Sloped connector between elevations.
    Ramp,
    /// Covering placed on top of a structure.
    Roof,
}

impl PieceKind {
    /// Hit points a freshly placed piece of this kind starts with.
    #[must_use]
    pub const fn max_health(self) -> f32 {
        match self {
            Self::Foundation => 400.0,
            Self::Wall => 250.0,
            Self::Floor => 200.0,
            Self::Pillar => 300.0,
            Self::Ramp => 180.0,
            Self::Roof => 150.0,
        }
    }
}

/// Buildable structural unit tracked by the validator and the support graph.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    /// Identifier shared with the spatial index and the damage system.
    pub id: EntityId,
    /// World location of the piece, if one has been assigned.
    pub position: Option<Position>,
    /// Whether the piece is anchored directly to the terrain.
    pub grounded: bool,
    /// Structural type of the piece.
    pub kind: PieceKind,
    /// Remaining hit points.
    pub health: f32,
}

impl Piece {
    /// Creates a positioned piece with full health for its kind.
    #[must_use]
    pub fn new(id: EntityId, kind: PieceKind, position: Position, grounded: bool) -> Self {
        Self {
            id,
            position: Some(position),
            grounded,
            kind,
            health: kind.max_health(),
        }
    }

    /// Creates a piece that has not yet been given a location.
    #[must_use]
    pub fn unplaced(id: EntityId, kind: PieceKind, grounded: bool) -> Self {
        Self {
            id,
            position: None,
            grounded,
            kind,
            health: kind.max_health(),
        }
    }

    /// Elevation of the piece, treating unpositioned pieces as ground level.
    #[must_use]
    pub fn elevation(&self) -> f32 {
        self.position.map_or(0.0, |position| position.y())
    }
}

/// Urgency tier of a pending stability recomputation.
///
/// Lower numeric values are more urgent. The tier count is fixed, so queues
/// keep one bucket per variant.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Must be processed this frame regardless of the time budget.
    Immediate = 0,
    /// Pieces directly affected by a structural change.
    High = 1,
    /// Routine refreshes.
    #[default]
    Normal = 2,
    /// Refreshes that may lag behind by several frames.
    Low = 3,
    /// Work performed only when the frame has spare budget.
    Background = 4,
}

impl Priority {
    /// Every priority tier ordered from most to least urgent.
    pub const ALL: [Priority; 5] = [
        Priority::Immediate,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Background,
    ];

    /// Zero-based bucket index of the tier.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Reports whether `self` is strictly more urgent than `other`.
    #[must_use]
    pub fn outranks(self, other: Priority) -> bool {
        self < other
    }
}

/// Operating mode of the structural validator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// No structural checks; every piece is considered fully stable.
    Simple,
    /// Graph-based support checks.
    #[default]
    Heuristic,
}

/// Machine-readable reason attached to a failed placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacementCode {
    /// The piece was submitted without a position.
    NoPosition,
    /// The piece lies closer to the barn than the configured minimum.
    TooClose,
    /// The piece lies farther from the barn than the configured maximum.
    TooFar,
    /// The piece overlaps an already registered piece.
    Blocked,
    /// No existing piece could hold the candidate up.
    NoSupport,
}

impl PlacementCode {
    /// Stable string form of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoPosition => "NO_POSITION",
            Self::TooClose => "TOO_CLOSE",
            Self::TooFar => "TOO_FAR",
            Self::Blocked => "BLOCKED",
            Self::NoSupport => "NO_SUPPORT",
        }
    }
}

impl fmt::Display for PlacementCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single failed placement rule with a human-readable explanation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementReason {
    /// Rule that rejected the placement.
    pub code: PlacementCode,
    /// Explanation suitable for the placement UI.
    pub message: String,
}

impl PlacementReason {
    /// Creates a new placement reason.
    #[must_use]
    pub fn new(code: PlacementCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Outcome of validating a candidate placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementVerdict {
    /// True when no placement rule fired.
    pub ok: bool,
    /// Current stability value of the candidate's id, independent of `ok`.
    pub stability: f32,
    /// Every rule that rejected the placement.
    pub reasons: Vec<PlacementReason>,
}

impl PlacementVerdict {
    /// Reports whether the verdict contains the provided failure code.
    #[must_use]
    pub fn has(&self, code: PlacementCode) -> bool {
        self.reasons.iter().any(|reason| reason.code == code)
    }
}

/// Category of damage applied to an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    /// Untyped damage.
    #[default]
    Generic,
    /// Close-range attacks such as zombie swipes.
    Melee,
    /// Bullets and other direct hits.
    Projectile,
    /// Blast damage with distance falloff.
    Explosive,
    /// Weakening caused by a destroyed neighbour.
    Structural,
}

/// Coarse health band derived from the health ratio of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageState {
    /// More than 60 % health remaining.
    Pristine,
    /// Between 26 % and 60 % health remaining.
    Damaged,
    /// Between 1 % and 25 % health remaining.
    Critical,
    /// No health remaining.
    Destroyed,
}

impl DamageState {
    /// Classifies the provided health against its maximum.
    ///
    /// A non-positive maximum is treated as destroyed so callers never divide
    /// by zero.
    #[must_use]
    pub fn classify(health: f32, max_health: f32) -> Self {
        if health <= 0.0 || max_health <= 0.0 {
            return Self::Destroyed;
        }

        let percent = health / max_health * 100.0;
        if percent > 60.0 {
            Self::Pristine
        } else if percent > 25.0 {
            Self::Damaged
        } else {
            Self::Critical
        }
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Requests validation and placement of a structural piece.
    PlacePiece {
        /// Piece to validate and register.
        piece: Piece,
    },
    /// Requests removal of a structural piece without destroying it.
    RemovePiece {
        /// Identifier of the piece to remove.
        piece: EntityId,
    },
    /// Starts tracking a non-structural entity such as a zombie or turret.
    TrackEntity {
        /// Identifier of the entity.
        entity: EntityId,
        /// Initial location of the entity.
        position: Position,
        /// Hit points of the entity; zero leaves it invulnerable.
        max_health: f32,
    },
    /// Moves a tracked entity to a new location.
    MoveEntity {
        /// Identifier of the entity.
        entity: EntityId,
        /// New location of the entity.
        position: Position,
    },
    /// Stops tracking an entity entirely.
    ForgetEntity {
        /// Identifier of the entity.
        entity: EntityId,
    },
    /// Applies direct damage to a single entity.
    ApplyDamage {
        /// Entity receiving the damage.
        entity: EntityId,
        /// Raw damage amount.
        amount: f32,
        /// Category of the damage.
        kind: DamageKind,
        /// Entity responsible for the damage, if known.
        source: Option<EntityId>,
    },
    /// Detonates an explosion with linear falloff.
    Explode {
        /// Centre of the blast.
        center: Position,
        /// Radius beyond which the blast deals no damage.
        radius: f32,
        /// Damage dealt at the centre of the blast.
        base_damage: f32,
    },
    /// Moves the reference point used to select active stability zones.
    SetPlayerPosition {
        /// New player location.
        position: Position,
    },
    /// Advances the simulation clock and drains deferred work.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
        /// Wall-clock budget granted to stability recomputation.
        budget: Duration,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a piece passed validation and was registered.
    PiecePlaced {
        /// Identifier of the placed piece.
        piece: EntityId,
        /// Spatial cell the piece was filed under.
        cell: CellKey,
        /// Stability of the piece right after placement.
        stability: f32,
    },
    /// Reports that a placement was rejected.
    PlacementRejected {
        /// Identifier of the rejected piece.
        piece: EntityId,
        /// Every rule that rejected the placement.
        reasons: Vec<PlacementReason>,
    },
    /// Confirms that a piece left the support graph.
    PieceRemoved {
        /// Identifier of the removed piece.
        piece: EntityId,
        /// Pieces that lost their path to the ground as a result.
        detached: Vec<EntityId>,
    },
    /// Reports that an entity lost health without being destroyed.
    EntityDamaged {
        /// Identifier of the damaged entity.
        entity: EntityId,
        /// Damage dealt by the hit.
        amount: f32,
        /// Category of the damage.
        kind: DamageKind,
        /// Health remaining after the hit.
        health: f32,
        /// Damage band after the hit.
        state: DamageState,
    },
    /// Reports that an entity reached zero health.
    EntityDestroyed {
        /// Identifier of the destroyed entity.
        entity: EntityId,
        /// Category of the final hit.
        kind: DamageKind,
        /// Entity responsible for the final hit, if known.
        source: Option<EntityId>,
    },
    /// Announces that a piece will collapse after a delay.
    CollapseScheduled {
        /// Identifier of the doomed piece.
        entity: EntityId,
        /// Delay before the piece is destroyed.
        delay: Duration,
    },
    /// Announces the start of a collapse animation.
    CollapseStarted {
        /// Identifier of the collapsing entity.
        entity: EntityId,
    },
    /// Announces that a collapse animation ran to completion.
    CollapseCompleted {
        /// Identifier of the collapsed entity.
        entity: EntityId,
    },
    /// Summarises the stability work performed during a tick.
    StabilityRefreshed {
        /// Number of pieces recomputed.
        processed: usize,
        /// Number of pieces still queued.
        remaining: usize,
        /// Frame counter after the tick.
        frame: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::{
        CellKey, DamageKind, DamageState, EntityId, PieceKind, PlacementCode, Position, Priority,
        ValidationMode,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn cell_key_floors_each_axis_independently() {
        assert_eq!(
            CellKey::containing(Position::planar(4.9, 4.9), 5.0),
            CellKey::new(0, 0)
        );
        assert_eq!(
            CellKey::containing(Position::planar(5.0, 5.0), 5.0),
            CellKey::new(1, 1)
        );
        assert_eq!(
            CellKey::containing(Position::planar(-0.1, 12.0), 5.0),
            CellKey::new(-1, 2)
        );
    }

    #[test]
    fn cell_key_displays_as_comma_pair() {
        assert_eq!(CellKey::new(-3, 7).to_string(), "-3,7");
    }

    #[test]
    fn ring_distance_is_chebyshev() {
        let origin = CellKey::new(0, 0);
        assert_eq!(origin.ring_distance(CellKey::new(2, -1)), 2);
        assert_eq!(origin.ring_distance(origin), 0);
    }

    #[test]
    fn planar_distance_ignores_elevation() {
        let a = Position::new(0.0, 10.0, 0.0);
        let b = Position::new(3.0, -4.0, 4.0);
        assert!((a.planar_distance(b) - 5.0).abs() < f32::EPSILON);
        assert!((a.vertical_distance(b) - 14.0).abs() < f32::EPSILON);
    }

    #[test]
    fn priorities_order_by_urgency() {
        assert!(Priority::Immediate.outranks(Priority::High));
        assert!(!Priority::Low.outranks(Priority::Normal));
        assert_eq!(Priority::Background.index(), 4);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn damage_state_bands_match_thresholds() {
        assert_eq!(DamageState::classify(100.0, 100.0), DamageState::Pristine);
        assert_eq!(DamageState::classify(61.0, 100.0), DamageState::Pristine);
        assert_eq!(DamageState::classify(60.0, 100.0), DamageState::Damaged);
        assert_eq!(DamageState::classify(26.0, 100.0), DamageState::Damaged);
        assert_eq!(DamageState::classify(25.0, 100.0), DamageState::Critical);
        assert_eq!(DamageState::classify(1.0, 100.0), DamageState::Critical);
        assert_eq!(DamageState::classify(0.0, 100.0), DamageState::Destroyed);
        assert_eq!(DamageState::classify(5.0, 0.0), DamageState::Destroyed);
    }

    #[test]
    fn placement_codes_serialize_in_screaming_case() {
        let json = serde_json::to_string(&PlacementCode::NoSupport).expect("serialize");
        assert_eq!(json, "\"NO_SUPPORT\"");
        assert_eq!(PlacementCode::TooFar.to_string(), "TOO_FAR");
    }

    #[test]
    fn entity_id_round_trips_through_bincode() {
        assert_round_trip(&EntityId::new(42));
    }

    #[test]
    fn enums_round_trip_through_bincode() {
        assert_round_trip(&PieceKind::Pillar);
        assert_round_trip(&ValidationMode::Simple);
        assert_round_trip(&DamageKind::Explosive);
        assert_round_trip(&Priority::Background);
    }

    #[test]
    fn position_round_trips_through_bincode() {
        assert_round_trip(&Position::new(1.5, -2.0, 8.25));
    }
}
