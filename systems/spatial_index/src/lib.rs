#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Uniform spatial hash over the ground plane used for broad-phase queries.
//!
//! The index maps grid cells to the set of entity ids inside them and keeps
//! a reverse map from each id to its cell and last reported position. It
//! never owns entities; the game loop reports movement through
//! [`SpatialIndex::update`] once per frame and combat code asks radius and
//! nearest-neighbour questions against the latest positions.

use std::collections::{BTreeSet, HashMap};

use barn_defence_core::{CellKey, EntityId, Position, SpatialConfig};

/// Broad-phase spatial hash keyed by [`CellKey`].
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<CellKey, BTreeSet<EntityId>>,
    object_cells: HashMap<EntityId, Placement>,
}

/// Cell membership and last known position of a tracked entity.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Placement {
    cell: CellKey,
    position: Position,
}

/// Diagnostic summary of the index occupancy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialStats {
    /// Number of tracked entities.
    pub object_count: usize,
    /// Number of non-empty cells.
    pub cell_count: usize,
    /// Largest number of entities sharing a single cell.
    pub max_per_cell: usize,
    /// Mean number of entities per non-empty cell.
    pub average_per_cell: f32,
    /// Side length of a cell in world units.
    pub cell_size: f32,
}

impl SpatialIndex {
    /// Creates an empty index with the provided cell size.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        debug_assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
            object_cells: HashMap::new(),
        }
    }

    /// Creates an empty index configured from the engine settings.
    #[must_use]
    pub fn with_config(config: &SpatialConfig) -> Self {
        Self::new(config.cell_size)
    }

    /// Side length of a cell in world units.
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Computes the cell key containing `position`.
    #[must_use]
    pub fn hash(&self, position: Position) -> CellKey {
        CellKey::containing(position, self.cell_size)
    }

    /// Files `entity` under the cell containing `position`.
    ///
    /// Inserting an entity that is already tracked is a programmer error;
    /// release builds replace the previous membership.
    pub fn insert(&mut self, entity: EntityId, position: Position) -> CellKey {
        debug_assert!(
            !self.object_cells.contains_key(&entity),
            "entity {entity} inserted twice without removal"
        );
        if self.object_cells.contains_key(&entity) {
            tracing::warn!(%entity, "entity inserted twice; replacing previous cell");
            let _ = self.remove(entity);
        }

        let cell = self.hash(position);
        let _ = self.cells.entry(cell).or_default().insert(entity);
        let _ = self
            .object_cells
            .insert(entity, Placement { cell, position });
        cell
    }

    /// Stops tracking `entity`, returning whether it was present.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        let Some(placement) = self.object_cells.remove(&entity) else {
            return false;
        };
        self.detach_from_cell(entity, placement.cell);
        true
    }

    /// Records a new position for `entity`, moving it between cells if needed.
    ///
    /// Unknown entities are inserted.
    pub fn update(&mut self, entity: EntityId, position: Position) -> CellKey {
        let cell = self.hash(position);
        let Some(placement) = self.object_cells.get_mut(&entity) else {
            return self.insert(entity, position);
        };

        placement.position = position;
        if placement.cell == cell {
            return cell;
        }

        let previous = placement.cell;
        placement.cell = cell;
        self.detach_from_cell(entity, previous);
        let _ = self.cells.entry(cell).or_default().insert(entity);
        cell
    }

    /// Returns every entity whose planar distance to `center` is at most `radius`.
    ///
    /// The result is sorted by id and contains no duplicates.
    #[must_use]
    pub fn query_radius(&self, center: Position, radius: f32) -> Vec<EntityId> {
        self.query_radius_with_distance(center, radius)
            .into_iter()
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Like [`SpatialIndex::query_radius`], pairing each entity with its distance.
    #[must_use]
    pub fn query_radius_with_distance(
        &self,
        center: Position,
        radius: f32,
    ) -> Vec<(EntityId, f32)> {
        if radius < 0.0 || radius.is_nan() || self.object_cells.is_empty() {
            return Vec::new();
        }

        let candidates = self.candidates_in_range(center, radius);
        candidates
            .into_iter()
            .filter_map(|entity| {
                let placement = self.object_cells.get(&entity)?;
                let distance = placement.position.planar_distance(center);
                (distance <= radius).then_some((entity, distance))
            })
            .collect()
    }

    /// Returns a snapshot of the entities filed under the cell containing `position`.
    #[must_use]
    pub fn query_cell(&self, position: Position) -> Vec<EntityId> {
        self.cells
            .get(&self.hash(position))
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Finds the entity closest to `position` within `max_radius`.
    ///
    /// Rings of cells are scanned outward from the containing cell. Scanning
    /// stops only once the nearest point of the next ring lies farther than
    /// the best match, because a cell whose centre is farther away may still
    /// hold a closer entity near its edge. Ties resolve to the lower id.
    #[must_use]
    pub fn find_nearest(&self, position: Position, max_radius: f32) -> Option<EntityId> {
        if self.object_cells.is_empty() || max_radius < 0.0 || max_radius.is_nan() {
            return None;
        }

        let origin = self.hash(position);
        let rings = self.cells.keys().map(|cell| origin.ring_distance(*cell));
        let innermost = rings.clone().min().unwrap_or(0);
        let outermost = rings.max().unwrap_or(0);

        let mut best: Option<(f32, EntityId)> = None;

        for ring in innermost..=outermost {
            let ring = ring as i32;
            let bound = self.ring_lower_bound(position, origin, ring);
            if bound > max_radius {
                break;
            }
            if let Some((best_distance, _)) = best {
                if bound > best_distance {
                    break;
                }
            }

            for cell in self.occupied_ring_cells(origin, ring) {
                let Some(members) = self.cells.get(&cell) else {
                    continue;
                };
                for &entity in members {
                    let Some(placement) = self.object_cells.get(&entity) else {
                        continue;
                    };
                    let distance = placement.position.planar_distance(position);
                    if distance > max_radius {
                        continue;
                    }
                    let closer = match best {
                        None => true,
                        Some((best_distance, best_entity)) => {
                            distance < best_distance
                                || (distance == best_distance && entity < best_entity)
                        }
                    };
                    if closer {
                        best = Some((distance, entity));
                    }
                }
            }
        }

        best.map(|(_, entity)| entity)
    }

    /// Last position reported for `entity`.
    #[must_use]
    pub fn position_of(&self, entity: EntityId) -> Option<Position> {
        self.object_cells
            .get(&entity)
            .map(|placement| placement.position)
    }

    /// Cell `entity` is currently filed under.
    #[must_use]
    pub fn cell_of(&self, entity: EntityId) -> Option<CellKey> {
        self.object_cells.get(&entity).map(|placement| placement.cell)
    }

    /// Reports whether `entity` is tracked.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.object_cells.contains_key(&entity)
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.object_cells.len()
    }

    /// Reports whether no entity is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object_cells.is_empty()
    }

    /// Summarises the current occupancy for diagnostics.
    #[must_use]
    pub fn stats(&self) -> SpatialStats {
        let cell_count = self.cells.len();
        let max_per_cell = self.cells.values().map(BTreeSet::len).max().unwrap_or(0);
        let average_per_cell = if cell_count == 0 {
            0.0
        } else {
            self.object_cells.len() as f32 / cell_count as f32
        };

        SpatialStats {
            object_count: self.object_cells.len(),
            cell_count,
            max_per_cell,
            average_per_cell,
            cell_size: self.cell_size,
        }
    }

    /// Drops every cell and tracked entity.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.object_cells.clear();
    }

    fn detach_from_cell(&mut self, entity: EntityId, cell: CellKey) {
        if let Some(members) = self.cells.get_mut(&cell) {
            let _ = members.remove(&entity);
            if members.is_empty() {
                let _ = self.cells.remove(&cell);
            }
        }
    }

    fn candidates_in_range(&self, center: Position, radius: f32) -> BTreeSet<EntityId> {
        let min = self.hash(Position::planar(center.x() - radius, center.z() - radius));
        let max = self.hash(Position::planar(center.x() + radius, center.z() + radius));
        let columns = i64::from(max.x()) - i64::from(min.x()) + 1;
        let rows = i64::from(max.z()) - i64::from(min.z()) + 1;
        let span = columns.saturating_mul(rows);

        let mut candidates = BTreeSet::new();

        // Visiting occupied cells is cheaper than walking a huge, mostly empty range.
        if span > self.cells.len() as i64 {
            for (cell, members) in &self.cells {
                let inside = (min.x()..=max.x()).contains(&cell.x())
                    && (min.z()..=max.z()).contains(&cell.z());
                if inside {
                    candidates.extend(members.iter().copied());
                }
            }
            return candidates;
        }

        for x in min.x()..=max.x() {
            for z in min.z()..=max.z() {
                if let Some(members) = self.cells.get(&CellKey::new(x, z)) {
                    candidates.extend(members.iter().copied());
                }
            }
        }
        candidates
    }

    /// Cells of ring `ring` worth visiting, avoiding walks over empty perimeters.
    fn occupied_ring_cells(&self, origin: CellKey, ring: i32) -> Vec<CellKey> {
        let perimeter = if ring == 0 { 1 } else { ring as usize * 8 };
        if perimeter <= self.cells.len() {
            return ring_cells(origin, ring);
        }
        self.cells
            .keys()
            .copied()
            .filter(|cell| origin.ring_distance(*cell) == ring as u32)
            .collect()
    }

    /// Smallest planar distance from `position` to any point of ring `ring`.
    fn ring_lower_bound(&self, position: Position, origin: CellKey, ring: i32) -> f32 {
        if ring == 0 {
            return 0.0;
        }

        let size = self.cell_size;
        let low_x = (origin.x() - ring + 1) as f32 * size;
        let high_x = (origin.x() + ring) as f32 * size;
        let low_z = (origin.z() - ring + 1) as f32 * size;
        let high_z = (origin.z() + ring) as f32 * size;

        (position.x() - low_x)
            .min(high_x - position.x())
            .min(position.z() - low_z)
            .min(high_z - position.z())
            .max(0.0)
    }
}

/// Enumerates the cells at Chebyshev distance `ring` from `origin`.
fn ring_cells(origin: CellKey, ring: i32) -> Vec<CellKey> {
    if ring == 0 {
        return vec![origin];
    }

    let mut cells = Vec::with_capacity((ring as usize) * 8);
    for dx in -ring..=ring {
        cells.push(origin.offset(dx, -ring));
        cells.push(origin.offset(dx, ring));
    }
    for dz in (-ring + 1)..ring {
        cells.push(origin.offset(-ring, dz));
        cells.push(origin.offset(ring, dz));
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u32) -> EntityId {
        EntityId::new(value)
    }

    #[test]
    fn ring_cells_cover_perimeter_once() {
        let origin = CellKey::new(0, 0);
        assert_eq!(ring_cells(origin, 0), vec![origin]);

        let ring = ring_cells(origin, 2);
        assert_eq!(ring.len(), 16);
        let unique: BTreeSet<CellKey> = ring.iter().copied().collect();
        assert_eq!(unique.len(), 16);
        assert!(ring.iter().all(|cell| origin.ring_distance(*cell) == 2));
    }

    #[test]
    fn ring_lower_bound_measures_gap_to_inner_block() {
        let index = SpatialIndex::new(10.0);
        let position = Position::planar(2.0, 5.0);
        let origin = index.hash(position);
        assert_eq!(index.ring_lower_bound(position, origin, 0), 0.0);
        assert!((index.ring_lower_bound(position, origin, 1) - 2.0).abs() < f32::EPSILON);
        assert!((index.ring_lower_bound(position, origin, 2) - 12.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_cells_are_pruned_on_last_removal() {
        let mut index = SpatialIndex::new(5.0);
        let _ = index.insert(id(1), Position::planar(1.0, 1.0));
        let _ = index.insert(id(2), Position::planar(2.0, 2.0));
        assert_eq!(index.cells.len(), 1);

        assert!(index.remove(id(1)));
        assert_eq!(index.cells.len(), 1);
        assert!(index.remove(id(2)));
        assert!(index.cells.is_empty());
        assert!(!index.remove(id(2)));
    }

    #[test]
    fn update_within_same_cell_refreshes_position() {
        let mut index = SpatialIndex::new(10.0);
        let first = index.insert(id(3), Position::planar(1.0, 1.0));
        let second = index.update(id(3), Position::planar(8.0, 8.0));
        assert_eq!(first, second);
        assert_eq!(index.position_of(id(3)), Some(Position::planar(8.0, 8.0)));
        assert_eq!(index.query_radius(Position::planar(8.0, 8.0), 0.5), vec![id(3)]);
    }

    #[test]
    fn huge_radius_falls_back_to_occupied_cells() {
        let mut index = SpatialIndex::new(1.0);
        let _ = index.insert(id(1), Position::planar(-500.0, 300.0));
        let _ = index.insert(id(2), Position::planar(900.0, -700.0));
        let found = index.query_radius(Position::planar(0.0, 0.0), f32::INFINITY);
        assert_eq!(found, vec![id(1), id(2)]);
    }
}
