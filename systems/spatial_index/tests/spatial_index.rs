use barn_defence_core::{CellKey, EntityId, Position};
use barn_defence_system_spatial_index::SpatialIndex;
use proptest::prelude::*;

fn id(value: u32) -> EntityId {
    EntityId::new(value)
}

#[test]
fn boundary_coordinates_land_in_separate_cells() {
    let mut index = SpatialIndex::new(5.0);

    let low = index.insert(id(1), Position::planar(4.9, 4.9));
    let high = index.insert(id(2), Position::planar(5.0, 5.0));

    assert_eq!(low.to_string(), "0,0");
    assert_eq!(high.to_string(), "1,1");
    assert_eq!(
        index.query_radius(Position::planar(5.0, 5.0), 15.0),
        vec![id(1), id(2)],
        "radius spanning both cells must return both entities",
    );
}

#[test]
fn remove_and_update_absent_entities_are_harmless() {
    let mut index = SpatialIndex::new(10.0);

    assert!(!index.remove(id(9)));
    let cell = index.update(id(9), Position::planar(25.0, -3.0));

    assert_eq!(cell, CellKey::new(2, -1));
    assert!(index.contains(id(9)));
    assert_eq!(index.len(), 1);
}

#[test]
fn update_moves_entity_between_cells() {
    let mut index = SpatialIndex::new(10.0);
    let _ = index.insert(id(4), Position::planar(1.0, 1.0));

    let cell = index.update(id(4), Position::planar(31.0, 1.0));

    assert_eq!(cell, CellKey::new(3, 0));
    assert!(index.query_cell(Position::planar(1.0, 1.0)).is_empty());
    assert_eq!(index.query_cell(Position::planar(35.0, 5.0)), vec![id(4)]);
    assert_eq!(index.stats().cell_count, 1);
}

#[test]
fn radius_query_filters_by_true_distance() {
    let mut index = SpatialIndex::new(10.0);
    let _ = index.insert(id(1), Position::planar(0.0, 0.0));
    let _ = index.insert(id(2), Position::planar(7.0, 7.0));
    let _ = index.insert(id(3), Position::planar(3.0, 4.0));

    let found = index.query_radius(Position::planar(0.0, 0.0), 5.0);

    assert_eq!(found, vec![id(1), id(3)], "corner entity lies beyond radius");
}

#[test]
fn query_cell_returns_a_snapshot() {
    let mut index = SpatialIndex::new(10.0);
    let _ = index.insert(id(1), Position::planar(2.0, 2.0));

    let snapshot = index.query_cell(Position::planar(2.0, 2.0));
    let _ = index.insert(id(2), Position::planar(3.0, 3.0));

    assert_eq!(snapshot, vec![id(1)]);
    assert!(index.query_cell(Position::planar(-50.0, 0.0)).is_empty());
}

#[test]
fn nearest_prefers_closer_entity_in_farther_ring() {
    let mut index = SpatialIndex::new(10.0);
    // Same cell as the probe but near the opposite corner.
    let _ = index.insert(id(1), Position::planar(0.5, 0.5));
    // Neighbouring cell, just across the shared edge.
    let _ = index.insert(id(2), Position::planar(10.2, 9.5));

    let nearest = index.find_nearest(Position::planar(9.8, 9.5), f32::INFINITY);

    assert_eq!(nearest, Some(id(2)));
}

#[test]
fn nearest_respects_max_radius_and_empty_index() {
    let mut index = SpatialIndex::new(10.0);
    assert_eq!(index.find_nearest(Position::planar(0.0, 0.0), f32::INFINITY), None);

    let _ = index.insert(id(1), Position::planar(40.0, 0.0));

    assert_eq!(index.find_nearest(Position::planar(0.0, 0.0), 39.0), None);
    assert_eq!(index.find_nearest(Position::planar(0.0, 0.0), 40.0), Some(id(1)));
}

#[test]
fn nearest_breaks_ties_by_lowest_id() {
    let mut index = SpatialIndex::new(4.0);
    let _ = index.insert(id(8), Position::planar(-3.0, 0.0));
    let _ = index.insert(id(5), Position::planar(3.0, 0.0));

    assert_eq!(index.find_nearest(Position::planar(0.0, 0.0), 10.0), Some(id(5)));
}

#[test]
fn stats_report_occupancy() {
    let mut index = SpatialIndex::new(5.0);
    let _ = index.insert(id(1), Position::planar(1.0, 1.0));
    let _ = index.insert(id(2), Position::planar(2.0, 1.0));
    let _ = index.insert(id(3), Position::planar(12.0, 1.0));

    let stats = index.stats();

    assert_eq!(stats.object_count, 3);
    assert_eq!(stats.cell_count, 2);
    assert_eq!(stats.max_per_cell, 2);
    assert!((stats.average_per_cell - 1.5).abs() < f32::EPSILON);
    assert!((stats.cell_size - 5.0).abs() < f32::EPSILON);
}

#[test]
fn clear_is_idempotent() {
    let mut index = SpatialIndex::new(5.0);
    let _ = index.insert(id(1), Position::planar(1.0, 1.0));

    index.clear();
    let once = index.stats();
    index.clear();
    let twice = index.stats();

    assert_eq!(once, twice);
    assert_eq!(twice.object_count, 0);
    assert!(index.is_empty());
}

proptest! {
    #[test]
    fn hash_is_idempotent(x in -1_000.0f32..1_000.0, z in -1_000.0f32..1_000.0, size in 0.5f32..50.0) {
        let index = SpatialIndex::new(size);
        let position = Position::planar(x, z);
        prop_assert_eq!(index.hash(position), index.hash(position));
    }

    #[test]
    fn inserted_entity_is_found_by_any_radius(
        x in -1_000.0f32..1_000.0,
        z in -1_000.0f32..1_000.0,
        radius in 0.0f32..100.0,
    ) {
        let mut index = SpatialIndex::new(7.5);
        let position = Position::planar(x, z);
        let _ = index.insert(id(1), position);
        prop_assert_eq!(index.query_radius(position, radius), vec![id(1)]);
    }

    #[test]
    fn nearest_matches_brute_force(
        points in prop::collection::vec((-200.0f32..200.0, -200.0f32..200.0), 1..40),
        probe in (-250.0f32..250.0, -250.0f32..250.0),
    ) {
        let mut index = SpatialIndex::new(16.0);
        for (offset, (x, z)) in points.iter().enumerate() {
            let _ = index.insert(id(offset as u32), Position::planar(*x, *z));
        }
        let probe = Position::planar(probe.0, probe.1);

        let expected = points
            .iter()
            .enumerate()
            .map(|(offset, (x, z))| (Position::planar(*x, *z).planar_distance(probe), offset as u32))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, offset)| id(offset));

        prop_assert_eq!(index.find_nearest(probe, f32::INFINITY), expected);
    }
}
