#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Placement rules and structural stability over the support graph.
//!
//! The validator owns the registry of placed pieces and the
//! [`SupportGraph`] linking them. Placement requests are checked against the
//! barn distance band, piece spacing and (in heuristic mode) the presence of
//! a potential supporter underneath. Stability is binary: a piece is fully
//! stable while a chain of supporters connects it to a grounded piece.

mod serialization;

use std::collections::BTreeMap;

use barn_defence_core::{
    EntityId, Piece, PlacementCode, PlacementConfig, PlacementReason, PlacementVerdict, Position,
    ValidationMode,
};
use barn_defence_system_support_graph::SupportGraph;

pub use serialization::{GraphError, SerializedEdge, SerializedGraph, SerializedPiece};

/// Applies placement rules and answers stability questions for pieces.
#[derive(Clone, Debug)]
pub struct StructuralValidator {
    config: PlacementConfig,
    mode: ValidationMode,
    graph: SupportGraph,
    pieces: BTreeMap<EntityId, Piece>,
    stability_cache: BTreeMap<EntityId, f32>,
}

impl StructuralValidator {
    /// Creates an empty validator using the provided placement settings.
    #[must_use]
    pub fn new(config: PlacementConfig) -> Self {
        Self {
            mode: config.mode,
            config,
            graph: SupportGraph::new(),
            pieces: BTreeMap::new(),
            stability_cache: BTreeMap::new(),
        }
    }

    /// Placement settings the validator was built with.
    #[must_use]
    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Current validation mode.
    #[must_use]
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Switches the validation mode and drops every cached stability value.
    pub fn set_mode(&mut self, mode: ValidationMode) {
        if self.mode != mode {
            tracing::debug!(?mode, "validation mode changed");
        }
        self.mode = mode;
        self.stability_cache.clear();
    }

    /// Read-only access to the underlying support graph.
    #[must_use]
    pub fn graph(&self) -> &SupportGraph {
        &self.graph
    }

    /// Checks a prospective piece against every placement rule.
    ///
    /// All failing rules are reported. The returned stability is the value
    /// currently known for the piece id and does not depend on whether the
    /// placement is legal.
    #[must_use]
    pub fn validate_placement(&self, piece: &Piece) -> PlacementVerdict {
        let mut reasons = Vec::new();

        match piece.position {
            None => reasons.push(PlacementReason::new(
                PlacementCode::NoPosition,
                format!("piece {} has no position", piece.id),
            )),
            Some(position) => {
                self.check_barn_distance(position, &mut reasons);
                self.check_spacing(piece.id, position, &mut reasons);
                if self.mode == ValidationMode::Heuristic
                    && !piece.grounded
                    && self.find_potential_supports(piece).is_empty()
                {
                    reasons.push(PlacementReason::new(
                        PlacementCode::NoSupport,
                        "nothing underneath can hold this piece up",
                    ));
                }
            }
        }

        PlacementVerdict {
            ok: reasons.is_empty(),
            stability: self.current_stability(piece.id),
            reasons,
        }
    }

    /// Validates a piece and, when every rule passes, registers it.
    ///
    /// Each potential support found underneath becomes a supporter of the new
    /// piece. On success the verdict carries the stability of the piece as
    /// placed.
    pub fn place_piece(&mut self, piece: Piece) -> PlacementVerdict {
        let mut verdict = self.validate_placement(&piece);
        if !verdict.ok {
            tracing::debug!(piece = %piece.id, reasons = verdict.reasons.len(), "placement rejected");
            return verdict;
        }

        let supports = self.find_potential_supports(&piece);
        if self.graph.contains(piece.id) {
            let stranded = self.remove_piece(piece.id);
            if !stranded.is_empty() {
                tracing::debug!(
                    piece = %piece.id,
                    stranded = stranded.len(),
                    "re-placed piece left its load without support"
                );
            }
        }
        self.add_piece(piece);
        for supporter in &supports {
            self.add_support_relation(*supporter, piece.id);
        }

        verdict.stability = self.stability(piece.id);
        tracing::debug!(
            piece = %piece.id,
            supports = supports.len(),
            stability = verdict.stability,
            "piece placed"
        );
        verdict
    }

    /// Registers a piece without validation or support linking.
    pub fn add_piece(&mut self, piece: Piece) {
        self.graph.add_piece(piece.id, piece.grounded);
        let _ = self.pieces.insert(piece.id, piece);
        self.stability_cache.clear();
    }

    /// Removes a piece, returning the pieces it left without ground.
    ///
    /// Simple mode skips the disconnection analysis and always returns an
    /// empty list.
    pub fn remove_piece(&mut self, piece: EntityId) -> Vec<EntityId> {
        if self.pieces.remove(&piece).is_none() && !self.graph.contains(piece) {
            return Vec::new();
        }
        self.stability_cache.clear();

        match self.mode {
            ValidationMode::Simple => {
                let _ = self.discard_piece(piece);
                Vec::new()
            }
            ValidationMode::Heuristic => self.graph.remove_piece(piece),
        }
    }

    /// Removes a piece and its edges without any disconnection analysis.
    ///
    /// Returns whether the piece was registered.
    pub fn discard_piece(&mut self, piece: EntityId) -> bool {
        let known = self.pieces.remove(&piece).is_some();
        let linked = self.graph.discard_piece(piece);
        self.stability_cache.clear();
        known || linked
    }

    /// Records that `supporter` holds up `supported`.
    pub fn add_support_relation(&mut self, supporter: EntityId, supported: EntityId) {
        self.graph.add_support_relation(supporter, supported);
        self.stability_cache.clear();
    }

    /// Stability of a piece in `[0, 1]`, cached until the next graph mutation.
    pub fn stability(&mut self, piece: EntityId) -> f32 {
        if let Some(&value) = self.stability_cache.get(&piece) {
            return value;
        }
        let value = self.compute_stability(piece);
        let _ = self.stability_cache.insert(piece, value);
        value
    }

    /// Registered pieces close enough below `piece` to hold it up.
    ///
    /// A candidate qualifies when it lies within the horizontal search radius
    /// and the vertical search height, strictly lower than the piece. Results
    /// are sorted by id.
    #[must_use]
    pub fn find_potential_supports(&self, piece: &Piece) -> Vec<EntityId> {
        let Some(position) = piece.position else {
            return Vec::new();
        };

        self.pieces
            .values()
            .filter(|candidate| candidate.id != piece.id)
            .filter_map(|candidate| candidate.position.map(|at| (candidate.id, at)))
            .filter(|(_, at)| {
                at.y() < position.y()
                    && at.planar_distance(position) <= self.config.support_search_radius
                    && at.vertical_distance(position) <= self.config.support_search_height
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Pieces that would lose ground if `piece` were removed.
    ///
    /// Always empty in simple mode.
    #[must_use]
    pub fn find_disconnected_after_removal(&self, piece: EntityId) -> Vec<EntityId> {
        match self.mode {
            ValidationMode::Simple => Vec::new(),
            ValidationMode::Heuristic => self.graph.find_disconnected_after_removal(piece),
        }
    }

    /// Registered piece with the given id.
    #[must_use]
    pub fn piece(&self, piece: EntityId) -> Option<&Piece> {
        self.pieces.get(&piece)
    }

    /// Registered pieces in ascending id order.
    pub fn pieces(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.pieces.values()
    }

    /// Elevation of a registered piece; unknown or unpositioned pieces sit at zero.
    #[must_use]
    pub fn elevation(&self, piece: EntityId) -> f32 {
        self.pieces.get(&piece).map_or(0.0, Piece::elevation)
    }

    /// Number of registered pieces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Reports whether no pieces are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Drops every piece, edge and cached value.
    pub fn clear(&mut self) {
        self.pieces.clear();
        self.graph.clear();
        self.stability_cache.clear();
    }

    /// Snapshot of the pieces and support edges in the portable format.
    #[must_use]
    pub fn serialize_graph(&self) -> SerializedGraph {
        let pieces = self
            .pieces
            .values()
            .map(|piece| SerializedPiece {
                id: piece.id,
                position: piece.position,
                kind: piece.kind,
                is_grounded: self.graph.is_grounded(piece.id),
            })
            .collect();

        let edges = self
            .graph
            .pieces()
            .filter_map(|id| {
                let supports = self.graph.supported_pieces(id);
                (!supports.is_empty()).then_some(SerializedEdge { id, supports })
            })
            .collect();

        let grounded = self
            .graph
            .pieces()
            .filter(|id| self.graph.is_grounded(*id))
            .collect();

        SerializedGraph {
            pieces,
            edges,
            grounded,
        }
    }

    /// Replaces the whole state with a snapshot; `None` only clears.
    ///
    /// Edges naming pieces absent from the snapshot are skipped.
    pub fn deserialize_graph(&mut self, snapshot: Option<&SerializedGraph>) {
        self.clear();
        let Some(snapshot) = snapshot else {
            return;
        };

        for entry in &snapshot.pieces {
            let grounded = entry.is_grounded || snapshot.grounded.contains(&entry.id);
            if self.pieces.contains_key(&entry.id) {
                tracing::warn!(piece = %entry.id, "duplicate piece in snapshot; keeping the last");
            }
            self.add_piece(Piece {
                id: entry.id,
                position: entry.position,
                grounded,
                kind: entry.kind,
                health: entry.kind.max_health(),
            });
        }

        for edge in &snapshot.edges {
            for supported in &edge.supports {
                if self.graph.contains(edge.id) && self.graph.contains(*supported) {
                    self.add_support_relation(edge.id, *supported);
                } else {
                    tracing::warn!(
                        supporter = %edge.id,
                        %supported,
                        "skipping snapshot edge to unknown piece"
                    );
                }
            }
        }

        tracing::debug!(
            pieces = self.pieces.len(),
            edges = self.graph.edge_count(),
            "support graph restored"
        );
    }

    /// Encodes the current graph as JSON.
    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(&self.serialize_graph())?)
    }

    /// Replaces the current graph with one decoded from JSON; `null` clears.
    pub fn from_json(&mut self, json: &str) -> Result<(), GraphError> {
        let snapshot: Option<SerializedGraph> = serde_json::from_str(json)?;
        self.deserialize_graph(snapshot.as_ref());
        Ok(())
    }

    fn check_barn_distance(&self, position: Position, reasons: &mut Vec<PlacementReason>) {
        let distance = position.planar_distance(self.config.anchor);
        if distance < self.config.min_distance_from_barn {
            reasons.push(PlacementReason::new(
                PlacementCode::TooClose,
                format!(
                    "{distance:.2} units from the barn, minimum is {:.2}",
                    self.config.min_distance_from_barn
                ),
            ));
        } else if distance > self.config.max_distance_from_barn {
            reasons.push(PlacementReason::new(
                PlacementCode::TooFar,
                format!(
                    "{distance:.2} units from the barn, maximum is {:.2}",
                    self.config.max_distance_from_barn
                ),
            ));
        }
    }

    fn check_spacing(
        &self,
        piece: EntityId,
        position: Position,
        reasons: &mut Vec<PlacementReason>,
    ) {
        let blocker = self.pieces.values().find(|other| {
            other.id != piece
                && other.position.is_some_and(|at| {
                    at.planar_distance(position) < self.config.min_piece_spacing
                })
        });
        if let Some(blocker) = blocker {
            reasons.push(PlacementReason::new(
                PlacementCode::Blocked,
                format!("overlaps piece {}", blocker.id),
            ));
        }
    }

    fn current_stability(&self, piece: EntityId) -> f32 {
        self.stability_cache
            .get(&piece)
            .copied()
            .unwrap_or_else(|| self.compute_stability(piece))
    }

    fn compute_stability(&self, piece: EntityId) -> f32 {
        match self.mode {
            ValidationMode::Simple => 1.0,
            ValidationMode::Heuristic if self.graph.has_path_to_ground(piece) => 1.0,
            ValidationMode::Heuristic => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use barn_defence_core::PieceKind;

    use super::*;

    fn id(value: u32) -> EntityId {
        EntityId::new(value)
    }

    #[test]
    fn graph_mutations_clear_the_stability_cache() {
        let mut validator = StructuralValidator::new(PlacementConfig::default());
        validator.add_piece(Piece::new(id(1), PieceKind::Foundation, Position::planar(10.0, 0.0), true));
        assert!((validator.stability(id(1)) - 1.0).abs() < f32::EPSILON);
        assert_eq!(validator.stability_cache.len(), 1);

        validator.add_piece(Piece::new(id(2), PieceKind::Wall, Position::new(10.0, 1.0, 0.0), false));
        assert!(validator.stability_cache.is_empty());

        let _ = validator.stability(id(2));
        validator.add_support_relation(id(1), id(2));
        assert!(validator.stability_cache.is_empty());
        assert!((validator.stability(id(2)) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn validation_reads_cached_values_without_storing() {
        let mut validator = StructuralValidator::new(PlacementConfig::default());
        let piece = Piece::new(id(1), PieceKind::Foundation, Position::planar(10.0, 0.0), true);
        validator.add_piece(piece);

        let verdict = validator.validate_placement(&piece);

        assert!((verdict.stability - 1.0).abs() < f32::EPSILON);
        assert!(validator.stability_cache.is_empty());
    }
}
