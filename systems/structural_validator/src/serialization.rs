//! Portable snapshot format of the support graph.

use barn_defence_core::{EntityId, PieceKind, Position};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding a serialized support graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The text was not a valid snapshot document.
    #[error("malformed support graph: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pieces, support edges and grounded ids of a structure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    /// Every registered piece.
    pub pieces: Vec<SerializedPiece>,
    /// Outgoing support edges grouped by supporter.
    pub edges: Vec<SerializedEdge>,
    /// Ids of the pieces anchored to the terrain.
    pub grounded: Vec<EntityId>,
}

/// Snapshot of a single piece.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedPiece {
    /// Piece identifier.
    pub id: EntityId,
    /// World location, if the piece had one.
    pub position: Option<Position>,
    /// Structural type of the piece.
    #[serde(rename = "type")]
    pub kind: PieceKind,
    /// Whether the piece is anchored to the terrain.
    pub is_grounded: bool,
}

/// Pieces held up by a single supporter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedEdge {
    /// Supporting piece.
    pub id: EntityId,
    /// Pieces it holds up.
    pub supports: Vec<EntityId>,
}
