#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Directed support graph describing which pieces hold up which others.
//!
//! Every piece is a node keyed by [`EntityId`]. An edge `supporter →
//! supported` is stored on both endpoints so reachability can be walked in
//! either direction without scanning the whole graph. Grounded pieces are
//! the sources: a piece is stable when a chain of supporters ends at one.
//! Searches are breadth-first and visit each node once, so support cycles
//! never loop.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use barn_defence_core::EntityId;

/// Adjacency-set graph of support relations between pieces.
#[derive(Clone, Debug, Default)]
pub struct SupportGraph {
    nodes: BTreeMap<EntityId, Node>,
}

#[derive(Clone, Debug, Default)]
struct Node {
    grounded: bool,
    supports: BTreeSet<EntityId>,
    supported_by: BTreeSet<EntityId>,
}

impl SupportGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a piece node. Re-adding a piece only updates its grounded flag.
    pub fn add_piece(&mut self, piece: EntityId, grounded: bool) {
        self.nodes.entry(piece).or_default().grounded = grounded;
    }

    /// Deletes a piece and every edge touching it.
    ///
    /// Returns the pieces that lost their last path to the ground because of
    /// the removal, sorted by id.
    pub fn remove_piece(&mut self, piece: EntityId) -> Vec<EntityId> {
        if !self.nodes.contains_key(&piece) {
            return Vec::new();
        }

        let detached = self.find_disconnected_after_removal(piece);
        let _ = self.discard_piece(piece);

        tracing::debug!(%piece, detached = detached.len(), "piece removed from support graph");
        detached
    }

    /// Deletes a piece and its edges without analysing what it held up.
    ///
    /// Returns whether the piece was registered.
    pub fn discard_piece(&mut self, piece: EntityId) -> bool {
        let Some(node) = self.nodes.remove(&piece) else {
            return false;
        };
        for supported in node.supports {
            if let Some(other) = self.nodes.get_mut(&supported) {
                let _ = other.supported_by.remove(&piece);
            }
        }
        for supporter in node.supported_by {
            if let Some(other) = self.nodes.get_mut(&supporter) {
                let _ = other.supports.remove(&piece);
            }
        }
        true
    }

    /// Records that `supporter` holds up `supported`.
    ///
    /// Referencing a piece that was never added is a programmer error; release
    /// builds ignore the edge.
    pub fn add_support_relation(&mut self, supporter: EntityId, supported: EntityId) {
        let known = self.nodes.contains_key(&supporter) && self.nodes.contains_key(&supported);
        debug_assert!(
            known,
            "support edge {supporter} -> {supported} references an unknown piece"
        );
        if !known {
            tracing::warn!(%supporter, %supported, "ignoring support edge to unknown piece");
            return;
        }
        if supporter == supported {
            return;
        }

        if let Some(node) = self.nodes.get_mut(&supporter) {
            let _ = node.supports.insert(supported);
        }
        if let Some(node) = self.nodes.get_mut(&supported) {
            let _ = node.supported_by.insert(supporter);
        }
    }

    /// Deletes a single support edge, returning whether it existed.
    pub fn remove_support_relation(&mut self, supporter: EntityId, supported: EntityId) -> bool {
        let removed = self
            .nodes
            .get_mut(&supporter)
            .is_some_and(|node| node.supports.remove(&supported));
        if let Some(node) = self.nodes.get_mut(&supported) {
            let _ = node.supported_by.remove(&supporter);
        }
        removed
    }

    /// Reports whether some chain of supporters connects `piece` to a grounded piece.
    #[must_use]
    pub fn has_path_to_ground(&self, piece: EntityId) -> bool {
        self.reaches_ground(piece)
    }

    /// Pieces that would lose their path to the ground if `piece` were removed.
    ///
    /// Only pieces reachable from `piece` through outgoing support edges are
    /// considered. A piece that keeps an independent grounded supporter is
    /// excluded. The graph is not modified.
    #[must_use]
    pub fn find_disconnected_after_removal(&self, piece: EntityId) -> Vec<EntityId> {
        if !self.nodes.contains_key(&piece) {
            return Vec::new();
        }

        let dependents = self.dependents_of(piece);
        if dependents.is_empty() {
            return Vec::new();
        }

        let still_grounded = self.grounded_closure(Some(piece));
        dependents
            .into_iter()
            .filter(|dependent| !still_grounded.contains(dependent))
            .collect()
    }

    /// Pieces directly held up by `piece`.
    #[must_use]
    pub fn supported_pieces(&self, piece: EntityId) -> Vec<EntityId> {
        self.nodes
            .get(&piece)
            .map(|node| node.supports.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Pieces directly holding up `piece`.
    #[must_use]
    pub fn supporters(&self, piece: EntityId) -> Vec<EntityId> {
        self.nodes
            .get(&piece)
            .map(|node| node.supported_by.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Updates the grounded flag of a registered piece.
    pub fn set_grounded(&mut self, piece: EntityId, grounded: bool) {
        if let Some(node) = self.nodes.get_mut(&piece) {
            node.grounded = grounded;
        }
    }

    /// Reports whether `piece` is anchored directly to the terrain.
    #[must_use]
    pub fn is_grounded(&self, piece: EntityId) -> bool {
        self.nodes.get(&piece).is_some_and(|node| node.grounded)
    }

    /// Reports whether `piece` is registered.
    #[must_use]
    pub fn contains(&self, piece: EntityId) -> bool {
        self.nodes.contains_key(&piece)
    }

    /// Registered pieces in ascending id order.
    pub fn pieces(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.nodes.keys().copied()
    }

    /// Number of registered pieces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Reports whether the graph holds no pieces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of support edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.supports.len()).sum()
    }

    /// Drops every piece and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Breadth-first walk over incoming edges looking for a grounded piece.
    fn reaches_ground(&self, piece: EntityId) -> bool {
        let Some(start) = self.nodes.get(&piece) else {
            return false;
        };
        if start.grounded {
            return true;
        }

        let mut visited = BTreeSet::from([piece]);
        let mut frontier = VecDeque::from([piece]);

        while let Some(current) = frontier.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for &supporter in &node.supported_by {
                if !visited.insert(supporter) {
                    continue;
                }
                if self.nodes.get(&supporter).is_some_and(|next| next.grounded) {
                    return true;
                }
                frontier.push_back(supporter);
            }
        }

        false
    }

    /// Every piece reachable from `piece` over outgoing edges, excluding itself.
    fn dependents_of(&self, piece: EntityId) -> BTreeSet<EntityId> {
        let mut reached = BTreeSet::new();
        let mut frontier = VecDeque::from([piece]);

        while let Some(current) = frontier.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for &supported in &node.supports {
                if supported != piece && reached.insert(supported) {
                    frontier.push_back(supported);
                }
            }
        }

        reached
    }

    /// Pieces that reach the ground without passing through `excluded`.
    ///
    /// Seeds a forward search from every grounded piece, so a single pass
    /// answers reachability for the whole graph.
    fn grounded_closure(&self, excluded: Option<EntityId>) -> BTreeSet<EntityId> {
        let mut reached = BTreeSet::new();
        let mut frontier = VecDeque::new();

        for (&piece, node) in &self.nodes {
            if node.grounded && Some(piece) != excluded {
                let _ = reached.insert(piece);
                frontier.push_back(piece);
            }
        }

        while let Some(current) = frontier.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for &supported in &node.supports {
                if Some(supported) == excluded {
                    continue;
                }
                if reached.insert(supported) {
                    frontier.push_back(supported);
                }
            }
        }

        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u32) -> EntityId {
        EntityId::new(value)
    }

    #[test]
    fn grounded_closure_skips_excluded_piece() {
        let mut graph = SupportGraph::new();
        graph.add_piece(id(1), true);
        graph.add_piece(id(2), false);
        graph.add_piece(id(3), false);
        graph.add_support_relation(id(1), id(2));
        graph.add_support_relation(id(2), id(3));

        let all = graph.grounded_closure(None);
        assert_eq!(all, BTreeSet::from([id(1), id(2), id(3)]));

        let without_middle = graph.grounded_closure(Some(id(2)));
        assert_eq!(without_middle, BTreeSet::from([id(1)]));
    }

    #[test]
    fn reaches_ground_terminates_on_cycles() {
        let mut graph = SupportGraph::new();
        graph.add_piece(id(1), false);
        graph.add_piece(id(2), false);
        graph.add_support_relation(id(1), id(2));
        graph.add_support_relation(id(2), id(1));

        assert!(!graph.reaches_ground(id(1)));
        assert!(!graph.reaches_ground(id(9)));
    }

    #[test]
    fn dependents_follow_outgoing_edges_only() {
        let mut graph = SupportGraph::new();
        for value in 1..=4 {
            graph.add_piece(id(value), value == 1);
        }
        graph.add_support_relation(id(1), id(2));
        graph.add_support_relation(id(2), id(3));
        graph.add_support_relation(id(4), id(2));

        assert_eq!(graph.dependents_of(id(2)), BTreeSet::from([id(3)]));
        assert_eq!(graph.dependents_of(id(1)), BTreeSet::from([id(2), id(3)]));
    }

    #[test]
    fn self_edges_are_ignored() {
        let mut graph = SupportGraph::new();
        graph.add_piece(id(1), false);
        graph.add_support_relation(id(1), id(1));
        assert_eq!(graph.edge_count(), 0);
    }
}
