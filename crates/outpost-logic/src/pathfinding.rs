//! Weighted tile graph and A* search.
//!
//! `TileGraph` is built once from a set of walkable tiles and a movement-cost
//! lookup, then queried many times. It is immutable: when the world changes
//! shape the owner throws it away and builds a new one.
//!
//! Edges connect the eight neighbours of a node when the neighbour is itself
//! a node with non-zero movement cost. A diagonal step is dropped when either
//! of the two orthogonal tiles it squeezes between has zero movement cost, so
//! pawns never clip wall corners.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::geometry::TilePos;

/// A directed edge; `weight` is the destination's movement cost times the
/// step distance (1 orthogonal, √2 diagonal).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphEdge {
    pub to: TilePos,
    pub weight: f32,
}

#[derive(Debug, Clone, Default)]
pub struct GraphNode {
    /// Movement cost of the tile itself at build time.
    pub cost: f32,
    pub edges: Vec<GraphEdge>,
}

/// Immutable navigation graph over walkable tiles.
#[derive(Debug, Clone, Default)]
pub struct TileGraph {
    nodes: HashMap<TilePos, GraphNode>,
}

impl TileGraph {
    /// Build a graph over `walkable`, looking tile costs up through
    /// `movement_cost`. The lookup must return 0 for tiles outside the world.
    pub fn build<I, F>(walkable: I, movement_cost: F) -> Self
    where
        I: IntoIterator<Item = TilePos>,
        F: Fn(TilePos) -> f32,
    {
        let mut nodes: HashMap<TilePos, GraphNode> = walkable
            .into_iter()
            .map(|pos| {
                (
                    pos,
                    GraphNode {
                        cost: movement_cost(pos),
                        edges: Vec::new(),
                    },
                )
            })
            .collect();

        let positions: Vec<TilePos> = nodes.keys().copied().collect();
        for pos in positions {
            let edges: Vec<GraphEdge> = pos
                .neighbours8()
                .into_iter()
                .filter(|nb| nodes.contains_key(nb))
                .filter_map(|nb| {
                    let cost = movement_cost(nb);
                    if cost > 0.0 && !clips_corner(pos, nb, &movement_cost) {
                        Some(GraphEdge {
                            to: nb,
                            weight: cost * pos.step_distance(nb),
                        })
                    } else {
                        None
                    }
                })
                .collect();
            if let Some(node) = nodes.get_mut(&pos) {
                node.edges = edges;
            }
        }

        Self { nodes }
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        self.nodes.contains_key(&pos)
    }

    pub fn node(&self, pos: TilePos) -> Option<&GraphNode> {
        self.nodes.get(&pos)
    }

    pub fn edges(&self, pos: TilePos) -> &[GraphEdge] {
        self.nodes
            .get(&pos)
            .map(|n| n.edges.as_slice())
            .unwrap_or(&[])
    }

    /// Number of edges arriving at `pos`.
    pub fn incoming(&self, pos: TilePos) -> usize {
        self.nodes
            .values()
            .flat_map(|n| n.edges.iter())
            .filter(|e| e.to == pos)
            .count()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.edges.len()).sum()
    }

    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        self.nodes.keys().copied()
    }
}

fn clips_corner<F: Fn(TilePos) -> f32>(curr: TilePos, nb: TilePos, movement_cost: &F) -> bool {
    if !curr.is_diagonal_to(nb) {
        return false;
    }
    movement_cost(TilePos::new(nb.x, curr.y)) == 0.0
        || movement_cost(TilePos::new(curr.x, nb.y)) == 0.0
}

/// A path produced by [`find_path`]. Consumed front to back; the first tile
/// handed out is the start tile itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TilePath {
    /// Stored goal-first so popping yields tiles in walking order.
    stack: Vec<TilePos>,
    cost: f32,
}

impl TilePath {
    /// Pop the next tile to walk to. `None` once the path is exhausted.
    pub fn dequeue_next_tile(&mut self) -> Option<TilePos> {
        self.stack.pop()
    }

    pub fn peek(&self) -> Option<TilePos> {
        self.stack.last().copied()
    }

    /// Remaining tiles, including the one the walker may still be standing on.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Sum of edge weights from start to goal.
    pub fn total_cost(&self) -> f32 {
        self.cost
    }

    pub fn goal(&self) -> Option<TilePos> {
        self.stack.first().copied()
    }

    /// Remaining tiles in walking order.
    pub fn tiles(&self) -> impl Iterator<Item = TilePos> + '_ {
        self.stack.iter().rev().copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f_score: f32,
    seq: u64,
    pos: TilePos,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    // Reversed: BinaryHeap is a max-heap and we want the lowest f-score,
    // then the earliest insertion.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A* from `start` to `goal` with a straight-line heuristic.
///
/// Returns `None` when either endpoint is not a graph node or when the goal
/// cannot be reached.
pub fn find_path(graph: &TileGraph, start: TilePos, goal: TilePos) -> Option<TilePath> {
    if !graph.contains(start) || !graph.contains(goal) {
        return None;
    }

    let mut open = BinaryHeap::new();
    let mut closed: HashSet<TilePos> = HashSet::new();
    let mut came_from: HashMap<TilePos, TilePos> = HashMap::new();
    let mut g_score: HashMap<TilePos, f32> = HashMap::new();
    let mut seq = 0u64;

    g_score.insert(start, 0.0);
    open.push(OpenEntry {
        f_score: start.distance(goal),
        seq,
        pos: start,
    });

    while let Some(OpenEntry { pos: current, .. }) = open.pop() {
        if current == goal {
            let cost = g_score.get(&current).copied().unwrap_or(0.0);
            return Some(reconstruct(&came_from, current, cost));
        }
        if !closed.insert(current) {
            // Stale heap entry for an already expanded node
            continue;
        }

        let current_g = g_score.get(&current).copied().unwrap_or(f32::INFINITY);
        for edge in graph.edges(current) {
            if closed.contains(&edge.to) {
                continue;
            }
            let tentative = current_g + edge.weight;
            if tentative >= g_score.get(&edge.to).copied().unwrap_or(f32::INFINITY) {
                continue;
            }
            came_from.insert(edge.to, current);
            g_score.insert(edge.to, tentative);
            seq += 1;
            open.push(OpenEntry {
                f_score: tentative + edge.to.distance(goal),
                seq,
                pos: edge.to,
            });
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<TilePos, TilePos>, goal: TilePos, cost: f32) -> TilePath {
    let mut stack = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        stack.push(prev);
        current = prev;
    }
    TilePath { stack, cost }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_room(w: i32, h: i32) -> TileGraph {
        let tiles: Vec<TilePos> = (0..w)
            .flat_map(|x| (0..h).map(move |y| TilePos::new(x, y)))
            .collect();
        TileGraph::build(tiles, |p| {
            if p.x >= 0 && p.x < w && p.y >= 0 && p.y < h {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_open_room_diagonal_path() {
        let graph = open_room(5, 5);
        let mut path = find_path(&graph, TilePos::new(0, 0), TilePos::new(4, 4)).unwrap();
        assert_eq!(path.len(), 5);
        assert!((path.total_cost() - 4.0 * std::f32::consts::SQRT_2).abs() < 1e-4);
        assert_eq!(path.dequeue_next_tile(), Some(TilePos::new(0, 0)));
        assert_eq!(path.dequeue_next_tile(), Some(TilePos::new(1, 1)));
    }

    #[test]
    fn test_same_tile() {
        let graph = open_room(3, 3);
        let path = find_path(&graph, TilePos::new(1, 1), TilePos::new(1, 1)).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path.total_cost(), 0.0);
    }

    #[test]
    fn test_enclosed_start_has_no_path() {
        // Centre tile walkable, all eight neighbours are walls (cost 0)
        let mut tiles = vec![TilePos::new(1, 1), TilePos::new(4, 4)];
        tiles.extend(TilePos::new(1, 1).neighbours8());
        let graph = TileGraph::build(tiles, |p| {
            if p == TilePos::new(1, 1) || p == TilePos::new(4, 4) {
                1.0
            } else {
                0.0
            }
        });
        assert!(graph.edges(TilePos::new(1, 1)).is_empty());
        assert!(find_path(&graph, TilePos::new(1, 1), TilePos::new(4, 4)).is_none());
    }

    #[test]
    fn test_missing_endpoint() {
        let graph = open_room(3, 3);
        assert!(find_path(&graph, TilePos::new(0, 0), TilePos::new(9, 9)).is_none());
    }

    #[test]
    fn test_corner_clipping_blocked() {
        // 2x2 block with (1,0) solid: (0,0) -> (1,1) must not go diagonal
        let tiles = vec![
            TilePos::new(0, 0),
            TilePos::new(0, 1),
            TilePos::new(1, 1),
            TilePos::new(1, 0),
        ];
        let graph = TileGraph::build(tiles, |p| {
            let inside = (0..2).contains(&p.x) && (0..2).contains(&p.y);
            if inside && p != TilePos::new(1, 0) {
                1.0
            } else {
                0.0
            }
        });
        assert!(graph
            .edges(TilePos::new(0, 0))
            .iter()
            .all(|e| e.to != TilePos::new(1, 1)));
        let path = find_path(&graph, TilePos::new(0, 0), TilePos::new(1, 1)).unwrap();
        assert_eq!(path.len(), 3);
        assert!((path.total_cost() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_cost_node_has_no_incoming_edges() {
        let tiles: Vec<TilePos> = (0..3)
            .flat_map(|x| (0..3).map(move |y| TilePos::new(x, y)))
            .collect();
        let graph = TileGraph::build(tiles, |p| {
            if p == TilePos::new(1, 1) || !(0..3).contains(&p.x) || !(0..3).contains(&p.y) {
                0.0
            } else {
                1.0
            }
        });
        assert_eq!(graph.incoming(TilePos::new(1, 1)), 0);
        assert_eq!(graph.node(TilePos::new(1, 1)).unwrap().cost, 0.0);
    }

    #[test]
    fn test_prefers_cheap_tiles() {
        // A 3-wide corridor where the middle row is expensive
        let tiles: Vec<TilePos> = (0..5)
            .flat_map(|x| (0..3).map(move |y| TilePos::new(x, y)))
            .collect();
        let graph = TileGraph::build(tiles, |p| {
            if !(0..5).contains(&p.x) || !(0..3).contains(&p.y) {
                0.0
            } else if p.y == 1 && p.x > 0 && p.x < 4 {
                10.0
            } else {
                1.0
            }
        });
        let path = find_path(&graph, TilePos::new(0, 1), TilePos::new(4, 1)).unwrap();
        assert!(path.tiles().all(|t| t.y != 1 || t.x == 0 || t.x == 4));
    }
}
