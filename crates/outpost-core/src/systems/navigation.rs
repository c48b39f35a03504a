//! World navigation graph with deferred rebuilds.
//!
//! Nodes are every room tile plus every door indexed by a room; a door shared
//! by two rooms gets one node. Structural changes only mark the cache dirty;
//! the graph is rebuilt on the next read, so several changes in one tick cost
//! a single rebuild. Readers get an `Arc` and keep a consistent snapshot even
//! if the world changes under them.

use std::collections::BTreeSet;
use std::sync::Arc;

use outpost_logic::geometry::TilePos;
use outpost_logic::pathfinding::TileGraph;

use crate::components::TileGrid;
use crate::systems::RoomManager;

/// Build a graph from the current rooms and tiles.
pub fn build_world_graph(grid: &TileGrid, rooms: &RoomManager) -> TileGraph {
    let mut nodes: BTreeSet<TilePos> = BTreeSet::new();
    for room in rooms.iter() {
        nodes.extend(room.tiles().iter().copied());
        nodes.extend(room.doors());
    }
    TileGraph::build(nodes, |pos| grid.movement_cost(pos))
}

#[derive(Debug, Clone)]
pub struct NavigationGraph {
    graph: Arc<TileGraph>,
    dirty: bool,
    rebuilds: u64,
}

impl Default for NavigationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationGraph {
    /// An empty, dirty cache.
    pub fn new() -> Self {
        Self {
            graph: Arc::new(TileGraph::default()),
            dirty: true,
            rebuilds: 0,
        }
    }

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// How many times the graph has been rebuilt.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// The current graph, rebuilt first if dirty.
    pub fn get(&mut self, grid: &TileGrid, rooms: &RoomManager) -> Arc<TileGraph> {
        if self.dirty {
            self.graph = Arc::new(build_world_graph(grid, rooms));
            self.dirty = false;
            self.rebuilds += 1;
            log::debug!(
                "navigation graph rebuilt: {} nodes, {} edges",
                self.graph.node_count(),
                self.graph.edge_count()
            );
        }
        Arc::clone(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::TileType;

    fn open_floor(size: i32) -> (TileGrid, RoomManager) {
        let mut grid = TileGrid::new(size, size);
        for tile in grid.iter_mut() {
            tile.tile_type = TileType::Floor;
        }
        let mut rooms = RoomManager::new();
        rooms.flood_fill(&mut grid, TilePos::new(0, 0));
        (grid, rooms)
    }

    #[test]
    fn test_graph_covers_room_tiles() {
        let (grid, rooms) = open_floor(3);
        let graph = build_world_graph(&grid, &rooms);
        assert_eq!(graph.node_count(), 9);
        // Centre tile reaches all eight neighbours
        assert_eq!(graph.edges(TilePos::new(1, 1)).len(), 8);
    }

    #[test]
    fn test_cache_reuses_until_invalidated() {
        let (grid, rooms) = open_floor(3);
        let mut nav = NavigationGraph::new();
        let a = nav.get(&grid, &rooms);
        let b = nav.get(&grid, &rooms);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(nav.rebuild_count(), 1);

        nav.invalidate();
        nav.invalidate();
        let c = nav.get(&grid, &rooms);
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(nav.rebuild_count(), 2);
    }
}
