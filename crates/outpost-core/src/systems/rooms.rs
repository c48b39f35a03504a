//! Room manager - flood-fill partitioning of floor tiles into rooms.
//!
//! A room is a 4-connected set of floor tiles bounded by border tiles (empty
//! tiles or sealing additions). Rooms are never edited tile by tile: whenever
//! a tile's border state flips the world floods fresh rooms around it, and
//! the new rooms absorb tiles from the old ones. A room left without tiles is
//! dropped.
//!
//! Each room keeps one atmosphere for all its tiles. Absorbed tiles fold
//! their previous room's levels into the new room's running average.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use outpost_logic::atmosphere::RoomAtmosphere;
use outpost_logic::geometry::TilePos;

use crate::components::{AdditionKind, TileGrid, TileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u32);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "room#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    /// Tile the room was flooded from.
    anchor: TilePos,
    tiles: BTreeSet<TilePos>,
    edges: BTreeSet<TilePos>,
    pub atmosphere: RoomAtmosphere,
    /// Additions on member and edge tiles, by kind.
    additions: BTreeMap<AdditionKind, BTreeSet<TilePos>>,
}

impl Room {
    fn new(id: RoomId, anchor: TilePos) -> Self {
        Self {
            id,
            anchor,
            tiles: BTreeSet::new(),
            edges: BTreeSet::new(),
            atmosphere: RoomAtmosphere::default(),
            additions: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn anchor(&self) -> TilePos {
        self.anchor
    }

    pub fn tiles(&self) -> &BTreeSet<TilePos> {
        &self.tiles
    }

    pub fn edges(&self) -> &BTreeSet<TilePos> {
        &self.edges
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        self.tiles.contains(&pos)
    }

    /// Member or edge tile.
    pub fn touches(&self, pos: TilePos) -> bool {
        self.tiles.contains(&pos) || self.edges.contains(&pos)
    }

    /// Part of the border is open space.
    pub fn connects_to_space(&self) -> bool {
        self.atmosphere.vented
    }

    pub fn temperature(&self) -> f32 {
        self.atmosphere.temperature
    }

    pub fn oxygen(&self) -> f32 {
        self.atmosphere.oxygen
    }

    pub fn additions_of(&self, kind: AdditionKind) -> impl Iterator<Item = TilePos> + '_ {
        self.additions.get(&kind).into_iter().flat_map(|s| s.iter().copied())
    }

    pub fn doors(&self) -> impl Iterator<Item = TilePos> + '_ {
        self.additions_of(AdditionKind::Door)
    }

    /// Every indexed addition position, grouped by kind.
    pub fn addition_positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        self.additions.values().flat_map(|s| s.iter().copied())
    }

    pub fn add_oxygen(&mut self, amount: f32, max: f32) {
        self.atmosphere.add_oxygen(amount, self.tiles.len(), max);
    }

    pub fn add_heat(&mut self, amount: f32, max: f32) {
        self.atmosphere.add_heat(amount, self.tiles.len(), max);
    }

    /// Move `pos` in the addition index from `old` to `new`.
    pub(crate) fn index_addition(&mut self, pos: TilePos, old: Option<AdditionKind>, new: Option<AdditionKind>) {
        if let Some(old) = old {
            let emptied = match self.additions.get_mut(&old) {
                Some(set) => {
                    set.remove(&pos);
                    set.is_empty()
                }
                None => {
                    log::warn!("{}: {} at {} was never indexed", self.id, old, pos);
                    false
                }
            };
            if emptied {
                self.additions.remove(&old);
            }
        }
        if let Some(new) = new {
            self.additions.entry(new).or_default().insert(pos);
        }
    }
}

/// Result of a flood fill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloodOutcome {
    /// The new room, or `None` if the start tile was a border.
    pub room: Option<RoomId>,
    /// Rooms that lost their last tile to the new room.
    pub removed: Vec<RoomId>,
}

/// Owns every room. Ids increase monotonically, so iteration order is
/// creation order.
#[derive(Debug, Clone, Default)]
pub struct RoomManager {
    rooms: BTreeMap<RoomId, Room>,
    next_id: u32,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn get(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn get_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }

    /// Rooms that have `pos` as a member or edge tile.
    pub fn rooms_touching(&self, pos: TilePos) -> Vec<RoomId> {
        self.rooms
            .values()
            .filter(|r| r.touches(pos))
            .map(Room::id)
            .collect()
    }

    /// Flood a new room from `start` over 4-connected non-border tiles.
    pub fn flood_fill(&mut self, grid: &mut TileGrid, start: TilePos) -> FloodOutcome {
        let mut outcome = FloodOutcome::default();
        if grid.defines_room_border(start) {
            return outcome;
        }

        let id = RoomId(self.next_id);
        self.next_id += 1;
        let mut room = Room::new(id, start);

        let mut visited: HashSet<TilePos> = HashSet::new();
        let mut candidates: VecDeque<TilePos> = VecDeque::new();
        visited.insert(start);
        candidates.push_back(start);

        while let Some(cur) = candidates.pop_front() {
            self.absorb(grid, &mut room, cur, &mut outcome.removed);

            for nb in cur.neighbours4() {
                if !grid.contains(nb) || !visited.insert(nb) {
                    continue;
                }
                if grid.defines_room_border(nb) {
                    Self::add_edge(grid, &mut room, nb);
                } else {
                    candidates.push_back(nb);
                }
            }
        }

        log::debug!(
            "flooded {} from {}: {} tiles, {} edges{}",
            id,
            start,
            room.tiles.len(),
            room.edges.len(),
            if room.connects_to_space() { ", vented" } else { "" }
        );
        self.rooms.insert(id, room);
        outcome.room = Some(id);
        outcome
    }

    fn absorb(&mut self, grid: &mut TileGrid, room: &mut Room, pos: TilePos, removed: &mut Vec<RoomId>) {
        let Some(tile) = grid.get_mut(pos) else {
            return;
        };
        let previous = tile.room;
        let kind = tile.addition().map(|a| a.kind());

        let previous_atmosphere = previous.and_then(|p| self.rooms.get(&p)).map(|r| r.atmosphere);
        room.atmosphere.absorb_tile(room.tiles.len(), previous_atmosphere);
        room.tiles.insert(pos);
        room.index_addition(pos, None, kind);
        tile.room = Some(room.id);

        if let Some(prev) = previous {
            if self.release_tile(prev, pos, kind) {
                removed.push(prev);
            }
        }
    }

    fn add_edge(grid: &TileGrid, room: &mut Room, pos: TilePos) {
        let Some(tile) = grid.get(pos) else {
            return;
        };
        if room.edges.insert(pos) {
            if tile.tile_type() == TileType::Empty {
                room.atmosphere.vented = true;
            }
            room.index_addition(pos, None, tile.addition().map(|a| a.kind()));
        }
    }

    /// Drop `pos` from `id`. Returns true if that emptied and removed the room.
    fn release_tile(&mut self, id: RoomId, pos: TilePos, kind: Option<AdditionKind>) -> bool {
        let Some(room) = self.rooms.get_mut(&id) else {
            return false;
        };
        room.tiles.remove(&pos);
        if kind.is_some() {
            room.index_addition(pos, kind, None);
        }
        if room.tiles.is_empty() {
            self.rooms.remove(&id);
            log::debug!("{} has no tiles left, removed", id);
            return true;
        }
        false
    }

    /// Take a tile that just became a border out of its room. Returns the
    /// room if that emptied it.
    pub fn detach_tile(&mut self, grid: &mut TileGrid, pos: TilePos) -> Option<RoomId> {
        let tile = grid.get_mut(pos)?;
        let id = tile.room.take()?;
        let kind = tile.addition().map(|a| a.kind());
        if self.release_tile(id, pos, kind) {
            Some(id)
        } else {
            None
        }
    }

    /// Check that every non-border floor tile belongs to exactly one room and
    /// that room tile sets match the tiles' back references. Returns a list
    /// of violations.
    pub fn verify_partition(&self, grid: &TileGrid) -> Vec<String> {
        let mut problems = Vec::new();
        let mut owner: BTreeMap<TilePos, RoomId> = BTreeMap::new();
        for room in self.rooms.values() {
            if room.tiles.is_empty() {
                problems.push(format!("{} is empty", room.id));
            }
            for &pos in &room.tiles {
                if let Some(other) = owner.insert(pos, room.id) {
                    problems.push(format!("{} claimed by {} and {}", pos, other, room.id));
                }
            }
        }
        for tile in grid.iter() {
            let should_belong = tile.is_floor() && !tile.defines_room_border();
            let claimed = owner.get(&tile.pos()).copied();
            match (should_belong, claimed) {
                (true, None) => problems.push(format!("{} is in no room", tile.pos())),
                (false, Some(r)) => problems.push(format!("border {} is in {}", tile.pos(), r)),
                _ => {}
            }
            if tile.room() != claimed {
                problems.push(format!(
                    "{} points at {:?} but is listed in {:?}",
                    tile.pos(),
                    tile.room(),
                    claimed
                ));
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Addition, AdditionKind};
    use outpost_logic::config::SimConfig;

    /// Floor over `[x0, x1] × [y0, y1]`.
    fn floor(grid: &mut TileGrid, x0: i32, y0: i32, x1: i32, y1: i32) {
        for x in x0..=x1 {
            for y in y0..=y1 {
                if let Some(t) = grid.get_mut(TilePos::new(x, y)) {
                    t.tile_type = TileType::Floor;
                }
            }
        }
    }

    fn wall(grid: &mut TileGrid, pos: TilePos) {
        let mut w = Addition::new(AdditionKind::Wall, &SimConfig::default());
        w.finish_building();
        if let Some(t) = grid.get_mut(pos) {
            t.addition = Some(w);
        }
    }

    #[test]
    fn test_flood_stops_at_walls_and_records_edges() {
        let mut grid = TileGrid::new(7, 7);
        floor(&mut grid, 1, 1, 5, 5);
        for i in 1..=5 {
            wall(&mut grid, TilePos::new(i, 1));
            wall(&mut grid, TilePos::new(i, 5));
            wall(&mut grid, TilePos::new(1, i));
            wall(&mut grid, TilePos::new(5, i));
        }
        let mut rooms = RoomManager::new();
        let outcome = rooms.flood_fill(&mut grid, TilePos::new(3, 3));
        let id = outcome.room.unwrap();
        let room = rooms.get(id).unwrap();
        assert_eq!(room.tile_count(), 9);
        // 12 wall tiles touch the interior orthogonally; corners do not
        assert_eq!(room.edges().len(), 12);
        assert!(!room.connects_to_space());
        assert_eq!(room.additions_of(AdditionKind::Wall).count(), 12);
        assert!(rooms.verify_partition(&grid).is_empty());
    }

    #[test]
    fn test_flood_from_border_creates_nothing() {
        let mut grid = TileGrid::new(3, 3);
        let mut rooms = RoomManager::new();
        let outcome = rooms.flood_fill(&mut grid, TilePos::new(1, 1));
        assert_eq!(outcome, FloodOutcome::default());
        assert!(rooms.is_empty());
    }

    #[test]
    fn test_open_floor_is_vented() {
        let mut grid = TileGrid::new(5, 5);
        floor(&mut grid, 1, 1, 2, 2);
        let mut rooms = RoomManager::new();
        let id = rooms.flood_fill(&mut grid, TilePos::new(1, 1)).room.unwrap();
        let room = rooms.get(id).unwrap();
        assert_eq!(room.tile_count(), 4);
        assert!(room.connects_to_space());
        assert!(rooms.verify_partition(&grid).is_empty());
    }

    #[test]
    fn test_reflood_absorbs_and_removes_old_room() {
        let mut grid = TileGrid::new(6, 3);
        floor(&mut grid, 0, 0, 5, 2);
        let mut rooms = RoomManager::new();
        let first = rooms.flood_fill(&mut grid, TilePos::new(0, 0)).room.unwrap();
        rooms.get_mut(first).unwrap().atmosphere.oxygen = 6.0;

        let second = rooms.flood_fill(&mut grid, TilePos::new(3, 1));
        assert_eq!(second.removed, vec![first]);
        let room = rooms.get(second.room.unwrap()).unwrap();
        assert_eq!(room.tile_count(), 18);
        // Every absorbed tile carried 6.0, so the average is unchanged
        assert!((room.oxygen() - 6.0).abs() < 1e-4);
        assert_eq!(rooms.len(), 1);
        assert!(rooms.verify_partition(&grid).is_empty());
    }

    #[test]
    fn test_wall_line_splits_room() {
        let mut grid = TileGrid::new(5, 5);
        floor(&mut grid, 0, 0, 4, 4);
        let mut rooms = RoomManager::new();
        rooms.flood_fill(&mut grid, TilePos::new(0, 0));

        for x in 0..5 {
            let pos = TilePos::new(x, 2);
            wall(&mut grid, pos);
            rooms.detach_tile(&mut grid, pos);
        }
        let north = rooms.flood_fill(&mut grid, TilePos::new(2, 3)).room.unwrap();
        let south = rooms.flood_fill(&mut grid, TilePos::new(2, 1));
        assert_eq!(south.removed.len(), 1);
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms.get(north).unwrap().tile_count(), 10);
        assert_eq!(rooms.get(south.room.unwrap()).unwrap().tile_count(), 10);
        assert!(rooms.verify_partition(&grid).is_empty());
    }

    #[test]
    fn test_index_addition_moves_entries() {
        let mut room = Room::new(RoomId(0), TilePos::new(0, 0));
        let p = TilePos::new(1, 1);
        room.index_addition(p, None, Some(AdditionKind::Wall));
        room.index_addition(p, Some(AdditionKind::Wall), Some(AdditionKind::Door));
        assert_eq!(room.additions_of(AdditionKind::Wall).count(), 0);
        assert_eq!(room.doors().collect::<Vec<_>>(), vec![p]);
    }
}
