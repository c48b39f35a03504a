//! Tiles and the dense tile grid.

use serde::{Deserialize, Serialize};

use outpost_logic::constants::FLOOR_MOVEMENT_COST;
use outpost_logic::geometry::{GridBounds, TilePos};
use outpost_logic::items::ItemStack;

use super::addition::Addition;
use super::job::JobId;
use crate::systems::RoomId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileType {
    /// Open space. Never walkable, never part of a room.
    #[default]
    Empty,
    Floor,
}

/// One grid cell. Room membership and the job list are indexes kept up to
/// date by the world; they never own anything.
#[derive(Debug, Clone)]
pub struct Tile {
    pos: TilePos,
    pub(crate) tile_type: TileType,
    pub(crate) addition: Option<Addition>,
    pub(crate) item_stack: Option<ItemStack>,
    pub(crate) room: Option<RoomId>,
    /// Last published border state.
    pub(crate) border: bool,
    pub(crate) jobs: Vec<JobId>,
}

impl Tile {
    pub fn new(pos: TilePos) -> Self {
        Self {
            pos,
            tile_type: TileType::Empty,
            addition: None,
            item_stack: None,
            room: None,
            border: true,
            jobs: Vec::new(),
        }
    }

    pub fn pos(&self) -> TilePos {
        self.pos
    }

    pub fn tile_type(&self) -> TileType {
        self.tile_type
    }

    pub fn is_floor(&self) -> bool {
        self.tile_type == TileType::Floor
    }

    pub fn addition(&self) -> Option<&Addition> {
        self.addition.as_ref()
    }

    pub fn item_stack(&self) -> Option<&ItemStack> {
        self.item_stack.as_ref()
    }

    pub fn room(&self) -> Option<RoomId> {
        self.room
    }

    /// Jobs whose current destination is this tile.
    pub fn jobs(&self) -> &[JobId] {
        &self.jobs
    }

    /// Empty tiles and sealing additions stop a room flood fill.
    pub fn defines_room_border(&self) -> bool {
        self.tile_type == TileType::Empty
            || self
                .addition
                .as_ref()
                .map(Addition::defines_room_border)
                .unwrap_or(false)
    }

    /// 0 for empty tiles, otherwise the floor cost scaled by the addition.
    pub fn movement_cost(&self) -> f32 {
        if self.tile_type == TileType::Empty {
            return 0.0;
        }
        let multiplier = self
            .addition
            .as_ref()
            .map(Addition::movement_cost_multiplier)
            .unwrap_or(1.0);
        FLOOR_MOVEMENT_COST * multiplier
    }

    /// Ask to step onto this tile this tick. Closed doors refuse but start
    /// opening.
    pub(crate) fn request_entry(&mut self) -> bool {
        match self.addition.as_mut() {
            Some(addition) => addition.request_entry(),
            None => true,
        }
    }

    /// Whether a loose stack may be placed on the floor here.
    pub fn can_hold_item(&self) -> bool {
        self.tile_type == TileType::Floor
            && self
                .addition
                .as_ref()
                .map(Addition::can_hold_item_on_tile)
                .unwrap_or(true)
    }

    /// Put `stack` on this tile. A container addition receives it into its
    /// slots; otherwise it merges into the floor stack or takes the empty
    /// slot. Returns what did not fit.
    pub(crate) fn add_item_stack(&mut self, stack: ItemStack) -> Option<ItemStack> {
        if let Some(container) = self.addition.as_mut().and_then(|a| a.container_mut()) {
            return container.accept(stack);
        }
        if !self.can_hold_item() {
            return Some(stack);
        }
        match self.item_stack.as_mut() {
            Some(existing) => existing.merge_into(stack),
            None => {
                self.item_stack = Some(stack);
                None
            }
        }
    }

    pub(crate) fn take_item_stack(&mut self) -> Option<ItemStack> {
        self.item_stack.take()
    }

    pub(crate) fn add_job(&mut self, job: JobId) {
        if !self.jobs.contains(&job) {
            self.jobs.push(job);
        }
    }

    pub(crate) fn remove_job(&mut self, job: JobId) {
        self.jobs.retain(|j| *j != job);
    }
}

/// Row-major tile storage addressed by [`TilePos`].
#[derive(Debug, Clone)]
pub struct TileGrid {
    bounds: GridBounds,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// A grid of empty tiles.
    pub fn new(width: i32, height: i32) -> Self {
        let bounds = GridBounds::new(width, height);
        let tiles = (0..bounds.len()).map(|i| Tile::new(bounds.pos_of(i))).collect();
        Self { bounds, tiles }
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        self.bounds.contains(pos)
    }

    pub fn get(&self, pos: TilePos) -> Option<&Tile> {
        self.bounds.index(pos).and_then(|i| self.tiles.get(i))
    }

    pub fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        match self.bounds.index(pos) {
            Some(i) => self.tiles.get_mut(i),
            None => None,
        }
    }

    /// Movement cost, 0 outside the grid.
    pub fn movement_cost(&self, pos: TilePos) -> f32 {
        self.get(pos).map(Tile::movement_cost).unwrap_or(0.0)
    }

    /// Border state, true outside the grid.
    pub fn defines_room_border(&self, pos: TilePos) -> bool {
        self.get(pos).map(Tile::defines_room_border).unwrap_or(true)
    }

    pub fn room_at(&self, pos: TilePos) -> Option<RoomId> {
        self.get(pos).and_then(Tile::room)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AdditionKind, Crop};
    use outpost_logic::config::SimConfig;
    use outpost_logic::items::Item;

    fn floor_tile() -> Tile {
        let mut tile = Tile::new(TilePos::new(1, 1));
        tile.tile_type = TileType::Floor;
        tile
    }

    #[test]
    fn test_movement_cost() {
        let config = SimConfig::default();
        let mut tile = Tile::new(TilePos::new(0, 0));
        assert_eq!(tile.movement_cost(), 0.0);
        tile.tile_type = TileType::Floor;
        assert_eq!(tile.movement_cost(), 1.0);

        let mut soil = Addition::new(AdditionKind::Soil, &config);
        tile.addition = Some(soil.clone());
        // Unbuilt additions do not change the cost
        assert_eq!(tile.movement_cost(), 1.0);
        soil.finish_building();
        tile.addition = Some(soil);
        assert_eq!(tile.movement_cost(), 0.75);
    }

    #[test]
    fn test_border_definition() {
        let config = SimConfig::default();
        let mut tile = Tile::new(TilePos::new(0, 0));
        assert!(tile.defines_room_border());
        tile.tile_type = TileType::Floor;
        assert!(!tile.defines_room_border());
        tile.addition = Some(Addition::new(AdditionKind::Door, &config));
        assert!(tile.defines_room_border());
    }

    #[test]
    fn test_item_stack_merges_on_floor() {
        let tomato = Item::tomato(10);
        let mut tile = floor_tile();
        assert!(tile.add_item_stack(ItemStack::with_count(&tomato, 7)).is_none());
        let rest = tile.add_item_stack(ItemStack::with_count(&tomato, 5)).unwrap();
        assert_eq!(rest.count(), 2);
        assert_eq!(tile.item_stack().map(|s| s.count()), Some(10));
        assert_eq!(tile.take_item_stack().map(|s| s.count()), Some(10));
        assert!(tile.item_stack().is_none());
    }

    #[test]
    fn test_walls_refuse_items_and_plants_accept() {
        let config = SimConfig::default();
        let tomato = Item::tomato(10);

        let mut walled = floor_tile();
        walled.addition = Some(Addition::new(AdditionKind::Wall, &config));
        assert!(walled.add_item_stack(ItemStack::new(&tomato)).is_some());

        let mut planted = floor_tile();
        planted.addition = Some(Addition::new(AdditionKind::Plant(Crop::Tomato), &config));
        assert!(planted.add_item_stack(ItemStack::new(&tomato)).is_none());
    }

    #[test]
    fn test_container_receives_stack() {
        let config = SimConfig::default();
        let tomato = Item::tomato(10);
        let mut tile = floor_tile();
        tile.addition = Some(Addition::new(AdditionKind::ItemContainer, &config));
        assert!(tile.add_item_stack(ItemStack::with_count(&tomato, 3)).is_none());
        assert!(tile.item_stack().is_none());
        let held = tile.addition().and_then(|a| a.container()).map(|c| c.item_count("Tomato"));
        assert_eq!(held, Some(3));
    }

    #[test]
    fn test_grid_lookup() {
        let grid = TileGrid::new(4, 3);
        assert_eq!(grid.iter().count(), 12);
        assert_eq!(grid.get(TilePos::new(3, 2)).map(Tile::pos), Some(TilePos::new(3, 2)));
        assert!(grid.get(TilePos::new(4, 0)).is_none());
        assert_eq!(grid.movement_cost(TilePos::new(-1, 0)), 0.0);
        assert!(grid.defines_room_border(TilePos::new(0, 9)));
    }
}
