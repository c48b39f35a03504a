//! Tile mutations: floors, additions, borders, room recomputation and items.

use outpost_logic::geometry::{Direction, TilePos};
use outpost_logic::items::ItemStack;

use super::World;
use crate::components::{Addition, AdditionKind, JobId, JobKind, JobTask, TileType};
use crate::error::BuildError;
use crate::events::SimEvent;
use crate::systems::RoomId;

impl World {
    /// Turn `pos` into floor.
    pub fn set_floor(&mut self, pos: TilePos) -> Result<(), BuildError> {
        let tile = self.grid.get_mut(pos).ok_or(BuildError::OutOfBounds(pos))?;
        if tile.tile_type == TileType::Floor {
            return Ok(());
        }
        let old = tile.tile_type;
        tile.tile_type = TileType::Floor;
        self.emit(SimEvent::TileTypeChanged {
            pos,
            old,
            new: TileType::Floor,
        });
        self.refresh_border(pos);
        Ok(())
    }

    /// Turn `pos` back into open space. A tile with an addition is refused
    /// unless `force` is set, in which case the addition is removed first.
    /// Any loose stack on the tile is lost.
    pub fn set_empty(&mut self, pos: TilePos, force: bool) -> Result<(), BuildError> {
        let tile = self.grid.get(pos).ok_or(BuildError::OutOfBounds(pos))?;
        if tile.tile_type == TileType::Empty {
            return Ok(());
        }
        if tile.addition.is_some() {
            if !force {
                log::debug!("set_empty refused on {}: addition present", pos);
                return Err(BuildError::Occupied(pos));
            }
            self.remove_addition(pos);
        }
        if let Some(stack) = self.take_item_stack(pos) {
            log::info!("{} x{} at {} lost to space", stack.item_type(), stack.count(), pos);
        }

        let Some(tile) = self.grid.get_mut(pos) else {
            return Ok(());
        };
        let old = tile.tile_type;
        tile.tile_type = TileType::Empty;
        self.emit(SimEvent::TileTypeChanged {
            pos,
            old,
            new: TileType::Empty,
        });
        self.refresh_border(pos);
        Ok(())
    }

    /// Whether an addition of `kind` may be installed on `pos` right now.
    pub fn conditions_hold(&self, pos: TilePos, kind: AdditionKind) -> bool {
        let Some(tile) = self.grid.get(pos) else {
            return false;
        };
        let current = tile.addition();
        match kind {
            AdditionKind::Wall | AdditionKind::Soil | AdditionKind::ItemContainer => {
                tile.is_floor() && current.is_none()
            }
            AdditionKind::OxygenGenerator => tile.is_floor() && current.is_none() && tile.room().is_some(),
            AdditionKind::Plant(_) => {
                tile.is_floor()
                    && current
                        .map(|a| a.kind() == AdditionKind::Soil && a.is_built())
                        .unwrap_or(false)
            }
            AdditionKind::Door => {
                current.map(|a| a.kind() == AdditionKind::Wall).unwrap_or(false) && self.door_sides(pos).is_some()
            }
        }
    }

    /// The two tiles a door on `pos` would connect, and its orientation.
    /// North/south wins when both axes separate two rooms.
    fn door_sides(&self, pos: TilePos) -> Option<((TilePos, TilePos), f32)> {
        let axes = [
            (Direction::North, Direction::South, 0.0),
            (Direction::East, Direction::West, 90.0),
        ];
        axes.into_iter().find_map(|(a, b, orientation)| {
            let (pa, pb) = (pos.step(a), pos.step(b));
            match (self.grid.room_at(pa), self.grid.room_at(pb)) {
                (Some(ra), Some(rb)) if ra != rb => Some(((pa, pb), orientation)),
                _ => None,
            }
        })
    }

    /// Put `addition` on `pos`, replacing whatever was there.
    ///
    /// `loading` skips the placement conditions and leaves room
    /// recomputation to the caller, which rebuilds every room once all tiles
    /// are placed.
    pub fn install_addition(
        &mut self,
        pos: TilePos,
        mut addition: Addition,
        fully_built: bool,
        loading: bool,
    ) -> Result<(), BuildError> {
        if !self.grid.contains(pos) {
            return Err(BuildError::OutOfBounds(pos));
        }
        let kind = addition.kind();
        if !loading && !self.conditions_hold(pos, kind) {
            log::debug!("{} cannot be placed on {}", kind, pos);
            return Err(BuildError::ConditionsNotMet {
                pos,
                addition: kind.name(),
            });
        }

        let old = self.detach_addition(pos);
        let old_kind = old.as_ref().map(Addition::kind);
        let old_multiplier = old.as_ref().map(Addition::movement_cost_multiplier);

        addition.set_uid(self.next_uid());
        if fully_built {
            addition.finish_building();
        }
        if kind == AdditionKind::Door {
            let needs_sides = addition.door().map(|d| d.sides.is_none()).unwrap_or(false);
            if needs_sides {
                if let Some((sides, orientation)) = self.door_sides(pos) {
                    addition.orientation = orientation;
                    if let Some(door) = addition.door_mut() {
                        door.sides = Some(sides);
                    }
                }
            }
        }
        let multiplier = addition.movement_cost_multiplier();
        let registers = kind == AdditionKind::ItemContainer && addition.is_built();

        if let Some(tile) = self.grid.get_mut(pos) {
            tile.addition = Some(addition);
        }
        log::debug!("installed {} on {}", kind, pos);

        let mut door_rooms = Vec::new();
        for id in self.rooms.rooms_touching(pos) {
            if let Some(room) = self.rooms.get_mut(id) {
                room.index_addition(pos, old_kind, Some(kind));
            }
            if kind == AdditionKind::Door && old_kind != Some(AdditionKind::Door) {
                door_rooms.push(id);
            }
        }

        let door_added = !door_rooms.is_empty();
        if old.is_none() || old_multiplier != Some(multiplier) || door_added {
            self.navigation.invalidate();
        }
        if registers {
            self.storage.register(pos);
        }

        self.emit(SimEvent::AdditionChanged {
            pos,
            old: old_kind,
            new: Some(kind),
        });
        for room in door_rooms {
            self.emit(SimEvent::RoomDoorAdded { room, pos });
        }
        if !loading {
            self.refresh_border(pos);
        }
        Ok(())
    }

    /// Remove the addition on `pos`, deleting every job bound to it.
    pub fn remove_addition(&mut self, pos: TilePos) -> Option<Addition> {
        let removed = self.detach_addition(pos)?;
        let kind = removed.kind();
        for id in self.rooms.rooms_touching(pos) {
            if let Some(room) = self.rooms.get_mut(id) {
                room.index_addition(pos, Some(kind), None);
            }
        }
        self.navigation.invalidate();
        self.emit(SimEvent::AdditionChanged {
            pos,
            old: Some(kind),
            new: None,
        });
        self.refresh_border(pos);
        Some(removed)
    }

    /// Take the addition off its tile and tear down everything that pointed
    /// at it: bound jobs, hauls heading to it and its storage entry. Room
    /// indexes and events are left to the caller.
    fn detach_addition(&mut self, pos: TilePos) -> Option<Addition> {
        let old = self.grid.get_mut(pos)?.addition.take()?;

        if old.kind() == AdditionKind::ItemContainer {
            self.storage.unregister(pos);
            if let Some(container) = old.container() {
                for stack in &container.stacks {
                    log::info!("{} x{} lost with the container at {}", stack.item_type(), stack.count(), pos);
                }
            }
        }

        let uid = old.uid();
        let doomed: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|job| match job.task() {
                JobTask::Haul { dropoff, .. } => *dropoff == pos,
                _ => job.addition_uid() == Some(uid),
            })
            .map(|job| job.id())
            .collect();
        for id in doomed {
            self.delete_job(id);
        }
        Some(old)
    }

    /// Re-read the border state of `pos` and recompute rooms if it flipped.
    pub(crate) fn refresh_border(&mut self, pos: TilePos) {
        let Some(tile) = self.grid.get_mut(pos) else {
            return;
        };
        let now = tile.defines_room_border();
        if now == tile.border {
            return;
        }
        tile.border = now;
        self.emit(SimEvent::BorderChanged {
            pos,
            defines_border: now,
        });
        self.handle_border_change(pos, now);
    }

    /// A tile that starts defining a border leaves its room and splits it:
    /// fresh rooms are flooded from the four neighbours in clockwise order,
    /// skipping a neighbour already claimed by an earlier one. A tile that
    /// stops defining a border floods a single room joining its neighbours.
    fn handle_border_change(&mut self, pos: TilePos, defines_border: bool) {
        let mut created: Vec<RoomId> = Vec::new();
        let mut removed: Vec<RoomId> = Vec::new();

        if defines_border {
            removed.extend(self.rooms.detach_tile(&mut self.grid, pos));
            for dir in Direction::CLOCKWISE {
                let nb = pos.step(dir);
                if let Some(existing) = self.grid.room_at(nb) {
                    if created.contains(&existing) {
                        continue;
                    }
                }
                let outcome = self.rooms.flood_fill(&mut self.grid, nb);
                created.extend(outcome.room);
                removed.extend(outcome.removed);
            }
        } else {
            let outcome = self.rooms.flood_fill(&mut self.grid, pos);
            created.extend(outcome.room);
            removed.extend(outcome.removed);
        }

        self.navigation.invalidate();
        for id in removed {
            self.emit(SimEvent::RoomRemoved(id));
        }
        for id in created {
            if self.rooms.get(id).is_some() {
                self.emit(SimEvent::RoomCreated(id));
            }
        }
    }

    /// Flood every room from scratch after a bulk load. `anchors` are tried
    /// first, in order, so saved rooms keep their place in the update order;
    /// the returned ids line up with `anchors`.
    pub(crate) fn rebuild_rooms(&mut self, anchors: &[TilePos]) -> Vec<Option<RoomId>> {
        for tile in self.grid.iter_mut() {
            tile.border = tile.defines_room_border();
        }
        let mut ids = Vec::with_capacity(anchors.len());
        for &anchor in anchors {
            let id = match self.grid.room_at(anchor) {
                Some(_) => None,
                None => self.rooms.flood_fill(&mut self.grid, anchor).room,
            };
            ids.push(id);
        }
        let orphans: Vec<TilePos> = self
            .grid
            .iter()
            .filter(|t| t.is_floor() && !t.defines_room_border() && t.room().is_none())
            .map(|t| t.pos())
            .collect();
        for pos in orphans {
            if self.grid.room_at(pos).is_none() {
                self.rooms.flood_fill(&mut self.grid, pos);
            }
        }
        self.navigation.invalidate();
        for id in self.rooms.ids() {
            self.emit(SimEvent::RoomCreated(id));
        }
        ids
    }

    // Items

    /// Put `stack` on `pos`. Returns whatever did not fit.
    pub fn add_item_stack(&mut self, pos: TilePos, stack: ItemStack) -> Option<ItemStack> {
        let Some(tile) = self.grid.get_mut(pos) else {
            return Some(stack);
        };
        let rest = tile.add_item_stack(stack);
        self.emit_item_stack(pos);
        rest
    }

    pub fn take_item_stack(&mut self, pos: TilePos) -> Option<ItemStack> {
        let taken = self.grid.get_mut(pos)?.take_item_stack();
        if taken.is_some() {
            self.emit_item_stack(pos);
        }
        taken
    }

    /// Re-publish the stack on every tile that holds one, for a listener
    /// that just subscribed.
    pub fn force_item_stack_events(&mut self) {
        let stacked: Vec<TilePos> = self
            .grid
            .iter()
            .filter(|t| t.item_stack().is_some())
            .map(|t| t.pos())
            .collect();
        for pos in stacked {
            self.emit_item_stack(pos);
        }
    }

    fn emit_item_stack(&mut self, pos: TilePos) {
        let (item_type, count) = match self.grid.get(pos).and_then(|t| t.item_stack()) {
            Some(stack) => (Some(stack.item_type().to_string()), stack.count()),
            None => (None, 0),
        };
        self.emit(SimEvent::ItemStackChanged { pos, item_type, count });
    }

    /// Queue a haul of the stack on `pickup` to the nearest container that
    /// takes all of it. Does nothing if a haul from that tile is already
    /// waiting.
    pub fn request_haul(&mut self, pickup: TilePos) -> Option<JobId> {
        let stack = self.grid.get(pickup)?.item_stack()?.clone();
        let pending = self.grid.get(pickup)?.jobs().iter().any(|&id| {
            self.jobs
                .get(id)
                .map(|j| j.kind() == JobKind::Haul && j.carrier().is_none())
                .unwrap_or(false)
        });
        if pending {
            return None;
        }
        let Some(dropoff) = self.storage.find_container_for(&self.grid, &stack, pickup) else {
            log::info!("no container takes {} x{} from {}", stack.item_type(), stack.count(), pickup);
            return None;
        };
        let id = self.create_job(
            pickup,
            JobTask::Haul {
                dropoff,
                carrier: None,
            },
            stack.item_type(),
        );
        self.enqueue_job(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Crop;
    use crate::world::tests::small_config;
    use outpost_logic::items::Item;

    fn world() -> World {
        World::new(small_config())
    }

    /// Build a finished wall across the start room's middle row.
    fn split_start_room(world: &mut World) -> TilePos {
        let c = world.bounds().center();
        for dx in -3..=3 {
            let wall = Addition::new(AdditionKind::Wall, world.config());
            world.install_addition(c.offset(dx, 0), wall, true, false).unwrap();
        }
        c
    }

    #[test]
    fn test_wall_splits_room() {
        let mut w = world();
        let c = split_start_room(&mut w);
        assert_eq!(w.room_count(), 2);
        let north = w.room_at(c.offset(0, 1)).unwrap().id();
        let south = w.room_at(c.offset(0, -1)).unwrap().id();
        assert_ne!(north, south);
        assert_eq!(w.room(north).unwrap().tile_count(), 21);
        assert!(w.room_at(c).is_none());
        assert!(w.room_manager().verify_partition(w.grid()).is_empty());
    }

    #[test]
    fn test_unbuilt_wall_does_not_seal() {
        let mut w = world();
        let c = w.bounds().center();
        w.install_addition(c, Addition::new(AdditionKind::Wall, w.config()), false, false)
            .unwrap();
        assert_eq!(w.room_count(), 1);
        assert!(w.room_at(c).is_some());
    }

    #[test]
    fn test_removing_wall_merges_rooms() {
        let mut w = world();
        let c = split_start_room(&mut w);
        w.remove_addition(c);
        assert_eq!(w.room_count(), 1);
        assert_eq!(w.room_at(c).unwrap().tile_count(), 43);
        assert!(w.room_manager().verify_partition(w.grid()).is_empty());
    }

    #[test]
    fn test_merge_blends_atmosphere() {
        let mut w = world();
        let c = split_start_room(&mut w);
        let north = w.grid.room_at(c.offset(0, 1)).unwrap();
        if let Some(room) = w.rooms.get_mut(north) {
            room.atmosphere.oxygen = 1.0;
        }
        w.remove_addition(c);
        // 21 tiles at 1.0, 21 at 0.0 and the freed tile at 0.0
        let oxygen = w.room_at(c).unwrap().oxygen();
        assert!((oxygen - 21.0 / 43.0).abs() < 1e-4);
    }

    #[test]
    fn test_breach_vents_room() {
        let mut w = world();
        let c = w.bounds().center();
        assert!(!w.room_at(c).unwrap().connects_to_space());

        // Opening the ring exposes the room to the empty tile beyond it
        w.remove_addition(c.offset(4, 0));
        let id = w.room_at(c).unwrap().id();
        assert!(w.room(id).unwrap().connects_to_space());
        assert!(w.room_manager().verify_partition(w.grid()).is_empty());

        if let Some(room) = w.rooms.get_mut(id) {
            room.add_oxygen(5.0, 20.0);
        }
        assert_eq!(w.room(id).unwrap().oxygen(), 0.0);
    }

    #[test]
    fn test_set_empty_refuses_addition_unless_forced() {
        let mut w = world();
        let c = w.bounds().center();
        w.install_addition(c, Addition::new(AdditionKind::Soil, w.config()), true, false)
            .unwrap();
        assert_eq!(w.set_empty(c, false), Err(BuildError::Occupied(c)));
        w.set_empty(c, true).unwrap();
        assert!(w.tile(c).unwrap().addition().is_none());
        assert_eq!(w.tile(c).unwrap().tile_type(), TileType::Empty);
    }

    #[test]
    fn test_placement_conditions() {
        let mut w = world();
        let c = w.bounds().center();
        let outside = TilePos::new(0, 0);

        assert!(!w.conditions_hold(outside, AdditionKind::Wall));
        assert!(w.conditions_hold(c, AdditionKind::OxygenGenerator));
        assert!(!w.conditions_hold(c, AdditionKind::Plant(Crop::Tomato)));
        assert!(!w.conditions_hold(c, AdditionKind::Door));

        w.install_addition(c, Addition::new(AdditionKind::Soil, w.config()), false, false)
            .unwrap();
        // Soil must be finished before planting
        assert!(!w.conditions_hold(c, AdditionKind::Plant(Crop::Tomato)));
        assert!(!w.conditions_hold(c, AdditionKind::Wall));

        let err = w.install_addition(outside, Addition::new(AdditionKind::Wall, w.config()), false, false);
        assert!(matches!(err, Err(BuildError::ConditionsNotMet { .. })));
    }

    #[test]
    fn test_door_between_rooms() {
        let mut w = world();
        let c = split_start_room(&mut w);
        // The ring wall only has one room beside it
        assert!(!w.conditions_hold(c.offset(4, 0), AdditionKind::Door));
        assert!(w.conditions_hold(c, AdditionKind::Door));

        w.drain_events();
        w.install_addition(c, Addition::new(AdditionKind::Door, w.config()), false, false)
            .unwrap();
        let door = w.tile(c).unwrap().addition().unwrap();
        assert_eq!(door.orientation, 0.0);
        assert_eq!(door.door().unwrap().sides, Some((c.offset(0, 1), c.offset(0, -1))));

        // Still two rooms, both indexing the door
        assert_eq!(w.room_count(), 2);
        for room in w.rooms() {
            assert_eq!(room.doors().collect::<Vec<_>>(), vec![c]);
        }
        let door_events = w
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SimEvent::RoomDoorAdded { .. }))
            .count();
        assert_eq!(door_events, 2);
        // Door tiles join the graph
        assert!(w.graph().contains(c));
    }

    #[test]
    fn test_graph_dirty_rules() {
        let mut w = world();
        let c = w.bounds().center();
        w.graph();
        let rebuilds = w.navigation().rebuild_count();

        // Nothing changed
        w.graph();
        assert_eq!(w.navigation().rebuild_count(), rebuilds);

        w.install_addition(c, Addition::new(AdditionKind::OxygenGenerator, w.config()), true, false)
            .unwrap();
        assert!(w.navigation().is_dirty());
        let graph = w.graph();
        assert!(graph.edges(c.offset(1, 0)).iter().all(|e| e.to != c));
        assert_eq!(graph.incoming(c), 0);
    }

    #[test]
    fn test_replacing_soil_with_plant_keeps_index() {
        let mut w = world();
        let c = w.bounds().center();
        w.install_addition(c, Addition::new(AdditionKind::Soil, w.config()), true, false)
            .unwrap();
        w.install_addition(c, Addition::new(AdditionKind::Plant(Crop::Tomato), w.config()), false, false)
            .unwrap();
        let room = w.room_at(c).unwrap();
        assert_eq!(room.additions_of(AdditionKind::Soil).count(), 0);
        assert_eq!(room.additions_of(AdditionKind::Plant(Crop::Tomato)).collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn test_item_stack_events() {
        let mut w = world();
        let c = w.bounds().center();
        let tomato = Item::tomato(10);
        w.drain_events();
        assert!(w.add_item_stack(c, ItemStack::with_count(&tomato, 4)).is_none());
        w.force_item_stack_events();
        let events = w.drain_events();
        let expected = SimEvent::ItemStackChanged {
            pos: c,
            item_type: Some("Tomato".to_string()),
            count: 4,
        };
        assert_eq!(events, vec![expected.clone(), expected]);
        assert_eq!(w.take_item_stack(c).map(|s| s.count()), Some(4));
    }

    #[test]
    fn test_request_haul_needs_container() {
        let mut w = world();
        let c = w.bounds().center();
        let tomato = Item::tomato(10);
        w.add_item_stack(c, ItemStack::with_count(&tomato, 3));
        assert!(w.request_haul(c).is_none());

        let chest_pos = c.offset(2, 2);
        w.install_addition(chest_pos, Addition::new(AdditionKind::ItemContainer, w.config()), true, false)
            .unwrap();
        assert!(w.storage().contains(chest_pos));
        let id = w.request_haul(c).unwrap();
        assert_eq!(w.job(id).unwrap().title(), "Hauling Tomato to (12, 12)");
        // One pending haul per pickup tile
        assert!(w.request_haul(c).is_none());

        // Removing the container deletes the haul
        w.remove_addition(chest_pos);
        assert!(w.job(id).is_none());
        assert!(w.storage().is_empty());
    }
}
