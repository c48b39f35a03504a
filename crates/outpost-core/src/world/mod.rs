//! The simulation world: tile arena, rooms, navigation, jobs and characters.
//!
//! Everything that links two parts of the simulation goes through `World`.
//! Tiles are addressed by position, rooms and jobs by id, characters by
//! `hecs::Entity`; no part holds a reference into another. The methods are
//! split across files by concern:
//!
//! | File | Concern |
//! |------|---------|
//! | `mod.rs` | construction, accessors, characters, events, `update` |
//! | `tiles.rs` | floors, additions, borders and room recomputation, items |
//! | `jobs.rs` | job lifecycle, assignment and work |

mod jobs;
mod tiles;

use std::sync::Arc;

use hecs::Entity;
use rand::rngs::StdRng;
use rand::SeedableRng;

use outpost_logic::config::SimConfig;
use outpost_logic::geometry::{GridBounds, TilePos};
use outpost_logic::pathfinding::TileGraph;

use crate::components::{
    Addition, AdditionKind, Job, JobId, JobKind, JobPriorities, Pawn, Selected, Stats, Tile, TileGrid,
};
use crate::error::BuildError;
use crate::events::{EventBus, SimEvent, SubscriptionId};
use crate::systems::{
    addition_system, character_system, JobQueue, NavigationGraph, Room, RoomId, RoomManager, StorageIndex,
};

pub struct World {
    pub(crate) config: SimConfig,
    pub(crate) grid: TileGrid,
    pub(crate) rooms: RoomManager,
    pub(crate) navigation: NavigationGraph,
    pub(crate) jobs: JobQueue,
    pub(crate) storage: StorageIndex,
    /// Character entities and their components.
    pub(crate) ecs: hecs::World,
    /// Characters in spawn order; the update order.
    pub(crate) characters: Vec<Entity>,
    pub(crate) events: EventBus,
    pub(crate) rng: StdRng,
    next_addition_uid: u64,
}

impl World {
    /// A world with the walled start room in the middle.
    pub fn new(config: SimConfig) -> Self {
        let mut world = Self::blank(config);
        world.build_start_room();
        world
    }

    /// A world of empty tiles and nothing else.
    pub fn blank(config: SimConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let events = EventBus::with_log_capacity(config.event_log_capacity);
        Self {
            grid: TileGrid::new(config.world_width, config.world_height),
            config,
            rooms: RoomManager::new(),
            navigation: NavigationGraph::new(),
            jobs: JobQueue::new(),
            storage: StorageIndex::new(),
            ecs: hecs::World::new(),
            characters: Vec::new(),
            events,
            rng,
            next_addition_uid: 1,
        }
    }

    fn build_start_room(&mut self) {
        let center = self.grid.bounds().center();
        let reach = self.config.start_room_half_extent + 1;
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let pos = center.offset(dx, dy);
                if let Err(e) = self.set_floor(pos) {
                    log::warn!("start room: {}", e);
                }
            }
        }
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if dx.abs() != reach && dy.abs() != reach {
                    continue;
                }
                let pos = center.offset(dx, dy);
                let wall = Addition::new(AdditionKind::Wall, &self.config);
                if let Err(e) = self.install_addition(pos, wall, true, false) {
                    log::warn!("start room: {}", e);
                }
            }
        }
        log::info!("start room at {} with {} room(s)", center, self.rooms.len());
    }

    /// Advance the simulation: characters first, in spawn order, then every
    /// addition once.
    pub fn update(&mut self, dt: f32) {
        character_system(self, dt);
        addition_system(self, dt);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn bounds(&self) -> GridBounds {
        self.grid.bounds()
    }

    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        self.grid.get(pos)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.grid.iter()
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    // Rooms and navigation

    /// Rooms in creation order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter()
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn room_at(&self, pos: TilePos) -> Option<&Room> {
        self.grid.room_at(pos).and_then(|id| self.rooms.get(id))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_manager(&self) -> &RoomManager {
        &self.rooms
    }

    /// The navigation graph, rebuilt first if anything structural changed
    /// since the last call.
    pub fn graph(&mut self) -> Arc<TileGraph> {
        self.navigation.get(&self.grid, &self.rooms)
    }

    pub fn navigation(&self) -> &NavigationGraph {
        &self.navigation
    }

    pub fn storage(&self) -> &StorageIndex {
        &self.storage
    }

    pub fn job_queue(&self) -> &JobQueue {
        &self.jobs
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    // Characters

    /// Characters in spawn order.
    pub fn characters(&self) -> &[Entity] {
        &self.characters
    }

    pub fn entities(&self) -> &hecs::World {
        &self.ecs
    }

    /// Spawn a character on `pos`. It starts out knowing every job queue
    /// discovered so far.
    pub fn add_character(&mut self, pos: TilePos, stats: Stats) -> Result<Entity, BuildError> {
        if !self.grid.contains(pos) {
            return Err(BuildError::OutOfBounds(pos));
        }
        let priorities = JobPriorities(self.jobs.known_queues().to_vec());
        let entity = self.ecs.spawn((Pawn::new(pos), stats, priorities));
        self.characters.push(entity);
        log::info!("character {:?} added at {}", entity, pos);
        self.emit(SimEvent::CharacterAdded(entity));
        Ok(entity)
    }

    pub fn pawn(&self, character: Entity) -> Option<Pawn> {
        self.ecs.get::<&Pawn>(character).ok().map(|p| (*p).clone())
    }

    pub fn stats(&self, character: Entity) -> Option<Stats> {
        self.ecs.get::<&Stats>(character).ok().map(|s| *s)
    }

    pub fn job_priorities(&self, character: Entity) -> Option<Vec<JobKind>> {
        self.ecs
            .get::<&JobPriorities>(character)
            .ok()
            .map(|p| p.0.clone())
    }

    /// Reorder a character's priorities. The new list must hold exactly the
    /// known queues.
    pub fn set_job_priorities(&mut self, character: Entity, priorities: Vec<JobKind>) -> bool {
        let mut wanted = priorities.clone();
        let mut known = self.jobs.known_queues().to_vec();
        wanted.sort();
        known.sort();
        if wanted != known {
            log::warn!("rejected priorities {:?}: not a permutation of {:?}", priorities, known);
            return false;
        }
        match self.ecs.get::<&mut JobPriorities>(character) {
            Ok(mut current) => {
                current.0 = priorities;
                true
            }
            Err(_) => false,
        }
    }

    /// Replace a character's priorities without checking them (save loading).
    pub(crate) fn restore_job_priorities(&mut self, character: Entity, priorities: Vec<JobKind>) {
        if let Ok(mut current) = self.ecs.get::<&mut JobPriorities>(character) {
            current.0 = priorities;
        }
    }

    /// The first character whose current tile is `pos`.
    pub fn character_at(&self, pos: TilePos) -> Option<Entity> {
        self.characters
            .iter()
            .copied()
            .find(|&c| self.ecs.get::<&Pawn>(c).map(|p| p.curr == pos).unwrap_or(false))
    }

    pub fn is_selected(&self, character: Entity) -> bool {
        self.ecs.get::<&Selected>(character).is_ok()
    }

    pub fn selected_character(&self) -> Option<Entity> {
        self.characters.iter().copied().find(|&c| self.is_selected(c))
    }

    /// Select `character`, deselecting whoever was selected before.
    pub fn select_character(&mut self, character: Entity) -> bool {
        if !self.characters.contains(&character) {
            return false;
        }
        if let Some(previous) = self.selected_character() {
            if previous == character {
                return true;
            }
            self.deselect_character(previous);
        }
        if self.ecs.insert_one(character, Selected).is_err() {
            return false;
        }
        self.emit(SimEvent::CharacterSelectionChanged {
            character,
            selected: true,
        });
        true
    }

    pub fn deselect_character(&mut self, character: Entity) {
        if self.ecs.remove_one::<Selected>(character).is_ok() {
            self.emit(SimEvent::CharacterSelectionChanged {
                character,
                selected: false,
            });
        }
    }

    pub(crate) fn with_pawn<R>(&mut self, character: Entity, f: impl FnOnce(&mut Pawn) -> R) -> Option<R> {
        let mut pawn = self.ecs.get::<&mut Pawn>(character).ok()?;
        Some(f(&mut pawn))
    }

    /// The character currently assigned `job`.
    pub(crate) fn assignee(&self, job: JobId) -> Option<Entity> {
        self.characters
            .iter()
            .copied()
            .find(|&c| self.ecs.get::<&Pawn>(c).map(|p| p.job == Some(job)).unwrap_or(false))
    }

    // Events

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SimEvent) + Send + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Take the logged events, oldest first. The log is bounded by
    /// `event_log_capacity`, so a caller that never drains only loses the
    /// oldest entries.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.pending_len()
    }

    /// Events lost to a full log.
    pub fn dropped_event_count(&self) -> u64 {
        self.events.dropped()
    }

    pub(crate) fn emit(&mut self, event: SimEvent) {
        self.events.publish(event);
    }

    pub(crate) fn next_uid(&mut self) -> u64 {
        let uid = self.next_addition_uid;
        self.next_addition_uid += 1;
        uid
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("bounds", &self.grid.bounds())
            .field("rooms", &self.rooms.len())
            .field("jobs", &self.jobs.len())
            .field("characters", &self.characters.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::components::TileType;

    pub(crate) fn small_config() -> SimConfig {
        SimConfig {
            world_width: 20,
            world_height: 20,
            start_room_half_extent: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_start_room() {
        let world = World::new(small_config());
        assert_eq!(world.room_count(), 1);
        let room = world.rooms().next().unwrap();
        // 7x7 interior inside a ring of walls
        assert_eq!(room.tile_count(), 49);
        assert!(!room.connects_to_space());
        assert!(world.room_manager().verify_partition(world.grid()).is_empty());

        let center = world.bounds().center();
        let corner = world.tile(center.offset(4, 4)).unwrap();
        assert_eq!(corner.tile_type(), TileType::Floor);
        assert!(corner.addition().map(|a| a.is_built()).unwrap_or(false));
        assert!(corner.defines_room_border());
    }

    #[test]
    fn test_add_character_and_selection() {
        let mut world = World::new(small_config());
        let center = world.bounds().center();
        let a = world.add_character(center, Stats::uniform(1.0)).unwrap();
        let b = world.add_character(center.offset(1, 0), Stats::uniform(1.0)).unwrap();
        assert_eq!(world.characters(), &[a, b]);
        assert_eq!(world.character_at(center.offset(1, 0)), Some(b));
        assert!(world.add_character(TilePos::new(-1, 0), Stats::uniform(1.0)).is_err());

        world.drain_events();
        assert!(world.select_character(a));
        assert!(world.select_character(b));
        assert!(!world.is_selected(a));
        assert_eq!(world.selected_character(), Some(b));
        let events = world.drain_events();
        assert_eq!(
            events,
            vec![
                SimEvent::CharacterSelectionChanged { character: a, selected: true },
                SimEvent::CharacterSelectionChanged { character: a, selected: false },
                SimEvent::CharacterSelectionChanged { character: b, selected: true },
            ]
        );
    }

    #[test]
    fn test_graph_is_cached_between_reads() {
        let mut world = World::new(small_config());
        let first = world.graph();
        let second = world.graph();
        assert!(Arc::ptr_eq(&first, &second));
        // Interior plus nothing else: walls are not rooms or doors
        assert_eq!(first.node_count(), 49);
    }
}
