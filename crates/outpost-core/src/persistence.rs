//! Save/Load functionality for persisting simulation state
//!
//! Uses bincode for a compact binary snapshot. Nothing in the snapshot
//! refers to another part by reference: tiles are keyed by position, rooms
//! by the tile they were flooded from, jobs by their destination. Loading
//! rebuilds the world in dependency order and re-derives every link:
//!
//! 1. tiles, additions and floor stacks
//! 2. rooms, flooded from their saved anchors, then their atmosphere
//! 3. characters and their priority lists
//! 4. known job queues, then the queued jobs, each bound again to the
//!    addition or stack on its tile

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

use outpost_logic::atmosphere::RoomAtmosphere;
use outpost_logic::config::{ConfigError, SimConfig};
use outpost_logic::geometry::TilePos;
use outpost_logic::items::ItemStack;
use outpost_logic::skills::Stats;

use crate::components::{Addition, AdditionKind, JobKind, JobTask, TileType};
use crate::world::World;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 2;

/// Serializable snapshot of the simulation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Simulated seconds since start
    pub sim_time: f64,
    pub time_scale: f32,
    pub config: SimConfig,
    /// Every tile that is not plain empty space
    pub tiles: Vec<SavedTile>,
    /// Rooms in creation order
    pub rooms: Vec<SavedRoom>,
    /// Characters in spawn order
    pub characters: Vec<SavedCharacter>,
    /// Job queues in discovery order
    pub job_queues: Vec<JobKind>,
    /// Queued jobs, per queue in queue order
    pub jobs: Vec<SavedJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTile {
    pub pos: TilePos,
    pub tile_type: TileType,
    pub border: bool,
    pub addition: Option<Addition>,
    pub item_stack: Option<ItemStack>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SavedRoom {
    pub anchor: TilePos,
    pub temperature: f32,
    pub oxygen: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCharacter {
    pub pos: TilePos,
    pub stats: Stats,
    pub priorities: Vec<JobKind>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SavedJob {
    pub kind: JobKind,
    pub destination: TilePos,
    /// Haul target container
    pub dropoff: Option<TilePos>,
}

/// Result of loading a simulation
pub struct LoadedSimulation {
    pub world: World,
    pub sim_time: f64,
    pub time_scale: f32,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Saved config rejected: {0}")]
    Config(#[from] ConfigError),
    #[error("Corrupt save: {0}")]
    Corrupt(String),
}

/// Snapshot `world`. Assigned jobs go back to their queues first, so the
/// characters in the save are all idle.
pub fn snapshot(world: &mut World, sim_time: f64, time_scale: f32) -> SaveData {
    world.cancel_active_jobs();

    let tiles = world
        .tiles()
        .filter(|t| t.tile_type() != TileType::Empty || t.addition().is_some() || t.item_stack().is_some())
        .map(|t| SavedTile {
            pos: t.pos(),
            tile_type: t.tile_type(),
            border: t.border,
            addition: t.addition().cloned(),
            item_stack: t.item_stack().cloned(),
        })
        .collect();

    let rooms = world
        .rooms()
        .map(|r| SavedRoom {
            anchor: r.anchor(),
            temperature: r.temperature(),
            oxygen: r.oxygen(),
        })
        .collect();

    let characters = world
        .characters()
        .iter()
        .filter_map(|&c| {
            Some(SavedCharacter {
                pos: world.pawn(c)?.curr,
                stats: world.stats(c)?,
                priorities: world.job_priorities(c).unwrap_or_default(),
            })
        })
        .collect();

    let queue = world.job_queue();
    let jobs = queue
        .known_queues()
        .iter()
        .flat_map(|&kind| queue.queued(kind))
        .filter_map(|id| queue.get(id))
        .map(|job| SavedJob {
            kind: job.kind(),
            destination: job.destination(),
            dropoff: match job.task() {
                JobTask::Haul { dropoff, .. } => Some(*dropoff),
                _ => None,
            },
        })
        .collect();

    SaveData {
        version: SAVE_VERSION,
        sim_time,
        time_scale,
        config: world.config().clone(),
        tiles,
        rooms,
        characters,
        job_queues: queue.known_queues().to_vec(),
        jobs,
    }
}

/// Save the complete simulation to a writer
pub fn save_simulation<W: Write>(writer: W, world: &mut World, sim_time: f64, time_scale: f32) -> Result<(), SaveError> {
    let save_data = snapshot(world, sim_time, time_scale);
    bincode::serialize_into(writer, &save_data)?;
    log::info!(
        "saved {} tiles, {} rooms, {} characters, {} jobs",
        save_data.tiles.len(),
        save_data.rooms.len(),
        save_data.characters.len(),
        save_data.jobs.len()
    );
    Ok(())
}

/// Load a simulation from a reader
pub fn load_simulation<R: Read>(reader: R) -> Result<LoadedSimulation, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;
    restore(save_data)
}

/// Rebuild a world from a snapshot.
pub fn restore(save_data: SaveData) -> Result<LoadedSimulation, SaveError> {
    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }
    save_data.config.validate()?;

    let mut world = World::blank(save_data.config);

    // 1. Tiles
    for saved in &save_data.tiles {
        let tile = world
            .grid
            .get_mut(saved.pos)
            .ok_or_else(|| SaveError::Corrupt(format!("tile {} is outside the world", saved.pos)))?;
        tile.tile_type = saved.tile_type;
        tile.item_stack = saved.item_stack.clone();
    }
    for saved in save_data.tiles {
        if let Some(addition) = saved.addition {
            world
                .install_addition(saved.pos, addition, false, true)
                .map_err(|e| SaveError::Corrupt(e.to_string()))?;
        }
    }

    // 2. Rooms
    let anchors: Vec<TilePos> = save_data.rooms.iter().map(|r| r.anchor).collect();
    let ids = world.rebuild_rooms(&anchors);
    for (saved, id) in save_data.rooms.iter().zip(ids) {
        match id.and_then(|id| world.rooms.get_mut(id)) {
            Some(room) => {
                let vented = room.atmosphere.vented;
                room.atmosphere = RoomAtmosphere {
                    vented,
                    ..RoomAtmosphere::new(saved.temperature, saved.oxygen)
                };
            }
            None => log::warn!("saved room at {} could not be restored", saved.anchor),
        }
    }

    // 3. Characters
    for saved in save_data.characters {
        let character = world
            .add_character(saved.pos, saved.stats)
            .map_err(|e| SaveError::Corrupt(e.to_string()))?;
        world.restore_job_priorities(character, saved.priorities);
    }

    // 4. Jobs
    for kind in save_data.job_queues {
        world.jobs.restore_queue(kind);
    }
    let mut dropped = 0;
    for saved in save_data.jobs {
        if !restore_job(&mut world, saved) {
            dropped += 1;
        }
    }
    if dropped > 0 {
        log::warn!("{} saved job(s) no longer matched their tile and were dropped", dropped);
    }

    world.drain_events();
    log::info!(
        "loaded {} rooms, {} characters, {} jobs",
        world.room_count(),
        world.characters().len(),
        world.job_queue().len()
    );

    Ok(LoadedSimulation {
        world,
        sim_time: save_data.sim_time,
        time_scale: save_data.time_scale,
    })
}

/// Bind a saved job to what its tile holds now and queue it.
fn restore_job(world: &mut World, saved: SavedJob) -> bool {
    let pos = saved.destination;
    let Some(tile) = world.tile(pos) else {
        return false;
    };
    let addition = tile.addition();
    let task = match saved.kind {
        JobKind::Construction => addition
            .filter(|a| !a.is_built() && !a.kind().is_plant())
            .map(|a| (JobTask::Construction { addition: a.uid() }, a.name().to_string())),
        JobKind::Plant => addition
            .filter(|a| !a.is_built() && a.kind().is_plant())
            .map(|a| (JobTask::Plant { addition: a.uid() }, a.name().to_string())),
        JobKind::Harvest => addition
            .filter(|a| a.plant().is_some())
            .map(|a| (JobTask::Harvest { addition: a.uid() }, a.name().to_string())),
        JobKind::Haul => {
            let container = saved.dropoff.and_then(|d| {
                world
                    .tile(d)
                    .and_then(|t| t.addition())
                    .filter(|a| a.kind() == AdditionKind::ItemContainer && a.is_built())
                    .map(|_| d)
            });
            match (tile.item_stack(), container) {
                (Some(stack), Some(dropoff)) => Some((
                    JobTask::Haul {
                        dropoff,
                        carrier: None,
                    },
                    stack.item_type().to_string(),
                )),
                _ => None,
            }
        }
        JobKind::Movement => None,
    };
    let Some((task, subject)) = task else {
        log::warn!("dropping saved {} job on {}", saved.kind, pos);
        return false;
    };
    let id = world.create_job(pos, task, subject);
    world.enqueue_job(id)
}
