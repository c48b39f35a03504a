//! Outpost Core - Colony Simulation Engine
//!
//! A tile-based simulation of a small space colony: pawns build walls, doors
//! and planters, tend crops and haul the harvest into storage while rooms
//! keep track of their air.
//!
//! # Architecture
//!
//! - **World**: the tile arena and everything indexed by it. Tiles are keyed
//!   by position, rooms and jobs by id, characters are `hecs` entities.
//! - **Components**: plain data (tiles, additions, jobs, pawn state)
//! - **Systems**: per-tick logic (characters, additions) and the
//!   bookkeeping structures they drive (rooms, navigation graph, job queue,
//!   storage index)
//! - **Events**: every visible change is published on an event bus for
//!   renderers and UI
//!
//! # Example
//!
//! ```rust,no_run
//! use outpost_core::prelude::*;
//!
//! let mut engine = SimulationEngine::default();
//! engine.spawn_colonists(3);
//!
//! let center = engine.world.bounds().center();
//! engine.world.build(center.offset(2, 0), AdditionKind::Soil).ok();
//!
//! // Run simulation
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//! }
//! ```

pub mod components;
pub mod engine;
pub mod error;
pub mod events;
pub mod persistence;
pub mod systems;
pub mod world;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::SimulationEngine;
    pub use crate::error::BuildError;
    pub use crate::events::SimEvent;
    pub use crate::world::World;
    pub use outpost_logic::config::SimConfig;
    pub use outpost_logic::geometry::TilePos;
}
