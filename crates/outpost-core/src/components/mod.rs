//! Component definitions for the simulation.
//!
//! Components are plain data: tiles and their additions, jobs, and the
//! per-character components stored in the `hecs` world. Cross-entity
//! behaviour lives in systems and in the `World` methods.

mod addition;
mod job;
mod pawn;
mod tile;

pub use addition::*;
pub use job::*;
pub use pawn::*;
pub use tile::*;
