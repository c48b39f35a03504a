//! Pure simulation logic for Outpost.
//!
//! This crate holds the parts of the colony simulation that need no world
//! state: grid geometry, the A* search over a tile graph, atmosphere mixing,
//! skill progression, item stacks and configuration. Functions take plain
//! data and return results, so everything here is unit-testable without
//! building a world.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`atmosphere`] | Per-room oxygen/temperature, running-average blend, door exchange |
//! | [`config`] | `SimConfig` tunables, JSON loading and validation |
//! | [`constants`] | Base movement and construction costs of additions |
//! | [`geometry`] | Tile positions, directions, neighbourhoods, world bounds |
//! | [`items`] | Items and stack merging |
//! | [`pathfinding`] | Weighted tile graph and A* search |
//! | [`skills`] | Pawn skill levels, work output and experience gain |

pub mod atmosphere;
pub mod config;
pub mod constants;
pub mod geometry;
pub mod items;
pub mod pathfinding;
pub mod skills;
