//! Fixed base values for tile additions.
//!
//! Movement cost is a multiplier on the tile's own cost once the addition is
//! fully built: 0 blocks the tile, 1 leaves it unchanged and anything in
//! between makes it cheaper to cross. Construction cost is the amount of work
//! needed to raise build progress from 0 to 1.
//!
//! Values that designers rebalance (crop growth, generator output, door speed)
//! live in [`crate::config::SimConfig`] instead.

/// Movement cost multiplier of a built addition.
pub mod movement_cost {
    pub const WALL: f32 = 0.0;
    pub const DOOR: f32 = 1.0;
    pub const SOIL: f32 = 0.75;
    pub const PLANT: f32 = 0.5;
    pub const OXYGEN_GENERATOR: f32 = 0.0;
    pub const ITEM_CONTAINER: f32 = 1.0;
}

/// Work required to finish an addition.
pub mod construction_cost {
    pub const WALL: f32 = 2.0;
    pub const DOOR: f32 = 1.0;
    pub const SOIL: f32 = 1.0;
    pub const OXYGEN_GENERATOR: f32 = 2.0;
    pub const ITEM_CONTAINER: f32 = 1.0;
}

/// Display and render-state names.
pub mod names {
    pub const WALL: &str = "Wall";
    pub const DOOR: &str = "Door";
    pub const SOIL: &str = "Soil";
    pub const TOMATO: &str = "Tomato";
    pub const OXYGEN_GENERATOR: &str = "OxygenGenerator";
    pub const ITEM_CONTAINER: &str = "Chest";
}

/// Openness thresholds for the door render states `Door_1`..`Door_3`.
pub const DOOR_STAGE_THRESHOLDS: [f32; 3] = [0.33, 0.66, 1.0];

/// Base movement cost of a floor tile; empty tiles cost 0.
pub const FLOOR_MOVEMENT_COST: f32 = 1.0;
