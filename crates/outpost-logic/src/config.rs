//! Tunable simulation parameters.
//!
//! Everything a designer might want to rebalance lives in [`SimConfig`]:
//! world size, door timings, generator output, crop yields, container size
//! and skill progression. The struct deserializes from JSON with every field
//! optional (missing fields fall back to [`Default`]) and must pass
//! [`SimConfig::validate`] before a world is built from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Door behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorConfig {
    /// Openness gained or lost per second (1/3 = three seconds to open).
    pub open_speed: f32,
    /// Seconds a fully open door stays open before it may start closing.
    pub linger_seconds: f32,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            open_speed: 1.0 / 3.0,
            linger_seconds: 1.0,
        }
    }
}

/// Oxygen generator output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub oxygen_per_second: f32,
    /// The generator stops raising a room above this level.
    pub max_oxygen: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            oxygen_per_second: 5.0,
            max_oxygen: 20.0,
        }
    }
}

/// A harvestable crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Work needed to plant it.
    pub construction_cost: f32,
    /// Growth progress gained per second once planted.
    pub growth_speed: f32,
    /// Number of visual growth stages.
    pub growth_stages: u32,
    /// Harvest progress gained per unit of work.
    pub harvest_speed: f32,
    /// Seconds a grown plant waits before offering a harvest again after
    /// the previous one was dropped.
    pub harvest_retry_delay: f32,
    pub min_yield: u32,
    pub max_yield: u32,
    pub max_stack_size: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            construction_cost: 0.5,
            growth_speed: 0.2,
            growth_stages: 4,
            harvest_speed: 0.2,
            harvest_retry_delay: 5.0,
            min_yield: 1,
            max_yield: 5,
            max_stack_size: 10,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub world_width: i32,
    pub world_height: i32,
    /// Half side length of the walled room every new world starts with.
    pub start_room_half_extent: i32,
    /// Seed for harvest yields.
    pub seed: u64,
    /// How close a pawn must get to a job that does not require standing on
    /// its destination tile.
    pub work_radius: f32,
    /// Experience per second of work is `1 / (level * xp_divisor)`.
    pub xp_divisor: f32,
    /// Item stacks a container can hold.
    pub container_capacity: usize,
    /// Events kept for pull-style consumers between drains; 0 keeps none.
    pub event_log_capacity: usize,
    pub door: DoorConfig,
    pub oxygen_generator: GeneratorConfig,
    pub tomato: CropConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world_width: 50,
            world_height: 50,
            start_room_half_extent: 5,
            seed: 42,
            work_radius: 2.0,
            xp_divisor: 60.0,
            container_capacity: 4,
            event_log_capacity: 4096,
            door: DoorConfig::default(),
            oxygen_generator: GeneratorConfig::default(),
            tomato: CropConfig::default(),
        }
    }
}

/// Why a configuration was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("world size {width}x{height} must be positive")]
    WorldSize { width: i32, height: i32 },
    #[error("start room half extent {half_extent} does not fit a {width}x{height} world")]
    StartRoom {
        half_extent: i32,
        width: i32,
        height: i32,
    },
    #[error("crop yield bounds are inverted: min {min} > max {max}")]
    YieldBounds { min: u32, max: u32 },
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },
}

impl SimConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_width <= 0 || self.world_height <= 0 {
            return Err(ConfigError::WorldSize {
                width: self.world_width,
                height: self.world_height,
            });
        }
        // The start room ring must stay inside the world with one tile spare
        let needed = 2 * self.start_room_half_extent + 3;
        if self.start_room_half_extent < 1
            || needed > self.world_width
            || needed > self.world_height
        {
            return Err(ConfigError::StartRoom {
                half_extent: self.start_room_half_extent,
                width: self.world_width,
                height: self.world_height,
            });
        }
        if self.tomato.min_yield > self.tomato.max_yield {
            return Err(ConfigError::YieldBounds {
                min: self.tomato.min_yield,
                max: self.tomato.max_yield,
            });
        }

        let positive = [
            ("work_radius", self.work_radius),
            ("xp_divisor", self.xp_divisor),
            ("door.open_speed", self.door.open_speed),
            ("oxygen_generator.oxygen_per_second", self.oxygen_generator.oxygen_per_second),
            ("tomato.construction_cost", self.tomato.construction_cost),
            ("tomato.growth_speed", self.tomato.growth_speed),
            ("tomato.harvest_speed", self.tomato.harvest_speed),
        ];
        for (field, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        let delay = self.tomato.harvest_retry_delay;
        if delay < 0.0 || !delay.is_finite() {
            return Err(ConfigError::Negative {
                field: "tomato.harvest_retry_delay",
                value: delay,
            });
        }
        if self.tomato.growth_stages == 0 {
            return Err(ConfigError::NonPositive {
                field: "tomato.growth_stages",
                value: 0.0,
            });
        }
        Ok(())
    }
}
