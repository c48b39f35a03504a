//! Simulation engine - main entry point for running the simulation

use hecs::Entity;

use outpost_logic::config::{ConfigError, SimConfig};
use outpost_logic::skills::Stats;

use crate::persistence::{load_simulation, save_simulation, SaveError};
use crate::world::World;

/// Main simulation engine
pub struct SimulationEngine {
    /// Tiles, rooms, jobs and characters
    pub world: World,
    /// Simulated seconds since start
    pub sim_time: f64,

    // Configuration
    time_scale: f32,
}

impl SimulationEngine {
    /// Create a simulation with the start room, after validating `config`
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_world(World::new(config)))
    }

    /// Wrap an already built world
    pub fn with_world(world: World) -> Self {
        Self {
            world,
            sim_time: 0.0,
            time_scale: 1.0,
        }
    }

    /// Spawn `count` colonists with baseline skills in the middle of the map
    pub fn spawn_colonists(&mut self, count: usize) -> Vec<Entity> {
        let center = self.world.bounds().center();
        let offsets = [(0, 0), (1, 0), (0, 1), (-1, 0), (0, -1), (1, 1), (-1, -1), (1, -1), (-1, 1)];
        (0..count)
            .filter_map(|i| {
                let (dx, dy) = offsets[i % offsets.len()];
                match self.world.add_character(center.offset(dx, dy), Stats::uniform(1.0)) {
                    Ok(character) => Some(character),
                    Err(e) => {
                        log::warn!("colonist {} not spawned: {}", i, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Update the simulation by delta_seconds
    pub fn update(&mut self, delta_seconds: f32) {
        let scaled_delta = delta_seconds * self.time_scale;
        if scaled_delta <= 0.0 {
            return;
        }
        self.sim_time += scaled_delta as f64;
        self.world.update(scaled_delta);
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, 0.0 = paused)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Get current time scale
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Get current simulation time in seconds
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn character_count(&self) -> usize {
        self.world.characters().len()
    }

    pub fn room_count(&self) -> usize {
        self.world.room_count()
    }

    /// Live jobs, queued or assigned
    pub fn job_count(&self) -> usize {
        self.world.job_queue().len()
    }

    /// Save simulation state to a writer. Jobs in progress are handed back
    /// to their queues first.
    pub fn save<W: std::io::Write>(&mut self, writer: W) -> Result<(), SaveError> {
        save_simulation(writer, &mut self.world, self.sim_time, self.time_scale)
    }

    /// Load simulation state from a reader
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let loaded = load_simulation(reader)?;
        self.world = loaded.world;
        self.sim_time = loaded.sim_time;
        self.time_scale = loaded.time_scale;
        Ok(())
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::with_world(World::new(SimConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::AdditionKind;

    #[test]
    fn test_engine_creation() {
        let engine = SimulationEngine::default();
        assert_eq!(engine.character_count(), 0);
        assert_eq!(engine.room_count(), 1);
        assert_eq!(engine.sim_time(), 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            world_width: 0,
            ..Default::default()
        };
        assert!(SimulationEngine::new(config).is_err());
    }

    #[test]
    fn test_colonists_build() {
        let mut engine = SimulationEngine::default();
        engine.spawn_colonists(3);
        assert_eq!(engine.character_count(), 3);

        let center = engine.world.bounds().center();
        let sites = [center.offset(2, 2), center.offset(-2, 2), center.offset(2, -2)];
        for site in sites {
            engine.world.build(site, AdditionKind::Soil).unwrap();
        }
        // 1 simulated minute
        for _ in 0..600 {
            engine.update(0.1);
        }
        for site in sites {
            assert!(engine.world.tile(site).unwrap().addition().unwrap().is_built());
        }
        assert_eq!(engine.job_count(), 0);
    }

    #[test]
    fn test_time_scale() {
        let mut engine = SimulationEngine::default();
        engine.set_time_scale(2.0);
        engine.update(1.0); // 1 real second = 2 sim seconds
        assert!((engine.sim_time() - 2.0).abs() < 0.0001);

        engine.set_time_scale(-1.0);
        assert_eq!(engine.time_scale(), 0.0);
        engine.update(1.0);
        assert!((engine.sim_time() - 2.0).abs() < 0.0001);
    }

    #[test]
    fn test_engine_save_load() {
        let mut engine = SimulationEngine::default();
        engine.spawn_colonists(2);
        engine.update(0.5);

        let mut buffer = Vec::new();
        engine.save(&mut buffer).expect("Save failed");

        let mut loaded = SimulationEngine::default();
        loaded.load(&buffer[..]).expect("Load failed");
        assert_eq!(loaded.character_count(), 2);
        assert_eq!(loaded.room_count(), engine.room_count());
        assert!((loaded.sim_time() - 0.5).abs() < 1e-6);
    }
}
