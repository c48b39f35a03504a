//! Addition system - per-tick behaviour of installed additions
//!
//! Every addition indexed by a room is updated once per tick, rooms in
//! creation order. A door shared by two rooms is still updated only once.
//!
//! - Doors exchange air between the rooms they connect (fully while under
//!   construction, in proportion to their openness once built), open while
//!   someone asks to pass and close again after lingering.
//! - Built plants grow and queue a single harvest job when fully grown.
//! - Built oxygen generators feed their room.

use std::collections::HashSet;

use outpost_logic::atmosphere::{exchange, ExchangeSide};
use outpost_logic::geometry::TilePos;

use crate::components::{AdditionKind, AdditionState};
use crate::events::SimEvent;
use crate::world::World;

pub fn addition_system(world: &mut World, delta_seconds: f32) {
    let mut seen = HashSet::new();
    let positions: Vec<TilePos> = world
        .rooms
        .iter()
        .flat_map(|room| room.addition_positions())
        .filter(|pos| seen.insert(*pos))
        .collect();

    for pos in positions {
        let kind = world.grid.get(pos).and_then(|t| t.addition()).map(|a| a.kind());
        match kind {
            Some(AdditionKind::Door) => update_door(world, pos, delta_seconds),
            Some(AdditionKind::Plant(_)) => update_plant(world, pos, delta_seconds),
            Some(AdditionKind::OxygenGenerator) => update_generator(world, pos, delta_seconds),
            _ => {}
        }
    }
}

fn update_door(world: &mut World, pos: TilePos, dt: f32) {
    let Some(addition) = world.grid.get(pos).and_then(|t| t.addition()) else {
        return;
    };
    let built = addition.is_built();
    let connection = if built { addition.progress() } else { 1.0 };
    if let Some(sides) = addition.door().and_then(|d| d.sides) {
        exchange_air(world, sides, connection, dt);
    }
    if !built {
        return;
    }

    let Some(addition) = world.grid.get_mut(pos).and_then(|t| t.addition.as_mut()) else {
        return;
    };
    let before = addition.progress();
    let mut progress = before;
    if let Some(door) = addition.door_mut() {
        if door.open_timer > 0.0 {
            door.open_timer = (door.open_timer - dt).max(0.0);
        }
        if door.entering {
            progress = (progress + dt * door.open_speed).min(1.0);
            if progress >= 1.0 {
                door.entering = false;
                door.open_timer = door.linger_seconds;
            }
        } else if door.open_timer <= 0.0 && progress > 0.0 {
            progress = (progress - dt * door.open_speed).max(0.0);
        }
    }
    if progress == before {
        return;
    }
    addition.set_progress(progress);
    let render_state = addition.render_state();
    world.emit(SimEvent::AdditionWorkDone { pos, render_state });
}

/// Trade oxygen and heat between the rooms on either side of a door.
fn exchange_air(world: &mut World, (a, b): (TilePos, TilePos), connection: f32, dt: f32) {
    let (Some(ra), Some(rb)) = (world.grid.room_at(a), world.grid.room_at(b)) else {
        return;
    };
    if ra == rb {
        return;
    }
    let (Some(room_a), Some(room_b)) = (world.rooms.get(ra), world.rooms.get(rb)) else {
        return;
    };
    let (mut atmo_a, tiles_a) = (room_a.atmosphere, room_a.tile_count());
    let (mut atmo_b, tiles_b) = (room_b.atmosphere, room_b.tile_count());
    exchange(
        ExchangeSide {
            atmosphere: &mut atmo_a,
            tiles: tiles_a,
        },
        ExchangeSide {
            atmosphere: &mut atmo_b,
            tiles: tiles_b,
        },
        connection,
        dt,
    );
    if let Some(room) = world.rooms.get_mut(ra) {
        room.atmosphere = atmo_a;
    }
    if let Some(room) = world.rooms.get_mut(rb) {
        room.atmosphere = atmo_b;
    }
}

fn update_plant(world: &mut World, pos: TilePos, dt: f32) {
    let Some(addition) = world.grid.get_mut(pos).and_then(|t| t.addition.as_mut()) else {
        return;
    };
    if !addition.is_built() {
        return;
    }

    if addition.progress() >= 1.0 {
        let newly_grown = match addition.plant_mut() {
            Some(plant) if !plant.harvest_queued && plant.harvest_cooldown > 0.0 => {
                plant.harvest_cooldown -= dt;
                false
            }
            Some(plant) if !plant.harvest_queued => {
                plant.harvest_queued = true;
                true
            }
            _ => false,
        };
        if newly_grown {
            log::debug!("{} on {} is ready for harvest", addition.name(), pos);
            world.queue_harvest(pos);
        }
        return;
    }

    let Some(growth_speed) = addition.plant().map(|p| p.growth_speed) else {
        return;
    };
    let stage = addition.growth_stage();
    addition.set_progress(addition.progress() + growth_speed * dt);
    if addition.growth_stage() != stage {
        let render_state = addition.render_state();
        world.emit(SimEvent::AdditionWorkDone { pos, render_state });
    }
}

fn update_generator(world: &mut World, pos: TilePos, dt: f32) {
    let Some(addition) = world.grid.get(pos).and_then(|t| t.addition()) else {
        return;
    };
    if !addition.is_built() {
        return;
    }
    let AdditionState::OxygenGenerator(generator) = addition.state() else {
        return;
    };
    let (rate, max) = (generator.oxygen_per_second, generator.max_oxygen);
    let Some(room) = world.grid.room_at(pos) else {
        return;
    };
    if let Some(room) = world.rooms.get_mut(room) {
        room.add_oxygen(rate * dt, max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Addition, Crop, JobKind};
    use crate::world::tests::small_config;

    fn world() -> World {
        World::new(small_config())
    }

    fn plant_tomato(world: &mut World, pos: TilePos, built: bool) {
        let soil = Addition::new(AdditionKind::Soil, world.config());
        world.install_addition(pos, soil, true, false).unwrap();
        let tomato = Addition::new(AdditionKind::Plant(Crop::Tomato), world.config());
        world.install_addition(pos, tomato, built, false).unwrap();
    }

    /// Wall across the middle row with a door in the centre.
    fn door_world(door_built: bool) -> (World, TilePos) {
        let mut w = world();
        let c = w.bounds().center();
        for dx in -3..=3 {
            let wall = Addition::new(AdditionKind::Wall, w.config());
            w.install_addition(c.offset(dx, 0), wall, true, false).unwrap();
        }
        let door = Addition::new(AdditionKind::Door, w.config());
        w.install_addition(c, door, door_built, false).unwrap();
        (w, c)
    }

    fn set_oxygen(world: &mut World, pos: TilePos, oxygen: f32) {
        if let Some(id) = world.grid.room_at(pos) {
            if let Some(room) = world.rooms.get_mut(id) {
                room.atmosphere.oxygen = oxygen;
            }
        }
    }

    #[test]
    fn test_grown_plant_queues_one_harvest() {
        let mut w = world();
        let c = w.bounds().center();
        plant_tomato(&mut w, c, true);
        if let Some(a) = w.grid.get_mut(c).and_then(|t| t.addition.as_mut()) {
            a.set_progress(1.0);
        }
        addition_system(&mut w, 0.1);
        addition_system(&mut w, 0.1);
        assert_eq!(w.job_queue().queued(JobKind::Harvest).len(), 1);
        assert!(w.tile(c).unwrap().addition().unwrap().plant().unwrap().harvest_queued);
    }

    #[test]
    fn test_growth_stage_change_fires_work_done() {
        let mut w = world();
        let c = w.bounds().center();
        plant_tomato(&mut w, c, true);
        if let Some(a) = w.grid.get_mut(c).and_then(|t| t.addition.as_mut()) {
            a.set_progress(0.2);
        }
        w.drain_events();

        // 0.2 -> 0.22 stays in stage 0
        addition_system(&mut w, 0.1);
        assert!(w.drain_events().is_empty());
        // 0.22 -> 0.32 crosses into stage 1
        addition_system(&mut w, 0.5);
        let events = w.drain_events();
        assert_eq!(
            events,
            vec![SimEvent::AdditionWorkDone {
                pos: c,
                render_state: "Tomato_1".to_string()
            }]
        );
    }

    #[test]
    fn test_unbuilt_plant_does_not_grow() {
        let mut w = world();
        let c = w.bounds().center();
        plant_tomato(&mut w, c, false);
        addition_system(&mut w, 1.0);
        assert_eq!(w.tile(c).unwrap().addition().unwrap().progress(), 0.0);
    }

    #[test]
    fn test_generator_feeds_its_room() {
        let mut w = world();
        let c = w.bounds().center();
        let generator = Addition::new(AdditionKind::OxygenGenerator, w.config());
        w.install_addition(c, generator, true, false).unwrap();
        addition_system(&mut w, 1.0);
        let room = w.room_at(c).unwrap();
        let expected = w.config().oxygen_generator.oxygen_per_second / room.tile_count() as f32;
        assert!((room.oxygen() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_unbuilt_door_exchanges_fully() {
        let (mut w, c) = door_world(false);
        let (north, south) = (c.offset(0, 1), c.offset(0, -1));
        set_oxygen(&mut w, north, 1.0);
        let total_before = w.room_at(north).unwrap().oxygen() * 21.0 + w.room_at(south).unwrap().oxygen() * 21.0;

        addition_system(&mut w, 1.0);
        let (n, s) = (w.room_at(north).unwrap().oxygen(), w.room_at(south).unwrap().oxygen());
        assert!(n < 1.0 && s > 0.0);
        assert!((n * 21.0 + s * 21.0 - total_before).abs() < 1e-4);
    }

    #[test]
    fn test_closed_door_blocks_air() {
        let (mut w, c) = door_world(true);
        set_oxygen(&mut w, c.offset(0, 1), 1.0);
        addition_system(&mut w, 1.0);
        assert_eq!(w.room_at(c.offset(0, -1)).unwrap().oxygen(), 0.0);
    }

    #[test]
    fn test_door_opens_lingers_and_closes() {
        let (mut w, c) = door_world(true);
        assert!(!w.grid.get_mut(c).unwrap().request_entry());

        // Three seconds to open at the default speed
        for _ in 0..3 {
            addition_system(&mut w, 1.0);
        }
        let door = w.tile(c).unwrap().addition().unwrap();
        assert_eq!(door.progress(), 1.0);
        assert_eq!(door.render_state(), "Door_3");
        assert!(w.grid.get_mut(c).unwrap().request_entry());

        // Nobody asks any more: linger, then close
        for _ in 0..6 {
            addition_system(&mut w, 1.0);
        }
        assert_eq!(w.tile(c).unwrap().addition().unwrap().progress(), 0.0);
    }
}
