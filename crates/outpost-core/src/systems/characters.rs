//! Character system - job pickup, path following and work, once per tick

use hecs::Entity;

use outpost_logic::geometry::TilePos;
use outpost_logic::pathfinding::find_path;

use crate::components::{JobId, Pawn, Stats};
use crate::events::SimEvent;
use crate::world::World;

/// Run every character once, in spawn order.
pub fn character_system(world: &mut World, delta_seconds: f32) {
    // Collect first: each update borrows the whole world
    let characters = world.characters.clone();
    for character in characters {
        update_character(world, character, delta_seconds);
    }
}

fn update_character(world: &mut World, character: Entity, dt: f32) {
    let Some(pawn) = world.pawn(character) else {
        return;
    };

    let Some(id) = pawn.job else {
        // Finish the step in progress before taking new work
        if pawn.curr != pawn.next {
            step(world, character, dt);
            return;
        }
        let priorities = world.job_priorities(character).unwrap_or_default();
        if let Some(id) = world.jobs.request(&priorities) {
            world.assign_job(character, id);
        }
        return;
    };

    let Some(job) = world.job(id) else {
        log::warn!("{:?} held missing {}, going idle", character, id);
        world.with_pawn(character, |p| {
            p.job = None;
            p.job_reached = false;
            p.path = None;
        });
        return;
    };
    let destination = job.destination();
    let stand_on = job.stand_on_destination();
    let skill = job.skill();

    if !pawn.job_reached {
        let radius = world.config.work_radius;
        if !has_reached(&pawn, destination, stand_on, radius) {
            travel(world, character, id, dt);
            return;
        }
        world.with_pawn(character, |p| p.job_reached = true);
    }

    let xp_divisor = world.config.xp_divisor;
    let work = match world.ecs.get::<&mut Stats>(character) {
        Ok(mut stats) => stats.practice(skill, dt, xp_divisor),
        Err(_) => return,
    };
    world.do_job_work(character, id, work);
}

/// Standing still and close enough to work: on the tile itself for jobs
/// that demand it, otherwise within the work radius.
fn has_reached(pawn: &Pawn, destination: TilePos, stand_on: bool, radius: f32) -> bool {
    if pawn.curr != pawn.next {
        return false;
    }
    if stand_on {
        pawn.curr == destination
    } else {
        pawn.curr.distance(destination) < radius
    }
}

/// Follow the path toward the job, computing it first if needed. A job
/// whose destination cannot be reached is deleted.
fn travel(world: &mut World, character: Entity, id: JobId, dt: f32) {
    let Some(pawn) = world.pawn(character) else {
        return;
    };

    if pawn.curr == pawn.next {
        let mut path = match pawn.path {
            Some(path) => path,
            None => {
                let graph = world.graph();
                match find_path(&graph, pawn.curr, pawn.dest) {
                    Some(path) => path,
                    None => {
                        log::info!("{:?} cannot reach {} for {}, deleting it", character, pawn.dest, id);
                        world.delete_job(id);
                        return;
                    }
                }
            }
        };
        // Paths start on the tile the pawn stands on
        while path.peek() == Some(pawn.curr) {
            path.dequeue_next_tile();
        }
        let Some(next) = path.dequeue_next_tile() else {
            log::info!("{:?} ran out of path to {} for {}, deleting it", character, pawn.dest, id);
            world.delete_job(id);
            return;
        };
        world.with_pawn(character, |p| {
            p.next = next;
            p.path = Some(path);
        });
    }

    step(world, character, dt);
}

/// Advance toward `next`. A tile that refuses entry (a closed door) holds
/// the pawn in place this tick.
fn step(world: &mut World, character: Entity, dt: f32) {
    let Some(pawn) = world.pawn(character) else {
        return;
    };
    if pawn.curr == pawn.next {
        return;
    }
    let enterable = world
        .grid
        .get_mut(pawn.next)
        .map(|tile| tile.request_entry())
        .unwrap_or(false);
    if !enterable {
        return;
    }

    let speed = world.stats(character).map(|s| s.speed).unwrap_or(0.0);
    let position = world.with_pawn(character, |p| {
        p.progress += dt * speed;
        if p.progress >= 1.0 {
            p.curr = p.next;
            p.progress = 0.0;
        }
        p.position()
    });
    if let Some((x, y)) = position {
        world.emit(SimEvent::CharacterPositionChanged { character, x, y });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Addition, AdditionKind, JobKind};
    use crate::world::tests::small_config;

    fn world_with_character(at: (i32, i32)) -> (World, Entity, TilePos) {
        let mut world = World::new(small_config());
        let c = world.bounds().center();
        let character = world
            .add_character(c.offset(at.0, at.1), Stats::uniform(1.0))
            .unwrap();
        (world, character, c)
    }

    #[test]
    fn test_idle_character_takes_queued_job() {
        let (mut w, ch, c) = world_with_character((0, 0));
        let id = w.build(c.offset(1, 0), AdditionKind::Soil).unwrap();
        character_system(&mut w, 0.1);
        assert_eq!(w.pawn(ch).unwrap().job, Some(id));
        assert!(!w.job_queue().is_queued(id));
    }

    #[test]
    fn test_walks_then_builds() {
        let (mut w, ch, c) = world_with_character((0, 0));
        let site = c.offset(3, 3);
        w.build(site, AdditionKind::Soil).unwrap();

        for _ in 0..100 {
            w.update(0.1);
        }
        let soil = w.tile(site).unwrap().addition().unwrap();
        assert!(soil.is_built());
        let pawn = w.pawn(ch).unwrap();
        assert!(pawn.is_idle());
        // Worked from within reach, not from the tile itself
        assert!(pawn.curr.distance(site) < w.config().work_radius);
        assert_ne!(pawn.curr, c);
        assert!(w.jobs_at(site).is_empty());
    }

    #[test]
    fn test_experience_from_work() {
        let (mut w, ch, c) = world_with_character((0, 0));
        w.build(c.offset(1, 0), AdditionKind::Soil).unwrap();
        for _ in 0..5 {
            w.update(0.1);
        }
        let stats = w.stats(ch).unwrap();
        assert!(stats.construction > 1.0);
        assert_eq!(stats.planting, 1.0);
    }

    #[test]
    fn test_unreachable_job_is_deleted() {
        let (mut w, ch, c) = world_with_character((0, 0));
        // A floor island outside the start room
        let island = TilePos::new(1, 1);
        w.set_floor(island).unwrap();
        let id = w.build(island, AdditionKind::Soil).unwrap();
        assert!(c.distance(island) > w.config().work_radius);

        w.update(0.1);
        assert_eq!(w.pawn(ch).unwrap().job, Some(id));
        w.update(0.1);
        assert!(w.job(id).is_none());
        assert!(w.pawn(ch).unwrap().is_idle());
        assert!(w.tile(island).unwrap().addition().is_none());
    }

    #[test]
    fn test_closed_door_holds_character() {
        let (mut w, ch, c) = world_with_character((0, -2));
        for dx in -3..=3 {
            let wall = Addition::new(AdditionKind::Wall, w.config());
            w.install_addition(c.offset(dx, 0), wall, true, false).unwrap();
        }
        let door = Addition::new(AdditionKind::Door, w.config());
        w.install_addition(c, door, true, false).unwrap();

        let target = c.offset(0, 2);
        let id = w.move_character_to(ch, target).unwrap();
        assert_eq!(w.job(id).unwrap().kind(), JobKind::Movement);

        // One step to the door, then waiting for it to open
        for _ in 0..15 {
            w.update(0.1);
        }
        let pawn = w.pawn(ch).unwrap();
        assert_eq!(pawn.curr, c.offset(0, -1));
        assert_eq!(pawn.next, c);
        assert_eq!(pawn.progress, 0.0);
        assert!(w.tile(c).unwrap().addition().unwrap().progress() > 0.0);

        for _ in 0..100 {
            w.update(0.1);
        }
        let pawn = w.pawn(ch).unwrap();
        assert_eq!(pawn.curr, target);
        assert!(pawn.is_idle());
        assert!(w.job(id).is_none());
    }

    #[test]
    fn test_idle_character_finishes_step() {
        let (mut w, ch, c) = world_with_character((0, 0));
        w.with_pawn(ch, |p| {
            p.next = c.offset(1, 0);
            p.progress = 0.5;
        });
        w.update(0.6);
        let pawn = w.pawn(ch).unwrap();
        assert_eq!(pawn.curr, c.offset(1, 0));
        assert_eq!(pawn.progress, 0.0);
    }

    #[test]
    fn test_position_events_while_walking() {
        let (mut w, ch, c) = world_with_character((0, 0));
        w.move_character_to(ch, c.offset(2, 0));
        w.drain_events();
        w.update(0.5);
        let moved = w
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SimEvent::CharacterPositionChanged { character, .. } if *character == ch))
            .count();
        assert_eq!(moved, 1);
        assert_eq!(w.pawn(ch).unwrap().position(), (c.x as f32 + 0.5, c.y as f32));
    }
}
