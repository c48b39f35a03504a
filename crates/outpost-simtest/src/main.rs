//! Outpost Headless Simulation Harness
//!
//! Builds small colonies in-process and checks rooms, air, pathing, the job
//! queue, the full farming loop and save/load end-to-end. No renderer.
//!
//! Usage:
//!   cargo run -p outpost-simtest
//!   cargo run -p outpost-simtest -- --verbose
//!   cargo run -p outpost-simtest -- --config my_config.json --json

use std::io::Cursor;
use std::time::Instant;

use outpost_core::prelude::*;
use outpost_core::systems::JobQueue;
use outpost_logic::config::ConfigError;
use outpost_logic::items::{Item, ItemStack};
use outpost_logic::pathfinding::find_path;
use serde::Serialize;

const TICK: f32 = 0.1;

// ── Test harness ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    config: &'a SimConfig,
    passed: usize,
    failed: usize,
    elapsed_ms: u128,
    results: &'a [TestResult],
}

struct Options {
    verbose: bool,
    json: bool,
    config_path: Option<String>,
}

fn parse_args() -> Options {
    let mut options = Options {
        verbose: false,
        json: false,
        config_path: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--verbose" | "-v" => options.verbose = true,
            "--json" => options.json = true,
            "--config" => options.config_path = args.next(),
            other => eprintln!("ignoring unknown argument {}", other),
        }
    }
    options
}

fn load_config(path: Option<&str>) -> Result<SimConfig, String> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
    SimConfig::from_json_str(&text).map_err(|e: ConfigError| format!("{}: {}", path, e))
}

fn main() {
    let options = parse_args();
    println!("=== Outpost Simulation Harness ===\n");

    let config = match load_config(options.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config rejected: {}", e);
            std::process::exit(2);
        }
    };

    let started = Instant::now();
    let mut results = Vec::new();

    // 1. Configuration
    results.extend(validate_config(&config, options.verbose));

    // 2. Room partition under walls and doors
    results.extend(validate_rooms(&config, options.verbose));

    // 3. Oxygen generation and door exchange
    results.extend(validate_atmosphere(&config, options.verbose));

    // 4. Navigation graph and A*
    results.extend(validate_pathfinding(&config, options.verbose));

    // 5. Job queue ordering and lazy deletion
    results.extend(validate_job_queue(&config, options.verbose));

    // 6. Build → plant → harvest → haul
    results.extend(validate_colony_loop(&config, options.verbose));

    // 7. Save and load
    results.extend(validate_persistence(&config, options.verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || options.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if options.json {
        let report = Report {
            config: &config,
            passed,
            failed,
            elapsed_ms: started.elapsed().as_millis(),
            results: &results,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("report not serialised: {}", e),
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Scenario helpers ────────────────────────────────────────────────────

/// Wall off the start room along row `dy` from its center, fully built.
fn wall_row(world: &mut World, dy: i32) {
    let half = world.config().start_room_half_extent;
    let c = world.bounds().center();
    for dx in -half..=half {
        let wall = Addition::new(AdditionKind::Wall, world.config());
        if let Err(e) = world.install_addition(c.offset(dx, dy), wall, true, false) {
            println!("    wall at {} refused: {}", c.offset(dx, dy), e);
        }
    }
}

fn partition_problems(world: &World) -> Vec<String> {
    world.room_manager().verify_partition(world.grid())
}

fn run(world: &mut World, seconds: f32) {
    let ticks = (seconds / TICK).round() as usize;
    for _ in 0..ticks {
        world.update(TICK);
    }
}

/// Total oxygen quantity (level × tiles) over every room.
fn total_oxygen(world: &World) -> f32 {
    world
        .rooms()
        .map(|r| r.oxygen() * r.tile_count() as f32)
        .sum()
}

fn is_built(world: &World, pos: TilePos) -> bool {
    world
        .tile(pos)
        .and_then(|t| t.addition())
        .map(|a| a.is_built())
        .unwrap_or(false)
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_config(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let valid = config.validate();
    results.push(TestResult::new(
        "config_valid",
        valid.is_ok(),
        match &valid {
            Ok(()) => format!(
                "{}x{} world, start room half extent {}",
                config.world_width, config.world_height, config.start_room_half_extent
            ),
            Err(e) => e.to_string(),
        },
    ));

    let roundtrip = config
        .to_json_string()
        .and_then(|json| SimConfig::from_json_str(&json));
    results.push(TestResult::new(
        "config_json_roundtrip",
        matches!(&roundtrip, Ok(back) if back == config),
        "to_json_string → from_json_str keeps every field",
    ));
    if verbose {
        if let Ok(json) = config.to_json_string() {
            println!("    {}", json.replace('\n', "\n    "));
        }
    }

    results
}

// ── 2. Rooms ────────────────────────────────────────────────────────────

fn validate_rooms(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Rooms ---");
    let mut results = Vec::new();
    let mut world = World::new(config.clone());
    let side = (2 * config.start_room_half_extent + 1) as usize;
    let c = world.bounds().center();

    results.push(TestResult::new(
        "rooms_start_room",
        world.room_count() == 1 && world.room_at(c).map(|r| r.tile_count()) == Some(side * side),
        format!("1 room of {} tiles", side * side),
    ));

    wall_row(&mut world, 0);
    let tiles: usize = world.rooms().map(|r| r.tile_count()).sum();
    results.push(TestResult::new(
        "rooms_split_by_wall",
        world.room_count() == 2 && tiles == side * side - side,
        format!("{} rooms, {} tiles", world.room_count(), tiles),
    ));

    let door = c.offset(1, 0);
    let installed = world
        .install_addition(door, Addition::new(AdditionKind::Door, world.config()), true, false)
        .is_ok();
    let listed = world.rooms().filter(|r| r.doors().any(|d| d == door)).count();
    results.push(TestResult::new(
        "rooms_door_keeps_split",
        installed && world.room_count() == 2 && listed == 2,
        format!("door listed by {} rooms", listed),
    ));

    world.remove_addition(c);
    results.push(TestResult::new(
        "rooms_merge_on_removal",
        world.room_count() == 1,
        format!("{} room(s) after opening the wall", world.room_count()),
    ));

    let problems = partition_problems(&world);
    if verbose {
        for p in &problems {
            println!("    {}", p);
        }
    }
    results.push(TestResult::new(
        "rooms_partition",
        problems.is_empty(),
        format!("{} partition violations", problems.len()),
    ));

    results
}

// ── 3. Atmosphere ───────────────────────────────────────────────────────

fn validate_atmosphere(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Atmosphere ---");
    let mut results = Vec::new();
    let mut world = World::new(config.clone());
    let c = world.bounds().center();
    let half = config.start_room_half_extent;
    wall_row(&mut world, 0);

    let generator = c.offset(0, -half);
    let placed = world
        .install_addition(
            generator,
            Addition::new(AdditionKind::OxygenGenerator, world.config()),
            true,
            false,
        )
        .is_ok();
    run(&mut world, 2.0);
    let fed = world.room_at(generator).map(|r| r.oxygen()).unwrap_or(0.0);
    let sealed = world.room_at(c.offset(0, half)).map(|r| r.oxygen()).unwrap_or(-1.0);
    results.push(TestResult::new(
        "air_generator_feeds_room",
        placed && fed > 0.0 && sealed == 0.0,
        format!("fed room {:.3}, sealed room {:.3}", fed, sealed),
    ));

    // An unbuilt door leaks fully
    let before = total_oxygen(&world);
    let door_placed = world
        .install_addition(c, Addition::new(AdditionKind::Door, world.config()), false, false)
        .is_ok();
    run(&mut world, 2.0);
    let leaked = world.room_at(c.offset(0, half)).map(|r| r.oxygen()).unwrap_or(0.0);
    let produced = config.oxygen_generator.oxygen_per_second * 2.0;
    let after = total_oxygen(&world);
    if verbose {
        println!("    oxygen total {:.3} → {:.3} (generator added at most {:.3})", before, after, produced);
    }
    results.push(TestResult::new(
        "air_door_exchange",
        door_placed && leaked > 0.0,
        format!("neighbour room reached {:.3}", leaked),
    ));
    results.push(TestResult::new(
        "air_exchange_conserves",
        after > before && after <= before + produced + 1e-3,
        format!("{:.3} → {:.3}", before, after),
    ));

    results
}

// ── 4. Pathfinding ──────────────────────────────────────────────────────

fn validate_pathfinding(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Pathfinding ---");
    let mut results = Vec::new();
    let mut world = World::new(config.clone());
    let c = world.bounds().center();
    let half = config.start_room_half_extent;

    let graph = world.graph();
    let side = (2 * half + 1) as usize;
    results.push(TestResult::new(
        "path_graph_covers_room",
        graph.node_count() == side * side,
        format!("{} nodes, {} edges", graph.node_count(), graph.edge_count()),
    ));
    let cached = std::sync::Arc::ptr_eq(&graph, &world.graph());
    results.push(TestResult::new(
        "path_graph_cached",
        cached,
        "no rebuild without a structural change",
    ));

    wall_row(&mut world, 0);
    let (north, south) = (c.offset(-half, -half), c.offset(half, half));
    let blocked = find_path(&world.graph(), north, south).is_none();
    results.push(TestResult::new(
        "path_wall_blocks",
        blocked,
        format!("{} → {} unreachable", north, south),
    ));

    let door = c.offset(-half, 0);
    let _ = world.install_addition(door, Addition::new(AdditionKind::Door, world.config()), true, false);
    let path = find_path(&world.graph(), north, south);
    let through_door = path.as_ref().map(|p| p.tiles().any(|t| t == door)).unwrap_or(false);
    if verbose {
        if let Some(p) = &path {
            println!("    {} tiles, cost {:.2}", p.len(), p.total_cost());
        }
    }
    results.push(TestResult::new(
        "path_through_door",
        through_door,
        format!("{} → {} via {}", north, south, door),
    ));

    let rebuilds = world.navigation().rebuild_count();
    results.push(TestResult::new(
        "path_lazy_rebuilds",
        rebuilds <= 3,
        format!("{} graph builds for 2 structural edits", rebuilds),
    ));

    results
}

// ── 5. Job queue ────────────────────────────────────────────────────────

fn validate_job_queue(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Job Queue ---");
    let mut results = Vec::new();
    let mut world = World::new(config.clone());
    let c = world.bounds().center();

    let ids: Vec<JobId> = (0..3)
        .filter_map(|i| world.build(c.offset(i - 1, 2), AdditionKind::Soil).ok())
        .collect();
    let queue: &JobQueue = world.job_queue();
    results.push(TestResult::new(
        "queue_fifo",
        queue.queued(JobKind::Construction) == ids,
        format!("{} construction jobs in order", ids.len()),
    ));

    let deleted = ids.get(1).copied().map(|id| world.delete_job(id)).unwrap_or(false);
    let remaining = world.job_queue().queued(JobKind::Construction);
    results.push(TestResult::new(
        "queue_lazy_delete",
        deleted && remaining.len() == 2 && !remaining.contains(&ids[1]),
        format!("{} left after deleting the middle job", remaining.len()),
    ));

    let worker = world.add_character(c, Stats::uniform(1.0));
    let priorities = worker.as_ref().ok().and_then(|&w| world.job_priorities(w));
    results.push(TestResult::new(
        "queue_new_character_learns_kinds",
        priorities.as_deref() == Some(&[JobKind::Construction][..]),
        format!("{:?}", priorities),
    ));

    if let Ok(worker) = worker {
        world.update(TICK);
        let assigned = world.pawn(worker).and_then(|p| p.job);
        results.push(TestResult::new(
            "queue_oldest_job_first",
            assigned == ids.first().copied(),
            format!("assigned {:?}", assigned),
        ));
        if verbose {
            if let Some(title) = assigned.and_then(|id| world.job_title(id)) {
                println!("    working on {}", title);
            }
        }
    }

    results
}

// ── 6. Colony loop ──────────────────────────────────────────────────────

fn validate_colony_loop(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Colony Loop ---");
    let mut results = Vec::new();
    let mut engine = SimulationEngine::with_world(World::new(config.clone()));
    let colonists = engine.spawn_colonists(2);
    let c = engine.world.bounds().center();
    let chest = c.offset(2, 0);
    let beds = [c.offset(-2, 1), c.offset(-2, -1)];

    let _ = engine.world.build(chest, AdditionKind::ItemContainer);
    for bed in beds {
        let _ = engine.world.build(bed, AdditionKind::Soil);
    }

    let mut ticks = 0;
    while ticks < 600 && !(is_built(&engine.world, chest) && beds.iter().all(|&b| is_built(&engine.world, b))) {
        engine.update(TICK);
        ticks += 1;
    }
    results.push(TestResult::new(
        "colony_construction",
        engine.job_count() == 0 && engine.world.storage().contains(chest),
        format!("{} colonists finished 3 sites in {:.1}s", colonists.len(), ticks as f32 * TICK),
    ));

    for bed in beds {
        let _ = engine.world.build(bed, AdditionKind::Plant(Crop::Tomato));
    }
    let stored = |world: &World| {
        world
            .tile(chest)
            .and_then(|t| t.addition())
            .and_then(|a| a.container())
            .map(|s| s.item_count(outpost_logic::items::TOMATO))
            .unwrap_or(0)
    };
    let start = engine.sim_time();
    while engine.sim_time() - start < 300.0 && stored(&engine.world) == 0 {
        engine.update(TICK);
    }
    let count = stored(&engine.world);
    results.push(TestResult::new(
        "colony_harvest_stored",
        count > 0,
        format!("{} tomatoes in the chest after {:.1}s", count, engine.sim_time() - start),
    ));

    let problems = partition_problems(&engine.world);
    results.push(TestResult::new(
        "colony_partition",
        problems.is_empty(),
        format!("{} partition violations", problems.len()),
    ));

    if verbose {
        for job in engine.world.job_queue().iter() {
            println!("    live job: {}", job.title());
        }
    }

    results
}

// ── 7. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();
    let mut engine = SimulationEngine::with_world(World::new(config.clone()));
    let c = engine.world.bounds().center();
    wall_row(&mut engine.world, -2);
    let _ = engine.world.install_addition(
        c.offset(0, -2),
        Addition::new(AdditionKind::Door, engine.world.config()),
        true,
        false,
    );
    engine.spawn_colonists(2);
    let _ = engine.world.build(c.offset(2, 2), AdditionKind::Soil);
    let _ = engine.world.build(c.offset(-2, 2), AdditionKind::Wall);
    engine
        .world
        .add_item_stack(c.offset(1, 3), ItemStack::with_count(&Item::tomato(config.tomato.max_stack_size), 3));
    for _ in 0..5 {
        engine.update(TICK);
    }

    let mut buffer = Vec::new();
    let saved = engine.save(&mut buffer);
    results.push(TestResult::new(
        "save_writes",
        saved.is_ok() && !buffer.is_empty(),
        match &saved {
            Ok(()) => format!("{} bytes", buffer.len()),
            Err(e) => e.to_string(),
        },
    ));

    let mut loaded = SimulationEngine::default();
    let load = loaded.load(Cursor::new(&buffer));
    results.push(TestResult::new(
        "load_reads",
        load.is_ok(),
        match &load {
            Ok(()) => "snapshot restored".to_string(),
            Err(e) => e.to_string(),
        },
    ));

    let same_shape = loaded.room_count() == engine.room_count()
        && loaded.character_count() == engine.character_count()
        && loaded.job_count() == engine.job_count();
    results.push(TestResult::new(
        "load_same_shape",
        same_shape,
        format!(
            "rooms {}/{}, characters {}/{}, jobs {}/{}",
            loaded.room_count(),
            engine.room_count(),
            loaded.character_count(),
            engine.character_count(),
            loaded.job_count(),
            engine.job_count()
        ),
    ));

    let stack = loaded
        .world
        .tile(c.offset(1, 3))
        .and_then(|t| t.item_stack())
        .map(|s| s.count());
    results.push(TestResult::new(
        "load_keeps_items",
        stack == Some(3),
        format!("{:?} tomatoes on the floor", stack),
    ));

    for _ in 0..600 {
        loaded.update(TICK);
    }
    let finished = is_built(&loaded.world, c.offset(2, 2)) && is_built(&loaded.world, c.offset(-2, 2));
    if verbose {
        println!("    {} live jobs after resuming", loaded.job_count());
    }
    results.push(TestResult::new(
        "load_resumes_work",
        finished,
        "restored jobs get finished",
    ));

    results
}
