// src/main.rs
//! Botcore demo
//!
//! Spawns two factions of bots in an in-memory arena and runs a fixed
//! number of ticks through the simulation core: publish and dispatch,
//! then drain and apply.

use anyhow::{Context, Result};
use botcore_engine::observability::{init_metrics, init_tracing, render_metrics};
use botcore_engine::snapshot::Position;
use botcore_engine::world::{stock_behaviors, ArenaWorld};
use botcore_engine::{BuildInfo, CoreConfig, SimulationCore};
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const BOTS_PER_FACTION: usize = 250;
const TICKS: u64 = 200;
const TICK_DELTA: f32 = 0.05;
const ARENA_SIZE: f32 = 120.0;

fn main() -> Result<()> {
    // Load configuration first: it decides how logging is set up
    let config = CoreConfig::load().context("loading configuration")?;

    init_tracing(&config.observability)?;
    init_metrics(&config.observability)?;

    let build = BuildInfo::current();
    info!(
        "Starting botcore v{} ({}, built {} with {})",
        build.version, build.git_hash, build.build_timestamp, build.rustc_version
    );
    debug!("Configuration: {:?}", config);

    let (mut core, token) = SimulationCore::new(config).context("creating simulation core")?;

    let mut world = ArenaWorld::new();
    let mut rng = rand::thread_rng();
    for faction in 0..2u32 {
        for _ in 0..BOTS_PER_FACTION {
            let position = Position::new(
                rng.gen_range(0.0..ARENA_SIZE),
                rng.gen_range(0.0..ARENA_SIZE),
                0.0,
            );
            let bot = world.spawn_agent(position, faction);
            core.register_agent(bot, stock_behaviors())?;
        }
    }
    info!(
        "Spawned {} bots on {} workers",
        world.len(),
        core.worker_count()
    );

    let started = Instant::now();
    let mut skipped = 0u64;
    for _ in 0..TICKS {
        let dispatch = core.build_snapshot_and_dispatch(&token, &world, TICK_DELTA)?;
        if dispatch.was_skipped() {
            skipped += 1;
        }

        // Give decisions a moment; stragglers simply land next tick
        core.wait_for_decisions(Duration::from_millis(20));

        let drain = core.drain_and_apply_configured(&token, &mut world)?;
        if drain.failed > 0 || drain.dropped.total() > 0 {
            debug!(
                "Tick {}: {} applied, {} dropped, {} failed",
                dispatch.tick,
                drain.applied,
                drain.dropped.total(),
                drain.failed
            );
        }
    }
    let elapsed = started.elapsed();

    let alive = world.iter().filter(|e| e.is_alive()).count();
    let stats = core.stats();
    info!(
        "Ran {} ticks in {:.2?} ({} skipped): {} of {} bots alive",
        TICKS,
        elapsed,
        skipped,
        alive,
        world.len()
    );
    info!("Arena mutations: {}", serde_json::to_string(&world.counters())?);
    info!("Core stats: {}", serde_json::to_string(&stats)?);
    if stats.pool.panicked > 0 {
        warn!("{} decision tasks panicked", stats.pool.panicked);
    }

    core.shutdown();

    if let Some(rendered) = render_metrics() {
        debug!("Final metrics:\n{}", rendered);
    }
    Ok(())
}
