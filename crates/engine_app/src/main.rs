//! # engine_app
//!
//! Headless driver: builds a world and a scheduler, installs the asteroid
//! field and runs the tick loop until Ctrl-C or the tick limit.
//!
//! ```text
//! RUST_LOG=engine_system=debug engine_app --max-ticks 600 --summary
//! ```

mod asteroids;
mod tick;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_system::{FailurePolicy, Scheduler, SchedulerConfig};
use engine_world::EntityManager;

use asteroids::{AsteroidField, FieldConfig, FieldSummary};
use tick::{RunSummary, TickConfig, TickLoop};

#[derive(Parser)]
#[command(name = "engine_app", about = "Headless ECS driver running an asteroid field")]
struct Args {
    /// Target ticks per second
    #[arg(short, long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Stop after this many ticks (0 = run until Ctrl-C)
    #[arg(short, long, default_value_t = 0)]
    max_ticks: u64,

    /// Number of asteroids to keep alive
    #[arg(short, long, default_value_t = 20)]
    roids: usize,

    /// Shortest asteroid lifetime, in seconds
    #[arg(long, default_value_t = 5.0)]
    min_life: f64,

    /// Longest asteroid lifetime, in seconds
    #[arg(long, default_value_t = 20.0)]
    max_life: f64,

    /// Seed for the asteroid RNG
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads for parallel waves (default: rayon's global pool)
    #[arg(long)]
    threads: Option<usize>,

    /// Run the systems of a wave one after another on the tick thread
    #[arg(long)]
    sequential: bool,

    /// Abort the tick on the first failing system instead of skipping its dependents
    #[arg(long)]
    abort_on_failure: bool,

    /// Print a JSON summary when the loop ends
    #[arg(long)]
    summary: bool,
}

#[derive(Serialize)]
struct Summary {
    run: RunSummary,
    field: FieldSummary,
    entities_created: u64,
    entities_alive: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        args.min_life > 0.0 && args.max_life >= args.min_life,
        "asteroid lifetime range {}..{} is empty or not positive",
        args.min_life,
        args.max_life
    );

    let failure_policy = if args.abort_on_failure {
        FailurePolicy::AbortTick
    } else {
        FailurePolicy::SkipDependents
    };
    let mut scheduler_config = SchedulerConfig::new()
        .with_parallel(!args.sequential)
        .with_failure_policy(failure_policy);
    if let Some(threads) = args.threads {
        scheduler_config = scheduler_config.with_threads(threads);
    }
    let scheduler = Arc::new(Scheduler::with_config(scheduler_config)?);
    let tick_config = TickConfig::default()
        .with_tick_rate(args.tick_rate)
        .with_max_ticks(args.max_ticks);
    let tick_loop = TickLoop::new(tick_config, Arc::clone(&scheduler))?;
    let world = Arc::new(EntityManager::new());

    let field_config = FieldConfig::default()
        .with_population(args.roids)
        .with_lifetime(args.min_life, args.max_life)
        .with_seed(args.seed);
    let field = AsteroidField::install(&world, &scheduler, field_config)
        .context("failed to install the asteroid field")?;

    info!(
        systems = scheduler.len(),
        waves = scheduler.plan().len(),
        roids = args.roids,
        parallel = scheduler.config().parallel,
        threads = ?scheduler.config().threads,
        kinematics = %field.types.kinematics,
        lifetime = %field.types.lifetime,
        "engine starting"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                shutdown.store(true, Ordering::Release);
            }
        });
    }

    let run = {
        let shutdown = Arc::clone(&shutdown);
        tokio::task::spawn_blocking(move || tick_loop.run(&shutdown))
            .await
            .context("tick loop panicked")?
    };

    let summary = Summary {
        run,
        field: field.stats.summary(),
        entities_created: world.created_count(),
        entities_alive: world.entity_count(),
    };
    info!(
        ticks = summary.run.ticks,
        spawned = summary.field.spawned,
        destroyed = summary.field.destroyed,
        "engine shut down"
    );
    if args.summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
