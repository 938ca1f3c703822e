use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hwgw::config::Config;
use hwgw::formulas::{FixedRateFormulas, FormulaSource, GameFormulas};
use hwgw::manager::BatchManager;
use hwgw::models::BatchRole;
use hwgw::sim::{SimulatedHost, WorldSnapshot};
use hwgw::timing::TimingCoordinator;

#[derive(Parser)]
#[command(
    name = "hwgw",
    version,
    about = "Overlapping hack/weaken/grow/weaken batch scheduler",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the prep/batch loop against a simulated world
    Run {
        /// Target to batch against
        #[arg(short, long)]
        target: String,

        /// Acting host
        #[arg(long, default_value = "home")]
        host: String,

        /// World snapshot (JSON)
        #[arg(short, long)]
        world: PathBuf,

        /// Formula set used by the simulated runtime
        #[arg(long, value_enum, default_value = "game")]
        formulas: FormulaKind,

        /// Maximum extra start delay per dispatch, in milliseconds
        #[arg(long, default_value = "0")]
        jitter_ms: u64,

        /// Seed for the jitter generator
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Stop after this many seconds instead of running until interrupted
        #[arg(long)]
        for_secs: Option<u64>,
    },

    /// Plan one batch and print it without dispatching anything
    Plan {
        /// Target to plan against
        #[arg(short, long)]
        target: String,

        /// Acting host
        #[arg(long, default_value = "home")]
        host: String,

        /// World snapshot (JSON)
        #[arg(short, long)]
        world: PathBuf,

        /// Formula set used for planning
        #[arg(long, value_enum, default_value = "game")]
        formulas: FormulaKind,

        /// Print the plan and schedule as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormulaKind {
    /// The game's published formulas
    Game,
    /// Constant per-thread rates
    Fixed,
}

impl FormulaKind {
    fn source(self) -> Arc<dyn FormulaSource> {
        match self {
            Self::Game => Arc::new(GameFormulas),
            Self::Fixed => Arc::new(FixedRateFormulas::default()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(format, &config.logging.level, cli.verbose)?;

    tracing::info!("hwgw starting");

    match cli.command {
        Commands::Run {
            target,
            host,
            world,
            formulas,
            jitter_ms,
            seed,
            for_secs,
        } => {
            tracing::info!(
                target_name = %target,
                host = %host,
                world = %world.display(),
                jitter_ms,
                "Starting run command"
            );
            run(config, target, host, world, formulas, jitter_ms, seed, for_secs).await?;
        }

        Commands::Plan {
            target,
            host,
            world,
            formulas,
            json,
        } => {
            plan(config, target, host, world, formulas, json).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("hwgw=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("hwgw={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn load_world(
    path: &std::path::Path,
    formulas: FormulaKind,
    config: &Config,
) -> Result<SimulatedHost> {
    let world = WorldSnapshot::from_file(path)?;
    tracing::debug!(
        targets = world.targets.len(),
        hosts = world.hosts.len(),
        "World snapshot loaded"
    );
    Ok(SimulatedHost::new(world, Some(formulas.source())).with_costs(config.capacity.script_costs))
}

#[allow(clippy::too_many_arguments)]
async fn run(
    config: Config,
    target: String,
    host: String,
    world: PathBuf,
    formulas: FormulaKind,
    jitter_ms: u64,
    seed: u64,
    for_secs: Option<u64>,
) -> Result<()> {
    let sim = Arc::new(
        load_world(&world, formulas, &config)?.with_jitter(Duration::from_millis(jitter_ms), seed),
    );

    let mut manager = BatchManager::start(sim.clone(), &target, &host, config).await?;

    let limit = async {
        match for_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = manager.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping manager");
        }
        _ = limit => {
            tracing::info!("Run time elapsed, stopping manager");
        }
    }

    let status = manager.status();
    let stats = sim.stats().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    println!(
        "dispatched: {}  rejected: {}  completed: {}",
        stats.dispatched, stats.rejected, stats.completed
    );
    print!("{}", manager.metrics().render());

    Ok(())
}

async fn plan(
    config: Config,
    target: String,
    host: String,
    world: PathBuf,
    formulas: FormulaKind,
    json: bool,
) -> Result<()> {
    let sim = load_world(&world, formulas, &config)?;
    let plan = hwgw::plan_once(&sim, &target, &host, &config).await?;
    let schedule = TimingCoordinator::new(config.spacing()).schedule_plan(&plan);

    if json {
        let output = serde_json::json!({ "plan": plan, "schedule": schedule });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Batch plan for {}", plan.target);
    println!(
        "  Extract: {}% ({:.4} of max value)",
        plan.extract_percent, plan.extract_fraction
    );
    println!("  Total RAM: {}", plan.total_ram());
    for role in BatchRole::ALL {
        let op = plan.operation(role);
        println!(
            "  {:<12} threads={:<6} ram={:<12} duration={:>9.3}s delay={:>9.3}s",
            role.as_str(),
            op.threads,
            op.ram().to_string(),
            op.duration.as_secs_f64(),
            schedule.delay(role).as_secs_f64()
        );
    }
    println!("  Makespan: {:.3}s", schedule.makespan().as_secs_f64());

    Ok(())
}
