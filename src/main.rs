use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use waypoint_follower::adapters::inbound::OperatorConsole;
use waypoint_follower::adapters::outbound::{
    init_combined_logger, init_tracing_logger, FileEventJournal, SimulatedNavigation,
    SimulationSettings,
};
use waypoint_follower::application::WaypointFollowingService;
use waypoint_follower::common::EventJournal;
use waypoint_follower::domains::waypoint_following::GoalClient;
use waypoint_follower::Config;

/// Follows an ordered route of waypoints through a navigation service,
/// driven from stdin.
#[derive(Parser, Debug)]
#[command(name = "waypoint-follower", version, about)]
struct Args {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Route to start following immediately (.toml or .json)
    #[arg(short, long)]
    waypoints: Option<PathBuf>,

    /// Append controller events to this JSON Lines file
    #[arg(short, long)]
    journal: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("installing tracing subscriber")?;

    let logger = match &config.logging.file {
        Some(path) => init_combined_logger(path, config.logging.level_filter()),
        None => init_tracing_logger(),
    };

    let client: Arc<dyn GoalClient> = Arc::new(SimulatedNavigation::new(SimulationSettings::from(
        &config.simulation,
    )));
    let journal = args
        .journal
        .map(|path| Arc::new(FileEventJournal::new(path)) as Arc<dyn EventJournal>);

    let service = Arc::new(WaypointFollowingService::from_config(
        &config,
        client,
        logger.clone(),
        journal,
    )?);
    logger.info("Waypoint follower started; type 'help' for commands");

    let mut status = service.surface().subscribe();
    let status_task = tokio::spawn(async move {
        let mut last_state = status.borrow().state;
        while status.changed().await.is_ok() {
            let report = status.borrow_and_update().clone();
            if report.state != last_state {
                info!("{}", report.summary());
                last_state = report.state;
            }
        }
    });

    if let Some(path) = &args.waypoints {
        if let Err(e) = service.start_from_file(path).await {
            error!("Initial route {} not started: {}", path.display(), e);
        }
    }

    let console = OperatorConsole::new(service.clone());
    let mut console_task = tokio::spawn(async move {
        console
            .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for Ctrl-C")?;
            info!("Interrupted, cancelling the route");
        }
        finished = &mut console_task => {
            match finished {
                Ok(Ok(())) => info!("Operator console closed"),
                Ok(Err(e)) => warn!("Operator console failed: {}", e),
                Err(e) => warn!("Operator console task failed: {}", e),
            }
        }
    }
    console_task.abort();
    let _ = console_task.await;

    let bound = Duration::from_secs_f64(config.follower.cancel_timeout_secs) + Duration::from_secs(1);
    match service.cancel_and_wait(bound).await {
        Ok(report) => info!("Stopped: {}", report.summary()),
        Err(e) => warn!("Route did not wind down cleanly: {}", e),
    }

    match Arc::try_unwrap(service) {
        Ok(service) => service.shutdown().await?,
        Err(service) => service.surface().shutdown().await?,
    }
    status_task.abort();

    // A blocked stdin read keeps the runtime from shutting down.
    std::process::exit(0)
}
