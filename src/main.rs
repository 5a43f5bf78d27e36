use std::sync::Arc;

use tracing::{error, info};

use feedwatch::config::Config;
use feedwatch::db::{bootstrap_users, Database};
use feedwatch::feed::{FeedFetcher, SyncEngine, SyncScheduler, SyncSettings};
use feedwatch::web::WebServer;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = feedwatch::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        feedwatch::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> feedwatch::Result<()> {
    config.validate()?;

    info!("feedwatch starting");

    let db = Database::open(&config.database.path).await?;
    let created = bootstrap_users(&db, &config.bootstrap.users).await?;
    info!(created, "Bootstrap users ensured");

    let fetcher = FeedFetcher::new(&config.sync)?;
    let engine = Arc::new(SyncEngine::new(
        db.clone(),
        Arc::new(fetcher),
        SyncSettings::from(&config.sync),
    ));

    let scheduler = if config.sync.enabled {
        Some(SyncScheduler::new(engine.clone(), config.sync.interval()).spawn())
    } else {
        info!("Periodic sync disabled");
        None
    };

    let server = WebServer::new(&config.web, db, engine)?;
    let served = server.run(shutdown_signal()).await;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    served?;
    info!("feedwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
