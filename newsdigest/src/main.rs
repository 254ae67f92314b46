/*
newsdigest - single-binary main.rs
Loads configuration, prepares the database and serves the HTTP API until shutdown.
*/

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use common::{init_db_pool, run_migrations, Config};
use newsdigest::server;

#[derive(Parser, Debug)]
#[command(name = "newsdigest", about = "Personalized news digest API server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // .env is optional; secrets usually come from the real environment
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    if dotenv_loaded {
        info!("loaded environment from .env");
    }

    let default_path = PathBuf::from("config.default.toml");
    let override_path = match args.config {
        Some(p) if !p.exists() => {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p) => Some(p),
        None => Some(PathBuf::from("config.toml")).filter(|p| p.exists()),
    };

    let config = match Config::load_with_defaults(
        Some(default_path.as_path()).filter(|p| p.exists()),
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %format!("{:#}", e), "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let db_path = config.database.path.clone();
    let pool = match init_db_pool(&db_path).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %format!("{:#}", e), %db_path, "failed to initialize database pool");
            return Err(e);
        }
    };
    if let Err(e) = run_migrations(&pool).await {
        error!(error = %format!("{:#}", e), "failed to run database migrations");
        pool.close().await;
        return Err(e);
    }
    info!(%db_path, "database ready");

    let result = server::serve(&config, pool.clone()).await;

    pool.close().await;
    match &result {
        Ok(()) => info!("Shutdown complete"),
        Err(e) => error!(error = %format!("{:#}", e), "server stopped with an error"),
    }
    result
}

