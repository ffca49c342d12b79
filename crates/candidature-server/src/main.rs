use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use candidature_server::db::Database;
use candidature_server::notify::Dispatcher;
use candidature_server::{create_router, AppState};
use candidature_store::paths;
use clap::Parser;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "candidature-server",
    version,
    about = "Accepts candidature form submissions over HTTP"
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "CANDIDATURE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config and DATABASE_PATH)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Listen port (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        error!(error = %err, "candidature-server failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config =
        candidature_config::load(cli.config).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = cli.db_path {
        config.database.path = Some(path);
    }

    let db_path = paths::resolve_db_path(config.database.path.as_deref())
        .context("failed to resolve database path")?;
    let db = Database::open(db_path.clone())
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let notifier = Dispatcher::from_config(config.mail.as_ref());
    if config.mail.as_ref().is_some_and(|mail| mail.verify_on_boot) {
        let _ = notifier.verify_in_background();
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let window = Duration::from_secs(config.rate_limit.window_seconds);
    let environment = config.server.environment;
    let state = Arc::new(AppState::new(config, db, notifier)?);

    let housekeeping = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(window);
        loop {
            interval.tick().await;
            housekeeping.prune_rate_limits();
        }
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, db = %db_path.display(), ?environment, "candidature-server listening");

    let service = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("candidature-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
