use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use postguard::{
    AppConfig, AppContext, BanSweeper, DryRunSurface, Ledger, LedgerPool, MemoryLedger,
    SystemClock, TitleMirror,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {e}");
        eprintln!("Please check POSTGUARD_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting postguard moderation service");

    let ledger: Arc<dyn Ledger> = if config.database.postgres_enabled {
        let pool = LedgerPool::connect(
            &config.database.postgres_url,
            config.database.max_connections,
        )
        .await?;
        pool.init_schema().await?;
        info!("Postgres ledger initialized");
        Arc::new(pool)
    } else {
        info!("Postgres disabled, using in-memory ledger");
        Arc::new(MemoryLedger::new())
    };

    // No transport adapter is wired in this binary; outbound calls go to a
    // logging stand-in so the background loops still run.
    let ctx = AppContext::new(
        ledger,
        Arc::new(DryRunSurface::new()),
        Arc::new(SystemClock),
        config.targets,
    );

    if config.targets.moderation_chat.is_none() {
        info!("Moderation chat unset; submissions will be refused until configured");
    }
    if config.targets.publication_channel.is_none() {
        info!("Publication channel unset; accepts will be refused until configured");
    }

    let sweeper_ctx = ctx.clone();
    tokio::spawn(async move {
        BanSweeper::new(sweeper_ctx).run().await;
    });

    let mirror_ctx = ctx.clone();
    tokio::spawn(async move {
        TitleMirror::new(mirror_ctx).run().await;
    });

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {bind_addr}: {e}"))?;
    info!("Health endpoint listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {e}"))?;
    Ok(())
}
