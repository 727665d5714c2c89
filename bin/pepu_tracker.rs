use std::sync::Arc;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use pepu_tracker::{
    run_server, AppState, BatchPriceFetcher, BlockscoutClient, CronScheduler, CronSettings,
    GeckoTerminalClient, HistoryService, PortfolioService, PostgresClient, QuoteCache,
    RpcChainClient, Settings, SnapshotStore,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .context("Failed to initialize logger")?;

    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    let network = &settings.network;

    // Upstream clients, shared by every request and the snapshot job
    let explorer = Arc::new(
        BlockscoutClient::new(&network.explorer_url, network.http_timeout())
            .context("Failed to build explorer client")?,
    );
    let price_index = Arc::new(
        GeckoTerminalClient::new(
            &network.price_index_url,
            &network.network_id,
            &network.native_network_id,
            &network.native_token,
            network.http_timeout(),
        )
        .context("Failed to build price index client")?,
    );
    let chain = Arc::new(
        RpcChainClient::new(&network.rpc_url, network.rpc_timeout())
            .context("Failed to build RPC client")?,
    );

    let cache = Arc::new(QuoteCache::from_settings(&settings.cache));
    let fetcher = BatchPriceFetcher::new(price_index, cache, &settings.fetcher);

    let portfolio = Arc::new(
        PortfolioService::new(
            explorer,
            chain,
            fetcher,
            &settings.contracts,
            &settings.fetcher,
        )
        .context("Invalid contract configuration")?,
    );

    let postgres = PostgresClient::new(settings.postgres.clone())
        .await
        .context("Failed to initialize database connection")?;
    postgres
        .migrate()
        .await
        .context("Failed to apply PostgreSQL schema")?;
    let store: Arc<dyn SnapshotStore> = Arc::new(postgres);

    let history = Arc::new(HistoryService::new(
        portfolio.clone(),
        store.clone(),
        settings.history.clone(),
    ));

    run_tracker(settings, portfolio, history, store).await
}

async fn run_tracker(
    settings: Arc<Settings>,
    portfolio: Arc<PortfolioService>,
    history: Arc<HistoryService>,
    store: Arc<dyn SnapshotStore>,
) -> anyhow::Result<()> {
    let cancellation_token = CancellationToken::new();

    // Create and spawn cron scheduler for wallet snapshots
    let cron_scheduler = CronScheduler::new(
        portfolio.clone(),
        store,
        CronSettings::from(&settings.history),
    );

    let cron_token = cancellation_token.child_token();
    let cron_handle = tokio::spawn(async move {
        if let Err(e) = cron_scheduler.run(cron_token).await {
            error!("Cron scheduler failed: {:#}", e);
        }
    });

    info!("Cron scheduler started - tracked wallets will be snapshotted periodically");

    let state = AppState::from((portfolio, history));
    let server_token = cancellation_token.child_token();
    let server_settings = settings.server.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = run_server(&server_settings, state, server_token).await {
            error!("HTTP server failed: {:#}", e);
        }
    });

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    // Set up graceful shutdown signal handler
    info!("Tracker running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    info!("Finishing all tasks...");

    cancellation_token.cancel();

    info!("Waiting for HTTP server to stop...");
    let _ = server_handle.await;

    info!("Waiting for cron scheduler to stop...");
    let _ = cron_handle.await;

    info!("Tracker stopped");
    Ok(())
}
