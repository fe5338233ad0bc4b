use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use whalewatch::api::router::create_router;
use whalewatch::bitquery::{BitqueryClient, BitqueryStream};
use whalewatch::config::{AppConfig, ExitMatcherKind};
use whalewatch::db::{self, SqliteWhaleStore, WhaleStore};
use whalewatch::ingestion::pipeline::EntryPipeline;
use whalewatch::ingestion::pool_discovery::run_pool_discovery;
use whalewatch::ingestion::{StreamFilter, Subscription, TradeSource};
use whalewatch::intelligence::LiquidityOracle;
use whalewatch::services::{
    AlertSink, EngineStatus, ExitContext, ExitMatcher, LogSink, Notifier, PerWhaleWatchers,
    Scheduler, SharedSellStream,
};
use whalewatch::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // rustls needs an explicit process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    let metrics_handle = whalewatch::metrics::init_metrics()?;

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    let sqlite_store = Arc::new(SqliteWhaleStore::new(pool));
    let store: Arc<dyn WhaleStore> = sqlite_store.clone();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;
    let oracle: Arc<dyn LiquidityOracle> = Arc::new(BitqueryClient::new(
        http,
        config.bitquery_http_url.clone(),
        config.bitquery_token.clone(),
        config.network.clone(),
    ));
    let source: Arc<dyn TradeSource> = Arc::new(BitqueryStream::new(
        config.bitquery_ws_url.clone(),
        config.bitquery_token.clone(),
        config.network.clone(),
    ));

    let alerts: Arc<dyn AlertSink> = match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => Arc::new(Notifier::new(token.clone(), chat_id.clone())),
        _ => {
            tracing::warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set, alerts go to the log");
            Arc::new(LogSink)
        }
    };

    let status = Arc::new(EngineStatus::default());
    let retry = config.retry_policy();

    // --- Entry pipeline: buy stream → admission → store → alert ---
    let admission = config.admission_policy();
    let entry_subscription = Subscription::new(
        source.clone(),
        StreamFilter::Buys {
            min_usd: admission.entry_floor_usd,
        },
        retry,
    );
    let pipeline = EntryPipeline::new(store.clone(), oracle.clone(), alerts.clone(), admission);
    status.set_entry_stream_alive(true);
    let entry_status = status.clone();
    let entry_task = tokio::spawn(async move { pipeline.run(entry_subscription).await });
    tokio::spawn(async move {
        let outcome = entry_task.await;
        entry_status.set_entry_stream_alive(false);
        match outcome {
            Ok(err) => {
                tracing::error!(error = %err, "Entry pipeline stopped; restart the process to resume")
            }
            Err(e) => tracing::error!(error = %e, "Entry pipeline task failed"),
        }
    });

    // --- Pool discovery ---
    if config.pool_discovery_enabled {
        let subscription = Subscription::new(source.clone(), StreamFilter::NewPools, retry);
        let band = config.liquidity_band;
        let (oracle, alerts, pool_status) = (oracle.clone(), alerts.clone(), status.clone());
        status.set_pool_stream_alive(true);
        let pool_task = tokio::spawn(run_pool_discovery(subscription, oracle, alerts, band));
        tokio::spawn(async move {
            if let Err(e) = pool_task.await {
                tracing::error!(error = %e, "Pool discovery task failed");
            }
            pool_status.set_pool_stream_alive(false);
        });
    } else {
        tracing::info!("Pool discovery disabled (POOL_DISCOVERY_ENABLED=false)");
    }

    // --- Scheduler: exit watches + backup ---
    let exit_ctx = ExitContext {
        store: store.clone(),
        oracle,
        alerts,
        source,
        policy: config.exit_policy(),
        retry,
    };
    let matcher: Box<dyn ExitMatcher> = match config.exit_matcher {
        ExitMatcherKind::PerWhale => Box::new(PerWhaleWatchers::new(exit_ctx)),
        ExitMatcherKind::Shared => Box::new(SharedSellStream::new(exit_ctx)),
    };
    let scheduler = Scheduler::new(
        store,
        matcher,
        Duration::from_secs(config.scheduler_interval_secs),
        config.backup_path.clone(),
        status.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx));

    // --- Operator HTTP surface ---
    let state = AppState {
        store: sqlite_store,
        status,
        metrics_handle,
        api_token: config.api_token.clone(),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = scheduler_task.await;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
