use anyhow::Context;
use clap::Parser;
use scanbot::api::{BinanceClient, NotificationSink, TelegramClient};
use scanbot::chart::SvgChartRenderer;
use scanbot::config::Settings;
use scanbot::notify::{LogSink, Notifier};
use scanbot::scanner::ScanOrchestrator;
use scanbot::strategy::ConfluenceStrategy;
use scanbot::subscribers::{AdminPolicy, CommandHandler, RecipientId, SubscriberRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

const COMMAND_RETRY_SECS: u64 = 5;

#[derive(Parser, Debug)]
#[command(name = "scanbot", version, about = "Binance scanner with Telegram signal alerts")]
struct Cli {
    /// Settings file (defaults to ./scanbot.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single scan cycle, wait for deliveries, then exit
    #[arg(long)]
    once: bool,

    /// Log notifications instead of sending them; no command polling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let validation = if cli.dry_run {
        settings.validate_scanner()
    } else {
        settings.validate()
    };
    validation.context("Invalid configuration")?;

    tracing::info!("🚀 Scanbot starting");
    log_configuration(&settings, &cli);

    // Scanner
    let provider = Arc::new(
        BinanceClient::with_config(
            &settings.binance.base_url,
            settings.binance.requests_per_minute,
            settings.binance.max_retries,
        )
        .context("Failed to create Binance client")?,
    );
    let strategy = ConfluenceStrategy::new(settings.strategy.clone())
        .with_candle_limit(settings.scanner.candle_limit);
    let scanner = ScanOrchestrator::new(
        provider,
        strategy,
        settings.pairs(),
        Duration::from_secs(settings.scanner.fetch_timeout_secs),
    );

    // Delivery
    let registry = SubscriberRegistry::with_recipients(
        settings
            .telegram
            .admins()
            .into_iter()
            .map(|id| (id, settings.telegram.admin_name.clone())),
    );

    let telegram = if cli.dry_run {
        None
    } else {
        Some(Arc::new(
            TelegramClient::with_base_url(&settings.telegram.base_url, settings.telegram.token.clone())
                .context("Failed to create Telegram client")?,
        ))
    };
    let sink: Arc<dyn NotificationSink> = match &telegram {
        Some(client) => client.clone() as Arc<dyn NotificationSink>,
        None => Arc::new(LogSink),
    };
    let renderer = Arc::new(SvgChartRenderer::new().with_ema_period(settings.strategy.ema_period));
    let notifier = Arc::new(Notifier::new(
        sink,
        renderer,
        registry.clone(),
        settings.telegram.max_concurrent_sends,
    ));

    if cli.once {
        run_once(scanner, &notifier).await;
        return Ok(());
    }

    tracing::info!("\n🔄 Spawning loops...");

    let scan_task = {
        let notifier = notifier.clone();
        let every = Duration::from_secs(settings.scanner.poll_interval_secs);
        tokio::spawn(async move {
            scan_loop(scanner, notifier, every).await;
        })
    };

    let command_task: Option<JoinHandle<()>> = telegram.map(|client| {
        let handler = CommandHandler::new(AdminPolicy::new(settings.telegram.admins()), registry);
        let notifier = notifier.clone();
        let poll_timeout = settings.telegram.poll_timeout_secs;
        tokio::spawn(async move {
            command_loop(client, handler, notifier, poll_timeout).await;
        })
    });

    tracing::info!("✅ Scanning every {}s", settings.scanner.poll_interval_secs);
    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = scan_task => {
            tracing::error!("Scan loop exited: {:?}", result);
        }
        result = wait_optional(command_task) => {
            tracing::error!("Command loop exited: {:?}", result);
        }
    }

    tracing::info!("👋 Scanbot stopped");
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scanbot=info,scanbot::strategy=debug".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_configuration(settings: &Settings, cli: &Cli) {
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Symbols: {}", settings.scanner.symbols.join(", "));
    let timeframes: Vec<&str> = settings.scanner.timeframes.iter().map(|tf| tf.as_str()).collect();
    tracing::info!("  Timeframes: {}", timeframes.join(", "));
    tracing::info!("  Candles per fetch: {}", settings.scanner.candle_limit);
    tracing::info!("  EMA period: {}", settings.strategy.ema_period);
    tracing::info!("  Admins: {}", settings.telegram.admin_ids.len());
    if cli.dry_run {
        tracing::info!("  Dry run: notifications are logged only");
    }
}

/// Pending forever when there is no task, so `select!` ignores it
async fn wait_optional(task: Option<JoinHandle<()>>) -> Result<(), tokio::task::JoinError> {
    match task {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

async fn run_once(mut scanner: ScanOrchestrator, notifier: &Notifier) {
    let report = scanner.run_cycle().await;
    for failure in &report.failures {
        tracing::warn!("{} {}: {}", failure.pair.symbol, failure.pair.timeframe, failure.error);
    }

    for handle in notifier.dispatch(report.intents) {
        if let Err(e) = handle.await {
            tracing::error!("Delivery task failed: {}", e);
        }
    }
}

// ============================================================================
// Loops
// ============================================================================

async fn scan_loop(mut scanner: ScanOrchestrator, notifier: Arc<Notifier>, every: Duration) {
    tracing::info!(
        "🔎 Scan loop starting ({} pairs, {} strategy)",
        scanner.pairs().len(),
        scanner.strategy_name()
    );

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let report = scanner.run_cycle().await;
        if !report.intents.is_empty() {
            // Deliveries run detached; the next cycle does not wait for them
            let handles = notifier.dispatch(report.intents);
            tracing::debug!("Spawned {} deliveries", handles.len());
        }
    }
}

async fn command_loop(
    client: Arc<TelegramClient>,
    handler: CommandHandler,
    notifier: Arc<Notifier>,
    poll_timeout_secs: u64,
) {
    tracing::info!("💬 Command loop starting");
    let mut offset: Option<i64> = None;

    loop {
        let updates = match client.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!("Polling updates failed: {}", e);
                tokio::time::sleep(Duration::from_secs(COMMAND_RETRY_SECS)).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };

            let sender = RecipientId::from(message.chat.id);
            let Some(outcome) = handler.handle(&sender, &text) else {
                continue;
            };

            if let Err(e) = notifier.send_direct(&sender, &outcome.reply).await {
                tracing::warn!("Reply to {} failed: {}", sender, e);
            }
            if let Some((recipient, welcome)) = outcome.welcome {
                if let Err(e) = notifier.send_direct(&recipient, &welcome).await {
                    tracing::warn!("Welcome to {} failed: {}", recipient, e);
                }
            }
        }
    }
}
