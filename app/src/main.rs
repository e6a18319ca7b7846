// In app/src/main.rs

use anyhow::{Context, Result};
use api_client::ExchangeGateway;
use app_config::Settings;
use clap::{Parser, Subcommand};
use core_types::{PositionRecord, ProfitEntry};
use engine::{Session, SessionContext};
use events::SessionEvent;
use self::tracing_layer::{LogCache, SessionLogLayer, LOG_CACHE_SIZE};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
mod tracing_layer;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A crypto swing-trading bot for the Luno exchange.")]
struct Cli {
    /// Directory holding base.toml and the per-environment overrides.
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the trading loop until Ctrl-C.
    Run,

    /// Lists the positions waiting to be closed.
    Ledger {
        /// Print the records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Prints the cumulative profit figures for an asset.
    Stats {
        /// The asset code, e.g. "XBT".
        asset: String,
    },

    /// Prints the most recently closed positions.
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = app_config::load_settings_from(&cli.config_dir)
        .with_context(|| format!("loading settings from {}", cli.config_dir.display()))?;

    // --- Event channel and Tracing Setup ---
    let (events_tx, _) = broadcast::channel::<SessionEvent>(engine::EVENT_CHANNEL_CAPACITY);
    let log_cache: LogCache = Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CACHE_SIZE)));
    init_tracing(&settings, events_tx.clone(), log_cache.clone());

    tracing::info!(environment = %settings.app.environment, "Starting swingbot");

    match cli.command {
        Commands::Run => run_app(settings, events_tx, log_cache).await?,
        Commands::Ledger { json } => handle_ledger(&settings, json).await?,
        Commands::Stats { asset } => handle_stats(&settings, &asset)?,
        Commands::History { limit } => handle_history(&settings, limit)?,
    }

    Ok(())
}

fn init_tracing(settings: &Settings, events_tx: broadcast::Sender<SessionEvent>, cache: LogCache) {
    let level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let targets = tracing_subscriber::filter::Targets::new()
        .with_target("sqlx", tracing::Level::WARN) // Disable sqlx query debug logs
        .with_target("hyper", tracing::Level::WARN)
        .with_target("reqwest", tracing::Level::WARN)
        .with_default(level);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(targets.clone());
    let session_layer = SessionLogLayer::new(events_tx, cache).with_filter(targets);
    tracing_subscriber::registry().with(fmt_layer).with(session_layer).init();
}

// --- "Run" Subcommand Logic ---

/// What a finished session did, counted from its events.
#[derive(Debug, Default)]
struct SessionSummary {
    opened: usize,
    closed: usize,
    errors: usize,
}

async fn run_app(
    settings: Settings,
    events_tx: broadcast::Sender<SessionEvent>,
    log_cache: LogCache,
) -> Result<()> {
    let gateway: Arc<dyn ExchangeGateway> = Arc::new(api_client::new(&settings.exchange)?);

    let token = CancellationToken::new();
    let ctx = SessionContext::new(settings.trade.clone(), token.clone(), events_tx.clone());
    let session = Session::from_settings(&settings, gateway, ctx)?;

    let watcher = watch_events(events_tx.subscribe());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, finishing the current step");
            token.cancel();
        }
    });

    tracing::info!(
        assets = ?settings.trade.assets,
        purchase_unit = %settings.trade.purchase_unit,
        profit_margin = %settings.trade.profit_margin,
        mode = ?settings.trade.trading_mode,
        "Trading session starting"
    );
    let result = session.run().await;

    let summary = watcher.await.unwrap_or_default();
    tracing::info!(
        opened = summary.opened,
        closed = summary.closed,
        errors = summary.errors,
        "Trading session finished"
    );

    if let Err(e) = result {
        eprintln!("Recent warnings:");
        if let Ok(cache) = log_cache.lock() {
            for log in cache.iter().filter(|l| l.level == "WARN" || l.level == "ERROR") {
                eprintln!("  {} {:5} {}", log.timestamp.format("%H:%M:%S"), log.level, log.message);
            }
        }
        return Err(e.into());
    }
    Ok(())
}

/// Counts session events until the session reports `Stopped`.
fn watch_events(mut rx: broadcast::Receiver<SessionEvent>) -> JoinHandle<SessionSummary> {
    tokio::spawn(async move {
        let mut summary = SessionSummary::default();
        loop {
            match rx.recv().await {
                Ok(SessionEvent::PositionOpened(_)) => summary.opened += 1,
                Ok(SessionEvent::PositionClosed { .. }) => summary.closed += 1,
                Ok(SessionEvent::Error(_)) => summary.errors += 1,
                Ok(SessionEvent::Stopped) => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        summary
    })
}

// --- Inspection Subcommands ---

async fn handle_ledger(settings: &Settings, json: bool) -> Result<()> {
    let (ledger, _) = database::stores(&settings.ledger);
    let records = ledger.all_records().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No pending positions.");
        return Ok(());
    }
    println!(
        "{:<20} {:<6} {:<12} {:>16} {:>14} {:>16} {:<9} {}",
        "ID", "ASSET", "TYPE", "PRICE", "VOLUME", "TRIGGER", "STATUS", "OPENED"
    );
    for record in &records {
        println!("{}", ledger_row(record));
    }
    Ok(())
}

fn ledger_row(r: &PositionRecord) -> String {
    let status = if r.close_attempted_at.is_some() {
        "CLOSING".to_string()
    } else {
        r.status.to_string()
    };
    format!(
        "{:<20} {:<6} {:<12} {:>16} {:>14} {:>16} {:<9} {}",
        r.id,
        r.asset,
        r.order_type.as_str(),
        r.open_price.round_dp(2).to_string(),
        r.open_volume.to_string(),
        r.trigger_price.round_dp(2).to_string(),
        status,
        r.open_timestamp.format("%Y-%m-%d %H:%M")
    )
}

fn handle_stats(settings: &Settings, asset: &str) -> Result<()> {
    let (_, stats) = database::stores(&settings.ledger);
    match stats.stats(asset)? {
        Some(s) => {
            println!("Asset:            {}", s.asset);
            println!("Closed trades:    {}", s.trades);
            println!("Purchase volume:  {}", s.purchase_volume);
            println!("Purchase cost:    {}", s.purchase_cost.round_dp(2));
            println!("Sale volume:      {}", s.sale_volume);
            println!("Sale cost:        {}", s.sale_cost.round_dp(2));
            println!("Profit:           {} {}", s.profit.round_dp(2), settings.trade.currency);
            if let Some(at) = s.updated_at {
                println!("Last trade:       {}", at.format("%Y-%m-%d %H:%M"));
            }
        }
        None => println!("No closed trades recorded for {}.", asset.to_uppercase()),
    }
    Ok(())
}

fn handle_history(settings: &Settings, limit: usize) -> Result<()> {
    let (_, stats) = database::stores(&settings.ledger);
    print_entries("Sales (closed longs)", &stats.sales()?, limit);
    print_entries("Purchases (closed shorts)", &stats.purchases()?, limit);
    Ok(())
}

fn print_entries(title: &str, entries: &[ProfitEntry], limit: usize) {
    println!("{title}:");
    if entries.is_empty() {
        println!("  none");
        return;
    }
    let skip = entries.len().saturating_sub(limit);
    for e in entries.iter().skip(skip) {
        println!(
            "  {} {:<5} {:<20} bought {} @ {}  sold {} @ {}  profit {}",
            e.timestamp.format("%Y-%m-%d %H:%M"),
            e.asset,
            e.order_id,
            e.purchase_volume,
            e.purchase_price.round_dp(2),
            e.sale_volume,
            e.sale_price.round_dp(2),
            e.profit.round_dp(2)
        );
    }
}
