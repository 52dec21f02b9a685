use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, DeliveryMode, Error, Notifier, Result, StateBackend, StateStore};
use engine::{CoinGeckoClient, Runner, SignalEngine, TickOutcome};
use paper::LogNotifier;
use store::{JsonFileStore, SqliteStore};
use telegram_notify::TelegramNotifier;

/// One tick per invocation. Scheduling (cron, CI timers) is external and
/// must not start a new run while one is still in progress.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };
    info!(
        delivery = %cfg.delivery_mode,
        asset = %cfg.feed.asset_id,
        currency = %cfg.feed.currency,
        "SignalBot starting"
    );

    match run(&cfg).await {
        Ok(TickOutcome::Skipped { reason, warnings }) => {
            for warning in &warnings {
                warn!(%warning, "Tick skipped with warning");
            }
            warn!(%reason, "Tick skipped, state unchanged");
        }
        Ok(TickOutcome::Advanced(report)) => {
            for warning in &report.warnings {
                warn!(%warning, "Tick completed with warning");
            }
            info!(
                price = %report.quote.price,
                from = %report.before.phase,
                to = %report.after.phase,
                capital = report.after.capital,
                trades = report.after.history.len(),
                realized = report.after.realized_profit(),
                signal = ?report.signal.as_ref().map(|s| s.side()),
                "Tick committed"
            );
        }
        Err(e) => {
            error!(error = %e, "Tick failed, state not advanced");
            std::process::exit(1);
        }
    }
}

async fn run(cfg: &Config) -> Result<TickOutcome> {
    // ── State store ───────────────────────────────────────────────────────────
    let store: Arc<dyn StateStore> = match &cfg.state_backend {
        StateBackend::JsonFile(path) => {
            let store = JsonFileStore::new(path);
            info!(path = %store.path().display(), "Using JSON state file");
            Arc::new(store)
        }
        StateBackend::Sqlite(url) => {
            info!("Using SQLite state store");
            Arc::new(SqliteStore::connect(url).await?)
        }
    };

    // ── Price source ──────────────────────────────────────────────────────────
    let prices = Arc::new(CoinGeckoClient::new(cfg.feed.clone())?);

    // ── Notifier (selected by DELIVERY_MODE) ──────────────────────────────────
    let notifier: Arc<dyn Notifier> = match cfg.delivery_mode {
        DeliveryMode::Telegram => {
            let token = cfg
                .telegram_token
                .as_deref()
                .ok_or_else(|| Error::Config("TELEGRAM_TOKEN is not set".into()))?;
            let chat = cfg
                .telegram_chat_id
                .as_deref()
                .ok_or_else(|| Error::Config("TELEGRAM_CHAT_ID is not set".into()))?;
            Arc::new(TelegramNotifier::new(token, chat)?)
        }
        DeliveryMode::Log => {
            info!("Paper mode, signals are logged only");
            Arc::new(LogNotifier::new())
        }
    };

    // ── Tick ──────────────────────────────────────────────────────────────────
    let runner = Runner::new(
        SignalEngine::new(cfg.strategy),
        prices,
        notifier,
        store,
        cfg.labels(),
    );
    runner.tick().await
}
