use crate::format::MessageLabels;
use crate::{Error, Result};

/// Thresholds for the signal engine. Fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyConfig {
    starting_capital: f64,
    min_profit: f64,
    trailing_drop_fraction: f64,
}

impl StrategyConfig {
    pub fn new(starting_capital: f64, min_profit: f64, trailing_drop_fraction: f64) -> Result<Self> {
        if !(starting_capital.is_finite() && starting_capital > 0.0) {
            return Err(Error::Config(format!(
                "starting capital must be positive, got {starting_capital}"
            )));
        }
        if !(min_profit.is_finite() && min_profit > 0.0) {
            return Err(Error::Config(format!(
                "minimum profit must be positive, got {min_profit}"
            )));
        }
        // target = entry * (1 + min_profit / capital) must land above entry.
        if 1.0 + min_profit / starting_capital <= 1.0 {
            return Err(Error::Config(format!(
                "minimum profit {min_profit} is too small relative to capital {starting_capital}"
            )));
        }
        if !(trailing_drop_fraction > 0.0 && trailing_drop_fraction < 1.0) {
            return Err(Error::Config(format!(
                "trailing drop must be in (0, 1), got {trailing_drop_fraction}"
            )));
        }
        Ok(Self {
            starting_capital,
            min_profit,
            trailing_drop_fraction,
        })
    }

    pub fn starting_capital(&self) -> f64 {
        self.starting_capital
    }

    pub fn min_profit(&self) -> f64 {
        self.min_profit
    }

    pub fn trailing_drop_fraction(&self) -> f64 {
        self.trailing_drop_fraction
    }

    /// Apply `START_CAPITAL`, `MIN_PROFIT` and `TRAIL_DROP` over the defaults.
    fn from_lookup<G>(get: &G) -> Result<Self>
    where
        G: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self::new(
            parse_or(get, "START_CAPITAL", defaults.starting_capital)?,
            parse_or(get, "MIN_PROFIT", defaults.min_profit)?,
            parse_or(get, "TRAIL_DROP", defaults.trailing_drop_fraction)?,
        )
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            starting_capital: 100.0,
            min_profit: 1.0,
            trailing_drop_fraction: 0.01,
        }
    }
}

/// Price feed settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceFeedConfig {
    /// CoinGecko asset id, e.g. "bitcoin".
    pub asset_id: String,
    /// Quote currency, lowercase, e.g. "eur".
    pub currency: String,
    /// Prices below this are rejected as implausible.
    pub floor: Option<f64>,
    /// Prices above this are rejected as implausible.
    pub ceiling: Option<f64>,
    /// Retry through USD and an FX rate when the direct quote fails.
    pub usd_fallback: bool,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            asset_id: "bitcoin".to_string(),
            currency: "eur".to_string(),
            floor: Some(1000.0),
            ceiling: None,
            usd_fallback: false,
        }
    }
}

/// Where notifications go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Telegram,
    /// Paper mode: messages are only written to the log.
    Log,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Telegram => write!(f, "telegram"),
            DeliveryMode::Log => write!(f, "log"),
        }
    }
}

/// Persistence medium for the position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateBackend {
    JsonFile(String),
    Sqlite(String),
}

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub delivery_mode: DeliveryMode,

    // Telegram
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    pub strategy: StrategyConfig,
    pub feed: PriceFeedConfig,
    /// Symbol shown in messages, e.g. "BTC".
    pub asset_symbol: String,
    pub state_backend: StateBackend,
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let delivery_mode = match get("DELIVERY_MODE")
            .unwrap_or_else(|| "telegram".to_string())
            .to_lowercase()
            .as_str()
        {
            "telegram" => DeliveryMode::Telegram,
            "log" | "paper" => DeliveryMode::Log,
            other => {
                return Err(Error::Config(format!(
                    "DELIVERY_MODE must be 'telegram' or 'log', got: '{other}'"
                )))
            }
        };

        let telegram_token = get("TELEGRAM_TOKEN");
        let telegram_chat_id = get("TELEGRAM_CHAT_ID");
        if delivery_mode == DeliveryMode::Telegram {
            if telegram_token.is_none() {
                return Err(missing("TELEGRAM_TOKEN"));
            }
            if telegram_chat_id.is_none() {
                return Err(missing("TELEGRAM_CHAT_ID"));
            }
        }

        let strategy = StrategyConfig::from_lookup(&get)?;

        let defaults = PriceFeedConfig::default();
        let floor = match get("PRICE_FLOOR") {
            Some(v) => Some(parse_f64("PRICE_FLOOR", &v)?),
            None => defaults.floor,
        };
        let ceiling = match get("PRICE_CEILING") {
            Some(v) => Some(parse_f64("PRICE_CEILING", &v)?),
            None => None,
        };
        if let (Some(lo), Some(hi)) = (floor, ceiling) {
            if lo >= hi {
                return Err(Error::Config(format!(
                    "PRICE_FLOOR ({lo}) must be below PRICE_CEILING ({hi})"
                )));
            }
        }
        let usd_fallback = match get("USD_FALLBACK").map(|v| v.to_lowercase()) {
            None => false,
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no") => false,
            Some(v) => {
                return Err(Error::Config(format!(
                    "USD_FALLBACK must be a boolean, got: '{v}'"
                )))
            }
        };

        let feed = PriceFeedConfig {
            asset_id: get("PRICE_ASSET").unwrap_or(defaults.asset_id),
            currency: get("QUOTE_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.currency),
            floor,
            ceiling,
            usd_fallback,
        };

        let state_backend = match get("DATABASE_URL") {
            Some(url) => StateBackend::Sqlite(url),
            None => StateBackend::JsonFile(
                get("STATE_PATH").unwrap_or_else(|| "state.json".to_string()),
            ),
        };

        Ok(Config {
            delivery_mode,
            telegram_token,
            telegram_chat_id,
            strategy,
            feed,
            asset_symbol: get("ASSET_SYMBOL").unwrap_or_else(|| "BTC".to_string()),
            state_backend,
        })
    }

    pub fn labels(&self) -> MessageLabels {
        MessageLabels::new(self.asset_symbol.clone(), self.feed.currency.clone())
    }
}

fn missing(key: &str) -> Error {
    Error::Config(format!(
        "Required environment variable '{key}' is not set. Check your .env file."
    ))
}

fn parse_or<G>(get: &G, key: &str, default: f64) -> Result<f64>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => parse_f64(key, &v),
        None => Ok(default),
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{key} must be a number, got: '{value}'")))
}
