use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The price could not be fetched or failed the sanity checks.
    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    /// The persisted position could not be parsed or violates its invariants.
    #[error("Corrupt state: {0}")]
    CorruptState(String),

    /// The engine refused a transition whose successor would break the
    /// position invariants.
    #[error("Strategy error: {0}")]
    Strategy(String),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    /// The new position was not durably written. The tick must not be
    /// treated as committed.
    #[error("Failed to persist state: {0}")]
    Persistence(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
