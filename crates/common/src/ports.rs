use async_trait::async_trait;

use crate::{Position, Quote, Result};

/// Where the latest price comes from.
///
/// `CoinGeckoClient` implements this against the public API.
/// `ScriptedPrices` in `crates/paper` replays a fixed sequence for tests.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current price. Any failure (network, malformed payload,
    /// out-of-band value) is reported as `Error::PriceUnavailable`.
    async fn fetch_price(&self) -> Result<Quote>;
}

/// Delivers rendered signal messages to the operator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message. Failures are `Error::Delivery` and never roll back
    /// a state transition.
    async fn notify(&self, text: &str) -> Result<()>;
}

/// Durable storage for the single tracked position.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last persisted position.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet and
    /// `Err(Error::CorruptState)` when the payload cannot be parsed or
    /// fails [`Position::validate`].
    async fn load(&self) -> Result<Option<Position>>;

    /// Persist the full position atomically. Failures are
    /// `Error::Persistence`.
    async fn save(&self, position: &Position) -> Result<()>;
}
