//! Collaborators that never leave the process.
//!
//! `LogNotifier` backs paper mode (`DELIVERY_MODE=log`): signals are written
//! to the log instead of being sent. The remaining types are in-memory
//! doubles used to drive the runner in tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use common::{Error, Notifier, Position, Price, PriceSource, Quote, Result, StateStore};

/// Writes every message to the log at info level.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        info!("LogNotifier initialized, signals will not leave this process");
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        info!(target: "signal", "\n{text}");
        Ok(())
    }
}

/// Replays a fixed sequence of price results, one per fetch.
/// Once exhausted every fetch fails with `PriceUnavailable`.
#[derive(Debug, Default)]
pub struct ScriptedPrices {
    queue: Mutex<VecDeque<std::result::Result<f64, String>>>,
}

impl ScriptedPrices {
    pub fn from_prices(prices: &[f64]) -> Self {
        Self {
            queue: Mutex::new(prices.iter().copied().map(Ok).collect()),
        }
    }

    pub async fn push_price(&self, price: f64) {
        self.queue.lock().await.push_back(Ok(price));
    }

    /// Queue a failed fetch.
    pub async fn push_failure(&self, reason: impl Into<String>) {
        self.queue.lock().await.push_back(Err(reason.into()));
    }
}

#[async_trait]
impl PriceSource for ScriptedPrices {
    async fn fetch_price(&self) -> Result<Quote> {
        match self.queue.lock().await.pop_front() {
            Some(Ok(value)) => Ok(Quote::new(Price::new(value)?, Utc::now())),
            Some(Err(reason)) => Err(Error::PriceUnavailable(reason)),
            None => Err(Error::PriceUnavailable("price script exhausted".into())),
        }
    }
}

/// Records delivered messages. Can be told to fail the next delivery.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail_next: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_next(&self, reason: impl Into<String>) {
        *self.fail_next.lock().await = Some(reason.into());
    }

    /// Messages delivered so far, oldest first.
    pub async fn messages(&self) -> Vec<String> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        if let Some(reason) = self.fail_next.lock().await.take() {
            return Err(Error::Delivery(reason));
        }
        self.sent.lock().await.push(text.to_string());
        Ok(())
    }
}

/// Keeps the serialized position in memory, exactly as a file would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
    fail_saves: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current serialized payload, if any.
    pub async fn raw(&self) -> Option<String> {
        self.raw.lock().await.clone()
    }

    /// Overwrite the payload, bypassing validation.
    pub async fn set_raw(&self, raw: impl Into<String>) {
        *self.raw.lock().await = Some(raw.into());
    }

    pub async fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().await = fail;
    }

    /// Parsed position, `None` when empty or unparsable.
    pub async fn position(&self) -> Option<Position> {
        let raw = self.raw.lock().await.clone()?;
        serde_json::from_str(&raw).ok()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<Position>> {
        let Some(raw) = self.raw.lock().await.clone() else {
            return Ok(None);
        };
        let position: Position =
            serde_json::from_str(&raw).map_err(|e| Error::CorruptState(e.to_string()))?;
        position.validate()?;
        Ok(Some(position))
    }

    async fn save(&self, position: &Position) -> Result<()> {
        if *self.fail_saves.lock().await {
            return Err(Error::Persistence("memory store is read-only".into()));
        }
        let raw = serde_json::to_string_pretty(position)?;
        debug!(bytes = raw.len(), "MemoryStore saved position");
        *self.raw.lock().await = Some(raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_prices_replay_in_order_then_fail() {
        let prices = ScriptedPrices::from_prices(&[100.0]);
        prices.push_failure("boom").await;
        prices.push_price(200.0).await;

        assert_eq!(prices.fetch_price().await.unwrap().price.value(), 100.0);
        assert!(matches!(prices.fetch_price().await, Err(Error::PriceUnavailable(_))));
        assert_eq!(prices.fetch_price().await.unwrap().price.value(), 200.0);
        assert!(prices.fetch_price().await.is_err());
    }

    #[tokio::test]
    async fn scripted_invalid_price_is_unavailable() {
        let prices = ScriptedPrices::from_prices(&[-5.0]);
        assert!(matches!(prices.fetch_price().await, Err(Error::PriceUnavailable(_))));
    }

    #[tokio::test]
    async fn recording_notifier_fails_once() {
        let notifier = RecordingNotifier::new();
        notifier.fail_next("down").await;
        assert!(matches!(notifier.notify("a").await, Err(Error::Delivery(_))));
        notifier.notify("b").await.unwrap();
        assert_eq!(notifier.messages().await, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn memory_store_round_trips_and_flags_corruption() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save(&Position::idle(100.0)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(Position::idle(100.0)));

        store.set_raw("[]").await;
        assert!(matches!(store.load().await, Err(Error::CorruptState(_))));

        store.set_raw(r#"{"phase":"idle","capital":-1.0}"#).await;
        assert!(matches!(store.load().await, Err(Error::CorruptState(_))));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier::new().notify("hello").await.is_ok());
    }
}
