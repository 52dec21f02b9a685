use std::sync::Arc;

use tracing::{error, info, warn};

use common::format::{render_signal, MessageLabels};
use common::{Error, Notifier, Position, PriceSource, Quote, Result, Signal, StateStore};

use crate::signal::SignalEngine;

/// Non-fatal conditions surfaced to the caller of [`Runner::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickWarning {
    /// The stored position was unreadable and has been replaced by a fresh
    /// idle one. Any in-flight position is lost.
    StateReset { reason: String },
    /// The state transition was committed but the message was not delivered.
    DeliveryFailed { reason: String },
}

impl std::fmt::Display for TickWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TickWarning::StateReset { reason } => {
                write!(f, "state reset to idle: {reason}")
            }
            TickWarning::DeliveryFailed { reason } => {
                write!(f, "notification not delivered: {reason}")
            }
        }
    }
}

/// What a committed tick did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub quote: Quote,
    pub before: Position,
    pub after: Position,
    pub signal: Option<Signal>,
    pub warnings: Vec<TickWarning>,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// No price was available. Nothing was evaluated or persisted.
    /// Warnings raised before the fetch (a state reset) are still reported.
    Skipped {
        reason: String,
        warnings: Vec<TickWarning>,
    },
    /// The successor position was persisted.
    Advanced(TickReport),
}

/// Runs one load → fetch → evaluate → save → notify cycle.
///
/// The runner holds no state of its own between ticks; the store is the
/// only source of truth. Overlapping ticks against the same store must be
/// serialized by the caller.
pub struct Runner {
    engine: SignalEngine,
    prices: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn StateStore>,
    labels: MessageLabels,
}

impl Runner {
    pub fn new(
        engine: SignalEngine,
        prices: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn StateStore>,
        labels: MessageLabels,
    ) -> Self {
        Self {
            engine,
            prices,
            notifier,
            store,
            labels,
        }
    }

    pub async fn tick(&self) -> Result<TickOutcome> {
        let mut warnings = Vec::new();

        let before = match self.store.load().await {
            Ok(Some(position)) => position,
            Ok(None) => {
                info!(
                    capital = self.engine.config().starting_capital(),
                    "No stored position, starting idle"
                );
                self.engine.initial_position()
            }
            Err(Error::CorruptState(reason)) => {
                warn!(%reason, "Stored position is corrupt, resetting to idle");
                warnings.push(TickWarning::StateReset { reason });
                self.engine.initial_position()
            }
            Err(e) => return Err(e),
        };

        let quote = match self.prices.fetch_price().await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(error = %e, "Price unavailable, skipping tick");
                return Ok(TickOutcome::Skipped {
                    reason: e.to_string(),
                    warnings,
                });
            }
        };
        info!(price = %quote.price, phase = %before.phase, "Evaluating");

        let evaluation = self.engine.evaluate(&before, quote).map_err(|e| {
            error!(error = %e, "Evaluation refused, nothing persisted");
            e
        })?;

        // Only a persisted transition is announced.
        self.store.save(&evaluation.position).await.map_err(|e| {
            error!(error = %e, "Failed to persist position");
            match e {
                Error::Persistence(_) => e,
                other => Error::Persistence(other.to_string()),
            }
        })?;

        if let Some(signal) = &evaluation.signal {
            let text = render_signal(signal, &self.labels);
            match self.notifier.notify(&text).await {
                Ok(()) => info!(side = %signal.side(), "Signal sent"),
                Err(e) => {
                    warn!(side = %signal.side(), error = %e, "Failed to deliver signal");
                    warnings.push(TickWarning::DeliveryFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(TickOutcome::Advanced(TickReport {
            quote,
            before,
            after: evaluation.position,
            signal: evaluation.signal,
            warnings,
        }))
    }
}
