use tracing::{debug, info};

use common::{ClosedTrade, Error, Holding, Phase, Position, Quote, Result, Signal, StrategyConfig};

/// Result of a single evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Successor position. Equal to the input when nothing changed.
    pub position: Position,
    /// Emitted only on a phase transition.
    pub signal: Option<Signal>,
}

/// The buy / trailing-exit state machine.
///
/// Idle always buys with the full capital. Holding sells only when the price
/// is at or above the minimum-profit target AND has pulled back from the
/// peak by the configured trailing fraction.
#[derive(Debug, Clone, Copy)]
pub struct SignalEngine {
    config: StrategyConfig,
}

impl SignalEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// The position used when nothing valid has been persisted yet.
    pub fn initial_position(&self) -> Position {
        Position::idle(self.config.starting_capital())
    }

    /// Fails only when entering would produce a holding that breaks the
    /// position invariants; nothing should be persisted in that case.
    pub fn evaluate(&self, position: &Position, quote: Quote) -> Result<Evaluation> {
        match &position.phase {
            Phase::Idle => self.enter(position, quote),
            Phase::Holding(holding) => Ok(self.hold_or_exit(position, holding, quote)),
        }
    }

    fn enter(&self, position: &Position, quote: Quote) -> Result<Evaluation> {
        let price = quote.price.value();
        let capital = position.capital;
        let quantity = capital / price;
        let target_price = price + self.config.min_profit() / quantity;

        if !(quantity > 0.0 && target_price.is_finite() && target_price > price) {
            return Err(Error::Strategy(format!(
                "cannot enter at {price} with capital {capital}: \
                 target {target_price} does not exceed the entry price"
            )));
        }

        info!(price, quantity, target_price, capital, "Entering position");

        let holding = Holding {
            entry_price: price,
            quantity,
            target_price,
            peak_price: price,
            opened_at: quote.at,
        };

        Ok(Evaluation {
            position: Position {
                phase: Phase::Holding(holding),
                capital,
                history: position.history.clone(),
            },
            signal: Some(Signal::Buy {
                price,
                quantity,
                capital,
                target_price,
                min_profit: self.config.min_profit(),
            }),
        })
    }

    fn hold_or_exit(&self, position: &Position, holding: &Holding, quote: Quote) -> Evaluation {
        let price = quote.price.value();

        let mut holding = holding.clone();
        if price > holding.peak_price {
            info!(peak = price, previous = holding.peak_price, "New peak price");
            holding.peak_price = price;
        }

        let profit_eligible = price >= holding.target_price;
        let trailing_floor = holding.peak_price * (1.0 - self.config.trailing_drop_fraction());
        let trailing_triggered = price <= trailing_floor;

        if profit_eligible && trailing_triggered {
            return self.exit(position, &holding, quote);
        }

        if profit_eligible {
            info!(
                price,
                peak = holding.peak_price,
                trailing_floor,
                "Profit target reached, still holding"
            );
        } else {
            info!(price, target = holding.target_price, "Waiting for profit target");
        }
        debug!(profit_eligible, trailing_triggered, "Holding evaluated");

        Evaluation {
            position: Position {
                phase: Phase::Holding(holding),
                capital: position.capital,
                history: position.history.clone(),
            },
            signal: None,
        }
    }

    fn exit(&self, position: &Position, holding: &Holding, quote: Quote) -> Evaluation {
        let price = quote.price.value();
        let proceeds = holding.quantity * price;
        let profit = proceeds - holding.quantity * holding.entry_price;

        info!(
            price,
            entry = holding.entry_price,
            quantity = holding.quantity,
            profit,
            capital = proceeds,
            "Closing position"
        );

        let mut history = position.history.clone();
        history.push(ClosedTrade {
            entry_price: holding.entry_price,
            exit_price: price,
            quantity: holding.quantity,
            profit,
            opened_at: holding.opened_at,
            closed_at: quote.at,
        });

        Evaluation {
            position: Position {
                phase: Phase::Idle,
                capital: proceeds,
                history,
            },
            signal: Some(Signal::Sell {
                price,
                quantity: holding.quantity,
                profit,
                capital: proceeds,
            }),
        }
    }
}
