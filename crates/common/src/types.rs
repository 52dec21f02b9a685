use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A positive, finite price in the configured quote currency.
///
/// The only way to build one is [`Price::new`], so the engine never sees a
/// zero, negative or NaN price.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(Error::PriceUnavailable(format!(
                "price must be positive and finite, got {value}"
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A price observation returned by a price source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: Price,
    pub at: DateTime<Utc>,
}

impl Quote {
    pub fn new(price: Price, at: DateTime<Utc>) -> Self {
        Self { price, at }
    }
}

/// Capital deployed into `quantity` units at `entry_price`, awaiting exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub entry_price: f64,
    pub quantity: f64,
    /// Minimum exit price that realizes the configured minimum profit.
    pub target_price: f64,
    /// Highest price observed since entry. Trailing-exit reference.
    pub peak_price: f64,
    pub opened_at: DateTime<Utc>,
}

/// Phase of the single tracked position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Holding(Holding),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Holding(_) => "holding",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A completed round trip. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub profit: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

/// The persisted state: one position per deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(flatten)]
    pub phase: Phase,
    pub capital: f64,
    #[serde(default)]
    pub history: Vec<ClosedTrade>,
}

impl Position {
    /// A fresh idle position with the given starting capital.
    pub fn idle(capital: f64) -> Self {
        Self {
            phase: Phase::Idle,
            capital,
            history: Vec::new(),
        }
    }

    pub fn holding(&self) -> Option<&Holding> {
        match &self.phase {
            Phase::Holding(h) => Some(h),
            Phase::Idle => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Check the invariants a loaded position must satisfy.
    /// Violations are reported as [`Error::CorruptState`].
    pub fn validate(&self) -> Result<()> {
        if !(self.capital.is_finite() && self.capital > 0.0) {
            return Err(corrupt(format!("capital must be positive, got {}", self.capital)));
        }

        if let Phase::Holding(h) = &self.phase {
            for (name, value) in [
                ("entry_price", h.entry_price),
                ("quantity", h.quantity),
                ("target_price", h.target_price),
                ("peak_price", h.peak_price),
            ] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(corrupt(format!("{name} must be positive, got {value}")));
                }
            }
            if h.target_price <= h.entry_price {
                return Err(corrupt(format!(
                    "target_price {} must exceed entry_price {}",
                    h.target_price, h.entry_price
                )));
            }
            if h.peak_price < h.entry_price {
                return Err(corrupt(format!(
                    "peak_price {} is below entry_price {}",
                    h.peak_price, h.entry_price
                )));
            }
        }

        for (i, trade) in self.history.iter().enumerate() {
            let values = [trade.entry_price, trade.exit_price, trade.quantity, trade.profit];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(corrupt(format!("history entry {i} has a non-finite value")));
            }
        }

        Ok(())
    }

    /// Sum of realized profit across all closed trades.
    pub fn realized_profit(&self) -> f64 {
        self.history.iter().map(|t| t.profit).sum()
    }
}

fn corrupt(msg: String) -> Error {
    Error::CorruptState(msg)
}

/// Side of an emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSide {
    Buy,
    Sell,
}

impl std::fmt::Display for SignalSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalSide::Buy => write!(f, "BUY"),
            SignalSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Notification payload emitted on a phase transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Buy {
        price: f64,
        quantity: f64,
        /// Capital deployed.
        capital: f64,
        target_price: f64,
        min_profit: f64,
    },
    Sell {
        price: f64,
        quantity: f64,
        profit: f64,
        /// Capital after the sale.
        capital: f64,
    },
}

impl Signal {
    pub fn side(&self) -> SignalSide {
        match self {
            Signal::Buy { .. } => SignalSide::Buy,
            Signal::Sell { .. } => SignalSide::Sell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(entry: f64, target: f64, peak: f64) -> Position {
        Position {
            phase: Phase::Holding(Holding {
                entry_price: entry,
                quantity: 0.002,
                target_price: target,
                peak_price: peak,
                opened_at: Utc::now(),
            }),
            capital: 100.0,
            history: Vec::new(),
        }
    }

    #[test]
    fn price_rejects_non_positive_and_nan() {
        assert!(Price::new(0.0).is_err());
        assert!(Price::new(-1.0).is_err());
        assert!(Price::new(f64::NAN).is_err());
        assert!(Price::new(f64::INFINITY).is_err());
        assert_eq!(Price::new(50_000.0).unwrap().value(), 50_000.0);
    }

    #[test]
    fn idle_position_serializes_with_phase_tag() {
        let json = serde_json::to_value(Position::idle(100.0)).unwrap();
        assert_eq!(json["phase"], "idle");
        assert_eq!(json["capital"], 100.0);
        assert!(json.get("entry_price").is_none());
    }

    #[test]
    fn holding_position_survives_json() {
        let pos = holding(50_000.0, 50_500.0, 50_600.0);
        let text = serde_json::to_string(&pos).unwrap();
        assert!(text.contains("\"phase\":\"holding\""));
        let back: Position = serde_json::from_str(&text).unwrap();
        assert_eq!(back, pos);
    }

    #[test]
    fn holding_without_fields_fails_to_parse() {
        let text = r#"{"phase":"holding","capital":100.0,"history":[]}"#;
        assert!(serde_json::from_str::<Position>(text).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_positions() {
        assert!(Position::idle(100.0).validate().is_ok());
        assert!(holding(50_000.0, 50_500.0, 50_000.0).validate().is_ok());
    }

    #[test]
    fn validate_rejects_broken_invariants() {
        assert!(Position::idle(0.0).validate().is_err());
        assert!(holding(50_000.0, 49_000.0, 50_000.0).validate().is_err());
        assert!(holding(50_000.0, 50_500.0, 49_999.0).validate().is_err());

        let mut pos = holding(50_000.0, 50_500.0, 50_000.0);
        if let Phase::Holding(h) = &mut pos.phase {
            h.quantity = 0.0;
        }
        assert!(matches!(pos.validate(), Err(Error::CorruptState(_))));
    }

    #[test]
    fn signal_side_names_the_action() {
        let buy = Signal::Buy {
            price: 50_000.0,
            quantity: 0.002,
            capital: 100.0,
            target_price: 50_500.0,
            min_profit: 1.0,
        };
        let sell = Signal::Sell {
            price: 51_400.0,
            quantity: 0.002,
            profit: 2.8,
            capital: 102.8,
        };
        assert_eq!(buy.side(), SignalSide::Buy);
        assert_eq!(sell.side().to_string(), "SELL");
    }
}
