use chrono::Utc;
use common::{Phase, Position, Price, Quote, Signal, StrategyConfig};
use engine::SignalEngine;
use proptest::prelude::*;

fn quote(price: f64) -> Quote {
    Quote::new(Price::new(price).unwrap(), Utc::now())
}

fn config() -> impl Strategy<Value = StrategyConfig> {
    (1.0f64..100_000.0, 0.01f64..1_000.0, 0.001f64..0.5)
        .prop_map(|(capital, profit, trail)| StrategyConfig::new(capital, profit, trail).unwrap())
}

proptest! {
    /// Idle always buys the full capital and sets the minimum-profit target.
    #[test]
    fn idle_entry_is_deterministic(cfg in config(), price in 1.0f64..1_000_000.0) {
        let engine = SignalEngine::new(cfg);
        let eval = engine.evaluate(&engine.initial_position(), quote(price)).unwrap();

        let holding = eval.position.holding().unwrap();
        let quantity = cfg.starting_capital() / price;
        prop_assert_eq!(holding.quantity, quantity);
        prop_assert_eq!(holding.target_price, price + cfg.min_profit() / quantity);
        prop_assert_eq!(holding.peak_price, price);
        let bought = matches!(eval.signal, Some(Signal::Buy { .. }));
        prop_assert!(bought);
        prop_assert!(eval.position.validate().is_ok());

        // Selling everything at the target realizes the minimum profit.
        let realized = holding.quantity * (holding.target_price - holding.entry_price);
        prop_assert!((realized - cfg.min_profit()).abs() <= cfg.min_profit() * 1e-6);
    }

    /// Peak never decreases and never drops below entry while holding.
    #[test]
    fn peak_is_monotonic(
        cfg in config(),
        entry in 1_000.0f64..100_000.0,
        moves in prop::collection::vec(0.5f64..1.5, 1..40),
    ) {
        let engine = SignalEngine::new(cfg);
        let mut position = engine.evaluate(&engine.initial_position(), quote(entry)).unwrap().position;
        let mut last_peak = entry;

        for m in moves {
            let eval = engine.evaluate(&position, quote(entry * m)).unwrap();
            position = eval.position;
            match &position.phase {
                Phase::Holding(h) => {
                    prop_assert!(h.peak_price >= last_peak);
                    prop_assert!(h.peak_price >= h.entry_price);
                    last_peak = h.peak_price;
                }
                Phase::Idle => break,
            }
        }
    }

    /// Below the target the position never closes, however far it falls.
    #[test]
    fn no_sell_below_target(
        cfg in config(),
        entry in 1_000.0f64..100_000.0,
        moves in prop::collection::vec(0.01f64..3.0, 1..40),
    ) {
        let engine = SignalEngine::new(cfg);
        let mut position = engine.evaluate(&engine.initial_position(), quote(entry)).unwrap().position;

        for m in moves {
            let target = position.holding().unwrap().target_price;
            let price = entry * m;
            let eval = engine.evaluate(&position, quote(price)).unwrap();
            if price < target {
                prop_assert!(eval.signal.is_none());
                prop_assert!(!eval.position.is_idle());
            }
            if eval.position.is_idle() {
                break;
            }
            position = eval.position;
        }
    }

    /// At or above target but above the trailing floor, the position holds.
    #[test]
    fn trailing_gate_holds_until_pullback(
        cfg in config(),
        entry in 1_000.0f64..100_000.0,
        rise in 1.0f64..2.0,
    ) {
        let engine = SignalEngine::new(cfg);
        let position = engine.evaluate(&engine.initial_position(), quote(entry)).unwrap().position;
        let target = position.holding().unwrap().target_price;

        let price = target * rise;
        let eval = engine.evaluate(&position, quote(price)).unwrap();
        // The price just became the peak, so it is above peak * (1 - trail).
        prop_assert!(eval.signal.is_none());
        prop_assert_eq!(eval.position.holding().unwrap().peak_price, price.max(entry));
    }

    /// Every completed round trip appends exactly one trade and earlier
    /// trades are left untouched.
    #[test]
    fn history_is_append_only(
        entry in 1_000.0f64..100_000.0,
        trips in 1usize..6,
    ) {
        let cfg = StrategyConfig::new(100.0, 1.0, 0.01).unwrap();
        let engine = SignalEngine::new(cfg);
        let mut position: Position = engine.initial_position();
        let mut snapshot = Vec::new();

        for n in 1..=trips {
            position = engine.evaluate(&position, quote(entry)).unwrap().position;
            let peak = position.holding().unwrap().target_price * 1.1;
            position = engine.evaluate(&position, quote(peak)).unwrap().position;
            let eval = engine.evaluate(&position, quote(peak * 0.985)).unwrap();
            let sold = matches!(eval.signal, Some(Signal::Sell { .. }));
            prop_assert!(sold);
            position = eval.position;

            prop_assert_eq!(position.history.len(), n);
            prop_assert_eq!(&position.history[..n - 1], &snapshot[..]);
            let t = position.history.last().unwrap();
            let expected = t.quantity * (t.exit_price - t.entry_price);
            prop_assert!((t.profit - expected).abs() <= expected.abs() * 1e-9 + 1e-9);
            snapshot = position.history.clone();
        }
    }
}
