use crate::Signal;

/// Asset and currency labels used when rendering messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLabels {
    /// Traded asset symbol, e.g. "BTC".
    pub asset: String,
    /// Quote currency code, e.g. "EUR".
    pub currency: String,
}

impl MessageLabels {
    pub fn new(asset: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            currency: currency.into().to_uppercase(),
        }
    }

    /// `50500.0` -> `"50 500.00 EUR"`.
    pub fn money(&self, amount: f64) -> String {
        format!("{} {}", group_thousands(amount), self.currency)
    }
}

/// Two decimals, space-separated thousands.
pub fn group_thousands(amount: f64) -> String {
    let raw = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && raw != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// Render the notification text for a signal.
pub fn render_signal(signal: &Signal, labels: &MessageLabels) -> String {
    match signal {
        Signal::Buy {
            price,
            quantity,
            capital,
            target_price,
            min_profit,
        } => format!(
            "🔔 SIGNAL: BUY\n\n\
             Current price: {price}\n\
             Quantity: {quantity:.6} {asset} (capital {capital})\n\
             Target price (profit ≥ {min_profit}): {target}\n\n\
             ➡️ After buying, wait for the SELL signal.",
            price = labels.money(*price),
            asset = labels.asset,
            capital = labels.money(*capital),
            min_profit = labels.money(*min_profit),
            target = labels.money(*target_price),
        ),
        Signal::Sell {
            price,
            quantity,
            profit,
            capital,
        } => format!(
            "💰 SIGNAL: SELL\n\n\
             Current price: {price}\n\
             Sold: {quantity:.6} {asset}\n\
             Profit: {profit}\n\
             New capital: {capital}\n\n\
             ➡️ After selling, wait for the next BUY signal.",
            price = labels.money(*price),
            asset = labels.asset,
            profit = labels.money(*profit),
            capital = labels.money(*capital),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> MessageLabels {
        MessageLabels::new("BTC", "eur")
    }

    #[test]
    fn groups_thousands_with_spaces() {
        assert_eq!(group_thousands(0.0), "0.00");
        assert_eq!(group_thousands(999.999), "1 000.00");
        assert_eq!(group_thousands(50_500.0), "50 500.00");
        assert_eq!(group_thousands(1_234_567.891), "1 234 567.89");
        assert_eq!(group_thousands(-2.8), "-2.80");
    }

    #[test]
    fn currency_code_is_uppercased() {
        assert_eq!(labels().money(100.0), "100.00 EUR");
    }

    #[test]
    fn buy_message_lists_price_quantity_capital_and_target() {
        let text = render_signal(
            &Signal::Buy {
                price: 50_000.0,
                quantity: 0.002,
                capital: 100.0,
                target_price: 50_500.0,
                min_profit: 1.0,
            },
            &labels(),
        );
        assert!(text.contains("SIGNAL: BUY"));
        assert!(text.contains("Current price: 50 000.00 EUR"));
        assert!(text.contains("Quantity: 0.002000 BTC (capital 100.00 EUR)"));
        assert!(text.contains("Target price (profit ≥ 1.00 EUR): 50 500.00 EUR"));
    }

    #[test]
    fn sell_message_lists_price_quantity_profit_and_capital() {
        let text = render_signal(
            &Signal::Sell {
                price: 51_400.0,
                quantity: 0.002,
                profit: 2.8,
                capital: 102.8,
            },
            &labels(),
        );
        assert!(text.contains("SIGNAL: SELL"));
        assert!(text.contains("Current price: 51 400.00 EUR"));
        assert!(text.contains("Sold: 0.002000 BTC"));
        assert!(text.contains("Profit: 2.80 EUR"));
        assert!(text.contains("New capital: 102.80 EUR"));
    }
}
