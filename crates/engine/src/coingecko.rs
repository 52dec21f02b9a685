use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use common::{Error, Price, PriceFeedConfig, PriceSource, Quote, Result};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const FX_URL: &str = "https://api.exchangerate.host/latest";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Spot price client for the CoinGecko `simple/price` endpoint.
pub struct CoinGeckoClient {
    config: PriceFeedConfig,
    http: Client,
}

impl CoinGeckoClient {
    pub fn new(config: PriceFeedConfig) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    async fn spot(&self, currency: &str) -> Result<f64> {
        let url = format!(
            "{BASE_URL}/simple/price?ids={}&vs_currencies={currency}",
            self.config.asset_id
        );
        debug!(%url, "Fetching spot price");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status} from price API")));
        }

        let body: SimplePrice = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        extract_price(&body, &self.config.asset_id, currency)
    }

    /// USD -> quote currency rate.
    async fn usd_rate(&self) -> Result<f64> {
        let symbol = self.config.currency.to_uppercase();
        let url = format!("{FX_URL}?base=USD&symbols={symbol}");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status} from FX API")));
        }

        let body: FxRates = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        body.rates
            .get(&symbol)
            .copied()
            .ok_or_else(|| Error::Http(format!("FX response has no rate for {symbol}")))
    }

    async fn direct(&self) -> Result<Price> {
        let raw = self.spot(&self.config.currency).await?;
        check_band(raw, &self.config)
    }

    async fn via_usd(&self) -> Result<Price> {
        let usd = self.spot("usd").await?;
        let rate = self.usd_rate().await?;
        debug!(usd, rate, "Converted USD price");
        check_band(usd * rate, &self.config)
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_price(&self) -> Result<Quote> {
        let direct = self.direct().await;
        let price = resolve_price(&self.config, direct, || self.via_usd()).await?;
        Ok(Quote::new(price, Utc::now()))
    }
}

/// Pick the direct quote, or run the USD conversion when the direct one
/// failed and the fallback applies. `fallback` is only invoked in that case.
async fn resolve_price<F, Fut>(
    config: &PriceFeedConfig,
    direct: Result<Price>,
    fallback: F,
) -> Result<Price>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Price>>,
{
    match direct {
        Ok(price) => Ok(price),
        Err(e) if config.usd_fallback && !config.currency.eq_ignore_ascii_case("usd") => {
            warn!(error = %e, "Direct quote failed, falling back to USD conversion");
            fallback().await.map_err(unavailable)
        }
        Err(e) => Err(unavailable(e)),
    }
}

fn unavailable(e: Error) -> Error {
    match e {
        Error::PriceUnavailable(_) => e,
        other => Error::PriceUnavailable(other.to_string()),
    }
}

fn extract_price(body: &SimplePrice, asset_id: &str, currency: &str) -> Result<f64> {
    body.get(asset_id)
        .and_then(|quotes| quotes.get(currency))
        .copied()
        .ok_or_else(|| {
            Error::PriceUnavailable(format!("response has no {asset_id}/{currency} price"))
        })
}

/// Reject prices outside the configured sane band.
pub fn check_band(value: f64, config: &PriceFeedConfig) -> Result<Price> {
    let price = Price::new(value)?;
    if let Some(floor) = config.floor {
        if value < floor {
            return Err(Error::PriceUnavailable(format!(
                "price {value} is below the sanity floor {floor}"
            )));
        }
    }
    if let Some(ceiling) = config.ceiling {
        if value > ceiling {
            return Err(Error::PriceUnavailable(format!(
                "price {value} is above the sanity ceiling {ceiling}"
            )));
        }
    }
    Ok(price)
}

// ─── Response types ───────────────────────────────────────────────────────────

/// `{"bitcoin": {"eur": 50000.0}}`
type SimplePrice = HashMap<String, HashMap<String, f64>>;

#[derive(Deserialize)]
struct FxRates {
    rates: HashMap<String, f64>,
}
