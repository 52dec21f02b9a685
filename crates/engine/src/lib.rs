pub mod coingecko;
pub mod runner;
pub mod signal;

pub use coingecko::CoinGeckoClient;
pub use runner::{Runner, TickOutcome, TickReport, TickWarning};
pub use signal::{Evaluation, SignalEngine};
