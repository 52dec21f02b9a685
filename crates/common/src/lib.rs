pub mod config;
pub mod error;
pub mod format;
pub mod ports;
pub mod types;

pub use config::{Config, DeliveryMode, PriceFeedConfig, StateBackend, StrategyConfig};
pub use error::{Error, Result};
pub use ports::{Notifier, PriceSource, StateStore};
pub use types::*;
