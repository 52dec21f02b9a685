pub mod json;
pub mod sqlite;

pub use json::JsonFileStore;
pub use sqlite::SqliteStore;

use common::{Error, Position, Result};

/// Parse and validate a stored payload. Any failure is `CorruptState`.
pub(crate) fn decode(raw: &str) -> Result<Position> {
    let position: Position =
        serde_json::from_str(raw).map_err(|e| Error::CorruptState(e.to_string()))?;
    position.validate()?;
    Ok(position)
}

pub(crate) fn encode(position: &Position) -> Result<String> {
    serde_json::to_string_pretty(position).map_err(|e| Error::Persistence(e.to_string()))
}
