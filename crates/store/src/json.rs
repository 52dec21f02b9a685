use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use common::{Error, Position, Result, StateStore};

use crate::{decode, encode};

/// Stores the position as pretty-printed JSON in a single file.
///
/// Writes go to a sibling `.tmp` file that is flushed to disk and then
/// renamed over the target, so readers see either the old or the new
/// payload, including after a crash.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<Position>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        debug!(path = %self.path.display(), bytes = raw.len(), "Loaded state file");
        decode(&raw).map(Some)
    }

    async fn save(&self, position: &Position) -> Result<()> {
        let raw = encode(position)?;
        let tmp = self.tmp_path();
        let persist = |e: std::io::Error| Error::Persistence(format!("{}: {e}", self.path.display()));

        let mut file = fs::File::create(&tmp).await.map_err(persist)?;
        file.write_all(raw.as_bytes()).await.map_err(persist)?;
        file.sync_all().await.map_err(persist)?;
        drop(file);
        fs::rename(&tmp, &self.path).await.map_err(persist)?;

        debug!(path = %self.path.display(), phase = %position.phase, "Saved state file");
        Ok(())
    }
}
