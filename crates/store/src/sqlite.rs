use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tracing::{debug, info};

use common::{Error, Position, Result, StateStore};

use crate::{decode, encode};

/// Stores the position as a JSON payload in a single-row SQLite table.
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let db = SqlitePool::connect_with(options).await?;
        Self::new(db).await
    }

    pub async fn new(db: SqlitePool) -> Result<Self> {
        sqlx::migrate!()
            .run(&db)
            .await
            .map_err(sqlx::Error::from)?;
        info!("State database ready");
        Ok(Self { db })
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn load(&self) -> Result<Option<Position>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM position_state WHERE id = 1")
                .fetch_optional(&self.db)
                .await?;

        match payload {
            Some(raw) => decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, position: &Position) -> Result<()> {
        let payload = encode(position)?;
        let updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO position_state (id, payload, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at
            "#,
        )
        .bind(&payload)
        .bind(&updated_at)
        .execute(&self.db)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;

        debug!(phase = %position.phase, "Saved position to database");
        Ok(())
    }
}
