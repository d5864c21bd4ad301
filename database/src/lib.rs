//! SQLite-backed key-value store that survives host restarts.

use async_trait::async_trait;
use chrono::Utc;
use feedlens_core::{CoreError, DatabaseError, Store};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info, warn};


const MIGRATIONS: &[(&str, &str)] = &[(
    "001_create_kv",
    "CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
)];

const UPSERT: &str = "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    /// Connects, creates the file when missing, and applies migrations.
    pub async fn open(connection_string: String) -> Result<Self, CoreError> {
        let mut db = Self::new(connection_string);
        db.connect().await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to store at {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        let pool = self.pool()?;
        for (name, sql) in MIGRATIONS {
            sqlx::query(sql)
                .execute(pool)
                .await
                .map_err(|e| DatabaseError::MigrationFailed {
                    migration: format!("{name}: {e}"),
                })?;
            debug!("Applied migration {}", name);
        }
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    fn pool(&self) -> Result<&SqlitePool, DatabaseError> {
        self.pool.as_ref().ok_or_else(|| DatabaseError::ConnectionFailed {
            reason: "database is not connected".to_string(),
        })
    }

    pub async fn keys(&self) -> Result<Vec<String>, CoreError> {
        let rows = sqlx::query("SELECT key FROM kv ORDER BY key")
            .fetch_all(self.pool()?)
            .await
            .map_err(DatabaseError::from)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::from(e).into())
    }
}

#[async_trait]
impl Store for Database {
    async fn get(&self, key: &str) -> Result<Option<Value>, CoreError> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool()?)
            .await
            .map_err(DatabaseError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.try_get("value").map_err(DatabaseError::from)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Stored value for {} is not valid JSON: {}", key, e);
                Err(DatabaseError::CorruptValue {
                    key: key.to_string(),
                }
                .into())
            }
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CoreError> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool()?)
            .await
            .map_err(DatabaseError::from)?;
        debug!("Stored {}", key);
        Ok(())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), CoreError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool()?.begin().await.map_err(DatabaseError::from)?;
        for (key, value) in &entries {
            sqlx::query(UPSERT)
                .bind(key)
                .bind(value.to_string())
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from)?;
        }
        tx.commit().await.map_err(DatabaseError::from)?;
        debug!("Stored {} entries", entries.len());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(self.pool()?)
            .await
            .map_err(DatabaseError::from)?;
        debug!("Removed {}", key);
        Ok(())
    }
}
