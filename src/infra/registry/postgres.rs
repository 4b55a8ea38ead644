//! PostgreSQL-backed registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{AppError, DatabaseError, ProductRegistry, Pubkey, RegistryEntry};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

pub struct PostgresRegistry {
    pool: PgPool,
}

impl PostgresRegistry {
    /// Connect with custom pool configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<RegistryEntry, AppError> {
        let address: String = row.try_get("address")?;
        let recorded_at: DateTime<Utc> = row.try_get("recorded_at")?;
        Ok(RegistryEntry {
            name: row.try_get("name")?,
            address: address.parse().map_err(|_| {
                AppError::Database(DatabaseError::Query(format!(
                    "Stored address is not valid base58: {}",
                    address
                )))
            })?,
            recorded_at,
        })
    }
}

#[async_trait]
impl ProductRegistry for PostgresRegistry {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self, address), fields(address = %address))]
    async fn record(&self, name: &str, address: &Pubkey) -> Result<RegistryEntry, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO product_registry (name, address, recorded_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE
                SET address = EXCLUDED.address, recorded_at = EXCLUDED.recorded_at
            RETURNING name, address, recorded_at
            "#,
        )
        .bind(name)
        .bind(address.to_string())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_entry(&row)
    }

    #[instrument(skip(self))]
    async fn lookup(&self, name: &str) -> Result<Option<RegistryEntry>, AppError> {
        let row = sqlx::query(
            "SELECT name, address, recorded_at FROM product_registry WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<RegistryEntry>, AppError> {
        let rows = sqlx::query(
            "SELECT name, address, recorded_at FROM product_registry ORDER BY recorded_at DESC, name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }
}
