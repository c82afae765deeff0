use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::TokenStore;
use crate::errors::AppError;
use crate::models::token::TokenRecord;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    tenant_id: String,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl From<TokenRow> for TokenRecord {
    fn from(row: TokenRow) -> Self {
        TokenRecord {
            tenant_id: row.tenant_id,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at,
        }
    }
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<TokenRecord>, AppError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT tenant_id, access_token, refresh_token, expires_at
             FROM ghl_tokens WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(TokenRecord::from))
    }

    async fn put(&self, record: TokenRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO ghl_tokens (tenant_id, access_token, refresh_token, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (tenant_id) DO UPDATE SET
                 access_token = EXCLUDED.access_token,
                 refresh_token = EXCLUDED.refresh_token,
                 expires_at = EXCLUDED.expires_at,
                 updated_at = now()",
        )
        .bind(&record.tenant_id)
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, tenant_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM ghl_tokens WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
