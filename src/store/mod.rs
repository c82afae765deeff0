pub mod file;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::config::{Config, StoreBackend};
use crate::errors::AppError;
use crate::models::token::TokenRecord;

/// Abstraction over token persistence backends.
/// At most one record per tenant; `put` replaces any existing record.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, tenant_id: &str) -> Result<Option<TokenRecord>, AppError>;

    async fn put(&self, record: TokenRecord) -> Result<(), AppError>;

    /// Remove a tenant's record on integration teardown. Removing a
    /// missing record is not an error.
    async fn delete(&self, tenant_id: &str) -> Result<(), AppError>;
}

/// Build the backend named by GHL_TOKEN_STORE.
pub async fn connect(cfg: &Config) -> anyhow::Result<std::sync::Arc<dyn TokenStore>> {
    Ok(match cfg.store_backend {
        StoreBackend::Memory => std::sync::Arc::new(memory::MemoryStore::new()),
        StoreBackend::File => std::sync::Arc::new(file::FileStore::new(&cfg.token_file)),
        StoreBackend::Postgres => {
            let store = postgres::PgStore::connect(&cfg.database_url).await?;
            store.migrate().await?;
            std::sync::Arc::new(store)
        }
    })
}
