use async_trait::async_trait;
use dashmap::DashMap;

use super::TokenStore;
use crate::errors::AppError;
use crate::models::token::TokenRecord;

/// In-memory backend. DashMap gives per-key locking, so concurrent refreshes
/// for different tenants never contend and two writers for the same tenant
/// serialize on the shard lock.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, TokenRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<TokenRecord>, AppError> {
        Ok(self.records.get(tenant_id).map(|r| r.clone()))
    }

    async fn put(&self, record: TokenRecord) -> Result<(), AppError> {
        self.records.insert(record.tenant_id.clone(), record);
        Ok(())
    }

    async fn delete(&self, tenant_id: &str) -> Result<(), AppError> {
        self.records.remove(tenant_id);
        Ok(())
    }
}
