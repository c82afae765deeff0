use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::TokenStore;
use crate::errors::AppError;
use crate::models::token::TokenRecord;

/// JSON-file backend: the whole tenant map is rewritten on every put/delete.
/// A single mutex covers every access — reads included, since
/// `tokio::fs::write` is not atomic and an unlocked reader could parse a
/// half-written file. It also satisfies the at-most-one-writer-per-tenant
/// requirement.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, TokenRecord>, AppError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| AppError::Store(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(AppError::Store(e.to_string())),
        }
    }

    async fn save(&self, records: &HashMap<String, TokenRecord>) -> Result<(), AppError> {
        let bytes =
            serde_json::to_vec_pretty(records).map_err(|e| AppError::Store(e.to_string()))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| AppError::Store(e.to_string()))
    }
}

#[async_trait]
impl TokenStore for FileStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<TokenRecord>, AppError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(tenant_id))
    }

    async fn put(&self, record: TokenRecord) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(record.tenant_id.clone(), record);
        self.save(&records).await
    }

    async fn delete(&self, tenant_id: &str) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        if records.remove(tenant_id).is_some() {
            self.save(&records).await?;
        }
        Ok(())
    }
}
