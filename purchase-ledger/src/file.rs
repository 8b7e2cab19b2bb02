use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::{PurchaseLedger, PurchaseRecord};

/// Ledger persisted as a pretty-printed JSON array.
///
/// Every mutation rewrites the whole file (write to a sibling temp file, then
/// rename). A missing or unreadable file is treated as an empty ledger.
pub struct FileLedger {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Vec<PurchaseRecord> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read ledger file, treating as empty");
                return Vec::new();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "ledger file is not valid JSON, treating as empty");
            Vec::new()
        })
    }

    async fn write(&self, records: &[PurchaseRecord]) -> Result<()> {
        let json = serde_json::to_vec_pretty(records).context("Failed to serialise purchases")?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl PurchaseLedger for FileLedger {
    async fn append(&self, record: PurchaseRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read().await;
        records.push(record);
        self.write(&records).await
    }

    async fn list(&self) -> Result<Vec<PurchaseRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await)
    }

    async fn remove(&self, order_id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.read().await;
        let before = records.len();
        records.retain(|r| r.order_id != order_id);
        if records.len() == before {
            return Ok(false);
        }
        self.write(&records).await?;
        Ok(true)
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write(&[]).await
    }
}
