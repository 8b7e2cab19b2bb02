use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{PurchaseLedger, PurchaseRecord};

/// Process-local ledger. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<PurchaseRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PurchaseLedger for MemoryLedger {
    async fn append(&self, record: PurchaseRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PurchaseRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn remove(&self, order_id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.order_id != order_id);
        Ok(records.len() != before)
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}
