//! Purchase ledger: an append-only-ish list of purchase events behind a
//! pluggable store.
//!
//! The backend is chosen once per deployment from a URL:
//!
//! | `LEDGER_URL`              | Backend            |
//! |---------------------------|--------------------|
//! | `memory`                  | [`MemoryLedger`]   |
//! | `file:///path/to/x.json`  | [`FileLedger`]     |
//! | `postgres://…`            | [`PostgresLedger`] |

mod file;
mod memory;
mod postgres;
mod record;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

pub use file::FileLedger;
pub use memory::MemoryLedger;
pub use postgres::PostgresLedger;
pub use record::{total_revenue, NewPurchase, PurchaseRecord, ValidationError};

pub const DEFAULT_LEDGER_URL: &str = "file:///tmp/zapier_purchases.json";

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// Storage contract for purchase records.
///
/// An empty or never-initialised store lists as empty rather than failing.
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    async fn append(&self, record: PurchaseRecord) -> Result<()>;

    /// All records in insertion order.
    async fn list(&self) -> Result<Vec<PurchaseRecord>>;

    /// Remove every record with `order_id`. Returns whether anything was removed.
    async fn remove(&self, order_id: &str) -> Result<bool>;

    async fn clear(&self) -> Result<()>;
}

/// Open the backend described by `url`.
pub async fn open(url: &str) -> Result<Arc<dyn PurchaseLedger>> {
    let ledger: Arc<dyn PurchaseLedger> = if url == "memory" {
        info!("Using in-memory purchase ledger");
        Arc::new(MemoryLedger::new())
    } else if let Some(path) = url.strip_prefix("file://") {
        info!(path, "Using file purchase ledger");
        Arc::new(FileLedger::new(path))
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        info!("Using PostgreSQL purchase ledger");
        let ledger = PostgresLedger::connect(url).await?;
        ledger.migrate().await?;
        Arc::new(ledger)
    } else {
        bail!("unsupported LEDGER_URL scheme: expected memory, file:// or postgres://");
    };
    Ok(ledger)
}
