//! Upstream clients and metric derivation for the campaign dashboard.
//!
//! - [`token_cache`]: client-credentials token cache with single-flight refresh
//! - [`recordings`]: Hotjar session recordings
//! - [`insights`]: Meta Marketing API insights
//! - [`metrics`]: pure funnel / cost derivation over raw insight rows
//! - [`campaigns`]: campaign id → display name lookup and allow-list

pub mod campaigns;
pub mod error;
pub mod http;
pub mod insights;
pub mod metrics;
pub mod models;
pub mod recordings;
pub mod token_cache;

pub use error::{Error, Result, Service};
