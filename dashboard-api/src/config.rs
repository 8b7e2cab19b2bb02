//! Runtime settings, resolved once at startup.
//!
//! # Environment variables
//! | Var                       | Default                              |
//! |---------------------------|--------------------------------------|
//! | `DASHBOARD_ADDR`          | `0.0.0.0:3000`                       |
//! | `FB_ACCESS_TOKEN`         | required for insights routes         |
//! | `FB_AD_ACCOUNT_ID`        | required for insights routes         |
//! | `FB_CAMPAIGN_NAMES`       | built-in campaign table (`id=name,…`)|
//! | `FB_CAMPAIGN_IDS`         | ids of the campaign table            |
//! | `META_GRAPH_URL`          | `https://graph.facebook.com/v19.0`   |
//! | `HOTJAR_CLIENT_ID`        | required for recordings              |
//! | `HOTJAR_CLIENT_SECRET`    | required for recordings              |
//! | `HOTJAR_SITE_ID`          | required for recordings              |
//! | `HOTJAR_API_URL`          | `https://api.hotjar.io`              |
//! | `LEDGER_URL`              | `file:///tmp/zapier_purchases.json`  |
//! | `VAPID_PUBLIC_KEY`        | optional                             |
//! | `VAPID_PRIVATE_KEY`       | optional                             |
//! | `PROPERTY_NAME`           | `Home Place Suites`                  |
//! | `PROPERTY_LOCATION`       | `Bartlesville`                       |
//! | `FUNNEL_VARIANT`          | `five`                               |
//! | `UPSTREAM_TIMEOUT_SECS`   | `10`                                 |
//! | `UPSTREAM_MAX_RETRIES`    | `2`                                  |
//!
//! Missing upstream credentials do not stop the service; the affected
//! routes answer with a configuration error instead.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use analytics_core::campaigns::CampaignDirectory;
use analytics_core::http::{RetryPolicy, DEFAULT_TIMEOUT};
use analytics_core::insights::{InsightsSettings, DEFAULT_GRAPH_URL};
use analytics_core::metrics::FunnelVariant;
use analytics_core::models::PropertyProfile;
use analytics_core::recordings::{RecordingsSettings, DEFAULT_API_URL};
use anyhow::{anyhow, bail, Context, Result};
use purchase_ledger::DEFAULT_LEDGER_URL;

use crate::secrets::SecretsClient;

/// Every setting name [`Settings::load`] resolves.
pub const SETTING_NAMES: &[&str] = &[
    "DASHBOARD_ADDR",
    "FB_ACCESS_TOKEN",
    "FB_AD_ACCOUNT_ID",
    "FB_CAMPAIGN_NAMES",
    "FB_CAMPAIGN_IDS",
    "META_GRAPH_URL",
    "HOTJAR_CLIENT_ID",
    "HOTJAR_CLIENT_SECRET",
    "HOTJAR_SITE_ID",
    "HOTJAR_API_URL",
    "LEDGER_URL",
    "VAPID_PUBLIC_KEY",
    "VAPID_PRIVATE_KEY",
    "PROPERTY_NAME",
    "PROPERTY_LOCATION",
    "FUNNEL_VARIANT",
    "UPSTREAM_TIMEOUT_SECS",
    "UPSTREAM_MAX_RETRIES",
];

/// Web Push (VAPID) key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VapidKeys {
    pub public_key: String,
    pub private_key: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub insights: InsightsSettings,
    pub recordings: RecordingsSettings,
    pub ledger_url: String,
    pub vapid: Option<VapidKeys>,
    pub upstream_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Settings {
    /// Resolve every setting through `secrets` (Bitwarden, then env).
    pub async fn load(secrets: &SecretsClient) -> Result<Self> {
        let mut values = HashMap::new();
        for name in SETTING_NAMES {
            if let Some(value) = secrets.lookup(name).await {
                values.insert(name.to_string(), value);
            }
        }
        Self::from_values(&values)
    }

    /// Build settings from already-resolved values. Blank values count as unset.
    pub fn from_values(values: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| {
            values
                .get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let names = match get("FB_CAMPAIGN_NAMES") {
            Some(raw) => CampaignDirectory::new(CampaignDirectory::parse_names(&raw)),
            None => CampaignDirectory::default(),
        };
        let directory = match get("FB_CAMPAIGN_IDS") {
            Some(ids) => names.with_allow_list(CampaignDirectory::parse_ids(&ids)),
            None => names,
        };

        let variant = match get("FUNNEL_VARIANT") {
            Some(v) => FunnelVariant::parse(&v)
                .ok_or_else(|| anyhow!("FUNNEL_VARIANT must be 'four' or 'five', got '{v}'"))?,
            None => FunnelVariant::default(),
        };

        let defaults = PropertyProfile::default();
        let property = PropertyProfile {
            name: get("PROPERTY_NAME").unwrap_or(defaults.name),
            location: get("PROPERTY_LOCATION").unwrap_or(defaults.location),
        };

        let vapid = match (get("VAPID_PUBLIC_KEY"), get("VAPID_PRIVATE_KEY")) {
            (Some(public_key), Some(private_key)) => Some(VapidKeys {
                public_key,
                private_key,
            }),
            _ => None,
        };

        let upstream_timeout = match get("UPSTREAM_TIMEOUT_SECS") {
            Some(v) => match parse_number::<u64>("UPSTREAM_TIMEOUT_SECS", &v)? {
                0 => bail!("UPSTREAM_TIMEOUT_SECS must be at least 1, got '{v}'"),
                secs => Duration::from_secs(secs),
            },
            None => DEFAULT_TIMEOUT,
        };
        let retry = match get("UPSTREAM_MAX_RETRIES") {
            Some(v) => RetryPolicy {
                max_retries: parse_number("UPSTREAM_MAX_RETRIES", &v)?,
                ..RetryPolicy::default()
            },
            None => RetryPolicy::default(),
        };

        Ok(Self {
            bind_addr: get("DASHBOARD_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            insights: InsightsSettings {
                graph_url: get("META_GRAPH_URL").unwrap_or_else(|| DEFAULT_GRAPH_URL.to_string()),
                access_token: get("FB_ACCESS_TOKEN"),
                ad_account_id: get("FB_AD_ACCOUNT_ID"),
                directory,
                variant,
                property,
            },
            recordings: RecordingsSettings {
                api_url: get("HOTJAR_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                client_id: get("HOTJAR_CLIENT_ID"),
                client_secret: get("HOTJAR_CLIENT_SECRET"),
                site_id: get("HOTJAR_SITE_ID"),
            },
            ledger_url: get("LEDGER_URL").unwrap_or_else(|| DEFAULT_LEDGER_URL.to_string()),
            vapid,
            upstream_timeout,
            retry,
        })
    }
}

fn parse_number<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{name} must be a non-negative integer, got '{value}'"))
}
