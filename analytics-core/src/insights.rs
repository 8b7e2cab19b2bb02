//! Meta Marketing API insights client.

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::campaigns::CampaignDirectory;
use crate::error::{Error, Result, Service};
use crate::http::{body_snippet, RetryPolicy};
use crate::metrics::{self, FunnelVariant};
use crate::models::{
    AccountSummary, GraphErrorBody, InsightRecord, InsightsPage, PropertyProfile, RawInsight,
};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v19.0";

/// Guard against a paging cursor that never terminates.
const MAX_PAGES: usize = 20;

/// Fields requested for per-campaign rows. A superset of every funnel
/// variant, so derivation can pick the stages it needs.
pub const CAMPAIGN_FIELDS: &[&str] = &[
    "campaign_id",
    "campaign_name",
    "spend",
    "impressions",
    "clicks",
    "ctr",
    "cpc",
    "cpm",
    "reach",
    "frequency",
    "purchase_roas",
    "actions",
];

/// Fields requested for the account rollup.
pub const ACCOUNT_FIELDS: &[&str] = &[
    "spend",
    "purchase_roas",
    "impressions",
    "reach",
    "ctr",
    "actions",
];

// ------------------------------------------------------------------ //
//  Query                                                              //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Account,
    Campaign,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Account => "account",
            Level::Campaign => "campaign",
        }
    }
}

/// The reporting windows the dashboard offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
    Today,
    Yesterday,
    ThisWeek,
}

impl DatePreset {
    /// Map a dashboard `period` query value to a preset.
    pub fn from_period(period: &str) -> Result<Self> {
        match period {
            "today" => Ok(DatePreset::Today),
            "yesterday" => Ok(DatePreset::Yesterday),
            "week" | "thisWeek" | "this_week" => Ok(DatePreset::ThisWeek),
            other => Err(Error::Validation(format!(
                "unknown period '{other}', expected one of: today, yesterday, week"
            ))),
        }
    }

    /// Value of the Graph API `date_preset` parameter.
    pub fn as_graph_param(self) -> &'static str {
        match self {
            DatePreset::Today => "today",
            DatePreset::Yesterday => "yesterday",
            DatePreset::ThisWeek => "this_week_sun_today",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InsightsQuery<'a> {
    pub level: Level,
    pub preset: DatePreset,
    pub fields: &'a [&'a str],
    /// Split rows per day (`time_increment=1`).
    pub daily: bool,
}

impl<'a> InsightsQuery<'a> {
    pub fn campaigns(preset: DatePreset) -> Self {
        Self {
            level: Level::Campaign,
            preset,
            fields: CAMPAIGN_FIELDS,
            daily: true,
        }
    }

    pub fn account(preset: DatePreset) -> Self {
        Self {
            level: Level::Account,
            preset,
            fields: ACCOUNT_FIELDS,
            daily: false,
        }
    }
}

// ------------------------------------------------------------------ //
//  Client                                                             //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone)]
pub struct InsightsSettings {
    pub graph_url: String,
    pub access_token: Option<String>,
    pub ad_account_id: Option<String>,
    pub directory: CampaignDirectory,
    pub variant: FunnelVariant,
    pub property: PropertyProfile,
}

pub struct InsightsClient {
    http: reqwest::Client,
    retry: RetryPolicy,
    graph_url: String,
    access_token: String,
    account: String,
    directory: CampaignDirectory,
    variant: FunnelVariant,
    property: PropertyProfile,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl InsightsClient {
    /// Fails with [`Error::Config`] when the access token or ad account is unset.
    pub fn new(settings: InsightsSettings, http: reqwest::Client, retry: RetryPolicy) -> Result<Self> {
        let (Some(access_token), Some(account_id)) = (
            required(settings.access_token),
            required(settings.ad_account_id),
        ) else {
            return Err(Error::Config(
                "Facebook API credentials are not configured.".to_string(),
            ));
        };

        let account = if account_id.starts_with("act_") {
            account_id
        } else {
            format!("act_{account_id}")
        };

        Ok(Self {
            http,
            retry,
            graph_url: settings.graph_url.trim_end_matches('/').to_string(),
            access_token,
            account,
            directory: settings.directory,
            variant: settings.variant,
            property: settings.property,
        })
    }

    /// Fetch raw insight rows, following paging cursors.
    pub async fn fetch_insights(&self, query: &InsightsQuery<'_>) -> Result<Vec<RawInsight>> {
        let url = format!("{}/{}/insights", self.graph_url, self.account);

        let mut params: Vec<(&str, String)> = vec![
            ("fields", query.fields.join(",")),
            ("level", query.level.as_str().to_string()),
            ("date_preset", query.preset.as_graph_param().to_string()),
            ("access_token", self.access_token.clone()),
        ];
        if query.daily {
            params.push(("time_increment", "1".to_string()));
        }
        if query.level == Level::Campaign && !self.directory.allow_list().is_empty() {
            let filtering = json!([{
                "field": "campaign.id",
                "operator": "IN",
                "value": self.directory.allow_list(),
            }]);
            params.push(("filtering", filtering.to_string()));
        }

        let mut rows = Vec::new();
        let mut request = self.http.get(&url).query(&params);

        for page_no in 1..=MAX_PAGES {
            let page = self.fetch_page(request).await?;
            rows.extend(page.data);

            match page.paging.and_then(|p| p.next) {
                Some(next) => {
                    debug!(page = page_no, "following insights paging cursor");
                    request = self.http.get(next);
                }
                None => {
                    info!(
                        level = query.level.as_str(),
                        preset = query.preset.as_graph_param(),
                        rows = rows.len(),
                        "insights fetched"
                    );
                    return Ok(rows);
                }
            }
        }

        warn!(max_pages = MAX_PAGES, rows = rows.len(), "insights paging truncated");
        Ok(rows)
    }

    async fn fetch_page(&self, request: reqwest::RequestBuilder) -> Result<InsightsPage> {
        let resp = self
            .retry
            .send(Service::Insights, request)
            .await
            .inspect_err(|e| error!(error = %e, "insights request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = body_snippet(resp).await;
            let detail = match serde_json::from_str::<GraphErrorBody>(&body) {
                Ok(graph) => format!(
                    "{} (type={}, code={})",
                    graph.error.message,
                    graph.error.kind.as_deref().unwrap_or("unknown"),
                    graph.error.code.map_or_else(|| "?".to_string(), |c| c.to_string()),
                ),
                Err(_) => body,
            };
            error!(status = status.as_u16(), detail = %detail, "insights API returned an error");
            return Err(Error::upstream(Service::Insights, Some(status.as_u16()), detail));
        }

        resp.json::<InsightsPage>()
            .await
            .map_err(|e| Error::upstream(Service::Insights, Some(status.as_u16()), e.to_string()))
    }

    /// Per-campaign rows for `preset`, derived into dashboard records.
    pub async fn campaign_insights(&self, preset: DatePreset) -> Result<Vec<InsightRecord>> {
        let rows = self.fetch_insights(&InsightsQuery::campaigns(preset)).await?;
        Ok(rows
            .iter()
            .map(|raw| metrics::derive(raw, &self.directory, self.variant))
            .collect())
    }

    /// Account-level rollup, optionally with the per-campaign rows attached.
    pub async fn account_summary(
        &self,
        preset: DatePreset,
        with_details: bool,
    ) -> Result<AccountSummary> {
        let rows = self.fetch_insights(&InsightsQuery::account(preset)).await?;
        let details = if with_details {
            Some(self.campaign_insights(preset).await?)
        } else {
            None
        };
        Ok(metrics::summarize(rows.first(), &self.property, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{build_client, DEFAULT_TIMEOUT};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(graph_url: String) -> InsightsSettings {
        InsightsSettings {
            graph_url,
            access_token: Some("fb-token".into()),
            ad_account_id: Some("12345".into()),
            directory: CampaignDirectory::default(),
            variant: FunnelVariant::FiveStage,
            property: PropertyProfile::default(),
        }
    }

    fn client(server: &MockServer) -> InsightsClient {
        InsightsClient::new(
            settings(server.uri()),
            build_client(DEFAULT_TIMEOUT).unwrap(),
            RetryPolicy::none(),
        )
        .unwrap()
    }

    #[test]
    fn missing_credentials_is_config_error() {
        let mut s = settings("http://unused".into());
        s.access_token = Some("  ".into());
        let err = InsightsClient::new(s, reqwest::Client::new(), RetryPolicy::none())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn period_mapping() {
        assert_eq!(DatePreset::from_period("today").unwrap(), DatePreset::Today);
        assert_eq!(
            DatePreset::from_period("thisWeek").unwrap().as_graph_param(),
            "this_week_sun_today"
        );
        assert!(matches!(
            DatePreset::from_period("fortnight"),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn campaign_query_is_filtered_and_derived() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/act_12345/insights"))
            .and(query_param("level", "campaign"))
            .and(query_param("date_preset", "yesterday"))
            .and(query_param("time_increment", "1"))
            .and(query_param("access_token", "fb-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "date_start": "2024-05-01",
                    "campaign_id": "6898612186993",
                    "spend": "40.00",
                    "actions": [
                        {"action_type": "purchase", "value": "1"},
                        {"action_type": "offsite_conversion.fb_pixel_purchase", "value": "1"}
                    ]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = client(&server)
            .campaign_insights(DatePreset::Yesterday)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].campaign_name, "BART");
        assert_eq!(records[0].counters.purchases, 2);
        assert_eq!(records[0].cost_per_purchase, 20.0);

        let requests = server.received_requests().await.unwrap();
        let filtering = requests[0]
            .url
            .query_pairs()
            .find(|(k, _)| k == "filtering")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let filtering: serde_json::Value = serde_json::from_str(&filtering).unwrap();
        assert_eq!(filtering[0]["field"], "campaign.id");
        assert_eq!(filtering[0]["value"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn follows_paging_cursor() {
        let server = MockServer::start().await;
        let next = format!("{}/page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/act_12345/insights"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"campaign_id": "1"}],
                "paging": {"next": next}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"campaign_id": "2"}],
                "paging": {}
            })))
            .mount(&server)
            .await;

        let rows = client(&server)
            .fetch_insights(&InsightsQuery::campaigns(DatePreset::Today))
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().filter_map(|r| r.campaign_id.as_deref()).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[tokio::test]
    async fn malformed_action_entry_keeps_the_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/act_12345/insights"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {
                        "campaign_id": 6898612187193_i64,
                        "spend": "30",
                        "actions": [
                            {"action_type": "purchase", "value": "2"},
                            {"action_type": "video_view"}
                        ]
                    },
                    {
                        "campaign_id": "6898612186793",
                        "spend": "10",
                        "actions": [{"action_type": "purchase", "value": "1"}]
                    }
                ]
            })))
            .mount(&server)
            .await;

        let records = client(&server)
            .campaign_insights(DatePreset::Today)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].campaign_name, "OKC");
        assert_eq!(records[0].counters.purchases, 2);
        assert_eq!(records[0].cost_per_purchase, 15.0);
        assert_eq!(records[1].campaign_name, "TULSA");
        assert_eq!(records[1].counters.purchases, 1);
    }

    #[tokio::test]
    async fn graph_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Invalid OAuth access token.", "type": "OAuthException", "code": 190}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_insights(&InsightsQuery::account(DatePreset::Today))
            .await
            .unwrap_err();
        match err {
            Error::Upstream { status, detail, .. } => {
                assert_eq!(status, Some(400));
                assert!(detail.contains("Invalid OAuth access token."));
                assert!(detail.contains("code=190"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_account_result_gives_zeroed_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("level", "account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let summary = client(&server)
            .account_summary(DatePreset::Today, false)
            .await
            .unwrap();
        assert_eq!(summary.total_revenue, 0.0);
        assert_eq!(summary.hotels[0].name, "Home Place Suites");
        assert!(summary.hotels[0].details.is_none());
    }
}
