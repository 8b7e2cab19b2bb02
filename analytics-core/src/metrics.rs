//! Funnel and cost metrics derived from raw insight rows.
//!
//! Everything here is pure: no I/O, no clock, no logging.

use crate::campaigns::CampaignDirectory;
use crate::models::{
    AccountSummary, ActionCounters, ActionValue, FunnelMetrics, HotelSummary, InsightRecord,
    Numeric, PropertyProfile, RawInsight,
};

// ------------------------------------------------------------------ //
//  Action types                                                       //
// ------------------------------------------------------------------ //

pub const LANDING_PAGE_VIEW: &str = "landing_page_view";
pub const SEARCH: &str = "search";
pub const ADD_TO_CART: &str = "add_to_cart";
pub const INITIATE_CHECKOUT: &str = "initiate_checkout";
pub const ADD_PAYMENT_INFO: &str = "add_payment_info";
pub const PURCHASE: &str = "purchase";
pub const PIXEL_PURCHASE: &str = "offsite_conversion.fb_pixel_purchase";

/// Which stage sequence the funnel rates follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FunnelVariant {
    /// view → search → cart → checkout → purchase
    FourStage,
    /// view → search → cart → checkout → payment info → purchase
    #[default]
    FiveStage,
}

impl FunnelVariant {
    /// `"four"`/`"4"` or `"five"`/`"5"`, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "four" | "4" => Some(FunnelVariant::FourStage),
            "five" | "5" => Some(FunnelVariant::FiveStage),
            _ => None,
        }
    }
}

// ------------------------------------------------------------------ //
//  Primitives                                                         //
// ------------------------------------------------------------------ //

/// `numerator / denominator × 100`, or 0 when the denominator is 0.
///
/// Not clamped: a downstream count above its upstream count yields > 100.
pub fn calculate_rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

fn float(field: &Option<Numeric>) -> f64 {
    field.as_ref().and_then(Numeric::as_f64).unwrap_or(0.0)
}

fn count(field: &Option<Numeric>) -> u64 {
    field.as_ref().and_then(Numeric::as_count).unwrap_or(0)
}

/// Value of the first entry with `action_type`, or 0.
pub fn action_value(actions: &[ActionValue], action_type: &str) -> u64 {
    actions
        .iter()
        .find(|a| a.action_type == action_type)
        .and_then(|a| a.value.as_ref())
        .and_then(Numeric::as_count)
        .unwrap_or(0)
}

pub fn extract_counters(actions: &[ActionValue]) -> ActionCounters {
    ActionCounters {
        lpv: action_value(actions, LANDING_PAGE_VIEW),
        searches: action_value(actions, SEARCH),
        atc: action_value(actions, ADD_TO_CART),
        ic: action_value(actions, INITIATE_CHECKOUT),
        add_payment_info: action_value(actions, ADD_PAYMENT_INFO),
        purchases: action_value(actions, PURCHASE)
            .saturating_add(action_value(actions, PIXEL_PURCHASE)),
    }
}

/// First `purchase_roas` entry, or 0.
pub fn roas(raw: &RawInsight) -> f64 {
    raw.purchase_roas
        .as_deref()
        .and_then(<[ActionValue]>::first)
        .and_then(|entry| entry.value.as_ref())
        .and_then(Numeric::as_f64)
        .unwrap_or(0.0)
}

/// `spend / purchases`, or 0 with no purchases.
pub fn cost_per_purchase(spend: f64, purchases: u64) -> f64 {
    if purchases == 0 {
        return 0.0;
    }
    spend / purchases as f64
}

pub fn funnel(counters: &ActionCounters, variant: FunnelVariant) -> FunnelMetrics {
    let c = counters;
    let (ic_to_api_rate, api_to_purchase_rate) = match variant {
        FunnelVariant::FiveStage => (
            Some(calculate_rate(c.add_payment_info, c.ic)),
            Some(calculate_rate(c.purchases, c.add_payment_info)),
        ),
        FunnelVariant::FourStage => (None, None),
    };

    FunnelMetrics {
        lpv_to_search_rate: calculate_rate(c.searches, c.lpv),
        search_to_atc_rate: calculate_rate(c.atc, c.searches),
        atc_to_ic_rate: calculate_rate(c.ic, c.atc),
        ic_to_api_rate,
        api_to_purchase_rate,
        ic_to_purchase_rate: calculate_rate(c.purchases, c.ic),
    }
}

// ------------------------------------------------------------------ //
//  Record derivation                                                  //
// ------------------------------------------------------------------ //

/// Turn one raw insight row into the record served to dashboard clients.
pub fn derive(
    raw: &RawInsight,
    directory: &CampaignDirectory,
    variant: FunnelVariant,
) -> InsightRecord {
    let counters = extract_counters(raw.actions.as_deref().unwrap_or_default());
    let spend = float(&raw.spend);
    let roas = roas(raw);

    let campaign_name = match (&raw.campaign_id, &raw.campaign_name) {
        (Some(id), _) => directory.display_name(id).to_string(),
        (None, Some(name)) => name.clone(),
        (None, None) => String::new(),
    };

    InsightRecord {
        date: raw.date_start.clone(),
        campaign_id: raw.campaign_id.clone(),
        campaign_name,
        spend,
        impressions: count(&raw.impressions),
        clicks: count(&raw.clicks),
        ctr: float(&raw.ctr),
        cpc: float(&raw.cpc),
        cpm: float(&raw.cpm),
        reach: count(&raw.reach),
        frequency: float(&raw.frequency),
        roas,
        revenue: spend * roas,
        cost_per_purchase: cost_per_purchase(spend, counters.purchases),
        funnel: funnel(&counters, variant),
        counters,
    }
}

/// Roll an account-level insight row up into the dashboard summary.
///
/// `None` (no data for the period) yields the same shape filled with zeros.
pub fn summarize(
    account: Option<&RawInsight>,
    property: &PropertyProfile,
    details: Option<Vec<InsightRecord>>,
) -> AccountSummary {
    let (total_revenue, cpa, ctr, reach) = match account {
        Some(raw) => {
            let spend = float(&raw.spend);
            let counters = extract_counters(raw.actions.as_deref().unwrap_or_default());
            (
                spend * roas(raw),
                cost_per_purchase(spend, counters.purchases),
                float(&raw.ctr),
                count(&raw.reach),
            )
        }
        None => (0.0, 0.0, 0.0, 0),
    };

    AccountSummary {
        total_revenue,
        hotels: vec![HotelSummary {
            name: property.name.clone(),
            location: property.location.clone(),
            cpa,
            ctr,
            reach,
            details,
        }],
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
