//! Campaign id → display name lookup and the insights allow-list.

use std::collections::BTreeMap;

/// Campaigns tracked by the dashboard when nothing else is configured.
pub const DEFAULT_CAMPAIGNS: &[(&str, &str)] = &[
    ("6898612187193", "OKC"),
    ("6898612186993", "BART"),
    ("6898612186793", "TULSA"),
];

/// Read-only mapping used both for naming rows and for filtering the
/// insights request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignDirectory {
    names: BTreeMap<String, String>,
    allow_list: Vec<String>,
}

impl Default for CampaignDirectory {
    fn default() -> Self {
        Self::new(
            DEFAULT_CAMPAIGNS
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string())),
        )
    }
}

impl CampaignDirectory {
    /// Build a directory whose allow-list is exactly the mapped ids.
    pub fn new(names: impl IntoIterator<Item = (String, String)>) -> Self {
        let names: BTreeMap<String, String> = names.into_iter().collect();
        let allow_list = names.keys().cloned().collect();
        Self { names, allow_list }
    }

    /// Replace the allow-list (ids need not be mapped).
    pub fn with_allow_list(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.allow_list = ids.into_iter().collect();
        self
    }

    /// Parse `id=name,id=name`. Entries without `=` or with an empty id are skipped.
    pub fn parse_names(raw: &str) -> Vec<(String, String)> {
        raw.split(',')
            .filter_map(|entry| {
                let (id, name) = entry.split_once('=')?;
                let (id, name) = (id.trim(), name.trim());
                (!id.is_empty()).then(|| (id.to_string(), name.to_string()))
            })
            .collect()
    }

    /// Parse a comma separated id list, ignoring blanks.
    pub fn parse_ids(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Display name for `id`, or `id` itself when unmapped.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.names.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn allow_list(&self) -> &[String] {
        &self.allow_list
    }
}
