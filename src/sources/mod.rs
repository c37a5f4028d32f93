pub mod knowledge_base;
pub mod pcgamingwiki;
pub mod steam_community;


use std::collections::HashSet;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::LaunchOption;

pub const NO_DESCRIPTION: &str = "No description available";

pub const PCGW_BASE: &str = "https://www.pcgamingwiki.com/wiki";
pub const STEAM_COMMUNITY_BASE: &str = "https://steamcommunity.com";

/// Command-like token bounded by whitespace: `-opt`, `--opt`, `+opt`, `/opt`.
pub(crate) static COMMAND_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(-{1,2}[\w\-]+|\+[\w\-]+|/[\w\-]+)(?:\s|$)").unwrap());

/// Shared per-run state handed to the network extractors.
///
/// The base URLs are fields rather than constants so tests can point the
/// extractors at a local fixture server.
pub struct SourceContext {
    pub client: reqwest::Client,
    pub rate_limit: Option<Duration>,
    pub page_timeout: Duration,
    pub guide_timeout: Duration,
    pub store_timeout: Duration,
    pub wiki_base: String,
    pub community_base: String,
}

impl SourceContext {
    pub fn new(
        client: reqwest::Client,
        rate_limit: Option<Duration>,
        page_timeout: Duration,
        guide_timeout: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            client,
            rate_limit,
            page_timeout,
            guide_timeout,
            store_timeout,
            wiki_base: PCGW_BASE.to_string(),
            community_base: STEAM_COMMUNITY_BASE.to_string(),
        }
    }

    /// Fixed pause before an outbound request; the only throttle in the
    /// system.
    pub(crate) async fn throttle(&self) {
        if let Some(delay) = self.rate_limit {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Merge per-source batches into one set with unique commands.
///
/// Batches must be passed in priority order; the first occurrence of a
/// command (compared trimmed and lowercased) wins and keeps its original
/// casing, description and source. Empty commands are dropped.
pub fn merge_options<I>(batches: I) -> Vec<LaunchOption>
where
    I: IntoIterator<Item = Vec<LaunchOption>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for option in batches.into_iter().flatten() {
        let key = option.command.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        if seen.insert(key) {
            merged.push(option);
        }
    }

    merged
}
