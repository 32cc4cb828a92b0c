use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QueryList, SourceType};
use crate::sources::mastodon::DEFAULT_INSTANCE;
use crate::sources::news::DEFAULT_NEWS_ENDPOINT;

/// Order in which valid items are offered to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalOrder {
    #[default]
    NewestFirst,
    OldestFirst,
    Arrival,
}

/// What happens when an item arrives whose dedup key is already cached.
///
/// A replacement is filtered afresh. When it turns a blocked entry visible a
/// `NewItem` event follows; a visible entry that becomes blocked simply drops
/// out of the valid items without an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    KeepExisting,
    /// Replace only when the newcomer fills in fields the cached copy lacks.
    #[default]
    ReplaceIfMoreComplete,
    AlwaysReplace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    /// Requested poll interval; raised to the source minimum when lower.
    pub interval_secs: u64,
    /// Search terms and ban terms (`-word`, `-@author`, `-https://...`).
    pub queries: QueryList,
    /// News endpoint template or Mastodon instance; other sources ignore it.
    pub endpoint: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            queries: QueryList::new(),
            endpoint: None,
        }
    }
}

impl SourceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Secrets are read from the environment and never written back out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    #[serde(skip_serializing)]
    pub flickr_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub twitter_bearer_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub profanity_enabled: bool,
    pub profanity_words: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            profanity_enabled: true,
            profanity_words: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub sources: BTreeMap<SourceType, SourceConfig>,
    pub credentials: Credentials,
    /// Items published before this instant are never admitted.
    pub min_date: Option<DateTime<Utc>>,
    /// Sliding window: items older than this are aged out.
    pub max_age_secs: Option<u64>,
    pub max_items: usize,
    pub purge_interval_secs: u64,
    /// Wait after a failed poll before the source is asked again.
    pub cooldown_secs: u64,
    pub request_timeout_secs: u64,
    pub distribute_evenly: bool,
    pub retrieval_order: RetrievalOrder,
    pub duplicate_policy: DuplicatePolicy,
    pub filter: FilterConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let mut sources = BTreeMap::new();
        sources.insert(
            SourceType::News,
            SourceConfig {
                endpoint: Some(DEFAULT_NEWS_ENDPOINT.to_string()),
                ..SourceConfig::default()
            },
        );
        sources.insert(
            SourceType::Flickr,
            SourceConfig {
                enabled: false,
                interval_secs: 120,
                ..SourceConfig::default()
            },
        );
        sources.insert(
            SourceType::Twitter,
            SourceConfig {
                enabled: false,
                interval_secs: 60,
                ..SourceConfig::default()
            },
        );
        sources.insert(
            SourceType::Mastodon,
            SourceConfig {
                interval_secs: 60,
                endpoint: Some(DEFAULT_INSTANCE.to_string()),
                ..SourceConfig::default()
            },
        );

        Self {
            sources,
            credentials: Credentials::default(),
            min_date: None,
            max_age_secs: Some(24 * 60 * 60),
            max_items: 500,
            purge_interval_secs: 60,
            cooldown_secs: 2 * 60 * 60,
            request_timeout_secs: 30,
            distribute_evenly: false,
            retrieval_order: RetrievalOrder::default(),
            duplicate_policy: DuplicatePolicy::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Effective minimum item date at `now`: the later of the fixed minimum
    /// and the sliding window edge.
    pub fn min_date_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let fixed = self.min_date.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let sliding = self
            .max_age_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| now.checked_sub_signed(chrono::Duration::seconds(secs)))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        fixed.max(sliding)
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = (&SourceType, &SourceConfig)> {
        self.sources.iter().filter(|(_, source)| source.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults_enable_credential_free_sources() {
        let config = AggregatorConfig::default();
        let enabled: Vec<SourceType> = config.enabled_sources().map(|(s, _)| *s).collect();
        assert_eq!(enabled, vec![SourceType::News, SourceType::Mastodon]);
    }

    #[test]
    fn test_min_date_takes_later_bound() {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        let mut config = AggregatorConfig {
            max_age_secs: Some(24 * 60 * 60),
            ..AggregatorConfig::default()
        };
        assert_eq!(
            config.min_date_at(now),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );

        config.min_date = Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        assert_eq!(
            config.min_date_at(now),
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
        );

        config.max_age_secs = None;
        config.min_date = None;
        assert_eq!(config.min_date_at(now), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "distribute_evenly": true,
            "retrieval_order": "arrival",
            "sources": {"news": {"queries": ["rust", "-spam"], "interval_secs": 600}}
        }"#;
        let config: AggregatorConfig = serde_json::from_str(json).unwrap();

        assert!(config.distribute_evenly);
        assert_eq!(config.retrieval_order, RetrievalOrder::Arrival);
        assert_eq!(config.max_items, 500);

        let news = &config.sources[&SourceType::News];
        assert_eq!(news.interval_secs, 600);
        assert!(news.enabled);
        assert_eq!(news.queries.positive().collect::<Vec<_>>(), vec!["rust"]);
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_credentials_are_not_serialized() {
        let mut config = AggregatorConfig::default();
        config.credentials.twitter_bearer_token = Some("secret".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
