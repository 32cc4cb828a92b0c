use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{FeedItem, ItemContent, QueryList, SourceType, StatusContent};
use crate::errors::{FeedwallError, FeedwallResult};
use crate::sources::html;
use crate::sources::traits::{ParseContext, RetryPolicy, SourceAdapter};
use crate::transport::FetchRequest;

pub const DEFAULT_INSTANCE: &str = "mastodon.social";

const MIN_INTERVAL: Duration = Duration::from_secs(60);

const PAGE_LIMIT: &str = "40";

#[derive(Debug, Deserialize)]
struct Account {
    acct: String,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    url: Option<String>,
    uri: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    spoiler_text: String,
    account: Account,
}

impl Status {
    fn into_item(self, context: &ParseContext) -> Option<FeedItem> {
        if !context.admits(&self.created_at) {
            return None;
        }

        // Mastodon posts are HTML; content warnings go first
        let body = html::to_text(&self.content);
        let text = match html::decode(&self.spoiler_text) {
            warning if warning.is_empty() => body,
            warning if body.is_empty() => warning,
            warning => format!("{}: {}", warning, body),
        };
        if text.is_empty() {
            return None;
        }

        let uri = self.url.filter(|u| !u.is_empty()).unwrap_or(self.uri);

        Some(
            FeedItem::new(
                SourceType::Mastodon,
                uri,
                self.created_at,
                ItemContent::Status(StatusContent { text }),
            )
            .with_author(Some(self.account.acct))
            .with_avatar(self.account.avatar)
            .with_service_id(Some(self.id)),
        )
    }
}

/// Public hashtag timeline of a Mastodon instance.
pub struct MastodonSource {
    instance: Url,
    cooldown: Duration,
}

impl MastodonSource {
    pub fn new(instance: &str, cooldown: Duration) -> FeedwallResult<Self> {
        let host = instance
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');

        if host.is_empty() {
            return Err(FeedwallError::Config("Mastodon instance is empty".to_string()));
        }

        let instance = Url::parse(&format!("https://{}/", host))?;
        Ok(Self { instance, cooldown })
    }

    fn normalize_tag(term: &str) -> String {
        term.trim().trim_start_matches('#').replace(' ', "")
    }
}

impl SourceAdapter for MastodonSource {
    fn source_type(&self) -> SourceType {
        SourceType::Mastodon
    }

    fn min_interval(&self) -> Duration {
        MIN_INTERVAL
    }

    fn build_query(&self, queries: &QueryList) -> Option<FetchRequest> {
        let tags: Vec<String> = queries
            .positive()
            .map(Self::normalize_tag)
            .filter(|tag| !tag.is_empty())
            .collect();
        let (first, rest) = tags.split_first()?;

        let mut url = self.instance.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["api", "v1", "timelines", "tag", first.as_str()]);

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", PAGE_LIMIT);
            for tag in rest {
                pairs.append_pair("any[]", tag);
            }
        }

        Some(FetchRequest::get(url.to_string()))
    }

    fn process_response(&self, body: &[u8], context: &ParseContext) -> Vec<FeedItem> {
        let statuses: Vec<Value> = match serde_json::from_slice(body) {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(error = %e, "unparseable mastodon timeline, no items produced");
                return Vec::new();
            }
        };

        statuses
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Status>(raw) {
                Ok(status) => status.into_item(context),
                Err(e) => {
                    debug!(error = %e, "skipping malformed mastodon status");
                    None
                }
            })
            .collect()
    }

    fn retry_policy(&self, status: u16) -> RetryPolicy {
        RetryPolicy::from_status(status, self.cooldown)
    }
}
