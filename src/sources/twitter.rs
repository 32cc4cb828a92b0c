use std::collections::HashMap;
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

pub const TWITTER_SEARCH_ENDPOINT: &str = "https://api.twitter.com/2/tweets/search/recent";

const MIN_INTERVAL: Duration = Duration::from_secs(60);

const MAX_RESULTS: &str = "50";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    includes: Option<Includes>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
    #[serde(default)]
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    author_id: Option<String>,
}

impl Tweet {
    fn into_item(self, users: &HashMap<&str, &User>, context: &ParseContext) -> Option<FeedItem> {
        if !context.admits(&self.created_at) {
            return None;
        }

        let text = html::decode(&self.text);
        if text.is_empty() {
            return None;
        }

        let user = self
            .author_id
            .as_deref()
            .and_then(|id| users.get(id).copied());

        let uri = match user {
            Some(user) => format!("https://twitter.com/{}/status/{}", user.username, self.id),
            None => format!("https://twitter.com/i/web/status/{}", self.id),
        };

        Some(
            FeedItem::new(
                SourceType::Twitter,
                uri,
                self.created_at,
                ItemContent::Status(StatusContent { text }),
            )
            .with_author(user.map(|u| u.username.clone()))
            .with_avatar(user.and_then(|u| u.profile_image_url.clone()))
            .with_service_id(Some(self.id)),
        )
    }
}

/// Status search over the Twitter v2 recent search API.
pub struct TwitterSource {
    bearer_token: String,
    cooldown: Duration,
}

impl TwitterSource {
    pub fn new(bearer_token: Option<&str>, cooldown: Duration) -> FeedwallResult<Self> {
        let bearer_token = bearer_token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| FeedwallError::MissingCredential {
                source_name: SourceType::Twitter.to_string(),
                credential: "bearer token",
            })?;

        Ok(Self {
            bearer_token: bearer_token.to_string(),
            cooldown,
        })
    }

    fn search_expression(terms: &[&str]) -> String {
        let quoted: Vec<String> = terms
            .iter()
            .map(|term| {
                if term.contains(' ') {
                    format!("\"{}\"", term)
                } else {
                    term.to_string()
                }
            })
            .collect();

        format!("({}) -is:retweet", quoted.join(" OR "))
    }
}

impl SourceAdapter for TwitterSource {
    fn source_type(&self) -> SourceType {
        SourceType::Twitter
    }

    fn min_interval(&self) -> Duration {
        MIN_INTERVAL
    }

    fn build_query(&self, queries: &QueryList) -> Option<FetchRequest> {
        let terms: Vec<&str> = queries.positive().collect();
        if terms.is_empty() {
            return None;
        }

        let mut url = Url::parse(TWITTER_SEARCH_ENDPOINT).ok()?;
        url.query_pairs_mut()
            .append_pair("query", &Self::search_expression(&terms))
            .append_pair("max_results", MAX_RESULTS)
            .append_pair("tweet.fields", "created_at,author_id")
            .append_pair("expansions", "author_id")
            .append_pair("user.fields", "username,profile_image_url");

        Some(FetchRequest::get(url.to_string()).with_bearer_token(self.bearer_token.clone()))
    }

    fn process_response(&self, body: &[u8], context: &ParseContext) -> Vec<FeedItem> {
        let response: SearchResponse = match serde_json::from_slice(body) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "unparseable twitter response, no items produced");
                return Vec::new();
            }
        };

        let includes = response.includes.unwrap_or_default();
        let users: HashMap<&str, &User> = includes
            .users
            .iter()
            .map(|user| (user.id.as_str(), user))
            .collect();

        response
            .data
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Tweet>(raw) {
                Ok(tweet) => tweet.into_item(&users, context),
                Err(e) => {
                    debug!(error = %e, "skipping malformed tweet");
                    None
                }
            })
            .collect()
    }

    fn retry_policy(&self, status: u16) -> RetryPolicy {
        RetryPolicy::from_status(status, self.cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::traits::DEFAULT_COOLDOWN;
    use chrono::TimeZone;

    fn source() -> TwitterSource {
        TwitterSource::new(Some("token"), DEFAULT_COOLDOWN).unwrap()
    }

    fn context() -> ParseContext {
        ParseContext::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            TWITTER_SEARCH_ENDPOINT,
        )
    }

    const SAMPLE: &str = r#"{
      "data": [
        {"id": "1001", "text": "Rust &amp; tokio are great", "author_id": "7", "created_at": "2024-02-01T10:00:00.000Z"},
        {"id": "1002", "author_id": "7", "created_at": "2024-02-01T10:05:00.000Z"},
        {"id": "1003", "text": "orphan tweet", "author_id": "99", "created_at": "2024-02-01T10:06:00.000Z"},
        {"id": "1004", "text": "no timestamp", "author_id": "7"}
      ],
      "includes": {
        "users": [
          {"id": "7", "name": "Ferris", "username": "ferris", "profile_image_url": "https://pbs.twimg.com/ferris.png"}
        ]
      },
      "meta": {"result_count": 4}
    }"#;

    #[test]
    fn test_parses_complete_tweets() {
        let items = source().process_response(SAMPLE.as_bytes(), &context());
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.service_id.as_deref(), Some("1001"));
        assert_eq!(first.uri, "https://twitter.com/ferris/status/1001");
        assert_eq!(first.author.as_deref(), Some("ferris"));
        assert_eq!(first.avatar_uri.as_deref(), Some("https://pbs.twimg.com/ferris.png"));
        assert_eq!(
            first.content,
            ItemContent::Status(StatusContent {
                text: "Rust & tokio are great".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_author_uses_generic_link() {
        let items = source().process_response(SAMPLE.as_bytes(), &context());
        assert_eq!(items[1].uri, "https://twitter.com/i/web/status/1003");
        assert!(items[1].author.is_none());
    }

    #[test]
    fn test_empty_result() {
        let body = br#"{"meta":{"result_count":0}}"#;
        assert!(source().process_response(body, &context()).is_empty());
    }

    #[test]
    fn test_garbage_yields_nothing() {
        assert!(source().process_response(b"{", &context()).is_empty());
    }

    #[test]
    fn test_build_query_carries_token_and_terms() {
        let queries: QueryList = ["rustlang", "-crypto", "async rust"].into_iter().collect();
        let request = source().build_query(&queries).unwrap();

        assert_eq!(request.bearer_token.as_deref(), Some("token"));
        let url = Url::parse(&request.url).unwrap();
        let query = url
            .query_pairs()
            .find(|(k, _)| k == "query")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(query, "(rustlang OR \"async rust\") -is:retweet");
    }

    #[test]
    fn test_missing_token_is_a_config_error() {
        assert!(TwitterSource::new(None, DEFAULT_COOLDOWN).is_err());
    }

    #[test]
    fn test_rate_limit_cools_down() {
        assert_eq!(
            source().retry_policy(429),
            RetryPolicy::Cooldown(DEFAULT_COOLDOWN)
        );
    }
}
