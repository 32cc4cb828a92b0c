use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{FeedItem, ItemContent, NewsContent, QueryList, SourceType};
use crate::errors::{FeedwallError, FeedwallResult};
use crate::sources::html;
use crate::sources::traits::{ParseContext, RetryPolicy, SourceAdapter};
use crate::transport::FetchRequest;

/// Placeholder replaced by the encoded search terms.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Default endpoint: a news search returning RSS.
pub const DEFAULT_NEWS_ENDPOINT: &str = "https://news.google.com/rss/search?q={query}";

/// Syndication feeds are shared infrastructure; do not hammer them.
const MIN_INTERVAL: Duration = Duration::from_secs(5 * 60);

const MAX_TITLE_CHARS: usize = 200;

/// Link candidates of one entry, highest priority first.
#[derive(Debug, Default)]
struct LinkCandidates<'a> {
    own: Option<&'a str>,
    original: Option<&'a str>,
    /// (rel, href) pairs in document order.
    links: Vec<(Option<&'a str>, &'a str)>,
}

impl<'a> LinkCandidates<'a> {
    fn resolve(&self, fallback: &str) -> String {
        let non_empty = |s: &&str| !s.trim().is_empty();

        self.own
            .filter(non_empty)
            .or_else(|| self.original.filter(non_empty))
            .or_else(|| {
                self.links
                    .iter()
                    .find(|(rel, href)| *rel == Some("alternate") && non_empty(href))
                    .map(|(_, href)| *href)
            })
            .or_else(|| self.links.iter().map(|(_, href)| *href).find(non_empty))
            .unwrap_or(fallback)
            .trim()
            .to_string()
    }
}

/// RSS/Atom syndication adapter.
pub struct NewsSource {
    endpoint: String,
    cooldown: Duration,
}

impl NewsSource {
    pub fn new(endpoint: &str, cooldown: Duration) -> FeedwallResult<Self> {
        // Validate with the placeholder filled in
        Url::parse(&endpoint.replace(QUERY_PLACEHOLDER, "query"))
            .map_err(|e| FeedwallError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            cooldown,
        })
    }

    fn is_search(&self) -> bool {
        self.endpoint.contains(QUERY_PLACEHOLDER)
    }

    fn parse_rss(channel: &rss::Channel, context: &ParseContext) -> Vec<FeedItem> {
        let avatar = channel.image().map(|image| image.url().to_string());

        channel
            .items()
            .iter()
            .filter_map(|item| {
                let item_news = Self::rss_item(item, avatar.as_deref(), context);
                if item_news.is_none() {
                    debug!(guid = ?item.guid().map(|g| g.value()), "skipping incomplete rss item");
                }
                item_news
            })
            .collect()
    }

    fn rss_item(item: &rss::Item, avatar: Option<&str>, context: &ParseContext) -> Option<FeedItem> {
        let date = item
            .pub_date()
            .and_then(parse_date)
            .or_else(|| {
                item.dublin_core_ext()
                    .and_then(|dc| dc.dates().first())
                    .and_then(|d| parse_date(d))
            })?;

        if !context.admits(&date) {
            return None;
        }

        let content = news_content(item.title(), item.description(), item.content())?;

        let original = item
            .extensions()
            .get("feedburner")
            .and_then(|ext| ext.get("origLink"))
            .and_then(|values| values.first())
            .and_then(|value| value.value());

        // atom:link elements first, the permalink guid last
        let mut links: Vec<(Option<&str>, &str)> = item
            .extensions()
            .get("atom")
            .and_then(|ext| ext.get("link"))
            .map(|links| {
                links
                    .iter()
                    .filter_map(|link| {
                        let attrs = link.attrs();
                        let href = attrs.get("href")?;
                        // Atom treats a missing rel as "alternate"
                        let rel = attrs.get("rel").map(String::as_str).unwrap_or("alternate");
                        Some((Some(rel), href.as_str()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        links.extend(item.guid().filter(|g| g.is_permalink()).map(|g| (None, g.value())));

        let candidates = LinkCandidates {
            own: item.link(),
            original,
            links,
        };

        let author = item.author().map(String::from).or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.creators().first().cloned())
        });

        Some(
            FeedItem::new(
                SourceType::News,
                candidates.resolve(&context.request_url),
                date,
                ItemContent::News(content),
            )
            .with_author(author.map(|a| html::decode(&a)))
            .with_avatar(avatar.map(String::from))
            .with_service_id(item.guid().map(|g| g.value().to_string())),
        )
    }

    /// Atom and JSON Feed bodies, or RSS the strict reader rejected.
    fn read_syndication(body: &[u8]) -> FeedwallResult<feed_rs::model::Feed> {
        feed_rs::parser::parse(body).map_err(|e| FeedwallError::FeedParse(e.to_string()))
    }

    fn parse_syndication(
        feed: feed_rs::model::Feed,
        origins: &[Option<String>],
        context: &ParseContext,
    ) -> Vec<FeedItem> {
        // Only trusted when every entry was accounted for
        let origins: &[Option<String>] = if origins.len() == feed.entries.len() {
            origins
        } else {
            &[]
        };

        let avatar = feed
            .logo
            .as_ref()
            .or(feed.icon.as_ref())
            .map(|image| image.uri.clone());

        feed.entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let date = entry.published.or(entry.updated)?;
                if !context.admits(&date) {
                    return None;
                }

                let content = news_content(
                    entry.title.as_ref().map(|t| t.content.as_str()),
                    entry.summary.as_ref().map(|s| s.content.as_str()),
                    entry.content.as_ref().and_then(|c| c.body.as_deref()),
                )?;

                let candidates = LinkCandidates {
                    own: None,
                    original: origins.get(index).and_then(Option::as_deref),
                    links: entry
                        .links
                        .iter()
                        .map(|l| (Some(l.rel.as_deref().unwrap_or("alternate")), l.href.as_str()))
                        .collect(),
                };
                let uri = candidates.resolve(&context.request_url);

                Some(
                    FeedItem::new(SourceType::News, uri, date, ItemContent::News(content))
                        .with_author(entry.authors.first().map(|p| html::decode(&p.name)))
                        .with_avatar(avatar.clone())
                        .with_service_id(Some(entry.id)),
                )
            })
            .collect()
    }
}

/// `feedburner:origLink` of every entry, in document order. feed-rs drops
/// unknown elements, so these are read from the raw body.
fn feedburner_origins(body: &[u8]) -> Vec<Option<String>> {
    let Ok(text) = std::str::from_utf8(body) else {
        return Vec::new();
    };
    let (Ok(entry), Ok(orig_link)) = (
        Regex::new(r"(?s)<(?:entry|item)[\s>].*?</(?:entry|item)>"),
        Regex::new(r"(?s)<feedburner:origLink[^>]*>(.*?)</feedburner:origLink>"),
    ) else {
        return Vec::new();
    };

    entry
        .find_iter(text)
        .map(|block| {
            orig_link
                .captures(block.as_str())
                .map(|c| html::decode(&c[1]))
                .filter(|link| !link.is_empty())
        })
        .collect()
}

/// Build the news variant; an entry with neither title nor any text is
/// unusable.
fn news_content(
    title: Option<&str>,
    description: Option<&str>,
    body: Option<&str>,
) -> Option<NewsContent> {
    let summary = description.map(html::to_text).filter(|s| !s.is_empty());
    let body = body.map(|b| b.trim().to_string()).filter(|b| !b.is_empty());

    let title = title
        .map(html::decode)
        .filter(|t| !t.is_empty())
        .or_else(|| summary.as_deref().map(|s| html::truncate_for_title(s, MAX_TITLE_CHARS)))
        .or_else(|| {
            body.as_deref()
                .map(html::to_text)
                .filter(|t| !t.is_empty())
                .map(|t| html::truncate_for_title(&t, MAX_TITLE_CHARS))
        })?;

    Some(NewsContent {
        title,
        summary,
        body,
    })
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

impl SourceAdapter for NewsSource {
    fn source_type(&self) -> SourceType {
        SourceType::News
    }

    fn min_interval(&self) -> Duration {
        MIN_INTERVAL
    }

    fn build_query(&self, queries: &QueryList) -> Option<FetchRequest> {
        if !self.is_search() {
            return Some(FetchRequest::get(self.endpoint.clone()));
        }

        let terms: Vec<&str> = queries.positive().collect();
        if terms.is_empty() {
            return None;
        }

        let encoded: String =
            url::form_urlencoded::byte_serialize(terms.join(" OR ").as_bytes()).collect();
        Some(FetchRequest::get(self.endpoint.replace(QUERY_PLACEHOLDER, &encoded)))
    }

    fn process_response(&self, body: &[u8], context: &ParseContext) -> Vec<FeedItem> {
        if let Ok(channel) = rss::Channel::read_from(body) {
            return Self::parse_rss(&channel, context);
        }

        match Self::read_syndication(body) {
            Ok(feed) => Self::parse_syndication(feed, &feedburner_origins(body), context),
            Err(e) => {
                warn!(url = %context.request_url, error = %e, "unparseable feed, no items produced");
                Vec::new()
            }
        }
    }

    fn retry_policy(&self, status: u16) -> RetryPolicy {
        RetryPolicy::from_status(status, self.cooldown)
    }
}
