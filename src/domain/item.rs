use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::source::{BlockReason, ContentType, SourceType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsContent {
    pub title: String,
    pub summary: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusContent {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageContent {
    pub title: Option<String>,
    pub caption: Option<String>,
    pub thumbnail_uri: Option<String>,
    pub thumbnail_size: Option<ImageSize>,
    /// Available renditions keyed by size label.
    pub sizes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemContent {
    News(NewsContent),
    Status(StatusContent),
    Image(ImageContent),
}

impl ItemContent {
    pub fn content_type(&self) -> ContentType {
        match self {
            ItemContent::News(_) => ContentType::News,
            ItemContent::Status(_) => ContentType::Status,
            ItemContent::Image(_) => ContentType::Image,
        }
    }
}

/// Identity of an item inside the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    ServiceId(SourceType, String),
    Uri(SourceType, String),
}

/// A normalized piece of content from any source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub uri: String,
    pub date: DateTime<Utc>,
    pub author: Option<String>,
    pub avatar_uri: Option<String>,
    pub source_type: SourceType,
    pub service_id: Option<String>,
    #[serde(default)]
    pub block_reason: BlockReason,
    pub content: ItemContent,
}

impl FeedItem {
    pub fn new(
        source_type: SourceType,
        uri: String,
        date: DateTime<Utc>,
        content: ItemContent,
    ) -> Self {
        Self {
            uri,
            date,
            author: None,
            avatar_uri: None,
            source_type,
            service_id: None,
            block_reason: BlockReason::None,
            content,
        }
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author.filter(|a| !a.is_empty());
        self
    }

    pub fn with_avatar(mut self, avatar_uri: Option<String>) -> Self {
        self.avatar_uri = avatar_uri.filter(|a| !a.is_empty());
        self
    }

    pub fn with_service_id(mut self, service_id: Option<String>) -> Self {
        self.service_id = service_id.filter(|id| !id.is_empty());
        self
    }

    pub fn content_type(&self) -> ContentType {
        self.content.content_type()
    }

    pub fn is_blocked(&self) -> bool {
        self.block_reason != BlockReason::None
    }

    pub fn dedup_key(&self) -> DedupKey {
        match &self.service_id {
            Some(id) => DedupKey::ServiceId(self.source_type, id.clone()),
            None => DedupKey::Uri(self.source_type, self.uri.clone()),
        }
    }

    /// Every user-visible text field, attribution included.
    pub fn text_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        if let Some(author) = &self.author {
            fields.push(author);
        }

        match &self.content {
            ItemContent::News(news) => {
                fields.push(&news.title);
                fields.extend(news.summary.as_deref());
                fields.extend(news.body.as_deref());
            }
            ItemContent::Status(status) => fields.push(&status.text),
            ItemContent::Image(image) => {
                fields.extend(image.title.as_deref());
                fields.extend(image.caption.as_deref());
            }
        }

        fields
    }

    /// Number of populated optional fields; a duplicate carrying more of
    /// them resolves something the cached copy was missing.
    pub fn completeness(&self) -> usize {
        let attribution = [
            self.author.is_some(),
            self.avatar_uri.is_some(),
            self.service_id.is_some(),
        ];

        let content = match &self.content {
            ItemContent::News(news) => vec![
                !news.title.is_empty(),
                news.summary.is_some(),
                news.body.is_some(),
            ],
            ItemContent::Status(status) => vec![!status.text.is_empty()],
            ItemContent::Image(image) => vec![
                image.title.is_some(),
                image.caption.is_some(),
                image.thumbnail_uri.is_some(),
                image.thumbnail_size.is_some(),
                !image.sizes.is_empty(),
            ],
        };

        attribution.iter().chain(content.iter()).filter(|set| **set).count()
    }

    /// One-line label for logs and the CLI.
    pub fn headline(&self) -> String {
        match &self.content {
            ItemContent::News(news) => news.title.clone(),
            ItemContent::Status(status) => status.text.clone(),
            ItemContent::Image(image) => image
                .title
                .clone()
                .or_else(|| image.caption.clone())
                .unwrap_or_else(|| "Untitled".to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub fn news_item(uri: &str, title: &str, date: DateTime<Utc>) -> FeedItem {
        FeedItem::new(
            SourceType::News,
            uri.to_string(),
            date,
            ItemContent::News(NewsContent {
                title: title.to_string(),
                summary: None,
                body: None,
            }),
        )
    }

    pub fn status_item(id: &str, text: &str, date: DateTime<Utc>) -> FeedItem {
        FeedItem::new(
            SourceType::Twitter,
            format!("https://twitter.com/i/web/status/{}", id),
            date,
            ItemContent::Status(StatusContent {
                text: text.to_string(),
            }),
        )
        .with_service_id(Some(id.to_string()))
    }

    pub fn image_item(id: &str, title: &str, date: DateTime<Utc>) -> FeedItem {
        FeedItem::new(
            SourceType::Flickr,
            format!("https://www.flickr.com/photos/someone/{}", id),
            date,
            ItemContent::Image(ImageContent {
                title: Some(title.to_string()),
                ..Default::default()
            }),
        )
        .with_service_id(Some(id.to_string()))
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_dedup_key_prefers_service_id() {
        let item = status_item("42", "hello", at(1));
        assert_eq!(
            item.dedup_key(),
            DedupKey::ServiceId(SourceType::Twitter, "42".to_string())
        );
    }

    #[test]
    fn test_dedup_key_falls_back_to_uri() {
        let item = news_item("https://example.com/a", "A", at(1));
        assert_eq!(
            item.dedup_key(),
            DedupKey::Uri(SourceType::News, "https://example.com/a".to_string())
        );
    }

    #[test]
    fn test_empty_service_id_is_ignored() {
        let item = news_item("https://example.com/a", "A", at(1)).with_service_id(Some(String::new()));
        assert!(item.service_id.is_none());
    }

    #[test]
    fn test_text_fields_cover_author_and_content() {
        let mut item = news_item("https://example.com/a", "Title", at(1))
            .with_author(Some("Reporter".to_string()));
        if let ItemContent::News(news) = &mut item.content {
            news.summary = Some("Summary".to_string());
        }

        assert_eq!(item.text_fields(), vec!["Reporter", "Title", "Summary"]);
    }

    #[test]
    fn test_completeness_counts_resolved_fields() {
        let bare = news_item("https://example.com/a", "Title", at(1));
        let richer = bare.clone().with_author(Some("Reporter".to_string()));
        assert!(richer.completeness() > bare.completeness());
    }

    #[test]
    fn test_content_type_follows_variant() {
        assert_eq!(news_item("u", "t", at(1)).content_type(), ContentType::News);
        assert_eq!(status_item("1", "t", at(1)).content_type(), ContentType::Status);
        assert_eq!(image_item("1", "t", at(1)).content_type(), ContentType::Image);
    }
}
