use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{FeedItem, ImageContent, ImageSize, ItemContent, QueryList, SourceType};
use crate::errors::{FeedwallError, FeedwallResult};
use crate::sources::html;
use crate::sources::traits::{ParseContext, RetryPolicy, SourceAdapter};
use crate::transport::FetchRequest;

pub const FLICKR_ENDPOINT: &str = "https://api.flickr.com/services/rest/";

const MIN_INTERVAL: Duration = Duration::from_secs(2 * 60);

const PER_PAGE: &str = "50";

/// Size suffixes requested through `extras`, smallest first.
const SIZE_LABELS: &[&str] = &["sq", "t", "s", "m", "z", "l", "o"];

/// Preferred thumbnail renditions, best first.
const THUMBNAIL_LABELS: &[&str] = &["t", "s", "sq"];

const DEFAULT_BUDDY_ICON: &str = "https://www.flickr.com/images/buddyicon.gif";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    stat: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    photos: Option<PhotoPage>,
}

#[derive(Debug, Deserialize)]
struct PhotoPage {
    #[serde(default)]
    photo: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct FlickrText {
    #[serde(rename = "_content", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Photo {
    id: String,
    owner: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    dateupload: Option<Value>,
    #[serde(default)]
    ownername: Option<String>,
    #[serde(default)]
    iconserver: Option<Value>,
    #[serde(default)]
    iconfarm: Option<Value>,
    #[serde(default)]
    description: Option<FlickrText>,
    #[serde(flatten)]
    extras: HashMap<String, Value>,
}

/// Flickr mixes numbers and numeric strings in the same fields.
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Photo {
    fn date(&self) -> Option<DateTime<Utc>> {
        let secs = self.dateupload.as_ref().and_then(as_u64)?;
        DateTime::from_timestamp(i64::try_from(secs).ok()?, 0)
    }

    fn extra_str(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    fn size(&self, label: &str) -> Option<ImageSize> {
        let width = self.extras.get(&format!("width_{}", label)).and_then(as_u64)?;
        let height = self.extras.get(&format!("height_{}", label)).and_then(as_u64)?;
        Some(ImageSize {
            width: u32::try_from(width).ok()?,
            height: u32::try_from(height).ok()?,
        })
    }

    fn avatar(&self) -> String {
        let server = self.iconserver.as_ref().and_then(as_u64).unwrap_or(0);
        let farm = self.iconfarm.as_ref().and_then(as_u64).unwrap_or(0);

        if server > 0 {
            format!(
                "https://farm{}.staticflickr.com/{}/buddyicons/{}.jpg",
                farm, server, self.owner
            )
        } else {
            DEFAULT_BUDDY_ICON.to_string()
        }
    }

    fn into_item(self, context: &ParseContext) -> Option<FeedItem> {
        let date = self.date()?;
        if !context.admits(&date) {
            return None;
        }

        let sizes: std::collections::BTreeMap<String, String> = SIZE_LABELS
            .iter()
            .filter_map(|label| {
                self.extra_str(&format!("url_{}", label))
                    .map(|uri| (label.to_string(), uri.to_string()))
            })
            .collect();

        // A photo with no rendition has nothing to show
        if sizes.is_empty() {
            return None;
        }

        let thumbnail_label = THUMBNAIL_LABELS
            .iter()
            .find(|label| sizes.contains_key(**label))
            .copied();

        let content = ImageContent {
            title: self.title.as_deref().map(html::decode).filter(|t| !t.is_empty()),
            caption: self
                .description
                .as_ref()
                .map(|d| html::to_text(&d.content))
                .filter(|c| !c.is_empty()),
            thumbnail_uri: thumbnail_label.and_then(|label| sizes.get(label).cloned()),
            thumbnail_size: thumbnail_label.and_then(|label| self.size(label)),
            sizes,
        };

        let uri = format!("https://www.flickr.com/photos/{}/{}", self.owner, self.id);
        let avatar = self.avatar();

        Some(
            FeedItem::new(SourceType::Flickr, uri, date, ItemContent::Image(content))
                .with_author(self.ownername.as_deref().map(html::decode))
                .with_avatar(Some(avatar))
                .with_service_id(Some(self.id)),
        )
    }
}

/// Image search over the Flickr REST API.
pub struct FlickrSource {
    api_key: String,
    cooldown: Duration,
}

impl FlickrSource {
    pub fn new(api_key: Option<&str>, cooldown: Duration) -> FeedwallResult<Self> {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| FeedwallError::MissingCredential {
                source_name: SourceType::Flickr.to_string(),
                credential: "api key",
            })?;

        Ok(Self {
            api_key: api_key.to_string(),
            cooldown,
        })
    }
}

impl SourceAdapter for FlickrSource {
    fn source_type(&self) -> SourceType {
        SourceType::Flickr
    }

    fn min_interval(&self) -> Duration {
        MIN_INTERVAL
    }

    fn build_query(&self, queries: &QueryList) -> Option<FetchRequest> {
        let tags: Vec<&str> = queries.positive().collect();
        if tags.is_empty() {
            return None;
        }

        let extras = std::iter::once("date_upload,owner_name,icon_server,description".to_string())
            .chain(SIZE_LABELS.iter().map(|label| format!("url_{}", label)))
            .collect::<Vec<_>>()
            .join(",");

        let mut url = Url::parse(FLICKR_ENDPOINT).ok()?;
        url.query_pairs_mut()
            .append_pair("method", "flickr.photos.search")
            .append_pair("api_key", &self.api_key)
            .append_pair("tags", &tags.join(","))
            .append_pair("tag_mode", "any")
            .append_pair("sort", "date-posted-desc")
            .append_pair("safe_search", "1")
            .append_pair("extras", &extras)
            .append_pair("per_page", PER_PAGE)
            .append_pair("format", "json")
            .append_pair("nojsoncallback", "1");

        Some(FetchRequest::get(url.to_string()))
    }

    fn process_response(&self, body: &[u8], context: &ParseContext) -> Vec<FeedItem> {
        let response: SearchResponse = match serde_json::from_slice(body) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "unparseable flickr response, no items produced");
                return Vec::new();
            }
        };

        if response.stat != "ok" {
            warn!(
                reason = response.message.as_deref().unwrap_or("unknown"),
                "flickr search failed, no items produced"
            );
            return Vec::new();
        }

        response
            .photos
            .map(|page| page.photo)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Photo>(raw) {
                Ok(photo) => photo.into_item(context),
                Err(e) => {
                    debug!(error = %e, "skipping malformed flickr photo");
                    None
                }
            })
            .collect()
    }

    fn retry_policy(&self, status: u16) -> RetryPolicy {
        RetryPolicy::from_status(status, self.cooldown)
    }
}
