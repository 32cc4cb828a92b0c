use super::{FeedItem, SourceType};

/// Notification delivered to the consumer of an aggregator.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A new, non-blocked item entered the cache.
    NewItem(FeedItem),
    /// Outcome of the latest poll of a source.
    SourceStatus { source: SourceType, up: bool },
    /// A poll of the source completed, whatever its outcome.
    FeedUpdated { source: SourceType },
    /// The cache was purged; carries every remaining valid item in
    /// presentation order.
    CachePurged(Vec<FeedItem>),
}

impl FeedEvent {
    /// Format: "[{kind}] {detail}"
    pub fn format(&self) -> String {
        match self {
            FeedEvent::NewItem(item) => {
                let mut message = format!("[{}] {}", item.source_type, item.headline());
                if let Some(author) = &item.author {
                    message.push_str(" by ");
                    message.push_str(author);
                }
                message.push(' ');
                message.push_str(&item.uri);
                message
            }
            FeedEvent::SourceStatus { source, up } => {
                format!("[{}] source {}", source, if *up { "up" } else { "down" })
            }
            FeedEvent::FeedUpdated { source } => format!("[{}] feed updated", source),
            FeedEvent::CachePurged(items) => format!("[cache] purged, {} valid items", items.len()),
        }
    }
}
