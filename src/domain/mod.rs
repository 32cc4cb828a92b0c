pub mod source;
pub mod item;
pub mod query;
pub mod event;

pub use source::{BlockReason, ContentType, SourceType};
pub use item::{DedupKey, FeedItem, ImageContent, ImageSize, ItemContent, NewsContent, StatusContent};
pub use query::{QueryList, QueryTerm, BAN_PREFIX};
pub use event::FeedEvent;
