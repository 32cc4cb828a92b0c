pub mod traits;
pub mod html;
pub mod news;
pub mod flickr;
pub mod twitter;
pub mod mastodon;
pub mod registry;

pub use traits::{ParseContext, RetryPolicy, SourceAdapter, DEFAULT_COOLDOWN};
pub use registry::SourceRegistry;
