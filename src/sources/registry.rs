use std::sync::Arc;

use tracing::warn;

use crate::config::{AggregatorConfig, SourceConfig};
use crate::domain::SourceType;
use crate::errors::{FeedwallError, FeedwallResult};
use crate::sources::flickr::FlickrSource;
use crate::sources::mastodon::{MastodonSource, DEFAULT_INSTANCE};
use crate::sources::news::{NewsSource, DEFAULT_NEWS_ENDPOINT};
use crate::sources::traits::SourceAdapter;
use crate::sources::twitter::TwitterSource;

/// The adapters of one aggregator, at most one per source type.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every enabled source. A source whose configuration is invalid is
    /// left out and its error returned; the others are unaffected.
    pub fn from_config(config: &AggregatorConfig) -> (Self, Vec<(SourceType, FeedwallError)>) {
        let mut registry = Self::new();
        let mut failures = Vec::new();

        for (source_type, source_config) in config.enabled_sources() {
            match Self::build(*source_type, source_config, config) {
                Ok(adapter) => registry.register(adapter),
                Err(e) => {
                    warn!(source = %source_type, error = %e, "source disabled");
                    failures.push((*source_type, e));
                }
            }
        }

        (registry, failures)
    }

    /// Construct the adapter for one source type.
    pub fn build(
        source_type: SourceType,
        source_config: &SourceConfig,
        config: &AggregatorConfig,
    ) -> FeedwallResult<Arc<dyn SourceAdapter>> {
        let cooldown = config.cooldown();

        let adapter: Arc<dyn SourceAdapter> = match source_type {
            SourceType::News => Arc::new(NewsSource::new(
                source_config.endpoint.as_deref().unwrap_or(DEFAULT_NEWS_ENDPOINT),
                cooldown,
            )?),
            SourceType::Flickr => Arc::new(FlickrSource::new(
                config.credentials.flickr_api_key.as_deref(),
                cooldown,
            )?),
            SourceType::Twitter => Arc::new(TwitterSource::new(
                config.credentials.twitter_bearer_token.as_deref(),
                cooldown,
            )?),
            SourceType::Mastodon => Arc::new(MastodonSource::new(
                source_config.endpoint.as_deref().unwrap_or(DEFAULT_INSTANCE),
                cooldown,
            )?),
        };

        Ok(adapter)
    }

    /// Add an adapter, replacing any adapter of the same source type.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let source_type = adapter.source_type();
        self.adapters.retain(|a| a.source_type() != source_type);
        self.adapters.push(adapter);
    }

    #[cfg(test)]
    pub(crate) fn find(&self, source_type: SourceType) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.source_type() == source_type)
    }

    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
