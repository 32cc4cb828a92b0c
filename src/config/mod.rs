pub mod settings;

use std::path::{Path, PathBuf};

use crate::domain::SourceType;
use crate::errors::{FeedwallError, FeedwallResult};

pub use settings::{
    AggregatorConfig, Credentials, DuplicatePolicy, FilterConfig, RetrievalOrder, SourceConfig,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Get the directory where the executable is located
    fn exe_dir() -> Option<PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn from_env() -> FeedwallResult<Self> {
        // Try to load .env from executable's directory first
        if let Some(dir) = Self::exe_dir() {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            }
        }
        // Fall back to current directory
        dotenvy::dotenv().ok();

        let config_path = std::env::var("FEEDWALL_CONFIG").ok().map(PathBuf::from);
        let mut aggregator = match &config_path {
            Some(path) => Self::load_file(path)?,
            None => AggregatorConfig::default(),
        };

        Self::apply_env_overrides(&mut aggregator);

        Ok(Self {
            aggregator,
            config_path,
        })
    }

    pub fn load_file(path: &Path) -> FeedwallResult<AggregatorConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FeedwallError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Credentials and instance come from the environment; a credential
    /// also enables its source.
    fn apply_env_overrides(aggregator: &mut AggregatorConfig) {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("FLICKR_API_KEY") {
            aggregator.credentials.flickr_api_key = Some(key);
            aggregator.sources.entry(SourceType::Flickr).or_default().enabled = true;
        }

        if let Some(token) = non_empty("TWITTER_BEARER_TOKEN") {
            aggregator.credentials.twitter_bearer_token = Some(token);
            aggregator.sources.entry(SourceType::Twitter).or_default().enabled = true;
        }

        if let Some(instance) = non_empty("MASTODON_INSTANCE") {
            aggregator.sources.entry(SourceType::Mastodon).or_default().endpoint = Some(instance);
        }
    }
}
