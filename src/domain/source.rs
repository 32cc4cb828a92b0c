use serde::{Deserialize, Serialize};

/// Which adapter produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    News,
    Flickr,
    Twitter,
    Mastodon,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::News,
        SourceType::Flickr,
        SourceType::Twitter,
        SourceType::Mastodon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::News => "news",
            SourceType::Flickr => "flickr",
            SourceType::Twitter => "twitter",
            SourceType::Mastodon => "mastodon",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "news" | "rss" | "atom" => Ok(SourceType::News),
            "flickr" => Ok(SourceType::Flickr),
            "twitter" => Ok(SourceType::Twitter),
            "mastodon" => Ok(SourceType::Mastodon),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Primary content variant of an item, used for interleaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    News,
    Status,
    Image,
}

impl ContentType {
    /// Round-robin order used when distributing content evenly.
    pub const ROTATION: [ContentType; 3] = [ContentType::News, ContentType::Status, ContentType::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::News => "news",
            ContentType::Status => "status",
            ContentType::Image => "image",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why the filter pipeline hid an item from the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockReason {
    #[default]
    None,
    Profanity,
    Keyword,
    Author,
    Uri,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_source_type_round_trips_through_str() {
        for source in SourceType::ALL {
            assert_eq!(SourceType::from_str(source.as_str()).unwrap(), source);
        }
    }

    #[test]
    fn test_source_type_aliases() {
        assert_eq!(SourceType::from_str("RSS").unwrap(), SourceType::News);
        assert_eq!(SourceType::from_str("atom").unwrap(), SourceType::News);
        assert!(SourceType::from_str("facebook").is_err());
    }

    #[test]
    fn test_block_reason_defaults_to_none() {
        assert_eq!(BlockReason::default(), BlockReason::None);
    }
}
