use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::config::FilterConfig;
use crate::domain::{BlockReason, FeedItem, QueryList};

/// Block-reason pipeline run on every arriving item.
///
/// Rules are checked in order profanity, keyword ban, author ban, uri ban;
/// the first match wins.
#[derive(Debug, Clone)]
pub struct ItemFilter {
    profanity_enabled: bool,
    profanity_words: Vec<String>,
    profanity: Option<Regex>,
}

impl ItemFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let mut filter = Self {
            profanity_enabled: config.profanity_enabled,
            profanity_words: Vec::new(),
            profanity: None,
        };
        filter.set_profanity_words(config.profanity_words.clone());
        filter
    }

    pub fn profanity_enabled(&self) -> bool {
        self.profanity_enabled
    }

    pub fn set_profanity_enabled(&mut self, enabled: bool) {
        self.profanity_enabled = enabled;
    }

    pub fn profanity_words(&self) -> &[String] {
        &self.profanity_words
    }

    pub fn set_profanity_words(&mut self, words: Vec<String>) {
        self.profanity_words = words
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        self.profanity = compile_word_list(&self.profanity_words);
    }

    pub fn classify(&self, item: &FeedItem, queries: &QueryList) -> BlockReason {
        if self.is_profane(item) {
            return BlockReason::Profanity;
        }

        let fields: Vec<String> = item.text_fields().iter().map(|f| f.to_lowercase()).collect();
        if queries
            .keyword_bans()
            .map(str::to_lowercase)
            .any(|word| fields.iter().any(|field| field.contains(&word)))
        {
            return BlockReason::Keyword;
        }

        if let Some(author) = &item.author {
            let author = author.trim_start_matches('@');
            if queries
                .author_bans()
                .any(|banned| banned.trim_start_matches('@').eq_ignore_ascii_case(author))
            {
                return BlockReason::Author;
            }
        }

        if queries.uri_bans().any(|prefix| item.uri.starts_with(prefix)) {
            return BlockReason::Uri;
        }

        BlockReason::None
    }

    fn is_profane(&self, item: &FeedItem) -> bool {
        if !self.profanity_enabled {
            return false;
        }
        match &self.profanity {
            Some(pattern) => item.text_fields().iter().any(|field| pattern.is_match(field)),
            None => false,
        }
    }
}

/// Case-insensitive alternation of the literal words.
fn compile_word_list(words: &[String]) -> Option<Regex> {
    if words.is_empty() {
        return None;
    }

    let pattern = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");

    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(error = %e, "profanity list rejected, filter inactive");
            None
        }
    }
}
