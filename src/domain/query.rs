use serde::{Deserialize, Serialize};

/// Marks a query entry as a ban term instead of a search term.
pub const BAN_PREFIX: char = '-';

/// One entry of a source's query list.
///
/// Raw syntax: `term` searches, `-word` bans a keyword, `-@name` bans an
/// author and `-http://...` / `-https://...` bans a uri prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTerm {
    Include(String),
    BanKeyword(String),
    BanAuthor(String),
    BanUri(String),
}

impl QueryTerm {
    /// Parse a raw entry; blank entries yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let Some(ban) = raw.strip_prefix(BAN_PREFIX) else {
            return (!raw.is_empty()).then(|| QueryTerm::Include(raw.to_string()));
        };

        let ban = ban.trim();
        if ban.is_empty() {
            return None;
        }

        if let Some(author) = ban.strip_prefix('@') {
            return (!author.is_empty()).then(|| QueryTerm::BanAuthor(author.to_string()));
        }

        if ban.starts_with("http://") || ban.starts_with("https://") {
            return Some(QueryTerm::BanUri(ban.to_string()));
        }

        Some(QueryTerm::BanKeyword(ban.to_string()))
    }

    pub fn to_raw(&self) -> String {
        match self {
            QueryTerm::Include(term) => term.clone(),
            QueryTerm::BanKeyword(word) => format!("{}{}", BAN_PREFIX, word),
            QueryTerm::BanAuthor(author) => format!("{}@{}", BAN_PREFIX, author),
            QueryTerm::BanUri(uri) => format!("{}{}", BAN_PREFIX, uri),
        }
    }
}

/// Ordered query list of one source. Mutated at runtime by the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct QueryList {
    terms: Vec<QueryTerm>,
}

impl QueryList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw entry. Returns false for blank or already present entries.
    pub fn add(&mut self, raw: &str) -> bool {
        match QueryTerm::parse(raw) {
            Some(term) if !self.terms.contains(&term) => {
                self.terms.push(term);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, raw: &str) -> bool {
        let Some(term) = QueryTerm::parse(raw) else {
            return false;
        };
        let before = self.terms.len();
        self.terms.retain(|t| *t != term);
        self.terms.len() != before
    }

    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Search terms, in list order. Ban terms never appear here.
    pub fn positive(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|t| match t {
            QueryTerm::Include(term) => Some(term.as_str()),
            _ => None,
        })
    }

    pub fn keyword_bans(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|t| match t {
            QueryTerm::BanKeyword(word) => Some(word.as_str()),
            _ => None,
        })
    }

    pub fn author_bans(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|t| match t {
            QueryTerm::BanAuthor(author) => Some(author.as_str()),
            _ => None,
        })
    }

    pub fn uri_bans(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|t| match t {
            QueryTerm::BanUri(uri) => Some(uri.as_str()),
            _ => None,
        })
    }
}

impl From<Vec<String>> for QueryList {
    fn from(raw: Vec<String>) -> Self {
        let mut list = QueryList::new();
        for entry in &raw {
            list.add(entry);
        }
        list
    }
}

impl From<QueryList> for Vec<String> {
    fn from(list: QueryList) -> Self {
        list.terms.iter().map(QueryTerm::to_raw).collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for QueryList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = QueryList::new();
        for entry in iter {
            list.add(entry.as_ref());
        }
        list
    }
}
