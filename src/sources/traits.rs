use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{FeedItem, QueryList, SourceType};
use crate::transport::FetchRequest;

/// Default wait after a failed or rate-limited poll.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2 * 60 * 60);

/// What a poll outcome means for the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Poll again on the next tick.
    Clear,
    /// Do not poll again before this much time has passed.
    Cooldown(Duration),
    /// The source is gone.
    Never,
}

impl RetryPolicy {
    /// Wall-clock retry-not-before timestamp for this policy.
    pub fn not_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            RetryPolicy::Clear => DateTime::<Utc>::UNIX_EPOCH,
            RetryPolicy::Cooldown(wait) => chrono::Duration::from_std(*wait)
                .ok()
                .and_then(|wait| now.checked_add_signed(wait))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            RetryPolicy::Never => DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Standard mapping: 200 clears, 404 is final, anything else cools down.
    pub fn from_status(status: u16, cooldown: Duration) -> Self {
        match status {
            200 => RetryPolicy::Clear,
            404 => RetryPolicy::Never,
            _ => RetryPolicy::Cooldown(cooldown),
        }
    }
}

/// Per-response inputs an adapter needs while parsing.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Entries published before this instant are dropped.
    pub min_date: DateTime<Utc>,
    /// The uri the body was fetched from.
    pub request_url: String,
}

impl ParseContext {
    pub fn new(min_date: DateTime<Utc>, request_url: impl Into<String>) -> Self {
        Self {
            min_date,
            request_url: request_url.into(),
        }
    }

    pub fn admits(&self, date: &DateTime<Utc>) -> bool {
        *date >= self.min_date
    }
}

pub trait SourceAdapter: Send + Sync {
    /// Identifies this source type
    fn source_type(&self) -> SourceType;

    /// Shortest poll interval the source tolerates.
    fn min_interval(&self) -> Duration;

    /// Build the request for the next poll from the positive terms.
    /// `None` means there is nothing to ask for.
    fn build_query(&self, queries: &QueryList) -> Option<FetchRequest>;

    /// Turn a 200 body into items. Never fails: unparseable input yields
    /// no items.
    fn process_response(&self, body: &[u8], context: &ParseContext) -> Vec<FeedItem>;

    /// How long to hold off after a response with this status.
    fn retry_policy(&self, status: u16) -> RetryPolicy;
}
