pub mod gate;
pub mod poller;

use crate::domain::{FeedItem, SourceType};

pub use gate::RetryGate;
pub use poller::{MinDateFn, PollState, Poller};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Up,
    Down,
    /// No positive term, so no request was made.
    Skipped,
}

/// Outcome of one completed poll, sent from a poller to the ingest task.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub source: SourceType,
    pub generation: u64,
    pub status: PollStatus,
    pub items: Vec<FeedItem>,
}

impl PollReport {
    pub fn new(source: SourceType, status: PollStatus, items: Vec<FeedItem>) -> Self {
        Self {
            source,
            generation: 0,
            status,
            items,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}
