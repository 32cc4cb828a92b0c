use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::ordering::{self, Sequenced};
use crate::config::{DuplicatePolicy, RetrievalOrder};
use crate::domain::{DedupKey, FeedItem};

/// Result of offering an item to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Inserted,
    /// A cached duplicate was overwritten; the arrival slot is kept.
    Replaced { was_blocked: bool },
    Duplicate,
    TooOld,
}

/// Deduplicated store of every admitted item, blocked ones included.
#[derive(Debug)]
pub struct ItemCache {
    entries: HashMap<DedupKey, Sequenced>,
    next_seq: u64,
    policy: DuplicatePolicy,
}

impl ItemCache {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: &DedupKey) -> Option<&FeedItem> {
        self.entries.get(key).map(|e| &e.item)
    }

    pub fn insert(&mut self, item: FeedItem, min_date: DateTime<Utc>) -> Admission {
        if item.date < min_date {
            return Admission::TooOld;
        }

        let key = item.dedup_key();
        if let Some(existing) = self.entries.get_mut(&key) {
            let replace = match self.policy {
                DuplicatePolicy::KeepExisting => false,
                DuplicatePolicy::ReplaceIfMoreComplete => {
                    item.completeness() > existing.item.completeness()
                }
                DuplicatePolicy::AlwaysReplace => true,
            };

            if !replace {
                return Admission::Duplicate;
            }
            let was_blocked = existing.item.is_blocked();
            existing.item = item;
            return Admission::Replaced { was_blocked };
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, Sequenced { seq, item });
        Admission::Inserted
    }

    /// Drop items older than `min_date`, then the oldest beyond `max_items`.
    /// Returns how many were removed.
    pub fn evict(&mut self, min_date: DateTime<Utc>, max_items: usize) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.item.date >= min_date);

        if self.entries.len() > max_items {
            let mut by_age: Vec<(DateTime<Utc>, u64, DedupKey)> = self
                .entries
                .iter()
                .map(|(key, e)| (e.item.date, e.seq, key.clone()))
                .collect();
            by_age.sort_by_key(|(date, seq, _)| (*date, *seq));

            let excess = self.entries.len() - max_items;
            for (_, _, key) in by_age.into_iter().take(excess) {
                self.entries.remove(&key);
            }
        }

        before - self.entries.len()
    }

    /// Snapshot of the consumer-visible items.
    pub fn valid_items(&self, order: RetrievalOrder, distribute: bool) -> Vec<FeedItem> {
        let entries = self
            .entries
            .values()
            .filter(|e| !e.item.is_blocked())
            .cloned()
            .collect();
        ordering::arrange(entries, order, distribute)
    }
}
