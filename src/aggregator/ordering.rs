use std::cmp::Reverse;
use std::collections::VecDeque;

use crate::config::RetrievalOrder;
use crate::domain::{ContentType, FeedItem};

/// A cached item together with its arrival sequence number.
#[derive(Debug, Clone)]
pub struct Sequenced {
    pub seq: u64,
    pub item: FeedItem,
}

pub fn sort(entries: &mut [Sequenced], order: RetrievalOrder) {
    match order {
        RetrievalOrder::NewestFirst => {
            entries.sort_by_key(|e| (Reverse(e.item.date), Reverse(e.seq)))
        }
        RetrievalOrder::OldestFirst => entries.sort_by_key(|e| (e.item.date, e.seq)),
        RetrievalOrder::Arrival => entries.sort_by_key(|e| e.seq),
    }
}

/// Order the entries and, when `distribute` is set, interleave the content
/// types round-robin so no single type dominates the head of the list.
pub fn arrange(mut entries: Vec<Sequenced>, order: RetrievalOrder, distribute: bool) -> Vec<FeedItem> {
    sort(&mut entries, order);

    if !distribute {
        return entries.into_iter().map(|e| e.item).collect();
    }

    let mut groups: Vec<VecDeque<FeedItem>> =
        ContentType::ROTATION.iter().map(|_| VecDeque::new()).collect();
    for entry in entries {
        let slot = ContentType::ROTATION
            .iter()
            .position(|t| *t == entry.item.content_type())
            .unwrap_or(0);
        groups[slot].push_back(entry.item);
    }

    interleave(groups)
}

/// Take one from each non-empty group in turn until all are drained.
fn interleave(mut groups: Vec<VecDeque<FeedItem>>) -> Vec<FeedItem> {
    let total = groups.iter().map(VecDeque::len).sum();
    let mut result = Vec::with_capacity(total);

    while result.len() < total {
        for group in groups.iter_mut() {
            if let Some(item) = group.pop_front() {
                result.push(item);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::tests::{image_item, news_item, status_item};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn sequenced(items: Vec<FeedItem>) -> Vec<Sequenced> {
        items
            .into_iter()
            .enumerate()
            .map(|(seq, item)| Sequenced { seq: seq as u64, item })
            .collect()
    }

    fn uris(items: &[FeedItem]) -> Vec<&str> {
        items.iter().map(|i| i.uri.as_str()).collect()
    }

    #[test]
    fn test_retrieval_orders() {
        let entries = sequenced(vec![
            news_item("b", "B", at(2)),
            news_item("a", "A", at(1)),
            news_item("c", "C", at(3)),
        ]);

        let newest = arrange(entries.clone(), RetrievalOrder::NewestFirst, false);
        assert_eq!(uris(&newest), vec!["c", "b", "a"]);

        let oldest = arrange(entries.clone(), RetrievalOrder::OldestFirst, false);
        assert_eq!(uris(&oldest), vec!["a", "b", "c"]);

        let arrival = arrange(entries, RetrievalOrder::Arrival, false);
        assert_eq!(uris(&arrival), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_same_date_newest_arrival_first() {
        let entries = sequenced(vec![news_item("a", "A", at(1)), news_item("b", "B", at(1))]);
        let items = arrange(entries, RetrievalOrder::NewestFirst, false);
        assert_eq!(uris(&items), vec!["b", "a"]);
    }

    #[test]
    fn test_round_robin_skips_exhausted_groups() {
        let entries = sequenced(vec![
            news_item("n1", "N1", at(6)),
            news_item("n2", "N2", at(5)),
            news_item("n3", "N3", at(4)),
            status_item("s1", "S1", at(3)),
            image_item("i1", "I1", at(2)),
            image_item("i2", "I2", at(1)),
        ]);

        let items = arrange(entries, RetrievalOrder::NewestFirst, true);
        let types: Vec<ContentType> = items.iter().map(FeedItem::content_type).collect();

        assert_eq!(
            types,
            vec![
                ContentType::News,
                ContentType::Status,
                ContentType::Image,
                ContentType::News,
                ContentType::Image,
                ContentType::News,
            ]
        );
        assert_eq!(items[0].uri, "n1");
        assert_eq!(items[3].uri, "n2");
    }

    #[test]
    fn test_round_robin_starts_with_news_when_images_lead() {
        let entries = sequenced(vec![
            image_item("i1", "I1", at(9)),
            image_item("i2", "I2", at(8)),
            status_item("s1", "S1", at(7)),
            status_item("s2", "S2", at(6)),
            news_item("n1", "N1", at(5)),
            news_item("n2", "N2", at(4)),
        ]);

        for order in [RetrievalOrder::NewestFirst, RetrievalOrder::Arrival] {
            let items = arrange(entries.clone(), order, true);
            let types: Vec<ContentType> = items.iter().map(FeedItem::content_type).collect();
            assert_eq!(
                types,
                vec![
                    ContentType::News,
                    ContentType::Status,
                    ContentType::Image,
                    ContentType::News,
                    ContentType::Status,
                    ContentType::Image,
                ]
            );
            assert_eq!(items[0].uri, "n1");
            assert_eq!(items[3].uri, "n2");
        }
    }

    #[test]
    fn test_empty() {
        assert!(arrange(Vec::new(), RetrievalOrder::Arrival, true).is_empty());
    }
}
