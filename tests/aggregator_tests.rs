use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use feedwall::aggregator::{Aggregator, EventReceiver};
use feedwall::config::{AggregatorConfig, SourceConfig};
use feedwall::domain::{FeedEvent, SourceType};
use feedwall::errors::FeedwallResult;
use feedwall::transport::{FetchRequest, FetchResponse, Transport};

/// Replies with queued responses in order, then repeats the last one.
struct ScriptedTransport {
    script: Mutex<VecDeque<FetchResponse>>,
    calls: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<FetchResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(at, _)| *at).collect()
    }

    fn urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(_, url)| url.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: &FetchRequest) -> FeedwallResult<FetchResponse> {
        self.calls.lock().push((Instant::now(), request.url.clone()));

        let mut script = self.script.lock();
        let response = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        Ok(response.unwrap_or_else(|| FetchResponse::new(500, Vec::new())))
    }
}

fn single_source(source: SourceType, source_config: SourceConfig) -> AggregatorConfig {
    let mut sources = BTreeMap::new();
    sources.insert(source, source_config);

    AggregatorConfig {
        sources,
        max_age_secs: None,
        cooldown_secs: 600,
        ..AggregatorConfig::default()
    }
}

fn news(terms: &[&str]) -> AggregatorConfig {
    single_source(
        SourceType::News,
        SourceConfig {
            queries: terms.iter().collect(),
            endpoint: Some("https://news.example.com/rss?q={query}".to_string()),
            ..SourceConfig::default()
        },
    )
}

/// Events of the next completed poll, up to and including its FeedUpdated.
/// Purge notifications in between are skipped.
async fn next_poll(rx: &mut EventReceiver) -> Vec<FeedEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            FeedEvent::CachePurged(_) => continue,
            FeedEvent::FeedUpdated { .. } => {
                events.push(event);
                break;
            }
            event => events.push(event),
        }
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_server_error_defers_next_request_by_cooldown() {
    let transport = ScriptedTransport::new(vec![
        FetchResponse::new(500, Vec::new()),
        FetchResponse::new(200, "<rss version=\"2.0\"><channel><title>T</title></channel></rss>"),
    ]);
    let (mut aggregator, mut rx) = Aggregator::new(news(&["rust"]), transport.clone());
    aggregator.start();

    let first = next_poll(&mut rx).await;
    assert!(matches!(
        first[0],
        FeedEvent::SourceStatus { source: SourceType::News, up: false }
    ));

    let second = next_poll(&mut rx).await;
    assert!(matches!(
        second[0],
        FeedEvent::SourceStatus { source: SourceType::News, up: true }
    ));

    let times = transport.call_times();
    assert_eq!(times.len(), 2);
    let gap = times[1] - times[0];
    assert!(gap >= Duration::from_secs(600), "retried after {:?}", gap);
    assert!(gap < Duration::from_secs(601));

    aggregator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_not_found_stops_polling() {
    let transport = ScriptedTransport::new(vec![FetchResponse::new(404, Vec::new())]);
    let (mut aggregator, mut rx) = Aggregator::new(news(&["rust"]), transport.clone());
    aggregator.start();

    next_poll(&mut rx).await;
    tokio::time::sleep(Duration::from_secs(7 * 24 * 3600)).await;

    assert_eq!(transport.call_times().len(), 1);
    aggregator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_query_change_applies_to_next_poll() {
    let transport = ScriptedTransport::new(vec![FetchResponse::new(
        200,
        "<rss version=\"2.0\"><channel><title>T</title></channel></rss>",
    )]);
    let (mut aggregator, mut rx) = Aggregator::new(news(&["rust"]), transport.clone());
    aggregator.start();
    next_poll(&mut rx).await;

    aggregator.set_query_terms(SourceType::News, ["tokio", "-spam"]).unwrap();
    next_poll(&mut rx).await;

    assert_eq!(
        transport.urls(),
        vec![
            "https://news.example.com/rss?q=rust".to_string(),
            "https://news.example.com/rss?q=tokio".to_string(),
        ]
    );
    aggregator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_partially_malformed_timeline_yields_valid_status() {
    let body = r#"[
        {"id": "1", "created_at": "2024-05-01T10:00:00.000Z", "uri": "https://m.example/1",
         "url": "https://m.example/@ann/1", "content": "<p>Hello <b>world</b></p>",
         "account": {"acct": "ann", "avatar": "https://m.example/ann.png"}},
        {"id": "2", "uri": "https://m.example/2", "content": "<p>no date</p>",
         "account": {"acct": "bob"}}
    ]"#;
    let transport = ScriptedTransport::new(vec![FetchResponse::new(200, body)]);
    let config = single_source(
        SourceType::Mastodon,
        SourceConfig {
            queries: ["rust"].iter().collect(),
            endpoint: Some("m.example".to_string()),
            ..SourceConfig::default()
        },
    );

    let (mut aggregator, mut rx) = Aggregator::new(config, transport.clone());
    aggregator.start();

    let items: Vec<_> = next_poll(&mut rx)
        .await
        .into_iter()
        .filter_map(|e| match e {
            FeedEvent::NewItem(item) => Some(item),
            _ => None,
        })
        .collect();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].uri, "https://m.example/@ann/1");
    assert_eq!(items[0].author.as_deref(), Some("ann"));
    assert_eq!(
        transport.urls()[0],
        "https://m.example/api/v1/timelines/tag/rust?limit=40"
    );
    aggregator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_purge_reports_valid_items() {
    let body = r#"<rss version="2.0"><channel><title>T</title>
      <item><title>Kept</title><link>https://e.com/kept</link><pubDate>Wed, 01 May 2024 10:00:00 +0000</pubDate></item>
      <item><title>Buy spam</title><link>https://e.com/spam</link><pubDate>Wed, 01 May 2024 11:00:00 +0000</pubDate></item>
    </channel></rss>"#;
    let transport = ScriptedTransport::new(vec![FetchResponse::new(200, body)]);
    let (mut aggregator, mut rx) = Aggregator::new(news(&["rust", "-spam"]), transport);
    aggregator.start();
    next_poll(&mut rx).await;

    let purged = loop {
        match rx.recv().await {
            Some(FeedEvent::CachePurged(items)) => break items,
            Some(_) => continue,
            None => panic!("event channel closed"),
        }
    };

    assert_eq!(purged.len(), 1);
    assert_eq!(purged[0].uri, "https://e.com/kept");
    aggregator.shutdown().await;
}
