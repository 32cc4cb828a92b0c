pub mod cache;
pub mod filter;
pub mod ordering;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AggregatorConfig, RetrievalOrder, SourceConfig};
use crate::domain::{FeedEvent, FeedItem, QueryList, SourceType};
use crate::errors::{FeedwallError, FeedwallResult};
use crate::polling::{PollReport, PollStatus, Poller};
use crate::sources::SourceRegistry;
use crate::transport::Transport;

pub use cache::{Admission, ItemCache};
pub use filter::ItemFilter;

pub type EventReceiver = mpsc::UnboundedReceiver<FeedEvent>;

struct CacheState {
    cache: ItemCache,
    /// Generation whose reports are accepted; `None` while stopped.
    live: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct View {
    order: RetrievalOrder,
    distribute: bool,
}

/// State reachable from the ingest task, the pollers and the handle.
struct Shared {
    config: AggregatorConfig,
    state: Mutex<CacheState>,
    filter: RwLock<ItemFilter>,
    view: RwLock<View>,
    queries: BTreeMap<SourceType, Arc<RwLock<QueryList>>>,
    events: mpsc::UnboundedSender<FeedEvent>,
}

impl Shared {
    fn min_date(&self) -> DateTime<Utc> {
        self.config.min_date_at(Utc::now())
    }

    fn emit(&self, event: FeedEvent) {
        // A consumer that dropped its receiver simply stops listening
        let _ = self.events.send(event);
    }

    fn ingest(&self, report: PollReport) {
        let mut state = self.state.lock();
        if state.live != Some(report.generation) {
            debug!(source = %report.source, generation = report.generation, "stale report dropped");
            return;
        }

        let source = report.source;
        match report.status {
            PollStatus::Up => self.emit(FeedEvent::SourceStatus { source, up: true }),
            PollStatus::Down => self.emit(FeedEvent::SourceStatus { source, up: false }),
            PollStatus::Skipped => {}
        }

        let min_date = self.min_date();
        let mut added = 0;
        {
            let empty = QueryList::new();
            let guard = self.queries.get(&source).map(|q| q.read());
            let queries = guard.as_deref().unwrap_or(&empty);
            let filter = self.filter.read();

            for mut item in report.items {
                item.block_reason = filter.classify(&item, queries);
                let announce = (!item.is_blocked()).then(|| item.clone());

                match state.cache.insert(item, min_date) {
                    Admission::Inserted => {
                        added += 1;
                        if let Some(item) = announce {
                            self.emit(FeedEvent::NewItem(item));
                        }
                    }
                    // A blocked copy replaced by a visible one is announced now
                    Admission::Replaced { was_blocked: true } => {
                        if let Some(item) = announce {
                            self.emit(FeedEvent::NewItem(item));
                        }
                    }
                    Admission::TooOld => debug!(%source, "item older than minimum date"),
                    Admission::Replaced { .. } | Admission::Duplicate => {}
                }
            }
        }

        debug!(%source, added, cached = state.cache.len(), "report ingested");
        self.emit(FeedEvent::FeedUpdated { source });

        if state.cache.len() > self.config.max_items {
            self.purge_locked(&mut state);
        }
    }

    fn purge(&self) {
        let mut state = self.state.lock();
        if state.live.is_some() {
            self.purge_locked(&mut state);
        }
    }

    fn purge_locked(&self, state: &mut CacheState) {
        let removed = state.cache.evict(self.min_date(), self.config.max_items);
        if removed > 0 {
            info!(removed, remaining = state.cache.len(), "cache purged");
        }

        let view = *self.view.read();
        self.emit(FeedEvent::CachePurged(
            state.cache.valid_items(view.order, view.distribute),
        ));
    }

    fn valid_items(&self) -> Vec<FeedItem> {
        let state = self.state.lock();
        let view = *self.view.read();
        state.cache.valid_items(view.order, view.distribute)
    }
}

/// Single writer of the cache: applies poll reports and runs periodic purges.
async fn ingest_loop(
    shared: Arc<Shared>,
    mut reports: mpsc::UnboundedReceiver<PollReport>,
    cancel: CancellationToken,
) {
    let period = shared.config.purge_interval();
    let mut purge = tokio::time::interval_at(Instant::now() + period, period);
    purge.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut open = true;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            report = reports.recv(), if open => match report {
                Some(report) => shared.ingest(report),
                None => open = false,
            },
            _ = purge.tick() => shared.purge(),
        }
    }

    debug!("ingest task stopped");
}

struct RunHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Owns the pollers, query lists, filters and cache of one feed wall.
pub struct Aggregator {
    shared: Arc<Shared>,
    registry: SourceRegistry,
    transport: Arc<dyn Transport>,
    disabled: Vec<(SourceType, FeedwallError)>,
    generation: u64,
    run: Option<RunHandle>,
}

impl Aggregator {
    /// Build the sources named by `config`. Sources that fail to build are
    /// left out and listed by [`Aggregator::disabled_sources`].
    pub fn new(config: AggregatorConfig, transport: Arc<dyn Transport>) -> (Self, EventReceiver) {
        let (registry, disabled) = SourceRegistry::from_config(&config);
        let (mut aggregator, events) = Self::with_registry(config, registry, transport);
        aggregator.disabled = disabled;
        (aggregator, events)
    }

    pub fn with_registry(
        config: AggregatorConfig,
        registry: SourceRegistry,
        transport: Arc<dyn Transport>,
    ) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();

        let queries = registry
            .adapters()
            .iter()
            .map(|adapter| {
                let source = adapter.source_type();
                let list = config
                    .sources
                    .get(&source)
                    .map(|s| s.queries.clone())
                    .unwrap_or_default();
                (source, Arc::new(RwLock::new(list)))
            })
            .collect();

        let shared = Shared {
            state: Mutex::new(CacheState {
                cache: ItemCache::new(config.duplicate_policy),
                live: None,
            }),
            filter: RwLock::new(ItemFilter::new(&config.filter)),
            view: RwLock::new(View {
                order: config.retrieval_order,
                distribute: config.distribute_evenly,
            }),
            queries,
            events: tx,
            config,
        };

        let aggregator = Self {
            shared: Arc::new(shared),
            registry,
            transport,
            disabled: Vec::new(),
            generation: 0,
            run: None,
        };

        (aggregator, rx)
    }

    /// Arm every poller; each polls immediately. Must be called within a
    /// tokio runtime. No-op when already running.
    pub fn start(&mut self) {
        if self.run.is_some() {
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        self.shared.state.lock().live = Some(generation);

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(self.registry.len() + 1);

        tasks.push(tokio::spawn(ingest_loop(
            self.shared.clone(),
            rx,
            cancel.clone(),
        )));

        for adapter in self.registry.adapters() {
            let source = adapter.source_type();
            let interval = self
                .shared
                .config
                .sources
                .get(&source)
                .map(SourceConfig::interval)
                .unwrap_or_else(|| adapter.min_interval());
            let queries = self.shared.queries.get(&source).cloned().unwrap_or_default();
            let shared = self.shared.clone();

            let poller = Poller::new(
                adapter.clone(),
                self.transport.clone(),
                queries,
                Arc::new(move || shared.min_date()),
                interval,
            );
            tasks.push(tokio::spawn(poller.run(
                generation,
                tx.clone(),
                cancel.child_token(),
            )));
        }

        info!(generation, sources = self.registry.len(), "aggregator started");
        self.run = Some(RunHandle { cancel, tasks });
    }

    /// Disarm every poller. Responses still in flight are discarded without
    /// touching the cache or emitting events.
    pub fn stop(&mut self) {
        drop(self.halt());
    }

    /// Stop and wait for every task to wind down.
    pub async fn shutdown(&mut self) {
        for task in self.halt() {
            if let Err(e) = task.await {
                warn!(error = %e, "task ended abnormally");
            }
        }
    }

    fn halt(&mut self) -> Vec<JoinHandle<()>> {
        let Some(run) = self.run.take() else {
            return Vec::new();
        };

        run.cancel.cancel();
        self.generation += 1;
        self.shared.state.lock().live = None;

        info!("aggregator stopped");
        run.tasks
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn source_count(&self) -> usize {
        self.registry.len()
    }

    pub fn sources(&self) -> Vec<SourceType> {
        self.registry.adapters().iter().map(|a| a.source_type()).collect()
    }

    /// Sources named in the configuration that could not be built.
    pub fn disabled_sources(&self) -> &[(SourceType, FeedwallError)] {
        &self.disabled
    }

    /// Snapshot of the non-blocked items in presentation order.
    pub fn valid_items(&self) -> Vec<FeedItem> {
        self.shared.valid_items()
    }

    pub fn cached_count(&self) -> usize {
        self.shared.state.lock().cache.len()
    }

    fn query_list(&self, source: SourceType) -> FeedwallResult<&Arc<RwLock<QueryList>>> {
        self.shared
            .queries
            .get(&source)
            .ok_or_else(|| FeedwallError::SourceNotConfigured(source.to_string()))
    }

    pub fn query_terms(&self, source: SourceType) -> FeedwallResult<QueryList> {
        Ok(self.query_list(source)?.read().clone())
    }

    /// Takes effect on the source's next poll. Returns false when the term
    /// was blank or already present.
    pub fn add_query_term(&self, source: SourceType, term: &str) -> FeedwallResult<bool> {
        Ok(self.query_list(source)?.write().add(term))
    }

    pub fn remove_query_term(&self, source: SourceType, term: &str) -> FeedwallResult<bool> {
        Ok(self.query_list(source)?.write().remove(term))
    }

    pub fn set_query_terms<I, S>(&self, source: SourceType, terms: I) -> FeedwallResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        *self.query_list(source)?.write() = terms.into_iter().collect();
        Ok(())
    }

    /// Filter changes apply to items arriving from now on.
    pub fn set_profanity_filter(&self, enabled: bool) {
        self.shared.filter.write().set_profanity_enabled(enabled);
    }

    pub fn set_profanity_words(&self, words: Vec<String>) {
        self.shared.filter.write().set_profanity_words(words);
    }

    pub fn set_distribute_evenly(&self, distribute: bool) {
        self.shared.view.write().distribute = distribute;
    }

    pub fn set_retrieval_order(&self, order: RetrievalOrder) {
        self.shared.view.write().order = order;
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel.cancel();
        }
    }
}
