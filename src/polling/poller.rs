use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::gate::RetryGate;
use super::{PollReport, PollStatus};
use crate::domain::{QueryList, SourceType};
use crate::sources::{ParseContext, SourceAdapter};
use crate::transport::Transport;

/// Status reported to the adapter when the transport itself failed.
const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Supplies the minimum item date at parse time.
pub type MinDateFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Requesting,
    Parsing,
    Backoff,
}

/// Timer-driven driver of one source adapter.
pub struct Poller {
    adapter: Arc<dyn SourceAdapter>,
    transport: Arc<dyn Transport>,
    queries: Arc<RwLock<QueryList>>,
    min_date: MinDateFn,
    interval: Duration,
    gate: RetryGate,
    state: PollState,
}

impl Poller {
    /// `interval` is raised to the adapter's minimum when lower.
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        transport: Arc<dyn Transport>,
        queries: Arc<RwLock<QueryList>>,
        min_date: MinDateFn,
        interval: Duration,
    ) -> Self {
        let interval = interval.max(adapter.min_interval());

        Self {
            adapter,
            transport,
            queries,
            min_date,
            interval,
            gate: RetryGate::Open,
            state: PollState::Idle,
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.adapter.source_type()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn gate(&self) -> RetryGate {
        self.gate
    }

    /// One tick of the state machine. Returns `None` when the retry gate
    /// suppressed the poll.
    pub async fn poll_once(&mut self) -> Option<PollReport> {
        let source = self.source_type();

        if !self.gate.allows(Instant::now()) {
            debug!(%source, gate = ?self.gate, "poll suppressed");
            return None;
        }

        // Guard dropped before the request goes out
        let request = {
            let queries = self.queries.read();
            self.adapter.build_query(&queries)
        };

        let Some(request) = request else {
            debug!(%source, "no search terms, nothing to poll");
            return Some(PollReport::new(source, PollStatus::Skipped, Vec::new()));
        };

        self.state = PollState::Requesting;
        debug!(%source, url = %request.url, "polling");

        let status = match self.transport.fetch(&request).await {
            Ok(response) if response.is_ok() => {
                self.state = PollState::Parsing;
                let context = ParseContext::new((self.min_date)(), request.url.clone());
                let items = self.adapter.process_response(&response.body, &context);
                self.settle(response.status);

                debug!(%source, count = items.len(), "poll complete");
                return Some(PollReport::new(source, PollStatus::Up, items));
            }
            Ok(response) => {
                warn!(%source, status = response.status, "poll failed");
                response.status
            }
            Err(e) => {
                warn!(%source, error = %e, "transport failure");
                TRANSPORT_FAILURE_STATUS
            }
        };

        self.settle(status);
        Some(PollReport::new(source, PollStatus::Down, Vec::new()))
    }

    fn settle(&mut self, status: u16) {
        let policy = self.adapter.retry_policy(status);
        self.gate = RetryGate::from_policy(policy, Instant::now());
        self.state = match self.gate {
            RetryGate::Open => PollState::Idle,
            _ => PollState::Backoff,
        };

        if self.gate == RetryGate::Closed {
            info!(source = %self.source_type(), status, "source gone, polling stopped");
        } else if let RetryGate::Until(_) = self.gate {
            let not_before = policy.not_before(Utc::now());
            info!(source = %self.source_type(), status, %not_before, "backing off");
        }
    }

    /// Poll immediately, then every interval until cancelled. The timer is
    /// re-armed only after a response, so requests never overlap.
    pub async fn run(
        mut self,
        generation: u64,
        reports: mpsc::UnboundedSender<PollReport>,
        cancel: CancellationToken,
    ) {
        let source = self.source_type();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(%source, interval = ?self.interval, "poller started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                report = self.poll_once() => report,
            };

            // A response that raced the stop is dropped
            if cancel.is_cancelled() {
                break;
            }

            if let Some(report) = report {
                ticker.reset();
                if reports.send(report.with_generation(generation)).is_err() {
                    break;
                }
            }
        }

        info!(%source, "poller stopped");
    }
}
