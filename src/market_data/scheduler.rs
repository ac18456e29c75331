use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::market_data::fetcher::SnapshotFetcher;
use crate::market_data::types::{IngestReport, RawSnapshot};
use crate::metrics::prometheus::{record_fetch, record_fetch_latency, record_tick_skipped};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Receiver of fetch completions.
///
/// `ingest` is called with the scheduler's lock held, so completions
/// never interleave.
pub trait SnapshotSink: Send + Sync + 'static {
    fn ingest(&self, raw: RawSnapshot) -> IngestReport;

    /// Refresh status changed (attempt started, finished, or scheduler stopped).
    fn notify(&self) {}
}

/// What a refresh attempt ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied(IngestReport),
    Failed(FetchError),
    /// A fresher attempt was applied first.
    Stale,
    /// The scheduler was stopped while the attempt was in flight.
    Discarded,
    /// The scheduler is stopped; nothing was fetched.
    Stopped,
}

impl RefreshOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Failed(_) => "failed",
            Self::Stale => "stale",
            Self::Discarded => "discarded",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub is_in_flight: bool,
    pub last_error: Option<FetchError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FetchTicket {
    seq: u64,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Fresh,
    Stale,
    Cancelled,
}

/// Orders attempts by start and decides whether a completion may be applied.
#[derive(Debug, Default)]
struct FetchSequencer {
    issued: u64,
    applied: u64,
    generation: u64,
}

impl FetchSequencer {
    fn issue(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket {
            seq: self.issued,
            generation: self.generation,
        }
    }

    fn verdict(&self, ticket: &FetchTicket) -> Verdict {
        if ticket.generation != self.generation {
            Verdict::Cancelled
        } else if ticket.seq <= self.applied {
            Verdict::Stale
        } else {
            Verdict::Fresh
        }
    }

    fn mark_applied(&mut self, ticket: &FetchTicket) {
        self.applied = self.applied.max(ticket.seq);
    }

    /// Every ticket issued so far becomes `Cancelled`.
    fn cancel_outstanding(&mut self) {
        self.generation += 1;
    }
}

type SharedOutcome = Shared<BoxFuture<'static, RefreshOutcome>>;

struct InFlight {
    seq: u64,
    outcome: SharedOutcome,
}

enum Begin {
    Started(SharedOutcome),
    Joined(SharedOutcome),
    Stopped,
}

#[derive(Default)]
struct SchedulerState {
    sequencer: FetchSequencer,
    in_flight: Option<InFlight>,
    last_error: Option<FetchError>,
    timer: Option<JoinHandle<()>>,
    stopped: bool,
}

struct SchedulerCore {
    fetcher: Arc<dyn SnapshotFetcher>,
    sink: Arc<dyn SnapshotSink>,
    state: Mutex<SchedulerState>,
}

/// Drives the fetcher on a fixed cadence and on demand, with at most one
/// attempt in flight.
pub struct RefreshScheduler {
    core: Arc<SchedulerCore>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(
        fetcher: Arc<dyn SnapshotFetcher>,
        sink: Arc<dyn SnapshotSink>,
        interval: Duration,
    ) -> Self {
        Self {
            core: Arc::new(SchedulerCore {
                fetcher,
                sink,
                state: Mutex::new(SchedulerState::default()),
            }),
            interval,
        }
    }

    /// Start the timer. The first tick fires immediately. Must be called
    /// from within a tokio runtime; a second call while running is a no-op.
    pub fn start(&self) {
        let mut state = self.core.state.lock();
        if state.timer.is_some() {
            return;
        }
        state.stopped = false;

        let core = Arc::clone(&self.core);
        let period = self.interval;
        state.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                core.on_tick();
            }
        }));

        info!(interval_secs = period.as_secs(), "refresh scheduler started");
    }

    /// Clear the timer. An attempt already in flight runs to completion but
    /// its result is dropped.
    pub fn stop(&self) {
        let mut state = self.core.state.lock();
        let was_running = state.timer.is_some();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if state.stopped {
            return;
        }
        state.stopped = true;
        state.sequencer.cancel_outstanding();
        state.in_flight = None;
        drop(state);

        self.core.sink.notify();
        if was_running {
            info!("refresh scheduler stopped");
        } else {
            debug!("refresh scheduler stopped before start");
        }
    }

    /// Fetch now, or join the attempt already in flight.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        match self.core.begin() {
            Begin::Started(outcome) => outcome.await,
            Begin::Joined(outcome) => {
                debug!("manual refresh joined in-flight fetch");
                outcome.await
            }
            Begin::Stopped => RefreshOutcome::Stopped,
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.core.state.lock();
        SchedulerStatus {
            is_running: state.timer.is_some(),
            is_in_flight: state.in_flight.is_some(),
            last_error: state.last_error.clone(),
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SchedulerCore {
    fn on_tick(self: &Arc<Self>) {
        match self.begin() {
            Begin::Started(_) => debug!("timer tick started fetch"),
            Begin::Joined(_) => {
                debug!("timer tick skipped, fetch already in flight");
                record_tick_skipped();
            }
            Begin::Stopped => {}
        }
    }

    fn begin(self: &Arc<Self>) -> Begin {
        let mut state = self.state.lock();
        if state.stopped {
            return Begin::Stopped;
        }
        if let Some(in_flight) = &state.in_flight {
            return Begin::Joined(in_flight.outcome.clone());
        }

        let ticket = state.sequencer.issue();
        // Spawned so the attempt completes even if every awaiting caller goes away.
        let task = tokio::spawn(Arc::clone(self).run(ticket));
        let outcome = async move { task.await.unwrap_or(RefreshOutcome::Discarded) }
            .boxed()
            .shared();
        state.in_flight = Some(InFlight {
            seq: ticket.seq,
            outcome: outcome.clone(),
        });
        drop(state);

        self.sink.notify();
        Begin::Started(outcome)
    }

    async fn run(self: Arc<Self>, ticket: FetchTicket) -> RefreshOutcome {
        let started = Instant::now();
        let result = self.fetcher.fetch().await;
        record_fetch_latency(started.elapsed().as_secs_f64() * 1_000.0);

        let mut state = self.state.lock();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.seq == ticket.seq)
        {
            state.in_flight = None;
        }

        let outcome = match state.sequencer.verdict(&ticket) {
            Verdict::Cancelled => {
                debug!(seq = ticket.seq, "dropping fetch result, scheduler stopped");
                RefreshOutcome::Discarded
            }
            Verdict::Stale => {
                debug!(seq = ticket.seq, "dropping stale fetch result");
                RefreshOutcome::Stale
            }
            Verdict::Fresh => match result {
                Ok(raw) => {
                    state.sequencer.mark_applied(&ticket);
                    state.last_error = None;
                    RefreshOutcome::Applied(self.sink.ingest(raw))
                }
                Err(err) => {
                    warn!(error = %err, "snapshot fetch failed, keeping last good snapshot");
                    state.last_error = Some(err.clone());
                    RefreshOutcome::Failed(err)
                }
            },
        };
        drop(state);

        record_fetch(outcome.label());
        self.sink.notify();
        outcome
    }
}
