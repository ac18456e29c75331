pub mod view;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::SelectionError;
use crate::market_data::fetcher::SnapshotFetcher;
use crate::market_data::scheduler::{
    DEFAULT_REFRESH_INTERVAL, RefreshOutcome, RefreshScheduler, SnapshotSink,
};
use crate::market_data::types::{IngestReport, RawSnapshot, Snapshot};
use crate::metrics::prometheus::record_series_errors;
use crate::state::{FocusLevel, FocusState};

pub use view::{ChartView, InstrumentCard, ViewModel};

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub refresh_interval: Duration,
    /// Charted until the user selects something else. Not validated until
    /// a snapshot has arrived.
    pub default_selection: Option<String>,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            default_selection: None,
        }
    }
}

impl From<&Config> for DashboardOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            refresh_interval: cfg.refresh_interval,
            default_selection: Some(cfg.default_selection.clone()),
        }
    }
}

struct DashboardState {
    snapshot: Option<Arc<Snapshot>>,
    selected: Option<String>,
    filter_term: String,
    focus: FocusState,
}

/// Shared between the controller and the scheduler's completion path.
struct DashboardCore {
    state: Mutex<DashboardState>,
    revision: watch::Sender<u64>,
}

impl DashboardCore {
    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Run `f` against the focus map after checking `id` is in the current snapshot.
    fn with_known_focus(
        &self,
        id: &str,
        f: impl FnOnce(&mut FocusState, &str) -> FocusLevel,
    ) -> Result<FocusLevel, SelectionError> {
        let level = {
            let mut state = self.state.lock();
            let known = state.snapshot.as_ref().is_some_and(|s| s.contains(id));
            if !known {
                return Err(SelectionError::UnknownId(id.to_string()));
            }
            f(&mut state.focus, id)
        };
        self.bump();
        Ok(level)
    }

    /// Swap in a validated snapshot. Does not bump the revision: the
    /// scheduler calls this under its own lock and notifies after releasing it.
    fn replace_snapshot(&self, raw: RawSnapshot) -> IngestReport {
        let (snapshot, report) = Snapshot::from_raw(raw);

        for err in &report.series_errors {
            warn!(error = %err, "price series unavailable for this snapshot");
        }
        if !report.duplicates.is_empty() {
            warn!(duplicates = ?report.duplicates, "dropped duplicate instrument ids");
        }
        record_series_errors(report.series_errors.len());

        {
            let mut state = self.state.lock();
            if let Some(selected) = state.selected.as_deref() {
                if !snapshot.contains(selected) {
                    debug!(%selected, "selected instrument not in latest snapshot");
                }
            }
            state.snapshot = Some(Arc::new(snapshot));
        }

        info!(instruments = report.accepted, "snapshot replaced");
        report
    }
}

impl SnapshotSink for DashboardCore {
    fn ingest(&self, raw: RawSnapshot) -> IngestReport {
        self.replace_snapshot(raw)
    }

    fn notify(&self) {
        self.bump();
    }
}

/// The dashboard's single owner of snapshot, selection, filter term and focus.
///
/// Dropping the controller stops its scheduler; an in-flight fetch that
/// completes afterwards changes nothing.
pub struct DashboardController {
    core: Arc<DashboardCore>,
    scheduler: RefreshScheduler,
}

impl DashboardController {
    pub fn new(fetcher: Arc<dyn SnapshotFetcher>, options: DashboardOptions) -> Self {
        let (revision, _) = watch::channel(0);
        let core = Arc::new(DashboardCore {
            state: Mutex::new(DashboardState {
                snapshot: None,
                selected: options.default_selection,
                filter_term: String::new(),
                focus: FocusState::new(),
            }),
            revision,
        });
        let scheduler = RefreshScheduler::new(
            fetcher,
            Arc::clone(&core) as Arc<dyn SnapshotSink>,
            options.refresh_interval,
        );

        Self { core, scheduler }
    }

    pub fn from_config(cfg: &Config, fetcher: Arc<dyn SnapshotFetcher>) -> Self {
        Self::new(fetcher, DashboardOptions::from(cfg))
    }

    /// Begin periodic refresh. Needs a tokio runtime.
    pub fn start(&self) {
        self.scheduler.start();
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Build the view from cached state. Never does I/O.
    pub fn current_view(&self) -> ViewModel {
        // Scheduler status first: its lock is taken before ours on the completion path.
        let status = self.scheduler.status();
        let state = self.core.state.lock();
        ViewModel::build(
            state.snapshot.as_deref(),
            state.selected.as_deref(),
            &state.filter_term,
            &state.focus,
            &status,
        )
    }

    /// Receiver whose value changes whenever the view would. Don't hold a
    /// `borrow()` guard while calling back into the controller.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.core.revision.subscribe()
    }

    pub fn set_filter_term(&self, term: impl Into<String>) {
        let term = term.into();
        {
            let mut state = self.core.state.lock();
            if state.filter_term == term {
                return;
            }
            debug!(%term, "filter term changed");
            state.filter_term = term;
        }
        self.core.bump();
    }

    pub fn filter_term(&self) -> String {
        self.core.state.lock().filter_term.clone()
    }

    /// Chart `id` from now on. Rejected, keeping the prior selection, when
    /// `id` is not in the current snapshot. Never fetches.
    pub fn select_instrument(&self, id: &str) -> Result<(), SelectionError> {
        {
            let mut state = self.core.state.lock();
            let known = state.snapshot.as_ref().is_some_and(|s| s.contains(id));
            if !known {
                warn!(%id, "rejecting selection of unknown instrument");
                return Err(SelectionError::UnknownId(id.to_string()));
            }
            state.selected = Some(id.to_string());
        }
        info!(%id, "instrument selected");
        self.core.bump();
        Ok(())
    }

    pub fn selected(&self) -> Option<String> {
        self.core.state.lock().selected.clone()
    }

    pub async fn refresh_now(&self) -> RefreshOutcome {
        self.scheduler.refresh_now().await
    }

    pub fn toggle_expand(&self, id: &str) -> Result<FocusLevel, SelectionError> {
        self.core.with_known_focus(id, FocusState::toggle_expand)
    }

    pub fn open_full_screen(&self, id: &str) -> Result<FocusLevel, SelectionError> {
        self.core.with_known_focus(id, FocusState::open_full_screen)
    }

    pub fn close_full_screen(&self, id: &str) -> Result<FocusLevel, SelectionError> {
        self.core.with_known_focus(id, FocusState::close_full_screen)
    }

    /// Replace the snapshot directly, bypassing the fetcher.
    #[cfg(test)]
    pub(crate) fn ingest(&self, raw: RawSnapshot) -> IngestReport {
        let report = self.core.replace_snapshot(raw);
        self.core.bump();
        report
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.status().is_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::market_data::series::SERIES_LEN;
    use crate::market_data::types::fixtures::{instrument, raw};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotFetcher for CountingFetcher {
        async fn fetch(&self) -> Result<RawSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(raw(Utc::now(), vec![instrument("bitcoin", "btc", "Bitcoin", 50_000)]))
        }
    }

    fn controller() -> (DashboardController, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher::default());
        let ctl = DashboardController::new(fetcher.clone(), DashboardOptions::default());
        ctl.ingest(raw(
            Utc::now(),
            vec![
                instrument("btc", "btc", "Bitcoin", 50_000),
                instrument("eth", "eth", "Ethereum", 3_000),
            ],
        ));
        (ctl, fetcher)
    }

    #[test]
    fn filter_selection_and_unknown_id_scenario() {
        let (ctl, fetcher) = controller();

        ctl.set_filter_term("bt");
        assert_eq!(ctl.filter_term(), "bt");
        assert_eq!(ctl.current_view().card_ids(), vec!["btc"]);

        ctl.select_instrument("eth").unwrap();
        let view = ctl.current_view();
        let selected = view.selected.unwrap();
        assert_eq!(selected.id, "eth");
        assert_eq!(selected.series.map(|s| s.len()), Some(SERIES_LEN));

        assert_eq!(
            ctl.select_instrument("xrp"),
            Err(SelectionError::UnknownId("xrp".to_string()))
        );
        assert_eq!(ctl.selected().as_deref(), Some("eth"));

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn selection_before_any_snapshot_is_rejected() {
        let ctl = DashboardController::new(
            Arc::new(CountingFetcher::default()),
            DashboardOptions {
                default_selection: Some("bitcoin".to_string()),
                ..Default::default()
            },
        );
        assert!(ctl.select_instrument("bitcoin").is_err());
        assert_eq!(ctl.selected().as_deref(), Some("bitcoin"));
        assert!(ctl.current_view().is_loading);
    }

    #[test]
    fn focus_survives_reordering_and_reappearance() {
        let (ctl, _) = controller();
        assert_eq!(ctl.toggle_expand("eth"), Ok(FocusLevel::Expanded));

        // eth drops out, then comes back ranked first.
        ctl.ingest(raw(Utc::now(), vec![instrument("btc", "btc", "Bitcoin", 50_000)]));
        assert!(ctl.current_view().card("eth").is_none());
        assert!(ctl.toggle_expand("eth").is_err());

        ctl.ingest(raw(
            Utc::now(),
            vec![
                instrument("eth", "eth", "Ethereum", 3_100),
                instrument("btc", "btc", "Bitcoin", 50_100),
            ],
        ));
        let view = ctl.current_view();
        assert_eq!(view.card_ids(), vec!["eth", "btc"]);
        assert_eq!(view.card("eth").unwrap().focus, FocusLevel::Expanded);
        assert_eq!(view.card("btc").unwrap().focus, FocusLevel::Collapsed);
    }

    #[test]
    fn full_screen_is_exclusive() {
        let (ctl, _) = controller();
        ctl.open_full_screen("btc").unwrap();
        ctl.open_full_screen("eth").unwrap();

        let view = ctl.current_view();
        assert_eq!(view.card("btc").unwrap().focus, FocusLevel::Expanded);
        assert_eq!(view.card("eth").unwrap().focus, FocusLevel::FullScreen);
        assert_eq!(view.full_screen.map(|c| c.id), Some("eth".to_string()));

        assert_eq!(ctl.close_full_screen("eth"), Ok(FocusLevel::Expanded));
        assert!(ctl.current_view().full_screen.is_none());
    }

    #[test]
    fn state_changes_bump_the_revision() {
        let (ctl, _) = controller();
        let rx = ctl.subscribe();
        let start = *rx.borrow();

        ctl.set_filter_term("eth");
        ctl.set_filter_term("eth");
        ctl.select_instrument("btc").unwrap();
        ctl.toggle_expand("btc").unwrap();

        assert_eq!(*rx.borrow(), start + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_now_replaces_snapshot() {
        let (ctl, fetcher) = controller();

        let outcome = ctl.refresh_now().await;

        assert!(matches!(outcome, RefreshOutcome::Applied(ref r) if r.accepted == 1));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.current_view().card_ids(), vec!["bitcoin"]);
        assert!(!ctl.current_view().is_refreshing);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_then_refresh_does_nothing() {
        let (ctl, fetcher) = controller();
        ctl.start();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        ctl.stop();
        assert!(!ctl.is_running());
        assert_eq!(ctl.refresh_now().await, RefreshOutcome::Stopped);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
