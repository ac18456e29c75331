//! View-state and refresh core of a live crypto market dashboard.
//!
//! [`DashboardController`] owns the current market snapshot, the selected
//! instrument, the filter term and per-card focus levels. A
//! [`RefreshScheduler`](market_data::scheduler::RefreshScheduler) polls a
//! [`SnapshotFetcher`](market_data::fetcher::SnapshotFetcher) in the
//! background; the renderer pulls a [`ViewModel`] whenever the revision
//! from [`DashboardController::subscribe`] changes.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod market_data;
pub mod metrics;
pub mod state;

pub use dashboard::{DashboardController, DashboardOptions, ViewModel};
pub use error::{FetchError, FetchErrorKind, SelectionError, SeriesError};
pub use market_data::scheduler::RefreshOutcome;
pub use state::FocusLevel;
