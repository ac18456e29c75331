use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SeriesError;
use crate::market_data::scheduler::SchedulerStatus;
use crate::market_data::series::{SERIES_LEN, derive_checked};
use crate::market_data::types::{Instrument, Snapshot, TimePoint, Trend};
use crate::state::{FocusLevel, FocusState, filter};

/// Read-only picture of the dashboard handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    /// Filtered instruments in ranking order.
    pub cards: Vec<InstrumentCard>,
    /// Main chart. Stays populated when the filter hides the selected card.
    pub selected: Option<ChartView>,
    /// Modal overlay, if the full-screen instrument is in the current snapshot.
    pub full_screen: Option<ChartView>,
    pub filter_term: String,
    /// No snapshot and no error yet.
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub last_error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentCard {
    pub instrument: Arc<Instrument>,
    pub trend: Trend,
    pub focus: FocusLevel,
    /// Only for the selected instrument and cards at `Expanded` or above.
    pub series: Option<Vec<TimePoint>>,
    pub series_error: Option<SeriesError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub id: String,
    /// `None` when the id is not in the current snapshot.
    pub instrument: Option<Arc<Instrument>>,
    pub series: Option<Vec<TimePoint>>,
    pub series_error: Option<SeriesError>,
}

impl ViewModel {
    pub(crate) fn build(
        snapshot: Option<&Snapshot>,
        selected: Option<&str>,
        filter_term: &str,
        focus: &FocusState,
        status: &SchedulerStatus,
    ) -> Self {
        let cards = snapshot
            .map(|s| {
                filter(s, filter_term)
                    .instruments
                    .into_iter()
                    .map(|instrument| card(instrument, s.fetched_at, selected, focus))
                    .collect()
            })
            .unwrap_or_default();

        let full_screen = focus
            .full_screen()
            .filter(|id| snapshot.is_some_and(|s| s.contains(id)))
            .map(|id| chart(id, snapshot));

        Self {
            cards,
            selected: selected.map(|id| chart(id, snapshot)),
            full_screen,
            filter_term: filter_term.to_string(),
            is_loading: snapshot.is_none() && status.last_error.is_none(),
            is_refreshing: status.is_in_flight,
            last_error: status.last_error.as_ref().map(ToString::to_string),
            last_updated: snapshot.map(|s| s.fetched_at),
        }
    }

    pub fn card(&self, id: &str) -> Option<&InstrumentCard> {
        self.cards.iter().find(|c| c.instrument.id == id)
    }

    pub fn card_ids(&self) -> Vec<&str> {
        self.cards.iter().map(|c| c.instrument.id.as_str()).collect()
    }
}

fn card(
    instrument: Arc<Instrument>,
    as_of: DateTime<Utc>,
    selected: Option<&str>,
    focus: &FocusState,
) -> InstrumentCard {
    let level = focus.level(&instrument.id);
    let wants_series = level.shows_series() || selected == Some(instrument.id.as_str());
    let (series, series_error) = series_for(&instrument, as_of, wants_series);

    InstrumentCard {
        trend: instrument.trend(),
        focus: level,
        series,
        series_error,
        instrument,
    }
}

fn chart(id: &str, snapshot: Option<&Snapshot>) -> ChartView {
    let found = snapshot.and_then(|s| s.get(id).map(|i| (Arc::clone(i), s.fetched_at)));
    match found {
        Some((instrument, as_of)) => {
            let (series, series_error) = series_for(&instrument, as_of, true);
            ChartView {
                id: id.to_string(),
                instrument: Some(instrument),
                series,
                series_error,
            }
        }
        None => ChartView {
            id: id.to_string(),
            instrument: None,
            series: None,
            series_error: None,
        },
    }
}

// Length problems are reported whether or not the series was asked for.
fn series_for(
    instrument: &Instrument,
    as_of: DateTime<Utc>,
    wanted: bool,
) -> (Option<Vec<TimePoint>>, Option<SeriesError>) {
    if wanted {
        match derive_checked(&instrument.id, &instrument.price_series_7d, as_of) {
            Ok(series) => (Some(series), None),
            Err(err) => (None, Some(err)),
        }
    } else if instrument.price_series_7d.len() != SERIES_LEN {
        (
            None,
            Some(SeriesError::WrongLength {
                id: instrument.id.clone(),
                expected: SERIES_LEN,
                actual: instrument.price_series_7d.len(),
            }),
        )
    } else {
        (None, None)
    }
}
