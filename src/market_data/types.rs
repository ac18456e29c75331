use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::SeriesError;
use crate::market_data::series::SERIES_LEN;

/// One tracked asset as reported by a single snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instrument {
    pub id: String,
    pub symbol: String,
    pub display_name: String,
    pub icon_ref: String,
    pub current_price: Decimal,
    pub change_percent_24h: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub high_24h: Option<Decimal>,
    pub low_24h: Option<Decimal>,
    /// Hourly closes over the last 7 days, oldest first.
    #[serde(skip)]
    pub price_series_7d: Vec<Decimal>,
}

impl Instrument {
    pub fn trend(&self) -> Trend {
        match self.change_percent_24h {
            Some(change) if change > Decimal::ZERO => Trend::Up,
            _ => Trend::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
}

/// A single timestamped price sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

/// Provider response as returned by a fetcher, before validation.
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub instruments: Vec<Instrument>,
}

/// Validated, ranking-ordered set of instruments from one fetch.
///
/// Ids are unique. Always replaced whole, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub instruments: Vec<Arc<Instrument>>,
}

/// Outcome of turning a [`RawSnapshot`] into a [`Snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    /// Ids dropped because an earlier entry already used them.
    pub duplicates: Vec<String>,
    /// Instruments whose chart is unavailable for this snapshot.
    pub series_errors: Vec<SeriesError>,
}

impl Snapshot {
    /// Validate a provider response. Never fails as a whole: duplicates are
    /// dropped and malformed series are only reported.
    pub fn from_raw(raw: RawSnapshot) -> (Self, IngestReport) {
        let mut seen = HashSet::with_capacity(raw.instruments.len());
        let mut report = IngestReport::default();
        let mut instruments = Vec::with_capacity(raw.instruments.len());

        for instrument in raw.instruments {
            if !seen.insert(instrument.id.clone()) {
                report.duplicates.push(instrument.id);
                continue;
            }
            if instrument.price_series_7d.len() != SERIES_LEN {
                report.series_errors.push(SeriesError::WrongLength {
                    id: instrument.id.clone(),
                    expected: SERIES_LEN,
                    actual: instrument.price_series_7d.len(),
                });
            }
            instruments.push(Arc::new(instrument));
        }

        report.accepted = instruments.len();
        (
            Self {
                fetched_at: raw.fetched_at,
                instruments,
            },
            report,
        )
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Instrument>> {
        self.instruments.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.instruments.iter().map(|i| i.id.as_str())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn from_raw_keeps_provider_order_and_drops_duplicates() {
        let now = Utc::now();
        let (snapshot, report) = Snapshot::from_raw(raw(
            now,
            vec![
                instrument("bitcoin", "btc", "Bitcoin", 50_000),
                instrument("ethereum", "eth", "Ethereum", 3_000),
                instrument("bitcoin", "btc", "Bitcoin (dup)", 1),
            ],
        ));

        assert_eq!(snapshot.ids().collect::<Vec<_>>(), vec!["bitcoin", "ethereum"]);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.duplicates, vec!["bitcoin".to_string()]);
        assert_eq!(
            snapshot.get("bitcoin").map(|i| i.display_name.as_str()),
            Some("Bitcoin")
        );
    }

    #[test]
    fn wrong_series_length_is_reported_but_instrument_kept() {
        let (snapshot, report) = Snapshot::from_raw(raw(
            Utc::now(),
            vec![
                instrument("bitcoin", "btc", "Bitcoin", 50_000),
                instrument_with_len("tether", "usdt", "Tether", 1, 24),
            ],
        ));

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("tether"));
        assert_eq!(
            report.series_errors,
            vec![SeriesError::WrongLength {
                id: "tether".to_string(),
                expected: SERIES_LEN,
                actual: 24,
            }]
        );
    }

    #[test]
    fn trend_is_up_only_for_strictly_positive_change() {
        let mut inst = instrument("bitcoin", "btc", "Bitcoin", 1);
        assert_eq!(inst.trend(), Trend::Up);
        inst.change_percent_24h = Some(Decimal::ZERO);
        assert_eq!(inst.trend(), Trend::Down);
        inst.change_percent_24h = None;
        assert_eq!(inst.trend(), Trend::Down);
    }
}
