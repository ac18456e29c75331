use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::error::SeriesError;
use crate::market_data::types::TimePoint;

/// 7 days of hourly closes plus the current sample.
pub const SERIES_LEN: usize = 7 * 24 + 1;

/// Stamp a price sequence with hourly timestamps ending at `as_of`.
///
/// The last sample lands exactly on `as_of`, each earlier one an hour
/// before its successor. An empty input yields an empty series.
pub fn derive(prices: &[Decimal], as_of: DateTime<Utc>) -> Vec<TimePoint> {
    let last = prices.len().saturating_sub(1);
    prices
        .iter()
        .enumerate()
        .map(|(i, price)| TimePoint {
            timestamp: as_of - Duration::hours((last - i) as i64),
            price: *price,
        })
        .collect()
}

/// Like [`derive`], but rejects sequences that are not exactly [`SERIES_LEN`] long.
pub fn derive_checked(
    id: &str,
    prices: &[Decimal],
    as_of: DateTime<Utc>,
) -> Result<Vec<TimePoint>, SeriesError> {
    if prices.len() != SERIES_LEN {
        return Err(SeriesError::WrongLength {
            id: id.to_string(),
            expected: SERIES_LEN,
            actual: prices.len(),
        });
    }
    Ok(derive(prices, as_of))
}
