use async_trait::async_trait;

use crate::error::FetchError;
use crate::market_data::types::RawSnapshot;

/// One round trip to the market snapshot provider.
///
/// Implementations must not retry; the refresh scheduler owns retry policy.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self) -> Result<RawSnapshot, FetchError>;
}
