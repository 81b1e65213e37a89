use anyhow::Result;
use async_trait::async_trait;

use crate::models::StatsRow;

/// Trait that every player statistics source must implement.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Return every usable row the source currently holds.
    async fn fetch_rows(&self) -> Result<Vec<StatsRow>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
