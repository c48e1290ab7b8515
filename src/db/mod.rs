mod memory;
mod pg;

pub use memory::MemoryBidStore;
pub use pg::PgBidStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{Bid, BidStatus, NewBid};
use crate::error::Error;

/// Durable record of bids. `compare_and_swap_status` is the only way a stored bid changes.
#[async_trait]
pub trait BidStore: Send + Sync {
    /// Validates and stores a new bid with status pending and version 0.
    async fn create(&self, new_bid: NewBid, now: DateTime<Utc>) -> Result<Bid, Error>;

    async fn get_by_id(&self, id: Uuid) -> Result<Bid, Error>;

    /// Oldest first.
    async fn list_by_journey(&self, journey_id: Uuid) -> Result<Vec<Bid>, Error>;

    /// Oldest first.
    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Bid>, Error>;

    async fn list_pending(&self) -> Result<Vec<Bid>, Error>;

    /// Atomically moves the bid to `new_status` if its stored version still equals
    /// `expected_version`, setting `decided_at` and bumping the version.
    ///
    /// Fails with a `stale-version` conflict when another transition got there first, and
    /// with a `race-lost` conflict when the bid would become a second accepted bid of its
    /// journey.
    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected_version: i64,
        new_status: BidStatus,
        now: DateTime<Utc>,
    ) -> Result<Bid, Error>;
}
