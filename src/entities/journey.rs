use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot of a journey as reported by the journey service. Never written by this crate.
#[derive(Clone, Debug, Serialize, Deserialize, PolarClass)]
pub struct Journey {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub passenger_id: Uuid,
    pub status: JourneyStatus,
    pub bidding_window_close_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
    Open,
    Closed,
    Cancelled,
}

impl Journey {
    pub fn new(
        passenger_id: Uuid,
        status: JourneyStatus,
        bidding_window_close_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            passenger_id,
            status,
            bidding_window_close_at,
        }
    }

    pub fn window_closed(&self, now: DateTime<Utc>) -> bool {
        self.bidding_window_close_at < now
    }

    pub fn accepts_bids(&self, now: DateTime<Utc>) -> bool {
        self.status == JourneyStatus::Open && !self.window_closed(now)
    }

    /// Pending bids on this journey can no longer be accepted and should be expired.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.window_closed(now) || self.status == JourneyStatus::Cancelled
    }
}
