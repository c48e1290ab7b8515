use serde::{Deserialize, Serialize};

use crate::entities::Bid;

/// Lifecycle notifications handed to the event publisher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "bid", rename_all = "snake_case")]
pub enum BidEvent {
    BidSubmitted(Bid),
    BidWithdrawn(Bid),
    BidAccepted(Bid),
    BidRejected(Bid),
    BidExpired(Bid),
}

impl BidEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BidSubmitted(_) => "bid_submitted",
            Self::BidWithdrawn(_) => "bid_withdrawn",
            Self::BidAccepted(_) => "bid_accepted",
            Self::BidRejected(_) => "bid_rejected",
            Self::BidExpired(_) => "bid_expired",
        }
    }

    pub fn bid(&self) -> &Bid {
        match self {
            Self::BidSubmitted(bid)
            | Self::BidWithdrawn(bid)
            | Self::BidAccepted(bid)
            | Self::BidRejected(bid)
            | Self::BidExpired(bid) => bid,
        }
    }
}
