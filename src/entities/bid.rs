use chrono::{DateTime, Utc};
use oso::PolarClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

pub const MAX_NOTE_LENGTH: usize = 300;
pub const MAX_AMOUNT_SCALE: u32 = 2;
/// Largest amount a `NUMERIC(14, 2)` column holds, in cents.
pub const MAX_AMOUNT_CENTS: i64 = 99_999_999_999_999;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, PolarClass)]
pub struct Bid {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub journey_id: Uuid,
    #[polar(attribute)]
    pub driver_id: Uuid,
    pub amount: Decimal,
    pub note: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub version: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
    Expired,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
            Self::Expired => "expired",
        }
    }

    pub fn parse(name: &str) -> Result<Self, Error> {
        match name {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "withdrawn" => Ok(Self::Withdrawn),
            "expired" => Ok(Self::Expired),
            _ => {
                tracing::error!("unknown bid status {:?} in storage", name);
                Err(Error::unexpected_error())
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Pending is the only state with outgoing edges, and every edge ends in a terminal state.
    pub fn validate_transition(&self, to: Status) -> Result<(), Error> {
        match (self, to) {
            (Self::Pending, Self::Pending) => {
                Err(Error::invalid_transition_error(self.name(), to.name()))
            }
            (Self::Pending, _) => Ok(()),
            _ => Err(Error::invalid_transition_error(self.name(), to.name())),
        }
    }
}

/// Input record for a bid submission, validated before it reaches storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewBid {
    pub journey_id: Uuid,
    pub driver_id: Uuid,
    pub amount: Decimal,
    pub note: Option<String>,
}

impl NewBid {
    pub fn validate(&self) -> Result<(), Error> {
        if self.journey_id.is_nil() {
            return Err(Error::validation_error("journey_id is required"));
        }

        if self.driver_id.is_nil() {
            return Err(Error::validation_error("driver_id is required"));
        }

        if self.amount <= Decimal::ZERO {
            return Err(Error::validation_error("amount must be positive"));
        }

        if self.amount > Decimal::new(MAX_AMOUNT_CENTS, MAX_AMOUNT_SCALE) {
            return Err(Error::validation_error(
                "amount must be at most 999999999999.99",
            ));
        }

        if self.amount.normalize().scale() > MAX_AMOUNT_SCALE {
            return Err(Error::validation_error(
                "amount must have at most 2 fractional digits",
            ));
        }

        if let Some(note) = &self.note {
            if note.chars().count() > MAX_NOTE_LENGTH {
                return Err(Error::validation_error("note must be at most 300 characters"));
            }
        }

        Ok(())
    }
}

impl Bid {
    pub fn new(new_bid: NewBid, now: DateTime<Utc>) -> Result<Self, Error> {
        new_bid.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            journey_id: new_bid.journey_id,
            driver_id: new_bid.driver_id,
            amount: new_bid.amount.normalize(),
            note: new_bid.note,
            status: Status::Pending,
            created_at: now,
            decided_at: None,
            version: 0,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    /// Applies a status change in place; the caller is responsible for the version check.
    pub fn transition(&mut self, to: Status, now: DateTime<Utc>) -> Result<(), Error> {
        self.status.validate_transition(to)?;

        self.status = to;
        self.decided_at = Some(now);
        self.version += 1;

        Ok(())
    }
}
