use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::BidStore;
use crate::entities::{Bid, BidStatus, NewBid};
use crate::error::{ConflictReason, Error};

/// Process-local bid store. Every operation runs under one mutex that is never held across
/// an await point.
#[derive(Default)]
pub struct MemoryBidStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    bids: HashMap<Uuid, Bid>,
    // insertion order, and the secondary indexes in insertion order
    all: Vec<Uuid>,
    by_journey: HashMap<Uuid, Vec<Uuid>>,
    by_driver: HashMap<Uuid, Vec<Uuid>>,
}

impl Inner {
    fn collect<'i>(&self, ids: impl IntoIterator<Item = &'i Uuid>) -> Vec<Bid> {
        let mut bids: Vec<Bid> = ids
            .into_iter()
            .filter_map(|id| self.bids.get(id).cloned())
            .collect();

        bids.sort_by_key(|bid| bid.created_at);
        bids
    }

    fn journey_has_accepted_bid(&self, journey_id: &Uuid, except: &Uuid) -> bool {
        self.by_journey
            .get(journey_id)
            .into_iter()
            .flatten()
            .filter(|id| *id != except)
            .filter_map(|id| self.bids.get(id))
            .any(|bid| bid.status == BidStatus::Accepted)
    }
}

impl MemoryBidStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, Error> {
        self.inner.lock().map_err(|_| {
            tracing::error!("memory bid store mutex poisoned");
            Error::unexpected_error()
        })
    }
}

#[async_trait]
impl BidStore for MemoryBidStore {
    #[tracing::instrument(skip(self))]
    async fn create(&self, new_bid: NewBid, now: DateTime<Utc>) -> Result<Bid, Error> {
        let bid = Bid::new(new_bid, now)?;

        let mut inner = self.lock()?;

        inner
            .by_journey
            .entry(bid.journey_id)
            .or_default()
            .push(bid.id);
        inner.by_driver.entry(bid.driver_id).or_default().push(bid.id);
        inner.all.push(bid.id);
        inner.bids.insert(bid.id, bid.clone());

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> Result<Bid, Error> {
        self.lock()?
            .bids
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found_error("bid"))
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_journey(&self, journey_id: Uuid) -> Result<Vec<Bid>, Error> {
        let inner = self.lock()?;
        Ok(inner.collect(inner.by_journey.get(&journey_id).into_iter().flatten()))
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Bid>, Error> {
        let inner = self.lock()?;
        Ok(inner.collect(inner.by_driver.get(&driver_id).into_iter().flatten()))
    }

    #[tracing::instrument(skip(self))]
    async fn list_pending(&self) -> Result<Vec<Bid>, Error> {
        let inner = self.lock()?;

        let mut bids = inner.collect(inner.all.iter());
        bids.retain(|bid| bid.is_pending());

        Ok(bids)
    }

    #[tracing::instrument(skip(self))]
    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected_version: i64,
        new_status: BidStatus,
        now: DateTime<Utc>,
    ) -> Result<Bid, Error> {
        let mut inner = self.lock()?;

        let current = inner
            .bids
            .get(&id)
            .ok_or_else(|| Error::not_found_error("bid"))?;

        if current.version != expected_version {
            return Err(Error::conflict_error(ConflictReason::StaleVersion));
        }

        current.status.validate_transition(new_status)?;

        if new_status == BidStatus::Accepted
            && inner.journey_has_accepted_bid(&current.journey_id, &id)
        {
            return Err(Error::conflict_error(ConflictReason::RaceLost));
        }

        let bid = inner
            .bids
            .get_mut(&id)
            .ok_or_else(|| Error::not_found_error("bid"))?;

        bid.transition(new_status, now)?;

        Ok(bid.clone())
    }
}
