use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use uuid::Uuid;

use crate::{
    db::BidStore,
    entities::{Bid, BidStatus},
    error::{ConflictReason, Error, ErrorKind},
    external::JourneyLookup,
};

/// Per-journey operations over the bid store. Holds no state of its own.
pub struct Ledger<'a> {
    store: &'a dyn BidStore,
}

#[derive(Debug)]
pub struct Acceptance {
    pub accepted: Bid,
    /// In the order they were rejected.
    pub rejected: Vec<Bid>,
}

#[derive(Debug, Default)]
pub struct Sweep {
    pub expired: Vec<Bid>,
    pub rejected: Vec<Bid>,
}

/// A CAS that lost to another transition; the bid is terminal by some other path.
fn lost_to_other_transition(err: &Error) -> bool {
    matches!(err.kind(), ErrorKind::Conflict | ErrorKind::InvalidTransition)
}

impl<'a> Ledger<'a> {
    pub fn new(store: &'a dyn BidStore) -> Self {
        Self { store }
    }

    /// Accepts `bid_id` and rejects every other pending bid of the journey.
    ///
    /// On failure no bid has changed. Retrying an accept that already went through fails
    /// with `already-decided`.
    #[tracing::instrument(skip(self))]
    pub async fn accept_bid(
        &self,
        journey_id: Uuid,
        bid_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Acceptance, Error> {
        let bids = self.store.list_by_journey(journey_id).await?;

        if bids.iter().any(|bid| bid.status == BidStatus::Accepted) {
            tracing::info!("journey already has an accepted bid");
            return Err(Error::conflict_error(ConflictReason::AlreadyDecided));
        }

        let target = bids
            .iter()
            .find(|bid| bid.id == bid_id)
            .ok_or_else(|| Error::not_found_error("bid"))?;

        if !target.is_pending() {
            return Err(Error::conflict_error(ConflictReason::BidNotPending));
        }

        let accepted = match self
            .store
            .compare_and_swap_status(target.id, target.version, BidStatus::Accepted, now)
            .await
        {
            Ok(bid) => bid,
            Err(err) if lost_to_other_transition(&err) => {
                tracing::info!("lost accept race: {}", err);
                return Err(Error::conflict_error(ConflictReason::RaceLost));
            }
            Err(err) => return Err(err),
        };

        let mut rejected = Vec::new();

        for bid in bids.iter().filter(|bid| bid.id != bid_id && bid.is_pending()) {
            match self
                .store
                .compare_and_swap_status(bid.id, bid.version, BidStatus::Rejected, now)
                .await
            {
                Ok(bid) => rejected.push(bid),
                Err(err) if lost_to_other_transition(&err) => {
                    tracing::info!("bid {} left its pending state concurrently: {}", bid.id, err);
                }
                Err(err) => {
                    // the acceptance stands; the next sweep rejects what is left
                    tracing::error!("failed to reject bid {}: {}", bid.id, err);
                }
            }
        }

        Ok(Acceptance { accepted, rejected })
    }

    #[tracing::instrument(skip(self))]
    pub async fn withdraw(&self, bid_id: Uuid, now: DateTime<Utc>) -> Result<Bid, Error> {
        let bid = self.store.get_by_id(bid_id).await?;

        if !bid.is_pending() {
            return Err(Error::conflict_error(ConflictReason::BidNotPending));
        }

        match self
            .store
            .compare_and_swap_status(bid.id, bid.version, BidStatus::Withdrawn, now)
            .await
        {
            Ok(bid) => Ok(bid),
            Err(err) if lost_to_other_transition(&err) => {
                tracing::info!("lost withdraw race: {}", err);
                Err(Error::conflict_error(ConflictReason::RaceLost))
            }
            Err(err) => Err(err),
        }
    }

    /// Expires pending bids of journeys whose bidding window closed before `now` or that
    /// were cancelled, and rejects pending bids left on journeys that already accepted one.
    #[tracing::instrument(skip(self, journeys))]
    pub async fn expire_stale(
        &self,
        now: DateTime<Utc>,
        journeys: &dyn JourneyLookup,
    ) -> Result<Sweep, Error> {
        let pending = self.store.list_pending().await?;

        let mut journey_ids: Vec<Uuid> = Vec::new();
        let mut by_journey: HashMap<Uuid, Vec<Bid>> = HashMap::new();

        for bid in pending {
            if !by_journey.contains_key(&bid.journey_id) {
                journey_ids.push(bid.journey_id);
            }
            by_journey.entry(bid.journey_id).or_default().push(bid);
        }

        let lookups = join_all(journey_ids.iter().map(|id| journeys.get_journey(*id))).await;

        let mut sweep = Sweep::default();

        for (journey_id, lookup) in journey_ids.iter().zip(lookups) {
            let journey = match lookup {
                Ok(journey) => journey,
                Err(err) => {
                    tracing::warn!("skipping bids of journey {}: {}", journey_id, err);
                    continue;
                }
            };

            let bids = by_journey.remove(journey_id).unwrap_or_default();

            let target = if journey.is_stale(now) {
                BidStatus::Expired
            } else if self
                .store
                .list_by_journey(*journey_id)
                .await?
                .iter()
                .any(|bid| bid.status == BidStatus::Accepted)
            {
                BidStatus::Rejected
            } else {
                continue;
            };

            for bid in bids {
                match self
                    .store
                    .compare_and_swap_status(bid.id, bid.version, target, now)
                    .await
                {
                    Ok(bid) if target == BidStatus::Expired => sweep.expired.push(bid),
                    Ok(bid) => sweep.rejected.push(bid),
                    Err(err) if lost_to_other_transition(&err) => {
                        tracing::info!("bid {} left its pending state concurrently", bid.id);
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        tracing::info!(
            expired = sweep.expired.len(),
            rejected = sweep.rejected.len(),
            "sweep finished"
        );

        Ok(sweep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBidStore;
    use crate::entities::{Journey, JourneyStatus, NewBid};
    use crate::external::MemoryJourneyLookup;
    use chrono::Duration;
    use rust_decimal::Decimal;

    async fn submit(store: &MemoryBidStore, journey_id: Uuid, amount: i64) -> Bid {
        let new_bid = NewBid {
            journey_id,
            driver_id: Uuid::new_v4(),
            amount: Decimal::new(amount, 0),
            note: None,
        };

        store.create(new_bid, Utc::now()).await.unwrap()
    }

    #[tokio::test]
    async fn accept_rejects_the_other_pending_bids() {
        let store = MemoryBidStore::new();
        let journey_id = Uuid::new_v4();

        let first = submit(&store, journey_id, 3500).await;
        let second = submit(&store, journey_id, 3800).await;
        let third = submit(&store, journey_id, 3900).await;
        let other_journey = submit(&store, Uuid::new_v4(), 4000).await;

        let ledger = Ledger::new(&store);
        let acceptance = ledger
            .accept_bid(journey_id, second.id, Utc::now())
            .await
            .unwrap();

        assert_eq!(acceptance.accepted.id, second.id);
        assert_eq!(acceptance.accepted.status, BidStatus::Accepted);

        let rejected: Vec<Uuid> = acceptance.rejected.iter().map(|bid| bid.id).collect();
        assert_eq!(rejected, vec![first.id, third.id]);

        let other = store.get_by_id(other_journey.id).await.unwrap();
        assert_eq!(other.status, BidStatus::Pending);
    }

    #[tokio::test]
    async fn accept_retry_reports_already_decided() {
        let store = MemoryBidStore::new();
        let journey_id = Uuid::new_v4();
        let bid = submit(&store, journey_id, 3500).await;

        let ledger = Ledger::new(&store);
        ledger.accept_bid(journey_id, bid.id, Utc::now()).await.unwrap();

        let err = ledger
            .accept_bid(journey_id, bid.id, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.conflict_reason(), Some(ConflictReason::AlreadyDecided));
    }

    #[tokio::test]
    async fn accept_leaves_everything_untouched_on_failure() {
        let store = MemoryBidStore::new();
        let journey_id = Uuid::new_v4();

        let withdrawn = submit(&store, journey_id, 3500).await;
        let pending = submit(&store, journey_id, 3600).await;

        let ledger = Ledger::new(&store);
        ledger.withdraw(withdrawn.id, Utc::now()).await.unwrap();

        let err = ledger
            .accept_bid(journey_id, withdrawn.id, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.conflict_reason(), Some(ConflictReason::BidNotPending));

        let err = ledger
            .accept_bid(journey_id, Uuid::new_v4(), Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_not_found_error());

        let bid = store.get_by_id(pending.id).await.unwrap();
        assert_eq!(bid.status, BidStatus::Pending);
        assert_eq!(bid.version, 0);
    }

    #[tokio::test]
    async fn withdraw_succeeds_exactly_once() {
        let store = MemoryBidStore::new();
        let bid = submit(&store, Uuid::new_v4(), 3500).await;

        let ledger = Ledger::new(&store);
        let withdrawn = ledger.withdraw(bid.id, Utc::now()).await.unwrap();
        assert_eq!(withdrawn.status, BidStatus::Withdrawn);

        let err = ledger.withdraw(bid.id, Utc::now()).await.unwrap_err();
        assert!(err.is_conflict_error());
    }

    #[tokio::test]
    async fn sweep_expires_closed_windows_and_rejects_leftovers() {
        let store = MemoryBidStore::new();
        let journeys = MemoryJourneyLookup::new();
        let now = Utc::now();

        let closed = Journey::new(Uuid::new_v4(), JourneyStatus::Open, now - Duration::minutes(1));
        let open = Journey::new(Uuid::new_v4(), JourneyStatus::Open, now + Duration::minutes(10));
        let decided = Journey::new(Uuid::new_v4(), JourneyStatus::Open, now + Duration::minutes(10));
        journeys.insert(closed.clone());
        journeys.insert(open.clone());
        journeys.insert(decided.clone());

        let late_a = submit(&store, closed.id, 100).await;
        let late_b = submit(&store, closed.id, 110).await;
        let waiting = submit(&store, open.id, 120).await;
        let winner = submit(&store, decided.id, 130).await;
        let leftover = submit(&store, decided.id, 140).await;
        let orphan = submit(&store, Uuid::new_v4(), 150).await;

        // accepted directly so the leftover stays pending
        store
            .compare_and_swap_status(winner.id, 0, BidStatus::Accepted, now)
            .await
            .unwrap();

        let ledger = Ledger::new(&store);
        let sweep = ledger.expire_stale(now, &journeys).await.unwrap();

        let expired: Vec<Uuid> = sweep.expired.iter().map(|bid| bid.id).collect();
        assert_eq!(expired, vec![late_a.id, late_b.id]);

        let rejected: Vec<Uuid> = sweep.rejected.iter().map(|bid| bid.id).collect();
        assert_eq!(rejected, vec![leftover.id]);

        for id in [waiting.id, orphan.id] {
            assert_eq!(store.get_by_id(id).await.unwrap().status, BidStatus::Pending);
        }

        let err = ledger.accept_bid(closed.id, late_a.id, now).await.unwrap_err();
        assert!(err.is_conflict_error());
    }
}
