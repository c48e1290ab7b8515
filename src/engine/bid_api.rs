use super::Engine;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    api::BidAPI,
    auth::User,
    entities::{Bid, BidEvent, BidStatus, JourneyStatus, NewBid},
    error::{ConflictReason, Error},
};

#[async_trait]
impl BidAPI for Engine {
    #[tracing::instrument(skip(self, note))]
    async fn submit_bid(
        &self,
        user: User,
        journey_id: Uuid,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<Bid, Error> {
        let new_bid = NewBid {
            journey_id,
            driver_id: user.id,
            amount,
            note,
        };

        new_bid.validate()?;

        let journey = self.journeys.get_journey(journey_id).await?;
        let now = Utc::now();

        if !journey.accepts_bids(now) {
            tracing::info!("journey is not accepting bids, returning early...");
            return Err(Error::conflict_error(ConflictReason::JourneyClosed));
        }

        let bids = self.store.list_by_journey(journey_id).await?;

        if bids.iter().any(|bid| bid.status == BidStatus::Accepted) {
            tracing::info!("journey already has an accepted bid, returning early...");
            return Err(Error::conflict_error(ConflictReason::AlreadyDecided));
        }

        let bid = self.store.create(new_bid, now).await?;

        self.publish(BidEvent::BidSubmitted(bid.clone()));

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn withdraw_bid(&self, user: User, bid_id: Uuid) -> Result<Bid, Error> {
        let bid = self.store.get_by_id(bid_id).await?;

        self.authorize(user.clone(), "withdraw", bid)?;

        let bid = self.ledger().withdraw(bid_id, Utc::now()).await?;

        self.publish(BidEvent::BidWithdrawn(bid.clone()));

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn accept_bid(&self, user: User, journey_id: Uuid, bid_id: Uuid) -> Result<Bid, Error> {
        let journey = self.journeys.get_journey(journey_id).await?;

        self.authorize(user.clone(), "accept", journey.clone())?;

        if journey.status == JourneyStatus::Cancelled {
            tracing::info!("journey was cancelled, returning early...");
            return Err(Error::conflict_error(ConflictReason::JourneyClosed));
        }

        let acceptance = self.ledger().accept_bid(journey_id, bid_id, Utc::now()).await?;

        tracing::info!(
            rejected = acceptance.rejected.len(),
            "accepted bid {}",
            acceptance.accepted.id
        );

        self.publish(BidEvent::BidAccepted(acceptance.accepted.clone()));

        for bid in acceptance.rejected {
            self.publish(BidEvent::BidRejected(bid));
        }

        Ok(acceptance.accepted)
    }

    #[tracing::instrument(skip(self))]
    async fn find_bid(&self, _user: User, bid_id: Uuid) -> Result<Bid, Error> {
        self.store.get_by_id(bid_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_journey_bids(&self, _user: User, journey_id: Uuid) -> Result<Vec<Bid>, Error> {
        // unknown journeys are reported, not answered with an empty list
        self.journeys.get_journey(journey_id).await?;

        self.store.list_by_journey(journey_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_driver_bids(&self, user: User) -> Result<Vec<Bid>, Error> {
        self.store.list_by_driver(user.id).await
    }

    #[tracing::instrument(skip(self))]
    async fn expire_stale_bids(&self, user: User, now: DateTime<Utc>) -> Result<Vec<Bid>, Error> {
        self.authorize(user.clone(), "expire", "bids")?;

        let sweep = self
            .ledger()
            .expire_stale(now, self.journeys.as_ref())
            .await?;

        let mut changed = Vec::with_capacity(sweep.expired.len() + sweep.rejected.len());

        for bid in sweep.expired {
            self.publish(BidEvent::BidExpired(bid.clone()));
            changed.push(bid);
        }

        for bid in sweep.rejected {
            self.publish(BidEvent::BidRejected(bid.clone()));
            changed.push(bid);
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Duration;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::api::BidAPI;
    use crate::auth::User;
    use crate::engine::testing::Fixture;
    use crate::entities::{BidEvent, BidStatus, Journey, JourneyStatus};
    use crate::error::{ConflictReason, ErrorKind};

    use chrono::Utc;

    fn open_journey(fixture: &Fixture, passenger: &User) -> Journey {
        let journey = Journey::new(
            passenger.id,
            JourneyStatus::Open,
            Utc::now() + Duration::minutes(10),
        );
        fixture.journeys.insert(journey.clone());
        journey
    }

    #[tokio::test]
    async fn submit_validates_input() {
        let fixture = Fixture::new();
        let passenger = User::new(Uuid::new_v4());
        let driver = User::new(Uuid::new_v4());
        let journey = open_journey(&fixture, &passenger);

        for amount in [Decimal::ZERO, Decimal::new(-500, 2)] {
            let err = fixture
                .engine
                .submit_bid(driver.clone(), journey.id, amount, None)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let bid = fixture
            .engine
            .submit_bid(
                driver.clone(),
                journey.id,
                Decimal::from_str("12345.67").unwrap(),
                Some("x".repeat(300)),
            )
            .await
            .unwrap();

        assert_eq!(bid.status, BidStatus::Pending);
        assert_eq!(bid.driver_id, driver.id);
        assert_eq!(fixture.drain_events(), vec![BidEvent::BidSubmitted(bid)]);
    }

    #[tokio::test]
    async fn submit_refuses_closed_journeys() {
        let fixture = Fixture::new();
        let driver = User::new(Uuid::new_v4());

        let past_window = Journey::new(
            Uuid::new_v4(),
            JourneyStatus::Open,
            Utc::now() - Duration::seconds(1),
        );
        let cancelled = Journey::new(
            Uuid::new_v4(),
            JourneyStatus::Cancelled,
            Utc::now() + Duration::minutes(10),
        );
        fixture.journeys.insert(past_window.clone());
        fixture.journeys.insert(cancelled.clone());

        for journey in [past_window, cancelled] {
            let err = fixture
                .engine
                .submit_bid(driver.clone(), journey.id, Decimal::new(3500, 0), None)
                .await
                .unwrap_err();
            assert_eq!(err.conflict_reason(), Some(ConflictReason::JourneyClosed));
        }

        let err = fixture
            .engine
            .submit_bid(driver.clone(), Uuid::new_v4(), Decimal::new(3500, 0), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found_error());

        assert!(fixture.drain_events().is_empty());
    }

    #[tokio::test]
    async fn only_the_owner_withdraws_and_only_once() {
        let fixture = Fixture::new();
        let passenger = User::new(Uuid::new_v4());
        let driver = User::new(Uuid::new_v4());
        let journey = open_journey(&fixture, &passenger);

        let bid = fixture
            .engine
            .submit_bid(driver.clone(), journey.id, Decimal::new(3500, 0), None)
            .await
            .unwrap();

        let err = fixture
            .engine
            .withdraw_bid(User::new(Uuid::new_v4()), bid.id)
            .await
            .unwrap_err();
        assert!(err.is_authorization_error());

        let withdrawn = fixture
            .engine
            .withdraw_bid(driver.clone(), bid.id)
            .await
            .unwrap();
        assert_eq!(withdrawn.status, BidStatus::Withdrawn);

        let err = fixture
            .engine
            .withdraw_bid(driver.clone(), bid.id)
            .await
            .unwrap_err();
        assert!(err.is_conflict_error());

        let err = fixture
            .engine
            .withdraw_bid(driver.clone(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.is_not_found_error());

        let names: Vec<&str> = fixture.drain_events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["bid_submitted", "bid_withdrawn"]);
    }

    #[tokio::test]
    async fn accept_emits_accepted_then_rejections() {
        let fixture = Fixture::new();
        let passenger = User::new(Uuid::new_v4());
        let journey = open_journey(&fixture, &passenger);

        let mut bids = Vec::new();
        for amount in [3500, 3800, 3600] {
            let bid = fixture
                .engine
                .submit_bid(
                    User::new(Uuid::new_v4()),
                    journey.id,
                    Decimal::new(amount, 0),
                    None,
                )
                .await
                .unwrap();
            bids.push(bid);
        }
        fixture.drain_events();

        let err = fixture
            .engine
            .accept_bid(User::new(Uuid::new_v4()), journey.id, bids[0].id)
            .await
            .unwrap_err();
        assert!(err.is_authorization_error());

        let accepted = fixture
            .engine
            .accept_bid(passenger.clone(), journey.id, bids[1].id)
            .await
            .unwrap();
        assert_eq!(accepted.status, BidStatus::Accepted);

        let events = fixture.drain_events();
        let summary: Vec<(&str, Uuid)> = events.iter().map(|e| (e.name(), e.bid().id)).collect();
        assert_eq!(
            summary,
            vec![
                ("bid_accepted", bids[1].id),
                ("bid_rejected", bids[0].id),
                ("bid_rejected", bids[2].id),
            ]
        );

        let err = fixture
            .engine
            .accept_bid(passenger.clone(), journey.id, bids[1].id)
            .await
            .unwrap_err();
        assert_eq!(err.conflict_reason(), Some(ConflictReason::AlreadyDecided));

        // a decided journey takes no further bids
        let err = fixture
            .engine
            .submit_bid(User::new(Uuid::new_v4()), journey.id, Decimal::new(2900, 0), None)
            .await
            .unwrap_err();
        assert_eq!(err.conflict_reason(), Some(ConflictReason::AlreadyDecided));

        let listed = fixture
            .engine
            .list_journey_bids(passenger.clone(), journey.id)
            .await
            .unwrap();
        let statuses: Vec<BidStatus> = listed.iter().map(|bid| bid.status).collect();
        assert_eq!(
            statuses,
            vec![BidStatus::Rejected, BidStatus::Accepted, BidStatus::Rejected]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accepts_have_exactly_one_winner() {
        for _ in 0..50 {
            let fixture = Fixture::new();
            let passenger = User::new(Uuid::new_v4());
            let journey = open_journey(&fixture, &passenger);

            let first = fixture
                .engine
                .submit_bid(User::new(Uuid::new_v4()), journey.id, Decimal::new(3500, 0), None)
                .await
                .unwrap();
            let second = fixture
                .engine
                .submit_bid(User::new(Uuid::new_v4()), journey.id, Decimal::new(3800, 0), None)
                .await
                .unwrap();

            let handles: Vec<_> = [first.id, second.id]
                .into_iter()
                .map(|bid_id| {
                    let engine = fixture.engine.clone();
                    let passenger = passenger.clone();
                    let journey_id = journey.id;
                    tokio::spawn(async move { engine.accept_bid(passenger, journey_id, bid_id).await })
                })
                .collect();

            let mut winners = Vec::new();
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(bid) => winners.push(bid),
                    Err(err) => assert!(err.is_conflict_error()),
                }
            }

            assert_eq!(winners.len(), 1);
            assert_eq!(winners[0].status, BidStatus::Accepted);

            let listed = fixture
                .engine
                .list_journey_bids(passenger.clone(), journey.id)
                .await
                .unwrap();

            for bid in listed {
                if bid.id == winners[0].id {
                    assert_eq!(bid.status, BidStatus::Accepted);
                } else {
                    assert_eq!(bid.status, BidStatus::Rejected);
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn accept_racing_withdraw_keeps_invariant() {
        for _ in 0..50 {
            let fixture = Fixture::new();
            let passenger = User::new(Uuid::new_v4());
            let driver = User::new(Uuid::new_v4());
            let journey = open_journey(&fixture, &passenger);

            let bid = fixture
                .engine
                .submit_bid(driver.clone(), journey.id, Decimal::new(3500, 0), None)
                .await
                .unwrap();

            let accept = {
                let engine = fixture.engine.clone();
                let passenger = passenger.clone();
                let journey_id = journey.id;
                tokio::spawn(async move { engine.accept_bid(passenger, journey_id, bid.id).await })
            };
            let withdraw = {
                let engine = fixture.engine.clone();
                tokio::spawn(async move { engine.withdraw_bid(driver, bid.id).await })
            };

            let accepted = accept.await.unwrap();
            let withdrawn = withdraw.await.unwrap();

            // exactly one of them commits
            assert!(accepted.is_ok() != withdrawn.is_ok());

            let stored = fixture
                .engine
                .find_bid(passenger.clone(), bid.id)
                .await
                .unwrap();
            match accepted {
                Ok(_) => assert_eq!(stored.status, BidStatus::Accepted),
                Err(_) => assert_eq!(stored.status, BidStatus::Withdrawn),
            }
        }
    }

    #[tokio::test]
    async fn expiry_closes_out_pending_bids() {
        let fixture = Fixture::new();
        let passenger = User::new(Uuid::new_v4());
        let journey = open_journey(&fixture, &passenger);

        let bid = fixture
            .engine
            .submit_bid(User::new(Uuid::new_v4()), journey.id, Decimal::new(3500, 0), None)
            .await
            .unwrap();
        fixture.drain_events();

        let after_close = journey.bidding_window_close_at + Duration::seconds(1);

        let err = fixture
            .engine
            .expire_stale_bids(User::new(Uuid::new_v4()), after_close)
            .await
            .unwrap_err();
        assert!(err.is_authorization_error());

        // window still open: nothing to do
        let changed = fixture
            .engine
            .expire_stale_bids(User::new_system_user(), Utc::now())
            .await
            .unwrap();
        assert!(changed.is_empty());

        let changed = fixture
            .engine
            .expire_stale_bids(User::new_system_user(), after_close)
            .await
            .unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].status, BidStatus::Expired);

        let names: Vec<&str> = fixture.drain_events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["bid_expired"]);

        let err = fixture
            .engine
            .accept_bid(passenger.clone(), journey.id, bid.id)
            .await
            .unwrap_err();
        assert!(err.is_conflict_error());
    }

    #[tokio::test]
    async fn accept_refused_on_cancelled_journey() {
        let fixture = Fixture::new();
        let passenger = User::new(Uuid::new_v4());
        let mut journey = open_journey(&fixture, &passenger);

        let bid = fixture
            .engine
            .submit_bid(User::new(Uuid::new_v4()), journey.id, Decimal::new(3500, 0), None)
            .await
            .unwrap();

        journey.status = JourneyStatus::Cancelled;
        fixture.journeys.insert(journey.clone());

        let err = fixture
            .engine
            .accept_bid(passenger.clone(), journey.id, bid.id)
            .await
            .unwrap_err();
        assert_eq!(err.conflict_reason(), Some(ConflictReason::JourneyClosed));

        let changed = fixture
            .engine
            .expire_stale_bids(User::new_system_user(), Utc::now())
            .await
            .unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].status, BidStatus::Expired);
    }

    #[tokio::test]
    async fn listing_requires_known_journey() {
        let fixture = Fixture::new();
        let driver = User::new(Uuid::new_v4());
        let journey = open_journey(&fixture, &User::new(Uuid::new_v4()));

        let err = fixture
            .engine
            .list_journey_bids(driver.clone(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.is_not_found_error());

        assert!(fixture
            .engine
            .list_journey_bids(driver.clone(), journey.id)
            .await
            .unwrap()
            .is_empty());

        let bid = fixture
            .engine
            .submit_bid(driver.clone(), journey.id, Decimal::new(990, 2), None)
            .await
            .unwrap();

        let own = fixture.engine.list_driver_bids(driver.clone()).await.unwrap();
        assert_eq!(own, vec![bid]);
    }
}
