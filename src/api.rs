use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Bid, JourneyFeatures, PriceSuggestion};
use crate::error::Error;

#[async_trait]
pub trait BidAPI {
    async fn submit_bid(
        &self,
        user: User,
        journey_id: Uuid,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<Bid, Error>;
    async fn withdraw_bid(&self, user: User, bid_id: Uuid) -> Result<Bid, Error>;
    async fn accept_bid(&self, user: User, journey_id: Uuid, bid_id: Uuid) -> Result<Bid, Error>;
    async fn find_bid(&self, user: User, bid_id: Uuid) -> Result<Bid, Error>;
    async fn list_journey_bids(&self, user: User, journey_id: Uuid) -> Result<Vec<Bid>, Error>;
    async fn list_driver_bids(&self, user: User) -> Result<Vec<Bid>, Error>;
    async fn expire_stale_bids(&self, user: User, now: DateTime<Utc>) -> Result<Vec<Bid>, Error>;
}

#[async_trait]
pub trait PricingAPI {
    async fn suggest_price(
        &self,
        user: User,
        journey_id: Uuid,
        features: JourneyFeatures,
    ) -> Result<PriceSuggestion, Error>;
}

pub trait API: BidAPI + PricingAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
