mod bid_api;
mod ledger;
pub mod pricing;
mod pricing_api;

pub use ledger::{Acceptance, Ledger, Sweep};

use std::sync::Arc;

use oso::Oso;

use crate::{
    api::API,
    auth::authorizor,
    config::PricingConfig,
    db::BidStore,
    entities::BidEvent,
    error::Error,
    external::{EventPublisher, HistoricalStatsSource, JourneyLookup},
};

/// Lifecycle controller for bids. Holds no mutable state; every replica sharing one bid
/// store behaves the same.
pub struct Engine {
    store: Arc<dyn BidStore>,
    journeys: Arc<dyn JourneyLookup>,
    stats: Arc<dyn HistoricalStatsSource>,
    publisher: Arc<dyn EventPublisher>,
    pricing: PricingConfig,
    authorizor: Oso,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(
        store: Arc<dyn BidStore>,
        journeys: Arc<dyn JourneyLookup>,
        stats: Arc<dyn HistoricalStatsSource>,
        publisher: Arc<dyn EventPublisher>,
        pricing: PricingConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            store,
            journeys,
            stats,
            publisher,
            pricing,
            authorizor: authorizor::new()?,
        })
    }
}

impl Engine {
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(Error::authorization_error())
    }

    fn ledger(&self) -> Ledger<'_> {
        Ledger::new(self.store.as_ref())
    }

    fn publish(&self, event: BidEvent) {
        tracing::debug!("publishing {} for bid {}", event.name(), event.bid().id);
        self.publisher.publish(event);
    }
}

impl API for Engine {}
