use super::{pricing, Engine};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::PricingAPI,
    auth::User,
    entities::{HistoricalStats, JourneyFeatures, PriceSuggestion},
    error::Error,
};

#[async_trait]
impl PricingAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn suggest_price(
        &self,
        _user: User,
        journey_id: Uuid,
        features: JourneyFeatures,
    ) -> Result<PriceSuggestion, Error> {
        features.validate()?;

        let stats = match self
            .stats
            .get_accepted_bid_stats(features.route_class, features.time_bucket())
            .await
        {
            Ok(stats) => stats,
            Err(err) => {
                tracing::warn!("historical stats unavailable, suggesting without history: {}", err);
                HistoricalStats::empty()
            }
        };

        // same journey, same exploratory nudge
        let seed = self
            .pricing
            .exploration_seed
            .map(|seed| seed ^ (journey_id.as_u128() as u64));

        pricing::suggest(&features, &stats, &self.pricing.tariff, seed)
    }
}
