use std::sync::Arc;

use caballus_bidding::config::Config;
use caballus_bidding::db::PgBidStore;
use caballus_bidding::engine::Engine;
use caballus_bidding::error::Error;
use caballus_bidding::external::{
    log_events, ChannelPublisher, HistoricalStatsSource, HttpJourneyLookup, HttpStatsSource,
    MemoryStatsSource,
};
use caballus_bidding::server::serve;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let store = PgBidStore::connect(&config.database_url, config.database_max_connections).await?;

    let journeys = HttpJourneyLookup::new(config.journey_service_url.clone());

    let stats: Arc<dyn HistoricalStatsSource> = match &config.stats_service_url {
        Some(url) => Arc::new(HttpStatsSource::new(url.clone())),
        None => {
            tracing::warn!("STATS_SERVICE_URL not set, price suggestions use the tariff only");
            Arc::new(MemoryStatsSource::new())
        }
    };

    let (publisher, events) = ChannelPublisher::new(config.event_channel_capacity);
    tokio::spawn(log_events(events));

    let engine = Engine::new(
        Arc::new(store),
        Arc::new(journeys),
        stats,
        Arc::new(publisher),
        config.pricing.clone(),
    )?;

    serve(engine, config.listen_addr).await
}
