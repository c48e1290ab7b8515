use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::{
    entities::{HistoricalStats, RouteClass, TimeBucket},
    error::Error,
};

/// Aggregates over accepted bids, keyed by route class and time-of-day bucket.
#[async_trait]
pub trait HistoricalStatsSource: Send + Sync {
    async fn get_accepted_bid_stats(
        &self,
        route_class: RouteClass,
        bucket: TimeBucket,
    ) -> Result<HistoricalStats, Error>;
}

pub struct HttpStatsSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatsSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl HistoricalStatsSource for HttpStatsSource {
    #[tracing::instrument(skip(self))]
    async fn get_accepted_bid_stats(
        &self,
        route_class: RouteClass,
        bucket: TimeBucket,
    ) -> Result<HistoricalStats, Error> {
        let url = format!("{}/accepted_bid_stats", self.base_url);

        let res = self
            .client
            .get(url)
            .query(&[("route_class", route_class.name())])
            .query(&[("bucket", bucket.name())])
            .send()
            .await?;

        let status_code = res.status().as_u16();

        if status_code == 404 {
            return Ok(HistoricalStats::empty());
        } else if status_code != 200 {
            return Err(Error::upstream_error());
        }

        Ok(res.json().await?)
    }
}

/// Fixed stats table; lookups for unknown keys yield empty history.
#[derive(Default)]
pub struct MemoryStatsSource {
    stats: RwLock<HashMap<(RouteClass, TimeBucket), HistoricalStats>>,
}

impl MemoryStatsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, route_class: RouteClass, bucket: TimeBucket, stats: HistoricalStats) {
        if let Ok(mut table) = self.stats.write() {
            table.insert((route_class, bucket), stats);
        }
    }
}

#[async_trait]
impl HistoricalStatsSource for MemoryStatsSource {
    async fn get_accepted_bid_stats(
        &self,
        route_class: RouteClass,
        bucket: TimeBucket,
    ) -> Result<HistoricalStats, Error> {
        let table = self.stats.read().map_err(|_| Error::unexpected_error())?;

        Ok(table
            .get(&(route_class, bucket))
            .cloned()
            .unwrap_or_default())
    }
}
