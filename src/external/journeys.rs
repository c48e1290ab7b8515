use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{entities::Journey, error::Error};

/// Read-only view of the journey service.
#[async_trait]
pub trait JourneyLookup: Send + Sync {
    async fn get_journey(&self, id: Uuid) -> Result<Journey, Error>;
}

pub struct HttpJourneyLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJourneyLookup {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl JourneyLookup for HttpJourneyLookup {
    #[tracing::instrument(skip(self))]
    async fn get_journey(&self, id: Uuid) -> Result<Journey, Error> {
        let url = format!("{}/journeys/{}", self.base_url, id);

        let res = self.client.get(url).send().await?;

        let status_code = res.status().as_u16();

        if status_code == 404 {
            return Err(Error::not_found_error("journey"));
        } else if status_code != 200 {
            tracing::warn!("journey service responded with {}", status_code);
            return Err(Error::upstream_error());
        }

        let journey: Journey = res.json().await?;

        if journey.id != id {
            tracing::warn!("journey service returned journey {} for {}", journey.id, id);
            return Err(Error::upstream_error());
        }

        Ok(journey)
    }
}

/// Journey table held in memory, for tests and local runs.
#[derive(Default)]
pub struct MemoryJourneyLookup {
    journeys: RwLock<HashMap<Uuid, Journey>>,
}

impl MemoryJourneyLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, journey: Journey) {
        if let Ok(mut journeys) = self.journeys.write() {
            journeys.insert(journey.id, journey);
        }
    }
}

#[async_trait]
impl JourneyLookup for MemoryJourneyLookup {
    async fn get_journey(&self, id: Uuid) -> Result<Journey, Error> {
        let journeys = self.journeys.read().map_err(|_| Error::unexpected_error())?;

        journeys
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found_error("journey"))
    }
}
