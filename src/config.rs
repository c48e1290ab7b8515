use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::engine::pricing::Tariff;
use crate::error::Error;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub listen_addr: SocketAddr,
    pub journey_service_url: String,
    pub stats_service_url: Option<String>,
    pub event_channel_capacity: usize,
    pub pricing: PricingConfig,
}

#[derive(Clone, Debug, Default)]
pub struct PricingConfig {
    pub tariff: Tariff,
    /// Enables the exploratory price adjustment.
    pub exploration_seed: Option<u64>,
}

fn optional<T: FromStr>(key: &str) -> Result<Option<T>, Error> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::config_error(key)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn with_default<T: FromStr>(key: &str, default: T) -> Result<T, Error> {
    Ok(optional(key)?.unwrap_or(default))
}

fn tariff_value(key: &str, default: f64) -> Result<f64, Error> {
    let value = with_default(key, default)?;

    if !value.is_finite() || value < 0.0 {
        return Err(Error::config_error(key));
    }

    Ok(value)
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let tariff = Tariff::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: with_default("DATABASE_MAX_CONNECTIONS", 5)?,
            listen_addr: with_default("LISTEN_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            journey_service_url: env::var("JOURNEY_SERVICE_URL")?,
            stats_service_url: optional("STATS_SERVICE_URL")?,
            event_channel_capacity: with_default("EVENT_CHANNEL_CAPACITY", 1024)?,
            pricing: PricingConfig {
                tariff: Tariff {
                    base_fare: tariff_value("PRICING_BASE_FARE", tariff.base_fare)?,
                    per_km: tariff_value("PRICING_PER_KM", tariff.per_km)?,
                },
                exploration_seed: optional("PRICING_EXPLORATION_SEED")?,
            },
        })
    }
}
