use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Urban,
    Suburban,
    Intercity,
    Airport,
}

impl RouteClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Urban => "urban",
            Self::Suburban => "suburban",
            Self::Intercity => "intercity",
            Self::Airport => "airport",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    Night,
    MorningPeak,
    Midday,
    EveningPeak,
    Evening,
}

impl TimeBucket {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => Self::Night,
            6..=9 => Self::MorningPeak,
            10..=15 => Self::Midday,
            16..=19 => Self::EveningPeak,
            _ => Self::Evening,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Night => "night",
            Self::MorningPeak => "morning_peak",
            Self::Midday => "midday",
            Self::EveningPeak => "evening_peak",
            Self::Evening => "evening",
        }
    }
}

/// Longer than any road journey on Earth.
pub const MAX_DISTANCE_KM: f64 = 20_000.0;
pub const MAX_DEMAND_LEVEL: f64 = 100.0;
/// Historical means outside these bounds are treated as unusable.
pub const MAX_HISTORICAL_AMOUNT: f64 = 1e12;
pub const MIN_HISTORICAL_DISTANCE_KM: f64 = 0.1;

/// Inputs describing the journey a price is suggested for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JourneyFeatures {
    pub route_class: RouteClass,
    pub distance_km: f64,
    pub hour_of_day: u32,
    /// Open requests per available driver; 1.0 is balanced.
    pub demand_level: f64,
    /// Share of recent journeys taking this route, in `[0, 1]`.
    pub route_popularity: f64,
}

impl JourneyFeatures {
    pub fn validate(&self) -> Result<(), Error> {
        if !self.distance_km.is_finite() || self.distance_km <= 0.0 {
            return Err(Error::validation_error("distance_km must be a positive number"));
        }

        if self.distance_km > MAX_DISTANCE_KM {
            return Err(Error::validation_error("distance_km must be at most 20000"));
        }

        if self.hour_of_day > 23 {
            return Err(Error::validation_error("hour_of_day must be between 0 and 23"));
        }

        if !self.demand_level.is_finite() || self.demand_level < 0.0 {
            return Err(Error::validation_error("demand_level must be non-negative"));
        }

        if self.demand_level > MAX_DEMAND_LEVEL {
            return Err(Error::validation_error("demand_level must be at most 100"));
        }

        if !self.route_popularity.is_finite() || !(0.0..=1.0).contains(&self.route_popularity) {
            return Err(Error::validation_error("route_popularity must be between 0 and 1"));
        }

        Ok(())
    }

    pub fn time_bucket(&self) -> TimeBucket {
        TimeBucket::from_hour(self.hour_of_day)
    }
}

/// Aggregate over accepted bids of comparable journeys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalStats {
    pub sample_count: u64,
    pub mean_amount: f64,
    pub stddev_amount: f64,
    pub mean_distance_km: f64,
}

impl HistoricalStats {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_usable(&self, min_samples: u64) -> bool {
        self.sample_count >= min_samples
            && self.mean_amount.is_finite()
            && self.mean_amount > 0.0
            && self.mean_amount <= MAX_HISTORICAL_AMOUNT
            && self.mean_distance_km.is_finite()
            && (MIN_HISTORICAL_DISTANCE_KM..=MAX_DISTANCE_KM).contains(&self.mean_distance_km)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSuggestion {
    pub suggested_amount: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub explanation: Vec<String>,
    /// Informational only; `explanation` describes how the amount was reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}
