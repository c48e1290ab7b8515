//! Price suggestions for bidders.
//!
//! Starts from what passengers accepted on comparable journeys (same route class and
//! time-of-day bucket, scaled by distance) and applies a few named adjustments. Every
//! adjustment that moves the price by at least one percent gets one line of explanation.

use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::entities::{HistoricalStats, JourneyFeatures, PriceSuggestion, TimeBucket};
use crate::error::Error;

pub const MIN_SAMPLES: u64 = 3;

const NEGLIGIBLE_EFFECT: f64 = 0.01;
const MIN_SPREAD: f64 = 0.08;
const MAX_SPREAD: f64 = 0.25;
const MIN_SUGGESTED_AMOUNT: f64 = 1.0;
const MIN_AMOUNT: f64 = 0.01;
/// Keeps every suggestion submittable as a bid.
const MAX_AMOUNT: f64 = 999_999_999_999.0;

const DEMAND_SENSITIVITY: f64 = 0.15;
const MAX_DEMAND_DISCOUNT: f64 = -0.10;
const MAX_DEMAND_PREMIUM: f64 = 0.30;
const PEAK_PREMIUM: f64 = 0.12;
const NIGHT_PREMIUM: f64 = 0.20;
const POPULARITY_SENSITIVITY: f64 = 0.10;
const EXPLORATION_STDDEV: f64 = 0.02;
const MAX_EXPLORATION: f64 = 0.05;

/// Fallback tariff for journeys without enough comparable history.
#[derive(Clone, Debug, PartialEq)]
pub struct Tariff {
    pub base_fare: f64,
    pub per_km: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            base_fare: 2.5,
            per_km: 1.2,
        }
    }
}

struct Adjustment {
    effect: f64,
    explanation: String,
}

fn percent(effect: f64) -> String {
    format!("{:.1}%", effect.abs() * 100.0)
}

fn demand_adjustment(features: &JourneyFeatures) -> Adjustment {
    let effect = ((features.demand_level - 1.0) * DEMAND_SENSITIVITY)
        .clamp(MAX_DEMAND_DISCOUNT, MAX_DEMAND_PREMIUM);

    let explanation = if effect > 0.0 {
        format!(
            "High demand ({:.1} requests per available driver) raises the price by {}",
            features.demand_level,
            percent(effect)
        )
    } else {
        format!(
            "Low demand ({:.1} requests per available driver) lowers the price by {}",
            features.demand_level,
            percent(effect)
        )
    };

    Adjustment {
        effect,
        explanation,
    }
}

fn time_of_day_adjustment(features: &JourneyFeatures) -> Adjustment {
    let (effect, explanation) = match features.time_bucket() {
        TimeBucket::Night => (
            NIGHT_PREMIUM,
            format!("Night-time premium of {}", percent(NIGHT_PREMIUM)),
        ),
        TimeBucket::MorningPeak | TimeBucket::EveningPeak => (
            PEAK_PREMIUM,
            format!("Peak-hour premium of {}", percent(PEAK_PREMIUM)),
        ),
        TimeBucket::Midday | TimeBucket::Evening => (0.0, String::new()),
    };

    Adjustment {
        effect,
        explanation,
    }
}

fn popularity_adjustment(features: &JourneyFeatures) -> Adjustment {
    let effect = (0.5 - features.route_popularity) * POPULARITY_SENSITIVITY;

    let explanation = if effect > 0.0 {
        format!("Rarely travelled route raises the price by {}", percent(effect))
    } else {
        format!(
            "Popular route with many competing drivers lowers the price by {}",
            percent(effect)
        )
    };

    Adjustment {
        effect,
        explanation,
    }
}

fn exploration_adjustment(seed: u64) -> Result<Adjustment, Error> {
    let normal = Normal::new(0.0, EXPLORATION_STDDEV).map_err(|err| {
        tracing::error!("invalid exploration distribution: {}", err);
        Error::unexpected_error()
    })?;

    let mut rng = StdRng::seed_from_u64(seed);
    let effect: f64 = normal
        .sample(&mut rng)
        .clamp(-MAX_EXPLORATION, MAX_EXPLORATION);

    Ok(Adjustment {
        effect,
        explanation: format!(
            "Exploratory adjustment of {}{}",
            if effect >= 0.0 { "+" } else { "-" },
            percent(effect)
        ),
    })
}

fn to_money(amount: f64) -> Result<Decimal, Error> {
    Decimal::from_f64(amount)
        .map(|amount| amount.round_dp(2))
        .ok_or_else(|| {
            tracing::error!("amount {} cannot be represented", amount);
            Error::unexpected_error()
        })
}

/// Produces a suggestion for `features`. Identical inputs (including `seed`) give identical
/// output; without a seed there is no exploratory component.
pub fn suggest(
    features: &JourneyFeatures,
    stats: &HistoricalStats,
    tariff: &Tariff,
    seed: Option<u64>,
) -> Result<PriceSuggestion, Error> {
    features.validate()?;

    let mut explanation = Vec::new();

    let (baseline, spread) = if stats.is_usable(MIN_SAMPLES) {
        explanation.push(format!(
            "Based on {} accepted bids for {} journeys in the {} period, averaging {:.2} over {:.1} km",
            stats.sample_count,
            features.route_class.name(),
            features.time_bucket().name(),
            stats.mean_amount,
            stats.mean_distance_km
        ));

        let variation = stats.stddev_amount / stats.mean_amount;
        let spread = if variation.is_finite() {
            variation.clamp(MIN_SPREAD, MAX_SPREAD)
        } else {
            MAX_SPREAD
        };

        (
            stats.mean_amount * features.distance_km / stats.mean_distance_km,
            spread,
        )
    } else {
        explanation.push(format!(
            "Too few accepted bids on comparable journeys; using the standard tariff of {:.2} plus {:.2} per km",
            tariff.base_fare, tariff.per_km
        ));

        (tariff.base_fare + tariff.per_km * features.distance_km, MAX_SPREAD)
    };

    let mut adjustments = vec![
        demand_adjustment(features),
        time_of_day_adjustment(features),
        popularity_adjustment(features),
    ];

    if let Some(seed) = seed {
        adjustments.push(exploration_adjustment(seed)?);
    }

    let mut multiplier = 1.0;

    for adjustment in adjustments {
        if adjustment.effect.abs() < NEGLIGIBLE_EFFECT {
            continue;
        }

        multiplier *= 1.0 + adjustment.effect;
        explanation.push(adjustment.explanation);
    }

    let suggested = (baseline * multiplier).clamp(MIN_SUGGESTED_AMOUNT, MAX_AMOUNT);

    let suggested_amount = to_money(suggested)?;
    let min_amount = to_money(suggested * (1.0 - spread))?.max(to_money(MIN_AMOUNT)?);
    let max_amount = to_money((suggested * (1.0 + spread)).min(MAX_AMOUNT))?;

    let confidence = match stats.sample_count {
        0 => None,
        n => Some(n as f64 / (n as f64 + 10.0)),
    };

    Ok(PriceSuggestion {
        suggested_amount,
        min_amount,
        max_amount,
        explanation,
        confidence,
    })
}
