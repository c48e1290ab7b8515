use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{JourneyFeatures, PriceSuggestion};
use crate::error::Error;
use crate::server::DynAPI;

pub async fn suggest_price(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(journey_id): Path<Uuid>,
    Json(features): Json<JourneyFeatures>,
) -> Result<Json<PriceSuggestion>, Error> {
    let suggestion = api.suggest_price(user, journey_id, features).await?;

    Ok(suggestion.into())
}
