use axum::extract::{Extension, Json, Path};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::Bid;
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct SubmitParams {
    amount: Decimal,
    note: Option<String>,
}

#[derive(Serialize, Deserialize, Default)]
pub struct SweepParams {
    now: Option<DateTime<Utc>>,
}

pub async fn submit(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(journey_id): Path<Uuid>,
    Json(params): Json<SubmitParams>,
) -> Result<Json<Bid>, Error> {
    let bid = api
        .submit_bid(user, journey_id, params.amount, params.note)
        .await?;

    Ok(bid.into())
}

pub async fn list_for_journey(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(journey_id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, Error> {
    let bids = api.list_journey_bids(user, journey_id).await?;

    Ok(bids.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path((journey_id, bid_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Bid>, Error> {
    let bid = api.accept_bid(user, journey_id, bid_id).await?;

    Ok(bid.into())
}

pub async fn withdraw(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Bid>, Error> {
    let bid = api.withdraw_bid(user, id).await?;

    Ok(bid.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Bid>, Error> {
    let bid = api.find_bid(user, id).await?;

    Ok(bid.into())
}

pub async fn list_own(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<Bid>>, Error> {
    let bids = api.list_driver_bids(user).await?;

    Ok(bids.into())
}

pub async fn sweep(
    Extension(api): Extension<DynAPI>,
    user: User,
    params: Option<Json<SweepParams>>,
) -> Result<Json<Vec<Bid>>, Error> {
    let now = params
        .and_then(|Json(params)| params.now)
        .unwrap_or_else(Utc::now);

    let bids = api.expire_stale_bids(user, now).await?;

    Ok(bids.into())
}
