mod extract;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

pub use crate::api::DynAPI;
pub use extract::{user_from_headers, USER_ID_HEADER, USER_ROLES_HEADER};

use crate::api::API;
use crate::error::Error;
use crate::server::handlers::{bids, journeys};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route(
            "/journeys/:journey_id/bids",
            post(bids::submit).get(bids::list_for_journey),
        )
        .route(
            "/journeys/:journey_id/bids/:bid_id/accept",
            patch(bids::accept),
        )
        .route(
            "/journeys/:journey_id/price_suggestions",
            post(journeys::suggest_price),
        )
        .route("/bids", get(bids::list_own))
        .route("/bids/:id", get(bids::find))
        .route("/bids/:id/withdraw", patch(bids::withdraw))
        .route("/sweeps", post(bids::sweep))
        .layer(Extension(api))
}

pub async fn serve<T: API + Sync + Send + 'static>(api: T, addr: SocketAddr) -> Result<(), Error> {
    let api = Arc::new(api) as DynAPI;

    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|err| {
            tracing::error!("server error: {}", err);
            Error::unexpected_error()
        })
}
