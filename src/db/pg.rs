use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Executor, Pool, Postgres, Row,
};
use uuid::Uuid;

use super::BidStore;
use crate::entities::{Bid, BidStatus, NewBid};
use crate::error::{ConflictReason, Error};

const BID_COLUMNS: &str =
    "id, journey_id, driver_id, amount, note, status, created_at, decided_at, version";

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgBidStore {
    pool: Pool<Postgres>,
}

impl PgBidStore {
    #[tracing::instrument(name = "PgBidStore::connect", skip(db_uri))]
    pub async fn connect(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        Self::new(pool).await
    }

    pub async fn new(pool: Pool<Postgres>) -> Result<Self, Error> {
        pool.execute(
            "CREATE TABLE IF NOT EXISTS bids (
                id UUID PRIMARY KEY,
                journey_id UUID NOT NULL,
                driver_id UUID NOT NULL,
                amount NUMERIC(14, 2) NOT NULL CHECK (amount > 0),
                note VARCHAR(300),
                status VARCHAR NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                decided_at TIMESTAMPTZ,
                version INT8 NOT NULL DEFAULT 0
            )",
        )
        .await?;

        pool.execute("CREATE INDEX IF NOT EXISTS bids_journey_id ON bids (journey_id, created_at)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS bids_driver_id ON bids (driver_id, created_at)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS bids_pending ON bids (created_at) WHERE status = 'pending'")
            .await?;

        // a journey can hold at most one accepted bid
        pool.execute("CREATE UNIQUE INDEX IF NOT EXISTS bids_one_accepted_per_journey ON bids (journey_id) WHERE status = 'accepted'")
            .await?;

        Ok(Self { pool })
    }
}

fn bid_from_row(row: &PgRow) -> Result<Bid, Error> {
    let status: String = row.try_get("status")?;

    Ok(Bid {
        id: row.try_get("id")?,
        journey_id: row.try_get("journey_id")?,
        driver_id: row.try_get("driver_id")?,
        amount: row.try_get("amount")?,
        note: row.try_get("note")?,
        status: BidStatus::parse(&status)?,
        created_at: row.try_get("created_at")?,
        decided_at: row.try_get("decided_at")?,
        version: row.try_get("version")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[async_trait]
impl BidStore for PgBidStore {
    #[tracing::instrument(skip(self))]
    async fn create(&self, new_bid: NewBid, now: DateTime<Utc>) -> Result<Bid, Error> {
        let bid = Bid::new(new_bid, now)?;

        let mut conn = self.pool.acquire().await?;

        // read back what the column types kept
        let query = format!(
            "INSERT INTO bids (id, journey_id, driver_id, amount, note, status, created_at, decided_at, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, 0)
             RETURNING {}",
            BID_COLUMNS
        );

        let row = conn
            .fetch_one(
                sqlx::query(&query)
                    .bind(&bid.id)
                    .bind(&bid.journey_id)
                    .bind(&bid.driver_id)
                    .bind(&bid.amount)
                    .bind(&bid.note)
                    .bind(bid.status.name())
                    .bind(&bid.created_at),
            )
            .await?;

        bid_from_row(&row)
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> Result<Bid, Error> {
        let mut conn = self.pool.acquire().await?;

        let query = format!("SELECT {} FROM bids WHERE id = $1", BID_COLUMNS);

        let row = conn
            .fetch_optional(sqlx::query(&query).bind(&id))
            .await?
            .ok_or_else(|| Error::not_found_error("bid"))?;

        bid_from_row(&row)
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_journey(&self, journey_id: Uuid) -> Result<Vec<Bid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let query = format!(
            "SELECT {} FROM bids WHERE journey_id = $1 ORDER BY created_at ASC, id ASC",
            BID_COLUMNS
        );

        conn.fetch_all(sqlx::query(&query).bind(&journey_id))
            .await?
            .iter()
            .map(bid_from_row)
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Bid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let query = format!(
            "SELECT {} FROM bids WHERE driver_id = $1 ORDER BY created_at ASC, id ASC",
            BID_COLUMNS
        );

        conn.fetch_all(sqlx::query(&query).bind(&driver_id))
            .await?
            .iter()
            .map(bid_from_row)
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn list_pending(&self) -> Result<Vec<Bid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let query = format!(
            "SELECT {} FROM bids WHERE status = 'pending' ORDER BY created_at ASC, id ASC",
            BID_COLUMNS
        );

        conn.fetch_all(sqlx::query(&query))
            .await?
            .iter()
            .map(bid_from_row)
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected_version: i64,
        new_status: BidStatus,
        now: DateTime<Utc>,
    ) -> Result<Bid, Error> {
        BidStatus::Pending.validate_transition(new_status)?;

        let mut conn = self.pool.acquire().await?;

        // single conditional write keyed on id and version
        let query = format!(
            "UPDATE bids SET status = $3, decided_at = $4, version = version + 1
             WHERE id = $1 AND version = $2 AND status = 'pending'
             RETURNING {}",
            BID_COLUMNS
        );

        let result = conn
            .fetch_optional(
                sqlx::query(&query)
                    .bind(&id)
                    .bind(expected_version)
                    .bind(new_status.name())
                    .bind(&now),
            )
            .await;

        let maybe_row = match result {
            Ok(maybe_row) => maybe_row,
            Err(err) if is_unique_violation(&err) => {
                tracing::info!("journey already has an accepted bid");
                return Err(Error::conflict_error(ConflictReason::RaceLost));
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(row) = maybe_row {
            return bid_from_row(&row);
        }

        drop(conn);

        // nothing updated; report why
        let current = self.get_by_id(id).await?;

        if current.version != expected_version {
            return Err(Error::conflict_error(ConflictReason::StaleVersion));
        }

        current.status.validate_transition(new_status)?;

        Err(Error::conflict_error(ConflictReason::StaleVersion))
    }
}
