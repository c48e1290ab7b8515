pub mod bids;
pub mod journeys;
