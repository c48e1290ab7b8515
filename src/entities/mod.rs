mod bid;
mod event;
mod journey;
mod pricing;

pub use bid::{Bid, NewBid, Status as BidStatus, MAX_NOTE_LENGTH};
pub use event::BidEvent;
pub use journey::{Journey, JourneyStatus};
pub use pricing::{HistoricalStats, JourneyFeatures, PriceSuggestion, RouteClass, TimeBucket};
