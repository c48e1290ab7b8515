mod events;
mod journeys;
mod stats;

pub use events::{log_events, ChannelPublisher, EventPublisher};
pub use journeys::{HttpJourneyLookup, JourneyLookup, MemoryJourneyLookup};
pub use stats::{HistoricalStatsSource, HttpStatsSource, MemoryStatsSource};
