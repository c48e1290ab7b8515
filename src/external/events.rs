use async_channel::{Receiver, Sender, TrySendError};

use crate::entities::BidEvent;

/// Fire-and-forget delivery of lifecycle events. Implementations must not block and must not
/// report failures back to the caller.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: BidEvent);
}

/// Hands events to a bounded channel drained by whatever fans them out.
pub struct ChannelPublisher {
    sender: Sender<BidEvent>,
}

impl ChannelPublisher {
    pub fn new(capacity: usize) -> (Self, Receiver<BidEvent>) {
        let (sender, receiver) = async_channel::bounded(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: BidEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    "event channel full, dropping {} for bid {}",
                    event.name(),
                    event.bid().id
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    "event channel closed, dropping {} for bid {}",
                    event.name(),
                    event.bid().id
                );
            }
        }
    }
}

/// Drains the channel, logging every event. Stands in for the notification services.
pub async fn log_events(receiver: Receiver<BidEvent>) {
    while let Ok(event) = receiver.recv().await {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(event = event.name(), %payload, "bid event"),
            Err(err) => tracing::warn!("failed to serialize {}: {}", event.name(), err),
        }
    }

    tracing::info!("event channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Bid, NewBid};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn bid() -> Bid {
        let new_bid = NewBid {
            journey_id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            amount: Decimal::new(3500, 0),
            note: None,
        };

        Bid::new(new_bid, Utc::now()).unwrap()
    }

    #[test]
    fn publishes_in_order_and_drops_when_full() {
        let (publisher, receiver) = ChannelPublisher::new(2);

        let first = bid();
        let second = bid();

        publisher.publish(BidEvent::BidSubmitted(first.clone()));
        publisher.publish(BidEvent::BidAccepted(second.clone()));
        // full: dropped, not propagated
        publisher.publish(BidEvent::BidRejected(first.clone()));

        assert_eq!(receiver.try_recv().unwrap(), BidEvent::BidSubmitted(first));
        assert_eq!(receiver.try_recv().unwrap(), BidEvent::BidAccepted(second));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let (publisher, receiver) = ChannelPublisher::new(1);
        drop(receiver);

        publisher.publish(BidEvent::BidExpired(bid()));
    }

    #[test]
    fn events_serialize_with_their_name() {
        let event = BidEvent::BidWithdrawn(bid());
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["name"], "bid_withdrawn");
        assert_eq!(value["bid"]["status"], "pending");
    }
}
