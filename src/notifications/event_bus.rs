//! Broadcast bus for parking events
//!
//! Publishing never waits: a subscriber that falls more than the channel
//! capacity behind skips the oldest events and is told how many it missed.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::{Event, EventMessage};
use crate::shared::shutdown::ShutdownSignal;

const DEFAULT_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber. Having none is not an error.
    pub fn publish(&self, event: Event) {
        let message = EventMessage::new(event);
        let kind = message.event.event_type();
        let session_id = message.event.session_id();
        let delivered = self.sender.send(message).unwrap_or(0);
        debug!(kind, session_id, delivered, "Event published");
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventMessage>,
}

impl EventSubscriber {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event subscriber lagged, oldest events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

/// Write one `audit` log line per event until shutdown. This is the
/// operator-visible trail of slot and payment transitions.
pub fn start_event_audit_task(bus: &EventBus, shutdown: ShutdownSignal) -> JoinHandle<()> {
    let mut subscriber = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                message = subscriber.recv() => match message {
                    Some(message) => audit(&message),
                    None => break,
                },
                _ = shutdown.wait() => break,
            }
        }
        debug!("Event audit task stopped");
    })
}

fn audit(message: &EventMessage) {
    match &message.event {
        Event::VehicleParked(e) => info!(
            target: "audit",
            event_id = %message.id,
            lot_id = e.lot_id,
            slot_id = e.slot_id,
            session_id = e.session_id,
            plate = %e.plate,
            "vehicle_parked"
        ),
        Event::SlotFreed(e) => info!(
            target: "audit",
            event_id = %message.id,
            lot_id = e.lot_id,
            slot_id = e.slot_id,
            session_id = e.session_id,
            fee = %e.fee,
            "slot_freed"
        ),
        Event::PaymentInitiated(e) => info!(
            target: "audit",
            event_id = %message.id,
            session_id = e.session_id,
            reference = %e.reference,
            attempt_no = e.attempt_no,
            amount = %e.amount,
            "payment_initiated"
        ),
        Event::PaymentSettled(e) => info!(
            target: "audit",
            event_id = %message.id,
            session_id = e.session_id,
            reference = %e.reference,
            status = %e.status,
            "payment_settled"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::events::PaymentSettledEvent;
    use chrono::Utc;
    use std::time::Duration;

    fn settled(session_id: i32) -> Event {
        Event::PaymentSettled(PaymentSettledEvent {
            session_id,
            reference: "R1".to_string(),
            status: "Paid".to_string(),
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();

        bus.publish(settled(1));

        let received = tokio::time::timeout(Duration::from_millis(100), subscriber.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event.event_type(), "payment_settled");
        assert_eq!(received.event.session_id(), 1);
    }

    #[test]
    fn subscriber_count_follows_drops() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let first = bus.subscribe();
        let _second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(first);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventBus::new().publish(settled(1));
    }

    #[test]
    fn lagging_subscriber_skips_to_retained_events() {
        let bus = EventBus::with_capacity(2);
        let mut subscriber = bus.subscribe();
        for id in 1..=5 {
            bus.publish(settled(id));
        }
        let ids: Vec<i32> = std::iter::from_fn(|| subscriber.try_recv())
            .map(|m| m.event.session_id())
            .collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[tokio::test]
    async fn audit_task_stops_on_shutdown() {
        let bus = EventBus::new();
        let shutdown = ShutdownSignal::new();
        let task = start_event_audit_task(&bus, shutdown.clone());
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(settled(7));
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
