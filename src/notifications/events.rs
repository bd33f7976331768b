//! Notification events
//!
//! Defines the domain events published on the event bus.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Event types for notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// Vehicle parked and a session opened
    VehicleParked(VehicleParkedEvent),
    /// Vehicle left and its slot became available
    SlotFreed(SlotFreedEvent),
    /// Cash-in request accepted by the gateway
    PaymentInitiated(PaymentInitiatedEvent),
    /// Gateway outcome applied to a session
    PaymentSettled(PaymentSettledEvent),
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::VehicleParked(_) => "vehicle_parked",
            Event::SlotFreed(_) => "slot_freed",
            Event::PaymentInitiated(_) => "payment_initiated",
            Event::PaymentSettled(_) => "payment_settled",
        }
    }

    pub fn session_id(&self) -> i32 {
        match self {
            Event::VehicleParked(e) => e.session_id,
            Event::SlotFreed(e) => e.session_id,
            Event::PaymentInitiated(e) => e.session_id,
            Event::PaymentSettled(e) => e.session_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleParkedEvent {
    pub lot_id: i32,
    pub slot_id: i32,
    pub session_id: i32,
    pub plate: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotFreedEvent {
    pub lot_id: i32,
    pub slot_id: i32,
    pub session_id: i32,
    pub plate: String,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitiatedEvent {
    pub session_id: i32,
    pub reference: String,
    pub attempt_no: u32,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettledEvent {
    pub session_id: i32,
    pub reference: String,
    pub status: String, // Paid, PaymentFailed
    pub timestamp: DateTime<Utc>,
}

/// Wrapper for sending events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}
