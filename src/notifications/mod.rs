//! Notifications module
//!
//! In-process domain events. Services publish on the bus after a state
//! change is committed; subscribers never block a publisher.
//!
//! # Usage
//! ```ignore
//! use lotpay::notifications::{create_event_bus, Event, SlotFreedEvent};
//!
//! let event_bus = create_event_bus();
//! let mut subscriber = event_bus.subscribe();
//! ```

pub mod event_bus;
pub mod events;

pub use event_bus::{
    create_event_bus, start_event_audit_task, EventBus, EventSubscriber, SharedEventBus,
};
pub use events::*;
