//! Domain entities for WebhookHub
//!
//! Row-store entities (sources, destinations, events, deliveries) plus the
//! `DeliveryJob` wire message that drives the delivery worker.

pub mod delivery;
pub mod destination;
pub mod event;
pub mod job;
pub mod source;

pub use delivery::{Delivery, DeliveryStatus};
pub use destination::{Destination, DestinationRule};
pub use event::Event;
pub use job::DeliveryJob;
pub use source::Source;
