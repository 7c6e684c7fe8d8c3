//! Database access layer

pub mod audit;
pub mod entitlements;
pub mod features;
pub mod payment_events;
pub mod plans;
pub mod subscriptions;
pub mod usage;
