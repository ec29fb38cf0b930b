//! Delivery of notifications to the user.
//!
//! A [`DeliverySink`] performs the actual hand-off (log line, webhook, ...).
//! The [`DeliveryGuard`] sits in front of it and makes sure every notification
//! id reaches the sink at most once successfully per process.

pub mod guard;
pub mod sink;

pub use guard::{DeliveryGuard, DeliveryReport, DeliveryStatus};
pub use sink::{DeliverySink, LogSink, WebhookSink};
