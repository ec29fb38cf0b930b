use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use beacon_common::error::DeliveryError;
use beacon_common::types::Notification;

use crate::sink::DeliverySink;

/// Result of a single guarded delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The sink accepted the notification.
    Sent,
    /// The id was already delivered in this process; the sink was not called.
    AlreadyDelivered,
}

/// Tally of a batch delivery.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// At-most-once delivery per notification id for the process lifetime.
///
/// An id is claimed before the sink is invoked so concurrent deliveries of
/// the same id reach the sink once. A failed delivery releases the claim and
/// the id stays eligible for a later retry.
pub struct DeliveryGuard {
    sink: Arc<dyn DeliverySink>,
    delivered: RwLock<HashSet<String>>,
}

impl DeliveryGuard {
    pub fn new(sink: Arc<dyn DeliverySink>) -> Self {
        Self {
            sink,
            delivered: RwLock::new(HashSet::new()),
        }
    }

    pub async fn deliver(
        &self,
        notification: &Notification,
    ) -> Result<DeliveryStatus, DeliveryError> {
        if !self.delivered.write().insert(notification.id.clone()) {
            tracing::debug!(id = %notification.id, "Notification already delivered, skipping");
            return Ok(DeliveryStatus::AlreadyDelivered);
        }

        match self.sink.deliver(notification).await {
            Ok(()) => Ok(DeliveryStatus::Sent),
            Err(e) => {
                self.delivered.write().remove(&notification.id);
                Err(e)
            }
        }
    }

    /// Deliver every item in order. Failures are logged and do not stop the
    /// remaining items.
    pub async fn deliver_batch(&self, notifications: &[Notification]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for notification in notifications {
            match self.deliver(notification).await {
                Ok(DeliveryStatus::Sent) => report.sent += 1,
                Ok(DeliveryStatus::AlreadyDelivered) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(
                        id = %notification.id,
                        sink = self.sink.name(),
                        error = %e,
                        "Failed to deliver notification"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    pub fn is_delivered(&self, id: &str) -> bool {
        self.delivered.read().contains(id)
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.read().len()
    }
}
