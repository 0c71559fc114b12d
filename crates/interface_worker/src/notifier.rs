//! Default notification delivery

use async_trait::async_trait;
use tracing::info;

use core_kernel::{DomainPort, PortError};
use domain_jobs::{Channel, Notification, Notifier};

/// Writes notifications to the log instead of an email or SMS gateway
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl DomainPort for LoggingNotifier {}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn deliver(&self, channel: Channel, notification: &Notification) -> Result<(), PortError> {
        info!(
            channel = channel.as_str(),
            recipient = %notification.recipient,
            message = %notification.message,
            "notification delivered"
        );
        Ok(())
    }
}
