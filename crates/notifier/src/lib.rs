//! Outbound notices for import tooling: the webhook summary and the
//! in-process notification channel.

mod channel;
mod webhook;

pub use channel::{
    Notification, NotificationChannel, NotificationLevel, NotificationPublisher,
    NotificationSubscriber,
};
pub use webhook::{ClientImportSummary, ImportSummary, WebhookClient, WebhookError};

/// A non-fatal failure of an external service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNotice {
    pub service: String,
    pub message: String,
}

impl ServiceNotice {
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Forwards the notice as a warning.
    pub fn publish(&self, publisher: &NotificationPublisher) -> bool {
        publisher.warning(format!("{}: {}", self.service, self.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_becomes_warning() {
        let (publisher, subscriber) = NotificationChannel::open();
        ServiceNotice::new("webhook", "HTTP 502").publish(&publisher);

        let got = subscriber.drain();
        assert_eq!(got[0].level, NotificationLevel::Warning);
        assert_eq!(got[0].message, "webhook: HTTP 502");
    }
}
