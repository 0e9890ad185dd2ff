use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn icon(self) -> &'static str {
        match self {
            NotificationLevel::Success => "✅",
            NotificationLevel::Info => "ℹ️",
            NotificationLevel::Warning => "⚠️",
            NotificationLevel::Error => "❌",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Sending half. Clone it into every component that reports progress.
#[derive(Debug, Clone)]
pub struct NotificationPublisher {
    tx: Sender<Notification>,
}

impl NotificationPublisher {
    /// Returns `false` once the subscriber is gone.
    pub fn publish(&self, level: NotificationLevel, message: impl Into<String>) -> bool {
        self.tx
            .send(Notification {
                level,
                message: message.into(),
            })
            .is_ok()
    }

    pub fn success(&self, message: impl Into<String>) -> bool {
        self.publish(NotificationLevel::Success, message)
    }

    pub fn info(&self, message: impl Into<String>) -> bool {
        self.publish(NotificationLevel::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> bool {
        self.publish(NotificationLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.publish(NotificationLevel::Error, message)
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct NotificationSubscriber {
    rx: Receiver<Notification>,
}

impl NotificationSubscriber {
    /// Everything published so far, without blocking.
    pub fn drain(&self) -> Vec<Notification> {
        self.rx.try_iter().collect()
    }

    /// Blocks until the next notification or until every publisher is
    /// dropped.
    pub fn recv(&self) -> Option<Notification> {
        self.rx.recv().ok()
    }
}

/// Builds a connected publisher/subscriber pair.
pub struct NotificationChannel;

impl NotificationChannel {
    pub fn open() -> (NotificationPublisher, NotificationSubscriber) {
        let (tx, rx) = mpsc::channel();
        (NotificationPublisher { tx }, NotificationSubscriber { rx })
    }
}
