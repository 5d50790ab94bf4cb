//! In-memory notification center and sinks

use crate::types::alert::{Notification, NotificationKind, Severity};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Default number of notifications retained by a [`NotificationCenter`]
pub const DEFAULT_MAX_RETAINED: usize = 5;

/// Destination for published notifications
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: Notification);
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn publish(&self, notification: Notification) {
        (**self).publish(notification)
    }
}

/// Handle returned by [`NotificationCenter::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Notification) + Send + Sync>;

struct CenterState {
    retained: VecDeque<Notification>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

/// Keeps the most recent notifications and fans each one out to listeners.
pub struct NotificationCenter {
    max_retained: usize,
    state: Mutex<CenterState>,
}

impl NotificationCenter {
    pub fn new(max_retained: usize) -> Self {
        Self {
            max_retained: max_retained.max(1),
            state: Mutex::new(CenterState {
                retained: VecDeque::with_capacity(max_retained),
                listeners: Vec::new(),
                next_subscription: 0,
            }),
        }
    }

    /// Register a listener called for every notification published afterwards
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(sub, _)| *sub != id);
        state.listeners.len() != before
    }

    /// Publish a new info-severity notification and return its id
    pub fn notify(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> String {
        let notification = Notification::new(kind, Severity::Info, title, message);
        let id = notification.id.clone();
        self.publish(notification);
        id
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.notify(NotificationKind::Success, title, message)
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.notify(NotificationKind::Error, title, message)
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.notify(NotificationKind::Warning, title, message)
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.notify(NotificationKind::Info, title, message)
    }

    /// Retained notifications, oldest first
    pub fn all(&self) -> Vec<Notification> {
        self.state.lock().retained.iter().cloned().collect()
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.retained.len();
        state.retained.retain(|n| n.id != id);
        state.retained.len() != before
    }

    pub fn clear(&self) {
        self.state.lock().retained.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_retained(&self) -> usize {
        self.max_retained
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETAINED)
    }
}

impl NotificationSink for NotificationCenter {
    fn publish(&self, notification: Notification) {
        let listeners: Vec<Listener> = {
            let mut state = self.state.lock();
            state.retained.push_back(notification.clone());
            while state.retained.len() > self.max_retained {
                state.retained.pop_front();
            }
            state.listeners.iter().map(|(_, l)| l.clone()).collect()
        };

        // Listeners run outside the lock so they may call back into the center
        for listener in listeners {
            listener(&notification);
        }
    }
}

/// Sink that writes each notification to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn publish(&self, notification: Notification) {
        let transaction_id = notification.transaction_id.as_deref().unwrap_or("-");
        match notification.kind {
            NotificationKind::Error => error!(
                transaction_id = %transaction_id,
                title = %notification.title,
                "{}", notification.message
            ),
            _ if notification.severity == Severity::High => warn!(
                transaction_id = %transaction_id,
                title = %notification.title,
                severity = notification.severity.as_str(),
                "{}", notification.message
            ),
            _ => info!(
                transaction_id = %transaction_id,
                title = %notification.title,
                severity = notification.severity.as_str(),
                "{}", notification.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_retains_latest_five() {
        let center = NotificationCenter::default();
        for i in 0..7 {
            center.info("Batch", format!("message {}", i));
        }

        let all = center.all();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].message, "message 2");
        assert_eq!(all[4].message, "message 6");
    }

    #[test]
    fn test_listeners_and_unsubscribe() {
        let center = NotificationCenter::default();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        let sub = center.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        center.success("Done", "first");
        assert!(center.unsubscribe(sub));
        assert!(!center.unsubscribe(sub));
        center.success("Done", "second");

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(center.len(), 2);
    }

    #[test]
    fn test_listener_may_reenter() {
        let center = Arc::new(NotificationCenter::default());
        let inner = center.clone();
        center.subscribe(move |_| {
            let _ = inner.all();
        });

        center.warning("Careful", "reentrant read");
        assert_eq!(center.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let center = NotificationCenter::default();
        let id = center.error("Scoring failed", "boom");
        center.info("Info", "kept");

        assert!(center.remove(&id));
        assert!(!center.remove(&id));
        assert_eq!(center.len(), 1);

        center.clear();
        assert!(center.is_empty());
    }

    #[test]
    fn test_kinds_and_severity() {
        let center = NotificationCenter::default();
        center.error("Scoring failed", "boom");
        center.success("Transaction Approved", "ok");

        let all = center.all();
        assert_eq!(all[0].kind, NotificationKind::Error);
        assert_eq!(all[0].severity, Severity::Info);
        assert_eq!(all[1].kind, NotificationKind::Success);
    }
}
