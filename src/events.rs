//! Change notifications for the view layer
//!
//! The core never renders anything. After each state change it publishes
//! a [`ChangeEvent`] and the view re-reads whatever it displays.

use crate::message::Uid;
use crate::sync::FolderKey;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// What changed in the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeEvent {
    AccountsChanged,
    FoldersChanged,
    WindowChanged { key: FolderKey },
    MessageChanged { key: FolderKey, uid: Uid },
    OperationsChanged { pending: usize },
    /// A user-visible error from the single reporting channel.
    Error { operation: String, message: String },
}

/// Fan-out sender for [`ChangeEvent`]s.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Notifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ChangeEvent) {
        // No subscriber is fine: the view may not be attached yet.
        if self.tx.send(event).is_err() {
            debug!("Change event dropped, no view subscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_see_events_in_order() {
        let notifier = Notifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.emit(ChangeEvent::FoldersChanged);
        notifier.emit(ChangeEvent::OperationsChanged { pending: 0 });

        assert_eq!(rx.try_recv().unwrap(), ChangeEvent::FoldersChanged);
        assert_eq!(
            rx.try_recv().unwrap(),
            ChangeEvent::OperationsChanged { pending: 0 }
        );
    }

    #[test]
    fn emit_without_subscribers_does_not_fail() {
        Notifier::new(1).emit(ChangeEvent::AccountsChanged);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(ChangeEvent::OperationsChanged { pending: 2 }).unwrap();
        assert_eq!(json["type"], "operationsChanged");
        assert_eq!(json["pending"], 2);
    }
}
