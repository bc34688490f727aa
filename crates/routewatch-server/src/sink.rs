//! Notification fan-out.
//!
//! Ordered consumers (the JSON-lines writer) get every notification through
//! an unbounded queue. Broadcast subscribers (the reroute loop) are
//! best-effort: when they fall behind they lose the oldest notifications.
//! Either way the engine never waits.

use tokio::sync::{broadcast, mpsc};

use routewatch_core::{Notification, NotificationSink};

#[derive(Debug, Clone)]
pub struct FanoutSink {
    broadcast: broadcast::Sender<Notification>,
    ordered: Vec<mpsc::UnboundedSender<Notification>>,
}

impl FanoutSink {
    /// `capacity` bounds the best-effort broadcast buffer only.
    pub fn new(capacity: usize) -> Self {
        let (broadcast, _) = broadcast::channel(capacity.max(1));
        Self {
            broadcast,
            ordered: Vec::new(),
        }
    }

    /// Best-effort subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.broadcast.subscribe()
    }

    /// Subscription that receives every notification, in order.
    pub fn subscribe_all(&mut self) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ordered.push(tx);
        rx
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&mut self, notification: Notification) {
        let name = notification.name();
        self.ordered
            .retain(|tx| tx.send(notification.clone()).is_ok());
        if self.broadcast.send(notification).is_err() {
            tracing::trace!("No broadcast subscribers for {} notification", name);
        }
    }
}
