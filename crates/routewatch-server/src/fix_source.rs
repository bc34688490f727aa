//! Position-fix channel.
//!
//! A single consumer at a time holds a [`FixSubscription`] backed by a
//! bounded queue. Publishing waits for room in that queue, so a producer
//! faster than the navigation loop is slowed down instead of losing fixes.
//! The source also remembers the most recent fix so a consumer that starts
//! late can replay it.

use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use routewatch_core::PositionFix;

#[derive(Debug, Clone)]
pub struct FixSource {
    capacity: usize,
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    consumer: Mutex<Option<mpsc::Sender<PositionFix>>>,
    last: RwLock<Option<PositionFix>>,
}

impl FixSource {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Publish a fix, waiting while the consumer's queue is full.
    ///
    /// Returns the number of consumers reached: 0 when nobody is
    /// subscribed (the fix is still remembered for replay), else 1.
    pub async fn publish(&self, fix: PositionFix) -> usize {
        match self.shared.last.write() {
            Ok(mut last) => *last = Some(fix.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(fix.clone()),
        }

        let Some(consumer) = self.consumer() else {
            return 0;
        };
        match consumer.send(fix).await {
            Ok(()) => 1,
            Err(_) => 0,
        }
    }

    pub fn last_fix(&self) -> Option<PositionFix> {
        match self.shared.last.read() {
            Ok(last) => last.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Become the consumer. Any earlier subscription is detached and its
    /// `recv` returns `None` once drained.
    pub fn subscribe(&self) -> FixSubscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut consumer = match self.shared.consumer.lock() {
            Ok(consumer) => consumer,
            Err(poisoned) => poisoned.into_inner(),
        };
        *consumer = Some(tx);
        tracing::debug!("Fix subscription acquired");
        FixSubscription { rx }
    }

    pub fn subscriber_count(&self) -> usize {
        usize::from(self.consumer().is_some())
    }

    /// The live consumer's sender, if its subscription has not been dropped.
    fn consumer(&self) -> Option<mpsc::Sender<PositionFix>> {
        let consumer = match self.shared.consumer.lock() {
            Ok(consumer) => consumer,
            Err(poisoned) => poisoned.into_inner(),
        };
        consumer.as_ref().filter(|tx| !tx.is_closed()).cloned()
    }
}

/// The live subscription to the fix channel. Dropping it unsubscribes.
#[derive(Debug)]
pub struct FixSubscription {
    rx: mpsc::Receiver<PositionFix>,
}

impl FixSubscription {
    /// Next fix in publish order. `None` once the source is gone or a newer
    /// subscription has replaced this one.
    pub async fn recv(&mut self) -> Option<PositionFix> {
        self.rx.recv().await
    }
}

impl Drop for FixSubscription {
    fn drop(&mut self) {
        tracing::debug!("Fix subscription released");
    }
}

/// Publish one JSON fix per line from `reader` until EOF. Blank lines are
/// ignored and unparseable lines are logged and skipped. Reading pauses
/// while the consumer is behind.
pub async fn publish_json_lines<R: AsyncRead + Unpin>(reader: R, source: &FixSource) -> Result<usize> {
    let mut lines = BufReader::new(reader).lines();
    let mut published = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<PositionFix>(line) {
            Ok(fix) => {
                source.publish(fix).await;
                published += 1;
            }
            Err(err) => tracing::warn!("Ignoring unparseable fix: {}", err),
        }
    }

    Ok(published)
}
