use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use std::sync::Mutex;

/// Broadcasts every published item to all live subscribers, in order.
///
/// Subscribers whose receiver was dropped are pruned on the next publish.
/// `close` ends every stream normally.
pub(crate) struct EventFanout<T> {
    subscribers: Mutex<Vec<UnboundedSender<T>>>,
}

impl<T: Clone> EventFanout<T> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self) -> UnboundedReceiver<T> {
        let (tx, rx) = unbounded();
        self.lock().push(tx);
        rx
    }

    pub(crate) fn publish(&self, item: T) {
        self.lock()
            .retain(|tx| tx.unbounded_send(item.clone()).is_ok());
    }

    pub(crate) fn close(&self) {
        for tx in self.lock().drain(..) {
            tx.close_channel();
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UnboundedSender<T>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
