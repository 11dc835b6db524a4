//! Subscriber registry for the shared connection.
//!
//! Every subscriber owns an unbounded queue, so delivery order matches the
//! order frames came off the socket and a slow reader never drops frames.

use parking_lot::Mutex;
use studio_protocol::InboundMessage;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub(crate) type SubscriberId = u64;

#[derive(Debug, Default)]
struct HubInner {
    next_id: SubscriberId,
    senders: Vec<(SubscriberId, UnboundedSender<InboundMessage>)>,
}

#[derive(Debug, Default)]
pub(crate) struct SubscriberHub {
    inner: Mutex<HubInner>,
}

impl SubscriberHub {
    /// Register a subscriber and return its id and queue.
    pub(crate) fn register(&self) -> (SubscriberId, UnboundedReceiver<InboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.senders.push((id, sender));
        (id, receiver)
    }

    /// Remove a subscriber. Returns the remaining count, or `None` if the id
    /// was already gone (e.g. after [`SubscriberHub::clear`]).
    pub(crate) fn unregister(&self, id: SubscriberId) -> Option<usize> {
        let mut inner = self.inner.lock();
        let before = inner.senders.len();
        inner.senders.retain(|(sid, _)| *sid != id);
        (inner.senders.len() != before).then_some(inner.senders.len())
    }

    /// Deliver a frame to every subscriber, pruning closed queues.
    pub(crate) fn broadcast(&self, message: &InboundMessage) {
        let mut inner = self.inner.lock();
        inner
            .senders
            .retain(|(_, sender)| sender.send(message.clone()).is_ok());
    }

    /// Drop every queue; pending receivers drain and then see `None`.
    pub(crate) fn clear(&self) {
        self.inner.lock().senders.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().senders.len()
    }
}
