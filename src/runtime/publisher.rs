//! Outbound queue and the handles used to fill it.
//!
//! Publishing never performs I/O. A publish serializes the document, prefixes
//! the topic and queues the result; the messaging handler drains the queue to
//! the transport on its next round.

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use heapless::Deque;
use serde::Serialize;

use super::traits::JsonObject;
use crate::error::PublishError;
use crate::message::{OutboundMessage, QoS, Retention};

/// Number of messages the outbound queue holds unless configured otherwise.
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// A fixed-capacity FIFO of pending messages that drops the oldest entry
/// when a new one does not fit.
///
/// Losing stale telemetry is preferable to blocking the only thread.
pub struct OutboundQueue<const DEPTH: usize> {
    messages: Deque<OutboundMessage, DEPTH>,
    dropped: u32,
}

impl<const DEPTH: usize> OutboundQueue<DEPTH> {
    pub const fn new() -> Self {
        Self {
            messages: Deque::new(),
            dropped: 0,
        }
    }

    /// Appends a message, evicting the oldest one if the queue is full.
    ///
    /// Returns `false` if a message had to be dropped to make room.
    pub fn push(&mut self, message: OutboundMessage) -> bool {
        let mut stored_without_dropping = true;
        if self.messages.is_full() {
            if let Some(oldest) = self.messages.pop_front() {
                warn!(
                    "Overflow in publish queue, dropping message to '{}'",
                    oldest.topic()
                );
            }
            self.dropped = self.dropped.saturating_add(1);
            stored_without_dropping = false;
        }
        if let Err(message) = self.messages.push_back(message) {
            // Only reachable with a zero-capacity queue.
            warn!("Publish queue has no room, dropping message to '{}'", message.topic());
            return false;
        }
        stored_without_dropping
    }

    /// Removes the oldest message.
    pub fn pop(&mut self) -> Option<OutboundMessage> {
        self.messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        DEPTH
    }

    /// Total number of messages evicted since the queue was created.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Iterates over the pending messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &OutboundMessage> {
        self.messages.iter()
    }
}

impl<const DEPTH: usize> Default for OutboundQueue<DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

type SharedQueue<const DEPTH: usize> = Mutex<NoopRawMutex, RefCell<OutboundQueue<DEPTH>>>;

/// A cloneable handle for queuing messages under the device's topic prefix.
///
/// Telemetry, event publishers and commands hold one of these instead of a
/// reference to the messaging handler, which the scheduler owns.
#[derive(Clone)]
pub struct Publisher<const DEPTH: usize = DEFAULT_QUEUE_DEPTH> {
    prefix: Rc<str>,
    queue: Rc<SharedQueue<DEPTH>>,
}

impl<const DEPTH: usize> Publisher<DEPTH> {
    pub(crate) fn new(prefix: &str) -> Self {
        Self {
            prefix: Rc::from(prefix),
            queue: Rc::new(Mutex::new(RefCell::new(OutboundQueue::new()))),
        }
    }

    pub fn topic_prefix(&self) -> &str {
        &self.prefix
    }

    /// Builds `<prefix>/<suffix>`.
    pub fn full_topic(&self, suffix: &str) -> String {
        let mut topic = String::with_capacity(self.prefix.len() + 1 + suffix.len());
        topic.push_str(&self.prefix);
        topic.push('/');
        topic.push_str(suffix);
        topic
    }

    /// Queues `document` for publishing to `<prefix>/<suffix>`.
    ///
    /// Returns `false` if the queue overflowed and an older message was
    /// dropped (the new message is still queued), or if the document could
    /// not be serialized (nothing is queued).
    pub fn publish<T>(&self, suffix: &str, document: &T, retention: Retention, qos: QoS) -> bool
    where
        T: Serialize + ?Sized,
    {
        match self.try_publish(suffix, document, retention, qos) {
            Ok(stored_without_dropping) => stored_without_dropping,
            Err(err) => {
                error!("Cannot publish to '{}': {}", suffix, err);
                false
            }
        }
    }

    /// Like [`Publisher::publish`], with the document built by `populate`.
    pub fn publish_with<F>(&self, suffix: &str, populate: F, retention: Retention, qos: QoS) -> bool
    where
        F: FnOnce(&mut JsonObject),
    {
        let mut json = JsonObject::new();
        populate(&mut json);
        self.publish(suffix, &json, retention, qos)
    }

    /// Serializes and queues `document`, reporting serialization failures.
    pub fn try_publish<T>(
        &self,
        suffix: &str,
        document: &T,
        retention: Retention,
        qos: QoS,
    ) -> Result<bool, PublishError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(document)?;
        let topic = self.full_topic(suffix);
        debug!(
            "Queuing MQTT topic '{}'{} (qos = {}, {} bytes)",
            topic,
            if retention.is_retained() { " (retain)" } else { "" },
            qos as u8,
            payload.len()
        );
        let message = OutboundMessage::new(topic, payload, retention, qos);
        Ok(self.with_queue(|queue| queue.push(message)))
    }

    /// Number of messages waiting to be sent.
    pub fn pending(&self) -> usize {
        self.with_queue(|queue| queue.len())
    }

    /// Number of messages dropped because the queue overflowed.
    pub fn dropped(&self) -> u32 {
        self.with_queue(|queue| queue.dropped())
    }

    pub(crate) fn with_queue<R>(&self, f: impl FnOnce(&mut OutboundQueue<DEPTH>) -> R) -> R {
        self.queue.lock(|queue| f(&mut queue.borrow_mut()))
    }
}
