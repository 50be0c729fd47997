//! # Message Types
//!
//! Outbound messages are serialized when they are queued, so the memory held by
//! the queue does not depend on the JSON document the caller keeps mutating.

use alloc::string::String;
use alloc::vec::Vec;

/// Represents the Quality of Service (QoS) levels for MQTT messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// Whether the broker keeps the last message on a topic for new subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Retention {
    #[default]
    NoRetain,
    Retain,
}

impl Retention {
    pub fn is_retained(self) -> bool {
        self == Retention::Retain
    }
}

/// A message waiting in the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    topic: String,
    payload: Vec<u8>,
    retention: Retention,
    qos: QoS,
}

impl OutboundMessage {
    pub fn new(topic: String, payload: Vec<u8>, retention: Retention, qos: QoS) -> Self {
        Self {
            topic,
            payload,
            retention,
            qos,
        }
    }

    /// The full topic, prefix included.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    pub fn qos(&self) -> QoS {
        self.qos
    }
}

/// A message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}
