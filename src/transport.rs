//! # MQTT Transport Abstraction
//!
//! This module defines the `MqttTransport` trait, which abstracts the MQTT
//! protocol client underneath the messaging handler. The handler decides what
//! to send, when, and how to route what comes back; framing, keep-alive and
//! the socket itself belong to the transport.
//!
//! Every method runs on the scheduler's single thread, so implementations
//! must give up after a bounded timeout instead of blocking indefinitely.

use alloc::vec::Vec;
use core::net::SocketAddr;

use crate::message::{InboundMessage, QoS, Retention};

/// A trait representing a connection to an MQTT broker.
pub trait MqttTransport {
    /// The error type returned by the transport, e.g. a client error code.
    type Error: core::fmt::Debug;

    /// Opens a session with the broker at `broker` as `client_id`.
    fn connect(&mut self, broker: SocketAddr, client_id: &str) -> Result<(), Self::Error>;

    /// Whether the session opened by [`MqttTransport::connect`] is still alive.
    fn is_connected(&self) -> bool;

    /// Sends a single message.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retention: Retention,
        qos: QoS,
    ) -> Result<(), Self::Error>;

    /// Subscribes to a topic filter.
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error>;

    /// Services keep-alive and reads whatever arrived since the last call,
    /// appending received messages to `inbox`.
    fn poll(&mut self, inbox: &mut Vec<InboundMessage>) -> Result<(), Self::Error>;

    /// Tears down the session and any partially opened connection state.
    fn disconnect(&mut self);
}

impl<T: MqttTransport + ?Sized> MqttTransport for &mut T {
    type Error = T::Error;

    fn connect(&mut self, broker: SocketAddr, client_id: &str) -> Result<(), Self::Error> {
        (**self).connect(broker, client_id)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retention: Retention,
        qos: QoS,
    ) -> Result<(), Self::Error> {
        (**self).publish(topic, payload, retention, qos)
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        (**self).subscribe(topic, qos)
    }

    fn poll(&mut self, inbox: &mut Vec<InboundMessage>) -> Result<(), Self::Error> {
        (**self).poll(inbox)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}
