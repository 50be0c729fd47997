//! # Error Types
//!
//! None of these errors ever escape a scheduler round. The messaging handler
//! logs them and turns them into a retry delay or a dropped message.

use alloc::string::String;
use core::fmt;

/// Why a connection attempt to the broker failed.
///
/// It is generic over the transport error type `E`, allowing it to wrap
/// specific errors from the underlying network transport.
#[derive(Debug)]
pub enum ConnectError<E> {
    /// The configured broker host could not be resolved.
    HostNotFound(String),
    /// Service discovery found no broker.
    NoBrokerFound,
    /// The transport refused or failed to open the connection.
    Transport(E),
}

impl<E> ConnectError<E> {
    pub fn transport(err: E) -> Self {
        ConnectError::Transport(err)
    }
}

impl<E: fmt::Debug> fmt::Display for ConnectError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::HostNotFound(host) => write!(f, "could not find host {}", host),
            ConnectError::NoBrokerFound => write!(f, "no MQTT services found"),
            ConnectError::Transport(err) => write!(f, "transport error: {:?}", err),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for ConnectError<E> {}

/// Why an inbound message was dropped instead of being handled.
#[derive(Debug)]
pub enum RouteError {
    /// The payload is not a JSON object.
    MalformedPayload(serde_json::Error),
    /// The payload is valid JSON but not an object.
    NotAnObject,
    /// No handler is registered for the command.
    UnknownCommand(String),
    /// The topic is neither the configuration topic nor a command topic.
    UnknownTopic(String),
}

impl From<serde_json::Error> for RouteError {
    fn from(err: serde_json::Error) -> Self {
        RouteError::MalformedPayload(err)
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::MalformedPayload(err) => write!(f, "malformed payload: {}", err),
            RouteError::NotAnObject => write!(f, "payload is not a JSON object"),
            RouteError::UnknownCommand(command) => write!(f, "unknown command: '{}'", command),
            RouteError::UnknownTopic(topic) => write!(f, "unknown topic: '{}'", topic),
        }
    }
}

impl core::error::Error for RouteError {}

/// Why a message could not be queued for publishing.
#[derive(Debug)]
pub enum PublishError {
    /// The document could not be serialized to JSON.
    Serialize(serde_json::Error),
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialize(err)
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Serialize(err) => write!(f, "could not serialize payload: {}", err),
        }
    }
}

impl core::error::Error for PublishError {}
