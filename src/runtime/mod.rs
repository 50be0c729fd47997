//! MQTT Runtime Module
//!
//! Keeps the device connected to its broker and turns broker traffic into
//! calls on the application.
//!
//! # Overview
//!
//! - [`MqttHandler`] is a scheduler [`Task`](crate::scheduler::Task) that
//!   connects (by host name or by service discovery), drains the outbound
//!   queue and routes inbound configuration and command messages.
//! - [`Publisher`] is a cloneable handle to the outbound queue. Everything
//!   that publishes (telemetry, events, commands) holds one.
//! - [`CommandRegistry`] maps command names to [`CommandHandler`]s.
//!
//! # Publishing Pattern
//!
//! Nothing publishes directly. A publish serializes the document and queues
//! it; the handler sends queued messages the next time it runs while
//! connected, once each, oldest first.

pub(crate) mod handler;
pub(crate) mod options;
pub(crate) mod publisher;
pub(crate) mod registry;
pub(crate) mod traits;

pub use handler::{COMMANDS_TOPIC, CONFIG_TOPIC, ConnectionState, MqttHandler, RESPONSES_TOPIC};
pub use options::{
    DEFAULT_LINK_RETRY, DEFAULT_POLL_INTERVAL, DEFAULT_PORT, DEFAULT_RECONNECT_DELAY, MqttOptions,
    ReconnectPolicy,
};
pub use publisher::{DEFAULT_QUEUE_DEPTH, OutboundQueue, Publisher};
pub use registry::CommandRegistry;
pub use traits::{
    AlwaysUp, CommandHandler, ConfigurationStore, JsonObject, LinkStatus, Resolver,
    ServiceInstance, ServiceType,
};
