//! # Device-side MQTT Client and Task Scheduler
//!
//! `farmhub-client` is a `no_std` (with `alloc`) runtime for single-threaded
//! IoT devices. It multiplexes the device's periodic duties onto one thread
//! and keeps the device in touch with an MQTT broker.
//!
//! ## Core Features
//!
//! - **Cooperative scheduling:** Tasks say how long they may wait until their
//!   next run, either as a fixed cadence or as a deadline. The scheduler idles
//!   exactly as long as the most urgent task allows, so the device can spend
//!   the rest of the time in a low-power wait.
//! - **Queued publishing:** Publishing never blocks. Documents are serialized
//!   to JSON and queued under the device's topic prefix; when the queue is
//!   full the oldest message is dropped.
//! - **Remote control:** Configuration documents and named commands arrive on
//!   `<prefix>/config` and `<prefix>/commands/<name>`; command responses are
//!   published to `<prefix>/responses/<name>`.
//! - **Transport Agnostic:** The MQTT protocol client, name resolution and
//!   link monitoring are reached through traits, so the same code runs on
//!   the device and against fakes on the host.
//!
//! ## Example
//!
//! ```ignore
//! use farmhub_client::prelude::*;
//!
//! let options = MqttOptions::new("chicken-door-1", "devices/chicken-door/1");
//! let mut mqtt = MqttHandler::new(options, transport, mdns, config, wifi);
//! mqtt.register_command("echo", EchoCommand);
//!
//! let telemetry = Telemetry::new(mqtt.publisher(), SystemClock);
//! telemetry.register_provider(battery);
//!
//! let mut scheduler = Scheduler::new(SystemClock, DEFAULT_MAX_SLEEP_TIME);
//! scheduler.register(mqtt);
//! scheduler.register(TelemetryTask::new(telemetry, Duration::from_secs(60)));
//! scheduler.run();
//! ```
//!
//! ## Logging
//!
//! Enable the `log` feature to route log lines through the `log` facade, or
//! `esp32-log` to print them with `esp-println`. Without either, logging
//! compiles to nothing.

#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod commands;
pub mod error;
pub mod message;
pub mod runtime;
pub mod scheduler;
pub mod telemetry;
pub mod time;
pub mod transport;

// Re-export key types for easier access at the crate root.
pub use error::{ConnectError, PublishError, RouteError};
pub use message::{InboundMessage, OutboundMessage, QoS, Retention};
pub use runtime::{MqttHandler, MqttOptions, Publisher, ReconnectPolicy};
pub use scheduler::{DEFAULT_MAX_SLEEP_TIME, Schedule, Scheduler, Task};
pub use time::{Clock, SystemClock, Timing};
pub use transport::MqttTransport;

/// Everything an application typically needs, in one import.
pub mod prelude {
    pub use crate::commands::{
        EchoCommand, FileEntry, FileListCommand, FileReadCommand, FileRemoveCommand, FileStore,
        FileWriteCommand, FirmwareUpdater, HttpUpdateCommand, PingCommand, ResetWifiCommand,
        RestartCommand, UpdateOutcome,
    };
    pub use crate::message::{QoS, Retention};
    pub use crate::runtime::{
        AlwaysUp, CommandHandler, ConfigurationStore, JsonObject, LinkStatus, MqttHandler,
        MqttOptions, Publisher, ReconnectPolicy, Resolver, ServiceInstance, ServiceType,
    };
    pub use crate::scheduler::{
        DEFAULT_MAX_SLEEP_TIME, IntervalTask, Schedule, Scheduler, Task,
    };
    pub use crate::telemetry::{Telemetry, TelemetryProvider, TelemetryTask};
    pub use crate::time::{Clock, SystemClock, Timing};
    pub use crate::transport::MqttTransport;
    pub use embassy_time::{Duration, Instant};
}
