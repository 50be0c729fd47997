//! # Built-in Commands
//!
//! Handlers for the commands most devices expose. Register them with
//! [`MqttHandler::register_command`](crate::runtime::MqttHandler::register_command)
//! under the names `echo`, `ping`, `reset-wifi`, `restart`, `update` and
//! `files/list`, `files/read`, `files/write`, `files/remove`.

mod files;

use alloc::string::{String, ToString};
use core::fmt;

use serde_json::Value;

use crate::runtime::{CommandHandler, DEFAULT_QUEUE_DEPTH, JsonObject};
use crate::telemetry::Telemetry;
use crate::time::Clock;

pub use files::{
    FileEntry, FileListCommand, FileReadCommand, FileRemoveCommand, FileStore, FileWriteCommand,
};

/// Responds with the request it received, under `original`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoCommand;

impl CommandHandler for EchoCommand {
    fn handle(&mut self, request: &JsonObject, response: &mut JsonObject) {
        response.insert("original".into(), Value::Object(request.clone()));
    }
}

/// Publishes a telemetry report and responds with the uptime under `pong`.
pub struct PingCommand<C: Clock, const DEPTH: usize = DEFAULT_QUEUE_DEPTH> {
    telemetry: Telemetry<C, DEPTH>,
}

impl<C: Clock, const DEPTH: usize> PingCommand<C, DEPTH> {
    pub fn new(telemetry: Telemetry<C, DEPTH>) -> Self {
        Self { telemetry }
    }
}

impl<C: Clock, const DEPTH: usize> CommandHandler for PingCommand<C, DEPTH> {
    fn handle(&mut self, _request: &JsonObject, response: &mut JsonObject) {
        self.telemetry.publish();
        response.insert("pong".into(), Value::from(self.telemetry.uptime_millis()));
    }
}

/// Restarts the device through the given callback.
pub struct RestartCommand<F: FnMut()> {
    restart: F,
}

impl<F: FnMut()> RestartCommand<F> {
    pub fn new(restart: F) -> Self {
        Self { restart }
    }
}

impl<F: FnMut()> CommandHandler for RestartCommand<F> {
    fn handle(&mut self, _request: &JsonObject, _response: &mut JsonObject) {
        info!("Restarting on remote request");
        (self.restart)();
    }
}

/// Forgets the stored Wi-Fi credentials through the given callback and
/// responds with `reset: true`.
pub struct ResetWifiCommand<F: FnMut()> {
    reset: F,
}

impl<F: FnMut()> ResetWifiCommand<F> {
    pub fn new(reset: F) -> Self {
        Self { reset }
    }
}

impl<F: FnMut()> CommandHandler for ResetWifiCommand<F> {
    fn handle(&mut self, _request: &JsonObject, response: &mut JsonObject) {
        info!("Resetting Wi-Fi settings on remote request");
        (self.reset)();
        response.insert("reset".into(), Value::Bool(true));
    }
}

/// Result of a firmware update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// New firmware was installed.
    Updated,
    /// The server had nothing newer than the running version.
    NoUpdates,
    /// The update failed; carries the updater's description of why.
    Failed(String),
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Updated => f.write_str("Update OK"),
            UpdateOutcome::NoUpdates => f.write_str("No updates available"),
            UpdateOutcome::Failed(reason) => f.write_str(reason),
        }
    }
}

/// Downloads and installs firmware over HTTP(S).
pub trait FirmwareUpdater {
    fn update(&mut self, url: &str, current_version: &str) -> UpdateOutcome;
}

impl<U: FirmwareUpdater + ?Sized> FirmwareUpdater for &mut U {
    fn update(&mut self, url: &str, current_version: &str) -> UpdateOutcome {
        (**self).update(url, current_version)
    }
}

/// Updates the firmware from the `url` given in the request.
///
/// A missing, non-string or empty `url` is answered with a failure and the
/// updater is not called.
///
/// The outcome is reported under `failure`, including the successful one,
/// which is usually never seen because the device reboots into the new image.
pub struct HttpUpdateCommand<U: FirmwareUpdater> {
    updater: U,
    current_version: String,
}

impl<U: FirmwareUpdater> HttpUpdateCommand<U> {
    pub fn new(updater: U, current_version: impl Into<String>) -> Self {
        Self {
            updater,
            current_version: current_version.into(),
        }
    }
}

impl<U: FirmwareUpdater> CommandHandler for HttpUpdateCommand<U> {
    fn handle(&mut self, request: &JsonObject, response: &mut JsonObject) {
        let Some(url) = request.get("url") else {
            response.insert("failure".into(), Value::from("Command contains no URL"));
            return;
        };
        let Some(url) = url.as_str() else {
            response.insert("failure".into(), Value::from("Command contains invalid url"));
            return;
        };
        if url.is_empty() {
            response.insert("failure".into(), Value::from("Command contains empty url"));
            return;
        }
        info!(
            "Updating from version {} via URL {}",
            self.current_version, url
        );
        let outcome = self.updater.update(url, &self.current_version);
        response.insert("failure".into(), Value::from(outcome.to_string()));
    }
}
