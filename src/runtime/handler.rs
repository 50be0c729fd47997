//! The messaging handler task.

use alloc::string::String;
use alloc::vec::Vec;
use core::mem;
use core::net::SocketAddr;

use embassy_time::Duration;
use serde::Serialize;
use serde_json::Value;

use super::options::MqttOptions;
use super::publisher::{DEFAULT_QUEUE_DEPTH, Publisher};
use super::registry::CommandRegistry;
use super::traits::{AlwaysUp, CommandHandler, ConfigurationStore, JsonObject, LinkStatus, Resolver};
use crate::error::{ConnectError, RouteError};
use crate::message::{InboundMessage, QoS, Retention};
use crate::scheduler::{Schedule, Task};
use crate::time::Timing;
use crate::transport::MqttTransport;

/// Suffix of the inbound configuration topic.
pub const CONFIG_TOPIC: &str = "config";
/// Suffix under which commands arrive, one sub-topic per command.
pub const COMMANDS_TOPIC: &str = "commands";
/// Suffix under which command responses are published.
pub const RESPONSES_TOPIC: &str = "responses";

const CONFIG_QOS: QoS = QoS::ExactlyOnce;
const COMMAND_QOS: QoS = QoS::ExactlyOnce;
const RESPONSE_QOS: QoS = QoS::ExactlyOnce;

/// Connection lifecycle of the handler. Every failure goes back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Keeps the device connected to its broker and routes what the broker sends.
///
/// The handler is a [`Task`]: register it with the
/// [`Scheduler`](crate::scheduler::Scheduler) and it will, every round,
///
/// 1. back off for `link_retry` while the network link is down,
/// 2. try to connect (resolving or discovering the broker) if disconnected,
///    backing off according to the [`ReconnectPolicy`](super::ReconnectPolicy)
///    on failure,
/// 3. otherwise send every queued message once, service the transport and
///    route inbound messages, then come back after `poll_interval`.
///
/// Inbound messages on `<prefix>/config` go to the [`ConfigurationStore`];
/// messages on `<prefix>/commands/<name>` go to the command registered under
/// `<name>`, whose non-empty response is published to
/// `<prefix>/responses/<name>`.
///
/// Register the handler by `&mut` if the application needs it back after
/// running the scheduler, e.g. to call [`MqttHandler::prepare_for_sleep`].
pub struct MqttHandler<T, R, S, L = AlwaysUp, const DEPTH: usize = DEFAULT_QUEUE_DEPTH>
where
    T: MqttTransport,
    R: Resolver,
    S: ConfigurationStore,
    L: LinkStatus,
{
    options: MqttOptions,
    transport: T,
    resolver: R,
    config: S,
    link: L,
    publisher: Publisher<DEPTH>,
    commands: CommandRegistry,
    state: ConnectionState,
    failures: u32,
    config_topic: String,
    command_prefix: String,
    inbox: Vec<InboundMessage>,
}

impl<T, R, S, L, const DEPTH: usize> MqttHandler<T, R, S, L, DEPTH>
where
    T: MqttTransport,
    R: Resolver,
    S: ConfigurationStore,
    L: LinkStatus,
{
    pub fn new(options: MqttOptions, transport: T, resolver: R, config: S, link: L) -> Self {
        info!(
            "MQTT client ID is '{}', topic prefix is '{}'",
            options.client_id, options.topic_prefix
        );
        let publisher = Publisher::new(&options.topic_prefix);
        let config_topic = publisher.full_topic(CONFIG_TOPIC);
        let mut command_prefix = publisher.full_topic(COMMANDS_TOPIC);
        command_prefix.push('/');
        Self {
            options,
            transport,
            resolver,
            config,
            link,
            publisher,
            commands: CommandRegistry::new(),
            state: ConnectionState::Disconnected,
            failures: 0,
            config_topic,
            command_prefix,
            inbox: Vec::new(),
        }
    }

    /// A handle other tasks use to queue messages.
    pub fn publisher(&self) -> Publisher<DEPTH> {
        self.publisher.clone()
    }

    pub fn options(&self) -> &MqttOptions {
        &self.options
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.transport.is_connected()
    }

    /// Connection attempts that failed since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Number of messages waiting to be sent.
    pub fn pending(&self) -> usize {
        self.publisher.pending()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Queues `document` for `<prefix>/<suffix>`. See [`Publisher::publish`].
    pub fn publish<D>(&self, suffix: &str, document: &D, retention: Retention, qos: QoS) -> bool
    where
        D: Serialize + ?Sized,
    {
        self.publisher.publish(suffix, document, retention, qos)
    }

    /// Queues a document built by `populate`. See [`Publisher::publish_with`].
    pub fn publish_with<F>(&self, suffix: &str, populate: F, retention: Retention, qos: QoS) -> bool
    where
        F: FnOnce(&mut JsonObject),
    {
        self.publisher.publish_with(suffix, populate, retention, qos)
    }

    /// Subscribes to `<prefix>/<suffix>`. Returns `false` when not connected
    /// or when the transport rejects the subscription.
    pub fn subscribe(&mut self, suffix: &str, qos: QoS) -> bool {
        if !self.is_connected() {
            return false;
        }
        let topic = self.publisher.full_topic(suffix);
        info!("Subscribing to MQTT topic '{}' with QoS = {}", topic, qos as u8);
        match self.transport.subscribe(&topic, qos) {
            Ok(()) => true,
            Err(err) => {
                error!("Error subscribing to MQTT topic '{}', error = {:?}", topic, err);
                false
            }
        }
    }

    /// Registers `handler` for messages on `<prefix>/commands/<name>`.
    pub fn register_command(&mut self, name: impl Into<String>, handler: impl CommandHandler + 'static) {
        self.commands.register(name, handler);
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Sends every queued message now, one attempt each.
    ///
    /// Does nothing while disconnected. Returns how many messages the
    /// transport accepted.
    pub fn flush(&mut self) -> usize {
        if !self.is_connected() {
            return 0;
        }
        let mut sent = 0;
        while let Some(message) = self.publisher.with_queue(|queue| queue.pop()) {
            match self.transport.publish(
                message.topic(),
                message.payload(),
                message.retention(),
                message.qos(),
            ) {
                Ok(()) => {
                    trace!(
                        "Published to '{}' (size: {})",
                        message.topic(),
                        message.payload().len()
                    );
                    sent += 1;
                }
                Err(err) => {
                    error!(
                        "Error publishing to MQTT topic at '{}', error = {:?}",
                        message.topic(),
                        err
                    );
                }
            }
        }
        sent
    }

    /// Announces an upcoming deep sleep on `<prefix>/sleep` and flushes the
    /// queue so nothing pending is lost while powered down.
    pub fn prepare_for_sleep(&mut self, duration: Duration) {
        self.publish_with(
            "sleep",
            |json| {
                json.insert("duration".into(), Value::from(duration.as_secs()));
            },
            Retention::NoRetain,
            QoS::AtMostOnce,
        );
        self.flush();
    }

    fn connect(&mut self) -> Result<(), ConnectError<T::Error>> {
        self.state = ConnectionState::Connecting;
        if let Err(err) = self.open_session() {
            self.transport.disconnect();
            self.state = ConnectionState::Disconnected;
            return Err(err);
        }
        info!("Connected to MQTT broker");
        self.state = ConnectionState::Connected;

        self.subscribe(CONFIG_TOPIC, CONFIG_QOS);
        let mut commands = String::from(COMMANDS_TOPIC);
        commands.push_str("/#");
        self.subscribe(&commands, COMMAND_QOS);
        Ok(())
    }

    fn open_session(&mut self) -> Result<(), ConnectError<T::Error>> {
        let broker = self.resolve_broker()?;
        info!("Connecting to MQTT broker at {}", broker);
        self.transport
            .connect(broker, &self.options.client_id)
            .map_err(ConnectError::transport)
    }

    fn resolve_broker(&mut self) -> Result<SocketAddr, ConnectError<T::Error>> {
        match &self.options.host {
            Some(host) => {
                let address = self
                    .resolver
                    .resolve_host(host)
                    .ok_or_else(|| ConnectError::HostNotFound(host.clone()))?;
                Ok(SocketAddr::new(address, self.options.port))
            }
            None => {
                let service = &self.options.service;
                debug!(
                    "Looking for {}/{} services",
                    service.service, service.protocol
                );
                let instances = self.resolver.discover_service(service);
                for (i, instance) in instances.iter().enumerate() {
                    info!(
                        " {}{}) {}:{} ({})",
                        if i == 0 { "*" } else { " " },
                        i + 1,
                        instance.hostname,
                        instance.port,
                        instance.address
                    );
                }
                let first = instances.first().ok_or(ConnectError::NoBrokerFound)?;
                Ok(SocketAddr::new(first.address, first.port))
            }
        }
    }

    fn service_transport(&mut self) {
        let mut inbox = mem::take(&mut self.inbox);
        if let Err(err) = self.transport.poll(&mut inbox) {
            warn!("Error servicing MQTT transport, error = {:?}", err);
        }
        for message in inbox.drain(..) {
            if let Err(err) = self.route(&message) {
                warn!("Dropping message on '{}': {}", message.topic, err);
            }
        }
        self.inbox = inbox;
    }

    fn route(&mut self, message: &InboundMessage) -> Result<(), RouteError> {
        trace!(
            "Received '{}' (size: {})",
            message.topic,
            message.payload.len()
        );
        if message.topic == self.config_topic {
            let config = decode_object(&message.payload)?;
            self.config.update(&config);
            return Ok(());
        }

        let Some(command) = message.topic.strip_prefix(self.command_prefix.as_str()) else {
            return Err(RouteError::UnknownTopic(message.topic.clone()));
        };
        if message.payload.is_empty() {
            trace!("Ignoring empty payload on '{}'", message.topic);
            return Ok(());
        }
        info!("Received command '{}'", command);

        let Some(handler) = self.commands.find_mut(command) else {
            return Err(RouteError::UnknownCommand(command.into()));
        };
        let request = decode_object(&message.payload)?;

        // Clear the retained command so the broker does not replay it on reconnect.
        if let Err(err) =
            self.transport
                .publish(&message.topic, &[], Retention::Retain, QoS::AtMostOnce)
        {
            warn!("Could not clear command topic '{}', error = {:?}", message.topic, err);
        }

        let mut response = JsonObject::new();
        handler.handle(&request, &mut response);
        if !response.is_empty() {
            let mut suffix = String::from(RESPONSES_TOPIC);
            suffix.push('/');
            suffix.push_str(command);
            self.publisher
                .publish(&suffix, &response, Retention::NoRetain, RESPONSE_QOS);
        }
        Ok(())
    }
}

impl<T, R, S, L, const DEPTH: usize> Task for MqttHandler<T, R, S, L, DEPTH>
where
    T: MqttTransport,
    R: Resolver,
    S: ConfigurationStore,
    L: LinkStatus,
{
    fn name(&self) -> &str {
        "MQTT"
    }

    fn poll(&mut self, timing: Timing) -> Schedule {
        if !self.link.is_up() {
            debug!("Waiting to connect to MQTT until the network is available");
            return Schedule::after(self.options.link_retry);
        }

        if !self.is_connected() {
            if self.state == ConnectionState::Connected {
                warn!("Lost connection to MQTT broker");
                self.transport.disconnect();
                self.state = ConnectionState::Disconnected;
            }
            if let Err(err) = self.connect() {
                self.failures = self.failures.saturating_add(1);
                let delay = self
                    .options
                    .reconnect
                    .delay(self.failures, timing.loop_start_time.as_ticks());
                warn!(
                    "Connecting to MQTT broker failed ({} in a row): {}, retrying in {} ms",
                    self.failures,
                    err,
                    delay.as_millis()
                );
                return Schedule::after(delay);
            }
            self.failures = 0;
        }

        self.flush();
        self.service_transport();
        Schedule::after(self.options.poll_interval)
    }
}

fn decode_object(payload: &[u8]) -> Result<JsonObject, RouteError> {
    match serde_json::from_slice::<Value>(payload)? {
        Value::Object(object) => Ok(object),
        _ => Err(RouteError::NotAnObject),
    }
}
