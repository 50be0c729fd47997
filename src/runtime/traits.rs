//! Collaborator traits of the messaging handler.
//!
//! The handler owns its queue and command registry; everything it needs from
//! the rest of the device (link state, name resolution, configuration) is
//! reached through the traits below.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::net::IpAddr;

use serde_json::{Map, Value};

/// A JSON object, as received in requests and built for responses.
pub type JsonObject = Map<String, Value>;

/// A remotely triggerable request/response operation.
///
/// The handler receives the decoded request and an empty response object.
/// Whatever it puts into `response` is published to `responses/<name>`; an
/// untouched response publishes nothing.
///
/// Closures of the form `FnMut(&JsonObject, &mut JsonObject)` implement this
/// trait too.
///
/// # Example
///
/// ```ignore
/// handler.register_command("echo", |request: &JsonObject, response: &mut JsonObject| {
///     response.insert("original".into(), Value::Object(request.clone()));
/// });
/// ```
pub trait CommandHandler {
    fn handle(&mut self, request: &JsonObject, response: &mut JsonObject);
}

impl<F> CommandHandler for F
where
    F: FnMut(&JsonObject, &mut JsonObject),
{
    fn handle(&mut self, request: &JsonObject, response: &mut JsonObject) {
        self(request, response)
    }
}

/// Receives configuration documents published to the configuration topic.
///
/// The handler neither validates nor persists the document.
pub trait ConfigurationStore {
    fn update(&mut self, config: &JsonObject);
}

/// Lets the application keep its own handle to the configuration.
impl<S: ConfigurationStore + ?Sized> ConfigurationStore for Rc<RefCell<S>> {
    fn update(&mut self, config: &JsonObject) {
        self.borrow_mut().update(config)
    }
}

/// Reports whether the network link (e.g. Wi-Fi) is usable.
pub trait LinkStatus {
    fn is_up(&self) -> bool;
}

impl<F: Fn() -> bool> LinkStatus for F {
    fn is_up(&self) -> bool {
        self()
    }
}

/// A link that is always up, for wired or already-managed networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysUp;

impl LinkStatus for AlwaysUp {
    fn is_up(&self) -> bool {
        true
    }
}

/// A DNS-SD style service type such as `_mqtt._tcp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceType {
    pub service: String,
    pub protocol: String,
}

impl ServiceType {
    pub fn new(service: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            protocol: protocol.into(),
        }
    }

    /// The MQTT-over-TCP service type brokers advertise.
    pub fn mqtt() -> Self {
        Self::new("mqtt", "tcp")
    }
}

/// One result of a service discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub hostname: String,
    pub address: IpAddr,
    pub port: u16,
}

/// Name resolution used while connecting to the broker.
///
/// Both lookups must fail fast; they run inside a scheduler round.
pub trait Resolver {
    /// Resolves a host name, returning `None` if it cannot be found.
    fn resolve_host(&mut self, host: &str) -> Option<IpAddr>;

    /// Looks up every advertised instance of `service`.
    fn discover_service(&mut self, service: &ServiceType) -> Vec<ServiceInstance>;
}
