//! # Telemetry
//!
//! Periodic status reports on `<prefix>/telemetry`. Each report carries the
//! device uptime in milliseconds plus whatever the registered
//! [`TelemetryProvider`]s add to it.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Duration;
use serde_json::Value;

use crate::message::{QoS, Retention};
use crate::runtime::{DEFAULT_QUEUE_DEPTH, JsonObject, Publisher};
use crate::scheduler::{Schedule, Task};
use crate::time::{Clock, Timing};

/// Suffix of the telemetry topic.
pub const TELEMETRY_TOPIC: &str = "telemetry";

/// Contributes fields to every telemetry report.
///
/// Closures of the form `FnMut(&mut JsonObject)` implement this trait too.
///
/// Providers run while the report is being assembled and must not call back
/// into the [`Telemetry`] handle. Such calls are refused with a warning.
pub trait TelemetryProvider {
    fn populate_telemetry(&mut self, telemetry: &mut JsonObject);
}

impl<F> TelemetryProvider for F
where
    F: FnMut(&mut JsonObject),
{
    fn populate_telemetry(&mut self, telemetry: &mut JsonObject) {
        self(telemetry)
    }
}

type Providers = Mutex<NoopRawMutex, RefCell<Vec<Box<dyn TelemetryProvider>>>>;

/// A cloneable handle that assembles and queues telemetry reports.
///
/// Clones share their providers, so a provider registered through one clone
/// shows up in reports published through any other.
pub struct Telemetry<C: Clock, const DEPTH: usize = DEFAULT_QUEUE_DEPTH> {
    publisher: Publisher<DEPTH>,
    clock: C,
    qos: QoS,
    providers: Rc<Providers>,
}

impl<C: Clock + Clone, const DEPTH: usize> Clone for Telemetry<C, DEPTH> {
    fn clone(&self) -> Self {
        Self {
            publisher: self.publisher.clone(),
            clock: self.clock.clone(),
            qos: self.qos,
            providers: self.providers.clone(),
        }
    }
}

impl<C: Clock, const DEPTH: usize> Telemetry<C, DEPTH> {
    /// Creates a handle publishing at [`QoS::AtLeastOnce`].
    pub fn new(publisher: Publisher<DEPTH>, clock: C) -> Self {
        Self {
            publisher,
            clock,
            qos: QoS::AtLeastOnce,
            providers: Rc::new(Mutex::new(RefCell::new(Vec::new()))),
        }
    }

    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Adds a provider. Providers populate reports in registration order.
    ///
    /// Returns `false` if called from inside a provider; nothing is added then.
    pub fn register_provider(&self, provider: impl TelemetryProvider + 'static) -> bool {
        self.providers.lock(|providers| match providers.try_borrow_mut() {
            Ok(mut providers) => {
                providers.push(Box::new(provider));
                true
            }
            Err(_) => {
                warn!("Cannot register a telemetry provider while a report is being assembled");
                false
            }
        })
    }

    /// Milliseconds since boot, as reported in the `uptime` field.
    pub fn uptime_millis(&self) -> u64 {
        self.clock.now().as_millis()
    }

    /// Assembles a report and queues it. See [`Publisher::publish`] for the
    /// meaning of the result.
    ///
    /// Returns `false` without queuing anything when called from inside a
    /// provider.
    pub fn publish(&self) -> bool {
        let mut report = JsonObject::new();
        report.insert("uptime".into(), Value::from(self.uptime_millis()));
        let populated = self.providers.lock(|providers| match providers.try_borrow_mut() {
            Ok(mut providers) => {
                for provider in providers.iter_mut() {
                    provider.populate_telemetry(&mut report);
                }
                true
            }
            Err(_) => false,
        });
        if !populated {
            warn!("Telemetry requested while a report is being assembled, skipping");
            return false;
        }
        self.publisher
            .publish(TELEMETRY_TOPIC, &report, Retention::NoRetain, self.qos)
    }

    /// Publishes an event document to `<prefix>/<event>`, followed by a
    /// telemetry report unless `skip_telemetry` is set.
    ///
    /// Returns the result of queuing the event.
    pub fn publish_event<F>(&self, event: &str, populate: F, skip_telemetry: bool) -> bool
    where
        F: FnOnce(&mut JsonObject),
    {
        let queued = self
            .publisher
            .publish_with(event, populate, Retention::NoRetain, QoS::AtMostOnce);
        if !skip_telemetry {
            self.publish();
        }
        queued
    }

    pub fn publisher(&self) -> &Publisher<DEPTH> {
        &self.publisher
    }
}

/// Publishes a telemetry report on a fixed interval.
pub struct TelemetryTask<C: Clock, const DEPTH: usize = DEFAULT_QUEUE_DEPTH> {
    telemetry: Telemetry<C, DEPTH>,
    interval: Duration,
}

impl<C: Clock, const DEPTH: usize> TelemetryTask<C, DEPTH> {
    pub fn new(telemetry: Telemetry<C, DEPTH>, interval: Duration) -> Self {
        Self {
            telemetry,
            interval,
        }
    }
}

impl<C: Clock, const DEPTH: usize> Task for TelemetryTask<C, DEPTH> {
    fn name(&self) -> &str {
        "Publish telemetry"
    }

    fn poll(&mut self, _timing: Timing) -> Schedule {
        self.telemetry.publish();
        Schedule::after(self.interval)
    }
}
