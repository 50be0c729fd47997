//! Host-side fakes for the device collaborators.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;

use embassy_time::{Duration, Instant};
use farmhub_client::prelude::*;
use farmhub_client::{InboundMessage, MqttHandler};

/// Everything the fake broker saw, plus knobs to make it misbehave.
#[derive(Default)]
pub struct Broker {
    pub connected: bool,
    pub refuse_connections: bool,
    pub reject_publishes: bool,
    pub connects: Vec<(SocketAddr, String)>,
    pub disconnects: usize,
    pub publish_attempts: Vec<Published>,
    pub subscriptions: Vec<(String, QoS)>,
    pub incoming: Vec<InboundMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retention: Retention,
    pub qos: QoS,
}

impl Published {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).expect("payload is JSON")
    }
}

#[derive(Clone, Default)]
pub struct FakeTransport(pub Rc<RefCell<Broker>>);

impl FakeTransport {
    pub fn broker(&self) -> std::cell::RefMut<'_, Broker> {
        self.0.borrow_mut()
    }

    /// Makes the broker deliver a message on the next poll.
    pub fn deliver(&self, topic: &str, payload: &[u8]) {
        self.broker().incoming.push(InboundMessage::new(topic, payload));
    }

    pub fn published_to(&self, topic: &str) -> Vec<Published> {
        self.0
            .borrow()
            .publish_attempts
            .iter()
            .filter(|message| message.topic == topic)
            .cloned()
            .collect()
    }
}

impl MqttTransport for FakeTransport {
    type Error = &'static str;

    fn connect(&mut self, broker: SocketAddr, client_id: &str) -> Result<(), Self::Error> {
        let mut state = self.broker();
        state.connects.push((broker, client_id.to_owned()));
        if state.refuse_connections {
            return Err("connection refused");
        }
        state.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.0.borrow().connected
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retention: Retention,
        qos: QoS,
    ) -> Result<(), Self::Error> {
        let mut state = self.broker();
        state.publish_attempts.push(Published {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
            retention,
            qos,
        });
        if state.reject_publishes {
            return Err("publish failed");
        }
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        self.broker().subscriptions.push((topic.to_owned(), qos));
        Ok(())
    }

    fn poll(&mut self, inbox: &mut Vec<InboundMessage>) -> Result<(), Self::Error> {
        inbox.append(&mut self.broker().incoming);
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.broker();
        state.connected = false;
        state.disconnects += 1;
    }
}

pub const BROKER_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10));

#[derive(Default)]
pub struct FakeResolver {
    pub hosts: Vec<(String, IpAddr)>,
    pub services: Vec<ServiceInstance>,
    pub discoveries: Rc<Cell<usize>>,
}

impl FakeResolver {
    pub fn with_host(host: &str) -> Self {
        Self {
            hosts: vec![(host.to_owned(), BROKER_ADDRESS)],
            ..Self::default()
        }
    }

    pub fn with_services(services: Vec<ServiceInstance>) -> Self {
        Self {
            services,
            ..Self::default()
        }
    }
}

impl Resolver for FakeResolver {
    fn resolve_host(&mut self, host: &str) -> Option<IpAddr> {
        self.hosts
            .iter()
            .find(|(name, _)| name == host)
            .map(|(_, address)| *address)
    }

    fn discover_service(&mut self, _service: &ServiceType) -> Vec<ServiceInstance> {
        self.discoveries.set(self.discoveries.get() + 1);
        self.services.clone()
    }
}

#[derive(Default)]
pub struct RecordingConfig {
    pub updates: Vec<JsonObject>,
}

impl ConfigurationStore for RecordingConfig {
    fn update(&mut self, config: &JsonObject) {
        self.updates.push(config.clone());
    }
}

#[derive(Clone)]
pub struct FakeLink(pub Rc<Cell<bool>>);

impl FakeLink {
    pub fn up() -> Self {
        Self(Rc::new(Cell::new(true)))
    }
}

impl LinkStatus for FakeLink {
    fn is_up(&self) -> bool {
        self.0.get()
    }
}

/// A clock that only moves when told to, or when the scheduler idles.
#[derive(Clone, Default)]
pub struct FakeClock {
    ticks: Rc<Cell<u64>>,
    pub idles: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn advance(&self, duration: Duration) {
        self.ticks.set(self.ticks.get() + duration.as_ticks());
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.ticks.get())
    }

    fn idle(&self, duration: Duration) {
        self.idles.borrow_mut().push(duration);
        self.advance(duration);
    }
}

pub type TestHandler = MqttHandler<FakeTransport, FakeResolver, Rc<RefCell<RecordingConfig>>, FakeLink>;

/// A handler for prefix `dev` pointing at `broker.local`, with handles to its fakes.
pub struct Fixture {
    pub handler: TestHandler,
    pub transport: FakeTransport,
    pub config: Rc<RefCell<RecordingConfig>>,
    pub link: FakeLink,
}

impl Fixture {
    pub fn new() -> Self {
        let options = MqttOptions::new("device-1", "dev").with_host("broker.local");
        Self::with(options, FakeResolver::with_host("broker.local"))
    }

    pub fn with(options: MqttOptions, resolver: FakeResolver) -> Self {
        let transport = FakeTransport::default();
        let config = Rc::new(RefCell::new(RecordingConfig::default()));
        let link = FakeLink::up();
        let handler = MqttHandler::new(
            options,
            transport.clone(),
            resolver,
            config.clone(),
            link.clone(),
        );
        Self {
            handler,
            transport,
            config,
            link,
        }
    }
}

pub fn at_millis(millis: u64) -> Timing {
    Timing {
        scheduled_time: Instant::from_millis(millis),
        loop_start_time: Instant::from_millis(millis),
    }
}
