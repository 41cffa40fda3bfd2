use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use btleplug::api::{CharPropFlags, Characteristic, Service, ValueNotification};
use futures::SinkExt;
use futures::channel::mpsc::{unbounded, Sender, UnboundedSender};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::device::constants::{uuid_from_u16, CSC_MEASUREMENT_CHARACTERISTIC, CSC_SERVICE};
use crate::device::platform::{BlePlatform, NotificationStream, SensorPeripheral};
use crate::device::types::{DeviceHandle, Observation};
use crate::error::DeviceError;
use crate::sink::TelemetrySink;

pub fn characteristic(short: u16, properties: CharPropFlags) -> Characteristic {
    Characteristic {
        uuid: uuid_from_u16(short),
        service_uuid: uuid_from_u16(CSC_SERVICE),
        properties,
        descriptors: BTreeSet::new(),
    }
}

pub fn service(short: u16, characteristics: Vec<Characteristic>) -> Service {
    Service {
        uuid: uuid_from_u16(short),
        primary: true,
        characteristics: characteristics.into_iter().collect(),
    }
}

pub fn csc_service() -> Service {
    service(CSC_SERVICE, vec![
        characteristic(0x2A5C, CharPropFlags::READ),
        characteristic(CSC_MEASUREMENT_CHARACTERISTIC, CharPropFlags::NOTIFY),
        characteristic(0x2A55, CharPropFlags::WRITE | CharPropFlags::INDICATE),
    ])
}

pub fn measurement(revolutions: u16, event_time: u16) -> ValueNotification {
    let mut value = vec![0x02];
    value.extend_from_slice(&revolutions.to_le_bytes());
    value.extend_from_slice(&event_time.to_le_bytes());

    ValueNotification {
        uuid: uuid_from_u16(CSC_MEASUREMENT_CHARACTERISTIC),
        value,
    }
}

#[derive(Default)]
pub struct MockPeripheralInner {
    pub services: Vec<Service>,
    pub characteristic_order: Option<Vec<Characteristic>>,
    pub fail_connect: bool,
    pub fail_services: bool,
    pub fail_characteristics: bool,
    pub fail_subscribe: bool,
    pub connect_delay: Option<Duration>,
    pub connects: usize,
    pub services_requests: usize,
    pub subscribed: Vec<Uuid>,
    pub unsubscribed: Vec<Uuid>,
    pub notification_senders: Vec<UnboundedSender<ValueNotification>>,
}

#[derive(Clone)]
pub struct MockPeripheral {
    inner: Arc<Mutex<MockPeripheralInner>>,
}

fn failure() -> DeviceError {
    DeviceError::Btle { source: btleplug::Error::NotConnected }
}

impl MockPeripheral {
    pub fn new(services: Vec<Service>) -> Self {
        MockPeripheral {
            inner: Arc::new(Mutex::new(MockPeripheralInner { services, ..Default::default() })),
        }
    }

    pub fn inner(&self) -> MutexGuard<'_, MockPeripheralInner> {
        self.inner.lock().unwrap()
    }

    /// Deliver a value on the most recently requested notification stream.
    pub fn notify(&self, notification: ValueNotification) {
        let inner = self.inner();
        let sender = inner.notification_senders.last().expect("no notification stream requested");
        sender.unbounded_send(notification).unwrap();
    }

    /// End every notification stream, as a platform does when the link drops.
    pub fn end_notifications(&self) {
        for sender in self.inner().notification_senders.drain(..) {
            sender.close_channel();
        }
    }
}

impl SensorPeripheral for MockPeripheral {
    async fn connect(&self) -> Result<(), DeviceError> {
        let (fail, delay) = {
            let mut inner = self.inner();
            inner.connects += 1;
            (inner.fail_connect, inner.connect_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail { Err(failure()) } else { Ok(()) }
    }

    async fn services(&self) -> Result<Vec<Service>, DeviceError> {
        let mut inner = self.inner();
        inner.services_requests += 1;
        if inner.fail_services { Err(failure()) } else { Ok(inner.services.clone()) }
    }

    async fn characteristics(&self, service: &Service) -> Result<Vec<Characteristic>, DeviceError> {
        let inner = self.inner();
        if inner.fail_characteristics {
            return Err(failure());
        }

        match &inner.characteristic_order {
            Some(order) => Ok(order.clone()),
            None => Ok(service.characteristics.iter().cloned().collect()),
        }
    }

    async fn notifications(&self) -> Result<NotificationStream, DeviceError> {
        let (sender, receiver) = unbounded();
        self.inner().notification_senders.push(sender);
        Ok(Box::pin(receiver))
    }

    async fn subscribe(&self, characteristic: &Characteristic) -> Result<(), DeviceError> {
        let mut inner = self.inner();
        if inner.fail_subscribe {
            return Err(failure());
        }
        inner.subscribed.push(characteristic.uuid);
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: &Characteristic) -> Result<(), DeviceError> {
        self.inner().unsubscribed.push(characteristic.uuid);
        Ok(())
    }
}

pub fn advertisement(id: &str, name: &str, peripheral: &MockPeripheral) -> Observation<MockPeripheral> {
    Observation::Advertised(DeviceHandle {
        id: id.to_string(),
        name: name.to_string(),
        peripheral: peripheral.clone(),
    })
}

#[derive(Default)]
pub struct MockPlatformInner {
    pub fail_start: bool,
    pub starts: usize,
    pub stops: usize,
    pub observations: Option<Sender<Observation<MockPeripheral>>>,
    /// Sent in order by an emitter task once discovery starts, waiting whenever the channel is full.
    pub backlog: Vec<Observation<MockPeripheral>>,
    pub emitter: Option<JoinHandle<()>>,
}

#[derive(Clone, Default)]
pub struct MockPlatform {
    inner: Arc<Mutex<MockPlatformInner>>,
}

impl MockPlatform {
    pub fn inner(&self) -> MutexGuard<'_, MockPlatformInner> {
        self.inner.lock().unwrap()
    }

    pub fn emit(&self, observation: Observation<MockPeripheral>) {
        let mut inner = self.inner();
        let sender = inner.observations.as_mut().expect("discovery has not been started");
        sender.try_send(observation).unwrap();
    }

    pub fn advertise(&self, id: &str, name: &str, peripheral: &MockPeripheral) {
        self.emit(advertisement(id, name, peripheral));
    }
}

impl BlePlatform for MockPlatform {
    type Peripheral = MockPeripheral;

    async fn start_discovery(&mut self, observations: Sender<Observation<MockPeripheral>>) -> Result<(), DeviceError> {
        let mut inner = self.inner();
        inner.starts += 1;
        if inner.fail_start {
            return Err(DeviceError::NoAdapter);
        }
        let backlog = std::mem::take(&mut inner.backlog);
        if !backlog.is_empty() {
            let mut sender = observations.clone();
            inner.emitter = Some(tokio::spawn(async move {
                for observation in backlog {
                    if sender.send(observation).await.is_err() {
                        break;
                    }
                }
            }));
        }
        inner.observations = Some(observations);
        Ok(())
    }

    async fn stop_discovery(&mut self) {
        let emitter = {
            let mut inner = self.inner();
            inner.stops += 1;
            inner.observations = None;
            inner.emitter.take()
        };

        if let Some(emitter) = emitter {
            emitter.await.unwrap();
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<u16>>,
}

impl RecordingSink {
    pub fn published(&self) -> Vec<u16> {
        self.published.lock().unwrap().clone()
    }

    /// Wait until at least `count` values were published.
    pub async fn wait_for(&self, count: usize) -> Vec<u16> {
        for _ in 0..200 {
            let published = self.published();
            if published.len() >= count {
                return published;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} published values, got {:?}", count, self.published());
    }
}

impl TelemetrySink for RecordingSink {
    fn publish(&self, rpm: u16) {
        self.published.lock().unwrap().push(rpm);
    }
}
