use std::future::Future;
use std::pin::Pin;
use btleplug::api::{Characteristic, Service, ValueNotification};
use futures::Stream;
use futures::channel::mpsc::Sender;

use crate::device::types::Observation;
use crate::error::DeviceError;

pub type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// The GATT operations the state machine needs from a discovered sensor.
pub trait SensorPeripheral: Clone + Send + Sync + 'static {
    /// Open a session to the peripheral. Succeeds if a session is already open.
    fn connect(&self) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn services(&self) -> impl Future<Output = Result<Vec<Service>, DeviceError>> + Send;

    /// Characteristics of `service`, in the order the platform reports them.
    fn characteristics(&self, service: &Service) -> impl Future<Output = Result<Vec<Characteristic>, DeviceError>> + Send {
        let characteristics: Vec<Characteristic> = service.characteristics.iter().cloned().collect();
        async move { Ok(characteristics) }
    }

    /// Stream of all value notifications of this peripheral, for every subscribed characteristic.
    fn notifications(&self) -> impl Future<Output = Result<NotificationStream, DeviceError>> + Send;

    /// Write the client characteristic configuration descriptor to enable notifications.
    fn subscribe(&self, characteristic: &Characteristic) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn unsubscribe(&self, characteristic: &Characteristic) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

/// Device discovery. Everything the platform notices is pushed onto the observation channel, the
/// platform never calls back into the state machine directly.
pub trait BlePlatform: Send {
    type Peripheral: SensorPeripheral;

    fn start_discovery(&mut self, observations: Sender<Observation<Self::Peripheral>>) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn stop_discovery(&mut self) -> impl Future<Output = ()> + Send;
}
