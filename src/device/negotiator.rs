use btleplug::api::{CharPropFlags, Characteristic};
use log::{debug, info};

use crate::device::constants::{make_csc_measurement_uuid, short_uuid, CSC_SERVICE};
use crate::device::platform::{NotificationStream, SensorPeripheral};
use crate::error::NegotiationError;

/// A characteristic with notifications enabled, and the stream its values arrive on.
pub struct Attachment {
    pub characteristic: Characteristic,
    pub notifications: NotificationStream,
}

/// Open a session to the peripheral, then negotiate the cadence measurement subscription.
pub async fn connect_and_negotiate<P: SensorPeripheral>(peripheral: &P) -> Result<Attachment, NegotiationError> {
    peripheral.connect().await.map_err(|source| NegotiationError::ConnectFailed { source })?;
    negotiate(peripheral).await
}

/// Find the cycling speed and cadence service on a connected peripheral and enable notifications
/// on the first of its characteristics that supports them.
pub async fn negotiate<P: SensorPeripheral>(peripheral: &P) -> Result<Attachment, NegotiationError> {
    let services = peripheral.services().await
        .map_err(|source| NegotiationError::ServiceEnumerationFailed { source })?;
    debug!("Gatt services: {:?}", services.iter().map(|service| service.uuid).collect::<Vec<_>>());

    // only the 16 bit assigned number is compared, some stacks report it on a different base
    let service = services.iter()
        .find(|service| short_uuid(&service.uuid) == CSC_SERVICE)
        .ok_or(NegotiationError::ServiceNotFound)?;
    info!("Cycling speed and cadence service found");

    let characteristics = peripheral.characteristics(service).await
        .map_err(|source| NegotiationError::CharacteristicEnumerationFailed { source })?;

    let characteristic = characteristics.into_iter()
        .find(|characteristic| characteristic.properties.contains(CharPropFlags::NOTIFY))
        .ok_or(NegotiationError::NotifiableCharacteristicNotFound)?;

    if characteristic.uuid == make_csc_measurement_uuid() {
        info!("CSC measurement found");
    } else {
        info!("Using notifiable characteristic {} of the cadence service", characteristic.uuid);
    }

    // the stream must exist before subscribing, so that the first value is not lost
    let notifications = peripheral.notifications().await
        .map_err(|source| NegotiationError::NotificationEnableFailed { source })?;
    peripheral.subscribe(&characteristic).await
        .map_err(|source| NegotiationError::NotificationEnableFailed { source })?;

    Ok(Attachment { characteristic, notifications })
}
