use std::sync::Arc;
use btleplug::api::Characteristic;
use futures::{SinkExt, StreamExt};
use futures::channel::mpsc::Sender;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cadence::CadenceTracker;
use crate::device::constants::UNSUBSCRIBE_DEADLINE;
use crate::device::negotiator::Attachment;
use crate::device::platform::{NotificationStream, SensorPeripheral};
use crate::device::types::{DeviceHandle, Observation};
use crate::sink::TelemetrySink;

/// An enabled measurement notification and the task turning its values into cadence.
///
/// The task owns the tracker while the subscription is alive, `release` hands it back.
pub struct NotificationSubscription<P: SensorPeripheral> {
    peripheral: P,
    characteristic: Characteristic,
    cancel: CancellationToken,
    handle: JoinHandle<CadenceTracker>,
}

impl<P: SensorPeripheral> NotificationSubscription<P> {
    pub fn start(
        device: &DeviceHandle<P>,
        attachment: Attachment,
        tracker: CadenceTracker,
        sink: Arc<dyn TelemetrySink>,
        observations: Sender<Observation<P>>,
        cancel: CancellationToken,
    ) -> Self {
        let Attachment { characteristic, notifications } = attachment;

        let handle = read_notifications_task(
            cancel.clone(),
            device.id.clone(),
            characteristic.clone(),
            notifications,
            tracker,
            sink,
            observations,
        );

        NotificationSubscription {
            peripheral: device.peripheral.clone(),
            characteristic,
            cancel,
            handle,
        }
    }

    /// Stop processing notifications and disable them on the sensor, returning the tracker.
    pub async fn release(self) -> CadenceTracker {
        self.cancel.cancel();

        let tracker = match self.handle.await {
            Ok(tracker) => tracker,
            Err(err) => {
                warn!("Read notifications task failed, cadence tracking starts over: {}", err);
                CadenceTracker::default()
            },
        };

        let fut = self.peripheral.unsubscribe(&self.characteristic);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(UNSUBSCRIBE_DEADLINE)) => {
                warn!("Unsubscribing from the measurement characteristic took too long");
            }
            result = fut => match result {
                // expected when the session is already gone
                Err(err) => debug!("Failed to unsubscribe: {}", err),
                Ok(()) => debug!("Unsubscribed from the measurement characteristic"),
            }
        };

        tracker
    }
}

fn read_notifications_task<P: SensorPeripheral>(
    cancel: CancellationToken,
    device_id: String,
    characteristic: Characteristic,
    mut notifications: NotificationStream,
    mut tracker: CadenceTracker,
    sink: Arc<dyn TelemetrySink>,
    mut observations: Sender<Observation<P>>,
) -> JoinHandle<CadenceTracker> {
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                data = notifications.next() => {
                    let Some(data) = data else {
                        info!("Notification stream ended");
                        let ended = Observation::NotificationsEnded { id: device_id.clone() };
                        tokio::select! {
                            _ = cancel.cancelled() => {},
                            result = observations.send(ended) => {
                                if result.is_err() {
                                    debug!("Observation receiver is gone");
                                }
                            },
                        }
                        break 'mainloop;
                    };

                    if data.uuid != characteristic.uuid {
                        continue;
                    }

                    debug!("Measurement {:02x?}", data.value);
                    match tracker.process(&data.value) {
                        Err(err) => warn!("Discarding notification: {}", err),
                        Ok(rpm) => {
                            info!("RPM: {}", rpm);
                            sink.publish(rpm);
                        },
                    }
                },
            }
        }

        tracker
    })
}
