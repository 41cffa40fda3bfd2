use std::pin::Pin;
use btleplug::api::{self, Central, CentralEvent, Characteristic, Manager as _, PeripheralProperties, ScanFilter, Service};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{SinkExt, Stream, StreamExt};
use futures::channel::mpsc::Sender;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::platform::{BlePlatform, NotificationStream, SensorPeripheral};
use crate::device::types::{DeviceHandle, Observation};
use crate::error::DeviceError;

type CentralEventStream = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

fn peripheral_key(id: &PeripheralId) -> String {
    format!("{:?}", id)
}

impl SensorPeripheral for Peripheral {
    async fn connect(&self) -> Result<(), DeviceError> {
        if api::Peripheral::is_connected(self).await? {
            debug!("Peripheral is already connected");
            return Ok(());
        }

        info!("Connecting to peripheral {}...", api::Peripheral::address(self));
        api::Peripheral::connect(self).await?;
        Ok(())
    }

    async fn services(&self) -> Result<Vec<Service>, DeviceError> {
        api::Peripheral::discover_services(self).await?;
        Ok(api::Peripheral::services(self).into_iter().collect())
    }

    async fn notifications(&self) -> Result<NotificationStream, DeviceError> {
        Ok(api::Peripheral::notifications(self).await?)
    }

    async fn subscribe(&self, characteristic: &Characteristic) -> Result<(), DeviceError> {
        api::Peripheral::subscribe(self, characteristic).await?;
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: &Characteristic) -> Result<(), DeviceError> {
        api::Peripheral::unsubscribe(self, characteristic).await?;
        Ok(())
    }
}

/// Discovery backed by every bluetooth adapter btleplug can find.
pub struct BtlePlatform {
    manager: Manager,
    adapters: Vec<Adapter>,
    cancel: CancellationToken,
    event_tasks: Vec<JoinHandle<()>>,
}

impl BtlePlatform {
    pub async fn new() -> Result<Self, DeviceError> {
        let manager = Manager::new().await?;

        Ok(BtlePlatform {
            manager,
            adapters: Vec::new(),
            cancel: CancellationToken::new(),
            event_tasks: Vec::new(),
        })
    }

    async fn start_adapters(&mut self, observations: &Sender<Observation<Peripheral>>) -> Result<(), DeviceError> {
        let adapters = self.manager.adapters().await?;
        if adapters.is_empty() {
            return Err(DeviceError::NoAdapter);
        }

        for adapter in adapters {
            info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));

            // subscribe to events before scanning, so that no advertisement is missed
            let events = adapter.events().await?;
            adapter.start_scan(ScanFilter::default()).await?;

            self.event_tasks.push(
                discovery_events_task(self.cancel.child_token(), adapter.clone(), events, observations.clone())
            );
            self.adapters.push(adapter);
        }

        Ok(())
    }
}

impl BlePlatform for BtlePlatform {
    type Peripheral = Peripheral;

    async fn start_discovery(&mut self, observations: Sender<Observation<Peripheral>>) -> Result<(), DeviceError> {
        let result = self.start_adapters(&observations).await;

        if result.is_err() {
            // do not leave half of the adapters scanning, the next attempt starts all of them again
            self.stop_discovery().await;
        }

        result
    }

    async fn stop_discovery(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();

        for adapter in self.adapters.drain(..) {
            if let Err(err) = adapter.stop_scan().await {
                warn!("Failed to stop scanning: {:?}", err);
            }
        }

        for handle in self.event_tasks.drain(..) {
            if let Err(err) = handle.await {
                warn!("Discovery event task failed: {}", err);
            }
        }

        info!("Device discovery stopped");
    }
}

async fn advertised(adapter: &Adapter, id: &PeripheralId) -> Option<Observation<Peripheral>> {
    let peripheral = match adapter.peripheral(id).await {
        Ok(v) => v,
        Err(err) => {
            debug!("Discovered peripheral disappeared: {:?}", err);
            return None;
        },
    };

    let properties: Option<PeripheralProperties> = match api::Peripheral::properties(&peripheral).await {
        Ok(v) => v,
        Err(err) => {
            warn!("Could not query peripheral for properties: {:?}", err);
            return None;
        },
    };

    let name = properties.and_then(|properties| properties.local_name)?;

    Some(Observation::Advertised(DeviceHandle {
        id: peripheral_key(id),
        name,
        peripheral,
    }))
}

fn discovery_events_task(
    cancel: CancellationToken,
    adapter: Adapter,
    mut events: CentralEventStream,
    mut observations: Sender<Observation<Peripheral>>,
) -> JoinHandle<()> {
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                event = events.next() => {
                    let observation = match event {
                        None => {
                            warn!("Adapter event stream ended");
                            break 'mainloop;
                        },
                        Some(CentralEvent::DeviceDiscovered(id)) | Some(CentralEvent::DeviceUpdated(id)) => {
                            advertised(&adapter, &id).await
                        },
                        Some(CentralEvent::DeviceConnected(id)) => {
                            Some(Observation::SessionStatus { id: peripheral_key(&id), active: true })
                        },
                        Some(CentralEvent::DeviceDisconnected(id)) => {
                            Some(Observation::SessionStatus { id: peripheral_key(&id), active: false })
                        },
                        Some(_) => None,
                    };

                    let Some(observation) = observation else {
                        continue;
                    };

                    // the machine stops draining while it negotiates or shuts down
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            break 'mainloop;
                        },
                        result = observations.send(observation) => {
                            if result.is_err() {
                                debug!("Observation receiver is gone");
                                break 'mainloop;
                            }
                        },
                    }
                },
            }
        }
    })
}
