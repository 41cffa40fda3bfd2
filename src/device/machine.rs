use std::sync::Arc;
use futures::channel::mpsc::{channel, Receiver, Sender};
use log::{debug, info, warn};
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;

use crate::cadence::CadenceTracker;
use crate::config::types::Config;
use crate::device::constants::OBSERVATION_CHANNEL_CAPACITY;
use crate::device::negotiator::{connect_and_negotiate, Attachment};
use crate::device::platform::BlePlatform;
use crate::device::subscription::NotificationSubscription;
use crate::device::types::{DeviceHandle, Observation, SensorState};
use crate::error::NegotiationError;
use crate::sink::TelemetrySink;

#[derive(Debug, Clone)]
pub struct MachineSettings {
    pub target_name: String,
    pub poll_interval: Duration,
    pub negotiation_deadline: Duration,
    pub reset_tracker_on_connect: bool,
}

impl From<&Config> for MachineSettings {
    fn from(config: &Config) -> Self {
        MachineSettings {
            target_name: config.target_name.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            negotiation_deadline: Duration::from_millis(config.negotiation_timeout_ms),
            reset_tracker_on_connect: config.reset_tracker_on_connect,
        }
    }
}

/// Tracks the lifecycle of the single cadence sensor: discover it, attach to its measurement
/// notifications, and start over when the session is lost.
///
/// Platform callbacks only push `Observation`s onto a channel. They are applied at the start of
/// the next `tick`, which is the only place where the state changes.
pub struct SensorMachine<B: BlePlatform> {
    platform: B,
    sink: Arc<dyn TelemetrySink>,
    settings: MachineSettings,
    cancel: CancellationToken,

    state: SensorState,
    device: Option<DeviceHandle<B::Peripheral>>,
    session_active: bool,
    subscription: Option<NotificationSubscription<B::Peripheral>>,
    // lent to the subscription while connected
    tracker: CadenceTracker,

    observations_tx: Sender<Observation<B::Peripheral>>,
    observations_rx: Receiver<Observation<B::Peripheral>>,
}

impl<B: BlePlatform> SensorMachine<B> {
    pub fn new(platform: B, sink: Arc<dyn TelemetrySink>, settings: MachineSettings, cancel: CancellationToken) -> Self {
        let (observations_tx, observations_rx) = channel(OBSERVATION_CHANNEL_CAPACITY);

        SensorMachine {
            platform,
            sink,
            settings,
            cancel,
            state: SensorState::Init,
            device: None,
            session_active: false,
            subscription: None,
            tracker: CadenceTracker::default(),
            observations_tx,
            observations_rx,
        }
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn device(&self) -> Option<&DeviceHandle<B::Peripheral>> {
        self.device.as_ref()
    }

    /// The tracker as of the last released subscription.
    pub fn tracker(&self) -> CadenceTracker {
        self.tracker
    }

    /// Poll until the cancellation token fires, then release everything.
    pub async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    break;
                }
                _ = sleep(self.settings.poll_interval) => {}
            }
        }

        self.shutdown().await;
    }

    /// Apply pending observations, then evaluate the current state once.
    pub async fn tick(&mut self) {
        self.drain_observations();

        match self.state {
            SensorState::Init => self.start_discovery().await,
            SensorState::Discovering => self.try_connect().await,
            SensorState::Connected => {
                if !self.session_active {
                    self.session_lost().await;
                }
            },
            // only held while a subscription is being released
            SensorState::Disconnected => self.set_state(SensorState::Discovering),
        }
    }

    fn set_state(&mut self, state: SensorState) {
        if self.state != state {
            info!("Sensor state {} -> {}", self.state, state);
            self.state = state;
        }
    }

    fn drain_observations(&mut self) {
        // Err means the channel is empty; it is only closed on shutdown
        while let Ok(Some(observation)) = self.observations_rx.try_next() {
            self.observe(observation);
        }
    }

    fn is_current_device(&self, id: &str) -> bool {
        self.device.as_ref().map_or(false, |device| device.id == id)
    }

    fn observe(&mut self, observation: Observation<B::Peripheral>) {
        match observation {
            Observation::Advertised(handle) => {
                if handle.name != self.settings.target_name {
                    return;
                }

                if self.is_current_device(&handle.id) {
                    debug!("{} advertised again", handle.name);
                    if self.subscription.is_none() {
                        self.device = Some(handle);
                    }
                    return;
                }

                if self.subscription.is_some() {
                    debug!("Ignoring {} ({}) while connected to another sensor", handle.name, handle.id);
                    return;
                }

                info!("{} detected", handle.name);
                info!("Device id: {}", handle.id);
                self.device = Some(handle);
            },
            Observation::SessionStatus { id, active } => {
                if !self.is_current_device(&id) {
                    return;
                }

                info!("Gatt session status: {}", if active { "Active" } else { "Closed" });
                self.session_active = active;
            },
            Observation::NotificationsEnded { id } => {
                if self.is_current_device(&id) {
                    self.session_active = false;
                }
            },
        }
    }

    async fn start_discovery(&mut self) {
        match self.platform.start_discovery(self.observations_tx.clone()).await {
            Ok(()) => {
                self.set_state(SensorState::Discovering);
                info!("Waiting to detect cadence sensor {:?} advertising", self.settings.target_name);
            },
            Err(err) => warn!("Failed to start device discovery: {}", err),
        }
    }

    async fn attach(&self, device: &DeviceHandle<B::Peripheral>) -> Option<Attachment> {
        let deadline = self.settings.negotiation_deadline;

        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Shutdown requested, abandoning negotiation");
                return None;
            }
            result = timeout(deadline, connect_and_negotiate(&device.peripheral)) => match result {
                Ok(result) => result,
                Err(_) => Err(NegotiationError::TimedOut { millis: deadline.as_millis() as u64 }),
            }
        };

        match result {
            Ok(attachment) => Some(attachment),
            Err(err) => {
                warn!("Attaching to {} failed: {}", device.name, err);
                None
            },
        }
    }

    async fn try_connect(&mut self) {
        let Some(device) = self.device.clone() else {
            return;
        };

        let Some(attachment) = self.attach(&device).await else {
            return;
        };

        if self.settings.reset_tracker_on_connect {
            self.tracker = CadenceTracker::default();
        }

        self.subscription = Some(NotificationSubscription::start(
            &device,
            attachment,
            self.tracker,
            self.sink.clone(),
            self.observations_tx.clone(),
            self.cancel.child_token(),
        ));
        self.session_active = true;
        self.set_state(SensorState::Connected);
        info!("Connected to {}", device.name);
    }

    async fn release_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.tracker = subscription.release().await;
        }
    }

    async fn session_lost(&mut self) {
        self.set_state(SensorState::Disconnected);
        self.release_subscription().await;
        self.set_state(SensorState::Discovering);
        info!("Waiting to detect cadence sensor {:?} advertising", self.settings.target_name);
    }

    async fn shutdown(&mut self) {
        // fails any send still waiting for room, so the tasks joined below can finish
        self.observations_rx.close();
        self.release_subscription().await;

        if self.state != SensorState::Init {
            self.platform.stop_discovery().await;
        }

        info!("Sensor monitoring stopped");
    }
}
