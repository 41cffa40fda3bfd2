use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SensorState {
    Init,
    Discovering,
    Connected,
    Disconnected,
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            SensorState::Init => "Init",
            SensorState::Discovering => "Discovering",
            SensorState::Connected => "Connected",
            SensorState::Disconnected => "Disconnected",
        };

        write!(f, "{}", result)
    }
}

/// A peripheral seen during discovery.
#[derive(Debug, Clone)]
pub struct DeviceHandle<P> {
    pub id: String,
    pub name: String,
    pub peripheral: P,
}

/// Something the bluetooth platform noticed. Produced by callbacks, acted upon by the poll loop.
#[derive(Debug)]
pub enum Observation<P> {
    Advertised(DeviceHandle<P>),
    SessionStatus { id: String, active: bool },
    NotificationsEnded { id: String },
}
