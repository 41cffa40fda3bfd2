use std::io;
use std::net::AddrParseError;
use std::str::Utf8Error;
use thiserror::Error;
use btleplug;
use serde_json;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse config file: {source}")]
    JsonError { #[from] source: serde_json::Error },

    #[error("Invalid sink address {address:?}: {source}")]
    InvalidSinkAddress { address: String, source: AddrParseError },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (sink): {source}")]
    SinkError { #[from] source: SinkError },

    #[error("Failed to start application (bluetooth): {source}")]
    DeviceError { #[from] source: DeviceError },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,
}

/// Reasons a single attach attempt against a latched sensor did not produce a
/// notification subscription. The state machine retries all of them alike.
#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("Failed to open a session to the sensor: {source}")]
    ConnectFailed { source: DeviceError },

    #[error("Failed to enumerate GATT services: {source}")]
    ServiceEnumerationFailed { source: DeviceError },

    #[error("The sensor does not expose the cycling speed and cadence service")]
    ServiceNotFound,

    #[error("Failed to enumerate characteristics of the cadence service: {source}")]
    CharacteristicEnumerationFailed { source: DeviceError },

    #[error("The cadence service has no characteristic with the notify property")]
    NotifiableCharacteristicNotFound,

    #[error("Failed to enable notifications: {source}")]
    NotificationEnableFailed { source: DeviceError },

    #[error("Negotiation did not finish within {millis} ms")]
    TimedOut { millis: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed CSC measurement payload: expected at least 5 bytes, got {len}")]
    MalformedPayload { len: usize },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to bind the telemetry socket: {source}")]
    Bind { #[from] source: io::Error },
}
