use std::net::SocketAddr;
use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::device::constants::{DEFAULT_SINK_ADDRESS, DEFAULT_TARGET_NAME, NEGOTIATION_DEADLINE, POLL_DELAY};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Advertised name of the sensor, compared exactly.
    pub target_name: String,
    pub sink_address: String,
    pub poll_interval_ms: u64,
    pub negotiation_timeout_ms: u64,
    /// Start cadence tracking from zero every time the sensor (re)connects.
    pub reset_tracker_on_connect: bool,
}

impl Config {
    /// Command line flags take precedence over the config file.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(name) = &args.name {
            self.target_name = name.clone();
        }
        if let Some(sink) = &args.sink {
            self.sink_address = sink.clone();
        }
        if let Some(poll_interval) = args.poll_interval {
            self.poll_interval_ms = poll_interval;
        }
        if let Some(negotiation_timeout) = args.negotiation_timeout {
            self.negotiation_timeout_ms = negotiation_timeout;
        }
        if args.reset_tracker_on_connect {
            self.reset_tracker_on_connect = true;
        }
    }

    pub fn sink_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.sink_address.parse().map_err(|source| ConfigError::InvalidSinkAddress {
            address: self.sink_address.clone(),
            source,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_name: DEFAULT_TARGET_NAME.to_string(),
            sink_address: DEFAULT_SINK_ADDRESS.to_string(),
            poll_interval_ms: POLL_DELAY,
            negotiation_timeout_ms: NEGOTIATION_DEADLINE,
            reset_tracker_on_connect: false,
        }
    }
}
