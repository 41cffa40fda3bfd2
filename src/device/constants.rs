use uuid::Uuid;

/**
 * How often (milliseconds) the state machine re-evaluates its state.
 */
pub const POLL_DELAY: u64 = 250;

/**
 * How long (milliseconds) connecting to the sensor and enabling notifications may take in total.
 */
pub const NEGOTIATION_DEADLINE: u64 = 5000;

/**
 * How long (milliseconds) unsubscribing from the measurement characteristic may take.
 */
pub const UNSUBSCRIBE_DEADLINE: u64 = 2000;

/**
 * Capacity of the channel that carries observations from the bluetooth callbacks to the poll loop.
 */
pub const OBSERVATION_CHANNEL_CAPACITY: usize = 64;

/**
 * The advertised name of the sensor to use, unless configured otherwise.
 */
pub const DEFAULT_TARGET_NAME: &str = "Bryton Cadence";

/**
 * The address that cadence values are sent to, unless configured otherwise.
 */
pub const DEFAULT_SINK_ADDRESS: &str = "127.0.0.1:3300";

/**
 * The 16 bit assigned number of the Cycling Speed and Cadence service.
 */
pub const CSC_SERVICE: u16 = 0x1816;

/**
 * The 16 bit assigned number of the CSC Measurement characteristic.
 */
pub const CSC_MEASUREMENT_CHARACTERISTIC: u16 = 0x2A5B;

/**
 * The Bluetooth base UUID, 16 bit assigned numbers occupy bits 96..112.
 */
const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

pub fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | (u128::from(short) << 96))
}

/// The 16 bit assigned number part of `uuid`, the bits that distinguish standard services.
pub fn short_uuid(uuid: &Uuid) -> u16 {
    (uuid.as_u128() >> 96) as u16
}

pub fn make_csc_service_uuid() -> Uuid {
    uuid_from_u16(CSC_SERVICE)
}

pub fn make_csc_measurement_uuid() -> Uuid {
    uuid_from_u16(CSC_MEASUREMENT_CHARACTERISTIC)
}
