use crate::error::DecodeError;

/**
 * Minimum length of a CSC measurement payload: flags (1 byte), cumulative crank revolutions
 * (2 bytes) and last crank event time (2 bytes).
 */
pub const MIN_PAYLOAD_LEN: usize = 5;

/**
 * The crank event time is expressed in 1/1024 second.
 */
pub const EVENT_TIME_UNITS_PER_SECOND: u32 = 1024;

const COUNTER_RANGE: u32 = 1 << 16;

/// One raw crank reading taken from a CSC measurement notification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CrankSample {
    pub cumulative_revolutions: u16,
    pub last_event_time: u16,
}

/// The previously processed crank reading. Deltas of the next sample are computed against it.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CadenceTracker {
    pub previous_cumulative_revolutions: u16,
    pub previous_last_event_time: u16,
}

impl CadenceTracker {
    /// Decode `payload` and fold it into the tracker, returning the cadence in RPM.
    /// A payload that fails to decode leaves the tracker as it was.
    pub fn process(&mut self, payload: &[u8]) -> Result<u16, DecodeError> {
        let sample = decode(payload)?;
        let (rpm, next) = compute_rpm(*self, sample);
        *self = next;
        Ok(rpm)
    }
}

// The flags byte is not inspected, crank revolution data is assumed to be present at offset 1.
pub fn decode(payload: &[u8]) -> Result<CrankSample, DecodeError> {
    if payload.len() < MIN_PAYLOAD_LEN {
        return Err(DecodeError::MalformedPayload { len: payload.len() });
    }

    Ok(CrankSample {
        cumulative_revolutions: u16::from_le_bytes([payload[1], payload[2]]),
        last_event_time: u16::from_le_bytes([payload[3], payload[4]]),
    })
}

/// Distance from `previous` to `current` on a 16 bit counter, assuming it wrapped at most once.
pub fn wrapping_delta(previous: u16, current: u16) -> u32 {
    let previous = u32::from(previous);
    let current = u32::from(current);

    if current >= previous {
        current - previous
    } else {
        COUNTER_RANGE - previous + current
    }
}

pub fn compute_rpm(tracker: CadenceTracker, sample: CrankSample) -> (u16, CadenceTracker) {
    let delta_revolutions = wrapping_delta(tracker.previous_cumulative_revolutions, sample.cumulative_revolutions);
    let delta_time = wrapping_delta(tracker.previous_last_event_time, sample.last_event_time);

    let rpm = if delta_time == 0 {
        0
    } else {
        // u64 so that 60 * 65535 * 1024 can not overflow before dividing
        let rpm = 60 * u64::from(delta_revolutions) * u64::from(EVENT_TIME_UNITS_PER_SECOND) / u64::from(delta_time);
        rpm as u16 // truncating, like the 16 bit value sent to listeners
    };

    let updated = CadenceTracker {
        previous_cumulative_revolutions: sample.cumulative_revolutions,
        previous_last_event_time: sample.last_event_time,
    };

    (rpm, updated)
}
