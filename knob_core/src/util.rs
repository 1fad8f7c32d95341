//! Common time/period helpers for knob_core.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Compute the period in microseconds for a given conversion rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Convert a tick count at `hz` conversions per second into milliseconds.
/// Returns `None` when the rate is unpaced (0 Hz).
#[inline]
pub fn ticks_to_ms(ticks: u32, hz: u32) -> Option<u64> {
    if hz == 0 {
        return None;
    }
    Some(u64::from(ticks) * 1_000 / u64::from(hz))
}
