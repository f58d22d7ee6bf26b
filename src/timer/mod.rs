//! Alarm scheduling utilities for the CEC driver.
//!
//! The bit-timing driver never busy-waits: every transmit sub-interval
//! and ACK release is a single-shot alarm deadline in absolute
//! microseconds. This module defines the [`AlarmScheduler`] seam the
//! driver arms those deadlines through, plus helpers for converting
//! microsecond deadlines into counts of whatever hardware timer the
//! platform provides:
//! - `alarm_ticks`: runtime tick calculator
//! - `const_alarm_ticks`: compile-time tick calculator
//! - `cec_edge_interrupt` / `cec_alarm_interrupt` and the
//!   `cec_edge_isr!()` / `cec_alarm_isr!()` macros (feature
//!   `timer-isr`): interrupt entry points for the global driver
//!
//! On a 1 MHz timer (e.g. the RP2040 system timer) ticks equal
//! microseconds and the conversion collapses to the identity.

use libm::round;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;

/// 1,000,000 microseconds = 1 second
pub const MICROS_PER_SECOND: u32 = 1_000_000;

/// Single-shot alarm owned by the CEC driver.
///
/// `schedule_at` replaces any pending deadline. When the deadline is
/// reached the platform must invoke
/// [`CecDriver::on_alarm`](crate::driver::CecDriver::on_alarm) (or the
/// `cec_alarm_isr!()` macro) with the current timestamp. Late or
/// duplicate invocations are harmless; the driver checks which
/// deadlines are actually due.
pub trait AlarmScheduler {
    /// Arms the alarm for an absolute microsecond deadline.
    fn schedule_at(&mut self, deadline_us: u64);
}

/// Converts a microsecond deadline into hardware timer ticks.
///
/// # Arguments
/// - `timer_hz`: timer input frequency in Hz
/// - `deadline_us`: deadline in microseconds
///
/// # Returns
/// - The nearest tick count for the deadline
pub fn alarm_ticks(timer_hz: u32, deadline_us: u64) -> u64 {
    round(timer_hz as f64 / MICROS_PER_SECOND as f64 * deadline_us as f64) as u64
}

/// Compile-time variant of [`alarm_ticks`] using integer arithmetic.
///
/// # Arguments
/// - `timer_hz`: timer input frequency in Hz
/// - `deadline_us`: deadline in microseconds
///
/// # Returns
/// - The truncated tick count for the deadline
pub const fn const_alarm_ticks(timer_hz: u32, deadline_us: u64) -> u64 {
    (timer_hz as u64 * deadline_us) / MICROS_PER_SECOND as u64
}
