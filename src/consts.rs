//! Constants used across the CEC protocol implementation.
//!
//! This module defines the bit-cell timing of CEC v1.3a, the
//! classification windows the receive decoder applies to edge
//! intervals, the signal-free times that gate transmission, and the
//! handful of fixed protocol values the engine answers queries with.
//!
//! ## Key Concepts
//!
//! - **Bit cell**: every CEC bit occupies a 2.4 ms cell opened by a
//!   falling edge; the low-pulse width encodes the value.
//! - **Sample point**: receivers distinguish '0' from '1' 1.05 ms after
//!   the falling edge, the midpoint of the ambiguity window.
//! - **Signal-free time**: an initiator may only start a frame after
//!   the bus has been idle for a number of bit periods that depends on
//!   whether this is a first attempt, a retry, or a back-to-back frame.
//! - **Classification windows**: receive tolerances are wider (±400 µs
//!   at the sample point) than transmit tolerances (±200 µs), so the
//!   decoder windows below are deliberately generous.
//!
//! All times are in microseconds unless the name says otherwise.

/// Nominal duration of one data bit cell.
pub const BIT_PERIOD_US: u64 = 2_400;

/// Low-pulse width of a logical '1' (released for the remaining 1.8 ms).
pub const ONE_LOW_US: u64 = 600;

/// Low-pulse width of a logical '0' (released for the remaining 0.9 ms).
pub const ZERO_LOW_US: u64 = 1_500;

/// Receive sample point, measured from the falling edge that opens a
/// bit cell. A low pulse still asserted here is a '0'; one already
/// released is a '1'. The same instant is where an initiator samples
/// the ACK bit.
pub const SAMPLE_POINT_US: u64 = 1_050;

/// Low-pulse width of the start bit.
pub const START_LOW_US: u64 = 3_700;

/// Nominal time from the start bit's falling edge to the first data
/// bit's falling edge.
pub const START_PERIOD_US: u64 = 4_500;

/// Transmit timing must stay within this distance of nominal.
pub const TX_TOLERANCE_US: u64 = 200;

/// Receive classification tolerance at the sample point.
pub const RX_TOLERANCE_US: u64 = 400;

/// Shortest low pulse accepted as a data bit.
pub const BIT_LOW_MIN_US: u64 = 300;

/// Longest low pulse accepted as a data bit.
pub const BIT_LOW_MAX_US: u64 = 2_000;

/// Accepted low-pulse window for a start bit.
pub const START_LOW_MIN_US: u64 = 3_300;
/// See [`START_LOW_MIN_US`].
pub const START_LOW_MAX_US: u64 = 4_100;

/// Accepted fall-to-fall window for a data bit cell.
pub const BIT_PERIOD_MIN_US: u64 = 2_000;
/// See [`BIT_PERIOD_MIN_US`].
pub const BIT_PERIOD_MAX_US: u64 = 2_850;

/// Accepted fall-to-fall window for the start bit cell.
pub const START_PERIOD_MIN_US: u64 = 4_100;
/// See [`START_PERIOD_MIN_US`].
pub const START_PERIOD_MAX_US: u64 = 4_900;

/// Signal-free time before a first transmission attempt: 7 bit periods.
pub const FREE_TIME_NEW_US: u64 = 7 * BIT_PERIOD_US;

/// Signal-free time before a retry: 5 bit periods.
pub const FREE_TIME_RETRY_US: u64 = 5 * BIT_PERIOD_US;

/// Signal-free time when this node was the last transmitter: 3 bit
/// periods.
pub const FREE_TIME_AFTER_TX_US: u64 = 3 * BIT_PERIOD_US;

/// Maximum transmission attempts for one frame.
pub const TX_ATTEMPTS: u8 = 5;

/// Aggregate send deadline covering all retries and free-time waits.
pub const SEND_TIMEOUT_US: u64 = 130_000;

/// Maximum CEC frame length in bytes (header plus opcode plus operands).
pub const MAX_FRAME_LEN: usize = 16;

/// The broadcast / unregistered logical address.
pub const BROADCAST_ADDR: u8 = 0x0F;

/// Capacity of the HID key-event queue.
pub const KEY_QUEUE_LEN: usize = 16;

/// The HID "no key" sentinel queued on User Control Released.
pub const HID_NO_KEY: u8 = 0x00;

/// CEC version operand reported by this device (v1.3a).
pub const CEC_VERSION_1_3A: u8 = 0x04;

/// IEEE OUI reported as Device Vendor ID, big-endian on the wire.
pub const VENDOR_ID: u32 = 0x0010FA;

/// OSD name reported via Set OSD Name.
pub const OSD_NAME: &[u8] = b"Pico-CEC";

/// Report Audio Status operand: volume 50 %, not muted.
pub const AUDIO_STATUS: u8 = 0x32;
