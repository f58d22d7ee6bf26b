//! Edge-timing decoder for CEC bit cells.
//!
//! This module reconstructs bytes from the raw edge stream of the CEC
//! line. Every bit cell is opened by a falling edge; the width of the
//! low pulse encodes the value ('1' releases early, '0' late, the
//! start bit much later still), and the fall-to-fall period bounds the
//! cell. The decoder classifies each low pulse against the windows in
//! [`crate::consts`], assembles ten-cell bytes (eight data bits, EOM,
//! ACK), and hands completed frames to the driver.
//!
//! The decoder is fed *every* edge the driver observes, including the
//! ones the driver generates itself while transmitting. On a wired-AND
//! bus the merged waveform during arbitration is exactly the winning
//! initiator's frame, so after an arbitration loss the decoder is
//! already mid-frame as a receiver with no extra bookkeeping.
//!
//! Malformed timing (a pulse or period outside every window) discards
//! the frame in progress, bumps [`bad`](BitDecoder::bad), and waits
//! for the next start bit. No error is surfaced; the initiator's retry
//! machinery covers the loss.

use crate::consts::{
    BIT_LOW_MAX_US, BIT_LOW_MIN_US, BIT_PERIOD_MAX_US, BIT_PERIOD_MIN_US, BROADCAST_ADDR,
    MAX_FRAME_LEN, SAMPLE_POINT_US, START_LOW_MAX_US, START_LOW_MIN_US, START_PERIOD_MAX_US,
    START_PERIOD_MIN_US,
};
use heapless::Vec;

/// Cell marker meaning "start bit seen, first data cell not yet open".
const NO_CELL: u8 = 0xFF;

/// Events the decoder reports back to the driver.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RxEvent {
    /// The ACK cell of a byte addressed directly to this node just
    /// opened. The driver owes an assertion: drive the line low and
    /// release it 1.5 ms after the falling edge.
    AckWindow,
    /// A complete frame addressed to this node or to broadcast.
    Frame(RawFrame),
}

/// A decoded frame as it came off the wire.
#[derive(Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct RawFrame {
    /// Header, opcode and operand bytes, in wire order.
    pub bytes: Vec<u8, MAX_FRAME_LEN>,
    /// Positive acknowledgment, with broadcast polarity applied: for a
    /// direct frame, some follower held the final ACK window low; for
    /// a broadcast, nobody did.
    pub ack: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
enum RxState {
    /// Waiting for a falling edge that might open a start bit.
    #[default]
    Idle,
    /// Falling edge seen while idle; the rise decides start vs. noise.
    StartLow,
    /// Between a validated start bit and frame completion.
    InFrame,
}

/// Receive-side bit classifier. One instance lives inside the driver;
/// [`on_edge`](BitDecoder::on_edge) is called from the edge interrupt
/// with a microsecond timestamp and the line level after the edge.
#[derive(Debug, Default)]
pub struct BitDecoder {
    state: RxState,
    /// Time of the falling edge that opened the current cell.
    fall: u64,
    /// Index of the current cell within its byte: 0..=7 data, 8 EOM,
    /// 9 ACK, [`NO_CELL`] right after the start bit.
    cell: u8,
    /// Data bits assembled so far, MSB first.
    byte: u8,
    /// EOM flag of the byte in progress.
    eom: bool,
    buf: Vec<u8, MAX_FRAME_LEN>,
    /// Frames discarded for malformed timing or overlength.
    pub bad: u16,
}

impl BitDecoder {
    /// Creates an idle decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one edge. `line_low` is the level after the edge;
    /// `self_la` is this node's claimed logical address (0x0F while
    /// unregistered) and gates ACK ownership.
    pub fn on_edge(&mut self, now: u64, line_low: bool, self_la: u8) -> Option<RxEvent> {
        if line_low {
            self.on_fall(now, self_la)
        } else {
            self.on_rise(now, self_la)
        }
    }

    fn on_fall(&mut self, now: u64, self_la: u8) -> Option<RxEvent> {
        match self.state {
            RxState::Idle | RxState::StartLow => {
                self.state = RxState::StartLow;
                self.fall = now;
                None
            }
            RxState::InFrame => {
                let period = now.saturating_sub(self.fall);
                let (min, max) = if self.cell == NO_CELL {
                    (START_PERIOD_MIN_US, START_PERIOD_MAX_US)
                } else {
                    (BIT_PERIOD_MIN_US, BIT_PERIOD_MAX_US)
                };
                if period < min || period > max {
                    // Resynchronize; this fall may itself open a start bit.
                    self.drop_frame();
                    self.state = RxState::StartLow;
                    self.fall = now;
                    return None;
                }
                self.fall = now;
                self.cell = match self.cell {
                    NO_CELL | 9 => 0,
                    c => c + 1,
                };
                if self.cell == 9 {
                    let dest = self.buf.first().map(|h| h & 0x0F);
                    if self_la != BROADCAST_ADDR && dest == Some(self_la) {
                        return Some(RxEvent::AckWindow);
                    }
                }
                None
            }
        }
    }

    fn on_rise(&mut self, now: u64, self_la: u8) -> Option<RxEvent> {
        let width = now.saturating_sub(self.fall);
        match self.state {
            RxState::Idle => None,
            RxState::StartLow => {
                if (START_LOW_MIN_US..=START_LOW_MAX_US).contains(&width) {
                    self.state = RxState::InFrame;
                    self.cell = NO_CELL;
                    self.buf.clear();
                    self.byte = 0;
                    self.eom = false;
                } else {
                    // Not a start bit; keep waiting.
                    self.state = RxState::Idle;
                }
                None
            }
            RxState::InFrame => {
                if self.cell == NO_CELL || width < BIT_LOW_MIN_US || width > BIT_LOW_MAX_US {
                    self.drop_frame();
                    return None;
                }
                // A pulse released before the sample point is a '1'.
                let bit = width < SAMPLE_POINT_US;
                match self.cell {
                    0..=7 => {
                        self.byte = (self.byte << 1) | u8::from(bit);
                        None
                    }
                    8 => {
                        self.eom = bit;
                        if self.buf.push(self.byte).is_err() {
                            self.drop_frame();
                            return None;
                        }
                        self.byte = 0;
                        None
                    }
                    _ => {
                        // ACK cell: a low held past the sample point is
                        // an assertion by some follower.
                        let asserted = !bit;
                        if !self.eom {
                            return None;
                        }
                        self.state = RxState::Idle;
                        let bytes = core::mem::take(&mut self.buf);
                        let dest = bytes.first().map_or(BROADCAST_ADDR, |h| h & 0x0F);
                        let ack = if dest == BROADCAST_ADDR {
                            !asserted
                        } else {
                            asserted
                        };
                        if dest == self_la || dest == BROADCAST_ADDR {
                            Some(RxEvent::Frame(RawFrame { bytes, ack }))
                        } else {
                            None
                        }
                    }
                }
            }
        }
    }

    fn drop_frame(&mut self) {
        self.bad = self.bad.saturating_add(1);
        self.state = RxState::Idle;
        self.buf.clear();
        self.byte = 0;
        self.eom = false;
    }
}
