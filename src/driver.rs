//! CEC bit-timing driver.
//!
//! This module provides the [`CecDriver`] struct, which drives a single
//! open-drain CEC line to v1.3a bit timing. The line is owned as an
//! `embedded-hal` [`OutputPin`] with open-drain semantics: `set_low`
//! asserts the bus, `set_high` releases it to the external pull-up.
//!
//! The driver is entirely interrupt-driven and keeps no busy-waits:
//!
//! - [`on_edge`](CecDriver::on_edge) is called from the GPIO
//!   edge-change interrupt with a microsecond timestamp and the line
//!   level after the edge. Both edges must be reported, including the
//!   ones this node causes itself.
//! - [`on_alarm`](CecDriver::on_alarm) is called when the single-shot
//!   alarm armed through [`AlarmScheduler`] fires. The driver re-arms
//!   the alarm itself whenever a deadline is pending.
//!
//! Reception is delegated to [`BitDecoder`], which sees every edge on
//! the bus, ours included. Because CEC arbitration works by wired-AND
//! (the merged waveform is the winning initiator's frame), losing
//! arbitration just means the driver stops driving; the decoder is
//! already following the survivor.
//!
//! Transmission walks a phase machine over nominal deadlines: wait for
//! the signal-free time, start bit, ten-cell bytes (eight data bits,
//! EOM, ACK), sampling each ACK window at 1.05 ms. A NACK aborts the
//! attempt and retries after the shorter retry free-time, up to five
//! attempts. Broadcast frames invert the ACK polarity and are not
//! retried after an arbitration loss.
//!
//! Both entry points run in interrupt context: they never allocate,
//! never log and never block. The task-side surface is non-blocking
//! ([`begin_send`](CecDriver::begin_send) /
//! [`send_status`](CecDriver::send_status) /
//! [`poll_recv`](CecDriver::poll_recv)); the blocking wrappers live in
//! [`crate::timer::isr`].

use crate::consts::{
    BROADCAST_ADDR, FREE_TIME_AFTER_TX_US, FREE_TIME_NEW_US, FREE_TIME_RETRY_US, MAX_FRAME_LEN,
    ONE_LOW_US, SAMPLE_POINT_US, SEND_TIMEOUT_US, START_LOW_US, START_PERIOD_US, TX_ATTEMPTS,
    BIT_PERIOD_US, ZERO_LOW_US,
};
use crate::decoder::{BitDecoder, RawFrame, RxEvent};
use crate::frame::CecFrame;
use crate::timer::AlarmScheduler;
use embedded_hal::digital::OutputPin;
use heapless::Vec;
use thiserror::Error;

/// Ways a transmission can fail. Malformed inbound timing is never an
/// error here; the decoder resynchronizes silently.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum SendError {
    /// No follower acknowledged (or, for broadcast, one rejected) the
    /// frame in any of the five attempts.
    #[error("no follower acknowledged the frame")]
    NotAcknowledged,
    /// Another initiator held the line where this node expected it
    /// released.
    #[error("lost bus arbitration to another initiator")]
    ArbitrationLost,
    /// The bus never became free within the send deadline.
    #[error("bus busy past the send deadline")]
    Timeout,
    /// A transmission is already in flight.
    #[error("a transmission is already in progress")]
    Busy,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
enum TxPhase {
    #[default]
    Idle,
    /// Waiting for the signal-free time to elapse.
    WaitFree,
    /// Driving the 3.7 ms start-bit low.
    StartLow,
    /// Start bit released, waiting for the first data cell.
    StartHigh,
    /// Driving the low portion of a data or EOM cell.
    BitLow,
    /// Data cell released until the cell boundary.
    BitHigh,
    /// Driving the 0.6 ms ACK-cell low.
    AckLow,
    /// ACK cell released, waiting for the sample point.
    AckWait,
    /// ACK sampled, waiting out the cell.
    AckEnd,
}

/// Interrupt-driven CEC line driver.
///
/// `P` is the open-drain line (assert = `set_low`); `A` arms the
/// single-shot alarm that calls back into
/// [`on_alarm`](CecDriver::on_alarm).
#[derive(Debug)]
pub struct CecDriver<P, A>
where
    P: OutputPin,
    A: AlarmScheduler,
{
    pin: P,
    alarm: A,
    /// Receive bit classifier, fed from every edge.
    pub decoder: BitDecoder,
    addr: u8,
    line_low: bool,
    last_edge: u64,
    just_sent: bool,
    ack_release: Option<u64>,
    rx_frame: Option<CecFrame>,

    phase: TxPhase,
    tx_buf: Vec<u8, MAX_FRAME_LEN>,
    tx_byte: usize,
    /// Bit index within the current byte: 0..=7 data, 8 EOM.
    tx_bit: u8,
    tx_broadcast: bool,
    tx_attempts: u8,
    tx_free: u64,
    tx_started: u64,
    bit_start: u64,
    tx_deadline: u64,
    tx_nack: bool,
    tx_result: Option<Result<(), SendError>>,

    /// Frames transmitted and positively acknowledged.
    pub tx_good: u16,
    /// Frames received and delivered.
    pub rx_good: u16,
    /// Frames dropped after decoding (invalid header or overrun).
    pub rx_bad: u16,
}

impl<P, A> CecDriver<P, A>
where
    P: OutputPin,
    A: AlarmScheduler,
{
    /// Creates a driver with the line released and no address claimed.
    pub fn new(pin: P, alarm: A) -> Self {
        let mut pin = pin;
        let _ = pin.set_high(); // Ensure the bus is released
        Self {
            pin,
            alarm,
            decoder: BitDecoder::new(),
            addr: BROADCAST_ADDR,
            line_low: false,
            last_edge: 0,
            just_sent: false,
            ack_release: None,
            rx_frame: None,
            phase: TxPhase::Idle,
            tx_buf: Vec::new(),
            tx_byte: 0,
            tx_bit: 0,
            tx_broadcast: false,
            tx_attempts: 0,
            tx_free: FREE_TIME_NEW_US,
            tx_started: 0,
            bit_start: 0,
            tx_deadline: 0,
            tx_nack: false,
            tx_result: None,
            tx_good: 0,
            rx_good: 0,
            rx_bad: 0,
        }
    }

    /// Sets the claimed logical address. 0x0F means unregistered: the
    /// driver then acknowledges nothing and delivers only broadcasts.
    pub fn set_logical_address(&mut self, la: u8) {
        self.addr = la & 0x0F;
    }

    /// The currently claimed logical address.
    pub fn logical_address(&self) -> u8 {
        self.addr
    }

    /// True while a transmission is in flight or its result has not
    /// been consumed yet.
    pub fn sending(&self) -> bool {
        self.phase != TxPhase::Idle || self.tx_result.is_some()
    }

    /// Queues a frame for transmission. The bits go out from alarm
    /// interrupts; completion is reported by
    /// [`send_status`](CecDriver::send_status).
    pub fn begin_send(&mut self, frame: &CecFrame, now_us: u64) -> Result<(), SendError> {
        if self.sending() {
            return Err(SendError::Busy);
        }
        self.tx_buf.clear();
        let _ = self.tx_buf.extend_from_slice(frame.as_bytes());
        self.tx_broadcast = frame.is_broadcast();
        self.tx_attempts = 0;
        self.tx_nack = false;
        self.tx_started = now_us;
        self.tx_free = if self.just_sent {
            FREE_TIME_AFTER_TX_US
        } else {
            FREE_TIME_NEW_US
        };
        if !self.line_low && now_us.saturating_sub(self.last_edge) >= self.tx_free {
            self.start_bit(now_us);
        } else {
            self.phase = TxPhase::WaitFree;
            self.tx_deadline = core::cmp::max(self.last_edge + self.tx_free, now_us);
        }
        self.rearm();
        Ok(())
    }

    /// Completion state of the last [`begin_send`](CecDriver::begin_send):
    /// `Ok` once the frame was acknowledged, an error after retries are
    /// exhausted, `WouldBlock` while still in flight.
    pub fn send_status(&mut self) -> nb::Result<(), SendError> {
        match self.tx_result.take() {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(nb::Error::Other(e)),
            None => Err(nb::Error::WouldBlock),
        }
    }

    /// Takes the most recently received frame, if any. Delivered frames
    /// are addressed to this node or to broadcast and never originate
    /// from this node itself.
    pub fn poll_recv(&mut self) -> Option<CecFrame> {
        self.rx_frame.take()
    }

    /// GPIO edge-change interrupt entry point. `line_low` is the level
    /// after the edge; `now_us` a monotonic microsecond timestamp.
    pub fn on_edge(&mut self, now_us: u64, line_low: bool) {
        self.edge(now_us, line_low);
        self.rearm();
    }

    /// Alarm interrupt entry point. Late or spurious invocations are
    /// harmless; due deadlines are dispatched, the rest re-armed.
    pub fn on_alarm(&mut self, now_us: u64) {
        if let Some(t) = self.ack_release {
            if now_us >= t {
                let _ = self.pin.set_high();
                self.ack_release = None;
            }
        }
        if self.phase != TxPhase::Idle && now_us >= self.tx_deadline {
            self.advance_tx(now_us);
        }
        self.rearm();
    }

    /// Shared edge handler. Duplicate levels (our own drive echoed by
    /// the GPIO interrupt) are ignored, so internal calls and the ISR
    /// can both report the same transition.
    fn edge(&mut self, now: u64, low: bool) {
        if low == self.line_low {
            return;
        }
        self.line_low = low;
        self.last_edge = now;
        if low {
            match self.phase {
                // The line must be released in these phases; a falling
                // edge is another initiator.
                TxPhase::StartHigh | TxPhase::BitHigh | TxPhase::AckWait | TxPhase::AckEnd => {
                    self.arbitration_lost(now);
                }
                TxPhase::WaitFree => self.tx_deadline = now + self.tx_free,
                TxPhase::Idle => self.just_sent = false,
                _ => {}
            }
        } else if self.phase == TxPhase::WaitFree {
            self.tx_deadline = now + self.tx_free;
        }
        match self.decoder.on_edge(now, low, self.addr) {
            Some(RxEvent::AckWindow) => {
                if matches!(self.phase, TxPhase::Idle | TxPhase::WaitFree) {
                    // The initiator already holds the line low; extend
                    // its pulse to a '0' and release at 1.5 ms.
                    let _ = self.pin.set_low();
                    self.ack_release = Some(now + ZERO_LOW_US);
                }
            }
            Some(RxEvent::Frame(raw)) => self.deliver(raw),
            None => {}
        }
    }

    fn deliver(&mut self, raw: RawFrame) {
        let Ok(mut frame) = CecFrame::from_bytes(&raw.bytes) else {
            self.rx_bad = self.rx_bad.saturating_add(1);
            return;
        };
        frame.set_ack(raw.ack);
        if frame.initiator() == self.addr && self.addr != BROADCAST_ADDR {
            // Our own transmission observed on the line.
            return;
        }
        if self.rx_frame.is_some() {
            self.rx_bad = self.rx_bad.saturating_add(1);
            return;
        }
        self.rx_frame = Some(frame);
        self.rx_good = self.rx_good.saturating_add(1);
    }

    fn start_bit(&mut self, t: u64) {
        self.tx_byte = 0;
        self.tx_bit = 0;
        self.tx_nack = false;
        self.tx_started = t;
        self.bit_start = t;
        self.phase = TxPhase::StartLow;
        self.tx_deadline = t + START_LOW_US;
        let _ = self.pin.set_low();
        self.edge(t, true);
    }

    /// Opens the cell for the current (byte, bit) with its falling edge
    /// at the nominal time `t`.
    fn next_bit(&mut self, t: u64) {
        let byte = self.tx_buf[self.tx_byte];
        let bit = if self.tx_bit == 8 {
            // EOM: set on the final byte.
            self.tx_byte + 1 == self.tx_buf.len()
        } else {
            (byte >> (7 - self.tx_bit)) & 1 == 1
        };
        self.bit_start = t;
        self.phase = TxPhase::BitLow;
        self.tx_deadline = t + if bit { ONE_LOW_US } else { ZERO_LOW_US };
        let _ = self.pin.set_low();
        self.edge(t, true);
    }

    fn advance_tx(&mut self, now: u64) {
        // Deadlines are advanced from their nominal values so timing
        // does not drift with interrupt latency.
        let t = self.tx_deadline;
        match self.phase {
            TxPhase::Idle => {}
            TxPhase::WaitFree => {
                if now.saturating_sub(self.tx_started) >= SEND_TIMEOUT_US {
                    self.finish(Err(SendError::Timeout));
                } else if !self.line_low && now.saturating_sub(self.last_edge) >= self.tx_free {
                    self.start_bit(now);
                } else {
                    self.tx_deadline = now + self.tx_free;
                }
            }
            TxPhase::StartLow => {
                let _ = self.pin.set_high();
                self.phase = TxPhase::StartHigh;
                self.tx_deadline = self.bit_start + START_PERIOD_US;
            }
            TxPhase::StartHigh => self.next_bit(t),
            TxPhase::BitLow => {
                let _ = self.pin.set_high();
                self.phase = TxPhase::BitHigh;
                self.tx_deadline = self.bit_start + BIT_PERIOD_US;
            }
            TxPhase::BitHigh => {
                if self.line_low {
                    self.arbitration_lost(now);
                } else if self.tx_bit < 8 {
                    self.tx_bit += 1;
                    self.next_bit(t);
                } else {
                    // EOM cell done; the ACK cell opens with our pulse.
                    self.bit_start = t;
                    self.phase = TxPhase::AckLow;
                    self.tx_deadline = t + ONE_LOW_US;
                    let _ = self.pin.set_low();
                    self.edge(t, true);
                }
            }
            TxPhase::AckLow => {
                let _ = self.pin.set_high();
                self.phase = TxPhase::AckWait;
                self.tx_deadline = self.bit_start + SAMPLE_POINT_US;
            }
            TxPhase::AckWait => {
                let acked = if self.tx_broadcast {
                    !self.line_low
                } else {
                    self.line_low
                };
                if !acked {
                    self.tx_nack = true;
                }
                self.phase = TxPhase::AckEnd;
                self.tx_deadline = self.bit_start + BIT_PERIOD_US;
            }
            TxPhase::AckEnd => {
                if self.line_low {
                    self.arbitration_lost(now);
                } else if self.tx_nack {
                    self.tx_attempts += 1;
                    if self.tx_attempts >= TX_ATTEMPTS {
                        self.finish(Err(SendError::NotAcknowledged));
                    } else {
                        self.retry(now);
                    }
                } else if self.tx_byte + 1 == self.tx_buf.len() {
                    self.finish(Ok(()));
                } else {
                    self.tx_byte += 1;
                    self.tx_bit = 0;
                    self.next_bit(t);
                }
            }
        }
    }

    fn arbitration_lost(&mut self, now: u64) {
        let _ = self.pin.set_high();
        if self.tx_broadcast {
            self.finish(Err(SendError::ArbitrationLost));
            return;
        }
        self.tx_attempts += 1;
        if self.tx_attempts >= TX_ATTEMPTS {
            self.finish(Err(SendError::ArbitrationLost));
        } else {
            self.retry(now);
        }
    }

    fn retry(&mut self, now: u64) {
        self.tx_nack = false;
        self.tx_free = FREE_TIME_RETRY_US;
        self.phase = TxPhase::WaitFree;
        self.tx_deadline = core::cmp::max(self.last_edge + self.tx_free, now);
    }

    fn finish(&mut self, result: Result<(), SendError>) {
        let _ = self.pin.set_high();
        if result.is_ok() {
            self.tx_good = self.tx_good.saturating_add(1);
        }
        self.just_sent = result.is_ok();
        self.phase = TxPhase::Idle;
        self.tx_result = Some(result);
    }

    /// Arms the alarm for the earliest pending deadline, if any.
    fn rearm(&mut self) {
        let mut next = self.ack_release;
        if self.phase != TxPhase::Idle {
            next = Some(match next {
                Some(n) => n.min(self.tx_deadline),
                None => self.tx_deadline,
            });
        }
        if let Some(t) = next {
            self.alarm.schedule_at(t);
        }
    }
}
