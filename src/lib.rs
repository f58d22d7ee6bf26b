//! # picocec
//!
//! A portable, no_std Rust driver that puts a microcontroller on an
//! HDMI Consumer Electronics Control (CEC) bus and turns the TV
//! remote's keypresses into USB-HID keycodes, so a CEC-capable
//! television can navigate a connected media-player PC.
//!
//! This crate implements a complete CEC v1.3a peer in software:
//! - `embedded-hal` traits for the open-drain line and startup delays
//! - edge-interrupt reception and alarm-driven transmission with
//!   microsecond bit timing (no busy-waiting anywhere)
//! - frame codec, bus arbitration, logical-address probing and the
//!   mandatory v1.3a message set
//! - interrupt-safe driver sharing with `critical-section`
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` for host-side testing |
//! | `timer-isr` (default) | Global driver singleton plus ISR entry macros via `critical-section` |
//! | `defmt-0-3`           | Derives `defmt::Format` on the public types |
//! | `log`                 | Engine-task logging via the `log` facade |
//!
//! ## Software Features
//!
//! - **Bit-timing driver**: start bit, data/EOM/ACK cells, signal-free
//!   time, arbitration loss recovery and the 5-attempt retry ladder,
//!   all advanced from two interrupt entry points
//! - **Frame codec**: 1–16 byte frames, header nibble packing,
//!   polling-frame and broadcast handling
//! - **Addressing**: device-type candidate probing and EDID-derived
//!   physical addresses
//! - **Protocol engine**: discovery, menu, power, audio and vendor
//!   queries, active-source tracking, Feature Abort catch-all, and
//!   remote keys published to a `heapless` SPSC queue
//!
//! ## Usage
//!
//! ```rust
//! use picocec::driver::CecDriver;
//! use picocec::timer::AlarmScheduler;
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//!
//! #[derive(Debug, Default)]
//! struct Alarm(Option<u64>);
//!
//! impl AlarmScheduler for Alarm {
//!     fn schedule_at(&mut self, deadline_us: u64) {
//!         self.0 = Some(deadline_us);
//!     }
//! }
//!
//! # let pin = Pin::new(&[PinTransaction::set(PinState::High)]);
//! # let mut pin_handle = pin.clone();
//! let mut driver = CecDriver::new(pin, Alarm::default());
//! driver.set_logical_address(0x04);
//! assert!(driver.poll_recv().is_none());
//! # pin_handle.done();
//! ```
//!
//! With the `timer-isr` feature, the `init_cec_driver!`,
//! `setup_cec_driver!`, `cec_edge_isr!` and `cec_alarm_isr!` macros
//! wire the global driver into the platform's GPIO and alarm
//! interrupts; the engine task then talks to it through
//! [`timer::IsrBus`].
//!
//! ## Integration Notes
//!
//! - Edge interrupts must report **both** edges with microsecond
//!   timestamps, including edges this node drives itself.
//! - The alarm must be a single-shot comparator (RP2040 timer alarm,
//!   SysTick reload, an output-compare channel); CEC demands ±200 µs
//!   transmit accuracy, so route it through a hardware timer, not a
//!   software tick.
//! - The engine task is the only writer of protocol state; the HID
//!   task only consumes the key queue.
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "timer-isr")]
pub use critical_section;

pub use heapless;

pub mod address;
pub mod config;
pub mod consts;
pub mod decoder;
pub mod driver;
pub mod engine;
pub mod frame;
pub mod keymap;
pub mod timer;
pub mod types;
