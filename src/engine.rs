//! CEC protocol engine.
//!
//! The engine owns all protocol state and runs on an ordinary task: it
//! dequeues received frames from the bus, updates [`DeviceState`],
//! transmits whatever replies the mandatory CEC v1.3a message set
//! requires, and publishes remote-control keypresses to the HID key
//! queue. It suspends only inside the bus's blocking send and receive;
//! nothing here ever runs in interrupt context.
//!
//! External collaborators are traits: [`CecBus`] is the seam to the
//! bit-timing driver (or a test double), [`KeySink`] the producer side
//! of the key-event queue, [`Indicator`] the status LED or equivalent,
//! and [`crate::address::EdidSource`] the DDC reader supplying the
//! physical address.
//!
//! Dispatch is by opcode name, and the Feature Abort catch-all keeps
//! the engine forward compatible: any directly addressed opcode with
//! no handler is answered with reason 0 (unrecognized), never dropped
//! silently. Unhandled broadcasts are ignored.

use crate::address::{EdidSource, allocate_logical, physical_address};
use crate::config::{Config, ConfigStore};
use crate::consts::{AUDIO_STATUS, BROADCAST_ADDR, CEC_VERSION_1_3A, HID_NO_KEY, OSD_NAME, VENDOR_ID};
use crate::driver::SendError;
use crate::frame::CecFrame;
use crate::types::{AbortReason, MenuRequestType, MenuState, Opcode, PowerStatus};
use core::convert::Infallible;
use core::fmt;
use embedded_hal::delay::DelayNs;

/// Frame-level bus access as the engine sees it.
///
/// `send` blocks until the frame is acknowledged or retries are
/// exhausted; `recv` is non-blocking so the engine's run loop can
/// decide how to wait.
pub trait CecBus {
    /// Transmits a frame, blocking through arbitration, retries and
    /// acknowledgment.
    fn send(&mut self, frame: &CecFrame) -> Result<(), SendError>;

    /// Takes the next received frame if one is pending.
    fn recv(&mut self) -> nb::Result<CecFrame, Infallible>;

    /// Tells the driver which logical address to acknowledge.
    fn set_address(&mut self, la: u8);

    /// Probes a logical address with a polling frame; an acknowledged
    /// poll means the address is taken.
    fn address_taken(&mut self, la: u8) -> bool {
        self.send(&CecFrame::poll(la)).is_ok()
    }
}

/// Consumer-facing key-event sink (the producer half of the HID
/// queue). Returns `false` when the event was dropped.
pub trait KeySink {
    /// Pushes one HID keycode (or the "no key" sentinel).
    fn push_key(&mut self, code: u8) -> bool;
}

impl<const N: usize> KeySink for heapless::spsc::Producer<'_, u8, N> {
    fn push_key(&mut self, code: u8) -> bool {
        self.enqueue(code).is_ok()
    }
}

/// States the external indicator can be driven to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Status {
    /// Idle; this node is not the active source.
    Standby,
    /// This node is the selected source.
    Active,
    /// A remote key is currently held.
    KeyPressed,
    /// Unrecoverable startup failure.
    Fault,
}

/// Status indicator (LED, GPIO, log line...).
pub trait Indicator {
    /// Asserts a new indicator state.
    fn set_status(&mut self, status: Status);
}

/// Protocol state, owned by the engine task for the process lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DeviceState {
    logical_address: u8,
    physical_address: u16,
    active_source: u16,
    audio_system_mode: bool,
    menu_active: bool,
    lost_count: u8,
}

impl DeviceState {
    /// The claimed logical address (0x0F while unregistered).
    pub fn logical_address(&self) -> u8 {
        self.logical_address
    }

    /// The physical address (0x0000 while unknown).
    pub fn physical_address(&self) -> u16 {
        self.physical_address
    }

    /// Physical address of the last observed active source.
    pub fn active_source(&self) -> u16 {
        self.active_source
    }

    /// Whether an audio system currently owns the sound path.
    pub fn audio_system_mode(&self) -> bool {
        self.audio_system_mode
    }

    /// Whether the device menu is up.
    pub fn menu_active(&self) -> bool {
        self.menu_active
    }

    /// True when this node is the selected source.
    pub fn selected(&self) -> bool {
        self.physical_address != 0 && self.active_source == self.physical_address
    }
}

/// The CEC protocol engine.
///
/// Construct with [`new`](CecEngine::new) (or
/// [`from_store`](CecEngine::from_store)), run
/// [`start`](CecEngine::start) once the bus exists, then loop over
/// [`poll_once`](CecEngine::poll_once) or hand control to
/// [`run`](CecEngine::run).
pub struct CecEngine<K, I, E>
where
    K: KeySink,
    I: Indicator,
    E: EdidSource,
{
    state: DeviceState,
    config: Config,
    keys: K,
    indicator: I,
    edid: E,
}

impl<K, I, E> fmt::Debug for CecEngine<K, I, E>
where
    K: KeySink,
    I: Indicator,
    E: EdidSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CecEngine")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<K, I, E> CecEngine<K, I, E>
where
    K: KeySink,
    I: Indicator,
    E: EdidSource,
{
    /// Creates an engine from an already loaded configuration.
    pub fn new(config: Config, keys: K, indicator: I, edid: E) -> Self {
        let state = DeviceState {
            logical_address: BROADCAST_ADDR,
            ..DeviceState::default()
        };
        Self {
            state,
            config,
            keys,
            indicator,
            edid,
        }
    }

    /// Loads the configuration and creates the engine. A load failure
    /// is fatal: the indicator is driven to [`Status::Fault`] and the
    /// error propagated; the engine never starts.
    pub fn from_store<S: ConfigStore>(
        store: &mut S,
        keys: K,
        mut indicator: I,
        edid: E,
    ) -> Result<Self, S::Error> {
        match store.load() {
            Ok(config) => Ok(Self::new(config, keys, indicator, edid)),
            Err(e) => {
                indicator.set_status(Status::Fault);
                Err(e)
            }
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Startup sequence: wait out the EDID settle delay, acquire both
    /// addresses, announce the claim, and show the idle indicator.
    pub fn start<B: CecBus, D: DelayNs>(&mut self, bus: &mut B, delay: &mut D) {
        delay.delay_ms(u32::from(self.config.edid_delay_ms));
        self.readdress(bus);
        self.report_physical_address(bus);
        self.indicator.set_status(Status::Standby);
    }

    /// Receive-dispatch loop; never returns. Replies for a frame are
    /// always transmitted before the next frame is dequeued.
    pub fn run<B: CecBus>(&mut self, bus: &mut B) -> ! {
        loop {
            let _ = self.poll_once(bus);
        }
    }

    /// Dequeues and dispatches at most one frame; returns whether one
    /// was handled.
    pub fn poll_once<B: CecBus>(&mut self, bus: &mut B) -> bool {
        match bus.recv() {
            Ok(frame) => {
                self.handle_frame(bus, &frame);
                true
            }
            Err(_) => false,
        }
    }

    /// Dispatches one received frame per the CEC v1.3a mandatory set.
    pub fn handle_frame<B: CecBus>(&mut self, bus: &mut B, frame: &CecFrame) {
        if frame.is_poll() {
            return;
        }
        let Some(raw_op) = frame.opcode() else {
            return;
        };
        let broadcast = frame.is_broadcast();
        let direct = !broadcast && frame.destination() == self.state.logical_address;
        if !direct && !broadcast {
            return;
        }
        let from = frame.initiator();
        let ops = frame.operands();
        let Some(op) = Opcode::from_u8(raw_op) else {
            if direct {
                self.feature_abort(bus, from, raw_op, AbortReason::Unrecognized);
            }
            return;
        };
        if broadcast && !broadcast_handled(op) {
            return;
        }
        match op {
            Opcode::FeatureAbort
            | Opcode::ImageViewOn
            | Opcode::TextViewOn
            | Opcode::SystemAudioModeStatus => {}
            Opcode::Standby => {
                self.set_active_source(0);
                self.indicator.set_status(Status::Standby);
            }
            Opcode::SystemAudioModeRequest => {
                let mode = u8::from(self.state.audio_system_mode);
                self.reply(bus, from, Opcode::SetSystemAudioMode, &[mode]);
            }
            Opcode::GiveAudioStatus => {
                self.reply(bus, from, Opcode::ReportAudioStatus, &[AUDIO_STATUS]);
            }
            Opcode::SetSystemAudioMode => {
                self.state.audio_system_mode = ops.first() == Some(&1);
            }
            Opcode::GiveSystemAudioModeStatus => {
                let mode = u8::from(self.state.audio_system_mode);
                self.reply(bus, from, Opcode::SystemAudioModeStatus, &[mode]);
            }
            Opcode::RoutingChange => {
                if let Some(new) = pa_operand(ops, 2) {
                    self.set_active_source(new);
                    self.readdress(bus);
                    if new != 0 && new == self.state.physical_address {
                        self.announce_active(bus);
                    }
                }
            }
            Opcode::ActiveSource => {
                if let Some(pa) = pa_operand(ops, 0) {
                    self.set_active_source(pa);
                    self.state.lost_count = 0;
                }
            }
            Opcode::ReportPhysicalAddress => {
                // A TV re-announcing itself usually means it rebooted:
                // refresh our addressing and identify ourselves again.
                if from == 0 && broadcast {
                    self.readdress(bus);
                    self.report_physical_address(bus);
                }
            }
            Opcode::RequestActiveSource => {
                self.state.lost_count = self.state.lost_count.saturating_add(1);
                if self.state.physical_address != 0
                    && (self.state.selected() || self.state.lost_count > 2)
                {
                    self.set_active_source(self.state.physical_address);
                    self.announce_active(bus);
                    self.state.lost_count = 0;
                }
            }
            Opcode::SetStreamPath => {
                if let Some(pa) = pa_operand(ops, 0) {
                    if pa != 0 && pa == self.state.physical_address {
                        self.set_active_source(pa);
                        self.announce_active(bus);
                        self.state.menu_active = true;
                        self.reply(bus, from, Opcode::MenuStatus, &[MenuState::Activated as u8]);
                    }
                }
            }
            Opcode::DeviceVendorId => {
                if from == 0 && broadcast {
                    self.broadcast_vendor_id(bus);
                }
            }
            Opcode::GiveDeviceVendorId => self.broadcast_vendor_id(bus),
            Opcode::MenuRequest => {
                match MenuRequestType::from_u8(ops.first().copied().unwrap_or(2)) {
                    MenuRequestType::Activate => self.state.menu_active = true,
                    MenuRequestType::Deactivate => self.state.menu_active = false,
                    MenuRequestType::Query => {}
                }
                let menu = if self.state.menu_active {
                    MenuState::Activated
                } else {
                    MenuState::Deactivated
                };
                self.reply(bus, from, Opcode::MenuStatus, &[menu as u8]);
            }
            Opcode::GiveDevicePowerStatus => {
                let power = if self.state.selected() {
                    PowerStatus::On
                } else {
                    PowerStatus::Standby
                };
                self.reply(bus, from, Opcode::ReportPowerStatus, &[power as u8]);
            }
            Opcode::GetCecVersion => {
                self.reply(bus, from, Opcode::CecVersion, &[CEC_VERSION_1_3A]);
            }
            Opcode::GiveOsdName => self.reply(bus, from, Opcode::SetOsdName, OSD_NAME),
            Opcode::GivePhysicalAddress => self.report_physical_address(bus),
            Opcode::UserControlPressed => {
                if let Some(code) = ops.first() {
                    if let Some(key) = self.config.key_map.get(*code) {
                        if !self.keys.push_key(key) {
                            #[cfg(feature = "log")]
                            log::warn!("key queue full, dropping {key:#04x}");
                        }
                        self.indicator.set_status(Status::KeyPressed);
                    }
                }
            }
            Opcode::UserControlReleased => {
                let _ = self.keys.push_key(HID_NO_KEY);
                let back = if self.state.selected() {
                    Status::Active
                } else {
                    Status::Standby
                };
                self.indicator.set_status(back);
            }
            Opcode::Abort => self.feature_abort(bus, from, raw_op, AbortReason::Refused),
            _ => {
                if direct {
                    self.feature_abort(bus, from, raw_op, AbortReason::Unrecognized);
                }
            }
        }
    }

    /// Re-acquires both addresses: physical (override or EDID), then
    /// logical (override or candidate probing), and programs the
    /// driver's acknowledgment filter.
    fn readdress<B: CecBus>(&mut self, bus: &mut B) {
        self.state.physical_address =
            physical_address(self.config.physical_address, &mut self.edid);
        let la = allocate_logical(
            self.config.device_type,
            self.config.logical_address,
            |cand| bus.address_taken(cand),
        );
        self.state.logical_address = la;
        bus.set_address(la);
        #[cfg(feature = "log")]
        log::debug!(
            "claimed logical address {la:#x}, physical {:#06x}",
            self.state.physical_address
        );
    }

    /// Updates the active source and tracks selection on the indicator.
    fn set_active_source(&mut self, pa: u16) {
        let was = self.state.selected();
        self.state.active_source = pa;
        let now = self.state.selected();
        if now && !was {
            self.indicator.set_status(Status::Active);
        } else if was && !now {
            self.indicator.set_status(Status::Standby);
        }
    }

    /// Image View On to the TV followed by an Active Source broadcast.
    fn announce_active<B: CecBus>(&mut self, bus: &mut B) {
        self.reply(bus, 0x00, Opcode::ImageViewOn, &[]);
        let pa = self.state.physical_address.to_be_bytes();
        self.reply(bus, BROADCAST_ADDR, Opcode::ActiveSource, &pa);
    }

    /// Broadcasts Report Physical Address, withheld while the physical
    /// address is unknown.
    fn report_physical_address<B: CecBus>(&mut self, bus: &mut B) {
        if self.state.physical_address == 0 {
            return;
        }
        let pa = self.state.physical_address.to_be_bytes();
        let operands = [pa[0], pa[1], self.config.device_type.as_u8()];
        self.reply(bus, BROADCAST_ADDR, Opcode::ReportPhysicalAddress, &operands);
    }

    fn broadcast_vendor_id<B: CecBus>(&mut self, bus: &mut B) {
        let operands = [
            (VENDOR_ID >> 16) as u8,
            (VENDOR_ID >> 8) as u8,
            VENDOR_ID as u8,
        ];
        self.reply(bus, BROADCAST_ADDR, Opcode::DeviceVendorId, &operands);
    }

    fn feature_abort<B: CecBus>(&mut self, bus: &mut B, to: u8, opcode: u8, reason: AbortReason) {
        self.reply(bus, to, Opcode::FeatureAbort, &[opcode, reason as u8]);
    }

    /// Builds and sends one frame from this node. Bus errors are not
    /// retried here (the driver already did) and never abort dispatch.
    fn reply<B: CecBus>(&mut self, bus: &mut B, dest: u8, opcode: Opcode, operands: &[u8]) {
        let la = self.state.logical_address;
        match CecFrame::message(la, dest, opcode, operands) {
            Ok(frame) => {
                if let Err(_e) = bus.send(&frame) {
                    #[cfg(feature = "log")]
                    log::warn!("send of {opcode:?} to {dest:#x} failed: {_e}");
                }
            }
            Err(_e) => {
                #[cfg(feature = "log")]
                log::warn!("could not build {opcode:?} frame: {_e}");
            }
        }
    }
}

/// Opcodes the engine also acts on when they arrive as broadcasts;
/// everything else is direct-only per the dispatch table.
fn broadcast_handled(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::Standby
            | Opcode::SetSystemAudioMode
            | Opcode::RoutingChange
            | Opcode::ActiveSource
            | Opcode::ReportPhysicalAddress
            | Opcode::RequestActiveSource
            | Opcode::SetStreamPath
            | Opcode::DeviceVendorId
    )
}

/// Reads a big-endian physical address from operand bytes.
fn pa_operand(ops: &[u8], idx: usize) -> Option<u16> {
    let hi = *ops.get(idx)?;
    let lo = *ops.get(idx + 1)?;
    Some(u16::from_be_bytes([hi, lo]))
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Default)]
    struct MockBus {
        sent: Vec<CecFrame>,
        inbound: VecDeque<CecFrame>,
        addr: Option<u8>,
        taken: Vec<u8>,
    }

    impl CecBus for MockBus {
        fn send(&mut self, frame: &CecFrame) -> Result<(), SendError> {
            if frame.is_poll() {
                return if self.taken.contains(&frame.destination()) {
                    Ok(())
                } else {
                    Err(SendError::NotAcknowledged)
                };
            }
            self.sent.push(frame.clone());
            Ok(())
        }

        fn recv(&mut self) -> nb::Result<CecFrame, Infallible> {
            self.inbound.pop_front().ok_or(nb::Error::WouldBlock)
        }

        fn set_address(&mut self, la: u8) {
            self.addr = Some(la);
        }
    }

    #[derive(Clone, Default)]
    struct VecKeys(Rc<RefCell<Vec<u8>>>);

    impl KeySink for VecKeys {
        fn push_key(&mut self, code: u8) -> bool {
            self.0.borrow_mut().push(code);
            true
        }
    }

    #[derive(Clone, Default)]
    struct MockIndicator(Rc<RefCell<Vec<Status>>>);

    impl Indicator for MockIndicator {
        fn set_status(&mut self, status: Status) {
            self.0.borrow_mut().push(status);
        }
    }

    struct FixedEdid(u16);

    impl EdidSource for FixedEdid {
        fn physical_address(&mut self) -> u16 {
            self.0
        }
    }

    struct Rig {
        engine: CecEngine<VecKeys, MockIndicator, FixedEdid>,
        bus: MockBus,
        keys: VecKeys,
        statuses: MockIndicator,
    }

    /// A started Playback engine at logical address 4, physical 1.0.0.0.
    fn rig() -> Rig {
        let keys = VecKeys::default();
        let statuses = MockIndicator::default();
        let mut engine = CecEngine::new(
            Config::default(),
            keys.clone(),
            statuses.clone(),
            FixedEdid(0x1000),
        );
        let mut bus = MockBus::default();
        engine.start(&mut bus, &mut NoopDelay::new());
        assert_eq!(engine.state().logical_address(), 0x04);
        assert_eq!(engine.state().physical_address(), 0x1000);
        assert_eq!(bus.addr, Some(0x04));
        bus.sent.clear();
        Rig {
            engine,
            bus,
            keys,
            statuses,
        }
    }

    fn feed(rig: &mut Rig, bytes: &[u8]) {
        let frame = CecFrame::from_bytes(bytes).unwrap();
        rig.engine.handle_frame(&mut rig.bus, &frame);
    }

    fn sent_bytes(rig: &Rig) -> Vec<Vec<u8>> {
        rig.bus.sent.iter().map(|f| f.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_startup_announces_physical_address() {
        let keys = VecKeys::default();
        let statuses = MockIndicator::default();
        let mut engine = CecEngine::new(
            Config::default(),
            keys,
            statuses.clone(),
            FixedEdid(0x1000),
        );
        let mut bus = MockBus::default();
        engine.start(&mut bus, &mut NoopDelay::new());
        assert_eq!(
            sent_of(&bus),
            vec![vec![0x4F, 0x84, 0x10, 0x00, 0x04]]
        );
        assert_eq!(*statuses.0.borrow(), vec![Status::Standby]);
    }

    fn sent_of(bus: &MockBus) -> Vec<Vec<u8>> {
        bus.sent.iter().map(|f| f.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_startup_without_edid_withholds_report() {
        let mut engine = CecEngine::new(
            Config::default(),
            VecKeys::default(),
            MockIndicator::default(),
            FixedEdid(0),
        );
        let mut bus = MockBus::default();
        engine.start(&mut bus, &mut NoopDelay::new());
        assert!(bus.sent.is_empty());
        assert_eq!(engine.state().physical_address(), 0);
    }

    #[test]
    fn test_claim_skips_taken_candidates() {
        let mut engine = CecEngine::new(
            Config::default(),
            VecKeys::default(),
            MockIndicator::default(),
            FixedEdid(0x1000),
        );
        let mut bus = MockBus::default();
        bus.taken = vec![0x04, 0x08];
        engine.start(&mut bus, &mut NoopDelay::new());
        assert_eq!(engine.state().logical_address(), 0x0B);
    }

    #[test]
    fn test_exhausted_claim_leaves_node_unregistered() {
        let mut engine = CecEngine::new(
            Config::default(),
            VecKeys::default(),
            MockIndicator::default(),
            FixedEdid(0x1000),
        );
        let mut bus = MockBus::default();
        bus.taken = vec![0x04, 0x08, 0x0B];
        engine.start(&mut bus, &mut NoopDelay::new());
        assert_eq!(engine.state().logical_address(), 0x0F);
        assert_eq!(bus.addr, Some(0x0F));
    }

    #[test]
    fn test_tv_selection_via_set_stream_path() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x86, 0x10, 0x00]);
        assert_eq!(
            sent_bytes(&rig),
            vec![
                vec![0x40, 0x04],
                vec![0x4F, 0x82, 0x10, 0x00],
                vec![0x40, 0x8E, 0x00],
            ]
        );
        assert!(rig.engine.state().menu_active());
        assert!(rig.engine.state().selected());
        assert!(rig.statuses.0.borrow().contains(&Status::Active));
    }

    #[test]
    fn test_set_stream_path_elsewhere_is_ignored() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x86, 0x20, 0x00]);
        assert!(rig.bus.sent.is_empty());
        assert!(!rig.engine.state().menu_active());
    }

    #[test]
    fn test_give_osd_name() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x46]);
        assert_eq!(
            sent_bytes(&rig),
            vec![vec![0x40, 0x47, b'P', b'i', b'c', b'o', b'-', b'C', b'E', b'C']]
        );
    }

    #[test]
    fn test_remote_key_press_and_release() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x44, 0x01]);
        feed(&mut rig, &[0x04, 0x45]);
        assert_eq!(*rig.keys.0.borrow(), vec![0x52, 0x00]);
        let statuses = rig.statuses.0.borrow();
        assert!(statuses.contains(&Status::KeyPressed));
        assert_eq!(*statuses.last().unwrap(), Status::Standby);
    }

    #[test]
    fn test_unmapped_key_is_silent() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x44, 0x60]);
        assert!(rig.keys.0.borrow().is_empty());
        assert!(rig.bus.sent.is_empty());
    }

    #[test]
    fn test_unknown_opcode_gets_feature_abort() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0xC0, 0xAA]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x00, 0xC0, 0x00]]);
    }

    #[test]
    fn test_unknown_broadcast_is_ignored() {
        let mut rig = rig();
        feed(&mut rig, &[0x0F, 0xC0]);
        assert!(rig.bus.sent.is_empty());
    }

    #[test]
    fn test_abort_answered_with_refused() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0xFF]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x00, 0xFF, 0x04]]);
    }

    #[test]
    fn test_vendor_id_broadcast_mirrored() {
        let mut rig = rig();
        feed(&mut rig, &[0x0F, 0x87, 0x00, 0x10, 0xFA]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x4F, 0x87, 0x00, 0x10, 0xFA]]);
    }

    #[test]
    fn test_give_vendor_id_answered_to_broadcast() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x8C]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x4F, 0x87, 0x00, 0x10, 0xFA]]);
    }

    #[test]
    fn test_standby_clears_active_source() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x86, 0x10, 0x00]);
        rig.bus.sent.clear();
        feed(&mut rig, &[0x0F, 0x36]);
        assert_eq!(rig.engine.state().active_source(), 0);
        assert_eq!(*rig.statuses.0.borrow().last().unwrap(), Status::Standby);
        assert!(rig.bus.sent.is_empty());
    }

    #[test]
    fn test_power_status_tracks_selection() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x8F]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x90, 0x01]]);
        rig.bus.sent.clear();
        feed(&mut rig, &[0x04, 0x86, 0x10, 0x00]);
        rig.bus.sent.clear();
        feed(&mut rig, &[0x04, 0x8F]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x90, 0x00]]);
    }

    #[test]
    fn test_cec_version_reply() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x9F]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x9E, 0x04]]);
    }

    #[test]
    fn test_audio_queries() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x70]);
        feed(&mut rig, &[0x04, 0x71]);
        feed(&mut rig, &[0x04, 0x7D]);
        assert_eq!(
            sent_bytes(&rig),
            vec![
                vec![0x40, 0x72, 0x00],
                vec![0x40, 0x7A, 0x32],
                vec![0x40, 0x7E, 0x00],
            ]
        );
        feed(&mut rig, &[0x0F, 0x72, 0x01]);
        assert!(rig.engine.state().audio_system_mode());
        rig.bus.sent.clear();
        feed(&mut rig, &[0x04, 0x7D]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x7E, 0x01]]);
    }

    #[test]
    fn test_menu_request_cycle() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x8D, 0x02]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x8E, 0x01]]);
        rig.bus.sent.clear();
        feed(&mut rig, &[0x04, 0x8D, 0x00]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x8E, 0x00]]);
        assert!(rig.engine.state().menu_active());
        rig.bus.sent.clear();
        feed(&mut rig, &[0x04, 0x8D, 0x01]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x8E, 0x01]]);
        assert!(!rig.engine.state().menu_active());
    }

    #[test]
    fn test_request_active_source_counter() {
        let mut rig = rig();
        feed(&mut rig, &[0x0F, 0x85]);
        feed(&mut rig, &[0x0F, 0x85]);
        assert!(rig.bus.sent.is_empty());
        feed(&mut rig, &[0x0F, 0x85]);
        assert_eq!(
            sent_bytes(&rig),
            vec![vec![0x40, 0x04], vec![0x4F, 0x82, 0x10, 0x00]]
        );
        assert!(rig.engine.state().selected());
    }

    #[test]
    fn test_request_active_source_when_selected() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x86, 0x10, 0x00]);
        rig.bus.sent.clear();
        feed(&mut rig, &[0x0F, 0x85]);
        assert_eq!(
            sent_bytes(&rig),
            vec![vec![0x40, 0x04], vec![0x4F, 0x82, 0x10, 0x00]]
        );
    }

    #[test]
    fn test_active_source_from_peer_deselects() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x86, 0x10, 0x00]);
        assert!(rig.engine.state().selected());
        feed(&mut rig, &[0x8F, 0x82, 0x20, 0x00]);
        assert_eq!(rig.engine.state().active_source(), 0x2000);
        assert!(!rig.engine.state().selected());
        assert_eq!(*rig.statuses.0.borrow().last().unwrap(), Status::Standby);
    }

    #[test]
    fn test_routing_change_to_self_reclaims_and_announces() {
        let mut rig = rig();
        feed(&mut rig, &[0x0F, 0x80, 0x20, 0x00, 0x10, 0x00]);
        assert_eq!(rig.engine.state().logical_address(), 0x04);
        assert_eq!(
            sent_bytes(&rig),
            vec![vec![0x40, 0x04], vec![0x4F, 0x82, 0x10, 0x00]]
        );
    }

    #[test]
    fn test_tv_report_physical_address_mirrored() {
        let mut rig = rig();
        feed(&mut rig, &[0x0F, 0x84, 0x00, 0x00, 0x00]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x4F, 0x84, 0x10, 0x00, 0x04]]);
    }

    #[test]
    fn test_give_physical_address() {
        let mut rig = rig();
        feed(&mut rig, &[0x04, 0x83]);
        assert_eq!(sent_bytes(&rig), vec![vec![0x4F, 0x84, 0x10, 0x00, 0x04]]);
    }

    #[test]
    fn test_poll_frame_is_not_dispatched() {
        let mut rig = rig();
        let frame = CecFrame::poll(0x04);
        rig.engine.handle_frame(&mut rig.bus, &frame);
        assert!(rig.bus.sent.is_empty());
    }

    #[test]
    fn test_poll_once_drains_inbound() {
        let mut rig = rig();
        rig.bus
            .inbound
            .push_back(CecFrame::from_bytes(&[0x04, 0x9F]).unwrap());
        assert!(rig.engine.poll_once(&mut rig.bus));
        assert!(!rig.engine.poll_once(&mut rig.bus));
        assert_eq!(sent_bytes(&rig), vec![vec![0x40, 0x9E, 0x04]]);
    }

    #[test]
    fn test_from_store_failure_faults_indicator() {
        struct BrokenStore;

        impl ConfigStore for BrokenStore {
            type Error = ();

            fn load(&mut self) -> Result<Config, Self::Error> {
                Err(())
            }
        }

        let statuses = MockIndicator::default();
        let result = CecEngine::from_store(
            &mut BrokenStore,
            VecKeys::default(),
            statuses.clone(),
            FixedEdid(0x1000),
        );
        assert!(result.is_err());
        assert_eq!(*statuses.0.borrow(), vec![Status::Fault]);
    }

    #[test]
    fn test_key_events_through_spsc_queue() {
        let mut queue: heapless::spsc::Queue<u8, 16> = heapless::spsc::Queue::new();
        let (producer, mut consumer) = queue.split();
        let mut engine = CecEngine::new(
            Config::default(),
            producer,
            MockIndicator::default(),
            FixedEdid(0x1000),
        );
        let mut bus = MockBus::default();
        engine.start(&mut bus, &mut NoopDelay::new());
        let down = CecFrame::from_bytes(&[0x04, 0x44, 0x01]).unwrap();
        let up = CecFrame::from_bytes(&[0x04, 0x45]).unwrap();
        engine.handle_frame(&mut bus, &down);
        engine.handle_frame(&mut bus, &up);
        assert_eq!(consumer.dequeue(), Some(0x52));
        assert_eq!(consumer.dequeue(), Some(0x00));
        assert_eq!(consumer.dequeue(), None);
    }
}
