//! CEC domain types shared by the frame codec and the protocol engine.
//!
//! Each enum mirrors one table of CEC v1.3a with its wire encoding as
//! the discriminant, so conversion to and from operand bytes is a cast
//! in one direction and a `match` in the other. Only the opcodes and
//! operand values this device sends or reacts to are represented;
//! anything else stays a raw byte and falls through to the engine's
//! Feature Abort catch-all.

/// CEC opcodes handled or emitted by this device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    /// Rejection or decline of a directed command.
    FeatureAbort = 0x00,
    /// Source wants the TV out of standby.
    ImageViewOn = 0x04,
    /// Text-display variant of [`ImageViewOn`](Opcode::ImageViewOn).
    TextViewOn = 0x0D,
    /// Switch to standby; may be directed or broadcast.
    Standby = 0x36,
    /// TV asks whether an amplifier should take over audio.
    SystemAudioModeRequest = 0x70,
    /// Query for volume and mute state.
    GiveAudioStatus = 0x71,
    /// Announce or set the system-audio state.
    SetSystemAudioMode = 0x72,
    /// Volume and mute reply.
    ReportAudioStatus = 0x7A,
    /// Query for the system-audio state.
    GiveSystemAudioModeStatus = 0x7D,
    /// System-audio state reply.
    SystemAudioModeStatus = 0x7E,
    /// A switch rerouted the active path.
    RoutingChange = 0x80,
    /// Broadcast claim of being the video source.
    ActiveSource = 0x82,
    /// Query for the physical address.
    GivePhysicalAddress = 0x83,
    /// Broadcast of a node's physical address and device type.
    ReportPhysicalAddress = 0x84,
    /// TV asks the current source to identify itself.
    RequestActiveSource = 0x85,
    /// TV directs the stream to a physical address.
    SetStreamPath = 0x86,
    /// Broadcast of a node's IEEE OUI.
    DeviceVendorId = 0x87,
    /// Query for the vendor OUI.
    GiveDeviceVendorId = 0x8C,
    /// Menu activate/deactivate/query request.
    MenuRequest = 0x8D,
    /// Menu state reply.
    MenuStatus = 0x8E,
    /// Query for the power state.
    GiveDevicePowerStatus = 0x8F,
    /// Power state reply.
    ReportPowerStatus = 0x90,
    /// Remote control key pressed, operand is the UI command code.
    UserControlPressed = 0x44,
    /// Remote control key released.
    UserControlReleased = 0x45,
    /// Query for the on-screen display name.
    GiveOsdName = 0x46,
    /// OSD name reply.
    SetOsdName = 0x47,
    /// CEC version reply.
    CecVersion = 0x9E,
    /// Query for the CEC version.
    GetCecVersion = 0x9F,
    /// Ping testing whether the follower handles opcodes at all.
    Abort = 0xFF,
}

impl Opcode {
    /// Looks up a known opcode. Unknown values return `None` and are
    /// answered with a Feature Abort when directly addressed.
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x00 => Self::FeatureAbort,
            0x04 => Self::ImageViewOn,
            0x0D => Self::TextViewOn,
            0x36 => Self::Standby,
            0x70 => Self::SystemAudioModeRequest,
            0x71 => Self::GiveAudioStatus,
            0x72 => Self::SetSystemAudioMode,
            0x7A => Self::ReportAudioStatus,
            0x7D => Self::GiveSystemAudioModeStatus,
            0x7E => Self::SystemAudioModeStatus,
            0x80 => Self::RoutingChange,
            0x82 => Self::ActiveSource,
            0x83 => Self::GivePhysicalAddress,
            0x84 => Self::ReportPhysicalAddress,
            0x85 => Self::RequestActiveSource,
            0x86 => Self::SetStreamPath,
            0x87 => Self::DeviceVendorId,
            0x8C => Self::GiveDeviceVendorId,
            0x8D => Self::MenuRequest,
            0x8E => Self::MenuStatus,
            0x8F => Self::GiveDevicePowerStatus,
            0x90 => Self::ReportPowerStatus,
            0x44 => Self::UserControlPressed,
            0x45 => Self::UserControlReleased,
            0x46 => Self::GiveOsdName,
            0x47 => Self::SetOsdName,
            0x9E => Self::CecVersion,
            0x9F => Self::GetCecVersion,
            0xFF => Self::Abort,
            _ => return None,
        })
    }

    /// The wire encoding.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// CEC device types, indexing the logical-address candidate tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum DeviceType {
    /// Television.
    Tv = 0,
    /// Recording device.
    Recording = 1,
    /// Reserved; never claims a real address.
    Reserved = 2,
    /// Tuner.
    Tuner = 3,
    /// Playback device. The default for this bridge.
    #[default]
    Playback = 4,
    /// Audio system.
    Audio = 5,
}

impl DeviceType {
    /// Decodes a configured device type, defaulting out-of-range values
    /// to [`Playback`](DeviceType::Playback).
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Tv,
            1 => Self::Recording,
            2 => Self::Reserved,
            3 => Self::Tuner,
            5 => Self::Audio,
            _ => Self::Playback,
        }
    }

    /// The wire encoding, as carried in Report Physical Address.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Feature Abort reason codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum AbortReason {
    /// Opcode not recognized.
    Unrecognized = 0,
    /// Not in a mode to respond.
    IncorrectMode = 1,
    /// Cannot provide the source.
    NoSource = 2,
    /// Invalid operand.
    Invalid = 3,
    /// Refused.
    Refused = 4,
    /// Unable to determine.
    Undetermined = 5,
}

/// Power states for Report Power Status.
///
/// The engine replies [`On`](PowerStatus::On) exactly when the active
/// source is this device's physical address; the 0/1 wire values below
/// are the CEC encoding, not an accident of the comparison.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerStatus {
    /// Powered on and sourcing video.
    On = 0,
    /// Standby.
    Standby = 1,
}

/// Menu Request operand values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum MenuRequestType {
    /// Enter the device menu.
    Activate = 0,
    /// Leave the device menu.
    Deactivate = 1,
    /// Report the state without changing it.
    Query = 2,
}

impl MenuRequestType {
    /// Decodes a Menu Request operand; anything out of range is treated
    /// as a query.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Activate,
            1 => Self::Deactivate,
            _ => Self::Query,
        }
    }
}

/// Menu Status operand values (note the inverted sense vs. bools).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum MenuState {
    /// Menu is up.
    Activated = 0,
    /// Menu is down.
    Deactivated = 1,
}
