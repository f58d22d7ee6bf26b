//! Device configuration, loaded once at startup.
//!
//! The configuration lives in an external non-volatile store (flash,
//! EEPROM, a CLI-edited settings block) behind the [`ConfigStore`]
//! trait. Loading happens exactly once before the engine starts; a
//! load failure is fatal and drives the indicator to its fault state
//! instead of starting the engine.

use crate::keymap::KeyMap;
use crate::types::DeviceType;

/// Startup configuration for the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// CEC device type, selecting the logical-address candidates.
    pub device_type: DeviceType,
    /// Logical-address override; 0x00 or 0x0F requests auto-allocation.
    pub logical_address: u8,
    /// Physical-address override; 0x0000 requests the EDID lookup.
    pub physical_address: u16,
    /// Settle time before the first EDID read, in milliseconds.
    pub edid_delay_ms: u16,
    /// CEC user-control to HID keycode table.
    pub key_map: KeyMap,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Playback,
            logical_address: 0x0F,
            physical_address: 0x0000,
            edid_delay_ms: 1_000,
            key_map: KeyMap::default(),
        }
    }
}

/// External configuration store.
pub trait ConfigStore {
    /// Load failure cause; fatal to engine startup.
    type Error;

    /// Reads the configuration. Called once, before the engine starts.
    fn load(&mut self) -> Result<Config, Self::Error>;
}
