//! Logical- and physical-address acquisition.
//!
//! A CEC node claims a 4-bit logical address by probing the candidates
//! of its device type with one-byte polling frames: an acknowledged
//! poll means the address is taken, an unacknowledged one is claimed.
//! Candidate lists are right-padded with 0x0F ("give up"); a node left
//! at 0x0F is unregistered and answers no direct traffic.
//!
//! The 16-bit physical address describes the node's position in the
//! HDMI topology and normally comes from the downstream monitor's EDID
//! (the CEC Vendor-Specific Data Block), read over DDC by an external
//! collaborator behind [`EdidSource`]. 0x0000 means unknown; the
//! engine then withholds Report Physical Address.

use crate::consts::BROADCAST_ADDR;
use crate::types::DeviceType;

/// Provider of the EDID-derived physical address.
pub trait EdidSource {
    /// Returns the physical address from the monitor's EDID VSDB, or
    /// 0x0000 when it could not be determined.
    fn physical_address(&mut self) -> u16;
}

/// Logical-address candidates for a device type, probed in order.
pub fn candidates(device_type: DeviceType) -> [u8; 4] {
    match device_type {
        DeviceType::Tv => [0, 0, 0, 0],
        DeviceType::Recording => [1, 2, 9, BROADCAST_ADDR],
        DeviceType::Reserved => [BROADCAST_ADDR; 4],
        DeviceType::Tuner => [3, 6, 7, BROADCAST_ADDR],
        DeviceType::Playback => [4, 8, 11, BROADCAST_ADDR],
        DeviceType::Audio => [5, 5, 5, 5],
    }
}

/// Picks a logical address.
///
/// A configured address other than 0x00 or 0x0F is used verbatim.
/// Otherwise the device type's candidates are probed in order;
/// `probe` returns whether the polled address acknowledged (is taken).
/// Exhaustion leaves the node unregistered at 0x0F.
pub fn allocate_logical(
    device_type: DeviceType,
    configured: u8,
    mut probe: impl FnMut(u8) -> bool,
) -> u8 {
    if configured != 0x00 && configured != BROADCAST_ADDR {
        return configured & 0x0F;
    }
    for candidate in candidates(device_type) {
        if candidate == BROADCAST_ADDR {
            break;
        }
        if !probe(candidate) {
            return candidate;
        }
    }
    BROADCAST_ADDR
}

/// Picks a physical address: a non-zero override wins, otherwise the
/// EDID collaborator is asked.
pub fn physical_address(configured: u16, edid: &mut impl EdidSource) -> u16 {
    if configured != 0 {
        configured
    } else {
        edid.physical_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEdid(u16);

    impl EdidSource for FixedEdid {
        fn physical_address(&mut self) -> u16 {
            self.0
        }
    }

    #[test]
    fn test_override_used_verbatim() {
        let la = allocate_logical(DeviceType::Playback, 0x08, |_| true);
        assert_eq!(la, 0x08);
    }

    #[test]
    fn test_first_free_candidate_claimed() {
        let la = allocate_logical(DeviceType::Playback, 0x0F, |cand| cand == 4);
        assert_eq!(la, 8);
    }

    #[test]
    fn test_fallthrough_to_unregistered() {
        let mut probed = Vec::new();
        let la = allocate_logical(DeviceType::Playback, 0x00, |cand| {
            probed.push(cand);
            true
        });
        assert_eq!(la, BROADCAST_ADDR);
        assert_eq!(probed, &[4, 8, 11]);
    }

    #[test]
    fn test_tuner_candidates() {
        let la = allocate_logical(DeviceType::Tuner, 0x0F, |cand| cand == 3 || cand == 6);
        assert_eq!(la, 7);
    }

    #[test]
    fn test_reserved_type_never_registers() {
        let la = allocate_logical(DeviceType::Reserved, 0x0F, |_| false);
        assert_eq!(la, BROADCAST_ADDR);
    }

    #[test]
    fn test_physical_address_override_wins() {
        assert_eq!(physical_address(0x2000, &mut FixedEdid(0x1000)), 0x2000);
    }

    #[test]
    fn test_physical_address_from_edid() {
        assert_eq!(physical_address(0, &mut FixedEdid(0x1000)), 0x1000);
        assert_eq!(physical_address(0, &mut FixedEdid(0)), 0);
    }
}
