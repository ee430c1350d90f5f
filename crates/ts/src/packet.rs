//! Field accessors over one fixed-size transport packet buffer.
//!
//! All functions expect a full 188-byte packet. The read accessors are
//! deliberately infallible (the output hot path walks packets that were
//! validated when the stream buffer was assembled); the write accessor
//! validates before touching the buffer.

use crate::error::TsError;
use crate::pcr::Pcr;

/// Fixed transport packet size in bytes
pub const PACKET_SIZE: usize = 188;

/// Transport packet sync byte (always 0x47)
pub const SYNC_BYTE: u8 = 0x47;

/// PAT PID (always 0x0000)
pub const PID_PAT: u16 = 0x0000;

/// NULL (stuffing) PID (always 0x1FFF)
pub const PID_NULL: u16 = 0x1FFF;

// header(4) + adaptation field length byte + adaptation field flags byte
const PCR_OFFSET: usize = 6;

/// Extract the 13-bit PID.
#[inline]
pub fn pid(packet: &[u8]) -> u16 {
    debug_assert_eq!(packet.len(), PACKET_SIZE);
    ((packet[1] as u16 & 0x1F) << 8) | packet[2] as u16
}

/// Whether the adaptation field control bits announce an adaptation field.
#[inline]
pub fn has_adaptation_field(packet: &[u8]) -> bool {
    debug_assert_eq!(packet.len(), PACKET_SIZE);
    (packet[3] & 0x20) != 0
}

/// Whether the packet carries a PCR field.
///
/// Requires an adaptation field long enough for the flags byte plus the
/// 6 PCR bytes, with the PCR flag set.
#[inline]
pub fn has_pcr(packet: &[u8]) -> bool {
    has_adaptation_field(packet) && packet[4] >= 7 && (packet[5] & 0x10) != 0
}

/// Read the full 42-bit PCR value at 27 MHz resolution.
#[inline]
pub fn pcr(packet: &[u8]) -> Option<u64> {
    if !has_pcr(packet) {
        return None;
    }
    Pcr::parse(&packet[PCR_OFFSET..PCR_OFFSET + 6]).map(|p| p.as_27mhz())
}

/// Overwrite the packet's PCR field with a 27 MHz clock value.
pub fn set_pcr(packet: &mut [u8], value: u64) -> crate::Result<()> {
    if packet.len() != PACKET_SIZE {
        return Err(TsError::InvalidPacketSize(packet.len()));
    }
    if packet[0] != SYNC_BYTE {
        return Err(TsError::InvalidSyncByte(packet[0]));
    }
    if !has_pcr(packet) {
        return Err(TsError::NoPcrField);
    }
    Pcr::from_27mhz(value).encode(&mut packet[PCR_OFFSET..PCR_OFFSET + 6]);
    Ok(())
}
