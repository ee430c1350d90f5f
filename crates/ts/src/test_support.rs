//! Packet builders for tests.

use crate::packet::{PACKET_SIZE, PID_NULL, SYNC_BYTE};
use crate::pcr::Pcr;

/// A payload-only packet with the given PID, payload stuffed with 0xFF.
pub fn plain_packet(pid: u16) -> [u8; PACKET_SIZE] {
    let mut packet = [0xFFu8; PACKET_SIZE];
    packet[0] = SYNC_BYTE;
    packet[1] = ((pid >> 8) & 0x1F) as u8;
    packet[2] = (pid & 0xFF) as u8;
    packet[3] = 0x10; // payload only, continuity 0
    packet
}

/// A NULL (stuffing) packet.
pub fn null_packet() -> [u8; PACKET_SIZE] {
    plain_packet(PID_NULL)
}

/// A packet on `pid` whose adaptation field carries the given 27 MHz PCR.
pub fn pcr_packet(pid: u16, pcr: u64) -> [u8; PACKET_SIZE] {
    let mut packet = plain_packet(pid);
    packet[3] = 0x20; // adaptation field only, continuity 0
    packet[4] = 183; // adaptation field fills the packet
    packet[5] = 0x10; // PCR flag
    Pcr::from_27mhz(pcr).encode(&mut packet[6..12]);
    packet
}
