use thiserror::Error;

/// Errors raised by packet accessors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TsError {
    /// Buffer is not exactly one transport packet long
    #[error("invalid packet size: {0} bytes (expected 188)")]
    InvalidPacketSize(usize),

    /// First byte is not the 0x47 sync byte
    #[error("invalid sync byte: {0:#04x}")]
    InvalidSyncByte(u8),

    /// Write-back requested on a packet that carries no PCR field
    #[error("packet has no PCR field")]
    NoPcrField,
}
