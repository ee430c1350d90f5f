//! In-place accessors for MPEG-2 Transport Stream packets
//!
//! This crate provides field accessors that operate directly on fixed-size
//! 188-byte packet buffers: PID extraction, PCR presence/read/write and the
//! split base/extension PCR representation. It carries no parser state and
//! never copies packet data, which makes it suitable for hot output paths
//! that restamp packets inside pre-assembled stream buffers.

pub mod error;
pub mod packet;
pub mod pcr;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::TsError;
pub use packet::{
    PACKET_SIZE, PID_NULL, PID_PAT, SYNC_BYTE, has_adaptation_field, has_pcr, pcr, pid, set_pcr,
};
pub use pcr::{PCR_HZ, Pcr};

/// Result type for TS packet operations
pub type Result<T> = std::result::Result<T, TsError>;
