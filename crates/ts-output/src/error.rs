use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the output stage.
///
/// Transport write failures are deliberately NOT represented here: they are
/// recoverable and travel through [`crate::writer::WriteOutcome`] so the
/// pacer can drive reconnection without unwinding. Only faults that end the
/// pacer run become an `OutputError`.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport reconnect failed: {0}")]
    Reconnect(#[source] std::io::Error),

    #[error("tee sink failed ({path}): {source}")]
    Tee {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("packet error: {0}")]
    Packet(#[from] ts::TsError),

    #[error("slot capacity {0} is not a whole number of frames")]
    BadSlotCapacity(usize),
}
