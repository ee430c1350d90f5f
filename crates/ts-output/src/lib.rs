//! # Paced MPEG-TS output stage
//!
//! This crate is the real-time tail of a transport-stream redistribution
//! pipeline: a producer hands it pre-assembled stream buffers, and the
//! output pacer drains them onto a transport at a precisely held bitrate
//! while restamping the Program Clock References carried in the stream so
//! downstream decoders see a clock consistent with the new transmission
//! timing.
//!
//! Components:
//!
//! - [`SleepCalibrator`] — one-shot measurement of the host's minimum
//!   sleep overhead, folded into the per-frame pacing interval.
//! - [`SlotRing`] — ring of fixed-capacity buffer slots with a tri-state
//!   handoff between the external producer and the pacer.
//! - [`PcrCorrector`] — per-PID PCR restamping with wraparound and
//!   discontinuity handling.
//! - [`FrameWriter`] — frame emission to the primary [`Transport`] and an
//!   optional tee file, with traffic accounting.
//! - [`OutputPacer`] — the driving loop tying the above together with
//!   closed-loop drift correction and periodic statistics.
//!
//! ## Runtime model
//!
//! The pacer and the calibrator are plain OS threads; pacing needs
//! microsecond sleep granularity that an async timer wheel cannot offer.
//! Producer/pacer synchronization happens exclusively through the per-slot
//! status word plus a condvar wakeup — no other mutable state is shared.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod calibrate;
pub mod config;
pub mod error;
pub mod pacer;
pub mod pcr;
pub mod slot;
pub mod writer;

pub use calibrate::{SleepCalibration, SleepCalibrator};
pub use config::{OutputConfig, PcrMode};
pub use error::OutputError;
pub use pacer::OutputPacer;
pub use pcr::{FrameReport, PcrCorrector, PidState};
pub use slot::{SlotProducer, SlotRing, SlotStatus};
pub use writer::{
    FrameWriter, TeeFailurePolicy, TeeSink, TrafficSnapshot, Transport, WriteOutcome,
};

/// Size of one output frame: seven transport packets written and paced as
/// a single unit.
pub const FRAME_SIZE: usize = 7 * ts::PACKET_SIZE;

/// Result type for output-stage operations
pub type Result<T> = std::result::Result<T, OutputError>;

/// Cooperative shutdown signal shared by the pacer, its producer, and
/// whoever supervises them. Checked at every suspend point; there is no
/// hard preemption.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
