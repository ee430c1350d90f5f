//! Output-stage configuration.
//!
//! Plain structs filled in by whatever loads the process configuration;
//! nothing here reads files or arguments.

use std::time::Duration;

use tracing::{info, warn};

use crate::FRAME_SIZE;
use crate::calibrate::SleepCalibration;

/// PCR handling mode.
///
/// The four values mirror the numeric `pcr_mode` process setting. The
/// only behavior split this crate distinguishes is rewrite
/// vs. passthrough: modes 2 and 3 overwrite the PCR field with the
/// corrected value, modes 0 and 1 leave the stream untouched and compute
/// corrections for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PcrMode {
    #[default]
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

impl PcrMode {
    /// Map the raw numeric setting.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(PcrMode::Mode0),
            1 => Some(PcrMode::Mode1),
            2 => Some(PcrMode::Mode2),
            3 => Some(PcrMode::Mode3),
            _ => None,
        }
    }

    /// Whether this mode overwrites PCR fields in the outgoing stream.
    pub fn rewrites(self) -> bool {
        matches!(self, PcrMode::Mode2 | PcrMode::Mode3)
    }
}

/// Configuration for one logical output.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Target output bitrate in bits per second
    pub bitrate: u64,
    /// Per-frame output interval in microseconds. Reduced in place by
    /// [`OutputConfig::apply_calibration`] before the pacer starts.
    pub frame_interval_us: u64,
    /// Measured minimum-sleep overhead in microseconds
    pub sleep_overhead_us: u64,
    /// How often the pacer reports traffic statistics
    pub stats_interval: Duration,
    /// Upper bound on one slot wait before the shutdown flag is re-checked
    pub slot_patience: Duration,
    /// PCR handling mode
    pub pcr_mode: PcrMode,
    /// Emit a debug line for every corrected PCR
    pub debug_pcr: bool,
    /// Suppress periodic statistics lines
    pub quiet: bool,
}

impl OutputConfig {
    /// Configuration for a target bitrate, with the per-frame interval
    /// derived from the frame size.
    pub fn for_bitrate(bitrate: u64) -> Self {
        assert!(bitrate > 0, "output bitrate must be positive");
        Self {
            bitrate,
            frame_interval_us: (FRAME_SIZE as u64 * 8 * 1_000_000) / bitrate,
            sleep_overhead_us: 0,
            stats_interval: Duration::from_millis(1000),
            slot_patience: Duration::from_millis(5),
            pcr_mode: PcrMode::default(),
            debug_pcr: false,
            quiet: false,
        }
    }

    /// Fold a sleep calibration into the pacing interval.
    ///
    /// The measured overhead is subtracted from the per-frame interval; a
    /// result that would go negative is clamped to zero, which means the
    /// host cannot sleep precisely enough to pace individual frames and
    /// the closed-loop correction will carry the full load.
    pub fn apply_calibration(&mut self, calibration: &SleepCalibration) {
        self.sleep_overhead_us = calibration.overhead_us;
        if self.frame_interval_us >= calibration.overhead_us {
            self.frame_interval_us -= calibration.overhead_us;
            info!(
                overhead_us = calibration.overhead_us,
                frame_interval_us = self.frame_interval_us,
                "applied sleep calibration"
            );
        } else {
            warn!(
                overhead_us = calibration.overhead_us,
                frame_interval_us = self.frame_interval_us,
                "sleep overhead exceeds the frame interval; check that the \
                 kernel provides high-resolution timers"
            );
            self.frame_interval_us = 0;
        }
    }

    /// Nominal wall-clock duration of one fully drained slot at the
    /// target bitrate.
    pub fn slot_duration(&self, slot_capacity: usize) -> Duration {
        Duration::from_micros(slot_capacity as u64 * 8 * 1_000_000 / self.bitrate)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::for_bitrate(4_000_000)
    }
}
