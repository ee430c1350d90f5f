//! The output pacing loop.
//!
//! One pacer drains one slot ring onto one transport. For every frame it
//! corrects PCRs in place, emits the frame, and sleeps an adaptively
//! chosen interval so the achieved bitrate converges on the target. A
//! fixed per-frame sleep would drift below target by the cost of the
//! sleep call itself; the loop instead compares the wall time actually
//! spent against the ideal schedule and sleeps only the shortfall.
//!
//! Write failures on the transport are recoverable: the pacer finishes
//! the slot, tears the transport down and reconnects, keeping the PCR
//! correction state so restamping continues seamlessly. Shutdown is
//! cooperative and observed at every suspend point.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::OutputConfig;
use crate::pcr::{FrameReport, PcrCorrector};
use crate::slot::SlotRing;
use crate::writer::{FrameWriter, TrafficSnapshot, WriteOutcome};
use crate::{FRAME_SIZE, ShutdownFlag};

/// Drives one paced output until shutdown.
pub struct OutputPacer {
    config: OutputConfig,
    ring: Arc<SlotRing>,
    corrector: PcrCorrector,
    writer: FrameWriter,
    shutdown: ShutdownFlag,
    scratch: Vec<u8>,
}

impl OutputPacer {
    pub fn new(config: OutputConfig, ring: Arc<SlotRing>, writer: FrameWriter) -> Self {
        let corrector = PcrCorrector::new(config.pcr_mode, config.bitrate, config.debug_pcr);
        Self {
            config,
            ring,
            corrector,
            writer,
            shutdown: ShutdownFlag::new(),
            scratch: vec![0u8; FRAME_SIZE],
        }
    }

    /// Shared flag for requesting shutdown from another thread.
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    pub fn corrector(&self) -> &PcrCorrector {
        &self.corrector
    }

    pub fn traffic(&self) -> TrafficSnapshot {
        self.writer.snapshot()
    }

    /// Run until shutdown is requested.
    ///
    /// Returns early only on faults that cannot be paced around: a failed
    /// transport reconnect, or a tee failure under the Abort policy.
    pub fn run(&mut self) -> crate::Result<()> {
        let depth = self.ring.depth();
        let slot_duration = self.config.slot_duration(self.ring.capacity());
        let mut active = 0usize;
        let mut last_stats = Instant::now();

        info!(
            bitrate = self.config.bitrate,
            frame_interval_us = self.config.frame_interval_us,
            sleep_overhead_us = self.config.sleep_overhead_us,
            slots = depth,
            "output pacer running"
        );

        'run: loop {
            if !self.ring.wait_full(active, &self.shutdown, self.config.slot_patience) {
                break 'run;
            }
            // single consumer: the claim cannot race, but verify anyway
            if !self.ring.claim(active) {
                continue;
            }

            if last_stats.elapsed() >= self.config.stats_interval {
                last_stats = Instant::now();
                self.report_stats();
            }

            let drain_started = Instant::now();
            let mut last_mark = drain_started;
            let mut frames_written: u64 = 0;
            let mut lost: Option<io::Error> = None;

            loop {
                if self.shutdown.is_requested() {
                    // hand the half-drained slot back so nothing is left
                    // stuck in Emptying
                    self.ring.reset(active);
                    break 'run;
                }
                if !self.pull_frame(active)? {
                    break;
                }

                match self.writer.write_frame(&self.scratch)? {
                    WriteOutcome::Written(_) => {}
                    WriteOutcome::TransportLost(e) => {
                        lost.get_or_insert(e);
                    }
                }

                let sleep_us = self.next_sleep_us(drain_started, last_mark, frames_written);
                if sleep_us > 0 {
                    thread::sleep(Duration::from_micros(sleep_us));
                }
                last_mark = Instant::now();
                frames_written += 1;
            }

            // hold the slot cadence: successive slots should start on a
            // stable schedule unless we are already behind
            let drained_in = drain_started.elapsed();
            if drained_in < slot_duration {
                thread::sleep(slot_duration - drained_in);
            }

            self.ring.reset(active);
            active = (active + 1) % depth;

            if let Some(error) = lost.take() {
                warn!(%error, "transport write failed, reconnecting");
                self.writer
                    .reconnect()
                    .map_err(crate::OutputError::Reconnect)?;
                info!("transport reconnected, pcr correction state retained");
            }
        }

        self.shutdown.request();
        info!("output pacer stopped");
        Ok(())
    }

    /// Correct and copy the next frame of the claimed slot into the
    /// scratch buffer. Returns false when the slot is drained.
    fn pull_frame(&mut self, active: usize) -> crate::Result<bool> {
        let frame_offset = self.writer.lifetime_bytes();
        let corrector = &mut self.corrector;
        let scratch = &mut self.scratch;
        let mut processed: ts::Result<FrameReport> = Ok(FrameReport::default());

        let pulled = self.ring.with_next_frame(active, |frame| {
            processed = corrector.process_frame(frame, frame_offset);
            scratch.copy_from_slice(frame);
        });
        if !pulled {
            return Ok(false);
        }

        let report = processed?;
        self.writer.record_padding(report.padding_bytes);
        Ok(true)
    }

    /// Closed-loop pacing: compare the wall time actually spent against
    /// the ideal schedule (frames x (interval + overhead)) and sleep the
    /// shortfall, skipping the sleep entirely once the loop runs behind.
    fn next_sleep_us(&self, drain_started: Instant, last_mark: Instant, frames_written: u64) -> u64 {
        let interval = self.config.frame_interval_us as i64;
        let overhead = self.config.sleep_overhead_us as i64;
        if frames_written == 0 {
            return interval.max(0) as u64;
        }

        let elapsed = last_mark.duration_since(drain_started).as_micros() as i64;
        let ideal = frames_written as i64 * (interval + overhead);
        let lag = ideal - elapsed;
        if lag > interval - overhead {
            (lag - overhead).max(1) as u64
        } else {
            0
        }
    }

    fn report_stats(&mut self) {
        let window = self.writer.take_window();
        if self.config.quiet {
            return;
        }
        let kbps = (window.window_bytes * 8) as f64 / 1000.0;
        let padding_pct = if window.window_bytes > 0 {
            window.window_padding as f64 / window.window_bytes as f64 * 100.0
        } else {
            0.0
        };
        info!(
            padding_pct = format_args!("{padding_pct:.2}"),
            mbps = format_args!("{:.2}", kbps / 1000.0),
            kbps = format_args!("{kbps:.2}"),
            window_bytes = window.window_bytes,
            "output traffic"
        );
    }
}
