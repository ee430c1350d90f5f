//! One-shot sleep calibration.
//!
//! The pacing loop sleeps between frames with the minimum sleep primitive,
//! whose real cost (timer slack, scheduler entry/exit) dwarfs the nominal
//! request on most hosts. Before pacing starts, a short-lived thread times
//! a burst of minimum sleeps and reports the per-call overhead so the
//! per-frame interval can be reduced by it. The measurement must be joined
//! before the pacer reads the interval; [`SleepCalibrator::spawn`] returns
//! the handle to make that explicit.
//!
//! Progress is reported as `info!` events; deployments that want a quiet
//! calibration filter them at the subscriber, there is no separate quiet
//! flag here.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::info;

/// Result of a calibration run.
#[derive(Debug, Clone, Copy)]
pub struct SleepCalibration {
    /// Per-sleep overhead in microseconds
    pub overhead_us: u64,
    /// Wall time the whole measurement loop took
    pub total: Duration,
    /// Number of sleeps performed
    pub iterations: u32,
}

/// Measures the real overhead of the minimum sleep primitive.
#[derive(Debug, Clone)]
pub struct SleepCalibrator {
    /// Number of sleeps to time
    pub iterations: u32,
    /// Nominal per-sleep target
    pub nap: Duration,
}

impl Default for SleepCalibrator {
    fn default() -> Self {
        Self {
            iterations: 3000,
            nap: Duration::from_nanos(100),
        }
    }
}

impl SleepCalibrator {
    /// Run the measurement on the current thread.
    pub fn measure(&self) -> SleepCalibration {
        info!(
            iterations = self.iterations,
            nap_ns = self.nap.as_nanos() as u64,
            "calibrating sleep overhead"
        );

        let started = Instant::now();
        for _ in 0..self.iterations {
            thread::sleep(self.nap);
        }
        let total = started.elapsed();

        let overhead_us = overhead_from(total, self.iterations);
        info!(
            total_us = total.as_micros() as u64,
            overhead_us, "sleep calibration finished"
        );

        SleepCalibration {
            overhead_us,
            total,
            iterations: self.iterations,
        }
    }

    /// Run the measurement on its own thread.
    ///
    /// The caller joins the handle and feeds the result through
    /// [`crate::OutputConfig::apply_calibration`] before constructing the
    /// pacer; the pacer never observes a half-published interval.
    pub fn spawn(self) -> io::Result<JoinHandle<SleepCalibration>> {
        thread::Builder::new()
            .name("sleep-calibrate".into())
            .spawn(move || self.measure())
    }
}

/// Per-sleep overhead in microseconds from a measured loop total.
///
/// The divisor's factor of 10 reconciles the 100 ns nominal sleep target
/// against microsecond-resolution timing.
fn overhead_from(total: Duration, iterations: u32) -> u64 {
    (total.as_micros() as u64).saturating_sub(1) / (iterations as u64 * 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overhead_formula() {
        // 50 us per sleep over 3000 sleeps reports 5 us of usable overhead
        assert_eq!(overhead_from(Duration::from_micros(150_001), 3000), 5);
    }

    #[test]
    fn test_overhead_zero_total() {
        assert_eq!(overhead_from(Duration::ZERO, 3000), 0);
    }

    #[test]
    fn test_measure_reports_progress() {
        use std::io::{self, Write};
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone, Default)]
        struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

        impl Write for CaptureWriter {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        impl<'a> MakeWriter<'a> for CaptureWriter {
            type Writer = CaptureWriter;

            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let capture = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();

        let calibration = tracing::subscriber::with_default(subscriber, || {
            SleepCalibrator {
                iterations: 5,
                nap: Duration::from_nanos(100),
            }
            .measure()
        });

        let log = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("calibrating sleep overhead"));
        assert!(log.contains("sleep calibration finished"));
        assert!(log.contains(&format!("overhead_us={}", calibration.overhead_us)));
    }

    #[test]
    fn test_spawn_and_join() {
        let calibrator = SleepCalibrator {
            iterations: 10,
            nap: Duration::from_nanos(100),
        };
        let calibration = calibrator.clone().spawn().unwrap().join().unwrap();
        assert_eq!(calibration.iterations, 10);
        assert!(calibration.total > Duration::ZERO);
    }
}
