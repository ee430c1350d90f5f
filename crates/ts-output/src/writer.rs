//! Frame emission and traffic accounting.
//!
//! The primary transport sits behind the [`Transport`] trait: the output
//! stage only needs a blocking write plus teardown/reconnect hooks, and
//! the connection bookkeeping (addresses, sockets, backoff) stays with
//! the component that owns it. A broken transport surfaces as an ordinary
//! error value in [`WriteOutcome`], never as a process signal, so the
//! pacer can drive reconnection deterministically.
//!
//! An optional tee sink duplicates every frame to a local file. What a
//! tee failure means is a configuration choice ([`TeeFailurePolicy`]),
//! not a hardcoded abort.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::OutputError;

/// Blocking duplex transport for the primary output.
///
/// `write` is expected to emit the whole frame, looping internally on
/// partial writes; the returned count is the bytes accepted.
pub trait Transport: Send {
    fn write(&mut self, frame: &[u8]) -> io::Result<usize>;

    /// Re-establish the connection after `shutdown`.
    fn reconnect(&mut self) -> io::Result<()>;

    /// Tear the connection down.
    fn shutdown(&mut self);
}

/// What to do when the tee sink fails a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeeFailurePolicy {
    /// Drop the tee and keep the output running
    Disable,
    /// Retry the write up to `attempts` extra times, then drop the tee
    Retry { attempts: u32 },
    /// End the pacer run with an error
    Abort,
}

enum TeeWrite {
    Ok,
    GiveUp(io::Error),
    Fatal(io::Error),
}

/// Secondary file sink receiving a copy of every frame.
pub struct TeeSink {
    file: File,
    path: PathBuf,
    policy: TeeFailurePolicy,
}

impl TeeSink {
    pub fn new(file: File, path: impl Into<PathBuf>, policy: TeeFailurePolicy) -> Self {
        Self {
            file,
            path: path.into(),
            policy,
        }
    }

    /// Create (truncating) a tee file at `path`.
    pub fn create(path: impl AsRef<Path>, policy: TeeFailurePolicy) -> io::Result<Self> {
        let path = path.as_ref();
        Ok(Self::new(File::create(path)?, path, policy))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &[u8]) -> TeeWrite {
        match self.policy {
            TeeFailurePolicy::Abort => match self.file.write_all(frame) {
                Ok(()) => TeeWrite::Ok,
                Err(e) => TeeWrite::Fatal(e),
            },
            TeeFailurePolicy::Disable => match self.file.write_all(frame) {
                Ok(()) => TeeWrite::Ok,
                Err(e) => TeeWrite::GiveUp(e),
            },
            TeeFailurePolicy::Retry { attempts } => {
                let mut error = match self.file.write_all(frame) {
                    Ok(()) => return TeeWrite::Ok,
                    Err(e) => e,
                };
                for attempt in 1..=attempts {
                    match self.file.write_all(frame) {
                        Ok(()) => {
                            debug!(path = %self.path.display(), attempt, "tee write recovered");
                            return TeeWrite::Ok;
                        }
                        Err(e) => error = e,
                    }
                }
                TeeWrite::GiveUp(error)
            }
        }
    }
}

/// Result of writing one frame to the primary transport.
#[derive(Debug)]
pub enum WriteOutcome {
    /// Frame accepted; count of bytes written
    Written(usize),
    /// The transport failed; the pacer finishes the slot and reconnects
    TransportLost(io::Error),
}

/// Read-only copy of the traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficSnapshot {
    /// Lifetime bytes accepted by the transport
    pub total_bytes: u64,
    /// Bytes accepted during the current statistics window
    pub window_bytes: u64,
    /// NULL-packet bytes seen during the current statistics window
    pub window_padding: u64,
}

// Single-writer by design: only the pacer thread mutates these, and the
// outside world only ever sees TrafficSnapshot copies.
#[derive(Debug, Default)]
struct TrafficCounters {
    total: u64,
    window: u64,
    window_padding: u64,
}

/// Writes frames to the primary transport and the optional tee sink,
/// keeping the per-output traffic counters.
pub struct FrameWriter {
    transport: Box<dyn Transport>,
    tee: Option<TeeSink>,
    counters: TrafficCounters,
}

impl FrameWriter {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            tee: None,
            counters: TrafficCounters::default(),
        }
    }

    pub fn with_tee(mut self, tee: TeeSink) -> Self {
        self.tee = Some(tee);
        self
    }

    pub fn tee_active(&self) -> bool {
        self.tee.is_some()
    }

    /// Emit one frame.
    ///
    /// Transport failures come back inside the `Ok` variant; the only
    /// `Err` this returns is a tee failure under the Abort policy.
    pub fn write_frame(&mut self, frame: &[u8]) -> crate::Result<WriteOutcome> {
        let outcome = match self.transport.write(frame) {
            Ok(written) => {
                self.counters.total += written as u64;
                self.counters.window += written as u64;
                WriteOutcome::Written(written)
            }
            Err(e) => WriteOutcome::TransportLost(e),
        };

        if let Some(mut tee) = self.tee.take() {
            match tee.write_frame(frame) {
                TeeWrite::Ok => self.tee = Some(tee),
                TeeWrite::GiveUp(error) => {
                    warn!(
                        path = %tee.path.display(),
                        %error,
                        "tee sink disabled after write failure"
                    );
                }
                TeeWrite::Fatal(source) => {
                    return Err(OutputError::Tee {
                        path: tee.path,
                        source,
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Absolute byte offset the next frame starts at within the stream's
    /// lifetime traffic.
    pub fn lifetime_bytes(&self) -> u64 {
        self.counters.total
    }

    pub(crate) fn record_padding(&mut self, bytes: u64) {
        self.counters.window_padding += bytes;
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        TrafficSnapshot {
            total_bytes: self.counters.total,
            window_bytes: self.counters.window,
            window_padding: self.counters.window_padding,
        }
    }

    /// Snapshot and reset the statistics window.
    pub(crate) fn take_window(&mut self) -> TrafficSnapshot {
        let snapshot = self.snapshot();
        self.counters.window = 0;
        self.counters.window_padding = 0;
        snapshot
    }

    /// Tear down and re-establish the primary transport.
    pub fn reconnect(&mut self) -> io::Result<()> {
        self.transport.shutdown();
        self.transport.reconnect()
    }
}
