//! Per-PID PCR correction.
//!
//! Every PCR-bearing packet is restamped to answer one question: what PCR
//! would this packet carry if bytes had left the sender at exactly the
//! target bitrate since the last PCR on the same PID? The corrector keeps
//! one small state record per PID that has shown a PCR; a PCR that fails
//! to increase (clock wraparound or a stream restart upstream) reseeds
//! that record instead of producing a bogus correction, so restamping
//! resumes cleanly on the next PCR.
//!
//! Whether the computed value is written back into the packet depends on
//! the configured [`PcrMode`]; in passthrough modes the correction is
//! still computed so diagnostics and state stay meaningful.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use ts::{PACKET_SIZE, PCR_HZ, PID_NULL, packet};

use crate::config::PcrMode;

/// Correction state for one PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidState {
    /// Last PCR value emitted (or adopted) for this PID
    pub last_corrected: u64,
    /// Last PCR value observed in the incoming stream
    pub last_original: u64,
    /// Absolute byte offset of the packet that carried `last_original`
    pub byte_offset: u64,
}

/// Per-frame accounting produced while correcting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Bytes of NULL (stuffing) packets seen in the frame
    pub padding_bytes: u64,
}

/// Stateful PCR corrector for one output stream.
///
/// State is keyed sparsely by PID; a PID with no entry has not shown a
/// PCR yet. The state deliberately survives transport reconnects so
/// correction continues seamlessly across them.
pub struct PcrCorrector {
    mode: PcrMode,
    bitrate: u64,
    debug: bool,
    pids: FxHashMap<u16, PidState>,
}

impl PcrCorrector {
    pub fn new(mode: PcrMode, bitrate: u64, debug: bool) -> Self {
        assert!(bitrate > 0, "target bitrate must be positive");
        Self {
            mode,
            bitrate,
            debug,
            pids: FxHashMap::default(),
        }
    }

    /// Correct all PCRs inside one frame, in place.
    ///
    /// `frame_offset` is the absolute byte offset of the frame within the
    /// stream's lifetime traffic.
    pub fn process_frame(&mut self, frame: &mut [u8], frame_offset: u64) -> ts::Result<FrameReport> {
        debug_assert_eq!(frame.len() % PACKET_SIZE, 0);
        let mut report = FrameReport::default();

        for start in (0..frame.len()).step_by(PACKET_SIZE) {
            let pkt = &mut frame[start..start + PACKET_SIZE];
            if packet::pid(pkt) == PID_NULL {
                report.padding_bytes += PACKET_SIZE as u64;
            }
            if let Some(original) = packet::pcr(pkt) {
                self.observe(pkt, original, frame_offset + start as u64)?;
            }
        }

        Ok(report)
    }

    fn observe(&mut self, pkt: &mut [u8], original: u64, offset: u64) -> ts::Result<()> {
        let pid = packet::pid(pkt);
        let state = match self.pids.entry(pid) {
            Entry::Vacant(vacant) => {
                // first PCR on this PID: adopt it, emit nothing
                vacant.insert(PidState {
                    last_corrected: original,
                    last_original: original,
                    byte_offset: offset,
                });
                return Ok(());
            }
            Entry::Occupied(occupied) => occupied.into_mut(),
        };

        if original > state.last_original {
            let delta_bytes = offset - state.byte_offset;
            let corrected = state.last_corrected
                + ((delta_bytes as f64 * 8.0 * PCR_HZ as f64) / self.bitrate as f64).round()
                    as u64;

            if self.mode.rewrites() {
                packet::set_pcr(pkt, corrected)?;
            }
            if self.debug {
                let pcr_delta = original - state.last_original;
                let corrected_delta = corrected - state.last_corrected;
                let rate = |delta: u64| {
                    if delta > 0 {
                        (delta_bytes as f64 * 8.0 * PCR_HZ as f64 / delta as f64) as u64
                    } else {
                        0
                    }
                };
                debug!(
                    pid = format_args!("{pid:#06x}"),
                    original,
                    corrected,
                    pcr_diff = original as i64 - corrected as i64,
                    rate_original = rate(pcr_delta),
                    rate_corrected = rate(corrected_delta),
                    bytes_since_last = delta_bytes,
                    "pcr corrected"
                );
            }

            *state = PidState {
                last_corrected: corrected,
                last_original: original,
                byte_offset: offset,
            };
        } else {
            // wraparound or discontinuity: restart correction from here
            trace!(
                pid = format_args!("{pid:#06x}"),
                original,
                last_original = state.last_original,
                "pcr went backwards, reseeding"
            );
            *state = PidState {
                last_corrected: original,
                last_original: original,
                byte_offset: offset,
            };
        }

        Ok(())
    }

    /// Correction state for one PID, if it has shown a PCR.
    pub fn pid_state(&self, pid: u16) -> Option<&PidState> {
        self.pids.get(&pid)
    }

    /// Number of PIDs currently tracked.
    pub fn tracked_pids(&self) -> usize {
        self.pids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FRAME_SIZE;
    use ts::test_support::{null_packet, pcr_packet, plain_packet};

    const BITRATE: u64 = 4_000_000;

    fn frame_with(packets: &[[u8; PACKET_SIZE]]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_SIZE);
        for pkt in packets {
            frame.extend_from_slice(pkt);
        }
        while frame.len() < FRAME_SIZE {
            frame.extend_from_slice(&plain_packet(0x300));
        }
        frame
    }

    #[test]
    fn test_first_pcr_seeds_without_emitting() {
        let mut corrector = PcrCorrector::new(PcrMode::Mode2, BITRATE, false);
        let mut frame = frame_with(&[pcr_packet(0x101, 5_000)]);
        corrector.process_frame(&mut frame, 0).unwrap();

        assert_eq!(
            corrector.pid_state(0x101),
            Some(&PidState {
                last_corrected: 5_000,
                last_original: 5_000,
                byte_offset: 0,
            })
        );
        // seeding never rewrites
        assert_eq!(ts::pcr(&frame[..PACKET_SIZE]), Some(5_000));
    }

    #[test]
    fn test_delta_formula() {
        let mut corrector = PcrCorrector::new(PcrMode::Mode2, BITRATE, false);
        let mut first = frame_with(&[pcr_packet(0x101, 1_000)]);
        corrector.process_frame(&mut first, 0).unwrap();

        let mut second = frame_with(&[pcr_packet(0x101, 1_000_000)]);
        corrector.process_frame(&mut second, FRAME_SIZE as u64).unwrap();

        // 1316 bytes * 8 * 27e6 / 4e6 = 71064 ticks since the last PCR
        let expected = 1_000 + 71_064;
        assert_eq!(ts::pcr(&second[..PACKET_SIZE]), Some(expected));
        let state = corrector.pid_state(0x101).unwrap();
        assert_eq!(state.last_corrected, expected);
        assert_eq!(state.last_original, 1_000_000);
        assert_eq!(state.byte_offset, FRAME_SIZE as u64);
    }

    #[test]
    fn test_passthrough_modes_compute_but_do_not_rewrite() {
        for mode in [PcrMode::Mode0, PcrMode::Mode1] {
            let mut corrector = PcrCorrector::new(mode, BITRATE, false);
            let mut first = frame_with(&[pcr_packet(0x101, 1_000)]);
            corrector.process_frame(&mut first, 0).unwrap();

            let mut second = frame_with(&[pcr_packet(0x101, 1_000_000)]);
            corrector.process_frame(&mut second, FRAME_SIZE as u64).unwrap();

            // stream untouched, state still advanced with the correction
            assert_eq!(ts::pcr(&second[..PACKET_SIZE]), Some(1_000_000));
            assert_eq!(
                corrector.pid_state(0x101).unwrap().last_corrected,
                1_000 + 71_064
            );
        }
    }

    #[test]
    fn test_backwards_pcr_reseeds() {
        let mut corrector = PcrCorrector::new(PcrMode::Mode2, BITRATE, false);
        let mut first = frame_with(&[pcr_packet(0x101, 900_000)]);
        corrector.process_frame(&mut first, 0).unwrap();

        // decreasing PCR must never go through the delta formula
        let mut second = frame_with(&[pcr_packet(0x101, 1_234)]);
        corrector.process_frame(&mut second, FRAME_SIZE as u64).unwrap();

        assert_eq!(ts::pcr(&second[..PACKET_SIZE]), Some(1_234));
        assert_eq!(
            corrector.pid_state(0x101),
            Some(&PidState {
                last_corrected: 1_234,
                last_original: 1_234,
                byte_offset: FRAME_SIZE as u64,
            })
        );

        // and correction resumes cleanly afterwards
        let mut third = frame_with(&[pcr_packet(0x101, 2_000_000)]);
        corrector
            .process_frame(&mut third, 2 * FRAME_SIZE as u64)
            .unwrap();
        assert_eq!(ts::pcr(&third[..PACKET_SIZE]), Some(1_234 + 71_064));
    }

    #[test]
    fn test_equal_pcr_counts_as_discontinuity() {
        let mut corrector = PcrCorrector::new(PcrMode::Mode2, BITRATE, false);
        let mut first = frame_with(&[pcr_packet(0x101, 7_777)]);
        corrector.process_frame(&mut first, 0).unwrap();

        let mut second = frame_with(&[pcr_packet(0x101, 7_777)]);
        corrector.process_frame(&mut second, FRAME_SIZE as u64).unwrap();

        assert_eq!(
            corrector.pid_state(0x101).unwrap().byte_offset,
            FRAME_SIZE as u64
        );
    }

    #[test]
    fn test_pids_tracked_independently() {
        let mut corrector = PcrCorrector::new(PcrMode::Mode2, BITRATE, false);
        let mut frame = frame_with(&[pcr_packet(0x101, 1_000), pcr_packet(0x202, 500_000)]);
        corrector.process_frame(&mut frame, 0).unwrap();

        assert_eq!(corrector.tracked_pids(), 2);
        assert_eq!(corrector.pid_state(0x101).unwrap().last_original, 1_000);
        assert_eq!(corrector.pid_state(0x202).unwrap().last_original, 500_000);
        assert_eq!(corrector.pid_state(0x202).unwrap().byte_offset, PACKET_SIZE as u64);
    }

    #[test]
    fn test_padding_counted_per_null_packet() {
        let mut corrector = PcrCorrector::new(PcrMode::Mode0, BITRATE, false);
        let mut frame = frame_with(&[null_packet(), pcr_packet(0x101, 42), null_packet()]);
        let report = corrector.process_frame(&mut frame, 0).unwrap();
        assert_eq!(report.padding_bytes, 2 * PACKET_SIZE as u64);
    }

    #[test]
    fn test_debug_mode_does_not_change_result() {
        let mut loud = PcrCorrector::new(PcrMode::Mode2, BITRATE, true);
        let mut quiet = PcrCorrector::new(PcrMode::Mode2, BITRATE, false);
        for corrector in [&mut loud, &mut quiet] {
            let mut first = frame_with(&[pcr_packet(0x101, 1_000)]);
            corrector.process_frame(&mut first, 0).unwrap();
            let mut second = frame_with(&[pcr_packet(0x101, 1_000_000)]);
            corrector.process_frame(&mut second, FRAME_SIZE as u64).unwrap();
        }
        assert_eq!(loud.pid_state(0x101), quiet.pid_state(0x101));
    }
}
