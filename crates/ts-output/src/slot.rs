//! Buffer slots and the producer/pacer handoff.
//!
//! A [`SlotRing`] holds a fixed number of fixed-capacity slots (two by
//! default, preserving the classic double buffer). Each slot carries a
//! tri-state status word that is the sole synchronization signal between
//! the producer filling slots and the pacer draining them:
//!
//! ```text
//! Empty --(producer)--> Full --(pacer)--> Emptying --(pacer)--> Empty
//! ```
//!
//! The status is an atomic with acquire/release ordering; the frame bytes
//! live behind a mutex that is only ever locked by the side the status
//! currently assigns the slot to, so it is uncontended by protocol. The
//! pacer waits on a condvar with a bounded patience instead of spinning,
//! re-checking the shutdown flag on every wakeup.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::{Condvar, Mutex};

use crate::{FRAME_SIZE, OutputError, ShutdownFlag};

/// Handoff state of one buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotStatus {
    /// Available to the producer
    Empty = 0,
    /// Filled, waiting for the pacer
    Full = 1,
    /// Claimed exclusively by the pacer
    Emptying = 2,
}

impl SlotStatus {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => SlotStatus::Empty,
            1 => SlotStatus::Full,
            _ => SlotStatus::Emptying,
        }
    }
}

struct SlotData {
    buf: BytesMut,
    consumed: usize,
}

struct Slot {
    status: AtomicU8,
    data: Mutex<SlotData>,
}

impl Slot {
    fn new(capacity: usize) -> Self {
        Self {
            status: AtomicU8::new(SlotStatus::Empty as u8),
            data: Mutex::new(SlotData {
                buf: BytesMut::with_capacity(capacity),
                consumed: 0,
            }),
        }
    }
}

/// Ring of buffer slots shared between one producer and one pacer.
pub struct SlotRing {
    slots: Box<[Slot]>,
    capacity: usize,
    handoff: Mutex<()>,
    filled: Condvar,
}

impl SlotRing {
    /// Create a ring of `depth` slots of `capacity` bytes each.
    ///
    /// The capacity must be a whole number of frames; slots never change
    /// size or address afterwards.
    pub fn new(depth: usize, capacity: usize) -> crate::Result<Arc<Self>> {
        assert!(depth >= 2, "slot ring needs at least two slots");
        if capacity == 0 || capacity % FRAME_SIZE != 0 {
            return Err(OutputError::BadSlotCapacity(capacity));
        }
        let slots = (0..depth).map(|_| Slot::new(capacity)).collect();
        Ok(Arc::new(Self {
            slots,
            capacity,
            handoff: Mutex::new(()),
            filled: Condvar::new(),
        }))
    }

    /// Classic double buffer: a two-slot ring.
    pub fn double_buffer(capacity: usize) -> crate::Result<Arc<Self>> {
        Self::new(2, capacity)
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Slot capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn status(&self, index: usize) -> SlotStatus {
        SlotStatus::from_raw(self.slots[index].status.load(Ordering::Acquire))
    }

    /// Producer-side handle starting at slot 0.
    pub fn producer(self: &Arc<Self>) -> SlotProducer {
        SlotProducer {
            ring: Arc::clone(self),
            next: 0,
        }
    }

    /// Producer side: fill an Empty slot and publish it as Full.
    ///
    /// Returns false without touching the buffer when the slot is not
    /// Empty (the pacer is behind); the producer retries or drops.
    fn try_fill(&self, index: usize, block: &[u8]) -> bool {
        assert!(
            !block.is_empty() && block.len() <= self.capacity && block.len() % FRAME_SIZE == 0,
            "block must be 1..=capacity whole frames"
        );
        let slot = &self.slots[index];
        if slot.status.load(Ordering::Acquire) != SlotStatus::Empty as u8 {
            return false;
        }
        {
            let mut data = slot.data.lock();
            data.buf.clear();
            data.buf.extend_from_slice(block);
            data.consumed = 0;
        }
        slot.status
            .store(SlotStatus::Full as u8, Ordering::Release);
        let _guard = self.handoff.lock();
        self.filled.notify_one();
        true
    }

    /// Pacer side: block until the slot is Full, waking at least every
    /// `patience` to re-check the shutdown flag.
    ///
    /// Returns false, with no state transition, when shutdown was
    /// requested.
    pub fn wait_full(&self, index: usize, shutdown: &ShutdownFlag, patience: Duration) -> bool {
        let mut guard = self.handoff.lock();
        loop {
            if shutdown.is_requested() {
                return false;
            }
            if self.status(index) == SlotStatus::Full {
                return true;
            }
            self.filled.wait_for(&mut guard, patience);
        }
    }

    /// Pacer side: claim a Full slot for exclusive draining.
    pub fn claim(&self, index: usize) -> bool {
        self.slots[index]
            .status
            .compare_exchange(
                SlotStatus::Full as u8,
                SlotStatus::Emptying as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Pacer side: run `f` over the next undrained frame of a claimed
    /// slot and advance the drain offset. Returns false when the slot is
    /// fully drained.
    ///
    /// The closure runs under the slot lock; callers copy the frame out
    /// and do their blocking writes after it returns.
    pub fn with_next_frame<F>(&self, index: usize, f: F) -> bool
    where
        F: FnOnce(&mut [u8]),
    {
        let mut data = self.slots[index].data.lock();
        let start = data.consumed;
        if start >= data.buf.len() {
            return false;
        }
        f(&mut data.buf[start..start + FRAME_SIZE]);
        data.consumed = start + FRAME_SIZE;
        true
    }

    /// Pacer side: hand a drained (or abandoned) slot back to the
    /// producer.
    pub fn reset(&self, index: usize) {
        let slot = &self.slots[index];
        {
            let mut data = slot.data.lock();
            data.buf.clear();
            data.consumed = 0;
        }
        slot.status
            .store(SlotStatus::Empty as u8, Ordering::Release);
    }
}

/// Producer-side handle that fills ring slots in order.
pub struct SlotProducer {
    ring: Arc<SlotRing>,
    next: usize,
}

impl SlotProducer {
    /// Try to publish one block into the next slot. Returns false when
    /// the slot is still owned by the pacer; the cursor does not advance.
    pub fn push(&mut self, block: &[u8]) -> bool {
        if self.ring.try_fill(self.next, block) {
            self.next = (self.next + 1) % self.ring.depth();
            true
        } else {
            false
        }
    }
}
