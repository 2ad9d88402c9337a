//! Triple-buffered frame channel decoupling the transport's delivery
//! thread from the application tick.
//!
//! Three same-sized slots: the producer owns the back buffer (inside
//! `FrameSink`), the consumer owns the front buffer (held by the
//! session), and only the pending slot lives behind the lock. Each side
//! exchanges its own buffer with pending under the lock, so neither ever
//! touches the other's memory and neither ever blocks on the other's
//! work. At most one frame of backlog is kept: producing faster than the
//! consumer polls silently drops older frames (latest-wins).

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Slot {
    pending: Vec<u8>,
    frame_len: usize,
    updated: bool,
    open: bool,
}

/// Consumer/owner half of one stream's channel.
#[derive(Default)]
pub struct FrameChannel {
    shared: Arc<Mutex<Slot>>,
}

/// Producer half, handed to the transport's frame-delivery thread.
pub struct FrameSink {
    back: Vec<u8>,
    shared: Arc<Mutex<Slot>>,
}

fn lock(shared: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // A poisoned slot only means a producer panicked mid-swap; the
    // buffers themselves are always whole Vecs.
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl FrameChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the channel for frames of `frame_len` bytes. No-op if already
    /// allocated.
    pub fn allocate(&self, frame_len: usize) {
        let mut slot = lock(&self.shared);
        if slot.open {
            return;
        }
        slot.pending = vec![0; frame_len];
        slot.frame_len = frame_len;
        slot.updated = false;
        slot.open = true;
    }

    /// Release the buffers. Only valid once the owning stream is stopped;
    /// subsequent pushes from a stale sink are dropped.
    pub fn clear(&self) {
        let mut slot = lock(&self.shared);
        slot.pending = Vec::new();
        slot.frame_len = 0;
        slot.updated = false;
        slot.open = false;
    }

    pub fn is_allocated(&self) -> bool {
        lock(&self.shared).open
    }

    /// Create the producer half. One sink per stream: the channel assumes
    /// a single producer thread.
    pub fn sink(&self) -> FrameSink {
        FrameSink {
            back: Vec::new(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// If an unconsumed frame is pending, exchange it with `front` and
    /// return true. `front` is then valid until the next call.
    pub fn consume_into(&self, front: &mut Vec<u8>) -> bool {
        let mut slot = lock(&self.shared);
        if !slot.open || !slot.updated {
            return false;
        }
        mem::swap(front, &mut slot.pending);
        slot.updated = false;
        true
    }
}

impl FrameSink {
    /// Deposit one frame. The copy into the back buffer happens outside
    /// the lock; only the slot exchange is serialized. Returns false when
    /// the frame was dropped (channel closed or size mismatch).
    pub fn push(&mut self, data: &[u8]) -> bool {
        self.back.clear();
        self.back.extend_from_slice(data);

        let mut slot = lock(&self.shared);
        if !slot.open {
            log::trace!("frame dropped: channel closed");
            return false;
        }
        if self.back.len() != slot.frame_len {
            log::warn!(
                "frame dropped: got {} bytes, expected {}",
                self.back.len(),
                slot.frame_len
            );
            return false;
        }
        mem::swap(&mut self.back, &mut slot.pending);
        slot.updated = true;
        true
    }
}
