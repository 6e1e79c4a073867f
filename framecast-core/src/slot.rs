//! Latest-wins buffer for the pending outbound frame.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;

/// Single-slot outbound buffer.
///
/// Holds at most one frame. A new `offer` overwrites any unconsumed
/// previous value instead of queuing, so the sender never builds a
/// backlog — exactly one frame can be in flight and one pending.
/// One writer (the producer side) and one reader (the send loop);
/// `take` reads and clears atomically.
#[derive(Debug, Default)]
pub struct FrameSlot {
    cell: Mutex<Option<Bytes>>,
    notify: Notify,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a frame in the slot, replacing any pending one.
    pub fn offer(&self, frame: Bytes) {
        *self.cell() = Some(frame);
        self.notify.notify_one();
    }

    /// Remove and return the pending frame, if any.
    pub fn take(&self) -> Option<Bytes> {
        self.cell().take()
    }

    /// Drop the pending frame without sending it.
    pub fn clear(&self) {
        *self.cell() = None;
    }

    /// Wait until a frame is available and take it.
    pub async fn recv(&self) -> Bytes {
        loop {
            if let Some(frame) = self.take() {
                return frame;
            }
            self.notify.notified().await;
        }
    }

    fn cell(&self) -> MutexGuard<'_, Option<Bytes>> {
        // The critical sections cannot panic, so a poisoned lock still
        // holds a consistent value.
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_empties_the_slot() {
        let slot = FrameSlot::new();
        slot.offer(Bytes::from_static(b"frame"));
        assert_eq!(slot.take().unwrap(), Bytes::from_static(b"frame"));
        assert!(slot.take().is_none());
    }

    #[test]
    fn latest_offer_wins() {
        let slot = FrameSlot::new();
        slot.offer(Bytes::from_static(b"frame-a"));
        slot.offer(Bytes::from_static(b"frame-b"));
        assert_eq!(slot.take().unwrap(), Bytes::from_static(b"frame-b"));
        assert!(slot.take().is_none());
    }

    #[test]
    fn clear_drops_pending_frame() {
        let slot = FrameSlot::new();
        slot.offer(Bytes::from_static(b"frame"));
        slot.clear();
        assert!(slot.take().is_none());
    }

    #[tokio::test]
    async fn recv_returns_frame_offered_before_waiting() {
        let slot = FrameSlot::new();
        slot.offer(Bytes::from_static(b"early"));
        assert_eq!(slot.recv().await, Bytes::from_static(b"early"));
    }

    #[tokio::test]
    async fn recv_wakes_on_offer() {
        let slot = std::sync::Arc::new(FrameSlot::new());
        let waiter = {
            let slot = std::sync::Arc::clone(&slot);
            tokio::spawn(async move { slot.recv().await })
        };
        tokio::task::yield_now().await;
        slot.offer(Bytes::from_static(b"late"));
        assert_eq!(waiter.await.unwrap(), Bytes::from_static(b"late"));
    }
}
