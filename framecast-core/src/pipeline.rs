//! Producer/consumer seams and the cadenced frame pump.
//!
//! The protocol layer treats frames as opaque bytes; how they are
//! captured, compressed, or displayed lives behind these traits.
//! Cadence is enforced here, on the producer side — the send loop
//! itself is not rate-limited.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{trace, warn};

use crate::error::CastError;
use crate::sender::SenderHandle;

/// Supplies encoded frame bytes on demand.
///
/// `quality` is the current resolution/quality multiplier in
/// `[0.1, 1.0]`; sources are expected to scale their output with it.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self, quality: f32) -> Result<Bytes, CastError>;
}

/// Accepts delivered frame payloads on the logical main thread.
#[async_trait]
pub trait FrameSink: Send {
    async fn on_frame(&mut self, frame: Bytes);
}

/// Explicit "no consumer" sink; discards every frame.
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl FrameSink for NoopSink {
    async fn on_frame(&mut self, _frame: Bytes) {}
}

/// Drive `source` at `target_fps`, offering each frame to the
/// sender's latest-wins slot. Runs until the handle's cancellation
/// token fires.
///
/// Source failures are logged and skipped — one bad capture must not
/// stall the stream.
pub async fn run_pump<S: FrameSource>(mut source: S, handle: &SenderHandle, target_fps: f32) {
    let period = Duration::from_secs_f32(1.0 / target_fps.max(1.0));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let cancel = handle.cancellation_token();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let quality = handle.quality();
        if quality <= 0.0 {
            continue;
        }

        match source.next_frame(quality).await {
            Ok(frame) if frame.is_empty() => continue,
            Ok(frame) => {
                let accepted = handle.offer_frame(frame);
                trace!(accepted, quality, "frame offered");
            }
            Err(e) => warn!(error = %e, "frame source failed"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SenderConfig;
    use crate::sender::SenderService;

    struct CountingSource {
        produced: u32,
    }

    #[async_trait]
    impl FrameSource for CountingSource {
        async fn next_frame(&mut self, quality: f32) -> Result<Bytes, CastError> {
            assert!(quality > 0.0);
            self.produced += 1;
            Ok(Bytes::from(vec![(self.produced % 251) as u8; 200]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pump_stops_on_cancellation() {
        // No receiver anywhere: frames are simply dropped by the
        // disconnected handle, and the pump must still wind down.
        let (_service, handle) = SenderService::new(SenderConfig::default());

        let pump_handle = handle.clone();
        let pump = tokio::spawn(async move {
            run_pump(CountingSource { produced: 0 }, &pump_handle, 30.0).await;
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown();
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn noop_sink_accepts_frames() {
        let mut sink = NoopSink;
        sink.on_frame(Bytes::from_static(b"whatever")).await;
    }
}
