//! Producer-side streaming endpoint.
//!
//! [`SenderService::run`] owns the connection lifecycle: while
//! disconnected it retries on a fixed interval; while connected it
//! takes the latest pending frame from the [`FrameSlot`], writes
//! header + payload + inter-send interval, then reads back the
//! receiver's smoothed-delay feedback. A separate control tick feeds
//! that delay into the [`QualityController`] and publishes the
//! adjusted quality for the frame producer to pick up.
//!
//! Any I/O error drops the connection and the pending frame; the
//! retry loop is the sole recovery mechanism. Errors never terminate
//! the service.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::SenderConfig;
use crate::control::QualityController;
use crate::error::CastError;
use crate::network::StreamConnection;
use crate::slot::FrameSlot;
use crate::state::ConnectionPhase;

// ── SenderHandle ─────────────────────────────────────────────────

/// Cloneable handle for feeding frames to and observing a running
/// [`SenderService`].
#[derive(Debug, Clone)]
pub struct SenderHandle {
    slot: Arc<FrameSlot>,
    phase: watch::Receiver<ConnectionPhase>,
    delay: watch::Receiver<f32>,
    quality: watch::Receiver<f32>,
    cancel: CancellationToken,
}

impl SenderHandle {
    /// Offer a frame for transmission, overwriting any pending one
    /// (latest-wins). Frames offered while disconnected are dropped;
    /// returns whether the frame was accepted.
    pub fn offer_frame(&self, frame: Bytes) -> bool {
        if !self.phase.borrow().is_connected() {
            return false;
        }
        self.slot.offer(frame);
        true
    }

    /// Whether the link to the receiver is currently up.
    pub fn is_connected(&self) -> bool {
        self.phase.borrow().is_connected()
    }

    /// Current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase.borrow().clone()
    }

    /// Most recent smoothed delay reported by the receiver (seconds).
    pub fn stream_delay(&self) -> f32 {
        *self.delay.borrow()
    }

    /// Current quality/resolution multiplier.
    pub fn quality(&self) -> f32 {
        *self.quality.borrow()
    }

    pub fn phase_watch(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.clone()
    }

    pub fn delay_watch(&self) -> watch::Receiver<f32> {
        self.delay.clone()
    }

    pub fn quality_watch(&self) -> watch::Receiver<f32> {
        self.quality.clone()
    }

    /// Token observed by every sender-side loop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal the service (and any pump driving it) to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── SenderService ────────────────────────────────────────────────

/// Producer-side endpoint service.
pub struct SenderService {
    config: SenderConfig,
    slot: Arc<FrameSlot>,
    controller: QualityController,
    phase_tx: watch::Sender<ConnectionPhase>,
    delay_tx: watch::Sender<f32>,
    quality_tx: watch::Sender<f32>,
    cancel: CancellationToken,
}

impl SenderService {
    /// Create the service plus its handle.
    pub fn new(config: SenderConfig) -> (Self, SenderHandle) {
        let controller = QualityController::new(
            config.initial_quality,
            config.quality_step,
            config.delay_threshold,
            config.quality_bounds,
        );

        let slot = Arc::new(FrameSlot::new());
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::default());
        let (delay_tx, delay_rx) = watch::channel(0.0f32);
        let (quality_tx, quality_rx) = watch::channel(controller.quality());
        let cancel = CancellationToken::new();

        let handle = SenderHandle {
            slot: Arc::clone(&slot),
            phase: phase_rx,
            delay: delay_rx,
            quality: quality_rx,
            cancel: cancel.clone(),
        };

        let service = Self {
            config,
            slot,
            controller,
            phase_tx,
            delay_tx,
            quality_tx,
            cancel,
        };

        (service, handle)
    }

    /// Run until the cancellation token fires.
    pub async fn run(mut self) -> Result<(), CastError> {
        info!(target = %self.config.target, "sender service starting");

        let mut conn: Option<StreamConnection> = None;
        let mut phase = ConnectionPhase::default();
        let mut last_send: Option<Instant> = None;
        let mut last_delay = 0.0f32;

        let mut control = tokio::time::interval(self.config.control_interval);
        control.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if conn.is_none() {
                self.set_phase(&mut phase, ConnectionPhase::begin_connect);
                let attempt =
                    StreamConnection::connect(self.config.target, self.config.connect_timeout);
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    attempted = attempt => match attempted {
                        Ok(c) => {
                            info!(peer = %c.peer_addr(), "connected to receiver");
                            self.set_phase(&mut phase, ConnectionPhase::established);
                            conn = Some(c);
                            last_send = None;
                        }
                        Err(e) => {
                            debug!(error = %e, "connect attempt failed");
                            self.set_phase(&mut phase, ConnectionPhase::attempt_failed);
                            tokio::select! {
                                _ = self.cancel.cancelled() => break,
                                _ = tokio::time::sleep(self.config.retry_interval) => {}
                            }
                        }
                    }
                }
                continue;
            }
            let Some(link) = conn.as_mut() else {
                continue;
            };

            let mut link_failed = false;
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                frame = self.slot.recv() => {
                    let now = Instant::now();
                    let interval = match last_send {
                        Some(t) => now.duration_since(t).as_secs_f32(),
                        None => 1.0 / self.config.target_fps.max(1.0),
                    };

                    let exchange = async {
                        link.send_frame(&frame, interval).await?;
                        link.recv_feedback().await
                    };
                    let outcome = tokio::select! {
                        // Shutdown must not wait out a stalled peer;
                        // dropping the connection unblocks the link.
                        _ = self.cancel.cancelled() => break,
                        outcome = exchange => outcome,
                    };

                    match outcome {
                        Ok(delay) => {
                            last_send = Some(now);
                            if delay.is_finite() && delay >= 0.0 {
                                last_delay = delay;
                                let _ = self.delay_tx.send(delay);
                            }
                            trace!(len = frame.len(), interval, delay, "frame sent");
                        }
                        Err(e) => {
                            warn!(error = %e, "link failed, dropping connection");
                            link_failed = true;
                        }
                    }
                }

                _ = control.tick() => {
                    let quality = self.controller.tick(last_delay);
                    let _ = self.quality_tx.send(quality);
                    trace!(delay = last_delay, quality, "control tick");
                }
            }

            if link_failed {
                // Drop the socket and the pending frame; a fresh
                // connection is constructed on the next attempt.
                conn = None;
                self.slot.clear();
                last_send = None;
                self.set_phase(&mut phase, |p| {
                    p.force_disconnect();
                    Ok(())
                });
            }
        }

        info!("sender service stopped");
        Ok(())
    }

    fn set_phase(
        &self,
        phase: &mut ConnectionPhase,
        transition: impl FnOnce(&mut ConnectionPhase) -> Result<(), CastError>,
    ) {
        if let Err(e) = transition(phase) {
            warn!(error = %e, current = %phase, "state transition rejected");
        }
        let _ = self.phase_tx.send(phase.clone());
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiverConfig;
    use crate::network::StreamListener;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    fn test_config(target: SocketAddr) -> SenderConfig {
        SenderConfig {
            retry_interval: Duration::from_millis(50),
            control_interval: Duration::from_millis(20),
            ..SenderConfig::for_target(target)
        }
    }

    async fn wait_connected(handle: &SenderHandle) {
        let mut phase = handle.phase_watch();
        while !phase.borrow().is_connected() {
            phase.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn frame_and_feedback_roundtrip() {
        let listener = StreamListener::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
        ))
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();

        let (service, handle) = SenderService::new(test_config(addr));
        let runner = tokio::spawn(service.run());

        let mut peer = listener.accept().await.unwrap();
        wait_connected(&handle).await;

        let payload = Bytes::from(vec![0x5A; 500]);
        assert!(handle.offer_frame(payload.clone()));

        let max = ReceiverConfig::default().max_frame_len;
        let (received, interval) = peer.recv_frame(max).await.unwrap();
        assert_eq!(received, payload);
        assert!(interval > 0.0);

        let mut delay = handle.delay_watch();
        peer.send_feedback(0.42).await.unwrap();

        delay.changed().await.unwrap();
        assert_eq!(handle.stream_delay().to_bits(), 0.42f32.to_bits());

        handle.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn latest_offered_frame_wins() {
        let listener = StreamListener::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
        ))
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();

        let (service, handle) = SenderService::new(test_config(addr));
        let runner = tokio::spawn(service.run());

        let mut peer = listener.accept().await.unwrap();
        wait_connected(&handle).await;

        // No await between the two offers: on the current-thread test
        // runtime the service cannot observe frame A.
        let frame_a = Bytes::from(vec![0xAA; 500]);
        let frame_b = Bytes::from(vec![0xBB; 500]);
        handle.offer_frame(frame_a);
        handle.offer_frame(frame_b.clone());

        let max = ReceiverConfig::default().max_frame_len;
        let (received, _) = peer.recv_frame(max).await.unwrap();
        assert_eq!(received, frame_b);

        handle.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn frames_offered_while_disconnected_are_dropped() {
        // Point at a bound-then-dropped port so connects fail.
        let listener = StreamListener::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
        ))
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (service, handle) = SenderService::new(test_config(addr));
        let runner = tokio::spawn(service.run());

        assert!(!handle.offer_frame(Bytes::from_static(b"nobody listening")));

        handle.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reconnects_after_link_failure() {
        let listener = StreamListener::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
        ))
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();

        let (service, handle) = SenderService::new(test_config(addr));
        let runner = tokio::spawn(service.run());

        // First peer drops mid-exchange.
        let mut peer = listener.accept().await.unwrap();
        wait_connected(&handle).await;
        handle.offer_frame(Bytes::from(vec![1u8; 500]));
        let max = ReceiverConfig::default().max_frame_len;
        let _ = peer.recv_frame(max).await.unwrap();
        drop(peer); // feedback never sent — sender sees a dead link

        // The retry loop must land a second connection.
        let mut peer = listener.accept().await.unwrap();
        wait_connected(&handle).await;
        handle.offer_frame(Bytes::from(vec![2u8; 500]));
        let (received, _) = peer.recv_frame(max).await.unwrap();
        assert!(received.iter().all(|&b| b == 2));

        handle.shutdown();
        runner.await.unwrap().unwrap();
    }
}
