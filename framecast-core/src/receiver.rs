//! Consumer-side streaming endpoint.
//!
//! [`ReceiverService::run`] binds once and then serves one sender at
//! a time: accept, read frames until the peer goes away, accept
//! again. Received payloads are handed to the consumer through a
//! bounded channel — the delivery loop ([`ReceiverHandle::deliver_to`])
//! is the logical main thread, so the consumer is never invoked from
//! the I/O task. After every frame the receiver answers with its
//! current smoothed excess delay.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReceiverConfig;
use crate::delay::DelayEstimator;
use crate::error::CastError;
use crate::network::StreamListener;
use crate::pipeline::FrameSink;
use crate::state::ConnectionPhase;

/// Pause after a failed accept before listening again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(500);

// ── ReceiverStats ────────────────────────────────────────────────

/// Continuously-updated stream statistics for a UI or driver.
#[derive(Debug, Clone, Default)]
pub struct ReceiverStats {
    /// Frames delivered to the consumer since startup.
    pub total_frames: u64,
    /// Payload bytes delivered since startup.
    pub total_bytes: u64,
    /// Length of the most recent delivered payload.
    pub last_frame_len: usize,
    /// Frames per second derived from the delay window.
    pub fps: f32,
    /// Current smoothed excess delay (seconds).
    pub smoothed_delay: f32,
}

// ── ReceiverHandle ───────────────────────────────────────────────

/// Consumer-side handle to a running [`ReceiverService`].
#[derive(Debug)]
pub struct ReceiverHandle {
    frames: mpsc::Receiver<Bytes>,
    phase: watch::Receiver<ConnectionPhase>,
    delay: watch::Receiver<f32>,
    stats: watch::Receiver<ReceiverStats>,
    cancel: CancellationToken,
}

impl ReceiverHandle {
    /// Await the next delivered frame. `None` once the service has
    /// stopped.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }

    /// Drain frames into `sink` in arrival order. This is the
    /// logical-main-thread loop; it returns when the service stops.
    pub async fn deliver_to<S: FrameSink + ?Sized>(&mut self, sink: &mut S) {
        while let Some(frame) = self.frames.recv().await {
            sink.on_frame(frame).await;
        }
    }

    /// Whether a sender is currently connected.
    pub fn is_connected(&self) -> bool {
        self.phase.borrow().is_connected()
    }

    /// Current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase.borrow().clone()
    }

    /// Current smoothed excess delay (seconds).
    pub fn smoothed_delay(&self) -> f32 {
        *self.delay.borrow()
    }

    /// Snapshot of the stream statistics.
    pub fn stats(&self) -> ReceiverStats {
        self.stats.borrow().clone()
    }

    pub fn phase_watch(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.clone()
    }

    pub fn delay_watch(&self) -> watch::Receiver<f32> {
        self.delay.clone()
    }

    pub fn stats_watch(&self) -> watch::Receiver<ReceiverStats> {
        self.stats.clone()
    }

    /// Token observed by the service loops.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal the service to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── ReceiverService ──────────────────────────────────────────────

/// Consumer-side endpoint service.
pub struct ReceiverService {
    config: ReceiverConfig,
    listener: StreamListener,
    estimator: DelayEstimator,
    frames_tx: mpsc::Sender<Bytes>,
    phase_tx: watch::Sender<ConnectionPhase>,
    delay_tx: watch::Sender<f32>,
    stats_tx: watch::Sender<ReceiverStats>,
    cancel: CancellationToken,
}

impl ReceiverService {
    /// Bind the listening socket and create the service plus its
    /// handle. Binding happens here so callers can use port 0 and
    /// read the effective address before running.
    pub async fn bind(config: ReceiverConfig) -> Result<(Self, ReceiverHandle), CastError> {
        let listener =
            StreamListener::bind(SocketAddr::new(config.bind_addr, config.port)).await?;

        let estimator = DelayEstimator::with_capacity(config.delay_window);
        let (frames_tx, frames_rx) = mpsc::channel(config.frame_channel_capacity.max(1));
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::default());
        let (delay_tx, delay_rx) = watch::channel(0.0f32);
        let (stats_tx, stats_rx) = watch::channel(ReceiverStats::default());
        let cancel = CancellationToken::new();

        let handle = ReceiverHandle {
            frames: frames_rx,
            phase: phase_rx,
            delay: delay_rx,
            stats: stats_rx,
            cancel: cancel.clone(),
        };

        let service = Self {
            config,
            listener,
            estimator,
            frames_tx,
            phase_tx,
            delay_tx,
            stats_tx,
            cancel,
        };

        Ok((service, handle))
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr, CastError> {
        self.listener.local_addr()
    }

    /// Run until the cancellation token fires.
    pub async fn run(mut self) -> Result<(), CastError> {
        info!(addr = ?self.local_addr().ok(), "receiver service starting");

        let mut phase = ConnectionPhase::default();
        let mut stats = ReceiverStats::default();

        'outer: loop {
            self.set_phase(&mut phase, ConnectionPhase::begin_connect);
            info!("waiting for a sender");

            let mut link = tokio::select! {
                _ = self.cancel.cancelled() => break 'outer,
                accepted = self.listener.accept() => match accepted {
                    Ok(link) => link,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        self.set_phase(&mut phase, ConnectionPhase::attempt_failed);
                        tokio::select! {
                            _ = self.cancel.cancelled() => break 'outer,
                            _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                        }
                        continue;
                    }
                }
            };

            info!(peer = %link.peer_addr(), "sender connected");
            self.set_phase(&mut phase, ConnectionPhase::established);

            loop {
                let started = Instant::now();

                let (payload, reported) = tokio::select! {
                    _ = self.cancel.cancelled() => break 'outer,
                    received = link.recv_frame(self.config.max_frame_len) => match received {
                        Ok(v) => v,
                        Err(e) if e.is_disconnect() => {
                            info!("sender disconnected");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "rejecting connection");
                            break;
                        }
                    }
                };

                let len = payload.len();
                let deliver = len >= self.config.min_frame_len;
                if deliver {
                    if self.frames_tx.send(payload).await.is_err() {
                        // Consumer handle dropped; nothing left to serve.
                        return Err(CastError::ChannelClosed);
                    }
                } else {
                    debug!(len, "runt frame drained");
                }

                let elapsed = started.elapsed().as_secs_f32();
                let reference = if reported.is_finite() && reported > 0.0 {
                    reported
                } else {
                    self.config.default_frame_interval
                };
                let delay = self.estimator.smoothed_delay(elapsed, reference);
                let _ = self.delay_tx.send(delay);

                if deliver {
                    stats.total_frames += 1;
                    stats.total_bytes += len as u64;
                    stats.last_frame_len = len;
                    let avg = self.estimator.average();
                    stats.fps = if avg > 0.0 { 1.0 / avg } else { 0.0 };
                    stats.smoothed_delay = delay;
                    let _ = self.stats_tx.send(stats.clone());
                }

                if let Err(e) = link.send_feedback(delay).await {
                    warn!(error = %e, "feedback write failed");
                    break;
                }
            }

            // The connection drops here; the next accept builds a
            // fresh one.
            self.set_phase(&mut phase, |p| {
                p.force_disconnect();
                Ok(())
            });
        }

        info!("receiver service stopped");
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
    use crate::framing::FrameHeader;
    use crate::network::StreamConnection;

    async fn bound_receiver() -> (SocketAddr, ReceiverHandle, tokio::task::JoinHandle<Result<(), CastError>>) {
        let (service, handle) = ReceiverService::bind(ReceiverConfig::loopback())
            .await
            .unwrap();
        let addr = service.local_addr().unwrap();
        let runner = tokio::spawn(service.run());
        (addr, handle, runner)
    }

    async fn connect(addr: SocketAddr) -> StreamConnection {
        StreamConnection::connect(addr, Duration::from_secs(5))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn delivers_a_frame_and_answers_feedback() {
        let (addr, mut handle, runner) = bound_receiver().await;
        let mut sender = connect(addr).await;

        let payload = vec![0xC3; 500];
        sender.send_frame(&payload, 0.05).await.unwrap();

        let frame = handle.next_frame().await.unwrap();
        assert_eq!(frame.len(), 500);
        assert!(frame.iter().all(|&b| b == 0xC3));

        let delay = sender.recv_feedback().await.unwrap();
        assert!(delay >= 0.0);
        assert!(handle.smoothed_delay() >= 0.0);
        assert_eq!(handle.stats().total_frames, 1);

        handle.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn runt_frames_are_not_delivered_but_keep_the_stream_alive() {
        let (addr, mut handle, runner) = bound_receiver().await;
        let mut sender = connect(addr).await;

        sender.send_frame(&[0x01; 50], 0.05).await.unwrap();
        // The runt still gets a feedback answer.
        let delay = sender.recv_feedback().await.unwrap();
        assert!(delay >= 0.0);

        sender.send_frame(&[0x02; 500], 0.05).await.unwrap();
        let frame = handle.next_frame().await.unwrap();
        assert_eq!(frame.len(), 500);
        assert_eq!(handle.stats().total_frames, 1);

        handle.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reaccepts_after_peer_disconnects_mid_payload() {
        let (addr, mut handle, runner) = bound_receiver().await;

        // First peer promises 500 bytes, delivers 100, then vanishes.
        let mut first = connect(addr).await;
        first
            .write_all(&FrameHeader::new(500).encode())
            .await
            .unwrap();
        first.write_all(&[0u8; 100]).await.unwrap();
        drop(first);

        // A fresh peer must be served afterwards.
        let mut second = connect(addr).await;
        second.send_frame(&[0x7E; 500], 0.05).await.unwrap();
        let frame = handle.next_frame().await.unwrap();
        assert_eq!(frame.len(), 500);
        assert!(frame.iter().all(|&b| b == 0x7E));

        handle.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn malformed_length_rejects_the_connection() {
        let (addr, mut handle, runner) = bound_receiver().await;

        let mut evil = connect(addr).await;
        let mut header = [0u8; FrameHeader::SIZE];
        header[..4].copy_from_slice(&(-7i32).to_le_bytes());
        evil.write_all(&header).await.unwrap();

        // The service drops the connection and accepts a new peer.
        let mut honest = connect(addr).await;
        honest.send_frame(&[0x44; 500], 0.05).await.unwrap();
        let frame = handle.next_frame().await.unwrap();
        assert_eq!(frame.len(), 500);

        handle.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn frames_arrive_in_send_order() {
        let (addr, mut handle, runner) = bound_receiver().await;
        let mut sender = connect(addr).await;

        for marker in [0x10u8, 0x20, 0x30] {
            sender.send_frame(&vec![marker; 500], 0.05).await.unwrap();
            let _ = sender.recv_feedback().await.unwrap();
        }

        for marker in [0x10u8, 0x20, 0x30] {
            let frame = handle.next_frame().await.unwrap();
            assert!(frame.iter().all(|&b| b == marker));
        }

        handle.shutdown();
        runner.await.unwrap().unwrap();
    }
}
