//! Receives a framecast stream and logs what arrives.
//!
//! Usage: `framecast-receiver [port]` (default 56666).
//!
//! Stands in for a real display pipeline: every delivered frame is
//! counted on the main loop and the stream statistics (fps, totals,
//! smoothed delay) are logged periodically.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use framecast_core::{FrameSink, ReceiverConfig, ReceiverService};
use tracing::{debug, info};

/// Consumer that counts frames instead of displaying them.
#[derive(Default)]
struct LogSink {
    delivered: u64,
}

#[async_trait]
impl FrameSink for LogSink {
    async fn on_frame(&mut self, frame: Bytes) {
        self.delivered += 1;
        debug!(len = frame.len(), total = self.delivered, "frame delivered");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let port = std::env::args()
        .nth(1)
        .map(|p| p.parse())
        .transpose()?
        .unwrap_or(framecast_core::DEFAULT_PORT);

    let (service, mut handle) = ReceiverService::bind(ReceiverConfig::on_port(port)).await?;
    info!(addr = %service.local_addr()?, "listening");

    let runner = tokio::spawn(service.run());

    let stats_watch = handle.stats_watch();
    let cancel = handle.cancellation_token();
    let shutdown = cancel.clone();

    let delivery = tokio::spawn(async move {
        let mut sink = LogSink::default();
        handle.deliver_to(&mut sink).await;
        info!(total = sink.delivered, "delivery loop finished");
    });

    let stats = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let s = stats_watch.borrow().clone();
            info!(
                frames = s.total_frames,
                bytes = s.total_bytes,
                fps = s.fps,
                delay = s.smoothed_delay,
                "receiver status"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    shutdown.cancel();

    let _ = stats.await;
    runner.await??;
    let _ = delivery.await;
    Ok(())
}
