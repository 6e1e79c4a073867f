//! Streams a synthetic test pattern to a framecast receiver.
//!
//! Usage: `framecast-sender [host] [port]` (defaults 127.0.0.1:56666).
//!
//! The pattern source stands in for a real capture pipeline: it
//! renders a moving RGB gradient, scales its dimensions with the
//! current quality multiplier, and zstd-compresses the pixels so the
//! payload size tracks quality the way a real encoder's would.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use framecast_core::{CastError, FrameSource, SenderConfig, SenderService, run_pump};
use tracing::info;

const BASE_WIDTH: u32 = 1280;
const BASE_HEIGHT: u32 = 720;

/// Moving-gradient frame source.
#[derive(Default)]
struct PatternSource {
    frame_number: u64,
}

#[async_trait]
impl FrameSource for PatternSource {
    async fn next_frame(&mut self, quality: f32) -> Result<Bytes, CastError> {
        let width = ((BASE_WIDTH as f32 * quality).round() as u32).max(1);
        let height = ((BASE_HEIGHT as f32 * quality).round() as u32).max(1);
        let shift = (self.frame_number % 256) as u8;
        self.frame_number += 1;

        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x as u8).wrapping_add(shift));
                pixels.push(y as u8);
                pixels.push(shift);
            }
        }

        let compressed = zstd::encode_all(pixels.as_slice(), 1)
            .map_err(|e| CastError::Encoding(e.to_string()))?;
        Ok(Bytes::from(compressed))
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

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args
        .next()
        .map(|p| p.parse())
        .transpose()?
        .unwrap_or(framecast_core::DEFAULT_PORT);
    let target: SocketAddr = format!("{host}:{port}").parse()?;

    let config = SenderConfig::for_target(target);
    let target_fps = config.target_fps;
    let (service, handle) = SenderService::new(config);

    let runner = tokio::spawn(service.run());

    let pump_handle = handle.clone();
    let pump = tokio::spawn(async move {
        run_pump(PatternSource::default(), &pump_handle, target_fps).await;
    });

    let status_handle = handle.clone();
    let status = tokio::spawn(async move {
        let cancel = status_handle.cancellation_token();
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            info!(
                phase = %status_handle.phase(),
                quality = status_handle.quality(),
                delay = status_handle.stream_delay(),
                "sender status"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.shutdown();

    let _ = pump.await;
    let _ = status.await;
    runner.await??;
    Ok(())
}
