//! Endpoint configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default port both endpoints use.
pub const DEFAULT_PORT: u16 = 56666;

/// Sender-side configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Receiver address to connect to.
    pub target: SocketAddr,
    /// Deadline for a single connect attempt.
    pub connect_timeout: Duration,
    /// Pause between reconnect attempts.
    pub retry_interval: Duration,
    /// How often the quality controller ticks.
    pub control_interval: Duration,
    /// Delay at or above this steps quality down (seconds).
    pub delay_threshold: f32,
    /// Quality adjustment per control tick.
    pub quality_step: f32,
    /// Inclusive quality bounds (resolution multiplier).
    pub quality_bounds: (f32, f32),
    /// Quality at startup, clamped into the bounds.
    pub initial_quality: f32,
    /// Target send cadence; also the fallback inter-send interval
    /// reported with the first frame after a (re)connect.
    pub target_fps: f32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            connect_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_secs(3),
            control_interval: Duration::from_millis(500),
            delay_threshold: 0.1,
            quality_step: 0.01,
            quality_bounds: (0.1, 1.0),
            initial_quality: 1.0,
            target_fps: 30.0,
        }
    }
}

impl SenderConfig {
    /// Defaults pointed at `target`.
    pub fn for_target(target: SocketAddr) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }
}

/// Receiver-side configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Local address to bind.
    pub bind_addr: IpAddr,
    /// Local port to bind (0 picks an ephemeral port).
    pub port: u16,
    /// Delay estimator window size.
    pub delay_window: usize,
    /// Expected per-frame interval when the sender's reported value
    /// is absent or unusable (seconds).
    pub default_frame_interval: f32,
    /// Payloads shorter than this are drained and discarded, not
    /// delivered.
    pub min_frame_len: usize,
    /// Payloads longer than this reject the connection.
    pub max_frame_len: usize,
    /// Capacity of the frame handoff channel to the consumer loop.
    pub frame_channel_capacity: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            delay_window: 10,
            default_frame_interval: 0.05,
            min_frame_len: 100,
            max_frame_len: 64 * 1024 * 1024,
            frame_channel_capacity: 8,
        }
    }
}

impl ReceiverConfig {
    /// Defaults bound to `port` on all interfaces.
    pub fn on_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Defaults bound to an ephemeral loopback port.
    pub fn loopback() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Default::default()
        }
    }
}
