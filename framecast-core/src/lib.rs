//! # framecast-core
//!
//! Adaptive frame streaming over a single persistent TCP connection.
//!
//! A sender pushes compressed image frames to one receiver; the
//! receiver measures how long each frame took against the expected
//! cadence and reports a smoothed excess delay back over the same
//! connection. A fixed-step controller on the sender turns that delay
//! into a bounded quality/resolution multiplier read by the frame
//! producer — high delay shrinks the frames, headroom grows them.
//!
//! ```text
//! SENDER                                       RECEIVER
//! ┌──────────────────────────┐                ┌──────────────────────────┐
//! │ FrameSource              │                │ StreamListener::accept   │
//! │   ↓ run_pump (cadence)   │                │   ↓                      │
//! │ FrameSlot (latest-wins)  │  header|bytes  │ recv_frame               │
//! │   ↓                      │ ─────────────► │   ↓ mpsc                 │
//! │ SenderService::run       │                │ FrameSink (main loop)    │
//! │   ↑ QualityController    │  delay (f32)   │   ↑ DelayEstimator       │
//! │     reads delay          │ ◄───────────── │ send_feedback            │
//! └──────────────────────────┘                └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module       | Purpose                                            |
//! |--------------|----------------------------------------------------|
//! | `framing`    | Wire header + feedback float encode/decode         |
//! | `delay`      | Sliding-window excess-delay estimator              |
//! | `network`    | Length-exact TCP connection and listener           |
//! | `state`      | Connection lifecycle state machine                 |
//! | `slot`       | Latest-wins pending-frame buffer                   |
//! | `sender`     | Producer-side endpoint (connect/retry/send loop)   |
//! | `receiver`   | Consumer-side endpoint (accept/read/feedback loop) |
//! | `control`    | Bounded stepwise quality controller                |
//! | `pipeline`   | `FrameSource`/`FrameSink` seams and the frame pump |
//! | `config`     | Endpoint configuration with reference defaults     |
//! | `error`      | `CastError` — typed error hierarchy                |

pub mod config;
pub mod control;
pub mod delay;
pub mod error;
pub mod framing;
pub mod network;
pub mod pipeline;
pub mod receiver;
pub mod sender;
pub mod slot;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use config::{DEFAULT_PORT, ReceiverConfig, SenderConfig};
pub use control::QualityController;
pub use delay::DelayEstimator;
pub use error::CastError;
pub use framing::{FEEDBACK_SIZE, FrameHeader, HEADER_SIZE, decode_feedback, encode_feedback};
pub use network::{StreamConnection, StreamListener};
pub use pipeline::{FrameSink, FrameSource, NoopSink, run_pump};
pub use receiver::{ReceiverHandle, ReceiverService, ReceiverStats};
pub use sender::{SenderHandle, SenderService};
pub use slot::FrameSlot;
pub use state::ConnectionPhase;
