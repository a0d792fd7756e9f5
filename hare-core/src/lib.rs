//! # hare-core
//!
//! Client-side AMQP 0-9-1 exchange for publishing applications.
//!
//! This crate contains:
//! - **Exchange**: `Exchange`, declare/remove lifecycle, publishing, publisher confirms
//! - **State**: pure `Lifecycle` state machine and `ConfirmTracker`
//! - **Publish**: `OutgoingMessage` and the method/header/body frame pipeline
//! - **Codec**: `FrameCodec` for framed I/O via `tokio_util`, field tables, properties
//! - **Network**: `FrameTransport` seam, `FrameSender`, reader/writer pumps
//! - **Config**: `ExchangeConfig` loaded from TOML
//! - **Error**: `HareError`, a `thiserror`-based error type, and `ReplyCode`

pub mod codec;
pub mod config;
pub mod error;
pub mod exchange;
pub mod flags;
pub mod method;
pub mod network;
pub mod properties;
pub mod publish;
pub mod reply;
pub mod returned;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{FieldTable, FieldValue, Frame, FrameCodec, ShortString};
pub use config::ExchangeConfig;
pub use error::HareError;
pub use exchange::{Exchange, ExchangeEvent};
pub use flags::{ExchangeOptions, PublishOptions, RemoveOptions};
pub use network::{FrameSender, FrameTransport};
pub use properties::BasicProperties;
pub use publish::OutgoingMessage;
pub use reply::ReplyCode;
pub use state::{ExchangeKind, ExchangeState};
