//! Domain-specific error types for the exchange client.
//!
//! Fallible operations return `Result<T, HareError>`. Refused operations
//! (publishing to an exchange that is not declared, declaring an unnamed
//! exchange, ...) are not errors: they are logged and return `Ok(())`.

use thiserror::Error;

/// The canonical error type for the exchange client.
#[derive(Debug, Error)]
pub enum HareError {
    // ── Codec Errors ─────────────────────────────────────────────
    /// A short string exceeded the 255 byte limit of its length prefix.
    #[error("short string too long: {0} bytes (max 255)")]
    ShortStringTooLong(usize),

    /// A long string or field table exceeded the 32-bit length prefix.
    #[error("value too long for a 32-bit length prefix: {0} bytes")]
    LongValueTooLong(usize),

    /// The buffer ended before a complete value could be read.
    #[error("truncated {context}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        context: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A frame did not end with the `0xCE` frame-end octet.
    #[error("invalid frame end octet: {0:#04x}")]
    InvalidFrameEnd(u8),

    /// Frame size exceeded the negotiated limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The negotiated frame maximum leaves no room for body payload.
    #[error("negotiated frame max {0} is too small to carry a body frame")]
    InvalidFrameMax(u32),

    /// UTF-8 conversion failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The outbound frame channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    // ── Configuration Errors ─────────────────────────────────────
    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for HareError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        HareError::ChannelClosed
    }
}

impl From<toml::de::Error> for HareError {
    fn from(e: toml::de::Error) -> Self {
        HareError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = HareError::ShortStringTooLong(300);
        assert!(e.to_string().contains("300"));

        let e = HareError::Truncated {
            context: "short string",
            needed: 10,
            remaining: 3,
        };
        let text = e.to_string();
        assert!(text.contains("short string"));
        assert!(text.contains("10"));
        assert!(text.contains('3'));
    }

    #[test]
    fn from_toml() {
        let e: HareError = toml::from_str::<toml::Table>("= 1").unwrap_err().into();
        assert!(matches!(e, HareError::Config(_)));
    }

    #[test]
    fn from_send_error() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<u8>();
        drop(rx);
        let e: HareError = tx.send(1).unwrap_err().into();
        assert!(matches!(e, HareError::ChannelClosed));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: HareError = io_err.into();
        assert!(matches!(e, HareError::Connection(_)));
    }
}
