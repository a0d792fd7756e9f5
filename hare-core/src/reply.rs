//! AMQP reply codes carried by `basic.return` (and channel/connection close).
//!
//! Codes below 400 are soft, channel-level conditions; 5xx codes are hard
//! connection errors. `0` and `200` both mean success.

use std::fmt;

/// Reply codes defined by AMQP 0-9-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyCode {
    /// No error recorded yet.
    NoError,
    /// `reply-success` (200).
    Success,

    // ── Soft errors (3xx/4xx) ────────────────────────────────────
    ContentTooLarge,
    NoRoute,
    NoConsumers,
    ConnectionForced,
    InvalidPath,
    AccessRefused,
    NotFound,
    ResourceLocked,
    PreconditionFailed,

    // ── Hard errors (5xx) ────────────────────────────────────────
    FrameError,
    SyntaxError,
    CommandInvalid,
    ChannelError,
    UnexpectedFrame,
    ResourceError,
    NotAllowed,
    NotImplemented,
    InternalError,

    /// A code outside the AMQP table, kept verbatim.
    Other(u16),
}

impl ReplyCode {
    /// The numeric wire value.
    pub fn code(self) -> u16 {
        match self {
            ReplyCode::NoError => 0,
            ReplyCode::Success => 200,
            ReplyCode::ContentTooLarge => 311,
            ReplyCode::NoRoute => 312,
            ReplyCode::NoConsumers => 313,
            ReplyCode::ConnectionForced => 320,
            ReplyCode::InvalidPath => 402,
            ReplyCode::AccessRefused => 403,
            ReplyCode::NotFound => 404,
            ReplyCode::ResourceLocked => 405,
            ReplyCode::PreconditionFailed => 406,
            ReplyCode::FrameError => 501,
            ReplyCode::SyntaxError => 502,
            ReplyCode::CommandInvalid => 503,
            ReplyCode::ChannelError => 504,
            ReplyCode::UnexpectedFrame => 505,
            ReplyCode::ResourceError => 506,
            ReplyCode::NotAllowed => 530,
            ReplyCode::NotImplemented => 540,
            ReplyCode::InternalError => 541,
            ReplyCode::Other(code) => code,
        }
    }

    /// Returns `true` for every code except the success sentinels.
    pub fn is_error(self) -> bool {
        !matches!(self, ReplyCode::NoError | ReplyCode::Success)
    }
}

impl From<u16> for ReplyCode {
    fn from(value: u16) -> Self {
        match value {
            0 => ReplyCode::NoError,
            200 => ReplyCode::Success,
            311 => ReplyCode::ContentTooLarge,
            312 => ReplyCode::NoRoute,
            313 => ReplyCode::NoConsumers,
            320 => ReplyCode::ConnectionForced,
            402 => ReplyCode::InvalidPath,
            403 => ReplyCode::AccessRefused,
            404 => ReplyCode::NotFound,
            405 => ReplyCode::ResourceLocked,
            406 => ReplyCode::PreconditionFailed,
            501 => ReplyCode::FrameError,
            502 => ReplyCode::SyntaxError,
            503 => ReplyCode::CommandInvalid,
            504 => ReplyCode::ChannelError,
            505 => ReplyCode::UnexpectedFrame,
            506 => ReplyCode::ResourceError,
            530 => ReplyCode::NotAllowed,
            540 => ReplyCode::NotImplemented,
            541 => ReplyCode::InternalError,
            other => ReplyCode::Other(other),
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyCode::Other(code) => write!(f, "UNKNOWN_{code}"),
            known => write!(f, "{known:?}({})", known.code()),
        }
    }
}
